// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Device descriptor publication

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;

/// A published property value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Str(String),
    Num(u64),
    Bool(bool),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => write!(f, "{}", s),
            PropertyValue::Num(n) => write!(f, "{:#x}", n),
            PropertyValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Sink for properties describing the device to the host
pub trait DescriptorPublisher: Send + Sync {
    fn publish(&self, key: &str, value: PropertyValue);

    fn publish_str(&self, key: &str, value: &str) {
        self.publish(key, PropertyValue::Str(value.to_string()));
    }

    fn publish_num(&self, key: &str, value: u64) {
        self.publish(key, PropertyValue::Num(value));
    }

    fn publish_bool(&self, key: &str, value: bool) {
        self.publish(key, PropertyValue::Bool(value));
    }
}

/// Publisher that keeps the latest value of every key
#[derive(Default)]
pub struct PropertyTable {
    entries: Mutex<BTreeMap<String, PropertyValue>>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<PropertyValue> {
        self.entries.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot in key order
    pub fn entries(&self) -> Vec<(String, PropertyValue)> {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl DescriptorPublisher for PropertyTable {
    fn publish(&self, key: &str, value: PropertyValue) {
        log::trace!("virtio-fbd: property {} = {}", key, value);
        self.entries.lock().insert(key.to_string(), value);
    }
}

/// Drops everything
pub struct NullPublisher;

impl DescriptorPublisher for NullPublisher {
    fn publish(&self, _key: &str, _value: PropertyValue) {}
}
