// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Driver tunables

use std::time::Duration;

use gal::Extent2D;

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// How long `request_custom_mode` waits for the client to acknowledge
    pub ack_timeout: Duration,
    /// Delay between acknowledgement and the mode-list restore
    pub restore_delay: Duration,
    /// Pause after clearing the framebuffer on stop
    pub clear_settle: Duration,
    /// Mode id used when the current geometry matches nothing in the table
    pub default_mode: u32,
    /// Attempt 3D acceleration bring-up
    pub enable_acceleration: bool,
    /// Preferred refresh rate in Hz
    pub refresh_rate: u32,
    pub vsync: bool,
    /// Smallest geometry a custom mode may request
    pub min_custom: Extent2D,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(10),
            restore_delay: Duration::from_millis(2000),
            clear_settle: Duration::from_millis(50),
            default_mode: 3,
            enable_acceleration: true,
            refresh_rate: 60,
            vsync: true,
            min_custom: Extent2D::new(800, 600),
        }
    }
}

impl DriverConfig {
    /// Defaults overridden by `VIRTIO_FBD_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = DriverConfig::default();

        if let Some(n) = parse_num::<u64>(&lookup, "VIRTIO_FBD_ACK_TIMEOUT_MS") {
            config.ack_timeout = Duration::from_millis(n);
        }

        if let Some(n) = parse_num::<u64>(&lookup, "VIRTIO_FBD_RESTORE_DELAY_MS") {
            config.restore_delay = Duration::from_millis(n);
        }

        if let Some(n) = parse_num::<u64>(&lookup, "VIRTIO_FBD_CLEAR_SETTLE_MS") {
            config.clear_settle = Duration::from_millis(n);
        }

        if let Some(n) = parse_num(&lookup, "VIRTIO_FBD_DEFAULT_MODE") {
            config.default_mode = n;
        }

        if let Some(val) = lookup("VIRTIO_FBD_ACCEL") {
            config.enable_acceleration = parse_bool(&val);
        }

        if let Some(n) = parse_num(&lookup, "VIRTIO_FBD_REFRESH_HZ") {
            config.refresh_rate = n;
        }

        if let Some(val) = lookup("VIRTIO_FBD_VSYNC") {
            config.vsync = parse_bool(&val);
        }

        config
    }
}

fn parse_num<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let val = lookup(key)?;
    match val.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("virtio-fbd: ignoring {}={:?}", key, val);
            None
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val == "1" || val.to_lowercase() == "true"
}
