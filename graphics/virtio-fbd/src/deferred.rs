// SPDX-FileCopyrightText: 2024 Redox OS Developers
// SPDX-License-Identifier: MIT

//! Delayed callback on a dedicated worker thread
//!
//! Once scheduled a call cannot be cancelled. Scheduling again while one is
//! pending moves the deadline. `shutdown` stops the worker whether or not
//! the pending call ever ran.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::Result;

#[derive(Default)]
struct TimerState {
    deadline: Option<Instant>,
    shutdown: bool,
    fired: u64,
}

#[derive(Default)]
struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

pub struct DeferredCall {
    name: String,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeferredCall {
    /// Start a worker thread named `name` that will run `callback`
    pub fn spawn<F>(name: &str, callback: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(worker_shared, callback))?;
        Ok(Self {
            name: name.to_string(),
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Run the callback once `delay` has elapsed
    pub fn schedule(&self, delay: Duration) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.deadline = Some(Instant::now() + delay);
        self.shared.wake.notify_one();
        debug!("{}: scheduled in {:?}", self.name, delay);
    }

    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// How many times the callback has run
    pub fn fired(&self) -> u64 {
        self.shared.state.lock().fired
    }

    /// Stop and join the worker. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.deadline.take().is_some() {
                debug!("{}: dropping pending call", self.name);
            }
            state.shutdown = true;
            self.shared.wake.notify_all();
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            // the callback itself may be what drops us
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("{}: worker panicked", self.name);
            }
        }
    }
}

impl Drop for DeferredCall {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<F: Fn()>(shared: Arc<Shared>, callback: F) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        match state.deadline {
            None => shared.wake.wait(&mut state),
            Some(deadline) if Instant::now() >= deadline => {
                state.deadline = None;
                state.fired += 1;
                MutexGuard::unlocked(&mut state, &callback);
            }
            Some(deadline) => {
                shared.wake.wait_until(&mut state, deadline);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, impl Fn() + Send + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (hits, move || {
            h.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_fires_after_delay() {
        let (hits, cb) = counting();
        let call = DeferredCall::spawn("test-deferred", cb).unwrap();
        let start = Instant::now();
        call.schedule(Duration::from_millis(40));
        assert!(call.is_pending());
        wait_for(|| hits.load(Ordering::SeqCst) == 1);
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert!(!call.is_pending());
        assert_eq!(call.fired(), 1);
    }

    #[test]
    fn test_reschedule_moves_deadline() {
        let (hits, cb) = counting();
        let call = DeferredCall::spawn("test-deferred", cb).unwrap();
        call.schedule(Duration::from_millis(20));
        call.schedule(Duration::from_millis(60));
        wait_for(|| hits.load(Ordering::SeqCst) == 1);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_frees_pending_call() {
        let (hits, cb) = counting();
        let call = DeferredCall::spawn("test-deferred", cb).unwrap();
        call.schedule(Duration::from_secs(60));
        call.shutdown();
        assert!(!call.is_pending());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        // scheduling after shutdown is ignored
        call.schedule(Duration::from_millis(1));
        assert!(!call.is_pending());
        call.shutdown();
    }
}
