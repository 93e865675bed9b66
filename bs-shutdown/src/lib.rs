// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-wide shutdown coordination.
//!
//! Unix signal handlers may only perform async-signal-safe operations;
//! waiting on a condition variable is not one of them. [`stop`] therefore
//! does nothing but a lock-free compare-and-swap, and a detached poller
//! thread converts that atomic into a waitable event. See `initialize` for
//! the handlers that are armed and `uninitialize` for teardown.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use lazy_static::lazy_static;

/// Sentinel value meaning "no signal observed yet".
pub const UNSIGNALLED: i32 = -1;
/// Sentinel passed to [`stop`] by callers that are not signal handlers
/// (the executor itself, a console command, an event handler thread).
pub const SIGNAL_NONE: i32 = -2;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

static SIGNAL: AtomicI32 = AtomicI32::new(UNSIGNALLED);

lazy_static! {
    static ref STOPPING: (Mutex<bool>, Condvar) = (Mutex::new(false), Condvar::new());
}

/// Handles to the background workers started by [`initialize`], joined by
/// [`uninitialize`]. Not `Clone`; own exactly one per process.
pub struct Shutdown {
    poller: Option<JoinHandle<()>>,
    signal_ids: Vec<signal_hook::SigId>,
}

impl Shutdown {
    /// Start the poller worker and arm the signal handlers.
    ///
    /// Signal installation is best-effort: if the platform rejects a
    /// particular signal the others remain armed.
    pub fn initialize() -> Self {
        let poller = std::thread::spawn(|| {
            while SIGNAL.load(Ordering::Acquire) == UNSIGNALLED {
                std::thread::sleep(POLL_INTERVAL);
            }
            let (lock, cvar) = &*STOPPING;
            let mut stopped = lock.lock().expect("stopping mutex poisoned");
            *stopped = true;
            cvar.notify_all();
        });

        let mut signal_ids = Vec::new();
        for signal in Self::handled_signals() {
            // SAFETY: the registered action performs only a single
            // async-signal-safe compare-and-swap on a static atomic.
            let registered =
                unsafe { signal_hook::low_level::register(signal, move || stop(signal)) };
            if let Ok(id) = registered {
                signal_ids.push(id);
            }
        }

        Shutdown {
            poller: Some(poller),
            signal_ids,
        }
    }

    #[cfg(target_os = "linux")]
    fn handled_signals() -> Vec<i32> {
        vec![
            signal_hook::consts::SIGINT,
            signal_hook::consts::SIGTERM,
            signal_hook::consts::SIGHUP,
            signal_hook::consts::SIGUSR2,
            libc_signal::SIGPWR,
        ]
    }

    #[cfg(not(target_os = "linux"))]
    fn handled_signals() -> Vec<i32> {
        vec![
            signal_hook::consts::SIGINT,
            signal_hook::consts::SIGTERM,
            signal_hook::consts::SIGHUP,
            signal_hook::consts::SIGUSR2,
        ]
    }

    /// Block until a stop has been latched (by signal or by [`stop`]).
    pub fn wait_for_stopping(&self) {
        wait_for_stopping();
    }

    /// Non-blocking; true once any stop source has fired. Safe to call from
    /// any thread, including from inside a scan loop.
    pub fn canceled(&self) -> bool {
        canceled()
    }

    /// Idempotent; safe to call from a signal handler, an event-handler
    /// thread, or the executor itself.
    pub fn stop(&self, signal: i32) {
        stop(signal);
    }

    /// Issues a stop (idempotent) and joins the poller thread.
    pub fn uninitialize(mut self) {
        stop(SIGNAL_NONE);
        if let Some(handle) = self.poller.take() {
            let _ = handle.join();
        }
        for id in self.signal_ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

impl Drop for Shutdown {
    fn drop(&mut self) {
        stop(SIGNAL_NONE);
        if let Some(handle) = self.poller.take() {
            let _ = handle.join();
        }
    }
}

/// Async-signal-safe: a single compare-and-swap that fails silently if a
/// signal was already latched. Never clears once set.
pub fn stop(signal: i32) {
    let _ = SIGNAL.compare_exchange(
        UNSIGNALLED,
        signal,
        Ordering::Release,
        Ordering::Relaxed,
    );
}

/// Non-blocking query usable from any thread or from a scan loop's
/// top-of-iteration check.
pub fn canceled() -> bool {
    SIGNAL.load(Ordering::Acquire) != UNSIGNALLED
}

/// Blocks the calling thread until the poller has observed a stop and
/// fulfilled the stopping event.
pub fn wait_for_stopping() {
    let (lock, cvar) = &*STOPPING;
    let mut stopped = lock.lock().expect("stopping mutex poisoned");
    while !*stopped {
        stopped = cvar.wait(stopped).expect("stopping mutex poisoned");
    }
}

/// The signal value latched, if any.
pub fn signal() -> Option<i32> {
    match SIGNAL.load(Ordering::Acquire) {
        UNSIGNALLED => None,
        value => Some(value),
    }
}

#[cfg(target_os = "linux")]
mod libc_signal {
    pub const SIGPWR: i32 = 30;
}

#[cfg(test)]
mod tests {
    use super::*;

    // SIGNAL is process-global, so a single test exercises the whole
    // idempotency/visibility contract rather than risking interleaving
    // with other #[test] threads touching the same static.
    #[test]
    fn stop_is_idempotent_and_latches_first_value() {
        assert!(!canceled());
        stop(5);
        assert!(canceled());
        let first = signal();
        assert_eq!(first, Some(5));
        stop(7);
        assert_eq!(signal(), first, "second stop must not overwrite the first");
    }
}
