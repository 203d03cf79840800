//! Signal handling: SIGTERM/SIGINT request a clean stop, SIGUSR1 requests an
//! immediate cycle.
//!
//! Uses `signal-hook` flag registration; the `run` loop polls the flags.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};

/// How often [`SignalHandler::wait`] re-checks the flags.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// What the service loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalRequest {
    Shutdown,
    RunCycle,
}

/// Signal flags shared between the OS handlers and the service loop.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    cycle_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register OS signal hooks. Registration failures
    /// are reported on stderr and otherwise ignored.
    pub fn new() -> Self {
        let handler = Self::detached();
        handler.register_signals();
        handler
    }

    /// Handler with no OS hooks, driven only by the `request_*` methods.
    pub fn detached() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            cycle_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check and clear the immediate-cycle request.
    pub fn should_run_cycle(&self) -> bool {
        self.cycle_flag.swap(false, Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_cycle(&self) {
        self.cycle_flag.store(true, Ordering::Relaxed);
    }

    /// Block until a signal arrives. Shutdown wins over a pending cycle request.
    pub fn wait(&self) -> SignalRequest {
        loop {
            if self.should_shutdown() {
                return SignalRequest::Shutdown;
            }
            if self.should_run_cycle() {
                return SignalRequest::RunCycle;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[CCL-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[CCL-SIGNAL] failed to register SIGINT: {e}");
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::SIGUSR1;
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.cycle_flag)) {
                eprintln!("[CCL-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
