//! Fixed-interval cycle scheduler with a skip-if-busy guard.
//!
//! A ticker thread owns the timer and selects over the tick channel, a stop
//! channel and a manual-trigger channel. Each accepted tick runs the cycle on
//! its own worker thread. A tick that arrives while the previous cycle is
//! still running is skipped and logged, so two cycles never overlap.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, tick};
use parking_lot::Mutex;

use crate::core::errors::{CleanerError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Body executed once per cycle.
pub type CycleFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

struct Armed {
    stop_tx: Sender<()>,
    trigger_tx: Sender<()>,
    ticker: JoinHandle<()>,
}

/// Releases the in-flight flag when the cycle ends, including on panic.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State shared between the scheduler handle and its ticker thread.
struct Shared {
    in_flight: Arc<AtomicBool>,
    cycles_started: AtomicU64,
    logger: ActivityLoggerHandle,
}

impl Shared {
    fn launch(&self, cycle: &CycleFn, reason: &str) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.logger.send(ActivityEvent::CycleSkipped {
                reason: format!("{reason}: previous cycle still running"),
            });
            return;
        }

        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let cycle = Arc::clone(cycle);
        let spawned = thread::Builder::new()
            .name("ccl-cycle".to_string())
            .spawn(move || {
                let _guard = guard;
                cycle();
            });
        match spawned {
            Ok(_) => {
                self.cycles_started.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => self.logger.send(ActivityEvent::CycleSkipped {
                reason: format!("{reason}: failed to spawn cycle thread: {e}"),
            }),
        }
    }
}

/// Two-state scheduler: `Idle` ⇄ `Running`.
pub struct CycleScheduler {
    interval: Duration,
    shared: Arc<Shared>,
    armed: Mutex<Option<Armed>>,
}

impl CycleScheduler {
    #[must_use]
    pub fn new(interval: Duration, logger: ActivityLoggerHandle) -> Self {
        Self {
            interval,
            shared: Arc::new(Shared {
                in_flight: Arc::new(AtomicBool::new(false)),
                cycles_started: AtomicU64::new(0),
                logger,
            }),
            armed: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        if self.armed.lock().is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Whether a cycle body is executing right now.
    #[must_use]
    pub fn is_cycle_running(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Number of cycles started (ticks that were not skipped).
    #[must_use]
    pub fn cycles_started(&self) -> u64 {
        self.shared.cycles_started.load(Ordering::Relaxed)
    }

    /// Idle → Running. The first cycle fires one interval from now.
    pub fn start<F>(&self, cycle: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut armed = self.armed.lock();
        if armed.is_some() {
            return Err(CleanerError::Runtime {
                details: "scheduler is already running".to_string(),
            });
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (trigger_tx, trigger_rx) = bounded::<()>(1);
        let cycle: CycleFn = Arc::new(cycle);
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;

        let ticker = thread::Builder::new()
            .name("ccl-ticker".to_string())
            .spawn(move || ticker_main(interval, &stop_rx, &trigger_rx, &shared, &cycle))
            .map_err(|e| CleanerError::Runtime {
                details: format!("failed to spawn ticker thread: {e}"),
            })?;

        *armed = Some(Armed {
            stop_tx,
            trigger_tx,
            ticker,
        });
        Ok(())
    }

    /// Running → Idle. An in-flight cycle is not cancelled. No-op when idle.
    pub fn stop(&self) {
        let Some(armed) = self.armed.lock().take() else {
            return;
        };
        let _ = armed.stop_tx.try_send(());
        drop(armed.stop_tx);
        let _ = armed.ticker.join();
    }

    /// Run a cycle now, through the same overlap guard as timer ticks.
    pub fn trigger_now(&self) -> Result<()> {
        let armed = self.armed.lock();
        let Some(armed) = armed.as_ref() else {
            return Err(CleanerError::Runtime {
                details: "scheduler is not running".to_string(),
            });
        };
        match armed.trigger_tx.try_send(()) {
            // A full channel means a trigger is already pending.
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Disconnected(())) => Err(CleanerError::Runtime {
                details: "ticker thread has exited".to_string(),
            }),
        }
    }

    /// Block until no cycle is running, up to `timeout`. Returns `true` if idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_cycle_running() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

impl Drop for CycleScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ticker_main(
    interval: Duration,
    stop_rx: &Receiver<()>,
    trigger_rx: &Receiver<()>,
    shared: &Shared,
    cycle: &CycleFn,
) {
    let ticks = tick(interval);
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticks) -> _ => shared.launch(cycle, "timer tick"),
            recv(trigger_rx) -> msg => {
                if msg.is_err() {
                    break;
                }
                shared.launch(cycle, "manual trigger");
            }
        }
    }
}
