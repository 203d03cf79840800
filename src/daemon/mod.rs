//! Service subsystem: lifecycle, cycle scheduling, webhook alerts, signal handling.

pub mod notifications;
pub mod scheduler;
pub mod service;
#[cfg(feature = "daemon")]
pub mod signals;
