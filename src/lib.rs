#![forbid(unsafe_code)]

//! Collector Cleaner: a maintenance service for hosts that accumulate
//! collected files.
//!
//! Every cycle does two things:
//! 1. **Retention sweep**: deletes first-level entries of each configured root
//!    that are older than `DaysToKeep` days.
//! 2. **Free-space check**: measures the configured volume and posts a webhook
//!    alert when free space drops below `DiscSpaceInPercent`.
//!
//! Configuration is validated field by field; a bad field falls back to its
//! default and never stops the service.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use collector_cleaner::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use collector_cleaner::core::validation::validate;
//! use collector_cleaner::scanner::retention::RetentionSweeper;
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod logger;
pub mod monitor;
pub mod platform;
pub mod scanner;
