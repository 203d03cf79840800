//! Retention sweep over the configured roots.

pub mod deletion;
pub mod retention;
