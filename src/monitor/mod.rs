//! Free-space monitoring for the configured volume.

pub mod disk_space;
