//! Core types: errors, configuration, validation, paths.

pub mod config;
pub mod errors;
pub mod paths;
pub mod validation;
