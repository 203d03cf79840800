//! Activity logging: leveled domain events written as JSONL by a dedicated thread.

pub mod activity;
pub mod jsonl;
