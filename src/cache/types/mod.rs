//! Shared error and result types

pub mod error_types;

pub use error_types::{OptimistError, OptimistResult, RecoveryHint};
