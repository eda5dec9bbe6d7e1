//! Optimistic manager configuration with production defaults

pub mod file;
pub mod types;

pub use file::{ConfigFile, OptimisticFileConfig};
pub use types::OptimisticConfig;
