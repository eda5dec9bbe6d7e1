//! Optimistic update system module
//!
//! Tracking, timers and policies in `optimistic`, with the collaborator
//! contracts and their stock implementations alongside.

pub mod config;
pub mod notify;
pub mod optimistic;
pub mod store;
pub mod traits;
pub mod types;
