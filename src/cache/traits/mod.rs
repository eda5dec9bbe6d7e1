//! Contracts with the injected collaborators
//!
//! The manager consumes a keyed cache store addressed by [`QueryKey`]s. The
//! notification contract lives next to its sinks in `cache::notify`.

pub mod key;
pub mod store;

pub use key::QueryKey;
pub use store::CacheStore;
