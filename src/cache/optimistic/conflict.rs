//! Reconciling optimistic values with authoritative server data

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

/// Custom merge receiving `(client, server)`
pub type Resolver<V> = Box<dyn FnOnce(&V, &V) -> V + Send>;

/// Strategy for reconciling a speculative value with the server's
pub enum ConflictResolution<V> {
    /// Take the server value unchanged
    ServerWins,
    /// Keep the optimistic value
    ClientWins,
    /// Use the resolver if given, otherwise [`ShallowMerge`]
    Merge(Option<Resolver<V>>),
    /// Ask the user; the server value stands in until they decide
    Manual,
}

impl<V> ConflictResolution<V> {
    /// Merge with a custom resolver
    pub fn merge_with<F>(resolver: F) -> Self
    where
        F: FnOnce(&V, &V) -> V + Send + 'static,
    {
        Self::Merge(Some(Box::new(resolver)))
    }

    pub fn strategy_name(&self) -> &'static str {
        match self {
            ConflictResolution::ServerWins => "server_wins",
            ConflictResolution::ClientWins => "client_wins",
            ConflictResolution::Merge(_) => "merge",
            ConflictResolution::Manual => "manual",
        }
    }
}

impl<V> fmt::Debug for ConflictResolution<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictResolution::Merge(resolver) => f
                .debug_tuple("Merge")
                .field(&resolver.as_ref().map(|_| "<resolver>"))
                .finish(),
            other => f.write_str(other.strategy_name()),
        }
    }
}

/// Shallow merge: server fields as base, client fields overlaid
pub trait ShallowMerge: Sized {
    fn shallow_merge(server: &Self, client: &Self) -> Self;
}

impl ShallowMerge for serde_json::Value {
    fn shallow_merge(server: &Self, client: &Self) -> Self {
        match (server, client) {
            (serde_json::Value::Object(server), serde_json::Value::Object(client)) => {
                let mut merged = server.clone();
                for (field, value) in client {
                    merged.insert(field.clone(), value.clone());
                }
                serde_json::Value::Object(merged)
            }
            // Nothing to overlay field by field.
            (_, client) => client.clone(),
        }
    }
}

impl<K, T, S> ShallowMerge for HashMap<K, T, S>
where
    K: Eq + Hash + Clone,
    T: Clone,
    S: std::hash::BuildHasher + Clone,
{
    fn shallow_merge(server: &Self, client: &Self) -> Self {
        let mut merged = server.clone();
        merged.extend(client.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

impl<K: Ord + Clone, T: Clone> ShallowMerge for BTreeMap<K, T> {
    fn shallow_merge(server: &Self, client: &Self) -> Self {
        let mut merged = server.clone();
        merged.extend(client.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// Compute the reconciled value; `manual` yields the server value
pub fn resolve<V>(client: &V, server: V, resolution: ConflictResolution<V>) -> V
where
    V: Clone + ShallowMerge,
{
    match resolution {
        ConflictResolution::ServerWins | ConflictResolution::Manual => server,
        ConflictResolution::ClientWins => client.clone(),
        ConflictResolution::Merge(Some(resolver)) => resolver(client, &server),
        ConflictResolution::Merge(None) => V::shallow_merge(&server, client),
    }
}
