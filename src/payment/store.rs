//! Used-proof store for replay protection.
//!
//! A proof enters the store when verification of it begins (a reservation)
//! and stays only if the verifier admits the request. The store is the only
//! shared mutable state of the gate, so `insert_if_absent` must be atomic:
//! a separate check followed by an insert would let two concurrent requests
//! with the same proof both pass.

use crate::payment::proof::ProofToken;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of proofs that are reserved or spent.
///
/// Methods are synchronous so a reservation can be released from `Drop`.
/// Durable or shared implementations (for multi-instance deployments) must
/// provide the same atomic insert-if-absent semantics.
pub trait ProofStore: Send + Sync {
    /// Whether `proof` is reserved or spent.
    fn contains(&self, proof: &ProofToken) -> bool;

    /// Insert `proof` if it is absent. Returns `true` if it was inserted.
    fn insert_if_absent(&self, proof: ProofToken) -> bool;

    /// Remove `proof`. Returns `true` if it was present.
    fn remove(&self, proof: &ProofToken) -> bool;

    /// Current counters, for monitoring.
    fn stats(&self) -> StoreStats;
}

/// Store statistics for monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    /// Proofs currently reserved or spent.
    pub entries: u64,
    /// Successful insertions.
    pub insertions: u64,
    /// Insertions refused because the proof was already present.
    pub conflicts: u64,
    /// Entries removed again.
    pub removals: u64,
}

/// Process-local used-proof store.
///
/// Lives only as long as the process: proofs spent before a restart can be
/// replayed after it, and separate processes do not see each other's
/// entries. Entries are never pruned.
#[derive(Clone, Default)]
pub struct InMemoryProofStore {
    inner: Arc<Mutex<HashSet<ProofToken>>>,
    stats: Arc<Mutex<StoreStats>>,
}

impl InMemoryProofStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reserved or spent proofs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl ProofStore for InMemoryProofStore {
    fn contains(&self, proof: &ProofToken) -> bool {
        self.inner.lock().contains(proof)
    }

    fn insert_if_absent(&self, proof: ProofToken) -> bool {
        let inserted = self.inner.lock().insert(proof);

        let mut stats = self.stats.lock();
        if inserted {
            stats.insertions += 1;
        } else {
            stats.conflicts += 1;
        }

        inserted
    }

    fn remove(&self, proof: &ProofToken) -> bool {
        let removed = self.inner.lock().remove(proof);
        if removed {
            self.stats.lock().removals += 1;
        }
        removed
    }

    fn stats(&self) -> StoreStats {
        let entries = self.inner.lock().len() as u64;
        StoreStats {
            entries,
            ..self.stats.lock().clone()
        }
    }
}
