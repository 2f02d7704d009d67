//! A snapshot is the pair `(trie, issuanceMemo)` at a specific height: the
//! trie of unspent output commitments, plus the replay-protection set of
//! issuance-input hashes still inside their `[minTime, maxTime]` window.

use crate::hash::Hash;
use crate::trie::Trie;
use std::collections::HashMap;

/// `Snapshot`: `{ trie, issuanceMemo: set<issuanceWitnessHash until expiry> }`.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub trie: Trie,
    issuance_memo: HashMap<Hash, u64>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_hash(&self) -> Hash {
        self.trie.root_hash()
    }

    pub fn issuance_seen(&self, witness_hash: &Hash) -> bool {
        self.issuance_memo.contains_key(witness_hash)
    }

    /// Records an issuance input's replay-protection identity, expiring at
    /// `max_time_ms`.
    pub fn record_issuance(&mut self, witness_hash: Hash, max_time_ms: u64) {
        self.issuance_memo.insert(witness_hash, max_time_ms);
    }

    /// Drops issuance-memo entries whose window has closed relative to
    /// `block_time_ms`. Called after each commit; safe to call any time.
    pub fn prune_issuance_memo(&mut self, block_time_ms: u64) {
        self.issuance_memo.retain(|_, &mut max_time_ms| block_time_ms <= max_time_ms);
    }

    pub fn issuance_memo_len(&self) -> usize {
        self.issuance_memo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_snapshot_has_empty_memo_and_empty_trie_root() {
        let snap = Snapshot::new();
        assert_eq!(snap.issuance_memo_len(), 0);
        assert!(snap.trie.is_empty());
    }

    #[test]
    fn record_then_seen() {
        let mut snap = Snapshot::new();
        let h = Hash([1u8; 32]);
        assert!(!snap.issuance_seen(&h));
        snap.record_issuance(h, 1000);
        assert!(snap.issuance_seen(&h));
    }

    #[test]
    fn prune_drops_expired_entries_only() {
        let mut snap = Snapshot::new();
        let expired = Hash([1u8; 32]);
        let live = Hash([2u8; 32]);
        snap.record_issuance(expired, 100);
        snap.record_issuance(live, 5000);
        snap.prune_issuance_memo(1000);
        assert!(!snap.issuance_seen(&expired));
        assert!(snap.issuance_seen(&live));
    }
}
