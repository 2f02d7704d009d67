//! Persistence contracts the engine consumes: blocks, snapshots, and the
//! signer's equivocation lock. Specified as a trait so tests run against
//! [`MemStore`] while production wires in a durable implementation sharing
//! the same contract.

use crate::block::Block;
use crate::error::{ChainError, ChainResult};
use crate::hash::Hash;
use crate::snapshot::Snapshot;
use std::collections::HashMap;
use std::sync::Mutex;

pub trait Store: Send + Sync {
    fn put_block(&self, block: Block) -> ChainResult<()>;
    fn get_block(&self, height: u64) -> ChainResult<Option<Block>>;
    fn block_height(&self) -> ChainResult<u64>;

    fn put_snapshot(&self, height: u64, snapshot: Snapshot) -> ChainResult<()>;
    fn get_snapshot(&self, height: u64) -> ChainResult<Option<Snapshot>>;
    fn latest_snapshot_height(&self) -> ChainResult<u64>;

    /// Records that this node signed `block_hash` at `height`. Returns the
    /// hash already on record for that height if one exists and differs
    /// (the caller treats that as equivocation); returns `None` on a fresh
    /// record or a matching re-signature (both are success).
    fn record_signed_block(&self, height: u64, block_hash: Hash) -> ChainResult<Option<Hash>>;
}

#[derive(Default)]
struct StoreState {
    blocks: HashMap<u64, Block>,
    snapshots: HashMap<u64, Snapshot>,
    signed_blocks: HashMap<u64, Hash>,
}

/// In-memory [`Store`]. Every write is immediately visible; there is no
/// separate "persisted" vs "in-memory" state, so the crash-recovery tests
/// simulate a crash by simply not calling `put_snapshot` after `put_block`.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<StoreState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn put_block(&self, block: Block) -> ChainResult<()> {
        let mut state = self.state.lock().map_err(|_| ChainError::Store("store mutex poisoned".into()))?;
        state.blocks.insert(block.header.height, block);
        Ok(())
    }

    fn get_block(&self, height: u64) -> ChainResult<Option<Block>> {
        let state = self.state.lock().map_err(|_| ChainError::Store("store mutex poisoned".into()))?;
        Ok(state.blocks.get(&height).cloned())
    }

    fn block_height(&self) -> ChainResult<u64> {
        let state = self.state.lock().map_err(|_| ChainError::Store("store mutex poisoned".into()))?;
        Ok(state.blocks.keys().copied().max().unwrap_or(0))
    }

    fn put_snapshot(&self, height: u64, snapshot: Snapshot) -> ChainResult<()> {
        let mut state = self.state.lock().map_err(|_| ChainError::Store("store mutex poisoned".into()))?;
        state.snapshots.insert(height, snapshot);
        Ok(())
    }

    fn get_snapshot(&self, height: u64) -> ChainResult<Option<Snapshot>> {
        let state = self.state.lock().map_err(|_| ChainError::Store("store mutex poisoned".into()))?;
        Ok(state.snapshots.get(&height).cloned())
    }

    fn latest_snapshot_height(&self) -> ChainResult<u64> {
        let state = self.state.lock().map_err(|_| ChainError::Store("store mutex poisoned".into()))?;
        Ok(state.snapshots.keys().copied().max().unwrap_or(0))
    }

    fn record_signed_block(&self, height: u64, block_hash: Hash) -> ChainResult<Option<Hash>> {
        let mut state = self.state.lock().map_err(|_| ChainError::Store("store mutex poisoned".into()))?;
        match state.signed_blocks.get(&height) {
            Some(existing) if *existing != block_hash => Ok(Some(*existing)),
            Some(_) => Ok(None),
            None => {
                state.signed_blocks.insert(height, block_hash);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_block_roundtrips() {
        let store = MemStore::new();
        let block = Block::initial(vec![0x51], 1000);
        store.put_block(block.clone()).unwrap();
        assert_eq!(store.get_block(0).unwrap(), Some(block));
        assert_eq!(store.block_height().unwrap(), 0);
    }

    #[test]
    fn record_signed_block_detects_equivocation() {
        let store = MemStore::new();
        let h1 = Hash([1u8; 32]);
        let h2 = Hash([2u8; 32]);
        assert_eq!(store.record_signed_block(2, h1).unwrap(), None);
        assert_eq!(store.record_signed_block(2, h1).unwrap(), None); // idempotent re-sign
        assert_eq!(store.record_signed_block(2, h2).unwrap(), Some(h1));
    }
}
