//! The chain controller: commits blocks atomically, advances height,
//! wakes height waiters, and assembles candidate blocks from the pool.
//!
//! The current snapshot is held behind an `Arc` swapped under a short
//! write lock; readers clone the `Arc` and release the lock immediately,
//! so no reader blocks a concurrent commit and vice versa.

use crate::block::{Block, BlockHeader};
use crate::config::Config;
use crate::error::{ChainError, ChainResult, ValidationError};
use crate::hash::Hash;
use crate::pool::Pool;
use crate::snapshot::Snapshot;
use crate::store::Store;
use crate::tx::Transaction;
use crate::validator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex as AsyncMutex, Notify};

/// A subscriber notified of every committed block, e.g. an indexer or
/// account annotator. Invoked synchronously, in registration order,
/// between the height bump and the pool clean — a callback that blocks
/// delays the commit and every commit after it, so implementations must
/// be non-blocking with respect to their own I/O.
pub trait BlockCallback: Send + Sync {
    fn on_block_committed(&self, block: &Block, snapshot: &Snapshot);
}

pub struct Chain {
    store: Arc<dyn Store>,
    pool: Arc<dyn Pool>,
    config: Config,
    height: AtomicU64,
    snapshot: RwLock<Arc<Snapshot>>,
    tip_header: RwLock<BlockHeader>,
    notify: Notify,
    commit_lock: AsyncMutex<()>,
    callbacks: RwLock<Vec<Arc<dyn BlockCallback>>>,
}

impl Chain {
    /// Builds a controller already caught up to `tip_header`/`tip_snapshot`
    /// (the result of [`crate::recovery::recover`], or a freshly-initialized
    /// chain at the genesis block).
    pub fn new(
        store: Arc<dyn Store>,
        pool: Arc<dyn Pool>,
        config: Config,
        tip_header: BlockHeader,
        tip_snapshot: Snapshot,
    ) -> Self {
        Self {
            store,
            pool,
            config,
            height: AtomicU64::new(tip_header.height),
            snapshot: RwLock::new(Arc::new(tip_snapshot)),
            tip_header: RwLock::new(tip_header),
            notify: Notify::new(),
            commit_lock: AsyncMutex::new(()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Registers `callback` to run on every future commit, after this one.
    /// Registration order is invocation order.
    pub fn register_callback(&self, callback: Arc<dyn BlockCallback>) {
        self.callbacks.write().expect("callbacks lock poisoned").push(callback);
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().expect("snapshot lock poisoned").clone()
    }

    pub fn tip_header(&self) -> BlockHeader {
        self.tip_header.read().expect("tip header lock poisoned").clone()
    }

    /// Commits a block whose validity the caller has already established
    /// via [`validator::validate_block`] (or is re-checking now). Persists
    /// block and snapshot, publishes the new tip, runs registered
    /// [`BlockCallback`]s in registration order, and cleans the pool.
    pub async fn commit_block(&self, block: Block, snapshot_after: Snapshot) -> ChainResult<()> {
        let _guard = self.commit_lock.lock().await;

        self.store.put_block(block.clone())?;
        self.store.put_snapshot(block.header.height, snapshot_after.clone())?;

        let confirmed: Vec<Hash> = block.transactions.iter().map(|tx| tx.id()).collect();
        let conflicting = self.conflicting_against(&snapshot_after, &confirmed, block.header.timestamp_ms);

        {
            let mut snap = self.snapshot.write().expect("snapshot lock poisoned");
            *snap = Arc::new(snapshot_after);
        }
        {
            let mut tip = self.tip_header.write().expect("tip header lock poisoned");
            *tip = block.header.clone();
        }
        self.height.store(block.header.height, Ordering::SeqCst);
        self.notify.notify_waiters();

        let snapshot_for_callbacks = self.current_snapshot();
        for callback in self.callbacks.read().expect("callbacks lock poisoned").iter() {
            callback.on_block_committed(&block, &snapshot_for_callbacks);
        }

        self.pool.clean(&confirmed, &conflicting);
        tracing::info!(
            height = block.header.height,
            transactions = confirmed.len(),
            conflicting = conflicting.len(),
            "committed block"
        );
        Ok(())
    }

    /// Replays the remaining pool against `snapshot`, collecting the ids of
    /// transactions that now fail contextual validation — these, not just
    /// the newly-confirmed ones, are cleaned out by `commit_block`.
    fn conflicting_against(&self, snapshot: &Snapshot, confirmed: &[Hash], block_time_ms: u64) -> Vec<Hash> {
        let mut working = snapshot.clone();
        let mut conflicting = Vec::new();
        for tx in self.pool.dump() {
            let id = tx.id();
            if confirmed.contains(&id) {
                continue;
            }
            match validator::confirm_tx(&working, &tx, block_time_ms, &self.config) {
                Ok(()) => {
                    let _ = validator::apply_tx(&mut working, &tx);
                }
                Err(_) => conflicting.push(id),
            }
        }
        conflicting
    }

    /// Stateless-validates `tx`, rejects if already expired, admits it
    /// idempotently if already known, confirms it against the current
    /// snapshot overlaid with the rest of the pool, and inserts it.
    pub async fn add_tx(&self, tx: Transaction, now_ms: u64) -> ChainResult<()> {
        validator::validate_tx(&tx, &self.config)?;

        if tx.max_time_ms != 0 && tx.max_time_ms < now_ms {
            return Err(ChainError::Expired);
        }

        let id = tx.id();
        if self.pool.contains(&id) {
            return Ok(());
        }

        let snapshot = self.current_snapshot();
        let mut overlay = (*snapshot).clone();
        for pooled in self.pool.dump() {
            let _ = validator::apply_tx(&mut overlay, &pooled);
        }

        match validator::confirm_tx(&overlay, &tx, now_ms, &self.config) {
            Ok(()) => {}
            Err(ValidationError::MissingOutput) => return Err(ChainError::Conflict),
            Err(e) => return Err(ChainError::Validation(e)),
        }

        self.pool
            .insert(tx)
            .map_err(|e| ChainError::Invariant(e.to_string()))
    }

    /// Blocks until `height() >= height`.
    pub async fn wait_for_block(&self, height: u64) {
        loop {
            if self.height() >= height {
                return;
            }
            let notified = self.notify.notified();
            if self.height() >= height {
                return;
            }
            notified.await;
        }
    }

    /// As [`Chain::wait_for_block`], but fails fast if `height` is more
    /// than `config.distant_future_window` past the current tip.
    pub async fn wait_for_block_soon(&self, height: u64) -> ChainResult<()> {
        let current = self.height();
        if height > current + self.config.distant_future_window {
            return Err(ChainError::DistantFuture {
                window: self.config.distant_future_window,
            });
        }
        self.wait_for_block(height).await;
        Ok(())
    }

    /// Drains the pool in topological order, greedily confirming and
    /// applying each transaction against a working copy of the current
    /// snapshot, skipping any that fail (transient pool staleness). Returns
    /// the unsigned candidate block and the snapshot it would produce.
    pub fn generate_block(&self, now_ms: u64) -> (Block, Snapshot) {
        let prev_header = self.tip_header();
        let prev_snapshot = self.current_snapshot();
        let mut working = (*prev_snapshot).clone();
        let mut included = Vec::new();

        for tx in self.pool.dump() {
            if validator::confirm_tx(&working, &tx, now_ms, &self.config).is_err() {
                continue;
            }
            if validator::apply_tx(&mut working, &tx).is_err() {
                continue;
            }
            included.push(tx);
        }
        working.prune_issuance_memo(now_ms);

        let leaves: Vec<Hash> = included.iter().map(|tx| tx.witness_id()).collect();
        let header = BlockHeader {
            version: self.config.strict_block_version,
            height: prev_header.height + 1,
            previous_block_hash: prev_header.hash(),
            timestamp_ms: now_ms,
            transactions_root: crate::block::merkle_root(&leaves),
            assets_root: working.root_hash(),
            consensus_program: prev_header.consensus_program.clone(),
            witness: Vec::new(),
        };

        (
            Block {
                header,
                transactions: included,
            },
            working,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetId;
    use crate::pool::MemPool;
    use crate::store::MemStore;
    use crate::tx::{AssetAmount, TxInput, TxOutput};

    fn test_chain() -> Chain {
        let genesis = Block::initial(vec![0x51], 1000);
        let mut snapshot = Snapshot::new();
        // assets_root over an empty trie matches the genesis header's placeholder.
        snapshot.prune_issuance_memo(0);
        let mut header = genesis.header.clone();
        header.assets_root = snapshot.root_hash();
        Chain::new(
            Arc::new(MemStore::new()),
            Arc::new(MemPool::new()),
            Config::default(),
            header,
            snapshot,
        )
    }

    fn issuance_tx(nonce: u8) -> Transaction {
        let ibh = Hash([1u8; 32]);
        let asset_id = AssetId::compute(&ibh, 1, &[0x51]);
        Transaction {
            version: 1,
            inputs: vec![TxInput::Issuance {
                nonce: vec![nonce],
                min_time_ms: 0,
                max_time_ms: 1_000_000,
                initial_block_hash: ibh,
                vm_version: 1,
                amount: 10,
                issuance_program: vec![0x51],
                asset_definition: vec![],
                arguments: vec![],
            }],
            outputs: vec![TxOutput {
                asset_amount: AssetAmount { asset_id, amount: 10 },
                vm_version: 1,
                control_program: vec![0x51],
                reference_data: vec![],
            }],
            min_time_ms: 0,
            max_time_ms: 1_000_000,
            reference_data: vec![],
        }
    }

    #[tokio::test]
    async fn add_tx_is_idempotent() {
        let chain = test_chain();
        let tx = issuance_tx(1);
        chain.add_tx(tx.clone(), 10).await.unwrap();
        chain.add_tx(tx.clone(), 10).await.unwrap();
        assert_eq!(chain.pool.len(), 1);
    }

    #[tokio::test]
    async fn generate_and_commit_advances_height() {
        let chain = test_chain();
        chain.add_tx(issuance_tx(1), 10).await.unwrap();

        let (mut block, snapshot_after) = chain.generate_block(10);
        block.header.witness = vec![]; // trivial OP_TRUE consensus program needs no witness args
        chain.commit_block(block, snapshot_after).await.unwrap();

        assert_eq!(chain.height(), 1);
        assert_eq!(chain.pool.len(), 0);
    }

    #[tokio::test]
    async fn wait_for_block_unblocks_after_commit() {
        let chain = Arc::new(test_chain());
        chain.add_tx(issuance_tx(1), 10).await.unwrap();
        let (block, snapshot_after) = chain.generate_block(10);

        let waiter = {
            let chain = chain.clone();
            tokio::spawn(async move {
                chain.wait_for_block(1).await;
            })
        };
        chain.commit_block(block, snapshot_after).await.unwrap();
        waiter.await.unwrap();
        assert_eq!(chain.height(), 1);
    }

    #[tokio::test]
    async fn wait_for_block_soon_rejects_distant_future() {
        let chain = test_chain();
        let err = chain.wait_for_block_soon(1000).await.unwrap_err();
        assert!(matches!(err, ChainError::DistantFuture { .. }));
    }

    struct RecordingCallback {
        tag: u8,
        seen: std::sync::Mutex<Vec<(u8, u64)>>,
    }

    impl BlockCallback for RecordingCallback {
        fn on_block_committed(&self, block: &Block, _snapshot: &Snapshot) {
            self.seen.lock().unwrap().push((self.tag, block.header.height));
        }
    }

    #[tokio::test]
    async fn callbacks_run_in_registration_order_after_height_bump() {
        let chain = test_chain();
        chain.add_tx(issuance_tx(1), 10).await.unwrap();
        let (block, snapshot_after) = chain.generate_block(10);

        let first = Arc::new(RecordingCallback { tag: 1, seen: std::sync::Mutex::new(Vec::new()) });
        let second = Arc::new(RecordingCallback { tag: 2, seen: std::sync::Mutex::new(Vec::new()) });
        chain.register_callback(first.clone());
        chain.register_callback(second.clone());

        chain.commit_block(block, snapshot_after).await.unwrap();

        // both callbacks observed the post-bump height.
        assert_eq!(first.seen.lock().unwrap().as_slice(), &[(1, 1)]);
        assert_eq!(second.seen.lock().unwrap().as_slice(), &[(2, 1)]);
    }
}
