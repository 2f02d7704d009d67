//! Startup recovery: reconstruct the latest snapshot by replaying blocks
//! above the persisted snapshot height, then hand back a ready [`Chain`].
//!
//! This is what makes "persist block, then persist snapshot" tolerable as
//! two non-atomic writes: a crash between them just means recovery redoes
//! a bit of hashing the next time the node starts.

use crate::block::Block;
use crate::chain::Chain;
use crate::config::Config;
use crate::error::{ChainError, ChainResult};
use crate::pool::Pool;
use crate::snapshot::Snapshot;
use crate::store::Store;
use crate::validator;
use std::sync::Arc;

/// Bootstraps `store` with `genesis`/`genesis_snapshot` if it has no block
/// at height 0 yet, otherwise replays `(snapshotHeight, blockHeight]` to
/// catch the snapshot up to the persisted tip. Returns a [`Chain`] at the
/// recovered height.
///
/// Replayed blocks go through [`Chain::commit_block`] like any other
/// commit, rather than writing the snapshot to the store directly: that's
/// what gives every commit — replayed or live — the same height-waiter
/// wakeup, block-callback fan-out, and pool-clean pass, even though during
/// recovery there are no waiters and the pool is empty.
pub async fn recover(
    store: Arc<dyn Store>,
    pool: Arc<dyn Pool>,
    config: Config,
    genesis: Block,
    genesis_snapshot: Snapshot,
) -> ChainResult<Chain> {
    if store.get_block(0)?.is_none() {
        store.put_block(genesis.clone())?;
        store.put_snapshot(0, genesis_snapshot.clone())?;
        tracing::info!("bootstrapped genesis block");
        return Ok(Chain::new(store, pool, config, genesis.header, genesis_snapshot));
    }

    let snapshot_height = store.latest_snapshot_height()?;
    let snapshot = store.get_snapshot(snapshot_height)?.ok_or_else(|| {
        ChainError::Invariant(format!("missing snapshot at recorded height {snapshot_height}"))
    })?;
    let tip_header = store
        .get_block(snapshot_height)?
        .ok_or_else(|| ChainError::Invariant(format!("missing block at snapshot height {snapshot_height}")))?
        .header;

    let block_height = store.block_height()?;
    let chain = Chain::new(store.clone(), pool, config.clone(), tip_header, snapshot);

    for h in (snapshot_height + 1)..=block_height {
        let block = store
            .get_block(h)?
            .ok_or_else(|| ChainError::Invariant(format!("missing block at height {h} during recovery")))?;
        let prev_header = chain.tip_header();
        let prev_snapshot = chain.current_snapshot();
        let new_snapshot = validator::validate_block(&prev_header, &prev_snapshot, &block, &config)
            .map_err(ChainError::BlockInvalid)?;
        chain.commit_block(block, new_snapshot).await?;
    }

    tracing::info!(
        snapshot_height,
        recovered_height = block_height,
        "recovered chain state"
    );
    Ok(chain)
}
