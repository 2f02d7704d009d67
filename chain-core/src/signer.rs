//! The block-signer: validates a proposed block and contributes this
//! node's signature share, refusing to sign a second, different block at a
//! height it already signed (equivocation protection).

use crate::block::{Block, BlockHeader};
use crate::config::Config;
use crate::error::{SignerError, SignerResult};
use crate::snapshot::Snapshot;
use crate::store::Store;
use crate::validator;
use ed25519_dalek::{Keypair, Signer};
use std::sync::Arc;

pub struct BlockSigner {
    store: Arc<dyn Store>,
    keypair: Keypair,
}

impl BlockSigner {
    pub fn new(store: Arc<dyn Store>, keypair: Keypair) -> Self {
        Self { store, keypair }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public.to_bytes()
    }

    /// Validates `block` against `(prev_header, prev_snapshot)`, checks
    /// this signer hasn't already signed a different block at this height,
    /// records the new commitment, and returns this signer's witness-share
    /// signature over `BLOCKSIGHASH(block.header)`.
    pub fn validate_and_sign_block(
        &self,
        prev_header: &BlockHeader,
        prev_snapshot: &Snapshot,
        block: &Block,
        config: &Config,
    ) -> SignerResult<Vec<u8>> {
        let local_height = self.store.block_height().map_err(|e| SignerError::Store(e.to_string()))?;
        let required = block.header.height.saturating_sub(1);
        if local_height != required {
            return Err(SignerError::NotCaughtUp {
                local: local_height,
                required,
            });
        }

        if block.header.consensus_program != prev_header.consensus_program {
            return Err(SignerError::ConsensusProgramChangeForbidden);
        }

        validator::validate_block_contents(prev_header, prev_snapshot, block, config)?;

        let block_hash = block.hash();
        if let Some(_existing) = self
            .store
            .record_signed_block(block.header.height, block_hash)
            .map_err(|e| SignerError::Store(e.to_string()))?
        {
            tracing::warn!(height = block.header.height, "refusing to sign: equivocation");
            return Err(SignerError::Equivocation {
                height: block.header.height,
            });
        }

        let msg = crate::block::block_sighash(&block.header);
        let sig = self.keypair.sign(msg.as_bytes());
        tracing::debug!(height = block.header.height, "signed block witness share");
        Ok(sig.to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use ed25519_dalek::SecretKey;

    fn keypair(seed: u8) -> Keypair {
        let secret = SecretKey::from_bytes(&[seed; 32]).unwrap();
        let public = ed25519_dalek::PublicKey::from(&secret);
        Keypair { secret, public }
    }

    fn genesis_and_next() -> (BlockHeader, Snapshot, Block) {
        let genesis = Block::initial(vec![0x51], 1000);
        let snapshot = Snapshot::new();
        let mut header = genesis.header.clone();
        header.assets_root = snapshot.root_hash();

        let mut next = Block {
            header: header.clone(),
            transactions: vec![],
        };
        next.header.height = 1;
        next.header.previous_block_hash = header.hash();
        next.header.timestamp_ms = 2000;
        next.header.transactions_root = crate::block::merkle_root(&[]);
        next.header.assets_root = snapshot.root_hash();
        next.header.witness = vec![];

        (header, snapshot, next)
    }

    #[test]
    fn signs_valid_next_block() {
        let (prev_header, prev_snapshot, next) = genesis_and_next();
        let store = Arc::new(MemStore::new());
        store.put_block(Block::initial(vec![0x51], 1000)).unwrap();
        let signer = BlockSigner::new(store, keypair(1));

        let sig = signer
            .validate_and_sign_block(&prev_header, &prev_snapshot, &next, &Config::default())
            .unwrap();
        assert!(!sig.is_empty());
    }

    #[test]
    fn refuses_equivocation() {
        let (prev_header, prev_snapshot, next) = genesis_and_next();
        let store = Arc::new(MemStore::new());
        store.put_block(Block::initial(vec![0x51], 1000)).unwrap();
        let signer = BlockSigner::new(store, keypair(1));

        signer
            .validate_and_sign_block(&prev_header, &prev_snapshot, &next, &Config::default())
            .unwrap();

        let mut other = next.clone();
        other.header.timestamp_ms = 3000;
        let err = signer
            .validate_and_sign_block(&prev_header, &prev_snapshot, &other, &Config::default())
            .unwrap_err();
        assert!(matches!(err, SignerError::Equivocation { height: 1 }));
    }

    #[test]
    fn rejects_when_not_caught_up() {
        let (prev_header, prev_snapshot, next) = genesis_and_next();
        let store = Arc::new(MemStore::new()); // no blocks persisted: local height 0, required also 0
        let mut far = next.clone();
        far.header.height = 5;
        let signer = BlockSigner::new(store, keypair(1));
        let err = signer
            .validate_and_sign_block(&prev_header, &prev_snapshot, &far, &Config::default())
            .unwrap_err();
        assert!(matches!(err, SignerError::NotCaughtUp { .. }));
    }
}
