//! The generator: on the leader, drains the pool into a candidate block,
//! coordinates with local and remote signers in parallel, assembles the
//! quorum witness, and commits.

use crate::block::Block;
use crate::chain::Chain;
use crate::config::Config;
use crate::error::{GeneratorError, GeneratorResult};
use crate::signer::BlockSigner;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A federation signer reachable over RPC. `chain-rpc` provides the
/// jsonrpsee-backed implementation; tests can use an in-process fake.
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    fn public_key(&self) -> [u8; 32];
    async fn sign_block(&self, block: &Block) -> GeneratorResult<Vec<u8>>;
}

pub struct Generator {
    chain: Arc<Chain>,
    local_signer: Option<Arc<BlockSigner>>,
    remote_signers: Vec<Arc<dyn RemoteSigner>>,
    config: Config,
}

impl Generator {
    pub fn new(
        chain: Arc<Chain>,
        local_signer: Option<Arc<BlockSigner>>,
        remote_signers: Vec<Arc<dyn RemoteSigner>>,
        config: Config,
    ) -> Self {
        Self {
            chain,
            local_signer,
            remote_signers,
            config,
        }
    }

    /// Builds a candidate block, collects witness shares up to quorum
    /// (bounded by `deadline`), validates the assembled witness, and
    /// commits. Returns `Ok(None)` if the pool was empty and policy skips
    /// emitting an empty block — this implementation always emits, so the
    /// only `None` path is reserved for future policy changes.
    pub async fn tick(&self, now_ms: u64, deadline: Duration) -> GeneratorResult<Block> {
        let (mut block, snapshot_after) = self.chain.generate_block(now_ms);
        let prev_header = self.chain.tip_header();
        let prev_snapshot = self.chain.current_snapshot();

        let pubkeys = &self.config.federation_pubkeys;
        let mut witness: Vec<Vec<u8>> = vec![Vec::new(); pubkeys.len()];
        let mut collected = 0usize;

        if let Some(local) = &self.local_signer {
            if let Some(idx) = pubkeys.iter().position(|pk| pk.as_slice() == local.public_key().as_slice()) {
                let sig = local.validate_and_sign_block(&prev_header, &prev_snapshot, &block, &self.config)?;
                witness[idx] = sig;
                collected += 1;
            }
        }

        if collected < self.config.federation_quorum {
            let (tx, mut rx) = tokio::sync::mpsc::channel::<(usize, Vec<u8>)>(pubkeys.len().max(1));
            for remote in &self.remote_signers {
                let Some(idx) = pubkeys.iter().position(|pk| pk.as_slice() == remote.public_key().as_slice()) else {
                    continue;
                };
                let remote = remote.clone();
                let block_clone = block.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Ok(sig) = remote.sign_block(&block_clone).await {
                        let _ = tx.send((idx, sig)).await;
                    }
                });
            }
            drop(tx);

            let _ = tokio::time::timeout(deadline, async {
                while collected < self.config.federation_quorum {
                    match rx.recv().await {
                        Some((idx, sig)) => {
                            witness[idx] = sig;
                            collected += 1;
                        }
                        None => break,
                    }
                }
            })
            .await;
        }

        if collected < self.config.federation_quorum {
            tracing::warn!(
                height = block.header.height,
                collected,
                required = self.config.federation_quorum,
                "quorum not reached before deadline"
            );
            return Err(GeneratorError::QuorumNotReached {
                required: self.config.federation_quorum,
                collected,
            });
        }

        block.header.witness = witness;

        crate::vm::execute_consensus_program(
            &prev_header.consensus_program,
            &block.header.witness,
            &block.header,
            &self.config,
        )
        .map_err(|_| GeneratorError::WitnessInvalid)?;

        self.chain.commit_block(block.clone(), snapshot_after).await?;
        tracing::info!(height = block.header.height, collected, "generated and committed block");

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::MemPool;
    use crate::snapshot::Snapshot;
    use crate::store::MemStore;
    use ed25519_dalek::{Keypair, SecretKey};

    fn keypair(seed: u8) -> Keypair {
        let secret = SecretKey::from_bytes(&[seed; 32]).unwrap();
        let public = ed25519_dalek::PublicKey::from(&secret);
        Keypair { secret, public }
    }

    fn test_setup(quorum: usize, pubkeys: Vec<Vec<u8>>) -> (Arc<Chain>, Config) {
        let genesis = Block::initial(vec![0x51], 1000); // OP_TRUE: single-signer-equivalent test program
        let snapshot = Snapshot::new();
        let mut header = genesis.header.clone();
        header.assets_root = snapshot.root_hash();

        let config = Config {
            federation_pubkeys: pubkeys,
            federation_quorum: quorum,
            ..Config::default()
        };

        let chain = Arc::new(Chain::new(
            Arc::new(MemStore::new()),
            Arc::new(MemPool::new()),
            config.clone(),
            header,
            snapshot,
        ));
        (chain, config)
    }

    #[tokio::test]
    async fn tick_with_local_signer_only_commits_empty_block() {
        let k1 = keypair(1);
        let pubkeys = vec![k1.public.to_bytes().to_vec()];
        let (chain, config) = test_setup(1, pubkeys);

        let store = Arc::new(MemStore::new());
        store.put_block(Block::initial(vec![0x51], 1000)).unwrap();
        let local = Arc::new(BlockSigner::new(store, k1));

        let generator = Generator::new(chain.clone(), Some(local), vec![], config);
        let block = generator.tick(2000, Duration::from_millis(100)).await.unwrap();

        assert_eq!(block.header.height, 1);
        assert_eq!(chain.height(), 1);
    }

    #[tokio::test]
    async fn tick_fails_quorum_with_no_signers() {
        let pubkeys = vec![vec![9u8; 32]];
        let (chain, config) = test_setup(1, pubkeys);
        let generator = Generator::new(chain, None, vec![], config);
        let err = generator
            .tick(2000, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::QuorumNotReached { .. }));
    }
}
