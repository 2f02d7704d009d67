//! Block header and body, the transactions-root Merkle tree, and the
//! block-sighash the consensus program's witness must satisfy.

use crate::hash::{blake2b256, Hash};
use crate::tx::Transaction;
use crate::wire::{Reader, Writer};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct BlockHeader {
    pub version: u64,
    pub height: u64,
    pub previous_block_hash: Hash,
    pub timestamp_ms: u64,
    pub transactions_root: Hash,
    pub assets_root: Hash,
    pub consensus_program: Vec<u8>,
    pub witness: Vec<Vec<u8>>,
}

impl BlockHeader {
    fn encode(&self, w: &mut Writer, with_witness: bool) {
        w.write_varuint(self.version);
        w.write_varuint(self.height);
        w.write_hash(&self.previous_block_hash);
        w.write_varuint(self.timestamp_ms);
        w.write_hash(&self.transactions_root);
        w.write_hash(&self.assets_root);
        w.write_lp_bytes(&self.consensus_program);
        if with_witness {
            w.write_varuint(self.witness.len() as u64);
            for item in &self.witness {
                w.write_lp_bytes(item);
            }
        }
    }

    /// The hash identifying this header, including its witness. Used as
    /// `previousBlockHash` by the next block.
    pub fn hash(&self) -> Hash {
        let mut w = Writer::new();
        self.encode(&mut w, true);
        blake2b256(&[&w.into_bytes()])
    }
}

/// `H(block header without witness)`: the message the federation's
/// consensus-program witness must satisfy (the `BLOCKSIGHASH` opcode's
/// result).
pub fn block_sighash(header: &BlockHeader) -> Hash {
    let mut w = Writer::new();
    header.encode(&mut w, false);
    blake2b256(&[&w.into_bytes()])
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Builds the height-0 initial block: empty transactions, empty
    /// witness, `consensusProgram` encoding the federation's M-of-N
    /// multisig policy.
    pub fn initial(consensus_program: Vec<u8>, timestamp_ms: u64) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                height: 0,
                previous_block_hash: Hash::ZERO,
                timestamp_ms,
                transactions_root: merkle_root(&[]),
                assets_root: Hash::ZERO, // caller fills in once the initial snapshot is applied
                consensus_program,
                witness: vec![],
            },
            transactions: vec![],
        }
    }

    pub fn recompute_transactions_root(&self) -> Hash {
        let leaves: Vec<Hash> = self.transactions.iter().map(|tx| tx.witness_id()).collect();
        merkle_root(&leaves)
    }

    pub fn encode_full(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.header.encode(&mut w, true);
        w.write_varuint(self.transactions.len() as u64);
        for tx in &self.transactions {
            w.write_lp_bytes(&tx.encode_full());
        }
        w.into_bytes()
    }

    pub fn decode_full(bytes: &[u8]) -> Result<Self, crate::wire::WireError> {
        use crate::wire::WireError;
        let mut r = Reader::new(bytes);
        let version = r.read_varuint()?;
        let height = r.read_varuint()?;
        let previous_block_hash = r.read_hash()?;
        let timestamp_ms = r.read_varuint()?;
        let transactions_root = r.read_hash()?;
        let assets_root = r.read_hash()?;
        let consensus_program = r.read_lp_bytes()?;
        let n_witness = r.read_varuint()?;
        let mut witness = Vec::with_capacity(n_witness as usize);
        for _ in 0..n_witness {
            witness.push(r.read_lp_bytes()?);
        }
        let n_txs = r.read_varuint()?;
        let mut transactions = Vec::with_capacity(n_txs as usize);
        for _ in 0..n_txs {
            let tx_bytes = r.read_lp_bytes()?;
            transactions.push(Transaction::decode_full(&tx_bytes).map_err(|_| WireError::Eof)?);
        }
        r.finish()?;
        Ok(Block {
            header: BlockHeader {
                version,
                height,
                previous_block_hash,
                timestamp_ms,
                transactions_root,
                assets_root,
                consensus_program,
                witness,
            },
            transactions,
        })
    }
}

/// Binary Merkle root over `leaves`. An empty tree's root is `H("")`; a
/// single-leaf tree's root is that leaf; an odd level duplicates its last
/// node before pairing, matching the common UTXO-chain convention.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return blake2b256(&[&[]]);
    }
    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| blake2b256(&[pair[0].as_bytes(), pair[1].as_bytes()]))
            .collect();
    }
    level[0]
}
