//! The canonical commitment for an unspent output: what the Patricia trie
//! actually stores. The trie key is the SHA-3 of this commitment; the trie
//! value is a Blake2b hash of the same commitment.

use crate::asset::AssetId;
use crate::hash::{blake2b256, sha3_256, Hash};
use crate::tx::Outpoint;
use crate::wire::Writer;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OutputRecord {
    pub outpoint: Outpoint,
    pub control_program: Vec<u8>,
    pub asset_amount_asset_id: AssetId,
    pub asset_amount_amount: u64,
    pub ref_data_hash: Hash,
}

impl OutputRecord {
    pub fn new(
        outpoint: Outpoint,
        control_program: Vec<u8>,
        asset_id: AssetId,
        amount: u64,
        reference_data: &[u8],
    ) -> Self {
        Self {
            outpoint,
            control_program,
            asset_amount_asset_id: asset_id,
            asset_amount_amount: amount,
            ref_data_hash: blake2b256(&[reference_data]),
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_hash(&self.outpoint.tx_hash);
        w.write_varuint(self.outpoint.output_index as u64);
        w.write_lp_bytes(&self.control_program);
        w.write_hash(&self.asset_amount_asset_id.0);
        w.write_varuint(self.asset_amount_amount);
        w.write_hash(&self.ref_data_hash);
        w.into_bytes()
    }

    /// The trie key: `SHA3(commitment)`.
    pub fn trie_key(&self) -> Hash {
        sha3_256(&[&self.encode()])
    }

    /// The trie value: `Blake2b(commitment)`.
    pub fn trie_value_hash(&self) -> Hash {
        blake2b256(&[&self.encode()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trie_key_and_value_are_deterministic_and_distinct() {
        let outpoint = Outpoint {
            tx_hash: Hash([1u8; 32]),
            output_index: 0,
        };
        let rec = OutputRecord::new(outpoint, vec![0x51], AssetId(Hash([2u8; 32])), 10, b"");
        let rec2 = OutputRecord::new(outpoint, vec![0x51], AssetId(Hash([2u8; 32])), 10, b"");
        assert_eq!(rec.trie_key(), rec2.trie_key());
        assert_eq!(rec.trie_value_hash(), rec2.trie_value_hash());
        assert_ne!(rec.trie_key(), rec.trie_value_hash());
    }

    #[test]
    fn differs_on_control_program() {
        let outpoint = Outpoint {
            tx_hash: Hash([1u8; 32]),
            output_index: 0,
        };
        let a = OutputRecord::new(outpoint, vec![0x51], AssetId(Hash([2u8; 32])), 10, b"");
        let b = OutputRecord::new(outpoint, vec![0x52], AssetId(Hash([2u8; 32])), 10, b"");
        assert_ne!(a.trie_key(), b.trie_key());
    }
}
