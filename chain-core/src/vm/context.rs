//! The two execution contexts a script can run under: bound to an
//! enclosing transaction (spend/issuance inputs), or bound to an enclosing
//! block header (the consensus program run against `BLOCKSIGHASH`).

use crate::asset::AssetId;
use crate::block::block_sighash;
use crate::error::VmError;
use crate::hash::{blake2b256, Hash};
use crate::sighash::{HashType, SighashCache};
use crate::tx::Transaction;

pub struct TxVmContext<'a> {
    pub tx: &'a Transaction,
    pub input_index: usize,
    pub sighash_cache: &'a SighashCache<'a>,
}

impl<'a> TxVmContext<'a> {
    pub fn new(tx: &'a Transaction, input_index: usize, sighash_cache: &'a SighashCache<'a>) -> Self {
        TxVmContext {
            tx,
            input_index,
            sighash_cache,
        }
    }

    fn input(&self) -> &crate::tx::TxInput {
        &self.tx.inputs[self.input_index]
    }

    pub fn asset_id(&self) -> AssetId {
        self.input().asset_id()
    }

    pub fn amount(&self) -> u64 {
        self.input().amount()
    }

    pub fn program(&self) -> &[u8] {
        self.input().program()
    }

    pub fn min_time_ms(&self) -> u64 {
        self.tx.min_time_ms
    }

    pub fn max_time_ms(&self) -> u64 {
        self.tx.max_time_ms
    }

    pub fn index(&self) -> u64 {
        self.input_index as u64
    }

    pub fn ref_data_hash(&self) -> Hash {
        blake2b256(&[&self.tx.reference_data])
    }

    /// Scans the enclosing transaction's outputs for one whose reference
    /// data hashes to `ref_hash`, whose amount/asset/vm-version/control
    /// program match exactly.
    pub fn find_output(
        &self,
        ref_hash: Hash,
        amount: u64,
        asset: AssetId,
        vm_version: u64,
        program: &[u8],
    ) -> bool {
        self.tx.outputs.iter().any(|out| {
            out.asset_amount.amount == amount
                && out.asset_amount.asset_id == asset
                && out.vm_version == vm_version
                && out.control_program == program
                && blake2b256(&[&out.reference_data]) == ref_hash
        })
    }

    pub fn tx_sighash(&self, hash_type_byte: u8) -> Result<Hash, VmError> {
        let hash_type = HashType::from_byte(hash_type_byte)?;
        Ok(self.sighash_cache.sighash(self.input_index, hash_type))
    }
}

pub struct BlockVmContext<'a> {
    pub header: &'a crate::block::BlockHeader,
}

impl<'a> BlockVmContext<'a> {
    pub fn new(header: &'a crate::block::BlockHeader) -> Self {
        BlockVmContext { header }
    }

    pub fn block_sighash(&self) -> Hash {
        block_sighash(self.header)
    }
}

pub enum VmContext<'a> {
    Tx(TxVmContext<'a>),
    Block(BlockVmContext<'a>),
}
