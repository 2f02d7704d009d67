//! Transaction data model and canonical wire serialization.
//!
//! Two IDs are derived from a transaction: the witness-free [`Transaction::id`]
//! used for spend references, and the witness-inclusive
//! [`Transaction::witness_id`] that is the leaf hashed into a block's
//! `transactionsRoot`.

use crate::asset::AssetId;
use crate::hash::{blake2b256, Hash};
use crate::wire::{Reader, Writer};
use serde::{Deserialize, Serialize};

/// `serFlags` selecting which wire form a transaction is encoded in.
/// `0x07` ("full") carries witness, prevouts, and metadata in full; it is
/// the only form this engine ever writes, and the only one it reads.
pub const SER_FLAGS_FULL: u8 = 0x07;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct Outpoint {
    pub tx_hash: Hash,
    pub output_index: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AssetAmount {
    pub asset_id: AssetId,
    pub amount: u64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum TxInput {
    Issuance {
        nonce: Vec<u8>,
        min_time_ms: u64,
        max_time_ms: u64,
        initial_block_hash: Hash,
        vm_version: u64,
        amount: u64,
        issuance_program: Vec<u8>,
        asset_definition: Vec<u8>,
        arguments: Vec<Vec<u8>>,
    },
    Spend {
        source_outpoint: Outpoint,
        asset_amount: AssetAmount,
        prev_program: Vec<u8>,
        /// `Blake2b(referenceData)` of the output being spent, carried so
        /// the full output commitment — and so the trie key and leaf — can
        /// be reconstructed without re-transmitting the original output's
        /// reference data.
        prev_ref_data_hash: Hash,
        arguments: Vec<Vec<u8>>,
    },
}

impl TxInput {
    pub fn arguments(&self) -> &[Vec<u8>] {
        match self {
            TxInput::Issuance { arguments, .. } => arguments,
            TxInput::Spend { arguments, .. } => arguments,
        }
    }

    pub fn asset_id(&self) -> AssetId {
        match self {
            TxInput::Issuance {
                initial_block_hash,
                vm_version,
                issuance_program,
                ..
            } => AssetId::compute(initial_block_hash, *vm_version, issuance_program),
            TxInput::Spend { asset_amount, .. } => asset_amount.asset_id,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            TxInput::Issuance { amount, .. } => *amount,
            TxInput::Spend { asset_amount, .. } => asset_amount.amount,
        }
    }

    /// The program this input's witness is run against: the issuance
    /// program for issuance inputs, the previous output's control program
    /// for spend inputs.
    pub fn program(&self) -> &[u8] {
        match self {
            TxInput::Issuance { issuance_program, .. } => issuance_program,
            TxInput::Spend { prev_program, .. } => prev_program,
        }
    }

    pub fn is_issuance(&self) -> bool {
        matches!(self, TxInput::Issuance { .. })
    }

    /// The spent output's `(outpoint, prevProgram, assetAmount,
    /// refDataHash)`, reconstructing the trie key/leaf it must match.
    /// `None` for issuance inputs, which spend nothing.
    pub fn spent_output_record(&self) -> Option<crate::output_record::OutputRecord> {
        match self {
            TxInput::Spend {
                source_outpoint,
                asset_amount,
                prev_program,
                prev_ref_data_hash,
                ..
            } => Some(crate::output_record::OutputRecord {
                outpoint: *source_outpoint,
                control_program: prev_program.clone(),
                asset_amount_asset_id: asset_amount.asset_id,
                asset_amount_amount: asset_amount.amount,
                ref_data_hash: *prev_ref_data_hash,
            }),
            TxInput::Issuance { .. } => None,
        }
    }

    /// Replay-protection identity for an issuance input:
    /// `H(nonce, assetID, minTime, maxTime, issuanceProgram)`.
    pub fn issuance_witness_hash(&self) -> Option<Hash> {
        match self {
            TxInput::Issuance {
                nonce,
                min_time_ms,
                max_time_ms,
                issuance_program,
                ..
            } => {
                let asset_id = self.asset_id();
                Some(blake2b256(&[
                    nonce,
                    asset_id.0.as_bytes(),
                    &min_time_ms.to_le_bytes(),
                    &max_time_ms.to_le_bytes(),
                    issuance_program,
                ]))
            }
            TxInput::Spend { .. } => None,
        }
    }

    fn encode_no_witness(&self, w: &mut Writer) {
        match self {
            TxInput::Issuance {
                nonce,
                min_time_ms,
                max_time_ms,
                initial_block_hash,
                vm_version,
                amount,
                issuance_program,
                asset_definition,
                ..
            } => {
                w.write_u8(0); // input type tag: issuance
                w.write_lp_bytes(nonce);
                w.write_varuint(*min_time_ms);
                w.write_varuint(*max_time_ms);
                w.write_hash(initial_block_hash);
                w.write_varuint(*vm_version);
                w.write_varuint(*amount);
                w.write_lp_bytes(issuance_program);
                w.write_lp_bytes(asset_definition);
            }
            TxInput::Spend {
                source_outpoint,
                asset_amount,
                prev_program,
                prev_ref_data_hash,
                ..
            } => {
                w.write_u8(1); // input type tag: spend
                w.write_hash(&source_outpoint.tx_hash);
                w.write_varuint(source_outpoint.output_index as u64);
                w.write_hash(&asset_amount.asset_id.0);
                w.write_varuint(asset_amount.amount);
                w.write_lp_bytes(prev_program);
                w.write_hash(prev_ref_data_hash);
            }
        }
    }

    fn encode_witness(&self, w: &mut Writer) {
        let args = self.arguments();
        w.write_varuint(args.len() as u64);
        for arg in args {
            w.write_lp_bytes(arg);
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct TxOutput {
    pub asset_amount: AssetAmount,
    pub vm_version: u64,
    pub control_program: Vec<u8>,
    pub reference_data: Vec<u8>,
}

impl TxOutput {
    /// Unspendable outputs (control program begins with `OP_FAIL`) are
    /// never inserted into the trie by `ApplyTx`.
    pub fn is_unspendable(&self) -> bool {
        self.control_program
            .first()
            .map(|&b| b == crate::vm::opcode::OP_FAIL)
            .unwrap_or(false)
    }

    fn encode(&self, w: &mut Writer) {
        w.write_hash(&self.asset_amount.asset_id.0);
        w.write_varuint(self.asset_amount.amount);
        w.write_varuint(self.vm_version);
        w.write_lp_bytes(&self.control_program);
        w.write_lp_bytes(&self.reference_data);
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Transaction {
    pub version: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub min_time_ms: u64,
    pub max_time_ms: u64,
    pub reference_data: Vec<u8>,
}

impl Transaction {
    fn encode_body_no_witness(&self, w: &mut Writer, reference_data_hash_only: bool) {
        w.write_varuint(self.version);
        w.write_varuint(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode_no_witness(w);
        }
        w.write_varuint(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(w);
        }
        w.write_varuint(self.min_time_ms);
        w.write_varuint(self.max_time_ms);
        if reference_data_hash_only {
            w.write_hash(&blake2b256(&[&self.reference_data]));
        } else {
            w.write_lp_bytes(&self.reference_data);
        }
    }

    /// The witness-free transaction ID: stable across witness changes, used
    /// to name outputs for spending.
    pub fn id(&self) -> Hash {
        let mut w = Writer::new();
        self.encode_body_no_witness(&mut w, true);
        blake2b256(&[&w.into_bytes()])
    }

    /// The witness-inclusive ID hashed into a block's `transactionsRoot`.
    pub fn witness_id(&self) -> Hash {
        let id = self.id();
        let mut w = Writer::new();
        w.write_hash(&id);
        for input in &self.inputs {
            let mut iw = Writer::new();
            input.encode_witness(&mut iw);
            w.write_hash(&blake2b256(&[&iw.into_bytes()]));
        }
        w.write_hash(&blake2b256(&[&self.reference_data]));
        blake2b256(&[&w.into_bytes()])
    }

    /// Full canonical wire encoding (`serFlags == 0x07`): witness, prevouts
    /// and reference data all present in full.
    pub fn encode_full(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u8(SER_FLAGS_FULL);
        w.write_varuint(self.version);
        w.write_varuint(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode_no_witness(&mut w);
            input.encode_witness(&mut w);
        }
        w.write_varuint(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(&mut w);
        }
        w.write_varuint(self.min_time_ms);
        w.write_varuint(self.max_time_ms);
        w.write_lp_bytes(&self.reference_data);
        w.into_bytes()
    }

    pub fn decode_full(bytes: &[u8]) -> Result<Self, crate::wire::WireError> {
        use crate::wire::WireError;
        let mut r = Reader::new(bytes);
        let ser_flags = r.read_u8()?;
        if ser_flags != SER_FLAGS_FULL {
            return Err(WireError::Eof); // only the canonical full form is supported
        }
        let version = r.read_varuint()?;
        let n_inputs = r.read_varuint()?;
        let mut inputs = Vec::with_capacity(n_inputs as usize);
        for _ in 0..n_inputs {
            let tag = r.read_u8()?;
            let input = match tag {
                0 => {
                    let nonce = r.read_lp_bytes()?;
                    let min_time_ms = r.read_varuint()?;
                    let max_time_ms = r.read_varuint()?;
                    let initial_block_hash = r.read_hash()?;
                    let vm_version = r.read_varuint()?;
                    let amount = r.read_varuint()?;
                    let issuance_program = r.read_lp_bytes()?;
                    let asset_definition = r.read_lp_bytes()?;
                    let n_args = r.read_varuint()?;
                    let mut arguments = Vec::with_capacity(n_args as usize);
                    for _ in 0..n_args {
                        arguments.push(r.read_lp_bytes()?);
                    }
                    TxInput::Issuance {
                        nonce,
                        min_time_ms,
                        max_time_ms,
                        initial_block_hash,
                        vm_version,
                        amount,
                        issuance_program,
                        asset_definition,
                        arguments,
                    }
                }
                1 => {
                    let tx_hash = r.read_hash()?;
                    let output_index = r.read_varuint()? as u32;
                    let asset_id = AssetId(r.read_hash()?);
                    let amount = r.read_varuint()?;
                    let prev_program = r.read_lp_bytes()?;
                    let prev_ref_data_hash = r.read_hash()?;
                    let n_args = r.read_varuint()?;
                    let mut arguments = Vec::with_capacity(n_args as usize);
                    for _ in 0..n_args {
                        arguments.push(r.read_lp_bytes()?);
                    }
                    TxInput::Spend {
                        source_outpoint: Outpoint {
                            tx_hash,
                            output_index,
                        },
                        asset_amount: AssetAmount { asset_id, amount },
                        prev_program,
                        prev_ref_data_hash,
                        arguments,
                    }
                }
                _ => return Err(WireError::Eof),
            };
            inputs.push(input);
        }
        let n_outputs = r.read_varuint()?;
        let mut outputs = Vec::with_capacity(n_outputs as usize);
        for _ in 0..n_outputs {
            let asset_id = AssetId(r.read_hash()?);
            let amount = r.read_varuint()?;
            let vm_version = r.read_varuint()?;
            let control_program = r.read_lp_bytes()?;
            let reference_data = r.read_lp_bytes()?;
            outputs.push(TxOutput {
                asset_amount: AssetAmount { asset_id, amount },
                vm_version,
                control_program,
                reference_data,
            });
        }
        let min_time_ms = r.read_varuint()?;
        let max_time_ms = r.read_varuint()?;
        let reference_data = r.read_lp_bytes()?;
        r.finish()?;
        Ok(Transaction {
            version,
            inputs,
            outputs,
            min_time_ms,
            max_time_ms,
            reference_data,
        })
    }
}
