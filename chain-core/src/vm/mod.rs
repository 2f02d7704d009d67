//! The script virtual machine: a deterministic, metered stack interpreter
//! with opcodes that can introspect the enclosing transaction or block.

pub mod context;
pub mod interpreter;
pub mod number;
pub mod opcode;

pub use context::{BlockVmContext, TxVmContext, VmContext};

use crate::block::BlockHeader;
use crate::config::Config;
use crate::error::VmError;
use crate::sighash::SighashCache;
use crate::tx::Transaction;

/// Runs `program` with `arguments[]` pushed bottom-to-top, under a
/// transaction context, strict-vs-lenient determined by `tx.version`
/// against `config.strict_tx_version`.
pub fn execute_tx_input(
    program: &[u8],
    arguments: &[Vec<u8>],
    tx: &Transaction,
    input_index: usize,
    sighash_cache: &SighashCache,
    config: &Config,
) -> Result<(), VmError> {
    let strict = tx.version <= config.strict_tx_version;
    let tx_ctx = TxVmContext::new(tx, input_index, sighash_cache);
    let ctx = VmContext::Tx(tx_ctx);
    interpreter::execute(program, arguments, &ctx, config.run_limit, config.max_nested_predicate_depth, strict)
}

/// Runs the previous block's `consensusProgram` against the current
/// block's header witness, under a block context keyed to that header
/// (`BLOCKSIGHASH` is `H(header without witness)`).
pub fn execute_consensus_program(
    consensus_program: &[u8],
    witness: &[Vec<u8>],
    header: &BlockHeader,
    config: &Config,
) -> Result<(), VmError> {
    let strict = header.version <= config.strict_block_version;
    let block_ctx = BlockVmContext::new(header);
    let ctx = VmContext::Block(block_ctx);
    interpreter::execute(
        consensus_program,
        witness,
        &ctx,
        config.run_limit,
        config.max_nested_predicate_depth,
        strict,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetId;
    use crate::hash::Hash;
    use crate::tx::{AssetAmount, Outpoint, TxInput, TxOutput};
    use ed25519_dalek::{Keypair, SecretKey, Signer};

    fn dummy_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput::Spend {
                source_outpoint: Outpoint {
                    tx_hash: Hash::ZERO,
                    output_index: 0,
                },
                asset_amount: AssetAmount {
                    asset_id: AssetId(Hash::ZERO),
                    amount: 10,
                },
                prev_program: vec![],
                prev_ref_data_hash: Hash::ZERO,
                arguments: vec![],
            }],
            outputs: vec![TxOutput {
                asset_amount: AssetAmount {
                    asset_id: AssetId(Hash::ZERO),
                    amount: 10,
                },
                vm_version: 1,
                control_program: vec![],
                reference_data: vec![],
            }],
            min_time_ms: 0,
            max_time_ms: 0,
            reference_data: vec![],
        }
    }

    #[test]
    fn trivial_true_program_succeeds() {
        let tx = dummy_tx();
        let cache = SighashCache::new(&tx);
        let config = Config::default();
        // OP_1 pushes a truthy value; the program ends with it on top.
        let program = [opcode::OP_1];
        assert!(execute_tx_input(&program, &[], &tx, 0, &cache, &config).is_ok());
    }

    #[test]
    fn empty_program_with_falsy_argument_fails() {
        let tx = dummy_tx();
        let cache = SighashCache::new(&tx);
        let config = Config::default();
        assert!(execute_tx_input(&[], &[vec![0]], &tx, 0, &cache, &config).is_err());
    }

    #[test]
    fn checksig_with_valid_signature_succeeds() {
        let secret = SecretKey::from_bytes(&[7u8; 32]).unwrap();
        let public = ed25519_dalek::PublicKey::from(&secret);
        let keypair = Keypair { secret, public };
        let msg = b"hello chain";
        let sig = keypair.sign(msg);

        let mut program = Vec::new();
        // push sig, push msg, push pubkey, CHECKSIG
        push_data(&mut program, &sig.to_bytes());
        push_data(&mut program, msg);
        push_data(&mut program, keypair.public.as_bytes());
        program.push(opcode::OP_CHECKSIG);

        let tx = dummy_tx();
        let cache = SighashCache::new(&tx);
        let config = Config::default();
        assert!(execute_tx_input(&program, &[], &tx, 0, &cache, &config).is_ok());
    }

    #[test]
    fn multisig_two_of_three_succeeds_with_p1_p3_and_fails_with_p1_p1() {
        let mk = |seed: u8| {
            let secret = SecretKey::from_bytes(&[seed; 32]).unwrap();
            let public = ed25519_dalek::PublicKey::from(&secret);
            Keypair { secret, public }
        };
        let k1 = mk(1);
        let k2 = mk(2);
        let k3 = mk(3);
        let msg = b"quorum message";
        let sig1 = k1.sign(msg);
        let sig3 = k3.sign(msg);

        let build = |sigs: &[&ed25519_dalek::Signature]| {
            let mut program = Vec::new();
            for s in sigs {
                push_data(&mut program, &s.to_bytes());
            }
            push_data(&mut program, &crate::vm::number::ScriptNum(sigs.len() as i64).to_bytes());
            push_data(&mut program, msg);
            push_data(&mut program, k1.public.as_bytes());
            push_data(&mut program, k2.public.as_bytes());
            push_data(&mut program, k3.public.as_bytes());
            push_data(&mut program, &crate::vm::number::ScriptNum(3).to_bytes());
            program.push(opcode::OP_CHECKMULTISIG);
            program
        };

        let tx = dummy_tx();
        let cache = SighashCache::new(&tx);
        let config = Config::default();

        let good = build(&[&sig1, &sig3]);
        assert!(execute_tx_input(&good, &[], &tx, 0, &cache, &config).is_ok());

        let bad = build(&[&sig1, &sig1]);
        assert!(execute_tx_input(&bad, &[], &tx, 0, &cache, &config).is_err());
    }

    fn push_data(program: &mut Vec<u8>, data: &[u8]) {
        assert!(data.len() <= 0x4b, "test helper only supports direct pushes");
        program.push(data.len() as u8);
        program.extend_from_slice(data);
    }
}
