//! Transaction and block validation: structural (stateless) checks, the
//! contextual checks a snapshot makes possible, applying a transaction's
//! effect to a snapshot, and the block-level aggregation of all three.

use crate::asset::AssetId;
use crate::block::{Block, BlockHeader};
use crate::config::Config;
use crate::error::{ValidationError, ValidationResult};
use crate::sighash::SighashCache;
use crate::snapshot::Snapshot;
use crate::tx::Transaction;
use std::collections::{HashMap, HashSet};

/// Structural checks plus script execution. Does not touch a snapshot.
pub fn validate_tx(tx: &Transaction, config: &Config) -> ValidationResult<()> {
    if tx.inputs.is_empty() {
        return Err(ValidationError::NoInputs);
    }
    if tx.max_time_ms != 0 && tx.max_time_ms < tx.min_time_ms {
        return Err(ValidationError::TimeRangeInverted);
    }

    let mut seen_outpoints = HashSet::new();
    for input in &tx.inputs {
        if let Some(record) = input.spent_output_record() {
            if !seen_outpoints.insert(record.outpoint) {
                return Err(ValidationError::DuplicateOutpoint);
            }
        }
    }

    check_balance(tx)?;

    let cache = SighashCache::new(tx);
    for (i, input) in tx.inputs.iter().enumerate() {
        crate::vm::execute_tx_input(input.program(), input.arguments(), tx, i, &cache, config)
            .map_err(ValidationError::WitnessFailed)?;
    }
    Ok(())
}

/// Inputs and outputs balance per asset, with the legacy "wildcard-amount"
/// issuance exception: at most one issuance input of amount 0 per asset,
/// whose amount is inferred from the output total.
fn check_balance(tx: &Transaction) -> ValidationResult<()> {
    let mut input_sums: HashMap<AssetId, u64> = HashMap::new();
    let mut wildcards: HashMap<AssetId, u32> = HashMap::new();
    for input in &tx.inputs {
        let asset = input.asset_id();
        let amount = input.amount();
        if input.is_issuance() && amount == 0 {
            *wildcards.entry(asset).or_insert(0) += 1;
        } else {
            *input_sums.entry(asset).or_insert(0) += amount;
        }
    }

    let mut output_sums: HashMap<AssetId, u64> = HashMap::new();
    for output in &tx.outputs {
        *output_sums.entry(output.asset_amount.asset_id).or_insert(0) += output.asset_amount.amount;
    }

    let all_assets: HashSet<AssetId> = input_sums
        .keys()
        .chain(output_sums.keys())
        .chain(wildcards.keys())
        .copied()
        .collect();

    for asset in all_assets {
        let in_sum = input_sums.get(&asset).copied().unwrap_or(0);
        let out_sum = output_sums.get(&asset).copied().unwrap_or(0);
        match wildcards.get(&asset).copied().unwrap_or(0) {
            0 => {
                if in_sum != out_sum {
                    return Err(ValidationError::Unbalanced);
                }
            }
            1 => {
                if in_sum > out_sum {
                    return Err(ValidationError::Unbalanced);
                }
            }
            _ => return Err(ValidationError::Unbalanced),
        }
    }
    Ok(())
}

/// Checks a transaction against a snapshot at `block_time_ms`: time window,
/// spend inputs present in the trie, issuance inputs not replayed and
/// within the configured issuance window.
pub fn confirm_tx(
    snapshot: &Snapshot,
    tx: &Transaction,
    block_time_ms: u64,
    config: &Config,
) -> ValidationResult<()> {
    if block_time_ms < tx.min_time_ms || (tx.max_time_ms != 0 && block_time_ms > tx.max_time_ms) {
        return Err(ValidationError::OutsideTimeWindow {
            block_time_ms,
            min_time_ms: tx.min_time_ms,
            max_time_ms: tx.max_time_ms,
        });
    }

    for input in &tx.inputs {
        if let Some(record) = input.spent_output_record() {
            match snapshot.trie.lookup(&record.trie_key()) {
                Some(value_hash) if value_hash == record.trie_value_hash() => {}
                _ => return Err(ValidationError::MissingOutput),
            }
        }
    }

    let has_issuance = tx.inputs.iter().any(|i| i.is_issuance());
    if has_issuance {
        if tx.max_time_ms == 0 || tx.max_time_ms - tx.min_time_ms > config.max_issuance_window_ms {
            return Err(ValidationError::IssuanceWindowTooWide);
        }
        for input in &tx.inputs {
            if let Some(wh) = input.issuance_witness_hash() {
                if snapshot.issuance_seen(&wh) {
                    return Err(ValidationError::IssuanceReplay);
                }
            }
        }
    }

    Ok(())
}

/// Applies a confirmed transaction's effect: removes spent leaves, inserts
/// new (spendable) output leaves, and records issuance identities.
pub fn apply_tx(snapshot: &mut Snapshot, tx: &Transaction) -> ValidationResult<()> {
    for input in &tx.inputs {
        if let Some(record) = input.spent_output_record() {
            snapshot.trie.delete(&record.trie_key())?;
        }
    }

    let tx_id = tx.id();
    for (index, output) in tx.outputs.iter().enumerate() {
        if output.is_unspendable() {
            continue;
        }
        let record = crate::output_record::OutputRecord::new(
            crate::tx::Outpoint {
                tx_hash: tx_id,
                output_index: index as u32,
            },
            output.control_program.clone(),
            output.asset_amount.asset_id,
            output.asset_amount.amount,
            &output.reference_data,
        );
        snapshot.trie.insert(record.trie_key(), record.trie_value_hash())?;
    }

    for input in &tx.inputs {
        if let Some(wh) = input.issuance_witness_hash() {
            snapshot.record_issuance(wh, tx.max_time_ms);
        }
    }

    Ok(())
}

/// Header invariants plus every transaction `confirm_tx`'d and `apply_tx`'d
/// against a working copy of `prev_snapshot`, checked against the resulting
/// trie root — everything `validate_block` does except the consensus
/// program's `BLOCKSIGHASH` witness check. Used standalone by a signer
/// deciding whether to contribute its own witness share before quorum is
/// known to be reachable.
pub fn validate_block_contents(
    prev: &BlockHeader,
    prev_snapshot: &Snapshot,
    block: &Block,
    config: &Config,
) -> ValidationResult<Snapshot> {
    if block.header.height != prev.height + 1 {
        return Err(ValidationError::NonSequentialHeight);
    }
    if block.header.previous_block_hash != prev.hash() {
        return Err(ValidationError::PrevHashMismatch);
    }
    if block.header.timestamp_ms <= prev.timestamp_ms {
        return Err(ValidationError::NonIncreasingTimestamp);
    }
    if block.header.consensus_program != prev.consensus_program {
        return Err(ValidationError::ConsensusProgramChanged);
    }
    if block.recompute_transactions_root() != block.header.transactions_root {
        return Err(ValidationError::TransactionsRootMismatch);
    }

    let mut snapshot = prev_snapshot.clone();
    for tx in &block.transactions {
        validate_tx(tx, config)?;
        confirm_tx(&snapshot, tx, block.header.timestamp_ms, config)?;
        apply_tx(&mut snapshot, tx)?;
    }
    snapshot.prune_issuance_memo(block.header.timestamp_ms);

    if snapshot.root_hash() != block.header.assets_root {
        return Err(ValidationError::AssetsRootMismatch);
    }

    Ok(snapshot)
}

/// Full block validation: [`validate_block_contents`] plus the previous
/// block's consensus program satisfied by this header's witness under
/// `BLOCKSIGHASH`. Returns the resulting snapshot on success.
pub fn validate_block(
    prev: &BlockHeader,
    prev_snapshot: &Snapshot,
    block: &Block,
    config: &Config,
) -> ValidationResult<Snapshot> {
    let snapshot = validate_block_contents(prev, prev_snapshot, block, config)?;

    crate::vm::execute_consensus_program(
        &prev.consensus_program,
        &block.header.witness,
        &block.header,
        config,
    )
    .map_err(ValidationError::WitnessFailed)?;

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;
    use crate::tx::{AssetAmount, Outpoint, TxInput, TxOutput};

    fn issuance_tx(nonce: u8, min_time_ms: u64, max_time_ms: u64, amount: u64) -> Transaction {
        let ibh = Hash([1u8; 32]);
        let asset_id = AssetId::compute(&ibh, 1, &[0x51]);
        Transaction {
            version: 1,
            inputs: vec![TxInput::Issuance {
                nonce: vec![nonce],
                min_time_ms,
                max_time_ms,
                initial_block_hash: ibh,
                vm_version: 1,
                amount,
                issuance_program: vec![0x51], // OP_TRUE
                asset_definition: vec![],
                arguments: vec![],
            }],
            outputs: vec![TxOutput {
                asset_amount: AssetAmount { asset_id, amount },
                vm_version: 1,
                control_program: vec![0x51],
                reference_data: vec![],
            }],
            min_time_ms,
            max_time_ms,
            reference_data: vec![],
        }
    }

    #[test]
    fn validate_tx_runs_issuance_program() {
        let tx = issuance_tx(1, 0, 1000, 10);
        let config = Config::default();
        validate_tx(&tx, &config).unwrap();
    }

    #[test]
    fn validate_tx_rejects_inverted_time_range() {
        let mut tx = issuance_tx(1, 500, 1000, 10);
        tx.max_time_ms = 100;
        let config = Config::default();
        assert!(matches!(
            validate_tx(&tx, &config),
            Err(ValidationError::TimeRangeInverted)
        ));
    }

    #[test]
    fn apply_then_confirm_detects_issuance_replay() {
        let tx = issuance_tx(1, 0, 1000, 10);
        let config = Config::default();
        let mut snapshot = Snapshot::new();
        confirm_tx(&snapshot, &tx, 0, &config).unwrap();
        apply_tx(&mut snapshot, &tx).unwrap();

        let replay = issuance_tx(1, 0, 1000, 10);
        assert!(matches!(
            confirm_tx(&snapshot, &replay, 0, &config),
            Err(ValidationError::IssuanceReplay)
        ));
    }

    #[test]
    fn confirm_tx_rejects_outside_time_window() {
        let tx = issuance_tx(1, 100, 200, 10);
        let config = Config::default();
        let snapshot = Snapshot::new();
        assert!(matches!(
            confirm_tx(&snapshot, &tx, 500, &config),
            Err(ValidationError::OutsideTimeWindow { .. })
        ));
    }

    #[test]
    fn apply_then_confirm_spend_roundtrip() {
        let issuance = issuance_tx(1, 0, 1000, 10);
        let config = Config::default();
        let mut snapshot = Snapshot::new();
        confirm_tx(&snapshot, &issuance, 0, &config).unwrap();
        apply_tx(&mut snapshot, &issuance).unwrap();

        let spend = Transaction {
            version: 1,
            inputs: vec![TxInput::Spend {
                source_outpoint: Outpoint {
                    tx_hash: issuance.id(),
                    output_index: 0,
                },
                asset_amount: issuance.outputs[0].asset_amount,
                prev_program: issuance.outputs[0].control_program.clone(),
                prev_ref_data_hash: crate::hash::blake2b256(&[&issuance.outputs[0].reference_data]),
                arguments: vec![],
            }],
            outputs: vec![],
            min_time_ms: 0,
            max_time_ms: 0,
            reference_data: vec![],
        };
        confirm_tx(&snapshot, &spend, 10, &config).unwrap();
        apply_tx(&mut snapshot, &spend).unwrap();
        assert!(snapshot.trie.is_empty());
    }
}
