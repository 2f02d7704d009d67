//! The unconfirmed-transaction buffer. Specified as a contract — insert is
//! idempotent, dump returns a topological order respecting in-pool spend
//! dependencies — so an in-memory implementation (here) and a durable one
//! can share callers.

use crate::error::PoolResult;
use crate::hash::Hash;
use crate::tx::Transaction;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

pub trait Pool: Send + Sync {
    /// Inserts `tx`. Returns `Ok(())` if `tx.id()` is already present.
    fn insert(&self, tx: Transaction) -> PoolResult<()>;

    /// All pool transactions in an order where every transaction appears
    /// after any other pool transaction whose output it spends.
    fn dump(&self) -> Vec<Transaction>;

    /// Removes `confirmed` (landed in a block) and `conflicting` (displaced
    /// by a landed conflict) transactions. Absent ids are ignored.
    fn clean(&self, confirmed: &[Hash], conflicting: &[Hash]);

    fn contains(&self, tx_id: &Hash) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct PoolState {
    txs: IndexMap<Hash, Transaction>,
}

/// In-memory [`Pool`]: suitable for tests and single-process deployments.
#[derive(Default)]
pub struct MemPool {
    state: Mutex<PoolState>,
}

impl MemPool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pool for MemPool {
    fn insert(&self, tx: Transaction) -> PoolResult<()> {
        let mut state = self.state.lock().expect("pool mutex poisoned");
        let id = tx.id();
        state.txs.entry(id).or_insert(tx);
        Ok(())
    }

    fn dump(&self) -> Vec<Transaction> {
        let state = self.state.lock().expect("pool mutex poisoned");
        topological_order(&state.txs)
    }

    fn clean(&self, confirmed: &[Hash], conflicting: &[Hash]) {
        let mut state = self.state.lock().expect("pool mutex poisoned");
        for id in confirmed.iter().chain(conflicting.iter()) {
            // `shift_remove` keeps the surviving entries in their original
            // relative order, which `topological_order`'s tie-break relies on.
            state.txs.shift_remove(id);
        }
    }

    fn contains(&self, tx_id: &Hash) -> bool {
        self.state.lock().expect("pool mutex poisoned").txs.contains_key(tx_id)
    }

    fn len(&self) -> usize {
        self.state.lock().expect("pool mutex poisoned").txs.len()
    }
}

/// Kahn's algorithm over in-pool spend dependencies, tie-broken by
/// insertion order so `dump()` is deterministic for a given pool state.
fn topological_order(txs: &IndexMap<Hash, Transaction>) -> Vec<Transaction> {
    let order: Vec<Hash> = txs.keys().copied().collect();
    let mut dependents: HashMap<Hash, Vec<Hash>> = HashMap::new();
    let mut indegree: HashMap<Hash, usize> = order.iter().map(|id| (*id, 0)).collect();

    for id in &order {
        let tx = &txs[id];
        let mut parents = HashSet::new();
        for input in &tx.inputs {
            if let Some(record) = input.spent_output_record() {
                if txs.contains_key(&record.outpoint.tx_hash) {
                    parents.insert(record.outpoint.tx_hash);
                }
            }
        }
        for parent in parents {
            dependents.entry(parent).or_default().push(*id);
            *indegree.get_mut(id).unwrap() += 1;
        }
    }

    let mut ready: VecDeque<Hash> = order.iter().filter(|id| indegree[*id] == 0).copied().collect();
    let mut result = Vec::with_capacity(order.len());
    let mut visited = HashSet::new();

    while let Some(id) = ready.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        result.push(txs[&id].clone());
        if let Some(children) = dependents.get(&id) {
            for child in children {
                let deg = indegree.get_mut(child).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    ready.push_back(*child);
                }
            }
        }
    }

    result
}
