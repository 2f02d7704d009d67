//! Binary Patricia (crit-bit) trie over SHA-3 output-commitment keys.
//!
//! The trie's shape is a pure function of the key set — two trees built
//! from the same `(key, valueHash)` pairs in any insertion order produce
//! the same [`Trie::root_hash`]. `Delta` records the leaf-level changes a
//! batch of operations made, for callers that persist trie state
//! incrementally rather than rehashing it whole each time.

mod node;

use crate::error::{TrieError, TrieResult};
use crate::hash::Hash;
use node::{first_critical_bit, Internal, Leaf, Node};

/// Leaf-level changes accumulated since the last [`Trie::take_delta`].
#[derive(Debug, Default, Clone)]
pub struct Delta {
    pub inserts: Vec<(Hash, Hash)>,
    pub deletes: Vec<Hash>,
}

impl Delta {
    fn clear(&mut self) {
        self.inserts.clear();
        self.deletes.clear();
    }
}

#[derive(Clone, Debug, Default)]
pub struct Trie {
    root: Option<Box<Node>>,
    pending: Delta,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Merkle digest committing to every `(key, valueHash)` pair in the
    /// trie. `H("")`-equivalent for an empty trie (matches the block-level
    /// empty-Merkle-root convention): `blake2b256(&[&[]])`.
    pub fn root_hash(&self) -> Hash {
        match &self.root {
            None => crate::hash::blake2b256(&[&[]]),
            Some(n) => n.digest(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn lookup(&self, key: &Hash) -> Option<Hash> {
        let root = self.root.as_ref()?;
        let leaf = root.best_match(key);
        if &leaf.key == key {
            Some(leaf.value_hash)
        } else {
            None
        }
    }

    /// Inserts `(key, value_hash)`. Idempotent: re-inserting the same key
    /// with the same `value_hash` is a no-op success. Inserting the same
    /// key with a different `value_hash` is a conflict.
    pub fn insert(&mut self, key: Hash, value_hash: Hash) -> TrieResult<()> {
        let Some(root) = self.root.take() else {
            self.root = Some(Box::new(Node::Leaf(Leaf { key, value_hash })));
            self.pending.inserts.push((key, value_hash));
            return Ok(());
        };

        let existing = root.best_match(&key);
        if existing.key == key {
            if existing.value_hash == value_hash {
                self.root = Some(root);
                return Ok(());
            }
            self.root = Some(root);
            return Err(TrieError::ConflictingValue { key });
        }

        let crit_bit = first_critical_bit(&existing.key, &key)
            .expect("keys differ since existing.key != key");
        let new_leaf = Node::Leaf(Leaf { key, value_hash });
        self.root = Some(Box::new(splice_in(*root, crit_bit, key, new_leaf)));
        self.pending.inserts.push((key, value_hash));
        Ok(())
    }

    /// Removes `key`. Deleting an absent key is an error, not a no-op.
    pub fn delete(&mut self, key: &Hash) -> TrieResult<()> {
        let Some(root) = self.root.take() else {
            return Err(TrieError::KeyNotFound { key: *key });
        };
        match remove(*root, key)? {
            Some(new_root) => self.root = Some(Box::new(new_root)),
            None => self.root = None,
        }
        self.pending.deletes.push(*key);
        Ok(())
    }

    /// Drains and returns the leaf-level changes made since the last call.
    pub fn take_delta(&mut self) -> Delta {
        std::mem::take(&mut self.pending)
    }

    pub fn clear_delta(&mut self) {
        self.pending.clear();
    }
}

/// Splices a new leaf into `root` at `crit_bit`, the bit position where the
/// new key diverges from the tree's existing best-match leaf. Walks down
/// from the top, stopping either at the first internal node whose own
/// critical bit is past `crit_bit` (the new split belongs above it) or at a
/// leaf (the new split replaces it).
fn splice_in(root: Node, crit_bit: u16, new_key: Hash, new_leaf: Node) -> Node {
    fn go(n: Node, crit_bit: u16, new_key: Hash, new_leaf: Node) -> Node {
        match n {
            Node::Internal(i) if i.crit_bit < crit_bit => {
                let Internal {
                    crit_bit: cb,
                    left,
                    right,
                } = i;
                if node::bit_at(&new_key, cb) {
                    Node::Internal(Internal {
                        crit_bit: cb,
                        left,
                        right: Box::new(go(*right, crit_bit, new_key, new_leaf)),
                    })
                } else {
                    Node::Internal(Internal {
                        crit_bit: cb,
                        left: Box::new(go(*left, crit_bit, new_key, new_leaf)),
                        right,
                    })
                }
            }
            other => {
                if node::bit_at(&new_key, crit_bit) {
                    Node::Internal(Internal {
                        crit_bit,
                        left: Box::new(other),
                        right: Box::new(new_leaf),
                    })
                } else {
                    Node::Internal(Internal {
                        crit_bit,
                        left: Box::new(new_leaf),
                        right: Box::new(other),
                    })
                }
            }
        }
    }
    go(root, crit_bit, new_key, new_leaf)
}

/// Removes `key` from the subtree rooted at `n`. Returns `Ok(None)` if the
/// subtree becomes empty (only possible at the very top), `Ok(Some(_))`
/// with the collapsed subtree otherwise, or an error if `key` isn't present.
fn remove(n: Node, key: &Hash) -> TrieResult<Option<Node>> {
    match n {
        Node::Leaf(l) => {
            if &l.key == key {
                Ok(None)
            } else {
                Err(TrieError::KeyNotFound { key: *key })
            }
        }
        Node::Internal(i) => {
            let Internal {
                crit_bit,
                left,
                right,
            } = i;
            if node::bit_at(key, crit_bit) {
                match remove(*right, key)? {
                    Some(new_right) => Ok(Some(Node::Internal(Internal {
                        crit_bit,
                        left,
                        right: Box::new(new_right),
                    }))),
                    None => Ok(Some(*left)),
                }
            } else {
                match remove(*left, key)? {
                    Some(new_left) => Ok(Some(Node::Internal(Internal {
                        crit_bit,
                        left: Box::new(new_left),
                        right,
                    }))),
                    None => Ok(Some(*right)),
                }
            }
        }
    }
}
