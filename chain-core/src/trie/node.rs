//! Node shapes for the binary Patricia trie: leaves hold the full output
//! commitment key and value hash, internal ("crit-bit") nodes hold only the
//! bit index the two subtrees first differ on plus the combined digest.

use crate::hash::{blake2b256, Hash};

pub(super) fn bit_at(key: &Hash, bit_index: u16) -> bool {
    let byte = key.0[(bit_index / 8) as usize];
    let shift = 7 - (bit_index % 8);
    (byte >> shift) & 1 == 1
}

/// First bit position at which `a` and `b` differ, scanning MSB-first.
/// `None` if the keys are identical.
pub(super) fn first_critical_bit(a: &Hash, b: &Hash) -> Option<u16> {
    for i in 0..256u16 {
        if bit_at(a, i) != bit_at(b, i) {
            return Some(i);
        }
    }
    None
}

#[derive(Clone, Debug)]
pub(super) struct Leaf {
    pub key: Hash,
    pub value_hash: Hash,
}

impl Leaf {
    pub fn digest(&self) -> Hash {
        blake2b256(&[self.key.as_bytes(), self.value_hash.as_bytes()])
    }
}

#[derive(Clone, Debug)]
pub(super) struct Internal {
    pub crit_bit: u16,
    pub left: Box<Node>,
    pub right: Box<Node>,
}

impl Internal {
    pub fn digest(&self) -> Hash {
        blake2b256(&[self.left.digest().as_bytes(), self.right.digest().as_bytes()])
    }

    /// Selects the child on the side `key` would descend into at this
    /// node's critical bit.
    pub fn child_for(&self, key: &Hash) -> &Node {
        if bit_at(key, self.crit_bit) {
            &self.right
        } else {
            &self.left
        }
    }
}

#[derive(Clone, Debug)]
pub(super) enum Node {
    Leaf(Leaf),
    Internal(Internal),
}

impl Node {
    pub fn digest(&self) -> Hash {
        match self {
            Node::Leaf(l) => l.digest(),
            Node::Internal(i) => i.digest(),
        }
    }

    /// Walks down following critical bits (ignoring whether `key` actually
    /// matches at each step) to the "best-match" leaf — the standard
    /// crit-bit-tree descent used to locate where a new key should split
    /// in, or to confirm an exact match.
    pub fn best_match<'a>(&'a self, key: &Hash) -> &'a Leaf {
        match self {
            Node::Leaf(l) => l,
            Node::Internal(i) => i.child_for(key).best_match(key),
        }
    }
}
