//! Consensus and runtime configuration for **chain-core**.
//!
//! The [`Config`] struct centralises tunable parameters: the VM's gas
//! budget, the issuance replay window, the federation's signer policy, and
//! the strict/lenient version cutoffs. It is constructed via the
//! [`ConfigBuilder`] using the fluent builder pattern, so callers can
//! override only the fields they care about while keeping sensible
//! defaults.
//!
//! ```
//! use chain_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.run_limit, 10_000);
//! ```

use serde::{Deserialize, Serialize};

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// VM run-limit ("gas") budget per top-level script execution.
    pub run_limit: u64,

    /// Maximum `CHECKPREDICATE` nesting depth before execution fails.
    pub max_nested_predicate_depth: u32,

    /// Transaction versions `<= strict_tx_version` reject unknown opcodes
    /// and reserved-expansion opcodes; versions above that are "lenient"
    /// and no-op on both, enabling a soft fork.
    pub strict_tx_version: u64,

    /// Block versions `<= strict_block_version` are strict for
    /// `BLOCKSIGHASH`-context scripts, mirroring `strict_tx_version`.
    pub strict_block_version: u64,

    /// `tx.maxTime - tx.minTime` must not exceed this for issuance inputs.
    pub max_issuance_window_ms: u64,

    /// `WaitForBlockSoon` fails fast if asked for a height more than this
    /// far beyond the current tip.
    pub distant_future_window: u64,

    /// Federation ed25519 public keys (raw 32-byte points), in the fixed
    /// order block witnesses are assembled in.
    pub federation_pubkeys: Vec<Vec<u8>>,

    /// Number of federation signatures required to satisfy the consensus
    /// program.
    pub federation_quorum: usize,

    /// Human-readable name identifying the network (e.g. "main", "test").
    pub network: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_limit: 10_000,
            max_nested_predicate_depth: 8,
            strict_tx_version: 1,
            strict_block_version: 1,
            max_issuance_window_ms: 24 * 60 * 60 * 1000,
            distant_future_window: 2,
            federation_pubkeys: Vec::new(),
            federation_quorum: 1,
            network: "main".into(),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self {
            inner: Config::default(),
        }
    }

    pub fn run_limit(mut self, limit: u64) -> Self {
        self.inner.run_limit = limit;
        self
    }

    pub fn max_nested_predicate_depth(mut self, depth: u32) -> Self {
        self.inner.max_nested_predicate_depth = depth;
        self
    }

    pub fn max_issuance_window_ms(mut self, window: u64) -> Self {
        self.inner.max_issuance_window_ms = window;
        self
    }

    pub fn federation(mut self, pubkeys: Vec<Vec<u8>>, quorum: usize) -> Self {
        self.inner.federation_pubkeys = pubkeys;
        self.inner.federation_quorum = quorum;
        self
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .run_limit(20_000)
            .max_nested_predicate_depth(4)
            .federation(vec![vec![1; 32], vec![2; 32], vec![3; 32]], 2)
            .network("test")
            .finish();
        assert_eq!(cfg.run_limit, 20_000);
        assert_eq!(cfg.max_nested_predicate_depth, 4);
        assert_eq!(cfg.federation_quorum, 2);
        assert_eq!(cfg.network, "test");
    }
}
