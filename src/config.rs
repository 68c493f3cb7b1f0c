//src/config.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ClassifyError, Result};
use crate::permutations;

/// Prefix length used to shard k-mer tables when the caller does not pick one.
pub const DEFAULT_PREFIX_LEN: usize = 5;

/// Minimum complexity score a sample k-mer needs to be kept.
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 2.5;

/// Word length of the entropy score (2 = dinucleotides).
pub const DEFAULT_ENTROPY_WORD_LEN: usize = 2;

/// Largest shard key space accepted (`|alphabet|^prefix_len`), 4^12 for DNA.
pub const MAX_SHARD_KEYS: usize = 1 << 24;

/// Environment variable naming the directory that holds the packaged databases.
pub const BUILTIN_DB_DIR_ENV: &str = "KMER_CLASSIFY_DB_DIR";

/// Settings for one classification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// k-mer length of both the sample and the database tables.
    pub k_size: usize,
    /// Length of the shard key (the k-mer prefix used to bucket tables).
    pub prefix_len: usize,
    /// Symbols a k-mer may contain; also the shard key alphabet.
    pub alphabet: Vec<char>,
    /// Sample k-mers scoring strictly below this are dropped as low complexity.
    pub entropy_threshold: f64,
    /// Length of the overlapping words the entropy score counts.
    pub entropy_word_len: usize,
    /// Parent directory for the per-run scratch directory.
    pub work_dir: PathBuf,
    /// Root of the built-in databases (`<dir>/<library>_<k>`).
    pub builtin_db_dir: PathBuf,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        let builtin_db_dir = std::env::var_os(BUILTIN_DB_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./databases"));

        Self {
            k_size: 32,
            prefix_len: DEFAULT_PREFIX_LEN,
            alphabet: vec!['A', 'C', 'G', 'T'],
            entropy_threshold: DEFAULT_ENTROPY_THRESHOLD,
            entropy_word_len: DEFAULT_ENTROPY_WORD_LEN,
            work_dir: std::env::temp_dir(),
            builtin_db_dir,
        }
    }
}

impl ClassifyConfig {
    /// Config for `k_size`-mers with every other setting at its default.
    pub fn with_k(k_size: usize) -> Self {
        Self {
            k_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.k_size == 0 {
            return Err(ClassifyError::InvalidConfig("k-mer size must be positive".into()));
        }
        if self.prefix_len == 0 {
            return Err(ClassifyError::InvalidConfig("prefix length must be positive".into()));
        }
        if self.prefix_len > self.k_size {
            return Err(ClassifyError::InvalidConfig(format!(
                "prefix length {} exceeds k-mer size {}",
                self.prefix_len, self.k_size
            )));
        }
        if self.alphabet.is_empty() {
            return Err(ClassifyError::InvalidConfig("alphabet is empty".into()));
        }
        let mut seen = self.alphabet.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.alphabet.len() {
            return Err(ClassifyError::InvalidConfig("alphabet has repeated symbols".into()));
        }
        match permutations::space_size(self.alphabet.len(), self.prefix_len) {
            Some(keys) if keys <= MAX_SHARD_KEYS => {}
            _ => {
                return Err(ClassifyError::InvalidConfig(format!(
                    "prefix length {} over {} symbols gives more than {} shard keys",
                    self.prefix_len,
                    self.alphabet.len(),
                    MAX_SHARD_KEYS
                )))
            }
        }
        if self.entropy_threshold.is_nan() || self.entropy_threshold < 0.0 {
            return Err(ClassifyError::InvalidConfig(format!(
                "entropy threshold must be a non-negative number, got {}",
                self.entropy_threshold
            )));
        }
        if self.entropy_word_len == 0 {
            return Err(ClassifyError::InvalidConfig("entropy word length must be positive".into()));
        }
        Ok(())
    }
}
