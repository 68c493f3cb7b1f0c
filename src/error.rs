//src/error.rs

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Every failure a classification stage can report to its caller.
///
/// An empty result set is not represented here: a run that finds no
/// organisms returns `Ok` with an empty `ResultCollection`.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed line {line} in {source_name}: {reason}")]
    MalformedInputLine {
        source_name: String,
        line: u64,
        reason: String,
    },

    #[error("unsorted input in {source_name} at line {line}: '{current}' follows '{previous}'")]
    UnsortedInput {
        source_name: String,
        line: u64,
        previous: String,
        current: String,
    },

    #[error("duplicate k-mer '{sequence}' in {source_name} at line {line}")]
    DuplicateKmer {
        source_name: String,
        line: u64,
        sequence: String,
    },

    #[error("database source not found: {0}")]
    MissingDatabaseSource(String),

    #[error("invalid database manifest {} line {line}: {reason}", path.display())]
    InvalidManifest {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("malformed result line {line}: {reason}")]
    MalformedResultLine { line: u64, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ClassifyError>;

impl ClassifyError {
    /// Wrap an `io::Error` with the path it happened on.
    pub fn io<P: AsRef<Path>>(path: P, source: io::Error) -> Self {
        ClassifyError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
