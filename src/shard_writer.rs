//src/shard_writer.rs

//! Splits a sorted k-mer table into one file per shard key.
//!
//! E.g. with the DNA alphabet and a prefix length of 4 there are 4^4 = 256
//! possible keys: every k-mer starting `AAAA` lands in `<prefix>AAAA`, every
//! k-mer starting `TTTT` in `<prefix>TTTT`, and so on. Files are only created
//! for keys that occur.

use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{ClassifyError, Result};
use crate::kmer_table::{open_table, write_record, TableReader};

/// File prefix of sample shards.
pub const SAMPLE_SHARD_PREFIX: &str = "sKmers_";

/// Where the shards of one table live: `<dir>/<file_prefix><key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLayout {
    dir: PathBuf,
    file_prefix: String,
}

impl ShardLayout {
    pub fn new<P: Into<PathBuf>>(dir: P, file_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_prefix: file_prefix.into(),
        }
    }

    /// Layout of the sample shards under `dir`.
    pub fn sample<P: Into<PathBuf>>(dir: P) -> Self {
        Self::new(dir, SAMPLE_SHARD_PREFIX)
    }

    /// Layout of the shards of the organism at manifest position `index`.
    /// The organism is identified by the file name alone.
    pub fn organism<P: Into<PathBuf>>(dir: P, index: usize) -> Self {
        Self::new(dir, format!("db{index}Kmers_"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    pub fn shard_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.file_prefix, key))
    }
}

/// Counters returned by a sharding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Distinct k-mers (lines) read.
    pub distinct: u64,
    /// Sum of their counts.
    pub total: u64,
    /// Shard files created.
    pub shards: u64,
}

pub struct ShardWriter {
    layout: ShardLayout,
    prefix_len: usize,
    alphabet: Vec<char>,
    kmer_len: Option<usize>,
}

impl ShardWriter {
    pub fn new(layout: ShardLayout, prefix_len: usize) -> Self {
        Self {
            layout,
            prefix_len,
            alphabet: vec!['A', 'C', 'G', 'T'],
            kmer_len: None,
        }
    }

    pub fn with_alphabet(mut self, alphabet: &[char]) -> Self {
        self.alphabet = alphabet.to_vec();
        self
    }

    /// Reject records whose sequence is not exactly `kmer_len` long.
    pub fn with_kmer_len(mut self, kmer_len: Option<usize>) -> Self {
        self.kmer_len = kmer_len;
        self
    }

    /// Shard the table at `path` (plain or `.gz`).
    pub fn shard_file(&self, path: &Path) -> Result<ShardStats> {
        let stats = self.shard_table(open_table(path)?, &path.display().to_string())?;
        info!(
            "Sharded {}: {} distinct k-mers, total count {}, {} shard files",
            path.display(),
            stats.distinct,
            stats.total,
            stats.shards
        );
        Ok(stats)
    }

    /// Stream `input` into shard files.
    ///
    /// The input must be sorted by sequence. The table reader fails with
    /// `UnsortedInput` on the first decrease, so a shard, once closed, is
    /// never reopened and overwritten.
    pub fn shard_table<R: BufRead>(&self, input: R, source_name: &str) -> Result<ShardStats> {
        let dir = self.layout.dir();
        fs::create_dir_all(dir).map_err(|e| ClassifyError::io(dir, e))?;

        let mut reader = TableReader::new(input, source_name)
            .with_alphabet(&self.alphabet)
            .with_min_len(self.prefix_len)
            .with_kmer_len(self.kmer_len);

        let mut stats = ShardStats::default();
        let mut current: Option<(String, PathBuf, BufWriter<File>)> = None;

        while let Some(record) = reader.next_record()? {
            stats.distinct += 1;
            stats.total += record.count;

            let key = record.shard_key(self.prefix_len);
            let same_key = matches!(&current, Some((open_key, _, _)) if open_key == key);
            if !same_key {
                if let Some((old_key, old_path, old)) = current.take() {
                    finish_shard(old, &old_path)?;
                    debug!("Closed shard {old_key}");
                }
                let path = self.layout.shard_path(key);
                let file = File::create(&path).map_err(|e| ClassifyError::io(&path, e))?;
                stats.shards += 1;
                current = Some((key.to_string(), path, BufWriter::new(file)));
            }

            if let Some((_, path, out)) = current.as_mut() {
                write_record(out, &record).map_err(|e| ClassifyError::io(&*path, e))?;
            }
        }

        if let Some((_, path, out)) = current.take() {
            finish_shard(out, &path)?;
        }
        Ok(stats)
    }
}

fn finish_shard(mut out: BufWriter<File>, path: &Path) -> Result<()> {
    out.flush().map_err(|e| ClassifyError::io(path, e))
}

/// List the shard keys present on disk for `layout`, sorted.
pub fn existing_keys(layout: &ShardLayout) -> Result<Vec<String>> {
    let dir = layout.dir();
    let mut keys = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ClassifyError::io(dir, e))? {
        let entry = entry.map_err(|e| ClassifyError::io(dir, e))?;
        let name = entry.file_name();
        if let Some(key) = name.to_str().and_then(|n| n.strip_prefix(layout.file_prefix())) {
            keys.push(key.to_string());
        }
    }
    keys.sort();
    Ok(keys)
}
