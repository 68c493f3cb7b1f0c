//src/noise_filter.rs

//! Removal of low-evidence and low-complexity k-mers from a sample table.
//!
//! Two passes are applied to each record, strictly in this order:
//! 1. singletons (`count == 1`) are dropped as sequencing noise;
//! 2. surviving k-mers whose complexity score is below the threshold are dropped.
//!
//! A singleton is never scored, so a k-mer that is both a singleton and low
//! complexity is counted once, as a bad k-mer.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use log::info;

use crate::config::ClassifyConfig;
use crate::error::{ClassifyError, Result};
use crate::kmer_table::{open_table, write_record, TableReader};

/// Counters produced while filtering. The good counts are the denominators
/// of every percentage reported later and must not be recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub raw_distinct: u64,
    pub raw_total: u64,
    /// Singletons removed.
    pub bad_kmers: u64,
    /// Non-singletons removed for low complexity.
    pub low_entropy_kmers: u64,
    pub good_distinct: u64,
    pub good_total: u64,
}

/// Shannon entropy, in bits, of the overlapping `word_len`-words of `seq`.
///
/// `word_len == 1` scores base composition (at most 2 bits for DNA);
/// the default of 2 scores dinucleotides (at most 4 bits). Sequences
/// shorter than `word_len` score 0.
pub fn kmer_entropy(seq: &[u8], word_len: usize) -> f64 {
    if word_len == 0 || seq.len() < word_len {
        return 0.0;
    }
    let mut counts: AHashMap<&[u8], u32> = AHashMap::new();
    for word in seq.windows(word_len) {
        *counts.entry(word).or_insert(0) += 1;
    }
    let n = (seq.len() - word_len + 1) as f64;
    counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

#[derive(Debug, Clone)]
pub struct NoiseFilter {
    entropy_threshold: f64,
    entropy_word_len: usize,
    alphabet: Vec<char>,
    kmer_len: Option<usize>,
}

impl NoiseFilter {
    pub fn new(entropy_threshold: f64, entropy_word_len: usize) -> Self {
        Self {
            entropy_threshold,
            entropy_word_len,
            alphabet: vec!['A', 'C', 'G', 'T'],
            kmer_len: None,
        }
    }

    pub fn from_config(config: &ClassifyConfig) -> Self {
        Self {
            entropy_threshold: config.entropy_threshold,
            entropy_word_len: config.entropy_word_len,
            alphabet: config.alphabet.clone(),
            kmer_len: Some(config.k_size),
        }
    }

    /// `true` if a record that survived singleton removal is complex enough
    /// to keep. A score equal to the threshold is kept.
    pub fn passes_entropy(&self, sequence: &str) -> bool {
        kmer_entropy(sequence.as_bytes(), self.entropy_word_len) >= self.entropy_threshold
    }

    /// Filter a sorted table from `reader`, writing the good records to `out`.
    /// `out_path` names the output in error messages.
    pub fn filter_table<R: BufRead, W: Write>(
        &self,
        mut reader: TableReader<R>,
        out: &mut W,
        out_path: &Path,
    ) -> Result<FilterStats> {
        let mut stats = FilterStats::default();

        while let Some(record) = reader.next_record()? {
            stats.raw_distinct += 1;
            stats.raw_total += record.count;

            if record.count == 1 {
                stats.bad_kmers += 1;
                continue;
            }
            if !self.passes_entropy(&record.sequence) {
                stats.low_entropy_kmers += 1;
                continue;
            }

            stats.good_distinct += 1;
            stats.good_total += record.count;
            write_record(out, &record).map_err(|e| ClassifyError::io(out_path, e))?;
        }
        out.flush().map_err(|e| ClassifyError::io(out_path, e))?;

        Ok(stats)
    }

    /// Filter the table at `input` into a new file at `output`.
    pub fn filter_file(&self, input: &Path, output: &Path) -> Result<FilterStats> {
        let reader = TableReader::new(open_table(input)?, input.display().to_string())
            .with_alphabet(&self.alphabet)
            .with_kmer_len(self.kmer_len);
        let file = File::create(output).map_err(|e| ClassifyError::io(output, e))?;
        let mut out = BufWriter::new(file);

        let stats = self.filter_table(reader, &mut out, output)?;

        info!(
            "Noise filter: {} distinct k-mers read ({} total); removed {} singletons and {} low-complexity; kept {} distinct ({} total)",
            stats.raw_distinct,
            stats.raw_total,
            stats.bad_kmers,
            stats.low_entropy_kmers,
            stats.good_distinct,
            stats.good_total
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(filter: &NoiseFilter, table: &str) -> (FilterStats, String) {
        let reader = TableReader::new(Cursor::new(table.to_string()), "sample");
        let mut out = Vec::new();
        let stats = filter
            .filter_table(reader, &mut out, Path::new("good"))
            .unwrap();
        (stats, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_entropy_values() {
        assert_eq!(kmer_entropy(b"AAAAA", 1), 0.0);
        assert!((kmer_entropy(b"ACGT", 1) - 2.0).abs() < 1e-12);
        // ACGTACGTA has 8 dinucleotides over 4 distinct words, 2 each.
        assert!((kmer_entropy(b"ACGTACGTA", 2) - 2.0).abs() < 1e-12);
        assert_eq!(kmer_entropy(b"A", 2), 0.0);
    }

    #[test]
    fn test_singletons_removed_without_threshold() {
        let filter = NoiseFilter::new(0.0, 2);
        let (stats, good) = run(&filter, "AAAAA\t5\nAAAAC\t2\nTTTTG\t9\nTTTTT\t1\n");
        assert_eq!(stats.bad_kmers, 1);
        assert_eq!(stats.low_entropy_kmers, 0);
        assert_eq!(stats.good_distinct, 3);
        assert_eq!(stats.good_total, 16);
        assert_eq!(stats.raw_total, 17);
        assert_eq!(good, "AAAAA\t5\nAAAAC\t2\nTTTTG\t9\n");
    }

    #[test]
    fn test_singleton_removal_precedes_entropy() {
        // Both records are low complexity; only the non-singleton is scored.
        let filter = NoiseFilter::new(1.0, 1);
        let (stats, good) = run(&filter, "AAAAA\t1\nCCCCC\t4\n");
        assert_eq!(stats.bad_kmers, 1);
        assert_eq!(stats.low_entropy_kmers, 1);
        assert_eq!(stats.good_distinct, 0);
        assert!(good.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // "ACGT" has base entropy of exactly 2 bits.
        let filter = NoiseFilter::new(2.0, 1);
        assert!(filter.passes_entropy("ACGT"));
        assert!(!filter.passes_entropy("ACGA"));
    }

    #[test]
    fn test_default_threshold_on_dinucleotides() {
        let filter = NoiseFilter::new(2.5, 2);
        assert!(!filter.passes_entropy("ATATATATATATATATATATATATATATATAT"));
        assert!(filter.passes_entropy("ACGTTGCATGCAACGGTCAGTCCATGGATCAA"));
    }

    #[test]
    fn test_filter_file_propagates_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        std::fs::write(&input, "AAAAA\t5\nAAAAC\tlots\n").unwrap();
        let err = NoiseFilter::new(0.0, 2)
            .filter_file(&input, &dir.path().join("good"))
            .unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedInputLine { line: 2, .. }));
    }
}
