//src/shard_matcher.rs

use std::collections::btree_map::{self, BTreeMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use log::{debug, info};

use crate::config::ClassifyConfig;
use crate::database::OrganismMeta;
use crate::error::{ClassifyError, Result};
use crate::kmer_table::TableReader;
use crate::shard_writer::{existing_keys, ShardLayout};
use crate::types::{KmerRecord, MatchRecord};

/// All k-mers shared between the sample and the database, keyed by sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchIndex {
    records: BTreeMap<String, MatchRecord>,
}

impl MatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `sequence` (seen `sample_count` times in the sample) occurs
    /// `db_count` times in organism `organism`. Returns `true` if the sequence
    /// was not matched before.
    pub fn record(&mut self, sequence: &str, sample_count: u64, organism: usize, db_count: u64) -> bool {
        let (entry, is_new) = match self.records.entry(sequence.to_string()) {
            btree_map::Entry::Occupied(e) => (e.into_mut(), false),
            btree_map::Entry::Vacant(e) => (
                e.insert(MatchRecord {
                    sequence: sequence.to_string(),
                    sample_count,
                    organism_counts: BTreeMap::new(),
                }),
                true,
            ),
        };
        entry.organism_counts.insert(organism, db_count);
        is_new
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, sequence: &str) -> Option<&MatchRecord> {
        self.records.get(sequence)
    }

    /// Records in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &MatchRecord> {
        self.records.values()
    }

    /// The matched k-mers with their sample counts, in sequence order.
    pub fn matched_kmers(&self) -> Vec<KmerRecord> {
        self.records
            .values()
            .map(|r| KmerRecord {
                sequence: r.sequence.clone(),
                count: r.sample_count,
            })
            .collect()
    }

    /// Write the index as
    /// `sequence<TAB>sample_count<TAB>taxon_id:db_count[,taxon_id:db_count...]`.
    pub fn write_tsv(&self, path: &Path, organisms: &[OrganismMeta]) -> Result<()> {
        let file = File::create(path).map_err(|e| ClassifyError::io(path, e))?;
        let mut out = BufWriter::new(file);
        let taxon_of = |index: usize| {
            organisms
                .iter()
                .find(|o| o.index == index)
                .map(|o| o.taxon_id.to_string())
                .unwrap_or_else(|| format!("#{index}"))
        };

        for record in self.records.values() {
            let hits: Vec<String> = record
                .organism_counts
                .iter()
                .map(|(&org, &count)| format!("{}:{}", taxon_of(org), count))
                .collect();
            writeln!(out, "{}\t{}\t{}", record.sequence, record.sample_count, hits.join(","))
                .map_err(|e| ClassifyError::io(path, e))?;
        }
        out.flush().map_err(|e| ClassifyError::io(path, e))
    }
}

/// Counters of a matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    /// Distinct sample k-mers found in at least one organism.
    pub distinct_matches: u64,
    /// Sum of the sample counts of those k-mers.
    pub total_matched_count: u64,
    /// Shard keys for which a sample shard and at least one database shard existed.
    pub shard_pairs: u64,
}

/// Matches sample shards against database shards, one shard key at a time.
///
/// Since sample and database tables are sharded by the same prefix function,
/// every shared k-mer lives in the sample shard and database shard of the same
/// key. Only one sample shard and one database shard are held in memory at once.
pub struct ShardMatcher {
    k_size: usize,
    prefix_len: usize,
    alphabet: Vec<char>,
}

impl ShardMatcher {
    pub fn new(k_size: usize, prefix_len: usize) -> Self {
        Self {
            k_size,
            prefix_len,
            alphabet: vec!['A', 'C', 'G', 'T'],
        }
    }

    pub fn from_config(config: &ClassifyConfig) -> Self {
        Self {
            k_size: config.k_size,
            prefix_len: config.prefix_len,
            alphabet: config.alphabet.clone(),
        }
    }

    /// Match the sample shards in `sample_dir` against the shards of
    /// `organisms` in `db_dir`.
    ///
    /// Keys are taken from the sample shards on disk, in sorted order, so the
    /// work grows with the sample and not with the key space. A missing
    /// `db_dir` is fatal; a missing database shard for a key means the key has
    /// no k-mers on that side.
    pub fn run(
        &self,
        sample_dir: &Path,
        db_dir: &Path,
        organisms: &[OrganismMeta],
    ) -> Result<(MatchSummary, MatchIndex)> {
        if !db_dir.is_dir() {
            return Err(ClassifyError::MissingDatabaseSource(format!(
                "database shard directory {} not found",
                db_dir.display()
            )));
        }
        if !sample_dir.is_dir() {
            return Err(ClassifyError::io(
                sample_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "sample shard directory not found"),
            ));
        }

        let sample_layout = ShardLayout::sample(sample_dir);
        let db_layouts: Vec<(usize, ShardLayout)> = organisms
            .iter()
            .map(|o| (o.index, ShardLayout::organism(db_dir, o.index)))
            .collect();

        let mut summary = MatchSummary::default();
        let mut index = MatchIndex::new();

        for key in existing_keys(&sample_layout)? {
            let sample_path = sample_layout.shard_path(&key);
            let db_paths: Vec<(usize, _)> = db_layouts
                .iter()
                .map(|(org, layout)| (*org, layout.shard_path(&key)))
                .filter(|(_, path)| path.is_file())
                .collect();
            if db_paths.is_empty() {
                continue;
            }

            summary.shard_pairs += 1;
            let sample = self.load_shard(&sample_path)?;
            let mut key_matches = 0u64;

            for (org, db_path) in db_paths {
                let db = self.load_shard(&db_path)?;
                let (small, large, sample_is_small) = if sample.len() <= db.len() {
                    (&sample, &db, true)
                } else {
                    (&db, &sample, false)
                };

                for (sequence, &small_count) in small {
                    let Some(&large_count) = large.get(sequence) else {
                        continue;
                    };
                    let (sample_count, db_count) = if sample_is_small {
                        (small_count, large_count)
                    } else {
                        (large_count, small_count)
                    };
                    if index.record(sequence, sample_count, org, db_count) {
                        summary.distinct_matches += 1;
                        summary.total_matched_count += sample_count;
                    }
                    key_matches += 1;
                }
            }
            debug!("Shard {key}: {key_matches} organism hits");
        }

        info!(
            "Matched {} distinct sample k-mers against the database, total count {} ({} shard pairs)",
            summary.distinct_matches, summary.total_matched_count, summary.shard_pairs
        );
        Ok((summary, index))
    }

    /// Load one shard file into a `sequence -> count` map.
    fn load_shard(&self, path: &Path) -> Result<AHashMap<String, u64>> {
        let file = File::open(path).map_err(|e| ClassifyError::io(path, e))?;
        let reader = TableReader::new(BufReader::new(file), path.display().to_string())
            .with_alphabet(&self.alphabet)
            .with_min_len(self.prefix_len)
            .with_kmer_len(Some(self.k_size));

        let mut shard = AHashMap::new();
        for record in reader {
            let record = record?;
            shard.insert(record.sequence, record.count);
        }
        Ok(shard)
    }
}
