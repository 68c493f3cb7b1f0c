// src/lib.rs
pub mod aggregate;
pub mod config;
pub mod database;
pub mod error;
pub mod kmer_table;
pub mod noise_filter;
pub mod permutations;
pub mod report;
pub mod shard_matcher;
pub mod shard_writer;
pub mod types;

use std::fs;
use std::path::Path;
use std::time::Instant;

use log::info;

pub use crate::config::ClassifyConfig;
pub use crate::database::{DatabaseSource, OrganismMeta};
pub use crate::error::{ClassifyError, Result};
pub use crate::shard_matcher::MatchIndex;
pub use crate::types::{KmerRecord, MatchRecord, ResultCollection, RunCounters, VirusResult};

use crate::aggregate::aggregate;
use crate::database::shard_database;
use crate::noise_filter::NoiseFilter;
use crate::shard_matcher::ShardMatcher;
use crate::shard_writer::{ShardLayout, ShardWriter};

/// Everything one classification run produces.
#[derive(Debug)]
pub struct ClassificationRun {
    /// Ranked organisms; empty when nothing matched.
    pub results: ResultCollection,
    /// Counters of every stage and the elapsed time.
    pub counters: RunCounters,
    /// The database organisms, in manifest order.
    pub organisms: Vec<OrganismMeta>,
    /// Matched k-mers with their sample and per-organism counts.
    pub matches: MatchIndex,
}

/// Classify the sample k-mer table at `sample_table` against `database`.
///
/// Stages run one after the other, each finishing before the next starts:
/// noise filter, sample sharding, database sharding, matching, aggregation.
/// Intermediate files go to a fresh scratch directory under
/// `config.work_dir`, which is removed whether the run succeeds or fails.
/// Nothing here spawns threads or imposes timeouts; a caller that needs a
/// wall-clock budget runs this on its own worker.
pub fn classify_sample(
    config: &ClassifyConfig,
    sample_table: &Path,
    database: &DatabaseSource,
) -> Result<ClassificationRun> {
    let start = Instant::now();
    config.validate()?;
    if database.k_size() != config.k_size {
        return Err(ClassifyError::InvalidConfig(format!(
            "database k-mer size {} does not match sample k-mer size {}",
            database.k_size(),
            config.k_size
        )));
    }

    let db = database.resolve(&config.builtin_db_dir)?;

    fs::create_dir_all(&config.work_dir).map_err(|e| ClassifyError::io(&config.work_dir, e))?;
    let scratch = tempfile::Builder::new()
        .prefix("kmer-classify-")
        .tempdir_in(&config.work_dir)
        .map_err(|e| ClassifyError::io(&config.work_dir, e))?;
    info!("Scratch directory {}", scratch.path().display());

    let mut counters = RunCounters::default();

    // 1. Noise filter
    let good_table = scratch.path().join(format!("SampleKmers_{}", config.k_size));
    let filtered = NoiseFilter::from_config(config).filter_file(sample_table, &good_table)?;
    counters.raw_distinct = filtered.raw_distinct;
    counters.raw_total = filtered.raw_total;
    counters.bad_kmers = filtered.bad_kmers;
    counters.low_entropy_kmers = filtered.low_entropy_kmers;
    counters.good_distinct = filtered.good_distinct;
    counters.good_total = filtered.good_total;

    // 2. Sample sharding
    let sample_dir = scratch.path().join("sample");
    ShardWriter::new(ShardLayout::sample(&sample_dir), config.prefix_len)
        .with_alphabet(&config.alphabet)
        .with_kmer_len(Some(config.k_size))
        .shard_file(&good_table)?;

    // 3. Database sharding
    let db_dir = scratch.path().join("db");
    fs::create_dir_all(&db_dir).map_err(|e| ClassifyError::io(&db_dir, e))?;
    let organisms = shard_database(&db, &db_dir, config)?;
    counters.db_distinct = organisms.iter().map(|o| o.stats.distinct).sum();
    counters.db_total = organisms.iter().map(|o| o.stats.total).sum();

    // 4. Matching
    let metas: Vec<OrganismMeta> = organisms.iter().map(|o| o.meta.clone()).collect();
    let (summary, matches) = ShardMatcher::from_config(config).run(&sample_dir, &db_dir, &metas)?;
    counters.matched_distinct = summary.distinct_matches;
    counters.matched_total = summary.total_matched_count;

    // 5. Aggregation
    let results = aggregate(&matches, &organisms, counters.good_distinct, counters.good_total);

    let scratch_path = scratch.path().to_path_buf();
    scratch.close().map_err(|e| ClassifyError::io(scratch_path, e))?;

    counters.elapsed = start.elapsed();
    info!(
        "Classification finished: {} organism(s), time taken {}",
        results.len(),
        counters.elapsed_hms()
    );

    Ok(ClassificationRun {
        results,
        counters,
        organisms: metas,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn setup(root: &Path) -> (PathBuf, PathBuf) {
        let sample = root.join("sample.tsv");
        fs::write(&sample, "AAAAA\t5\nAAAAC\t2\nTTTTG\t9\nTTTTT\t1\n").unwrap();
        fs::write(root.join("x.tsv"), "AAAAA\t3\nAAAAC\t1\n").unwrap();
        fs::write(root.join("y.tsv"), "TTTTG\t2\n").unwrap();
        let manifest = root.join("viruses_5");
        fs::write(&manifest, "X\t1\tspecies\tx.tsv\nY\t2\tspecies\ty.tsv\n").unwrap();
        (sample, manifest)
    }

    fn config(work_dir: &Path) -> ClassifyConfig {
        ClassifyConfig {
            k_size: 5,
            prefix_len: 2,
            entropy_threshold: 0.0,
            work_dir: work_dir.to_path_buf(),
            ..ClassifyConfig::default()
        }
    }

    #[test]
    fn test_classify_sample_api() {
        let tmp = tempfile::tempdir().unwrap();
        let (sample, manifest) = setup(tmp.path());
        let work = tmp.path().join("work");

        let run = classify_sample(
            &config(&work),
            &sample,
            &DatabaseSource::custom(&manifest).unwrap(),
        )
        .expect("Classification failed");

        let names: Vec<&str> = run.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Y", "X"]);
        assert_eq!(run.counters.bad_kmers, 1);
        assert_eq!(run.counters.matched_distinct, 3);
        assert_eq!(run.counters.matched_total, 16);
        assert_eq!(run.matches.len(), 3);

        // Scratch space is gone once the run returns.
        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    }

    #[test]
    fn test_scratch_removed_on_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, manifest) = setup(tmp.path());
        let sample = tmp.path().join("unsorted.tsv");
        fs::write(&sample, "TTTTG\t9\nAAAAA\t5\n").unwrap();
        let work = tmp.path().join("work");

        let err = classify_sample(
            &config(&work),
            &sample,
            &DatabaseSource::custom(&manifest).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, ClassifyError::UnsortedInput { .. }));
        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    }

    #[test]
    fn test_k_size_mismatch_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (sample, manifest) = setup(tmp.path());
        let mut cfg = config(tmp.path());
        cfg.k_size = 6;
        let err = classify_sample(&cfg, &sample, &DatabaseSource::custom(&manifest).unwrap()).unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidConfig(_)));
    }
}
