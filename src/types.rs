//src/types.rs

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One line of a k-mer table: a sequence and how often it was counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerRecord {
    pub sequence: String,
    pub count: u64,
}

impl KmerRecord {
    /// The shard key of this record: its first `prefix_len` symbols.
    ///
    /// Callers guarantee `sequence.len() >= prefix_len`; the table reader
    /// rejects shorter records.
    pub fn shard_key(&self, prefix_len: usize) -> &str {
        &self.sequence[..prefix_len]
    }
}

/// A k-mer found in the sample and in at least one organism of the database.
///
/// `organism_counts` maps organism index (position in the database manifest)
/// to the k-mer's count in that organism's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub sequence: String,
    pub sample_count: u64,
    pub organism_counts: BTreeMap<usize, u64>,
}

/// Per-organism classification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirusResult {
    pub name: String,
    pub taxon_id: u32,
    /// Distinct sample k-mers shared with this organism.
    pub distinct_matched_kmers: u64,
    /// Sum of the sample counts of those k-mers.
    pub total_matched_count: u64,
    /// Distinct k-mers in the organism's database table.
    pub distinct_db_kmers: u64,
    /// Sum of counts in the organism's database table.
    pub total_db_count: u64,
    pub rank: String,
    /// `distinct_matched_kmers` as a percentage of the sample's good distinct k-mers.
    pub pct_distinct: f64,
    /// `total_matched_count` as a percentage of the sample's good k-mer total.
    pub pct_total: f64,
    /// Matched k-mers found in this organism only.
    #[serde(default)]
    pub specific_kmers: u64,
    /// Matched k-mers this organism shares with another one.
    #[serde(default)]
    pub shared_kmers: u64,
}

impl VirusResult {
    /// Build a result, deriving both percentages from the sample's good k-mer totals.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        taxon_id: u32,
        distinct_matched_kmers: u64,
        total_matched_count: u64,
        distinct_db_kmers: u64,
        total_db_count: u64,
        rank: String,
        sample_good_distinct: u64,
        sample_good_total: u64,
    ) -> Self {
        Self {
            pct_distinct: percentage(distinct_matched_kmers, sample_good_distinct),
            pct_total: percentage(total_matched_count, sample_good_total),
            name,
            taxon_id,
            distinct_matched_kmers,
            total_matched_count,
            distinct_db_kmers,
            total_db_count,
            rank,
            specific_kmers: 0,
            shared_kmers: 0,
        }
    }

    pub fn with_specificity(mut self, specific_kmers: u64, shared_kmers: u64) -> Self {
        self.specific_kmers = specific_kmers;
        self.shared_kmers = shared_kmers;
        self
    }

    /// Ranking order: more matched evidence first.
    ///
    /// Total matched count, then distinct matched k-mers, both descending;
    /// name and taxon id make the order total.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .total_matched_count
            .cmp(&self.total_matched_count)
            .then_with(|| other.distinct_matched_kmers.cmp(&self.distinct_matched_kmers))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.taxon_id.cmp(&other.taxon_id))
    }
}

/// `100 * part / whole`, or 0 when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// The ranked results of one classification run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCollection {
    results: Vec<VirusResult>,
}

impl ResultCollection {
    /// Take ownership of `results` and put them in ranking order.
    pub fn ranked(mut results: Vec<VirusResult>) -> Self {
        results.sort_by(VirusResult::rank_cmp);
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VirusResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[VirusResult] {
        &self.results
    }

    /// The `n` highest-ranked organisms (fewer if the collection is smaller).
    pub fn top(&self, n: usize) -> &[VirusResult] {
        &self.results[..n.min(self.results.len())]
    }

    /// Up to `n` organisms with specific k-mers, most specific first.
    pub fn top_specific(&self, n: usize) -> Vec<&VirusResult> {
        let mut specific: Vec<&VirusResult> =
            self.results.iter().filter(|r| r.specific_kmers > 0).collect();
        specific.sort_by(|a, b| b.specific_kmers.cmp(&a.specific_kmers).then_with(|| a.rank_cmp(b)));
        specific.truncate(n);
        specific
    }

    pub fn get(&self, name: &str) -> Option<&VirusResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

impl<'a> IntoIterator for &'a ResultCollection {
    type Item = &'a VirusResult;
    type IntoIter = std::slice::Iter<'a, VirusResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Summary reported by the external k-mer counting tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub reads: u64,
    pub distinct_kmers: u64,
    pub total_kmers: u64,
}

/// Counters collected across the stages of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunCounters {
    /// Distinct k-mers in the raw sample table.
    pub raw_distinct: u64,
    /// Sum of counts in the raw sample table.
    pub raw_total: u64,
    /// Singleton k-mers removed.
    pub bad_kmers: u64,
    /// Low-complexity k-mers removed.
    pub low_entropy_kmers: u64,
    pub good_distinct: u64,
    pub good_total: u64,
    /// Distinct k-mers in all organism tables together (a k-mer shared by two
    /// organisms counts twice).
    pub db_distinct: u64,
    pub db_total: u64,
    pub matched_distinct: u64,
    pub matched_total: u64,
    pub elapsed: Duration,
}

impl RunCounters {
    /// Elapsed time as `hh:mm:ss`.
    pub fn elapsed_hms(&self) -> String {
        format_hms(self.elapsed)
    }
}

pub fn format_hms(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
