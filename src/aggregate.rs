//src/aggregate.rs

use ahash::AHashMap;
use log::info;

use crate::database::OrganismShards;
use crate::shard_matcher::MatchIndex;
use crate::types::{ResultCollection, VirusResult};

/// Matched evidence for one organism, measured on the sample side.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrganismTally {
    /// Matched k-mers shared with this organism.
    pub distinct: u64,
    /// Sum of the sample counts of those k-mers.
    pub total: u64,
    /// Matched k-mers found in no other organism.
    pub specific: u64,
    /// Matched k-mers also found in at least one other organism.
    pub shared: u64,
}

/// Sum the match index per organism. A k-mer shared by several organisms
/// counts in full for each of them.
pub fn tally_by_organism(index: &MatchIndex) -> AHashMap<usize, OrganismTally> {
    let mut tallies: AHashMap<usize, OrganismTally> = AHashMap::new();
    for record in index.iter() {
        let is_specific = record.organism_counts.len() == 1;
        for &organism in record.organism_counts.keys() {
            let tally = tallies.entry(organism).or_default();
            tally.distinct += 1;
            tally.total += record.sample_count;
            if is_specific {
                tally.specific += 1;
            } else {
                tally.shared += 1;
            }
        }
    }
    tallies
}

/// Build the ranked per-organism results.
///
/// `sample_good_distinct` and `sample_good_total` are the noise filter's
/// counters; they are the denominators of the two percentages. Organisms
/// without matches are left out, so an empty collection means no hits.
pub fn aggregate(
    index: &MatchIndex,
    organisms: &[OrganismShards],
    sample_good_distinct: u64,
    sample_good_total: u64,
) -> ResultCollection {
    let tallies = tally_by_organism(index);

    let results: Vec<VirusResult> = organisms
        .iter()
        .filter_map(|organism| {
            let tally = tallies.get(&organism.meta.index)?;
            if tally.distinct == 0 {
                return None;
            }
            Some(VirusResult::new(
                organism.meta.name.clone(),
                organism.meta.taxon_id,
                tally.distinct,
                tally.total,
                organism.stats.distinct,
                organism.stats.total,
                organism.meta.rank.clone(),
                sample_good_distinct,
                sample_good_total,
            )
            .with_specificity(tally.specific, tally.shared))
        })
        .collect();

    let collection = ResultCollection::ranked(results);
    info!("{} organism(s) found in the sample", collection.len());
    collection
}
