//src/report.rs

use std::fmt::Write as FmtWrite;
use std::path::Path;

use crate::error::{ClassifyError, Result};
use crate::types::{format_hms, ResultCollection, RunCounters, SampleSummary, VirusResult};

const FIELD_SEP: &str = ": ";

/// One saved result line:
/// `name: taxon_id: distinct_db: total_db: distinct_matched: total_matched: rank`.
pub fn result_line(result: &VirusResult) -> String {
    format!(
        "{name}{s}{taxon}{s}{ddb}{s}{tdb}{s}{dm}{s}{tm}{s}{rank}",
        s = FIELD_SEP,
        name = result.name,
        taxon = result.taxon_id,
        ddb = result.distinct_db_kmers,
        tdb = result.total_db_count,
        dm = result.distinct_matched_kmers,
        tm = result.total_matched_count,
        rank = result.rank,
    )
}

/// Rebuild a `VirusResult` from a saved line, recomputing the percentages
/// against the sample's good k-mer totals.
///
/// Fields are split from the right, so the name may itself contain `": "`.
pub fn parse_result_line(
    line: &str,
    line_no: u64,
    sample_good_distinct: u64,
    sample_good_total: u64,
) -> Result<VirusResult> {
    let malformed = |reason: String| ClassifyError::MalformedResultLine { line: line_no, reason };

    let fields: Vec<&str> = line.rsplitn(7, FIELD_SEP).collect();
    if fields.len() != 7 {
        return Err(malformed(format!("expected 7 fields, found {}", fields.len())));
    }
    // rsplitn yields fields last-first.
    let (rank, name) = (fields[0], fields[6]);
    let number = |field: &str, what: &str| -> Result<u64> {
        field
            .trim()
            .parse()
            .map_err(|_| malformed(format!("{what} '{field}' is not an integer")))
    };
    let total_matched = number(fields[1], "total matched")?;
    let distinct_matched = number(fields[2], "distinct matched")?;
    let total_db = number(fields[3], "total db")?;
    let distinct_db = number(fields[4], "distinct db")?;
    let taxon_id = u32::try_from(number(fields[5], "taxon id")?)
        .map_err(|_| malformed(format!("taxon id '{}' out of range", fields[5])))?;

    Ok(VirusResult::new(
        name.to_string(),
        taxon_id,
        distinct_matched,
        total_matched,
        distinct_db,
        total_db,
        rank.to_string(),
        sample_good_distinct,
        sample_good_total,
    ))
}

impl ResultCollection {
    /// Saved-result text, one line per organism in ranking order.
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        for result in self {
            output.push_str(&result_line(result));
            output.push('\n');
        }
        output
    }

    pub fn from_text(text: &str, sample_good_distinct: u64, sample_good_total: u64) -> Result<Self> {
        let mut results = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            results.push(parse_result_line(
                line,
                i as u64 + 1,
                sample_good_distinct,
                sample_good_total,
            )?);
        }
        Ok(ResultCollection::ranked(results))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text()).map_err(|e| ClassifyError::io(path, e))
    }

    pub fn load_from_file<P: AsRef<Path>>(
        path: P,
        sample_good_distinct: u64,
        sample_good_total: u64,
    ) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ClassifyError::io(path, e))?;
        Self::from_text(&text, sample_good_distinct, sample_good_total)
    }
}

/// Tab-separated result table with a header row.
pub fn render_table(results: &ResultCollection) -> String {
    let mut output = String::new();
    output.push_str(
        "name\ttaxID\trank\tkmers\ttotal\t%kmers\t%total\tdbKmers\tdbTotal\tspecific\tshared\n",
    );
    for r in results {
        writeln!(
            output,
            "{}\t{}\t{}\t{}\t{}\t{:.4}\t{:.4}\t{}\t{}\t{}\t{}",
            r.name,
            r.taxon_id,
            r.rank,
            r.distinct_matched_kmers,
            r.total_matched_count,
            r.pct_distinct,
            r.pct_total,
            r.distinct_db_kmers,
            r.total_db_count,
            r.specific_kmers,
            r.shared_kmers
        )
        .unwrap();
    }
    output
}

/// Human-readable run summary: stage counters followed by the result table.
pub fn render_summary(
    counters: &RunCounters,
    results: &ResultCollection,
    sample: Option<&SampleSummary>,
) -> String {
    let mut output = String::new();
    if let Some(sample) = sample {
        writeln!(
            output,
            "Reads in the sample: {}\nDistinct k-mers counted: {} (total {})",
            sample.reads, sample.distinct_kmers, sample.total_kmers
        )
        .unwrap();
    }
    writeln!(
        output,
        "Distinct k-mers in the sample table: {} (total {})",
        counters.raw_distinct, counters.raw_total
    )
    .unwrap();
    writeln!(output, "Removed as singletons: {}", counters.bad_kmers).unwrap();
    writeln!(output, "Removed for low complexity: {}", counters.low_entropy_kmers).unwrap();
    writeln!(
        output,
        "Distinct k-mers classified: {} (total {})",
        counters.good_distinct, counters.good_total
    )
    .unwrap();
    writeln!(
        output,
        "Distinct k-mers in the database: {} (total {})",
        counters.db_distinct, counters.db_total
    )
    .unwrap();
    writeln!(
        output,
        "Distinct sample k-mers matched: {} (total {})",
        counters.matched_distinct, counters.matched_total
    )
    .unwrap();
    writeln!(output, "Organisms found: {}", results.len()).unwrap();
    writeln!(output, "Time taken (hh:mm:ss): {}", format_hms(counters.elapsed)).unwrap();

    if !results.is_empty() {
        output.push('\n');
        output.push_str(&render_table(results));
    }

    let specific = results.top_specific(5);
    if !specific.is_empty() {
        output.push_str("\nMost specific k-mer evidence:\n");
        for r in specific {
            writeln!(output, "{}\t{} specific\t{} shared", r.name, r.specific_kmers, r.shared_kmers).unwrap();
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(name: &str) -> VirusResult {
        VirusResult::new(name.to_string(), 11676, 2, 7, 120, 480, "species".into(), 3, 16)
    }

    #[test]
    fn test_result_line_format() {
        assert_eq!(
            result_line(&sample_result("HIV-1")),
            "HIV-1: 11676: 120: 480: 2: 7: species"
        );
    }

    #[test]
    fn test_text_read_back() {
        let collection = ResultCollection::ranked(vec![
            sample_result("Virus: strain B"),
            VirusResult::new("Other".into(), 5, 1, 9, 10, 10, "genus".into(), 3, 16),
        ]);
        let restored = ResultCollection::from_text(&collection.to_text(), 3, 16).unwrap();
        assert_eq!(restored, collection);
        assert_eq!(restored.as_slice()[1].name, "Virus: strain B");
    }

    #[test]
    fn test_read_back_recomputes_percentages() {
        let restored = ResultCollection::from_text("X: 1: 10: 20: 5: 50: species\n", 10, 100).unwrap();
        let x = &restored.as_slice()[0];
        assert!((x.pct_distinct - 50.0).abs() < 1e-9);
        assert!((x.pct_total - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_line() {
        let err = ResultCollection::from_text("X: 1: ten: 20: 5: 50: species\n", 10, 100).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedResultLine { line: 1, .. }));
        assert!(ResultCollection::from_text("X: 1: 2\n", 10, 100).is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.txt");
        let collection = ResultCollection::ranked(vec![sample_result("HIV-1")]);
        collection.save_to_file(&path).unwrap();
        assert_eq!(ResultCollection::load_from_file(&path, 3, 16).unwrap(), collection);
    }

    #[test]
    fn test_table_shows_specificity() {
        let results = ResultCollection::ranked(vec![
            sample_result("HIV-1").with_specificity(2, 0),
            VirusResult::new("HIV-2".into(), 11709, 1, 3, 90, 300, "species".into(), 3, 16)
                .with_specificity(0, 1),
        ]);
        let table = render_table(&results);
        assert!(table.lines().next().unwrap().ends_with("\tspecific\tshared"));
        assert!(table.contains("HIV-1\t11676\tspecies\t2\t7\t66.6667\t43.7500\t120\t480\t2\t0\n"));

        let summary = render_summary(&RunCounters::default(), &results, None);
        assert!(summary.contains("Most specific k-mer evidence:\nHIV-1\t2 specific\t0 shared\n"));
        assert!(!summary.contains("HIV-2\t0 specific"));
    }

    #[test]
    fn test_summary_mentions_counts() {
        let counters = RunCounters {
            good_distinct: 3,
            good_total: 16,
            matched_distinct: 3,
            matched_total: 16,
            ..RunCounters::default()
        };
        let text = render_summary(&counters, &ResultCollection::default(), None);
        assert!(text.contains("Distinct k-mers classified: 3 (total 16)"));
        assert!(text.contains("Organisms found: 0"));
        assert!(!text.contains("taxID"));
    }
}
