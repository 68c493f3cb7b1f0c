//src/kmer_table.rs

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{ClassifyError, Result};
use crate::types::{KmerRecord, SampleSummary};

/// Open a k-mer table for line reading, transparently decompressing `.gz` files.
pub fn open_table<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| ClassifyError::io(path, e))?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Write one `sequence<TAB>count` line.
pub fn write_record<W: Write>(out: &mut W, record: &KmerRecord) -> std::io::Result<()> {
    writeln!(out, "{}\t{}", record.sequence, record.count)
}

/// Streaming reader over a `sequence<TAB>count` table.
///
/// Every record is validated as it is read:
/// - exactly two tab-separated fields, the count a non-negative integer;
/// - every symbol of the sequence in the alphabet;
/// - sequence length at least `min_len` and, if set, exactly `kmer_len`;
/// - sequences strictly increasing in byte order. A decrease is reported as
///   `UnsortedInput`, a repeat as `DuplicateKmer`.
///
/// Empty lines are skipped.
pub struct TableReader<R> {
    reader: R,
    source_name: String,
    line_no: u64,
    buf: String,
    previous: Option<String>,
    alphabet: [bool; 256],
    min_len: usize,
    kmer_len: Option<usize>,
}

impl<R: BufRead> TableReader<R> {
    /// A reader accepting the DNA alphabet and sequences of any positive length.
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        let mut reader = Self {
            reader,
            source_name: source_name.into(),
            line_no: 0,
            buf: String::new(),
            previous: None,
            alphabet: [false; 256],
            min_len: 1,
            kmer_len: None,
        };
        reader.set_alphabet(&['A', 'C', 'G', 'T']);
        reader
    }

    pub fn with_alphabet(mut self, alphabet: &[char]) -> Self {
        self.set_alphabet(alphabet);
        self
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len.max(1);
        self
    }

    pub fn with_kmer_len(mut self, kmer_len: Option<usize>) -> Self {
        self.kmer_len = kmer_len;
        self
    }

    fn set_alphabet(&mut self, alphabet: &[char]) {
        self.alphabet = [false; 256];
        for &c in alphabet {
            if c.is_ascii() {
                self.alphabet[c as usize] = true;
            }
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ClassifyError {
        ClassifyError::MalformedInputLine {
            source_name: self.source_name.clone(),
            line: self.line_no,
            reason: reason.into(),
        }
    }

    /// Read the next record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<KmerRecord>> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_line(&mut self.buf)
                .map_err(|e| ClassifyError::io(&self.source_name, e))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }

            let record = self.parse_line(line)?;
            self.check_order(&record.sequence)?;
            return Ok(Some(record));
        }
    }

    fn parse_line(&self, line: &str) -> Result<KmerRecord> {
        let mut fields = line.split('\t');
        let (sequence, count) = match (fields.next(), fields.next(), fields.next()) {
            (Some(seq), Some(count), None) => (seq, count),
            _ => return Err(self.malformed("expected 'sequence<TAB>count'")),
        };

        let count: u64 = count
            .trim()
            .parse()
            .map_err(|_| self.malformed(format!("count '{count}' is not a non-negative integer")))?;

        if let Some(bad) = sequence.bytes().find(|&b| !self.alphabet[b as usize]) {
            return Err(self.malformed(format!(
                "symbol '{}' is not in the alphabet",
                char::from(bad)
            )));
        }
        if sequence.len() < self.min_len {
            return Err(self.malformed(format!(
                "sequence '{sequence}' is shorter than {}",
                self.min_len
            )));
        }
        if let Some(k) = self.kmer_len {
            if sequence.len() != k {
                return Err(self.malformed(format!(
                    "sequence '{sequence}' has length {}, expected {k}",
                    sequence.len()
                )));
            }
        }

        Ok(KmerRecord {
            sequence: sequence.to_string(),
            count,
        })
    }

    fn check_order(&mut self, sequence: &str) -> Result<()> {
        if let Some(prev) = &self.previous {
            if sequence == prev.as_str() {
                return Err(ClassifyError::DuplicateKmer {
                    source_name: self.source_name.clone(),
                    line: self.line_no,
                    sequence: sequence.to_string(),
                });
            }
            if sequence < prev.as_str() {
                return Err(ClassifyError::UnsortedInput {
                    source_name: self.source_name.clone(),
                    line: self.line_no,
                    previous: prev.clone(),
                    current: sequence.to_string(),
                });
            }
        }
        match &mut self.previous {
            Some(prev) => {
                prev.clear();
                prev.push_str(sequence);
            }
            None => self.previous = Some(sequence.to_string()),
        }
        Ok(())
    }
}

impl<R: BufRead> Iterator for TableReader<R> {
    type Item = Result<KmerRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Parses the counting tool's summary file in the format:
/// ```text
/// reads\t<n>
/// distinct_kmers\t<n>
/// total_kmers\t<n>
/// ```
/// Unknown keys and `#` comments are ignored; missing keys stay 0.
pub fn read_sample_summary<P: AsRef<Path>>(path: P) -> Result<SampleSummary> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ClassifyError::io(path, e))?;
    let mut summary = SampleSummary::default();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('\t') else {
            continue;
        };
        let slot = match key.trim() {
            "reads" => &mut summary.reads,
            "distinct_kmers" => &mut summary.distinct_kmers,
            "total_kmers" => &mut summary.total_kmers,
            _ => continue,
        };
        *slot = value.trim().parse().map_err(|_| ClassifyError::MalformedInputLine {
            source_name: path.display().to_string(),
            line: i as u64 + 1,
            reason: format!("value '{}' for '{}' is not an integer", value.trim(), key.trim()),
        })?;
    }
    Ok(summary)
}
