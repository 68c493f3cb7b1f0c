//src/database.rs

use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::config::ClassifyConfig;
use crate::error::{ClassifyError, Result};
use crate::kmer_table::open_table;
use crate::shard_writer::{ShardLayout, ShardStats, ShardWriter};

/// Where the reference k-mer database comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    /// A packaged database, found at `<builtin_db_dir>/<library>_<k_size>`.
    BuiltIn { library: String, k_size: usize },
    /// A user-supplied manifest file.
    Custom { path: PathBuf, k_size: usize },
}

impl DatabaseSource {
    pub fn built_in(library: impl Into<String>, k_size: usize) -> Self {
        DatabaseSource::BuiltIn {
            library: library.into(),
            k_size,
        }
    }

    /// A custom database whose k-mer size is taken from the `_<k>` suffix of
    /// its file name, e.g. `my_viruses_32` or `my_viruses_32.tsv`.
    pub fn custom<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let k_size = k_size_from_name(&path).ok_or_else(|| {
            ClassifyError::InvalidConfig(format!(
                "cannot read a k-mer size from the name of {}; expected a '_<k>' suffix",
                path.display()
            ))
        })?;
        Ok(DatabaseSource::Custom { path, k_size })
    }

    pub fn custom_with_k<P: Into<PathBuf>>(path: P, k_size: usize) -> Self {
        DatabaseSource::Custom {
            path: path.into(),
            k_size,
        }
    }

    pub fn k_size(&self) -> usize {
        match self {
            DatabaseSource::BuiltIn { k_size, .. } | DatabaseSource::Custom { k_size, .. } => *k_size,
        }
    }

    pub fn manifest_path(&self, builtin_db_dir: &Path) -> PathBuf {
        match self {
            DatabaseSource::BuiltIn { library, k_size } => {
                builtin_db_dir.join(format!("{library}_{k_size}"))
            }
            DatabaseSource::Custom { path, .. } => path.clone(),
        }
    }

    /// Read the manifest and check that every organism table exists.
    pub fn resolve(&self, builtin_db_dir: &Path) -> Result<Database> {
        let manifest = self.manifest_path(builtin_db_dir);
        if !manifest.is_file() {
            return Err(ClassifyError::MissingDatabaseSource(format!(
                "no database manifest at {}",
                manifest.display()
            )));
        }
        let db = parse_manifest(&manifest, self.k_size())?;
        for organism in &db.organisms {
            if !organism.table.is_file() {
                return Err(ClassifyError::MissingDatabaseSource(format!(
                    "k-mer table {} for '{}' not found",
                    organism.table.display(),
                    organism.meta.name
                )));
            }
        }
        info!(
            "Loaded database {} with {} organisms, k={}",
            manifest.display(),
            db.organisms.len(),
            db.k_size
        );
        Ok(db)
    }
}

/// Parse the `_<k>` suffix of a database file name.
pub fn k_size_from_name(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let (_, k) = stem.rsplit_once('_')?;
    k.parse().ok().filter(|&k| k > 0)
}

/// Identity of one reference organism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganismMeta {
    /// Position in the manifest; also names the organism's shard files.
    pub index: usize,
    pub name: String,
    pub taxon_id: u32,
    pub rank: String,
}

/// One manifest entry: an organism and its sorted k-mer table.
#[derive(Debug, Clone)]
pub struct OrganismSource {
    pub meta: OrganismMeta,
    pub table: PathBuf,
}

impl OrganismSource {
    pub fn open(&self) -> Result<Box<dyn BufRead>> {
        open_table(&self.table)
    }
}

/// A resolved database: its k-mer size and organism tables.
#[derive(Debug, Clone)]
pub struct Database {
    pub manifest: PathBuf,
    pub k_size: usize,
    pub organisms: Vec<OrganismSource>,
}

/// Parses a manifest file in the format:
/// ```text
/// <name>\t<taxon_id>\t<rank>\t<table_path>
/// ```
/// `table_path` is relative to the manifest's directory unless absolute.
/// Blank lines, `#` comments and a leading `name\ttaxon_id\trank\t...` header are skipped.
pub fn parse_manifest(path: &Path, k_size: usize) -> Result<Database> {
    let text = std::fs::read_to_string(path).map_err(|e| ClassifyError::io(path, e))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let invalid = |line: usize, reason: String| ClassifyError::InvalidManifest {
        path: path.to_path_buf(),
        line: line as u64 + 1,
        reason,
    };

    let mut organisms = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        if organisms.is_empty() && is_header(&parts) {
            continue;
        }
        if parts.len() != 4 {
            return Err(invalid(i, format!("expected 4 tab-separated fields, found {}", parts.len())));
        }

        let name = parts[0].trim();
        if name.is_empty() {
            return Err(invalid(i, "organism name is empty".to_string()));
        }
        let taxon_id: u32 = parts[1]
            .trim()
            .parse()
            .map_err(|_| invalid(i, format!("taxon id '{}' is not an integer", parts[1].trim())))?;
        let rank = parts[2].trim();

        let table = PathBuf::from(parts[3].trim());
        let table = if table.is_absolute() { table } else { base.join(table) };

        organisms.push(OrganismSource {
            meta: OrganismMeta {
                index: organisms.len(),
                name: name.to_string(),
                taxon_id,
                rank: rank.to_string(),
            },
            table,
        });
    }

    if organisms.is_empty() {
        return Err(invalid(0, "manifest lists no organisms".to_string()));
    }

    Ok(Database {
        manifest: path.to_path_buf(),
        k_size,
        organisms,
    })
}

fn is_header(parts: &[&str]) -> bool {
    parts.len() == 4
        && parts[..3]
            .iter()
            .zip(MANIFEST_HEADER)
            .all(|(field, column)| field.trim().eq_ignore_ascii_case(column))
}

const MANIFEST_HEADER: [&str; 3] = ["name", "taxon_id", "rank"];

/// The shards of one organism and the counts of its table.
#[derive(Debug, Clone)]
pub struct OrganismShards {
    pub meta: OrganismMeta,
    pub layout: ShardLayout,
    pub stats: ShardStats,
}

/// Shard every organism table of `db` into `dir`. Database tables are not
/// noise filtered.
pub fn shard_database(db: &Database, dir: &Path, config: &ClassifyConfig) -> Result<Vec<OrganismShards>> {
    let mut sharded = Vec::with_capacity(db.organisms.len());
    for organism in &db.organisms {
        let layout = ShardLayout::organism(dir, organism.meta.index);
        let writer = ShardWriter::new(layout.clone(), config.prefix_len)
            .with_alphabet(&config.alphabet)
            .with_kmer_len(Some(db.k_size));

        let stats = writer.shard_table(organism.open()?, &organism.table.display().to_string())?;
        if stats.distinct == 0 {
            warn!("Database table for '{}' is empty", organism.meta.name);
        }
        sharded.push(OrganismShards {
            meta: organism.meta.clone(),
            layout,
            stats,
        });
    }

    let distinct: u64 = sharded.iter().map(|o| o.stats.distinct).sum();
    let total: u64 = sharded.iter().map(|o| o.stats.total).sum();
    info!(
        "Sharded database: {} distinct k-mers over {} organisms, total count {}",
        distinct,
        sharded.len(),
        total
    );
    Ok(sharded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_db(dir: &Path) -> PathBuf {
        fs::write(dir.join("x.tsv"), "AAAAA\t3\nAAAAC\t1\n").unwrap();
        fs::write(dir.join("y.tsv"), "TTTTG\t2\n").unwrap();
        let manifest = dir.join("viruses_5");
        fs::write(
            &manifest,
            "name\ttaxon_id\trank\ttable\n# comment\nVirus X\t101\tspecies\tx.tsv\nVirus Y\t202\tgenus\ty.tsv\n",
        )
        .unwrap();
        manifest
    }

    #[test]
    fn test_organism_named_name_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("odd_5");
        fs::write(&manifest, "Name\t7\tspecies\tn.tsv\nOther\t8\tspecies\to.tsv\n").unwrap();
        let db = parse_manifest(&manifest, 5).unwrap();
        assert_eq!(db.organisms.len(), 2);
        assert_eq!(db.organisms[0].meta.name, "Name");
        assert_eq!(db.organisms[0].meta.taxon_id, 7);
    }

    #[test]
    fn test_k_size_from_name() {
        assert_eq!(k_size_from_name(Path::new("/db/viruses_32")), Some(32));
        assert_eq!(k_size_from_name(Path::new("my_db_22.tsv")), Some(22));
        assert_eq!(k_size_from_name(Path::new("viruses")), None);
        assert!(DatabaseSource::custom("viruses.tsv").is_err());
    }

    #[test]
    fn test_resolve_custom() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_db(dir.path());
        let db = DatabaseSource::custom(&manifest).unwrap().resolve(Path::new("/unused")).unwrap();
        assert_eq!(db.k_size, 5);
        assert_eq!(db.organisms.len(), 2);
        assert_eq!(db.organisms[1].meta.name, "Virus Y");
        assert_eq!(db.organisms[1].meta.taxon_id, 202);
        assert_eq!(db.organisms[1].meta.index, 1);
        assert_eq!(db.organisms[0].table, dir.path().join("x.tsv"));
    }

    #[test]
    fn test_resolve_built_in() {
        let dir = tempfile::tempdir().unwrap();
        write_db(dir.path());
        let source = DatabaseSource::built_in("viruses", 5);
        assert_eq!(source.manifest_path(dir.path()), dir.path().join("viruses_5"));
        assert!(source.resolve(dir.path()).is_ok());

        let missing = DatabaseSource::built_in("viruses", 32).resolve(dir.path());
        assert!(matches!(missing, Err(ClassifyError::MissingDatabaseSource(_))));
    }

    #[test]
    fn test_missing_table_is_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("db_5");
        fs::write(&manifest, "Virus Z\t7\tspecies\tnowhere.tsv\n").unwrap();
        let err = DatabaseSource::custom(&manifest).unwrap().resolve(dir.path()).unwrap_err();
        assert!(matches!(err, ClassifyError::MissingDatabaseSource(_)));
    }

    #[test]
    fn test_bad_taxon_id() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("db_5");
        fs::write(&manifest, "Virus Z\tnot-a-number\tspecies\tz.tsv\n").unwrap();
        let err = parse_manifest(&manifest, 5).unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidManifest { line: 1, .. }));
    }

    #[test]
    fn test_shard_database_counts() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_db(dir.path());
        let db = parse_manifest(&manifest, 5).unwrap();
        let mut config = ClassifyConfig::with_k(5);
        config.prefix_len = 2;

        let shards_dir = dir.path().join("shards");
        let sharded = shard_database(&db, &shards_dir, &config).unwrap();
        assert_eq!(sharded[0].stats.distinct, 2);
        assert_eq!(sharded[0].stats.total, 4);
        assert_eq!(sharded[1].stats.total, 2);
        assert!(sharded[0].layout.shard_path("AA").is_file());
        assert!(sharded[1].layout.shard_path("TT").is_file());
        assert!(!sharded[1].layout.shard_path("AA").exists());
    }
}
