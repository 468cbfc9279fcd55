//! TF family classification lookup
//!
//! The family taxonomy itself is external data. The core only needs a
//! capability mapping a protein identifier to family labels at a chosen
//! classification depth, so the lookup is an injected trait and tests can
//! run against an in-memory table.

use crate::{SiteBreakError, SiteBreakResult};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Sentinel family for motifs without any annotation
pub const UNDEFINED_FAMILY: &str = "Undefined";

/// Protein identifier embedded in a motif name (up to the first `.`)
pub fn motif_uniprot_id(motif: &str) -> &str {
    motif.split('.').next().unwrap_or(motif)
}

/// Maps protein identifiers to TF family labels
pub trait FamilyResolver: Sync {
    /// Family labels for a protein identifier at the given classification
    /// depth. Unannotated identifiers yield an empty list.
    fn families(&self, uniprot_id: &str, level: u8) -> Vec<String>;
}

/// Family labels for a set of motif names, deduplicated in first-seen order
pub fn families_for_motifs<'a, I>(
    resolver: &dyn FamilyResolver,
    motifs: I,
    level: u8,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut families = Vec::new();
    for motif in motifs {
        for family in resolver.families(motif_uniprot_id(motif), level) {
            if !families.contains(&family) {
                families.push(family);
            }
        }
    }
    families
}

/// Resolver with no annotations at all; every lookup is empty
#[derive(Debug, Default, Clone)]
pub struct EmptyResolver;

impl FamilyResolver for EmptyResolver {
    fn families(&self, _uniprot_id: &str, _level: u8) -> Vec<String> {
        Vec::new()
    }
}

/// File-backed family table
///
/// The table is TSV with one line per `(identifier, level)` pair:
/// `uniprot_id <TAB> level <TAB> family;family;...`. Lines starting with
/// `#` are comments.
#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    entries: HashMap<(String, u8), Vec<String>>,
}

impl TableResolver {
    pub fn from_path<P: AsRef<Path>>(path: P) -> SiteBreakResult<Self> {
        let file = File::open(&path).map_err(|_| {
            SiteBreakError::FileNotFound(path.as_ref().to_string_lossy().to_string())
        })?;

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .from_reader(file);

        let mut entries: HashMap<(String, u8), Vec<String>> = HashMap::new();
        for row in csv_reader.records() {
            let record = row?;
            if record.len() < 3 {
                return Err(SiteBreakError::InvalidConfig(format!(
                    "family table line needs 3 columns, got {}",
                    record.len()
                )));
            }

            let uniprot_id = record[0].to_string();
            let level = record[1].parse::<u8>().map_err(|_| {
                SiteBreakError::InvalidConfig(format!(
                    "invalid classification level in family table: {}",
                    &record[1]
                ))
            })?;
            let families: Vec<String> = record[2]
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();

            entries.insert((uniprot_id, level), families);
        }

        Ok(Self { entries })
    }

    /// Build a resolver from in-memory entries
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u8, Vec<S>)>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(id, level, families)| {
                (
                    (id.into(), level),
                    families.into_iter().map(Into::into).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FamilyResolver for TableResolver {
    fn families(&self, uniprot_id: &str, level: u8) -> Vec<String> {
        self.entries
            .get(&(uniprot_id.to_string(), level))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_table_resolver_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "# uniprot\tlevel\tfamilies").unwrap();
        writeln!(temp_file, "SP1_HUMAN\t3\tC2H2 zinc fingers").unwrap();
        writeln!(temp_file, "ANDR_HUMAN\t3\tSteroid receptors;NR3 class").unwrap();

        let resolver = TableResolver::from_path(temp_file.path()).unwrap();
        assert_eq!(resolver.len(), 2);
        assert_eq!(
            resolver.families("SP1_HUMAN", 3),
            vec!["C2H2 zinc fingers".to_string()]
        );
        assert_eq!(
            resolver.families("ANDR_HUMAN", 3),
            vec!["Steroid receptors".to_string(), "NR3 class".to_string()]
        );
        assert!(resolver.families("SP1_HUMAN", 2).is_empty());
        assert!(resolver.families("UNKNOWN", 3).is_empty());
    }

    #[test]
    fn test_table_resolver_rejects_bad_level() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "SP1_HUMAN\tdeep\tC2H2 zinc fingers").unwrap();
        assert!(TableResolver::from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_motif_uniprot_id() {
        assert_eq!(motif_uniprot_id("ANDR_HUMAN.H10MO.A"), "ANDR_HUMAN");
        assert_eq!(motif_uniprot_id("MAZ_f1"), "MAZ_f1");
    }

    #[test]
    fn test_families_for_motifs_deduplicates() {
        let resolver = TableResolver::from_entries([
            ("SP1_HUMAN", 3, vec!["C2H2 zinc fingers"]),
            ("SP3_HUMAN", 3, vec!["C2H2 zinc fingers"]),
            ("ANDR_HUMAN", 3, vec!["Steroid receptors"]),
        ]);

        let families = families_for_motifs(
            &resolver,
            [
                "SP1_HUMAN.H10MO.A",
                "SP3_HUMAN.H10MO.B",
                "ANDR_HUMAN.H10MO.A",
                "UNKNOWN.H10MO.D",
            ],
            3,
        );
        assert_eq!(
            families,
            vec![
                "C2H2 zinc fingers".to_string(),
                "Steroid receptors".to_string()
            ]
        );
    }

    #[test]
    fn test_empty_resolver() {
        assert!(EmptyResolver.families("SP1_HUMAN", 3).is_empty());
    }
}
