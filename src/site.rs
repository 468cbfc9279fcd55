//! Motif scanner output records and their derived predicates

use crate::seq::complement_base;
use crate::{SiteBreakError, SiteBreakResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

/// Strand orientation of a predicted site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Direct,
    Reverse,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Orientation::Direct => write!(f, "direct"),
            Orientation::Reverse => write!(f, "reverse"),
        }
    }
}

/// One scanner output row: a candidate motif site scored under the two
/// compared sequence states.
///
/// Positions are relative to the variant position and may be negative.
/// `fold_change` follows the `score(state 2) / score(state 1)` convention,
/// so values below 1 mean the site is stronger in state 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub variant_id: String,
    pub motif: String,
    pub pos_1: i64,
    pub orientation_1: Orientation,
    pub seq_1: String,
    pub pos_2: i64,
    pub orientation_2: Orientation,
    pub seq_2: String,
    pub alleles: String,
    pub pvalue_1: f64,
    pub pvalue_2: f64,
    pub fold_change: f64,
}

impl SiteRecord {
    pub fn log2_fold_change(&self) -> f64 {
        self.fold_change.log2()
    }

    pub fn site_length(&self) -> usize {
        self.seq_1.len()
    }

    pub fn site_before_substitution(&self, pvalue_cutoff: f64) -> bool {
        self.pvalue_1 <= pvalue_cutoff
    }

    pub fn site_after_substitution(&self, pvalue_cutoff: f64) -> bool {
        self.pvalue_2 <= pvalue_cutoff
    }

    /// Has a site of the requested strength on at least one allele.
    pub fn has_site_on_any_allele(&self, pvalue_cutoff: f64) -> bool {
        self.site_before_substitution(pvalue_cutoff) || self.site_after_substitution(pvalue_cutoff)
    }

    pub fn is_disrupted(&self, fold_change_cutoff: f64) -> bool {
        self.fold_change <= 1.0 / fold_change_cutoff
    }

    pub fn is_emerged(&self, fold_change_cutoff: f64) -> bool {
        self.fold_change >= fold_change_cutoff
    }

    /// The best-scoring placement moved or switched strand.
    pub fn position_changed(&self) -> bool {
        self.pos_1 != self.pos_2 || self.orientation_1 != self.orientation_2
    }

    fn allele_in_word(word: &str, orientation: Orientation) -> Option<char> {
        let letter = word.chars().find(|c| c.is_ascii_uppercase())?;
        match orientation {
            Orientation::Direct => Some(letter),
            Orientation::Reverse => Some(complement_base(letter)),
        }
    }

    /// The allele letter embedded (uppercase) in the state-1 site word,
    /// complemented back to the direct strand.
    pub fn allele_1(&self) -> Option<char> {
        Self::allele_in_word(&self.seq_1, self.orientation_1)
    }

    pub fn allele_2(&self) -> Option<char> {
        Self::allele_in_word(&self.seq_2, self.orientation_2)
    }

    /// The allele of the stronger-scoring state.
    pub fn best_allele(&self) -> Option<char> {
        if self.fold_change < 1.0 {
            self.allele_1()
        } else {
            self.allele_2()
        }
    }

    pub fn best_site_position(&self) -> i64 {
        if self.fold_change < 1.0 {
            self.pos_1
        } else {
            self.pos_2
        }
    }

    pub fn best_site_word(&self) -> &str {
        if self.fold_change < 1.0 {
            &self.seq_1
        } else {
            &self.seq_2
        }
    }

    pub fn worse_site_word(&self) -> &str {
        if self.fold_change > 1.0 {
            &self.seq_1
        } else {
            &self.seq_2
        }
    }

    pub fn best_site_range(&self) -> Range<i64> {
        let start = self.best_site_position();
        start..start + self.site_length() as i64
    }

    /// The best site's window covers the given position.
    pub fn overlaps_position(&self, pos: i64) -> bool {
        self.best_site_range().contains(&pos)
    }

    /// Variant position within the state-1 site, glued across strands.
    pub fn snv_position_in_pwm(&self) -> i64 {
        match self.orientation_1 {
            Orientation::Direct => -self.pos_1,
            Orientation::Reverse => self.pos_1 + self.site_length() as i64 - 1,
        }
    }

    pub fn substitution_in_core(&self) -> bool {
        let pos = self.snv_position_in_pwm();
        pos >= 0 && pos < self.site_length() as i64
    }

    pub fn substitution_in_flank(&self) -> bool {
        !self.substitution_in_core()
    }

    /// Protein identifier embedded in the motif name (up to the first `.`).
    pub fn uniprot_id(&self) -> &str {
        self.motif.split('.').next().unwrap_or(&self.motif)
    }

    /// Quality grade embedded in the motif name (after the last `.`).
    pub fn quality_grade(&self) -> Option<&str> {
        if self.motif.contains('.') {
            self.motif.rsplit('.').next()
        } else {
            None
        }
    }

    /// Motifs graded A, B or C are considered reliable.
    pub fn is_reliable(&self) -> bool {
        matches!(self.quality_grade(), Some("A") | Some("B") | Some("C"))
    }
}

/// Parse scanner output lines into records. Lines starting with `#` are
/// skipped; any other unparseable line is a hard error.
pub fn parse_records<R: Read>(reader: R) -> SiteBreakResult<Vec<SiteRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        let record: SiteRecord =
            row.map_err(|e| SiteBreakError::MalformedRecord(e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

/// Read scanner output records from a file
pub fn read_records<P: AsRef<Path>>(path: P) -> SiteBreakResult<Vec<SiteRecord>> {
    let file = File::open(&path)
        .map_err(|_| SiteBreakError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;
    parse_records(file)
}

/// Group records by the variant label they were scored for
pub fn group_by_variant(records: Vec<SiteRecord>) -> HashMap<String, Vec<SiteRecord>> {
    let mut groups: HashMap<String, Vec<SiteRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.variant_id.clone()).or_default().push(record);
    }
    groups
}

#[cfg(test)]
pub(crate) fn test_record(motif: &str, pvalue_1: f64, pvalue_2: f64, fold_change: f64) -> SiteRecord {
    SiteRecord {
        variant_id: "5,G".to_string(),
        motif: motif.to_string(),
        pos_1: -7,
        orientation_1: Orientation::Direct,
        seq_1: "cggctgaGgaggaggag".to_string(),
        pos_2: -7,
        orientation_2: Orientation::Direct,
        seq_2: "cggctgaCgaggaggag".to_string(),
        alleles: "G/C".to_string(),
        pvalue_1,
        pvalue_2,
        fold_change,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LINE: &str = "27610826_3\tMAZ_f1\t-7\tdirect\tcggctgaGgaggaggag\t-7\tdirect\tcggctgaCgaggaggag\tG/C\t1.1218764110455249E-4\t9.602413003842941E-4\t0.11683275970285215";

    #[test]
    fn test_parse_sample_line() {
        let records = parse_records(SAMPLE_LINE.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.variant_id, "27610826_3");
        assert_eq!(record.motif, "MAZ_f1");
        assert_eq!(record.pos_1, -7);
        assert_eq!(record.orientation_1, Orientation::Direct);
        assert_eq!(record.alleles, "G/C");
        assert!((record.pvalue_1 - 1.1218764110455249e-4).abs() < 1e-18);
        assert!((record.fold_change - 0.11683275970285215).abs() < 1e-12);
    }

    #[test]
    fn test_parse_skips_comment_lines() {
        let input = format!("# header comment\n{}\n", SAMPLE_LINE);
        let records = parse_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let err = parse_records("not\tenough\tfields".as_bytes()).unwrap_err();
        assert!(matches!(err, SiteBreakError::MalformedRecord(_)));

        let bad_orientation = SAMPLE_LINE.replace("direct", "sideways");
        assert!(parse_records(bad_orientation.as_bytes()).is_err());
    }

    #[test]
    fn test_site_predicates() {
        let record = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        assert!(record.site_before_substitution(0.0005));
        assert!(!record.site_after_substitution(0.0005));
        assert!(record.has_site_on_any_allele(0.0005));
        assert!(record.is_disrupted(5.0));
        assert!(!record.is_emerged(5.0));
    }

    #[test]
    fn test_fold_change_symmetry() {
        // with a cutoff above 1 a record is never both disrupted and emerged
        for fold_change in [0.01, 0.2, 1.0, 5.0, 100.0] {
            let record = test_record("MAZ_f1", 0.0001, 0.0001, fold_change);
            assert!(!(record.is_disrupted(5.0) && record.is_emerged(5.0)));
        }
    }

    #[test]
    fn test_position_changed() {
        let mut record = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        assert!(!record.position_changed());

        record.pos_1 = -3;
        record.pos_2 = 2;
        record.orientation_2 = Orientation::Reverse;
        assert!(record.position_changed());

        let mut strand_only = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        strand_only.orientation_2 = Orientation::Reverse;
        assert!(strand_only.position_changed());
    }

    #[test]
    fn test_best_site_window() {
        let record = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        // fold change < 1: state 1 is the best side
        assert_eq!(record.best_site_position(), -7);
        assert_eq!(record.best_site_word(), "cggctgaGgaggaggag");
        assert_eq!(record.worse_site_word(), "cggctgaCgaggaggag");
        assert_eq!(record.best_site_range(), -7..10);
        assert!(record.overlaps_position(0));
        assert!(record.overlaps_position(-7));
        assert!(!record.overlaps_position(10));

        let mut emerged = test_record("MAZ_f1", 0.5, 0.0001, 20.0);
        emerged.pos_2 = 3;
        assert_eq!(emerged.best_site_position(), 3);
        assert_eq!(emerged.best_site_word(), "cggctgaCgaggaggag");
    }

    #[test]
    fn test_allele_letters() {
        let record = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        assert_eq!(record.allele_1(), Some('G'));
        assert_eq!(record.allele_2(), Some('C'));
        assert_eq!(record.best_allele(), Some('G'));

        let mut reverse = record.clone();
        reverse.orientation_1 = Orientation::Reverse;
        assert_eq!(reverse.allele_1(), Some('C'));
    }

    #[test]
    fn test_snv_position_in_pwm() {
        let record = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        assert_eq!(record.snv_position_in_pwm(), 7);
        assert!(record.substitution_in_core());

        let mut flank = record.clone();
        flank.pos_1 = 2;
        assert_eq!(flank.snv_position_in_pwm(), -2);
        assert!(flank.substitution_in_flank());
    }

    #[test]
    fn test_motif_name_parts() {
        let record = test_record("ANDR_HUMAN.H10MO.A", 0.0001, 0.5, 0.01);
        assert_eq!(record.uniprot_id(), "ANDR_HUMAN");
        assert_eq!(record.quality_grade(), Some("A"));
        assert!(record.is_reliable());

        let record = test_record("SP3_HUMAN.H10MO.D", 0.0001, 0.5, 0.01);
        assert!(!record.is_reliable());

        let record = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        assert_eq!(record.uniprot_id(), "MAZ_f1");
        assert_eq!(record.quality_grade(), None);
        assert!(!record.is_reliable());
    }

    #[test]
    fn test_group_by_variant() {
        let mut a = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        a.variant_id = "5,G".to_string();
        let mut b = test_record("SP1_f1", 0.0001, 0.5, 0.01);
        b.variant_id = "5,G".to_string();
        let mut c = test_record("MAZ_f1", 0.0001, 0.5, 0.01);
        c.variant_id = "6,T".to_string();

        let groups = group_by_variant(vec![a, b, c]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["5,G"].len(), 2);
        assert_eq!(groups["6,T"].len(), 1);
    }
}
