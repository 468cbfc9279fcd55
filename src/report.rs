//! Text report rendering for substitution screens
//!
//! Two report shapes: the quality-ranked per-substitution summary used by the
//! screening tool, and the family-scoped candidate listing used by the
//! selective site break tool.

use crate::assess::FamilyScopedAssessment;
use crate::effects::{RankedEffects, SubstitutionEffects};
use crate::seq::{Sequence, SequenceWithSnv, SubstitutionLabel};
use crate::site::SiteRecord;
use crate::SiteBreakResult;
use std::io::Write;

/// Which sections of the substitution summary get rendered and which
/// substitutions get dropped entirely
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub show_all_sites: bool,
    pub show_attentions: bool,
    pub show_strong_violations: bool,
    pub show_site_details: bool,
    pub suppress_on_disrupted_sites_missing: bool,
    pub suppress_on_preserved_sites_missing: bool,
    pub suppress_on_disrupted_what_should_be_preserved: bool,
    pub suppress_on_preserved_what_should_be_disrupted: bool,
    pub suppress_on_emerged_what_should_be_disrupted: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            show_all_sites: false,
            show_attentions: true,
            show_strong_violations: true,
            show_site_details: false,
            suppress_on_disrupted_sites_missing: false,
            suppress_on_preserved_sites_missing: false,
            suppress_on_disrupted_what_should_be_preserved: false,
            suppress_on_preserved_what_should_be_disrupted: false,
            suppress_on_emerged_what_should_be_disrupted: false,
        }
    }
}

impl OutputConfig {
    /// Should this substitution be dropped from the report?
    pub fn suppress(&self, effects: &SubstitutionEffects) -> bool {
        if self.suppress_on_disrupted_sites_missing && !effects.missing_from_disrupted().is_empty()
        {
            return true;
        }
        if self.suppress_on_preserved_sites_missing && !effects.missing_from_preserved().is_empty()
        {
            return true;
        }
        if self.suppress_on_disrupted_what_should_be_preserved
            && !effects.should_be_preserved_but_disrupted().is_empty()
        {
            return true;
        }
        if self.suppress_on_preserved_what_should_be_disrupted
            && !effects.should_be_disrupted_but_preserved().is_empty()
        {
            return true;
        }
        if self.suppress_on_emerged_what_should_be_disrupted
            && !effects.should_be_disrupted_but_emerged().is_empty()
        {
            return true;
        }
        false
    }
}

fn write_motif_line<W: Write>(
    writer: &mut W,
    message: &str,
    motifs: &std::collections::HashSet<String>,
) -> SiteBreakResult<()> {
    if motifs.is_empty() {
        return Ok(());
    }
    let mut sorted: Vec<&str> = motifs.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    writeln!(writer, "{}: {}", message, sorted.join(","))?;
    Ok(())
}

fn site_detail_line(effects: &SubstitutionEffects, site: &SiteRecord) -> String {
    let substitution_pos = site
        .variant_id
        .parse::<SubstitutionLabel>()
        .map(|label| label.pos as i64)
        .unwrap_or(0);

    let thresholds = effects.thresholds();
    let site_msg = if site.site_before_substitution(thresholds.pvalue_cutoff) {
        let verdict = if site.is_disrupted(thresholds.fold_change_cutoff) {
            "disrupted"
        } else if site.is_emerged(thresholds.fold_change_cutoff) {
            "emerged"
        } else {
            "preserved"
        };
        format!("has site; {}", verdict)
    } else {
        format!(
            "no site: {:.2e} > {}",
            site.pvalue_1, thresholds.pvalue_cutoff
        )
    };

    format!(
        "({})\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        site_msg,
        site.variant_id,
        site.motif,
        substitution_pos + site.pos_1,
        site.orientation_1,
        site.pvalue_1,
        site.pvalue_2,
        site.fold_change,
        site.seq_1
    )
}

/// Render one substitution's effect summary
pub fn write_summary<W: Write>(
    config: &OutputConfig,
    effects: &SubstitutionEffects,
    writer: &mut W,
) -> SiteBreakResult<()> {
    writeln!(writer, "Quality: {}", effects.quality())?;

    write_motif_line(
        writer,
        "Preserved sites of interest",
        &effects.preserved_motifs_of_interest(),
    )?;
    write_motif_line(
        writer,
        "Disrupted sites of interest",
        &effects.disrupted_motifs_of_interest(),
    )?;
    write_motif_line(
        writer,
        "Emerged sites of interest",
        &effects.emerged_motifs_of_interest(),
    )?;

    if config.show_all_sites {
        write_motif_line(
            writer,
            "Sites before substitution",
            &effects.all_sites_before_substitution(),
        )?;
        write_motif_line(
            writer,
            "Sites after substitution",
            &effects.all_sites_after_substitution(),
        )?;
        write_motif_line(writer, "Disrupted sites (all)", &effects.disrupted_motifs())?;
        write_motif_line(writer, "Emerged sites (all)", &effects.emerged_motifs())?;
    }

    if config.show_attentions {
        write_motif_line(
            writer,
            "Attention! Site should be disrupted, but there's no site",
            &effects.missing_from_disrupted(),
        )?;
        write_motif_line(
            writer,
            "Attention! Site should be preserved, but there's no site",
            &effects.missing_from_preserved(),
        )?;
    }

    if config.show_strong_violations {
        write_motif_line(
            writer,
            "Strong violations! Site should be preserved, but was disrupted",
            &effects.should_be_preserved_but_disrupted(),
        )?;
        write_motif_line(
            writer,
            "Strong violations! Site should be disrupted, but was preserved",
            &effects.should_be_disrupted_but_preserved(),
        )?;
        write_motif_line(
            writer,
            "Strong violations! Site should be disrupted, but emerged",
            &effects.should_be_disrupted_but_emerged(),
        )?;
    }

    if config.show_site_details {
        let detail_sites: Vec<&SiteRecord> = if config.show_all_sites {
            effects.sites().iter().collect()
        } else {
            effects.sites_of_interest()
        };
        for site in detail_sites {
            writeln!(writer, "{}", site_detail_line(effects, site))?;
        }
    }

    Ok(())
}

/// Render quality-ranked substitutions, dropping suppressed ones.
///
/// Each block starts with a `>label` header and the substitution in bracket
/// notation, like a FASTA of candidate edits.
pub fn write_ranked_summaries<W: Write>(
    config: &OutputConfig,
    sequence: &Sequence,
    ranked: &[RankedEffects],
    writer: &mut W,
) -> SiteBreakResult<()> {
    for entry in ranked {
        if config.suppress(&entry.effects) {
            continue;
        }
        let snv = sequence.snv_from_label(&entry.label)?;
        writeln!(writer, ">{}", entry.label)?;
        writeln!(writer, "{}", snv)?;
        write_summary(config, &entry.effects, writer)?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Render the substitution with the reference SNV position in lowercase so
/// the original variant stays visible inside candidate sequences.
pub fn format_snv_marking_position(snv: &SequenceWithSnv, reference_position: usize) -> String {
    let mut text = snv.to_string().into_bytes();
    let left_len = snv.left().len();
    if reference_position < left_len {
        text[reference_position].make_ascii_lowercase();
    } else if reference_position == left_len {
        // the bracket block [A/B] spans five characters
        text[reference_position..reference_position + 5].make_ascii_lowercase();
    } else {
        text[reference_position + 4].make_ascii_lowercase();
    }
    String::from_utf8(text).unwrap_or_else(|_| snv.to_string())
}

fn effect_strength_string(site: &SiteRecord) -> String {
    format!(
        "log2-Fold change {:7.2}: from P-value of {:7.2e} to P-value of {:7.2e}",
        site.log2_fold_change(),
        site.pvalue_1,
        site.pvalue_2
    )
}

fn write_site_section<W: Write>(
    writer: &mut W,
    assessment: &FamilyScopedAssessment,
    header: &str,
    sites: &[&SiteRecord],
) -> SiteBreakResult<()> {
    if sites.is_empty() {
        return Ok(());
    }
    let target_families = assessment.target_families();
    writeln!(writer, "{}:", header)?;
    for site in sites {
        let same_site = if assessment.is_reference_site(site) {
            '!'
        } else {
            '?'
        };
        writeln!(
            writer,
            "\t{}\t{}\t{}\t{}\t{}\t{} --> {}",
            assessment
                .base()
                .site_relevance_code(site, assessment.target_motifs(), &target_families),
            assessment.base().site_strength_code(site),
            site.motif,
            same_site,
            effect_strength_string(site),
            site.seq_1,
            site.seq_2
        )?;
    }
    Ok(())
}

/// Render one reportable candidate: header line plus the per-category site
/// listings.
pub fn write_candidate_report<W: Write>(
    writer: &mut W,
    assessment: &FamilyScopedAssessment,
    label: &SubstitutionLabel,
    snv_text: &str,
) -> SiteBreakResult<()> {
    writeln!(writer, "{}\t{}\t{}", label, assessment.status(), snv_text)?;

    let requested: Vec<&SiteRecord> = assessment
        .base()
        .sites()
        .iter()
        .filter(|site| assessment.target_motifs().contains(&site.motif))
        .collect();
    write_site_section(writer, assessment, "Requested to disrupt", &requested)?;
    write_site_section(
        writer,
        assessment,
        "Disrupted",
        &assessment.base().disrupted_sites(),
    )?;
    write_site_section(
        writer,
        assessment,
        "Emerged",
        &assessment.base().emerged_sites(),
    )?;
    write_site_section(
        writer,
        assessment,
        "Relocated",
        &assessment.base().relocated_sites(),
    )?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::TableResolver;
    use crate::site::test_record;
    use crate::ScanThresholds;
    use std::collections::HashSet;

    fn thresholds() -> ScanThresholds {
        ScanThresholds {
            fold_change_cutoff: 5.0,
            pvalue_cutoff: 0.0005,
            strong_pvalue_cutoff: None,
        }
    }

    fn motifs(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_config() {
        let config = OutputConfig::default();
        assert!(!config.show_all_sites);
        assert!(config.show_attentions);
        assert!(config.show_strong_violations);
        assert!(!config.show_site_details);
        assert!(!config.suppress_on_disrupted_sites_missing);
    }

    #[test]
    fn test_suppress_on_missing_disruption_target() {
        // target motif has no site at all before the substitution
        let sites = vec![test_record("MOTIF_A.B", 0.01, 0.5, 0.01)];
        let to_be_disrupted = motifs(&["MOTIF_A.B"]);
        let to_be_preserved = HashSet::new();
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        assert!(!OutputConfig::default().suppress(&effects));

        let config = OutputConfig {
            suppress_on_disrupted_sites_missing: true,
            ..Default::default()
        };
        assert!(config.suppress(&effects));
    }

    #[test]
    fn test_suppress_on_strong_violation() {
        // should be preserved but gets disrupted
        let sites = vec![test_record("KEEP.A", 0.0001, 0.5, 0.01)];
        let to_be_disrupted = HashSet::new();
        let to_be_preserved = motifs(&["KEEP.A"]);
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        let config = OutputConfig {
            suppress_on_disrupted_what_should_be_preserved: true,
            ..Default::default()
        };
        assert!(config.suppress(&effects));
    }

    #[test]
    fn test_summary_sections() {
        let sites = vec![
            test_record("GONE.A", 0.0001, 0.5, 0.01),
            test_record("ABSENT.A", 0.01, 0.5, 1.0),
        ];
        let to_be_disrupted = motifs(&["GONE.A", "ABSENT.A"]);
        let to_be_preserved = HashSet::new();
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        let mut buffer = Vec::new();
        write_summary(&OutputConfig::default(), &effects, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with("Quality:"));
        assert!(text.contains("Disrupted sites of interest: GONE.A"));
        assert!(text
            .contains("Attention! Site should be disrupted, but there's no site: ABSENT.A"));
        // nothing preserved or emerged, so those lines are absent
        assert!(!text.contains("Preserved sites of interest"));
        assert!(!text.contains("Sites before substitution"));
    }

    #[test]
    fn test_summary_show_all_sites() {
        let sites = vec![test_record("GONE.A", 0.0001, 0.5, 0.01)];
        let to_be_disrupted = motifs(&["GONE.A"]);
        let to_be_preserved = HashSet::new();
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        let config = OutputConfig {
            show_all_sites: true,
            ..Default::default()
        };
        let mut buffer = Vec::new();
        write_summary(&config, &effects, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("Sites before substitution: GONE.A"));
        assert!(text.contains("Disrupted sites (all): GONE.A"));
    }

    #[test]
    fn test_site_detail_lines() {
        let sites = vec![test_record("GONE.A", 0.0001, 0.5, 0.01)];
        let to_be_disrupted = motifs(&["GONE.A"]);
        let to_be_preserved = HashSet::new();
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        let config = OutputConfig {
            show_site_details: true,
            ..Default::default()
        };
        let mut buffer = Vec::new();
        write_summary(&config, &effects, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("(has site; disrupted)"));
        assert!(text.contains("GONE.A"));
    }

    #[test]
    fn test_ranked_summaries_skip_suppressed() {
        let sequence = Sequence::new("ACGTACGTACGTACGTAC").unwrap();

        let hit = vec![test_record("GONE.A", 0.0001, 0.5, 0.01)];
        let miss = vec![test_record("GONE.A", 0.01, 0.5, 1.0)];
        let to_be_disrupted = motifs(&["GONE.A"]);
        let to_be_preserved = HashSet::new();

        let ranked = vec![
            RankedEffects {
                label: "5,G".parse().unwrap(),
                effects: SubstitutionEffects::new(
                    &hit,
                    thresholds(),
                    &to_be_disrupted,
                    &to_be_preserved,
                ),
                quality: 1.0,
            },
            RankedEffects {
                label: "7,A".parse().unwrap(),
                effects: SubstitutionEffects::new(
                    &miss,
                    thresholds(),
                    &to_be_disrupted,
                    &to_be_preserved,
                ),
                quality: -0.5,
            },
        ];

        let config = OutputConfig {
            suppress_on_disrupted_sites_missing: true,
            ..Default::default()
        };
        let mut buffer = Vec::new();
        write_ranked_summaries(&config, &sequence, &ranked, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains(">5,G"));
        assert!(text.contains("ACGTA[C/G]GTACGTACGTAC"));
        assert!(!text.contains(">7,A"));
    }

    #[test]
    fn test_format_snv_marks_reference_position() {
        let snv = SequenceWithSnv::from_text("ACGT[A/C]GGTT").unwrap();

        // reference position in the left flank
        assert_eq!(format_snv_marking_position(&snv, 1), "AcGT[A/C]GGTT");
        // reference position at the substitution itself
        assert_eq!(format_snv_marking_position(&snv, 4), "ACGT[a/c]GGTT");
        // reference position in the right flank
        assert_eq!(format_snv_marking_position(&snv, 6), "ACGT[A/C]GgTT");
    }

    #[test]
    fn test_candidate_report_layout() {
        let resolver = TableResolver::from_entries([(
            "SP1_HUMAN",
            3,
            vec!["C2H2 zinc fingers"],
        )]);
        let targets = motifs(&["SP1_HUMAN.H10MO.A"]);
        let sites = vec![test_record("SP1_HUMAN.H10MO.A", 0.0001, 0.5, 0.01)];
        let reference = vec![];
        let assessment = FamilyScopedAssessment::new(
            &sites,
            &reference,
            thresholds(),
            &targets,
            0,
            &resolver,
            3,
        );

        let label: SubstitutionLabel = "5,G".parse().unwrap();
        let mut buffer = Vec::new();
        write_candidate_report(&mut buffer, &assessment, &label, "ACGTa[C/G]T").unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with("5,G\tno side effects\tACGTa[C/G]T"));
        assert!(text.contains("Requested to disrupt:"));
        assert!(text.contains("Disrupted:"));
        assert!(text.contains("-->"));
        assert!(!text.contains("Emerged:"));
    }
}
