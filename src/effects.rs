//! Quality scoring of substitutions against a disrupt/preserve objective

use crate::seq::SubstitutionLabel;
use crate::site::SiteRecord;
use crate::{ScanThresholds, SiteBreakResult};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Per-substitution effect summary scored against explicit motif targets
///
/// `to_be_disrupted` and `to_be_preserved` are the motifs the operator wants
/// perturbed or protected. All derived values are recomputed on demand from
/// the borrowed records.
pub struct SubstitutionEffects<'a> {
    sites: &'a [SiteRecord],
    thresholds: ScanThresholds,
    to_be_disrupted: &'a HashSet<String>,
    to_be_preserved: &'a HashSet<String>,
}

impl<'a> SubstitutionEffects<'a> {
    pub fn new(
        sites: &'a [SiteRecord],
        thresholds: ScanThresholds,
        to_be_disrupted: &'a HashSet<String>,
        to_be_preserved: &'a HashSet<String>,
    ) -> Self {
        Self {
            sites,
            thresholds,
            to_be_disrupted,
            to_be_preserved,
        }
    }

    pub fn sites(&self) -> &[SiteRecord] {
        self.sites
    }

    pub fn thresholds(&self) -> &ScanThresholds {
        &self.thresholds
    }

    pub fn motifs_of_interest(&self) -> HashSet<String> {
        self.to_be_disrupted
            .union(self.to_be_preserved)
            .cloned()
            .collect()
    }

    pub fn sites_of_interest(&self) -> Vec<&'a SiteRecord> {
        let interest = self.motifs_of_interest();
        self.sites
            .iter()
            .filter(|site| interest.contains(&site.motif))
            .collect()
    }

    fn select_motifs<F>(&self, predicate: F) -> HashSet<String>
    where
        F: Fn(&SiteRecord) -> bool,
    {
        self.sites
            .iter()
            .filter(|site| predicate(site))
            .map(|site| site.motif.clone())
            .collect()
    }

    pub fn all_sites_before_substitution(&self) -> HashSet<String> {
        self.select_motifs(|site| site.site_before_substitution(self.thresholds.pvalue_cutoff))
    }

    pub fn all_sites_after_substitution(&self) -> HashSet<String> {
        self.select_motifs(|site| site.site_after_substitution(self.thresholds.pvalue_cutoff))
    }

    /// Motifs with a site before the substitution whose fold change crosses
    /// the disruption cutoff.
    pub fn disrupted_motifs(&self) -> HashSet<String> {
        let candidates =
            self.select_motifs(|site| site.is_disrupted(self.thresholds.fold_change_cutoff));
        &candidates & &self.all_sites_before_substitution()
    }

    pub fn preserved_motifs(&self) -> HashSet<String> {
        let candidates =
            self.select_motifs(|site| !site.is_disrupted(self.thresholds.fold_change_cutoff));
        &candidates & &self.all_sites_before_substitution()
    }

    pub fn emerged_motifs(&self) -> HashSet<String> {
        let candidates =
            self.select_motifs(|site| site.is_emerged(self.thresholds.fold_change_cutoff));
        &candidates & &self.all_sites_after_substitution()
    }

    pub fn preserved_motifs_of_interest(&self) -> HashSet<String> {
        &self.preserved_motifs() & &self.motifs_of_interest()
    }

    pub fn disrupted_motifs_of_interest(&self) -> HashSet<String> {
        &self.disrupted_motifs() & &self.motifs_of_interest()
    }

    pub fn emerged_motifs_of_interest(&self) -> HashSet<String> {
        &self.emerged_motifs() & &self.motifs_of_interest()
    }

    /// Target motifs with no detectable site at all before the substitution.
    pub fn missing_from_disrupted(&self) -> HashSet<String> {
        self.to_be_disrupted - &self.all_sites_before_substitution()
    }

    pub fn missing_from_preserved(&self) -> HashSet<String> {
        self.to_be_preserved - &self.all_sites_before_substitution()
    }

    /// Target motifs that actually have a site to act on.
    pub fn actual_to_be_disrupted(&self) -> HashSet<String> {
        self.to_be_disrupted & &self.all_sites_before_substitution()
    }

    pub fn actual_to_be_preserved(&self) -> HashSet<String> {
        self.to_be_preserved & &self.all_sites_before_substitution()
    }

    pub fn should_be_preserved_but_disrupted(&self) -> HashSet<String> {
        &self.disrupted_motifs() & self.to_be_preserved
    }

    pub fn should_be_disrupted_but_preserved(&self) -> HashSet<String> {
        &self.preserved_motifs() & self.to_be_disrupted
    }

    pub fn should_be_disrupted_but_emerged(&self) -> HashSet<String> {
        &self.emerged_motifs() & self.to_be_disrupted
    }

    fn ratio(numerator: usize, denominator: usize) -> f64 {
        if denominator == 0 {
            0.0
        } else {
            numerator as f64 / denominator as f64
        }
    }

    pub fn quality_disruption(&self) -> f64 {
        let actual = self.actual_to_be_disrupted();
        Self::ratio((&self.disrupted_motifs() & &actual).len(), actual.len())
    }

    pub fn quality_preservation(&self) -> f64 {
        let actual = self.actual_to_be_preserved();
        Self::ratio((&self.preserved_motifs() & &actual).len(), actual.len())
    }

    /// Scalar ranking metric: achieved disruption plus achieved
    /// preservation, penalized for targets without any site to act on.
    /// Higher is better; unbounded.
    pub fn quality(&self) -> f64 {
        let missing_disrupted =
            Self::ratio(self.missing_from_disrupted().len(), self.to_be_disrupted.len());
        let missing_preserved =
            Self::ratio(self.missing_from_preserved().len(), self.to_be_preserved.len());

        self.quality_disruption() + self.quality_preservation()
            - 0.5 * (missing_disrupted + missing_preserved)
    }
}

/// A substitution's effects together with its ranking score
pub struct RankedEffects<'a> {
    pub label: SubstitutionLabel,
    pub effects: SubstitutionEffects<'a>,
    pub quality: f64,
}

/// Score every substitution group and sort by descending quality.
///
/// Group classification is independent per substitution and runs in
/// parallel.
pub fn classify_substitutions<'a>(
    groups: &'a HashMap<String, Vec<SiteRecord>>,
    thresholds: ScanThresholds,
    to_be_disrupted: &'a HashSet<String>,
    to_be_preserved: &'a HashSet<String>,
) -> SiteBreakResult<Vec<RankedEffects<'a>>> {
    let ranked: SiteBreakResult<Vec<RankedEffects<'a>>> = groups
        .par_iter()
        .map(|(variant_id, sites)| {
            let label: SubstitutionLabel = variant_id.parse()?;
            let effects =
                SubstitutionEffects::new(sites, thresholds, to_be_disrupted, to_be_preserved);
            let quality = effects.quality();
            Ok(RankedEffects {
                label,
                effects,
                quality,
            })
        })
        .collect();

    let mut ranked = ranked?;
    ranked.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });

    log::debug!("classified {} substitutions", ranked.len());
    Ok(ranked)
}

/// Keep only sites whose state-1 window, placed at the substitution's
/// absolute position, covers the reference SNV position.
pub fn retain_sites_overlapping(
    groups: &mut HashMap<String, Vec<SiteRecord>>,
    snv_position: usize,
) -> SiteBreakResult<()> {
    for (variant_id, sites) in groups.iter_mut() {
        let label: SubstitutionLabel = variant_id.parse()?;
        let substitution_pos = label.pos as i64;
        sites.retain(|site| {
            let start = substitution_pos + site.pos_1;
            let end = start + site.site_length() as i64;
            (start..end).contains(&(snv_position as i64))
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::test_record;

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
    fn test_disrupted_target_scores_full_quality() {
        let sites = vec![test_record("MOTIF_A.B", 0.0001, 0.5, 0.01)];
        let to_be_disrupted = motifs(&["MOTIF_A.B"]);
        let to_be_preserved = HashSet::new();
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        assert_eq!(effects.disrupted_motifs(), motifs(&["MOTIF_A.B"]));
        assert!(effects.missing_from_disrupted().is_empty());
        assert_eq!(effects.quality_disruption(), 1.0);
        assert_eq!(effects.quality(), 1.0);
    }

    #[test]
    fn test_missing_target_site_penalizes_quality() {
        // p-value above cutoff on both alleles: the motif has no site at all
        let sites = vec![test_record("MOTIF_A.B", 0.01, 0.5, 0.01)];
        let to_be_disrupted = motifs(&["MOTIF_A.B"]);
        let to_be_preserved = HashSet::new();
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        assert!(effects.disrupted_motifs().is_empty());
        assert_eq!(effects.missing_from_disrupted(), motifs(&["MOTIF_A.B"]));
        assert_eq!(effects.quality_disruption(), 0.0);
        assert_eq!(effects.quality(), -0.5);
    }

    #[test]
    fn test_quality_is_zero_without_targets() {
        let sites = vec![test_record("MOTIF_A.B", 0.0001, 0.5, 0.01)];
        let empty = HashSet::new();
        let effects = SubstitutionEffects::new(&sites, thresholds(), &empty, &empty);
        assert_eq!(effects.quality(), 0.0);
    }

    #[test]
    fn test_preserved_and_emerged_motifs() {
        let sites = vec![
            // present before and essentially unchanged
            test_record("KEEP.A", 0.0001, 0.0002, 1.1),
            // absent before, emerged after
            test_record("NEW.A", 0.5, 0.0001, 50.0),
            // present before, disrupted
            test_record("GONE.A", 0.0001, 0.5, 0.01),
        ];
        let to_be_disrupted = motifs(&["GONE.A"]);
        let to_be_preserved = motifs(&["KEEP.A"]);
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        assert_eq!(effects.preserved_motifs(), motifs(&["KEEP.A"]));
        assert_eq!(effects.emerged_motifs(), motifs(&["NEW.A"]));
        assert_eq!(effects.disrupted_motifs(), motifs(&["GONE.A"]));
        assert_eq!(effects.quality(), 2.0);
        assert!(effects.should_be_preserved_but_disrupted().is_empty());
    }

    #[test]
    fn test_strong_violations() {
        let sites = vec![
            // should be preserved but gets disrupted
            test_record("KEEP.A", 0.0001, 0.5, 0.01),
            // should be disrupted but stays put
            test_record("GONE.A", 0.0001, 0.0002, 1.1),
            // should be disrupted but emerges instead
            test_record("WORSE.A", 0.0001, 0.0001, 50.0),
        ];
        let to_be_disrupted = motifs(&["GONE.A", "WORSE.A"]);
        let to_be_preserved = motifs(&["KEEP.A"]);
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        assert_eq!(
            effects.should_be_preserved_but_disrupted(),
            motifs(&["KEEP.A"])
        );
        assert_eq!(
            effects.should_be_disrupted_but_preserved(),
            motifs(&["GONE.A", "WORSE.A"])
        );
        assert_eq!(
            effects.should_be_disrupted_but_emerged(),
            motifs(&["WORSE.A"])
        );
    }

    #[test]
    fn test_sites_of_interest() {
        let sites = vec![
            test_record("KEEP.A", 0.0001, 0.0002, 1.1),
            test_record("OTHER.A", 0.0001, 0.0002, 1.1),
        ];
        let to_be_disrupted = HashSet::new();
        let to_be_preserved = motifs(&["KEEP.A"]);
        let effects =
            SubstitutionEffects::new(&sites, thresholds(), &to_be_disrupted, &to_be_preserved);

        let interest = effects.sites_of_interest();
        assert_eq!(interest.len(), 1);
        assert_eq!(interest[0].motif, "KEEP.A");
    }

    #[test]
    fn test_classify_substitutions_orders_by_quality() {
        let to_be_disrupted = motifs(&["MOTIF_A.B"]);
        let to_be_preserved = HashSet::new();

        let mut groups: HashMap<String, Vec<SiteRecord>> = HashMap::new();

        let mut strong = test_record("MOTIF_A.B", 0.0001, 0.5, 0.01);
        strong.variant_id = "7,T".to_string();
        groups.insert("7,T".to_string(), vec![strong]);

        let mut weak = test_record("MOTIF_A.B", 0.0001, 0.0002, 1.1);
        weak.variant_id = "5,G".to_string();
        groups.insert("5,G".to_string(), vec![weak]);

        let ranked =
            classify_substitutions(&groups, thresholds(), &to_be_disrupted, &to_be_preserved)
                .unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].label.to_string(), "7,T");
        assert_eq!(ranked[0].quality, 1.0);
        assert_eq!(ranked[1].label.to_string(), "5,G");
        assert_eq!(ranked[1].quality, 0.0);
    }

    #[test]
    fn test_retain_sites_overlapping() {
        let mut groups: HashMap<String, Vec<SiteRecord>> = HashMap::new();

        // substitution at 20; site window 13..30 covers the SNV at 25
        let mut covering = test_record("MOTIF_A.B", 0.0001, 0.5, 0.01);
        covering.variant_id = "20,G".to_string();
        // substitution at 2; window -5..12 does not reach 25
        let mut distant = test_record("MOTIF_A.B", 0.0001, 0.5, 0.01);
        distant.variant_id = "2,G".to_string();

        groups.insert("20,G".to_string(), vec![covering]);
        groups.insert("2,G".to_string(), vec![distant]);

        retain_sites_overlapping(&mut groups, 25).unwrap();
        assert_eq!(groups["20,G"].len(), 1);
        assert!(groups["2,G"].is_empty());
    }
}
