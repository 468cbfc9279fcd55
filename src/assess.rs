//! Classification of scanner predictions into binding-effect categories

use crate::family::{families_for_motifs, motif_uniprot_id, FamilyResolver, UNDEFINED_FAMILY};
use crate::seq::SubstitutionLabel;
use crate::site::SiteRecord;
use crate::{ScanThresholds, SiteBreakResult};
use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

/// Classified view over the scanner records of one substitution
///
/// Pure and stateless: every set is recomputed from the borrowed records and
/// the thresholds, so assessments are cheap to build and safe to evaluate in
/// parallel.
pub struct EffectAssessment<'a> {
    sites: &'a [SiteRecord],
    thresholds: ScanThresholds,
    resolver: &'a dyn FamilyResolver,
    family_level: u8,
    relocation_affects: bool,
}

impl<'a> EffectAssessment<'a> {
    pub fn new(
        sites: &'a [SiteRecord],
        thresholds: ScanThresholds,
        resolver: &'a dyn FamilyResolver,
        family_level: u8,
    ) -> Self {
        Self {
            sites,
            thresholds,
            resolver,
            family_level,
            relocation_affects: false,
        }
    }

    /// Count relocated-only sites as affected. Off by default; whether
    /// relocation alone is an effect is still under discussion.
    pub fn with_relocation_affecting(mut self, relocation_affects: bool) -> Self {
        self.relocation_affects = relocation_affects;
        self
    }

    pub fn sites(&self) -> &[SiteRecord] {
        self.sites
    }

    pub fn thresholds(&self) -> &ScanThresholds {
        &self.thresholds
    }

    /// Records with a site on at least one allele; only these are judged.
    pub fn actual_sites(&self) -> Vec<&'a SiteRecord> {
        self.sites
            .iter()
            .filter(|site| site.has_site_on_any_allele(self.thresholds.pvalue_cutoff))
            .collect()
    }

    pub fn disrupted_sites(&self) -> Vec<&'a SiteRecord> {
        self.actual_sites()
            .into_iter()
            .filter(|site| site.is_disrupted(self.thresholds.fold_change_cutoff))
            .collect()
    }

    pub fn emerged_sites(&self) -> Vec<&'a SiteRecord> {
        self.actual_sites()
            .into_iter()
            .filter(|site| site.is_emerged(self.thresholds.fold_change_cutoff))
            .collect()
    }

    pub fn relocated_sites(&self) -> Vec<&'a SiteRecord> {
        self.actual_sites()
            .into_iter()
            .filter(|site| site.position_changed())
            .collect()
    }

    pub fn affected_sites(&self) -> Vec<&'a SiteRecord> {
        self.actual_sites()
            .into_iter()
            .filter(|site| {
                site.is_disrupted(self.thresholds.fold_change_cutoff)
                    || site.is_emerged(self.thresholds.fold_change_cutoff)
                    || (self.relocation_affects && site.position_changed())
            })
            .collect()
    }

    pub fn reliable_affected_sites(&self) -> Vec<&'a SiteRecord> {
        self.affected_sites()
            .into_iter()
            .filter(|site| site.is_reliable())
            .collect()
    }

    /// Family labels over a site list, in first-seen order. Sites without
    /// any annotation contribute the `Undefined` sentinel so family counts
    /// stay comparable.
    pub fn families_for_sites(&self, sites: &[&SiteRecord]) -> Vec<String> {
        let mut cache: HashMap<&str, Vec<String>> = HashMap::new();
        let mut families = Vec::new();
        for site in sites {
            let site_families = cache.entry(site.motif.as_str()).or_insert_with(|| {
                let found = self
                    .resolver
                    .families(motif_uniprot_id(&site.motif), self.family_level);
                if found.is_empty() {
                    vec![UNDEFINED_FAMILY.to_string()]
                } else {
                    found
                }
            });
            for family in site_families {
                if !families.contains(family) {
                    families.push(family.clone());
                }
            }
        }
        families
    }

    pub fn affected_families(&self) -> Vec<String> {
        self.families_for_sites(&self.affected_sites())
    }

    pub fn reliable_affected_families(&self) -> Vec<String> {
        self.families_for_sites(&self.reliable_affected_sites())
    }

    /// Does the site belong to any of the given families?
    pub fn in_family(&self, site: &SiteRecord, families: &[String]) -> bool {
        self.resolver
            .families(motif_uniprot_id(&site.motif), self.family_level)
            .iter()
            .any(|family| families.contains(family))
    }

    /// Strength code for report listings: `S` strong site, `w` weak site,
    /// `n` no site, with an `r` suffix when the best placement moved.
    pub fn site_strength_code(&self, site: &SiteRecord) -> String {
        let strength = match self.thresholds.strong_pvalue_cutoff {
            Some(strong) if site.has_site_on_any_allele(strong) => 'S',
            _ if site.has_site_on_any_allele(self.thresholds.pvalue_cutoff) => 'w',
            _ => 'n',
        };
        let mut code = strength.to_string();
        if site.position_changed() {
            code.push('r');
        }
        code
    }

    /// Relevance code for report listings: `!` a requested motif, `~` same
    /// family as a requested motif, `#` unrelated; `*` appended for
    /// reliable motifs.
    pub fn site_relevance_code(
        &self,
        site: &SiteRecord,
        target_motifs: &HashSet<String>,
        target_families: &[String],
    ) -> String {
        let relevance = if target_motifs.contains(&site.motif) {
            '!'
        } else if self.in_family(site, target_families) {
            '~'
        } else {
            '#'
        };
        let mut code = relevance.to_string();
        if site.is_reliable() {
            code.push('*');
        }
        code
    }
}

/// Side-effect verdict of a family-scoped assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffectStatus {
    NoSideEffects,
    OnlyUnreliable,
    Reliable,
}

impl fmt::Display for SideEffectStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SideEffectStatus::NoSideEffects => write!(f, "no side effects"),
            SideEffectStatus::OnlyUnreliable => write!(f, "only unreliable side effects"),
            SideEffectStatus::Reliable => write!(f, "reliable side effects"),
        }
    }
}

/// Effect assessment evaluated against a target-family objective
///
/// Wraps [`EffectAssessment`] with the motifs the operator wants disrupted,
/// the position the original SNV occupies in this substitution's coordinate
/// frame, and the assessment records of the original SNV for provenance
/// checks.
pub struct FamilyScopedAssessment<'a> {
    base: EffectAssessment<'a>,
    target_motifs: &'a HashSet<String>,
    overlap_position: i64,
    reference_sites: &'a [SiteRecord],
}

impl<'a> FamilyScopedAssessment<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sites: &'a [SiteRecord],
        reference_sites: &'a [SiteRecord],
        thresholds: ScanThresholds,
        target_motifs: &'a HashSet<String>,
        overlap_position: i64,
        resolver: &'a dyn FamilyResolver,
        family_level: u8,
    ) -> Self {
        Self {
            base: EffectAssessment::new(sites, thresholds, resolver, family_level),
            target_motifs,
            overlap_position,
            reference_sites,
        }
    }

    pub fn base(&self) -> &EffectAssessment<'a> {
        &self.base
    }

    pub fn target_motifs(&self) -> &HashSet<String> {
        self.target_motifs
    }

    pub fn overlap_position(&self) -> i64 {
        self.overlap_position
    }

    pub fn target_families(&self) -> Vec<String> {
        families_for_motifs(
            self.base.resolver,
            self.target_motifs.iter().map(String::as_str),
            self.base.family_level,
        )
    }

    /// The very site the reference SNV already hit: same motif, and the
    /// reference best-site position (shifted into this frame) matches one of
    /// the record's placements.
    pub fn is_reference_site(&self, site: &SiteRecord) -> bool {
        self.reference_sites
            .iter()
            .filter(|reference| reference.motif == site.motif)
            .any(|reference| {
                let shifted = self.overlap_position + reference.best_site_position();
                shifted == site.pos_1 || shifted == site.pos_2
            })
    }

    /// Disruptions that actually touch the reference SNV's position, not
    /// coincidental losses elsewhere in the window.
    pub fn disrupted_sites_of_interest(&self) -> Vec<&'a SiteRecord> {
        self.base
            .disrupted_sites()
            .into_iter()
            .filter(|site| site.overlaps_position(self.overlap_position))
            .collect()
    }

    /// A targeted family lost a site at the position of interest.
    pub fn achieved_objective(&self) -> bool {
        let target_families = self.target_families();
        self.disrupted_sites_of_interest().iter().any(|site| {
            self.base
                .resolver
                .families(motif_uniprot_id(&site.motif), self.base.family_level)
                .iter()
                .any(|family| target_families.contains(family))
        })
    }

    pub fn erroneously_affected_families(&self) -> Vec<String> {
        let target_families = self.target_families();
        self.base
            .affected_families()
            .into_iter()
            .filter(|family| !target_families.contains(family))
            .collect()
    }

    pub fn reliable_erroneously_affected_families(&self) -> Vec<String> {
        let target_families = self.target_families();
        self.base
            .reliable_affected_families()
            .into_iter()
            .filter(|family| !target_families.contains(family))
            .collect()
    }

    pub fn has_side_effects(&self) -> bool {
        !self.erroneously_affected_families().is_empty()
    }

    pub fn has_reliable_side_effects(&self) -> bool {
        !self.reliable_erroneously_affected_families().is_empty()
    }

    pub fn status(&self) -> SideEffectStatus {
        if !self.has_side_effects() {
            SideEffectStatus::NoSideEffects
        } else if !self.has_reliable_side_effects() {
            SideEffectStatus::OnlyUnreliable
        } else {
            SideEffectStatus::Reliable
        }
    }

    /// A substitution is worth reporting when it breaks a targeted site and
    /// leaves no reliable motif of another family affected.
    pub fn is_reportable(&self) -> bool {
        self.achieved_objective() && !self.has_reliable_side_effects()
    }
}

/// One screened substitution, ready for ranking
#[derive(Debug, Clone)]
pub struct CandidateCall {
    pub label: SubstitutionLabel,
    pub status: SideEffectStatus,
    pub reliable_offtarget_families: Vec<String>,
    pub reportable: bool,
}

/// Screen every substitution group against the target objective.
///
/// Groups are independent, so they are classified in parallel. The returned
/// calls are sorted reportable-first, then ascending by the number of
/// off-target reliable families, then by label for determinism.
pub fn screen_candidates(
    groups: &HashMap<String, Vec<SiteRecord>>,
    reference_sites: &[SiteRecord],
    thresholds: ScanThresholds,
    target_motifs: &HashSet<String>,
    snv_position: usize,
    resolver: &dyn FamilyResolver,
    family_level: u8,
) -> SiteBreakResult<Vec<CandidateCall>> {
    let calls: SiteBreakResult<Vec<CandidateCall>> = groups
        .par_iter()
        .map(|(variant_id, sites)| {
            let label: SubstitutionLabel = variant_id.parse()?;
            let assessment = FamilyScopedAssessment::new(
                sites,
                reference_sites,
                thresholds,
                target_motifs,
                snv_position as i64 - label.pos as i64,
                resolver,
                family_level,
            );
            Ok(CandidateCall {
                label,
                status: assessment.status(),
                reliable_offtarget_families: assessment.reliable_erroneously_affected_families(),
                reportable: assessment.is_reportable(),
            })
        })
        .collect();

    let mut calls = calls?;
    calls.sort_by(|a, b| {
        b.reportable
            .cmp(&a.reportable)
            .then_with(|| {
                a.reliable_offtarget_families
                    .len()
                    .cmp(&b.reliable_offtarget_families.len())
            })
            .then_with(|| a.label.cmp(&b.label))
    });

    log::debug!(
        "screened {} substitutions, {} reportable",
        calls.len(),
        calls.iter().filter(|c| c.reportable).count()
    );

    Ok(calls)
}
