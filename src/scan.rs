//! Boundary to the external motif scanner
//!
//! The scanner is an opaque batch scorer: it consumes a file of
//! `label <TAB> LEFT[A/B]RIGHT` lines and emits one tab-separated
//! prediction row per (variant, motif) pair. All variants of a sequence go
//! out in one batch to amortize the scanner's JVM startup cost. Cutoffs are
//! passed wide open; thresholding belongs to the classification layer.

use crate::seq::NamedVariant;
use crate::site::{group_by_variant, parse_records, SiteRecord};
use crate::{SiteBreakError, SiteBreakResult};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

const SNPSCAN_CLASS: &str = "ru.autosome.perfectosape.SNPScan";

/// Configuration for invoking the scanner subprocess
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Java executable
    pub java: PathBuf,
    /// Scanner jar
    pub ape_jar: PathBuf,
    /// Directory of position weight matrices (`*.pwm`)
    pub motif_collection: PathBuf,
    /// Optional directory of precalculated motif thresholds
    pub thresholds_dir: Option<PathBuf>,
    /// Additional raw arguments appended to the scanner invocation
    pub extra_args: Vec<String>,
}

impl ScannerConfig {
    pub fn new(ape_jar: PathBuf, motif_collection: PathBuf) -> Self {
        Self {
            java: PathBuf::from("java"),
            ape_jar,
            motif_collection,
            thresholds_dir: None,
            extra_args: Vec::new(),
        }
    }
}

/// Validate scanner configuration paths
pub fn validate_scanner_config(config: &ScannerConfig) -> SiteBreakResult<()> {
    if !config.ape_jar.exists() {
        return Err(SiteBreakError::FileNotFound(
            config.ape_jar.to_string_lossy().to_string(),
        ));
    }
    if !config.motif_collection.is_dir() {
        return Err(SiteBreakError::FileNotFound(
            config.motif_collection.to_string_lossy().to_string(),
        ));
    }
    if let Some(dir) = &config.thresholds_dir {
        if !dir.is_dir() {
            return Err(SiteBreakError::FileNotFound(dir.to_string_lossy().to_string()));
        }
    }
    Ok(())
}

/// Write a scanner batch file: one `label <TAB> sequence` line per variant
pub fn write_batch<W: Write>(variants: &[NamedVariant], mut writer: W) -> SiteBreakResult<()> {
    for variant in variants {
        writeln!(writer, "{}\t{}", variant.label, variant.sequence)?;
    }
    Ok(())
}

/// Score a batch of variants with the external scanner.
///
/// Fails hard on a non-zero scanner exit or empty output; a partial batch
/// would silently corrupt the downstream set classification.
pub fn scan(config: &ScannerConfig, variants: &[NamedVariant]) -> SiteBreakResult<Vec<SiteRecord>> {
    if variants.is_empty() {
        return Ok(Vec::new());
    }

    let mut batch_file = NamedTempFile::new()?;
    write_batch(variants, &mut batch_file)?;
    batch_file.flush()?;

    let mut command = Command::new(&config.java);
    command
        .arg("-cp")
        .arg(&config.ape_jar)
        .arg(SNPSCAN_CLASS)
        .arg(&config.motif_collection)
        .arg(batch_file.path())
        .args(["--fold-change-cutoff", "1", "--pvalue-cutoff", "1"]);

    if let Some(dir) = &config.thresholds_dir {
        command.arg("--precalc").arg(dir);
    }
    command.args(&config.extra_args);

    log::info!("scanning {} sequence variants", variants.len());
    log::debug!("scanner command: {:?}", command);

    let output = command.output()?;

    if !output.status.success() {
        return Err(SiteBreakError::ScannerFailed(format!(
            "scanner exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    if output.stdout.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(SiteBreakError::ScannerFailed(
            "scanner produced no output".to_string(),
        ));
    }

    let records = parse_records(&output.stdout[..])?;
    log::info!("scanner returned {} prediction records", records.len());
    Ok(records)
}

/// Score a batch and group the predictions by variant label
pub fn scan_grouped(
    config: &ScannerConfig,
    variants: &[NamedVariant],
) -> SiteBreakResult<HashMap<String, Vec<SiteRecord>>> {
    Ok(group_by_variant(scan(config, variants)?))
}

/// Motif names in a collection directory (`*.pwm` basenames), sorted
pub fn motif_names_in_collection(collection: &std::path::Path) -> SiteBreakResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(collection)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("pwm") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Select motif names matching any of the given case-insensitive patterns
pub fn motifs_matching_patterns(
    names: &[String],
    patterns: &[String],
) -> SiteBreakResult<HashSet<String>> {
    let mut compiled = Vec::new();
    for pattern in patterns {
        let regex = regex::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                SiteBreakError::InvalidConfig(format!("invalid motif pattern '{}': {}", pattern, e))
            })?;
        compiled.push(regex);
    }

    Ok(names
        .iter()
        .filter(|name| compiled.iter().any(|regex| regex.is_match(name)))
        .cloned()
        .collect())
}
