//! # sitebreak-rs - Selective TF Binding Site Disruption Tool
//!
//! A Rust implementation of the selective site break toolkit for evaluating
//! how a single-nucleotide variant (and every alternative point substitution
//! near it) changes the predicted transcription-factor binding landscape of
//! a DNA sequence.

pub mod assess;
pub mod effects;
pub mod family;
pub mod report;
pub mod scan;
pub mod seq;
pub mod site;
pub mod utils;

use serde::{Deserialize, Serialize};

/// Thresholds applied when classifying scanner predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanThresholds {
    /// Fold change beyond which a site counts as disrupted or emerged (must be > 1)
    pub fold_change_cutoff: f64,
    /// P-value at or below which a word counts as a binding site
    pub pvalue_cutoff: f64,
    /// Optional stricter p-value separating strong sites from weak ones
    pub strong_pvalue_cutoff: Option<f64>,
}

impl Default for ScanThresholds {
    fn default() -> Self {
        Self {
            fold_change_cutoff: 5.0,
            pvalue_cutoff: 0.0005,
            strong_pvalue_cutoff: None,
        }
    }
}

/// Validate threshold parameters
pub fn validate_thresholds(thresholds: &ScanThresholds) -> SiteBreakResult<()> {
    if thresholds.fold_change_cutoff <= 1.0 {
        return Err(SiteBreakError::InvalidConfig(
            "fold-change cutoff must be greater than 1".to_string(),
        ));
    }

    if thresholds.pvalue_cutoff <= 0.0 || thresholds.pvalue_cutoff > 1.0 {
        return Err(SiteBreakError::InvalidConfig(
            "p-value cutoff must be in (0, 1]".to_string(),
        ));
    }

    if let Some(strong) = thresholds.strong_pvalue_cutoff {
        if strong <= 0.0 || strong > thresholds.pvalue_cutoff {
            return Err(SiteBreakError::InvalidConfig(
                "strong p-value cutoff must be positive and not exceed the p-value cutoff"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

/// Error types for the sitebreak library
#[derive(Debug, thiserror::Error)]
pub enum SiteBreakError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("Invalid substitution: {0}")]
    InvalidSubstitution(String),

    #[error("Malformed scanner record: {0}")]
    MalformedRecord(String),

    #[error("Scanner failed: {0}")]
    ScannerFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type SiteBreakResult<T> = Result<T, SiteBreakError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_valid() {
        assert!(validate_thresholds(&ScanThresholds::default()).is_ok());
    }

    #[test]
    fn test_degenerate_fold_change_cutoff_rejected() {
        let thresholds = ScanThresholds {
            fold_change_cutoff: 1.0,
            ..ScanThresholds::default()
        };
        assert!(validate_thresholds(&thresholds).is_err());
    }

    #[test]
    fn test_strong_cutoff_must_not_exceed_weak_cutoff() {
        let thresholds = ScanThresholds {
            fold_change_cutoff: 5.0,
            pvalue_cutoff: 0.0005,
            strong_pvalue_cutoff: Some(0.05),
        };
        assert!(validate_thresholds(&thresholds).is_err());

        let thresholds = ScanThresholds {
            strong_pvalue_cutoff: Some(0.0001),
            ..ScanThresholds::default()
        };
        assert!(validate_thresholds(&thresholds).is_ok());
    }
}
