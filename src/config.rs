//! Parameters for each stage. The binary fills these from its arguments;
//! library callers build them directly.

use crate::error::{GplexError, Result};
use crate::gff::Feature;

/// Non-alignment output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonAlignmentConfig {
    /// Column 2 of every emitted feature.
    pub source: String,
    /// Prefix of the sequential `ID`/`Name` values.
    pub id_prefix: String,
}

impl Default for NonAlignmentConfig {
    fn default() -> Self {
        NonAlignmentConfig {
            source: "blastn".to_string(),
            id_prefix: "nal_".to_string(),
        }
    }
}

/// Thresholds of the gene/gplex/non-alignment filter.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapConfig {
    /// Fraction of the gene that must be covered by non-alignments (strictly exceeded).
    pub min_coverage: f64,
    /// Max base pairs between a gene and a supporting motif.
    pub max_distance: i64,
    /// Feature type treated as a gene; `None` keeps every feature.
    pub gene_type: Option<String>,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        OverlapConfig {
            min_coverage: 0.40,
            max_distance: 25,
            gene_type: Some("gene".to_string()),
        }
    }
}

impl OverlapConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_coverage) {
            return Err(GplexError::InvalidConfig(format!(
                "min coverage must be within [0, 1], got {}",
                self.min_coverage
            )));
        }
        if self.max_distance < 0 {
            return Err(GplexError::InvalidConfig(format!(
                "max distance must be non-negative, got {}",
                self.max_distance
            )));
        }
        Ok(())
    }

    pub fn is_gene(&self, feature: &Feature) -> bool {
        self.gene_type
            .as_deref()
            .map_or(true, |t| feature.feature_type == t)
    }
}

/// Nearest-feature search settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearestConfig {
    /// Annotation types considered as candidates; empty means all.
    pub annotation_types: Vec<String>,
    /// Stop scanning a sequence once no later candidate can be closer.
    pub early_termination: bool,
}

impl Default for NearestConfig {
    fn default() -> Self {
        NearestConfig {
            annotation_types: Vec::new(),
            early_termination: true,
        }
    }
}

impl NearestConfig {
    pub fn accepts(&self, feature: &Feature) -> bool {
        self.annotation_types.is_empty()
            || self
                .annotation_types
                .iter()
                .any(|t| *t == feature.feature_type)
    }
}

/// How to pull a sequence label out of a FASTA header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaConfig {
    /// Index into the header split on `[>|,\s]+`. The leading `>` yields an
    /// empty first field, so `1` selects the first word.
    pub header_field: usize,
}

impl FastaConfig {
    pub fn new(header_field: usize) -> Self {
        FastaConfig { header_field }
    }
}
