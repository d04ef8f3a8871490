//! Interval algorithms over GFF annotations: non-alignment detection, the
//! gene/motif/non-alignment coverage filter and nearest-feature search, with
//! the readers, writers and reports around them.

pub mod alignments;
pub mod config;
pub mod error;
pub mod fasta;
pub mod gff;
pub mod gplexranges_structs;
pub mod merge;
pub mod natsort;
pub mod nearest;
pub mod overlaps;
pub mod pipeline;
pub mod report;
pub mod sorts;

pub use config::{FastaConfig, NearestConfig, NonAlignmentConfig, OverlapConfig};
pub use error::{GplexError, Result};
pub use gff::{Feature, GffDocument, SequenceRegion, Strand};
pub use merge::{invert, non_alignments, sweep_line_merge};
pub use nearest::{nearest_features, NearestFeature, Relation};
pub use overlaps::gene_overlaps;
pub use report::summarize;
