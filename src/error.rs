//! Error types for gplexranges

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for gplexranges operations
pub type Result<T> = std::result::Result<T, GplexError>;

/// Error types that can occur while loading, processing or writing records
#[derive(Debug, Error)]
pub enum GplexError {
    /// Input path does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// A line that is neither a feature, a sequence-region nor a header
    #[error("Malformed record at line {line_no}{}: {reason}: {line:?}", source_suffix(.path))]
    MalformedRecord {
        /// File the line came from, when known
        path: Option<PathBuf>,
        /// 1-based line number
        line_no: usize,
        /// The offending raw line
        line: String,
        /// What was wrong with it
        reason: String,
    },

    /// A span or feature references a sequence with no declared region
    #[error("Unknown sequence: {seq_id} has no declared sequence region")]
    UnknownSequence {
        /// The undeclared sequence id
        seq_id: String,
    },

    /// Threshold or argument outside its allowed range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Aggregation error from polars
    #[error("Aggregation error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

fn source_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" of {}", p.display()),
        None => String::new(),
    }
}

impl GplexError {
    pub fn malformed(
        line_no: usize,
        line: &str,
        reason: impl Into<String>,
    ) -> Self {
        GplexError::MalformedRecord {
            path: None,
            line_no,
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    /// Attaches the originating path to a `MalformedRecord`; other variants pass through.
    pub fn with_path(self, path: &Path) -> Self {
        match self {
            GplexError::MalformedRecord {
                path: None,
                line_no,
                line,
                reason,
            } => GplexError::MalformedRecord {
                path: Some(path.to_path_buf()),
                line_no,
                line,
                reason,
            },
            other => other,
        }
    }
}

/// Opens an input file, turning a missing path into `FileNotFound`.
pub fn open_input(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GplexError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => GplexError::Io(e),
    })
}
