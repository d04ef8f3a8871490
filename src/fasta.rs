//! Sequence-region declarations derived from a FASTA file.

use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use regex_lite::Regex;

use crate::config::FastaConfig;
use crate::error::{open_input, GplexError, Result};
use crate::gff::SequenceRegion;
use crate::natsort::natural_cmp;

/// Separator class used to tokenize header lines.
pub const HEADER_SPLIT_PATTERN: &str = r"[>|,\s]+";

/// Splits a header line into the fields the label index refers to.
pub fn header_fields(header: &str) -> Vec<String> {
    // The pattern is a constant known to compile.
    match Regex::new(HEADER_SPLIT_PATTERN) {
        Ok(re) => re.split(header.trim()).map(str::to_string).collect(),
        Err(_) => vec![header.trim().to_string()],
    }
}

/// One region per `>` record, its length being the count of sequence
/// characters after line breaks are stripped. Returned in natural label order.
pub fn sequence_regions<R: BufRead>(
    reader: R,
    config: &FastaConfig,
) -> Result<Vec<SequenceRegion>> {
    let splitter = Regex::new(HEADER_SPLIT_PATTERN)
        .map_err(|e| GplexError::InvalidConfig(e.to_string()))?;
    let mut regions: Vec<SequenceRegion> = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.starts_with('>') {
            let label = splitter
                .split(line)
                .nth(config.header_field)
                .filter(|f| !f.is_empty())
                .ok_or_else(|| {
                    GplexError::malformed(
                        i + 1,
                        line,
                        format!("header has no label field at index {}", config.header_field),
                    )
                })?;
            regions.push(SequenceRegion::new(label, 0));
        } else if let Some(current) = regions.last_mut() {
            current.end += line.len() as i64;
        } else if !line.is_empty() {
            return Err(GplexError::malformed(i + 1, line, "sequence data before the first header"));
        }
    }

    regions.sort_by(|a, b| natural_cmp(&a.seq_id, &b.seq_id));
    Ok(regions)
}

/// Fields of the first header line of a FASTA file, empty when it has none.
pub fn first_header_fields<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let reader = BufReader::new(open_input(path)?);
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('>') {
            return Ok(header_fields(&line));
        }
    }
    Ok(Vec::new())
}

pub fn read_sequence_regions<P: AsRef<Path>>(
    path: P,
    config: &FastaConfig,
) -> Result<Vec<SequenceRegion>> {
    let path = path.as_ref();
    let file = open_input(path)?;
    let regions = sequence_regions(BufReader::new(file), config).map_err(|e| e.with_path(path))?;
    debug!("Derived {} sequence region(s) from {}", regions.len(), path.display());
    Ok(regions)
}
