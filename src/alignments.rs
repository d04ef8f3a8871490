//! Aligned-read spans and `@SQ` declarations from SAM-like text.

use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};

use crate::error::{open_input, GplexError, Result};
use crate::gff::SequenceRegion;

const FLAG_UNMAPPED: u32 = 0x4;

/// Reference span covered by one alignment record (1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlignedSpan {
    pub seq_id: String,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentSet {
    /// From `@SQ` header lines, in file order.
    pub sequence_regions: Vec<SequenceRegion>,
    pub spans: Vec<AlignedSpan>,
    /// Records skipped because they were unmapped or covered no reference base.
    pub unmapped: usize,
}

/// Number of reference bases consumed by a CIGAR string: the sum of the
/// lengths of `M`, `D`, `N`, `X` and `=` operations.
pub fn reference_length(cigar: &str) -> std::result::Result<i64, String> {
    let mut total = 0_i64;
    let mut len: Option<i64> = None;

    for c in cigar.chars() {
        if let Some(d) = c.to_digit(10) {
            len = Some(len.unwrap_or(0) * 10 + d as i64);
            continue;
        }
        let n = len
            .take()
            .ok_or_else(|| format!("operation {c:?} without a length in {cigar:?}"))?;
        match c {
            'M' | 'D' | 'N' | 'X' | '=' => total += n,
            'I' | 'S' | 'H' | 'P' => {}
            other => return Err(format!("unknown CIGAR operation {other:?} in {cigar:?}")),
        }
    }
    if len.is_some() {
        return Err(format!("trailing length without operation in {cigar:?}"));
    }

    Ok(total)
}

fn parse_sq(line: &str, line_no: usize) -> Result<SequenceRegion> {
    let mut name = None;
    let mut length = None;
    for tag in line.split('\t').skip(1) {
        if let Some(v) = tag.strip_prefix("SN:") {
            name = Some(v.trim());
        } else if let Some(v) = tag.strip_prefix("LN:") {
            length = Some(v.trim().parse::<i64>().map_err(|_| {
                GplexError::malformed(line_no, line, format!("LN is not an integer: {v:?}"))
            })?);
        }
    }
    match (name, length) {
        (Some(name), Some(length)) => Ok(SequenceRegion::new(name, length)),
        _ => Err(GplexError::malformed(line_no, line, "@SQ line needs SN and LN tags")),
    }
}

fn parse_record(line: &str, line_no: usize) -> Result<Option<AlignedSpan>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 6 {
        return Err(GplexError::malformed(
            line_no,
            line,
            format!("expected at least 6 tab-separated fields, found {}", fields.len()),
        ));
    }

    let flag: u32 = fields[1]
        .parse()
        .map_err(|_| GplexError::malformed(line_no, line, "FLAG is not an integer"))?;
    let seq_id = fields[2];
    let cigar = fields[5].trim();
    if flag & FLAG_UNMAPPED != 0 || seq_id == "*" || cigar == "*" {
        return Ok(None);
    }

    let start: i64 = fields[3]
        .parse()
        .map_err(|_| GplexError::malformed(line_no, line, "POS is not an integer"))?;
    let ref_len =
        reference_length(cigar).map_err(|reason| GplexError::malformed(line_no, line, reason))?;
    // clipped or inserted bases only: no reference span
    if ref_len == 0 {
        return Ok(None);
    }

    Ok(Some(AlignedSpan {
        seq_id: seq_id.to_string(),
        start,
        end: start + ref_len - 1,
    }))
}

impl AlignmentSet {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<AlignmentSet> {
        let mut set = AlignmentSet::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with("@SQ") {
                set.sequence_regions.push(parse_sq(&line, line_no)?);
            } else if line.starts_with('@') {
                continue;
            } else {
                match parse_record(&line, line_no)? {
                    Some(span) => set.spans.push(span),
                    None => set.unmapped += 1,
                }
            }
        }

        Ok(set)
    }
}

pub fn read_alignments<P: AsRef<Path>>(path: P) -> Result<AlignmentSet> {
    let path = path.as_ref();
    let file = open_input(path)?;
    let set = AlignmentSet::from_reader(BufReader::new(file)).map_err(|e| e.with_path(path))?;
    info!(
        "Loaded {} aligned span(s) on {} sequence(s) from {}",
        set.spans.len(),
        set.sequence_regions.len(),
        path.display()
    );
    if set.unmapped > 0 {
        debug!("Skipped {} unmapped record(s)", set.unmapped);
    }
    Ok(set)
}
