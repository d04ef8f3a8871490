//! In-memory GFF3 model: features, sequence-region declarations and header
//! lines, with parsing and the sorted, de-duplicating writer.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::error::{open_input, GplexError, Result};
use crate::natsort::natural_cmp;
use crate::sorts;

pub const GFF_VERSION_LINE: &str = "##gff-version 3";
pub const SEQUENCE_REGION_PREFIX: &str = "##sequence-region";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    /// `+`
    Forward,
    /// `-`
    Reverse,
    /// `?`, strandedness relevant but unknown
    Unknown,
    /// `.`, not stranded
    None,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::Unknown => '?',
            Strand::None => '.',
        }
    }
}

impl FromStr for Strand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            "?" => Ok(Strand::Unknown),
            "." => Ok(Strand::None),
            other => Err(format!("invalid strand {other:?}")),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Column 9 of a feature row, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Attributes {
    entries: Vec<(String, Option<String>)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `key=value` and returns self.
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.push(key, value);
        self
    }

    pub fn push<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.entries.push((key.into(), Some(value.into())));
    }

    /// Value of the first entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn id(&self) -> Option<&str> {
        self.get("ID")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            match value {
                Some(v) => write!(f, "{key}={v}")?,
                None => f.write_str(key)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Attributes {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let entries = s
            .split(';')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let mut parts = pair.splitn(2, '=');
                let key = parts.next().unwrap_or_default().to_string();
                (key, parts.next().map(str::to_string))
            })
            .collect();
        Ok(Attributes { entries })
    }
}

/// One annotation row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Feature {
    pub seq_id: String,
    pub source: String,
    pub feature_type: String,
    pub start: i64,
    pub end: i64,
    pub score: String,
    pub strand: Strand,
    pub phase: String,
    pub attributes: Attributes,
}

impl Feature {
    /// A feature with `.` score, strand and phase and no attributes.
    pub fn new<S: Into<String>>(
        seq_id: S,
        source: S,
        feature_type: S,
        start: i64,
        end: i64,
    ) -> Self {
        Feature {
            seq_id: seq_id.into(),
            source: source.into(),
            feature_type: feature_type.into(),
            start,
            end,
            score: ".".to_string(),
            strand: Strand::None,
            phase: ".".to_string(),
            attributes: Attributes::default(),
        }
    }

    pub fn with_strand(mut self, strand: Strand) -> Self {
        self.strand = strand;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.id()
    }

    /// Parses a single feature row. `line_no` is only used for error reporting.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Feature> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 9 {
            return Err(GplexError::malformed(
                line_no,
                line,
                format!("expected 9 tab-separated fields, found {}", fields.len()),
            ));
        }

        let coordinate = |s: &str, what: &str| {
            s.trim().parse::<i64>().map_err(|_| {
                GplexError::malformed(line_no, line, format!("{what} is not an integer: {s:?}"))
            })
        };
        let start = coordinate(fields[3], "start")?;
        let end = coordinate(fields[4], "end")?;
        if start > end {
            return Err(GplexError::malformed(
                line_no,
                line,
                format!("start {start} exceeds end {end}"),
            ));
        }
        let strand = Strand::from_str(fields[6])
            .map_err(|reason| GplexError::malformed(line_no, line, reason))?;
        let attributes = Attributes::from_str(fields[8]).unwrap_or_default();
        if attributes.id().is_none() {
            return Err(GplexError::malformed(line_no, line, "missing ID attribute"));
        }

        Ok(Feature {
            seq_id: fields[0].to_string(),
            source: fields[1].to_string(),
            feature_type: fields[2].to_string(),
            start,
            end,
            score: fields[5].to_string(),
            strand,
            phase: fields[7].to_string(),
            attributes,
        })
    }

    /// Field-by-field order used by the writer: natural order on text,
    /// numeric order on coordinates.
    pub fn record_cmp(&self, other: &Feature) -> Ordering {
        natural_cmp(&self.seq_id, &other.seq_id)
            .then_with(|| natural_cmp(&self.source, &other.source))
            .then_with(|| natural_cmp(&self.feature_type, &other.feature_type))
            .then_with(|| self.start.cmp(&other.start))
            .then_with(|| self.end.cmp(&other.end))
            .then_with(|| natural_cmp(&self.score, &other.score))
            .then_with(|| self.strand.as_char().cmp(&other.strand.as_char()))
            .then_with(|| natural_cmp(&self.phase, &other.phase))
            .then_with(|| {
                natural_cmp(&self.attributes.to_string(), &other.attributes.to_string())
            })
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.seq_id,
            self.source,
            self.feature_type,
            self.start,
            self.end,
            self.score,
            self.strand,
            self.phase,
            self.attributes
        )
    }
}

/// `##sequence-region <seq_id> <start> <end>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceRegion {
    pub seq_id: String,
    pub start: i64,
    pub end: i64,
}

impl SequenceRegion {
    /// A region spanning `1..=length`.
    pub fn new<S: Into<String>>(seq_id: S, length: i64) -> Self {
        SequenceRegion {
            seq_id: seq_id.into(),
            start: 1,
            end: length,
        }
    }

    pub fn length(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn parse_line(line: &str, line_no: usize) -> Result<SequenceRegion> {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some(SEQUENCE_REGION_PREFIX) {
            return Err(GplexError::malformed(line_no, line, "not a sequence-region directive"));
        }
        let (Some(seq_id), Some(start), Some(end)) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(GplexError::malformed(
                line_no,
                line,
                "expected ##sequence-region <seqid> <start> <end>",
            ));
        };
        let parse = |s: &str| {
            s.parse::<i64>().map_err(|_| {
                GplexError::malformed(
                    line_no,
                    line,
                    format!("region bound is not an integer: {s:?}"),
                )
            })
        };
        Ok(SequenceRegion {
            seq_id: seq_id.to_string(),
            start: parse(start)?,
            end: parse(end)?,
        })
    }
}

impl fmt::Display for SequenceRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", SEQUENCE_REGION_PREFIX, self.seq_id, self.start, self.end)
    }
}

/// Sorts regions by their rendered directive text, in natural order.
pub fn sort_sequence_regions(regions: &mut [SequenceRegion]) {
    regions.sort_by(|a, b| natural_cmp(&a.to_string(), &b.to_string()));
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GffDocument {
    pub header_lines: Vec<String>,
    pub sequence_regions: Vec<SequenceRegion>,
    /// Sorted by `(seq_id, start, end)`, `seq_id` in natural order.
    pub features: Vec<Feature>,
}

impl GffDocument {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<GffDocument> {
        let mut doc = GffDocument::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            let line = line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            let field_count = line.split('\t').count();
            if field_count == 9 {
                doc.features.push(Feature::parse_line(line, line_no)?);
            } else if line.starts_with(SEQUENCE_REGION_PREFIX) {
                doc.sequence_regions.push(SequenceRegion::parse_line(line, line_no)?);
            } else if line.starts_with('#') {
                doc.header_lines.push(line.to_string());
            } else {
                return Err(GplexError::malformed(
                    line_no,
                    line,
                    format!(
                        "expected 9 tab-separated fields or a '#' directive, found {field_count} field(s)"
                    ),
                ));
            }
        }

        doc.features = sorts::sort_features(std::mem::take(&mut doc.features));
        sort_sequence_regions(&mut doc.sequence_regions);
        Ok(doc)
    }
}

impl FromStr for GffDocument {
    type Err = GplexError;

    fn from_str(s: &str) -> Result<Self> {
        GffDocument::from_reader(s.as_bytes())
    }
}

/// Loads and sorts a GFF file.
pub fn read_gff<P: AsRef<Path>>(path: P) -> Result<GffDocument> {
    let path = path.as_ref();
    let file = open_input(path)?;
    let doc = GffDocument::from_reader(BufReader::new(file)).map_err(|e| e.with_path(path))?;
    debug!(
        "Loaded {}: {} header line(s), {} sequence region(s), {} feature(s)",
        path.display(),
        doc.header_lines.len(),
        doc.sequence_regions.len(),
        doc.features.len()
    );
    Ok(doc)
}

/// Renders headers, regions and features. Features are sorted by record
/// order and consecutive duplicates dropped. A `##gff-version 3` line is
/// emitted first when the headers carry none.
pub fn write_gff_to<W: Write>(
    mut writer: W,
    headers: &[String],
    regions: &[SequenceRegion],
    features: &[Feature],
) -> Result<()> {
    if !headers.iter().any(|h| h.starts_with("##gff-version")) {
        writeln!(writer, "{GFF_VERSION_LINE}")?;
    }
    for header in headers {
        writeln!(writer, "{header}")?;
    }
    for region in regions {
        writeln!(writer, "{region}")?;
    }

    let mut sorted: Vec<&Feature> = features.iter().collect();
    sorted.sort_by(|a, b| a.record_cmp(b));
    sorted.dedup();
    for feature in sorted {
        writeln!(writer, "{feature}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_gff_string(
    headers: &[String],
    regions: &[SequenceRegion],
    features: &[Feature],
) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_gff_to(&mut buf, headers, regions, features);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Writes a GFF file, creating parent directories as needed.
pub fn write_gff<P: AsRef<Path>>(
    path: P,
    headers: &[String],
    regions: &[SequenceRegion],
    features: &[Feature],
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    write_gff_to(writer, headers, regions, features)?;
    debug!("Wrote {} feature(s) to {}", features.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "##gff-version 3\n\
##sequence-region seq10 1 900\n\
##sequence-region seq2 1 500\n\
seq10\tsrc\tgene\t5\t50\t.\t+\t.\tID=g3;Name=g3\n\
seq2\tsrc\tgene\t100\t200\t.\t-\t.\tID=g2\n\
seq2\tsrc\tgene\t20\t80\t.\t+\t0\tID=g1;Note=first\n";

    #[test]
    fn parse_sorts_features_naturally() {
        let doc: GffDocument = DOC.parse().unwrap();
        assert_eq!(doc.header_lines, vec!["##gff-version 3".to_string()]);
        let ids: Vec<_> = doc.features.iter().filter_map(|f| f.id()).collect();
        assert_eq!(ids, vec!["g1", "g2", "g3"]);
        assert_eq!(doc.sequence_regions[0].seq_id, "seq2");
        assert_eq!(doc.sequence_regions[1].length(), 900);
    }

    #[test]
    fn attributes_keep_order() {
        let attrs: Attributes = "ID=g1;Note=first;flag;".parse().unwrap();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.id(), Some("g1"));
        assert_eq!(attrs.get("flag"), None);
        assert_eq!(attrs.to_string(), "ID=g1;Note=first;flag");
    }

    #[test]
    fn seven_fields_is_malformed() {
        let line = "chr1\tsrc\tgene\t1\t10\t.\t+";
        let err = GffDocument::from_str(line).unwrap_err();
        match err {
            GplexError::MalformedRecord { line: l, line_no, .. } => {
                assert_eq!(l, line);
                assert_eq!(line_no, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn bad_coordinates_and_strand_are_rejected() {
        assert!(Feature::parse_line("c\ts\tgene\tx\t10\t.\t+\t.\tID=a", 1).is_err());
        assert!(Feature::parse_line("c\ts\tgene\t1\t10\t.\t*\t.\tID=a", 1).is_err());
        assert!(Feature::parse_line("c\ts\tgene\t1\t10\t.\t+\t.\tName=a", 1).is_err());
        assert!(Feature::parse_line("c\ts\tgene\t10\t1\t.\t+\t.\tID=a", 1).is_err());
        assert!(Feature::parse_line("c\ts\tgene\t10\t10\t.\t?\t.\tID=a", 1).is_ok());
    }

    #[test]
    fn writer_dedups_and_round_trips() {
        let doc: GffDocument = DOC.parse().unwrap();
        let mut features = doc.features.clone();
        features.push(doc.features[0].clone());

        let text = to_gff_string(&doc.header_lines, &doc.sequence_regions, &features);
        assert_eq!(text.matches("ID=g1").count(), 1);
        assert!(text.ends_with("ID=g3;Name=g3\n"));

        let reparsed: GffDocument = text.parse().unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn writer_adds_version_line() {
        let f = Feature::new("chr1", "blastn", "non-alignment", 1, 9)
            .with_attributes(Attributes::new().with("ID", "nal_0"));
        let text = to_gff_string(&[], &[SequenceRegion::new("chr1", 100)], &[f]);
        assert_eq!(
            text,
            "##gff-version 3\n##sequence-region chr1 1 100\nchr1\tblastn\tnon-alignment\t1\t9\t.\t.\t.\tID=nal_0\n"
        );
    }
}
