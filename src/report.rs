//! Nearest-feature data table and the summary report built from it.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use log::debug;
use polars::prelude::*;

use crate::error::{open_input, GplexError, Result};
use crate::gff::Strand;
use crate::natsort::natural_cmp;
use crate::nearest::{Endpoint, EndpointPair, NearestAnnotation, NearestFeature, Relation};

const NOT_APPLICABLE: &str = "N/A";

pub const TABLE_HEADER: [&str; 11] = [
    "motif-id",
    "seq-id",
    "start",
    "end",
    "motif-strand",
    "nearest-annot",
    "relation",
    "motif-end",
    "annot-end",
    "distance",
    "annot-strand",
];

fn table_cells(row: &NearestFeature) -> [String; 11] {
    let na = || NOT_APPLICABLE.to_string();
    let n = row.nearest.as_ref();
    [
        row.motif_id.clone(),
        row.seq_id.clone(),
        row.start.to_string(),
        row.end.to_string(),
        row.motif_strand.to_string(),
        n.map_or_else(na, |n| n.id.clone()),
        row.relation.to_string(),
        n.map_or_else(na, |n| n.pair.motif.to_string()),
        n.map_or_else(na, |n| n.pair.annotation.to_string()),
        n.map_or_else(na, |n| n.distance.to_string()),
        n.map_or_else(na, |n| n.strand.to_string()),
    ]
}

/// Column-aligned table: each column padded to its widest cell plus two,
/// trailing whitespace trimmed.
pub fn write_nearest_table_to<W: Write>(
    mut writer: W,
    rows: &[NearestFeature],
) -> io::Result<()> {
    let header: [String; 11] = TABLE_HEADER.map(str::to_string);
    let body: Vec<[String; 11]> = rows.iter().map(table_cells).collect();

    let mut widths = [0_usize; 11];
    for cells in std::iter::once(&header).chain(body.iter()) {
        for (w, cell) in widths.iter_mut().zip(cells.iter()) {
            *w = (*w).max(cell.len() + 2);
        }
    }

    for cells in std::iter::once(&header).chain(body.iter()) {
        let mut line = String::new();
        for (cell, w) in cells.iter().zip(widths) {
            line.push_str(&format!("{cell:<w$}"));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }
    writer.flush()
}

pub fn write_nearest_table<P: AsRef<Path>>(path: P, rows: &[NearestFeature]) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    write_nearest_table_to(BufWriter::new(File::create(path)?), rows)?;
    debug!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(())
}

fn parse_row(line: &str, line_no: usize) -> Result<NearestFeature> {
    let bad = |reason: String| GplexError::malformed(line_no, line, reason);
    let cells: Vec<&str> = line.split_whitespace().collect();
    if cells.len() != TABLE_HEADER.len() {
        return Err(bad(format!(
            "expected {} columns, found {}",
            TABLE_HEADER.len(),
            cells.len()
        )));
    }
    let int = |s: &str, what: &str| {
        s.parse::<i64>()
            .map_err(|_| bad(format!("{what} is not an integer: {s:?}")))
    };
    let strand = |s: &str| Strand::from_str(s).map_err(&bad);

    let nearest = if cells[5] == NOT_APPLICABLE {
        None
    } else {
        Some(NearestAnnotation {
            id: cells[5].to_string(),
            pair: EndpointPair {
                motif: Endpoint::from_str(cells[7]).map_err(&bad)?,
                annotation: Endpoint::from_str(cells[8]).map_err(&bad)?,
            },
            distance: int(cells[9], "distance")?,
            strand: strand(cells[10])?,
        })
    };

    Ok(NearestFeature {
        motif_id: cells[0].to_string(),
        seq_id: cells[1].to_string(),
        start: int(cells[2], "start")?,
        end: int(cells[3], "end")?,
        motif_strand: strand(cells[4])?,
        relation: Relation::from_str(cells[6]).map_err(&bad)?,
        nearest,
    })
}

/// Reads a table written by `write_nearest_table_to`; the first line is the header.
pub fn read_nearest_table_from<R: BufRead>(reader: R) -> Result<Vec<NearestFeature>> {
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i == 0 || line.trim().is_empty() {
            continue;
        }
        rows.push(parse_row(&line, i + 1)?);
    }
    Ok(rows)
}

pub fn read_nearest_table<P: AsRef<Path>>(path: P) -> Result<Vec<NearestFeature>> {
    let path = path.as_ref();
    let file = open_input(path)?;
    read_nearest_table_from(BufReader::new(file)).map_err(|e| e.with_path(path))
}

/// Counts for one sequence, or for all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSummary {
    pub seq_id: String,
    pub motifs: i64,
    pub sense: i64,
    pub antisense: i64,
    pub upstream: i64,
    pub overlap: i64,
    pub downstream: i64,
    pub not_applicable: i64,
    /// Sum and count of absolute distances of Upstream/Downstream rows.
    pub distance_sum: i64,
    pub distance_count: i64,
}

impl SequenceSummary {
    pub fn mean_distance(&self) -> Option<f64> {
        (self.distance_count > 0).then(|| self.distance_sum as f64 / self.distance_count as f64)
    }

    fn absorb(&mut self, other: &SequenceSummary) {
        self.motifs += other.motifs;
        self.sense += other.sense;
        self.antisense += other.antisense;
        self.upstream += other.upstream;
        self.overlap += other.overlap;
        self.downstream += other.downstream;
        self.not_applicable += other.not_applicable;
        self.distance_sum += other.distance_sum;
        self.distance_count += other.distance_count;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub all: SequenceSummary,
    /// Natural order of `seq_id`.
    pub per_sequence: Vec<SequenceSummary>,
}

fn rows_frame(rows: &[NearestFeature]) -> PolarsResult<DataFrame> {
    let seq_ids: Vec<&str> = rows.iter().map(|r| r.seq_id.as_str()).collect();
    let strands: Vec<String> = rows.iter().map(|r| r.motif_strand.to_string()).collect();
    let relations: Vec<&str> = rows.iter().map(|r| r.relation.as_str()).collect();
    let distances: Vec<Option<i64>> = rows
        .iter()
        .map(|r| match r.relation {
            Relation::Upstream | Relation::Downstream => {
                r.nearest.as_ref().map(|n| n.distance.abs())
            }
            Relation::Overlap | Relation::NotApplicable => None,
        })
        .collect();

    df!(
        "seq_id" => seq_ids,
        "strand" => strands,
        "relation" => relations,
        "abs_distance" => distances
    )
}

fn count_where(column: &str, value: &str) -> Expr {
    col(column).eq(lit(value)).cast(DataType::Int64).sum()
}

fn count_present(column: &str) -> Expr {
    col(column).is_not_null().cast(DataType::Int64).sum()
}

/// Per-sequence and overall counts of the nearest-feature rows.
pub fn summarize(rows: &[NearestFeature]) -> Result<Summary> {
    let mut summary = Summary {
        all: SequenceSummary {
            seq_id: "All sequences".to_string(),
            ..Default::default()
        },
        per_sequence: Vec::new(),
    };
    if rows.is_empty() {
        return Ok(summary);
    }

    let grouped = rows_frame(rows)?
        .lazy()
        .group_by([col("seq_id")])
        .agg([
            count_present("relation").alias("motifs"),
            count_where("strand", "+").alias("sense"),
            count_where("strand", "-").alias("antisense"),
            count_where("relation", Relation::Upstream.as_str()).alias("upstream"),
            count_where("relation", Relation::Overlap.as_str()).alias("overlap"),
            count_where("relation", Relation::Downstream.as_str()).alias("downstream"),
            count_where("relation", Relation::NotApplicable.as_str()).alias("not_applicable"),
            col("abs_distance").sum().cast(DataType::Int64).alias("distance_sum"),
            count_present("abs_distance").alias("distance_count"),
        ])
        .collect()?;

    let int_column = |name: &str| -> Result<Vec<i64>> {
        Ok(grouped
            .column(name)?
            .i64()?
            .into_iter()
            .map(|v| v.unwrap_or(0))
            .collect())
    };
    let seq_ids: Vec<String> = grouped
        .column("seq_id")?
        .str()?
        .into_iter()
        .map(|s| s.unwrap_or_default().to_string())
        .collect();
    let motifs = int_column("motifs")?;
    let sense = int_column("sense")?;
    let antisense = int_column("antisense")?;
    let upstream = int_column("upstream")?;
    let overlap = int_column("overlap")?;
    let downstream = int_column("downstream")?;
    let not_applicable = int_column("not_applicable")?;
    let distance_sum = int_column("distance_sum")?;
    let distance_count = int_column("distance_count")?;

    for (i, seq_id) in seq_ids.into_iter().enumerate() {
        summary.per_sequence.push(SequenceSummary {
            seq_id,
            motifs: motifs[i],
            sense: sense[i],
            antisense: antisense[i],
            upstream: upstream[i],
            overlap: overlap[i],
            downstream: downstream[i],
            not_applicable: not_applicable[i],
            distance_sum: distance_sum[i],
            distance_count: distance_count[i],
        });
    }
    summary
        .per_sequence
        .sort_by(|a, b| natural_cmp(&a.seq_id, &b.seq_id));
    for s in &summary.per_sequence {
        summary.all.absorb(s);
    }

    Ok(summary)
}

fn percentage(count: i64, total: i64) -> String {
    format!("{:.2}", count as f64 / total as f64 * 100.0)
}

/// A labelled block of `name: count / total (pct%)` lines.
fn write_breakdown<W: Write>(
    w: &mut W,
    header: &str,
    blocks: &[(String, Vec<(&str, i64)>)],
) -> io::Result<()> {
    let label_w = blocks.iter().map(|(l, _)| l.len() + 1).max().unwrap_or(0);
    let name_w = blocks
        .iter()
        .flat_map(|(_, parts)| parts.iter().map(|(n, _)| n.len() + 1))
        .max()
        .unwrap_or(0);
    let totals: Vec<i64> = blocks
        .iter()
        .map(|(_, parts)| parts.iter().map(|(_, c)| c).sum())
        .collect();
    let count_w = blocks
        .iter()
        .flat_map(|(_, parts)| parts.iter().map(|(_, c)| c.to_string().len()))
        .max()
        .unwrap_or(0);
    let total_w = totals.iter().map(|t| t.to_string().len()).max().unwrap_or(0);

    writeln!(w, "{header}")?;
    for ((label, parts), &total) in blocks.iter().zip(&totals) {
        if total == 0 {
            writeln!(w, "\t{label:<label_w$}n/a (no motifs in this sequence)")?;
            continue;
        }
        for (j, (name, count)) in parts.iter().enumerate() {
            let shown = if j == 0 { label.as_str() } else { "" };
            writeln!(
                w,
                "\t{shown:<label_w$}{name:<name_w$}{count:>count_w$} / {total:>total_w$} ({}%)",
                percentage(*count, total)
            )?;
        }
    }
    writeln!(w)
}

fn labelled(summary: &Summary) -> Vec<&SequenceSummary> {
    std::iter::once(&summary.all)
        .chain(summary.per_sequence.iter())
        .collect()
}

/// Writes the four report sections, each with the all-sequence rollup first.
pub fn write_summary_to<W: Write>(mut w: W, summary: &Summary) -> io::Result<()> {
    let entries = labelled(summary);
    let label = |s: &SequenceSummary| format!("{}:", s.seq_id);
    let label_w = entries.iter().map(|s| s.seq_id.len() + 2).max().unwrap_or(0);

    writeln!(w, "Total number of motifs:")?;
    for &s in &entries {
        writeln!(w, "\t{:<label_w$}{}", label(s), s.motifs)?;
    }
    writeln!(w)?;

    let strands: Vec<(String, Vec<(&str, i64)>)> = entries
        .iter()
        .map(|&s| (label(s), vec![("Sense:", s.sense), ("Antisense:", s.antisense)]))
        .collect();
    write_breakdown(&mut w, "Strandedness of motifs:", &strands)?;

    writeln!(
        w,
        "Average distance to nearest annotation (excluding overlapping and unmatched motifs):"
    )?;
    for &s in &entries {
        match s.mean_distance() {
            Some(mean) => writeln!(w, "\t{:<label_w$}{mean:.2} bp", label(s))?,
            None => writeln!(w, "\t{:<label_w$}n/a", label(s))?,
        }
    }
    writeln!(w)?;

    let relations: Vec<(String, Vec<(&str, i64)>)> = entries
        .iter()
        .map(|&s| {
            (
                label(s),
                vec![
                    ("Upstream:", s.upstream),
                    ("Overlap:", s.overlap),
                    ("Downstream:", s.downstream),
                    ("N/A:", s.not_applicable),
                ],
            )
        })
        .collect();
    write_breakdown(
        &mut w,
        "Locations of motifs relative to their nearest annotations:",
        &relations,
    )?;
    w.flush()
}

pub fn write_summary<P: AsRef<Path>>(path: P, summary: &Summary) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    write_summary_to(BufWriter::new(File::create(path)?), summary)?;
    debug!("Wrote summary of {} motif(s) to {}", summary.all.motifs, path.display());
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        id: &str,
        seq: &str,
        strand: Strand,
        nearest: Option<(EndpointPair, i64)>,
    ) -> NearestFeature {
        let relation = crate::nearest::classify(nearest.map(|n| n.0), nearest.map_or(0, |n| n.1));
        NearestFeature {
            motif_id: id.to_string(),
            seq_id: seq.to_string(),
            start: 100,
            end: 110,
            motif_strand: strand,
            relation,
            nearest: nearest.map(|(pair, distance)| NearestAnnotation {
                id: format!("annot_{id}"),
                pair,
                distance,
                strand: Strand::Reverse,
            }),
        }
    }

    fn pair(m: Endpoint, a: Endpoint) -> EndpointPair {
        EndpointPair { motif: m, annotation: a }
    }

    fn sample() -> Vec<NearestFeature> {
        use Endpoint::*;
        vec![
            row("g0", "seq2", Strand::Forward, Some((pair(ThreePrime, FivePrime), 30))),
            row("g1", "seq2", Strand::Reverse, Some((pair(FivePrime, ThreePrime), -11))),
            row("g2", "seq2", Strand::Forward, Some((pair(FivePrime, FivePrime), 0))),
            row("g3", "seq10", Strand::Forward, None),
        ]
    }

    #[test]
    fn table_round_trip() {
        let rows = sample();
        let mut buf = Vec::new();
        write_nearest_table_to(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let first = text.lines().next().unwrap();
        assert!(first.starts_with("motif-id  seq-id  start  end  motif-strand"));
        assert!(!text.lines().any(|l| l.ends_with(' ')));
        assert!(text.lines().last().unwrap().contains("N/A"));

        let back = read_nearest_table_from(text.as_bytes()).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn short_row_is_malformed() {
        let text = "header\ng0 seq2 100 110 +\n";
        let err = read_nearest_table_from(text.as_bytes()).unwrap_err();
        assert!(matches!(err, GplexError::MalformedRecord { line_no: 2, .. }));
    }

    #[test]
    fn counts_per_sequence() {
        let summary = summarize(&sample()).unwrap();
        assert_eq!(summary.per_sequence.len(), 2);

        let seq2 = &summary.per_sequence[0];
        assert_eq!(seq2.seq_id, "seq2");
        assert_eq!(
            (seq2.motifs, seq2.sense, seq2.antisense),
            (3, 2, 1)
        );
        assert_eq!((seq2.upstream, seq2.overlap, seq2.downstream), (1, 1, 1));
        assert_eq!(seq2.mean_distance(), Some(20.5));

        let seq10 = &summary.per_sequence[1];
        assert_eq!(seq10.not_applicable, 1);
        assert_eq!(seq10.mean_distance(), None);

        assert_eq!(summary.all.motifs, 4);
        assert_eq!(summary.all.sense, 3);
        assert_eq!(summary.all.distance_count, 2);
    }

    #[test]
    fn empty_input_gives_empty_summary() {
        let summary = summarize(&[]).unwrap();
        assert_eq!(summary.all.motifs, 0);
        assert!(summary.per_sequence.is_empty());

        let mut buf = Vec::new();
        write_summary_to(&mut buf, &summary).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("n/a (no motifs in this sequence)"));
    }

    #[test]
    fn report_text() {
        let summary = summarize(&sample()).unwrap();
        let mut buf = Vec::new();
        write_summary_to(&mut buf, &summary).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("Total number of motifs:\n\tAll sequences: 4\n"));
        assert!(text.contains("Sense:     3 / 4 (75.00%)"));
        assert!(text.contains("\tseq2:          20.50 bp"));
        assert!(text.contains("N/A:        1 / 1 (100.00%)"));
        assert!(text.contains("\tseq10:         n/a\n"));
    }
}
