use std::time::Instant;

use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::alignments::{AlignedSpan, AlignmentSet};
use crate::config::NonAlignmentConfig;
use crate::error::{GplexError, Result};
use crate::gff::{sort_sequence_regions, Attributes, Feature, SequenceRegion};
use crate::gplexranges_structs::{Gap, Interval, MergedSpan};
use crate::sorts::{self, SeqCodes};

/// Type written in column 3 of every non-alignment feature.
pub const NON_ALIGNMENT_TYPE: &str = "non-alignment";

/// Folds overlapping or abutting intervals into merged spans, one forward
/// pass over the intervals sorted by `(chr, start, end)`.
///
/// Coordinates are inclusive, so `(1,5)` and `(6,9)` merge into `(1,9)`.
pub fn sweep_line_merge(intervals: &mut [Interval]) -> Vec<MergedSpan> {
    let start = Instant::now();
    let mut merged: Vec<MergedSpan> = Vec::with_capacity(intervals.len());

    sorts::sort_intervals(intervals);

    let mut iter = intervals.iter();
    let Some(first) = iter.next() else {
        return merged;
    };
    let mut current = MergedSpan {
        chr: first.chr,
        start: first.start,
        end: first.end,
        count: 1,
    };

    for iv in iter {
        if iv.chr == current.chr && iv.start <= current.end + 1 {
            current.end = current.end.max(iv.end);
            current.count += 1;
        } else {
            merged.push(current);
            current = MergedSpan {
                chr: iv.chr,
                start: iv.start,
                end: iv.end,
                count: 1,
            };
        }
    }
    merged.push(current);

    debug!(
        "Merged {} interval(s) into {} span(s) in {:?}",
        intervals.len(),
        merged.len(),
        start.elapsed()
    );
    merged
}

/// Complement of `merged` within each declared region.
///
/// Each region is bracketed by the fillers `(start-1)` and `(end+1)`; the gap
/// between consecutive spans `a`, `b` is `(a.end+1, b.start-1)`. Gaps with
/// `start > end` (abutting spans, spans touching a boundary) are not emitted.
/// Regions are visited in code order; `regions` maps a code to its bounds.
pub fn invert(merged: &[MergedSpan], regions: &FxHashMap<i64, (i64, i64)>) -> Vec<Gap> {
    let mut by_chr: FxHashMap<i64, Vec<&MergedSpan>> = FxHashMap::default();
    for span in merged {
        by_chr.entry(span.chr).or_default().push(span);
    }

    let mut chrs: Vec<i64> = regions.keys().copied().collect();
    radsort::sort(&mut chrs);

    let mut gaps = Vec::new();
    for chr in chrs {
        let (region_start, region_end) = regions[&chr];
        let mut push = |start: i64, end: i64| {
            let start = start.max(region_start);
            let end = end.min(region_end);
            if start <= end {
                gaps.push(Gap { chr, start, end });
            }
        };

        let mut prev_end = region_start - 1;
        for span in by_chr.get(&chr).map(Vec::as_slice).unwrap_or_default() {
            push(prev_end + 1, span.start - 1);
            prev_end = prev_end.max(span.end);
        }
        push(prev_end + 1, region_end);
    }

    gaps
}

/// Non-alignment features plus the regions they were computed against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NonAlignments {
    /// Natural-sorted.
    pub sequence_regions: Vec<SequenceRegion>,
    /// In emission order: sequences in natural order, starts ascending.
    pub features: Vec<Feature>,
}

fn non_alignment_feature(
    seq_id: &str,
    gap: &Gap,
    n: usize,
    config: &NonAlignmentConfig,
) -> Feature {
    let id = format!("{}{}", config.id_prefix, n);
    let attributes = Attributes::new()
        .with("ID", id.as_str())
        .with("Name", id.as_str())
        .with("Start", gap.start.to_string())
        .with("End", gap.end.to_string());
    Feature::new(seq_id, config.source.as_str(), NON_ALIGNMENT_TYPE, gap.start, gap.end)
        .with_attributes(attributes)
}

/// Merges the spans of every declared sequence and emits the uncovered
/// stretches as features.
pub fn non_alignments_from_spans(
    regions: &[SequenceRegion],
    spans: &[AlignedSpan],
    config: &NonAlignmentConfig,
) -> Result<NonAlignments> {
    let codes = SeqCodes::from_ids(regions.iter().map(|r| r.seq_id.as_str()));

    let mut bounds: FxHashMap<i64, (i64, i64)> = FxHashMap::default();
    for region in regions {
        if let Some(chr) = codes.code::<i64>(&region.seq_id) {
            bounds.insert(chr, (region.start, region.end));
        }
    }

    let mut intervals = Vec::with_capacity(spans.len());
    for (i, span) in spans.iter().enumerate() {
        let chr = codes
            .code::<i64>(&span.seq_id)
            .ok_or_else(|| GplexError::UnknownSequence {
                seq_id: span.seq_id.clone(),
            })?;
        intervals.push(Interval {
            chr,
            start: span.start,
            end: span.end,
            idx: i as i64,
        });
    }

    let merged = sweep_line_merge(&mut intervals);
    let gaps = invert(&merged, &bounds);

    let mut features = Vec::with_capacity(gaps.len());
    for (n, gap) in gaps.iter().enumerate() {
        let seq_id = codes.name(gap.chr).unwrap_or_default();
        features.push(non_alignment_feature(seq_id, gap, n, config));
    }

    let mut sequence_regions = regions.to_vec();
    sort_sequence_regions(&mut sequence_regions);

    info!(
        "Found {} non-alignment(s) across {} sequence(s)",
        features.len(),
        sequence_regions.len()
    );
    Ok(NonAlignments {
        sequence_regions,
        features,
    })
}

pub fn non_alignments(set: &AlignmentSet, config: &NonAlignmentConfig) -> Result<NonAlignments> {
    non_alignments_from_spans(&set.sequence_regions, &set.spans, config)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    use super::*;

    fn iv(chr: i64, start: i64, end: i64) -> Interval {
        Interval { chr, start, end, idx: 0 }
    }

    fn bounds(spans: &[MergedSpan]) -> Vec<(i64, i64)> {
        spans.iter().map(|s| (s.start, s.end)).collect()
    }

    fn span(seq: &str, start: i64, end: i64) -> AlignedSpan {
        AlignedSpan { seq_id: seq.to_string(), start, end }
    }

    #[test]
    fn merges_overlapping_and_abutting() {
        let mut ivs = vec![iv(0, 15, 25), iv(0, 50, 60), iv(0, 10, 20), iv(0, 26, 30), iv(1, 1, 2)];
        let merged = sweep_line_merge(&mut ivs);
        assert_eq!(bounds(&merged), vec![(10, 30), (50, 60), (1, 2)]);
        assert_eq!(merged[0].count, 3);
        assert_eq!(merged[2].chr, 1);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut ivs = vec![iv(0, 1, 4), iv(0, 10, 20), iv(0, 30, 31)];
        let merged = sweep_line_merge(&mut ivs.clone());
        assert_eq!(bounds(&merged), vec![(1, 4), (10, 20), (30, 31)]);

        let mut again: Vec<Interval> = merged.iter().map(|m| iv(m.chr, m.start, m.end)).collect();
        assert_eq!(bounds(&sweep_line_merge(&mut again)), bounds(&merged));
        assert_eq!(bounds(&sweep_line_merge(&mut ivs)), bounds(&merged));
    }

    #[test]
    fn merge_ignores_input_order() {
        let base = vec![
            iv(0, 5, 9),
            iv(0, 100, 120),
            iv(0, 7, 40),
            iv(0, 41, 41),
            iv(0, 60, 70),
            iv(0, 65, 66),
            iv(0, 200, 300),
            iv(0, 119, 150),
        ];
        let expected = bounds(&sweep_line_merge(&mut base.clone()));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut shuffled = base.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(bounds(&sweep_line_merge(&mut shuffled)), expected);
        }
    }

    #[test]
    fn scenario_merge_and_invert() {
        let regions = vec![SequenceRegion::new("chr1", 100)];
        let spans = vec![span("chr1", 10, 20), span("chr1", 15, 25), span("chr1", 50, 60)];
        let out =
            non_alignments_from_spans(&regions, &spans, &NonAlignmentConfig::default()).unwrap();

        let coords: Vec<_> = out.features.iter().map(|f| (f.start, f.end)).collect();
        assert_eq!(coords, vec![(1, 9), (26, 49), (61, 100)]);
        assert_eq!(
            out.features[1].to_string(),
            "chr1\tblastn\tnon-alignment\t26\t49\t.\t.\t.\tID=nal_1;Name=nal_1;Start=26;End=49"
        );
    }

    #[test]
    fn boundary_spans_leave_no_degenerate_gaps() {
        let regions = vec![SequenceRegion::new("s", 50)];
        let spans = vec![span("s", 1, 10), span("s", 11, 20), span("s", 40, 50)];
        let out =
            non_alignments_from_spans(&regions, &spans, &NonAlignmentConfig::default()).unwrap();
        let coords: Vec<_> = out.features.iter().map(|f| (f.start, f.end)).collect();
        assert_eq!(coords, vec![(21, 39)]);
    }

    #[test]
    fn merged_and_gaps_tile_the_sequence() {
        let length = 1000;
        let mut rng = StdRng::seed_from_u64(42);
        let mut spans = Vec::new();
        for _ in 0..40 {
            let start = rand::Rng::gen_range(&mut rng, 1..=length);
            let len = rand::Rng::gen_range(&mut rng, 0..30);
            spans.push(span("chr", start, (start + len).min(length)));
        }

        let codes = SeqCodes::from_ids(["chr"]);
        let mut ivs: Vec<Interval> = spans.iter().map(|s| iv(0, s.start, s.end)).collect();
        let merged = sweep_line_merge(&mut ivs);
        let mut regions = FxHashMap::default();
        regions.insert(codes.code::<i64>("chr").unwrap(), (1, length));
        let gaps = invert(&merged, &regions);

        let mut pieces: Vec<(i64, i64)> = bounds(&merged);
        pieces.extend(gaps.iter().map(|g| (g.start, g.end)));
        pieces.sort();
        assert_eq!(pieces.first().unwrap().0, 1);
        assert_eq!(pieces.last().unwrap().1, length);
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0, "gap or overlap between {pair:?}");
        }
    }

    #[test]
    fn sequences_without_spans_are_fully_unaligned() {
        let regions = vec![SequenceRegion::new("seq10", 30), SequenceRegion::new("seq2", 20)];
        let spans = vec![span("seq10", 5, 30)];
        let out =
            non_alignments_from_spans(&regions, &spans, &NonAlignmentConfig::default()).unwrap();
        let rows: Vec<_> = out
            .features
            .iter()
            .map(|f| (f.seq_id.as_str(), f.start, f.end, f.id().unwrap().to_string()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("seq2", 1, 20, "nal_0".to_string()),
                ("seq10", 1, 4, "nal_1".to_string()),
            ]
        );
        assert_eq!(out.sequence_regions[0].seq_id, "seq2");
    }

    #[test]
    fn undeclared_sequence_is_rejected() {
        let regions = vec![SequenceRegion::new("chr1", 100)];
        let spans = [span("chrUn", 1, 5)];
        let err = non_alignments_from_spans(&regions, &spans, &NonAlignmentConfig::default())
            .unwrap_err();
        assert!(matches!(err, GplexError::UnknownSequence { seq_id } if seq_id == "chrUn"));
    }
}
