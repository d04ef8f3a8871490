use num_traits::PrimInt;
use radsort::sort_by_key;
use rustc_hash::FxHashMap;

use crate::error::{GplexError, Result};
use crate::gff::Feature;
use crate::gplexranges_structs::Interval;
use crate::natsort::natural_cmp;

/// Maps sequence ids to integer codes whose numeric order is the natural
/// order of the ids, so intervals can be radix-sorted by `(chr, start, end)`.
#[derive(Debug, Clone, Default)]
pub struct SeqCodes {
    codes: FxHashMap<String, usize>,
    names: Vec<String>,
}

impl SeqCodes {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        // natural_cmp only reports Equal for identical strings
        names.sort_by(|a, b| natural_cmp(a, b));
        names.dedup();

        let codes = names
            .iter()
            .enumerate()
            .map(|(rank, name)| (name.clone(), rank))
            .collect();
        SeqCodes { codes, names }
    }

    /// Code for `id`, converted to the caller's integer type.
    pub fn code<T: PrimInt>(&self, id: &str) -> Option<T> {
        self.codes.get(id).and_then(|&rank| T::from(rank))
    }

    pub fn name<T: PrimInt>(&self, code: T) -> Option<&str> {
        code.to_usize()
            .and_then(|rank| self.names.get(rank))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One `Interval` per feature, `idx` being the feature's position in `features`.
pub fn build_intervals(features: &[Feature], codes: &SeqCodes) -> Result<Vec<Interval>> {
    let mut intervals: Vec<Interval> = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        let chr = codes
            .code::<i64>(&feature.seq_id)
            .ok_or_else(|| GplexError::UnknownSequence {
                seq_id: feature.seq_id.clone(),
            })?;
        intervals.push(Interval {
            chr,
            start: feature.start,
            end: feature.end,
            idx: i as i64,
        });
    }

    Ok(intervals)
}

/// Sorts by `(chr, start, end)`; radsort is stable, so the least significant key goes first.
pub fn sort_intervals(intervals: &mut [Interval]) {
    sort_by_key(intervals, |i| i.end);
    sort_by_key(intervals, |i| i.start);
    sort_by_key(intervals, |i| i.chr);
}

pub fn build_sorted_intervals(features: &[Feature], codes: &SeqCodes) -> Result<Vec<Interval>> {
    let mut intervals = build_intervals(features, codes)?;
    sort_intervals(&mut intervals);
    Ok(intervals)
}

/// Reorders features by `(seq_id, start, end)` with `seq_id` in natural order.
/// Ties keep their input order.
pub fn sort_features(features: Vec<Feature>) -> Vec<Feature> {
    let codes = SeqCodes::from_ids(features.iter().map(|f| f.seq_id.as_str()));
    // Every id is in `codes`, so this cannot fail.
    let Ok(order) = build_sorted_intervals(&features, &codes) else {
        return features;
    };

    let mut slots: Vec<Option<Feature>> = features.into_iter().map(Some).collect();
    order
        .iter()
        .filter_map(|iv| slots[iv.idx as usize].take())
        .collect()
}

/// Groups intervals by chromosome, keeping their relative order.
pub fn split_by_chromosome(intervals: Vec<Interval>) -> FxHashMap<i64, Vec<Interval>> {
    let mut result: FxHashMap<i64, Vec<Interval>> = FxHashMap::default();
    for interval in intervals {
        result.entry(interval.chr).or_default().push(interval);
    }

    result
}
