use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info};

use crate::config::NearestConfig;
use crate::error::Result;
use crate::gff::{Feature, Strand};
use crate::gplexranges_structs::Interval;
use crate::sorts::{self, SeqCodes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    FivePrime,
    ThreePrime,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Endpoint::FivePrime => "5'",
            Endpoint::ThreePrime => "3'",
        })
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "5'" => Ok(Endpoint::FivePrime),
            "3'" => Ok(Endpoint::ThreePrime),
            other => Err(format!("invalid endpoint {other:?}")),
        }
    }
}

/// Which motif end was measured against which annotation end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointPair {
    pub motif: Endpoint,
    pub annotation: Endpoint,
}

impl EndpointPair {
    const fn new(motif: Endpoint, annotation: Endpoint) -> Self {
        EndpointPair { motif, annotation }
    }

    /// Signed `annotation endpoint - motif endpoint`.
    pub fn distance(&self, motif: &Interval, annotation: &Interval) -> i64 {
        let a = match self.annotation {
            Endpoint::FivePrime => annotation.start,
            Endpoint::ThreePrime => annotation.end,
        };
        let m = match self.motif {
            Endpoint::FivePrime => motif.start,
            Endpoint::ThreePrime => motif.end,
        };
        a - m
    }
}

impl fmt::Display for EndpointPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.motif, self.annotation)
    }
}

/// Evaluation order; the first pair reaching the minimum absolute distance wins.
pub const ENDPOINT_PAIRS: [EndpointPair; 4] = [
    EndpointPair::new(Endpoint::FivePrime, Endpoint::FivePrime),
    EndpointPair::new(Endpoint::ThreePrime, Endpoint::FivePrime),
    EndpointPair::new(Endpoint::FivePrime, Endpoint::ThreePrime),
    EndpointPair::new(Endpoint::ThreePrime, Endpoint::ThreePrime),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Upstream,
    Overlap,
    Downstream,
    NotApplicable,
}

impl Relation {
    pub const ALL: [Relation; 4] = [
        Relation::Upstream,
        Relation::Overlap,
        Relation::Downstream,
        Relation::NotApplicable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Upstream => "Upstream",
            Relation::Overlap => "Overlap",
            Relation::Downstream => "Downstream",
            Relation::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Relation::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("invalid relation {s:?}"))
    }
}

/// Motif position relative to its nearest annotation.
///
/// Same-end pairs count as overlap; a motif 3' end before the annotation 5'
/// end is upstream; a motif 5' end past the annotation 3' end is downstream.
pub fn classify(pair: Option<EndpointPair>, distance: i64) -> Relation {
    use Endpoint::*;
    match pair {
        None => Relation::NotApplicable,
        Some(p) if p.motif == p.annotation => Relation::Overlap,
        Some(EndpointPair { motif: ThreePrime, annotation: FivePrime }) if distance > 0 => {
            Relation::Upstream
        }
        Some(EndpointPair { motif: FivePrime, annotation: ThreePrime }) if distance < 0 => {
            Relation::Downstream
        }
        Some(_) => Relation::Overlap,
    }
}

/// Closest endpoint pair of one candidate.
pub fn closest_endpoints(motif: &Interval, annotation: &Interval) -> (EndpointPair, i64) {
    let mut best = (ENDPOINT_PAIRS[0], ENDPOINT_PAIRS[0].distance(motif, annotation));
    for pair in &ENDPOINT_PAIRS[1..] {
        let d = pair.distance(motif, annotation);
        if d.abs() < best.1.abs() {
            best = (*pair, d);
        }
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// `idx` of the winning candidate.
    pub annotation: i64,
    pub pair: EndpointPair,
    pub distance: i64,
}

/// Nearest candidate to `motif` among `candidates`, which must share the
/// motif's sequence and be sorted by start. Earlier candidates win ties.
///
/// With `early_termination`, the scan stops at the first candidate whose
/// start lies further right of the motif end than the best distance so far:
/// every endpoint of it and of all later candidates is at least that far.
pub fn nearest_in_sorted(
    motif: &Interval,
    candidates: &[Interval],
    early_termination: bool,
) -> Option<Hit> {
    let mut best: Option<Hit> = None;

    for candidate in candidates {
        if early_termination {
            if let Some(b) = &best {
                if candidate.start - motif.end > b.distance.abs() {
                    break;
                }
            }
        }

        let (pair, distance) = closest_endpoints(motif, candidate);
        if best.map_or(true, |b| distance.abs() < b.distance.abs()) {
            best = Some(Hit {
                annotation: candidate.idx,
                pair,
                distance,
            });
        }
    }

    best
}

/// Annotation side of a nearest-feature row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearestAnnotation {
    pub id: String,
    pub pair: EndpointPair,
    pub distance: i64,
    pub strand: Strand,
}

/// One row of the nearest-feature table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearestFeature {
    pub motif_id: String,
    pub seq_id: String,
    pub start: i64,
    pub end: i64,
    pub motif_strand: Strand,
    pub relation: Relation,
    /// `None` when the sequence carries no candidate annotation.
    pub nearest: Option<NearestAnnotation>,
}

/// Finds the nearest annotation of every motif. Rows come out sorted by
/// `(seq_id, start, end)`; candidates are the annotations passing
/// `config.accepts`.
pub fn nearest_features(
    motifs: &[Feature],
    annotations: &[Feature],
    config: &NearestConfig,
) -> Result<Vec<NearestFeature>> {
    let start = Instant::now();
    let codes = SeqCodes::from_ids(
        motifs
            .iter()
            .chain(annotations)
            .map(|f| f.seq_id.as_str()),
    );

    let motif_intervals = sorts::build_sorted_intervals(motifs, &codes)?;
    let mut candidates = sorts::build_sorted_intervals(annotations, &codes)?;
    candidates.retain(|iv| config.accepts(&annotations[iv.idx as usize]));
    let groups = sorts::split_by_chromosome(candidates);

    let mut rows = Vec::with_capacity(motifs.len());
    for m in &motif_intervals {
        let motif = &motifs[m.idx as usize];
        let group = groups.get(&m.chr).map(Vec::as_slice).unwrap_or_default();
        let hit = nearest_in_sorted(m, group, config.early_termination);

        let nearest = hit.map(|h| {
            let annotation = &annotations[h.annotation as usize];
            NearestAnnotation {
                id: annotation.id().unwrap_or_default().to_string(),
                pair: h.pair,
                distance: h.distance,
                strand: annotation.strand,
            }
        });
        let relation = classify(hit.map(|h| h.pair), hit.map_or(0, |h| h.distance));

        rows.push(NearestFeature {
            motif_id: motif.id().unwrap_or_default().to_string(),
            seq_id: motif.seq_id.clone(),
            start: motif.start,
            end: motif.end,
            motif_strand: motif.strand,
            relation,
            nearest,
        });
    }

    debug!("Nearest-feature search took {:?}", start.elapsed());
    info!(
        "Located nearest annotations for {} motif(s) against {} candidate(s)",
        rows.len(),
        groups.values().map(Vec::len).sum::<usize>()
    );
    Ok(rows)
}
