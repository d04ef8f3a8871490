use std::time::Instant;

use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::config::OverlapConfig;
use crate::error::Result;
use crate::gff::Feature;
use crate::gplexranges_structs::Interval;
use crate::sorts::{self, SeqCodes};

/// What one gene collected while scanning its sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSupport {
    /// Index of the gene in the input slice.
    pub gene: usize,
    /// Summed overlap length with non-alignments.
    pub covered: i64,
    /// `covered / (end - start)`, 0 for zero-length genes.
    pub coverage: f64,
    pub non_alignments: Vec<usize>,
    pub motifs: Vec<usize>,
}

impl GeneSupport {
    pub fn accepted(&self, config: &OverlapConfig) -> bool {
        self.coverage > config.min_coverage && !self.motifs.is_empty()
    }
}

/// Accepted genes together with the non-alignments and motifs that support them.
/// Duplicates across genes are kept; the GFF writer drops them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneOverlap {
    pub genes: Vec<Feature>,
    pub non_alignments: Vec<Feature>,
    pub motifs: Vec<Feature>,
}

/// Overlap/proximity scan for one gene against the sorted intervals of its sequence.
///
/// A non-alignment supports the gene when `min(ends) > max(starts)`, adding
/// that difference to the covered length. A motif supports it when
/// `max(starts) - min(ends) <= max_distance`, which holds for every
/// overlapping motif and for disjoint motifs close enough.
pub fn scan_gene(
    gene: &Interval,
    non_alignments: &[Interval],
    motifs: &[Interval],
    max_distance: i64,
) -> GeneSupport {
    let mut covered = 0_i64;
    let mut nal_hits = Vec::new();
    let mut motif_hits = Vec::new();

    for nal in non_alignments {
        // sorted by start: nothing further right can overlap
        if nal.start >= gene.end {
            break;
        }
        let start = gene.start.max(nal.start);
        let end = gene.end.min(nal.end);
        if end > start {
            nal_hits.push(nal.idx as usize);
            covered += end - start;
        }
    }

    for motif in motifs {
        if motif.start - gene.end > max_distance {
            break;
        }
        let start = gene.start.max(motif.start);
        let end = gene.end.min(motif.end);
        if start - end <= max_distance {
            motif_hits.push(motif.idx as usize);
        }
    }

    let length = gene.end - gene.start;
    let coverage = if length > 0 {
        covered as f64 / length as f64
    } else {
        0.0
    };

    GeneSupport {
        gene: gene.idx as usize,
        covered,
        coverage,
        non_alignments: nal_hits,
        motifs: motif_hits,
    }
}

/// Scans every gene (features passing `config.is_gene`) and returns the
/// per-gene support, in input order.
pub fn gene_support(
    genes: &[Feature],
    motifs: &[Feature],
    non_alignments: &[Feature],
    config: &OverlapConfig,
) -> Result<Vec<GeneSupport>> {
    config.validate()?;
    let start = Instant::now();

    let codes = SeqCodes::from_ids(
        genes
            .iter()
            .chain(motifs)
            .chain(non_alignments)
            .map(|f| f.seq_id.as_str()),
    );
    let gene_intervals = sorts::build_intervals(genes, &codes)?;
    let mut nal_intervals = sorts::build_sorted_intervals(non_alignments, &codes)?;
    // a repeated non-alignment row covers the gene once
    let mut seen: FxHashSet<&Feature> = FxHashSet::default();
    nal_intervals.retain(|iv| seen.insert(&non_alignments[iv.idx as usize]));
    let nal_groups = sorts::split_by_chromosome(nal_intervals);
    let motif_groups = sorts::split_by_chromosome(sorts::build_sorted_intervals(motifs, &codes)?);

    let support: Vec<GeneSupport> = gene_intervals
        .iter()
        .filter(|iv| config.is_gene(&genes[iv.idx as usize]))
        .map(|iv| {
            scan_gene(
                iv,
                nal_groups.get(&iv.chr).map(Vec::as_slice).unwrap_or_default(),
                motif_groups.get(&iv.chr).map(Vec::as_slice).unwrap_or_default(),
                config.max_distance,
            )
        })
        .collect();

    debug!("Scanned {} gene(s) in {:?}", support.len(), start.elapsed());
    Ok(support)
}

/// Keeps the genes whose non-alignment coverage strictly exceeds
/// `min_coverage` and that have at least one motif within `max_distance`.
pub fn gene_overlaps(
    genes: &[Feature],
    motifs: &[Feature],
    non_alignments: &[Feature],
    config: &OverlapConfig,
) -> Result<GeneOverlap> {
    let support = gene_support(genes, motifs, non_alignments, config)?;

    let mut out = GeneOverlap::default();
    for s in support.iter().filter(|s| s.accepted(config)) {
        out.genes.push(genes[s.gene].clone());
        out.non_alignments
            .extend(s.non_alignments.iter().map(|&i| non_alignments[i].clone()));
        out.motifs.extend(s.motifs.iter().map(|&i| motifs[i].clone()));
    }

    info!(
        "{} of {} gene(s) pass coverage > {} with a motif within {} bp",
        out.genes.len(),
        support.len(),
        config.min_coverage,
        config.max_distance
    );
    Ok(out)
}
