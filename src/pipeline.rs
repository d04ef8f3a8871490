//! File-in, file-out stages. Each stage loads its inputs, computes everything,
//! then writes its outputs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;

use crate::alignments::read_alignments;
use crate::config::{NearestConfig, NonAlignmentConfig, OverlapConfig};
use crate::error::Result;
use crate::gff::{read_gff, write_gff};
use crate::merge::{non_alignments, NonAlignments};
use crate::nearest::{nearest_features, NearestFeature};
use crate::overlaps::{gene_overlaps, GeneOverlap};
use crate::report::{read_nearest_table, summarize, write_nearest_table, write_summary, Summary};

pub fn run_non_alignments(
    alignments: &Path,
    output: &Path,
    config: &NonAlignmentConfig,
) -> Result<NonAlignments> {
    let set = read_alignments(alignments)?;
    let nal = non_alignments(&set, config)?;
    write_gff(output, &[], &nal.sequence_regions, &nal.features)?;
    Ok(nal)
}

/// The three filtered GFF files written by `run_gene_overlap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneOverlapOutputs {
    pub genes: PathBuf,
    pub non_alignments: PathBuf,
    pub motifs: PathBuf,
}

impl GeneOverlapOutputs {
    /// `genes.gff3`, `non_alignments.gff3` and `gplex.gff3` under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        GeneOverlapOutputs {
            genes: dir.join("genes.gff3"),
            non_alignments: dir.join("non_alignments.gff3"),
            motifs: dir.join("gplex.gff3"),
        }
    }
}

/// Filters genes by non-alignment coverage and motif proximity. Each output
/// keeps the header lines and sequence regions of the file it was drawn from.
pub fn run_gene_overlap(
    genes: &Path,
    motifs: &Path,
    non_alignments: &Path,
    outputs: &GeneOverlapOutputs,
    config: &OverlapConfig,
) -> Result<GeneOverlap> {
    let gene_doc = read_gff(genes)?;
    let motif_doc = read_gff(motifs)?;
    let nal_doc = read_gff(non_alignments)?;

    let out = gene_overlaps(&gene_doc.features, &motif_doc.features, &nal_doc.features, config)?;

    write_gff(&outputs.genes, &gene_doc.header_lines, &gene_doc.sequence_regions, &out.genes)?;
    write_gff(
        &outputs.non_alignments,
        &nal_doc.header_lines,
        &nal_doc.sequence_regions,
        &out.non_alignments,
    )?;
    write_gff(&outputs.motifs, &motif_doc.header_lines, &motif_doc.sequence_regions, &out.motifs)?;
    Ok(out)
}

/// Nearest annotation of every motif, written as a data table and optionally
/// summarized.
pub fn run_nearest(
    motifs: &Path,
    annotations: &Path,
    data: &Path,
    summary: Option<&Path>,
    config: &NearestConfig,
) -> Result<Vec<NearestFeature>> {
    let motif_doc = read_gff(motifs)?;
    let annotation_doc = read_gff(annotations)?;

    let rows = nearest_features(&motif_doc.features, &annotation_doc.features, config)?;
    let report = match summary {
        Some(path) => Some((path, summarize(&rows)?)),
        None => None,
    };

    write_nearest_table(data, &rows)?;
    if let Some((path, report)) = report {
        write_summary(path, &report)?;
    }
    Ok(rows)
}

pub fn run_summarize(data: &Path, output: &Path) -> Result<Summary> {
    let rows = read_nearest_table(data)?;
    let summary = summarize(&rows)?;
    write_summary(output, &summary)?;
    Ok(summary)
}

/// Inputs of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInputs {
    pub alignments: PathBuf,
    pub annotations: PathBuf,
    pub motifs: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    pub non_alignments: NonAlignmentConfig,
    pub overlap: OverlapConfig,
    pub nearest: NearestConfig,
}

/// Where `run_pipeline` puts its files, all under one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutputs {
    pub non_alignments: PathBuf,
    pub filtered: GeneOverlapOutputs,
    pub annotation_data: PathBuf,
    pub annotation_report: PathBuf,
    pub nal_data: PathBuf,
    pub nal_report: PathBuf,
}

impl PipelineOutputs {
    pub fn in_dir(dir: &Path) -> Self {
        let analyses = dir.join("analyses");
        PipelineOutputs {
            non_alignments: dir.join("non_alignments.gff3"),
            filtered: GeneOverlapOutputs::in_dir(&dir.join("filtered")),
            annotation_data: analyses.join("gplex.txt"),
            annotation_report: analyses.join("gplex_summary.txt"),
            nal_data: analyses.join("nal.txt"),
            nal_report: analyses.join("nal_summary.txt"),
        }
    }
}

/// Non-alignments, then the gene filter, then the motifs' nearest annotation
/// and nearest non-alignment, each with a summary.
pub fn run_pipeline(
    inputs: &PipelineInputs,
    out_dir: &Path,
    config: &PipelineConfig,
) -> Result<PipelineOutputs> {
    config.overlap.validate()?;
    let start = Instant::now();
    let outputs = PipelineOutputs::in_dir(out_dir);

    info!("Stage 1/4: non-alignments");
    run_non_alignments(&inputs.alignments, &outputs.non_alignments, &config.non_alignments)?;

    info!("Stage 2/4: gene overlap");
    run_gene_overlap(
        &inputs.annotations,
        &inputs.motifs,
        &outputs.non_alignments,
        &outputs.filtered,
        &config.overlap,
    )?;

    info!("Stage 3/4: nearest annotation");
    run_nearest(
        &inputs.motifs,
        &inputs.annotations,
        &outputs.annotation_data,
        Some(&outputs.annotation_report),
        &config.nearest,
    )?;

    info!("Stage 4/4: nearest non-alignment");
    let nal_config = NearestConfig {
        annotation_types: Vec::new(),
        ..config.nearest.clone()
    };
    run_nearest(
        &inputs.motifs,
        &outputs.non_alignments,
        &outputs.nal_data,
        Some(&outputs.nal_report),
        &nal_config,
    )?;

    info!("Pipeline finished in {:?}; outputs under {}", start.elapsed(), out_dir.display());
    Ok(outputs)
}
