use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use gplexranges::config::{FastaConfig, NearestConfig, NonAlignmentConfig, OverlapConfig};
use gplexranges::fasta::{first_header_fields, read_sequence_regions};
use gplexranges::pipeline::{self, GeneOverlapOutputs, PipelineConfig, PipelineInputs};

/// Non-alignments, gene coverage filtering and nearest-feature reports for GFF annotations.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the stretches of each sequence not covered by any aligned read.
    NonAlignments {
        /// SAM file with @SQ headers
        alignments: PathBuf,
        /// Output GFF3
        output: PathBuf,
        #[command(flatten)]
        opts: NonAlignmentArgs,
    },

    /// Keep genes covered by non-alignments with a motif nearby.
    GeneOverlap {
        genes: PathBuf,
        motifs: PathBuf,
        non_alignments: PathBuf,
        genes_out: PathBuf,
        non_alignments_out: PathBuf,
        motifs_out: PathBuf,
        #[command(flatten)]
        opts: OverlapArgs,
    },

    /// Find the nearest annotation of every motif.
    Nearest {
        motifs: PathBuf,
        annotations: PathBuf,
        /// Output data table
        data: PathBuf,
        /// Also write a summary report here
        #[arg(long)]
        summary: Option<PathBuf>,
        #[command(flatten)]
        opts: NearestArgs,
    },

    /// Summarize a previously written data table.
    Summarize { data: PathBuf, output: PathBuf },

    /// Print ##sequence-region lines for the records of a FASTA file.
    Seqregs {
        fasta: PathBuf,
        /// Index of the header field used as the sequence id
        #[arg(long, required_unless_present = "show_fields")]
        header_field: Option<usize>,
        /// Print the numbered fields of the first header instead
        #[arg(long)]
        show_fields: bool,
    },

    /// Run every stage, writing all outputs under one directory.
    Pipeline {
        alignments: PathBuf,
        annotations: PathBuf,
        motifs: PathBuf,
        out_dir: PathBuf,
        #[command(flatten)]
        nal: NonAlignmentArgs,
        #[command(flatten)]
        overlap: OverlapArgs,
        #[command(flatten)]
        nearest: NearestArgs,
    },
}

#[derive(Args, Debug)]
struct NonAlignmentArgs {
    /// Column 2 of the emitted features
    #[arg(long, default_value = "blastn")]
    source: String,
}

impl From<NonAlignmentArgs> for NonAlignmentConfig {
    fn from(args: NonAlignmentArgs) -> Self {
        NonAlignmentConfig {
            source: args.source,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
struct OverlapArgs {
    /// Fraction of a gene that non-alignments must exceed
    #[arg(long, default_value_t = 0.40)]
    min_coverage: f64,
    /// Largest gap between a gene and a supporting motif
    #[arg(long, default_value_t = 25)]
    max_distance: i64,
    /// Feature type treated as a gene; "*" accepts every type
    #[arg(long, default_value = "gene")]
    gene_type: String,
}

impl From<OverlapArgs> for OverlapConfig {
    fn from(args: OverlapArgs) -> Self {
        OverlapConfig {
            min_coverage: args.min_coverage,
            max_distance: args.max_distance,
            gene_type: (args.gene_type != "*").then_some(args.gene_type),
        }
    }
}

#[derive(Args, Debug)]
struct NearestArgs {
    /// Only consider annotations of this type (repeatable)
    #[arg(long = "annotation-type")]
    annotation_types: Vec<String>,
    /// Scan every candidate instead of stopping early
    #[arg(long)]
    full_scan: bool,
}

impl From<NearestArgs> for NearestConfig {
    fn from(args: NearestArgs) -> Self {
        NearestConfig {
            annotation_types: args.annotation_types,
            early_termination: !args.full_scan,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::NonAlignments { alignments, output, opts } => {
            pipeline::run_non_alignments(&alignments, &output, &opts.into())
                .context("non-alignments stage failed")?;
        }
        Command::GeneOverlap {
            genes,
            motifs,
            non_alignments,
            genes_out,
            non_alignments_out,
            motifs_out,
            opts,
        } => {
            let outputs = GeneOverlapOutputs {
                genes: genes_out,
                non_alignments: non_alignments_out,
                motifs: motifs_out,
            };
            pipeline::run_gene_overlap(&genes, &motifs, &non_alignments, &outputs, &opts.into())
                .context("gene-overlap stage failed")?;
        }
        Command::Nearest { motifs, annotations, data, summary, opts } => {
            pipeline::run_nearest(&motifs, &annotations, &data, summary.as_deref(), &opts.into())
                .context("nearest stage failed")?;
        }
        Command::Summarize { data, output } => {
            pipeline::run_summarize(&data, &output).context("summarize stage failed")?;
        }
        Command::Seqregs { fasta, header_field, show_fields } => {
            if show_fields {
                let fields = first_header_fields(&fasta)
                    .with_context(|| format!("could not read {}", fasta.display()))?;
                for (i, field) in fields.iter().enumerate() {
                    println!("{i}\t{field}");
                }
            } else if let Some(header_field) = header_field {
                let regions = read_sequence_regions(&fasta, &FastaConfig::new(header_field))
                    .with_context(|| {
                        format!("could not derive sequence regions from {}", fasta.display())
                    })?;
                for region in regions {
                    println!("{region}");
                }
            }
        }
        Command::Pipeline {
            alignments,
            annotations,
            motifs,
            out_dir,
            nal,
            overlap,
            nearest,
        } => {
            let inputs = PipelineInputs { alignments, annotations, motifs };
            let config = PipelineConfig {
                non_alignments: nal.into(),
                overlap: overlap.into(),
                nearest: nearest.into(),
            };
            let outputs =
                pipeline::run_pipeline(&inputs, &out_dir, &config).context("pipeline failed")?;
            for report in [&outputs.annotation_report, &outputs.nal_report] {
                println!("{}", report.display());
            }
        }
    }

    Ok(())
}
