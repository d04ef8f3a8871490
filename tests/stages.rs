use std::fs;
use std::path::{Path, PathBuf};

use gplexranges::config::{NearestConfig, NonAlignmentConfig, OverlapConfig};
use gplexranges::gff::read_gff;
use gplexranges::nearest::Relation;
use gplexranges::pipeline::{
    run_gene_overlap, run_nearest, run_non_alignments, run_pipeline, run_summarize,
    GeneOverlapOutputs, PipelineConfig, PipelineInputs,
};
use gplexranges::report::read_nearest_table;
use gplexranges::GplexError;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const SAM: &str = "@HD\tVN:1.6\tSO:unsorted\n\
@SQ\tSN:chr2\tLN:100\n\
@SQ\tSN:chr1\tLN:300\n\
r1\t0\tchr1\t10\t60\t11M\t*\t0\t0\tACGTACGTACG\t*\n\
r2\t0\tchr1\t15\t60\t11M\t*\t0\t0\tACGTACGTACG\t*\n\
r3\t16\tchr1\t50\t60\t11M\t*\t0\t0\tACGTACGTACG\t*\n\
r4\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n";

const GENES: &str = "##gff-version 3\n\
##sequence-region chr1 1 300\n\
chr1\tsrc\tgene\t100\t200\t.\t+\t.\tID=g1\n\
chr1\tsrc\tgene\t20\t40\t.\t-\t.\tID=g2\n\
chr1\tsrc\tCDS\t110\t190\t.\t+\t0\tID=cds1;Parent=g1\n";

const MOTIFS: &str = "##gff-version 3\n\
chr1\tfinder\tG_quartet\t150\t160\t.\t+\t.\tID=gplex_0\n\
chr1\tfinder\tG_quartet\t270\t280\t.\t-\t.\tID=gplex_1\n";

struct Workspace {
    dir: TempDir,
    sam: PathBuf,
    genes: PathBuf,
    motifs: PathBuf,
}

impl Workspace {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, text: &str| {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    };
    let sam = write("reads.sam", SAM);
    let genes = write("genes.gff3", GENES);
    let motifs = write("gplex.gff3", MOTIFS);
    Workspace { dir, sam, genes, motifs }
}

fn ids(path: &Path) -> Vec<String> {
    read_gff(path)
        .unwrap()
        .features
        .iter()
        .filter_map(|f| f.id().map(str::to_string))
        .collect()
}

fn genes_only() -> NearestConfig {
    NearestConfig {
        annotation_types: vec!["gene".to_string()],
        ..Default::default()
    }
}

#[rstest]
fn non_alignments_file(workspace: Workspace) -> anyhow::Result<()> {
    let out = workspace.path("out/nal.gff3");
    let nal = run_non_alignments(&workspace.sam, &out, &NonAlignmentConfig::default())?;
    assert_eq!(nal.features.len(), 4);

    let text = fs::read_to_string(&out)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "##gff-version 3");
    assert_eq!(lines[1], "##sequence-region chr1 1 300");
    assert_eq!(lines[2], "##sequence-region chr2 1 100");

    let coords: Vec<(String, i64, i64)> = read_gff(&out)?
        .features
        .iter()
        .map(|f| (f.seq_id.clone(), f.start, f.end))
        .collect();
    assert_eq!(
        coords,
        vec![
            ("chr1".to_string(), 1, 9),
            ("chr1".to_string(), 26, 49),
            ("chr1".to_string(), 61, 300),
            ("chr2".to_string(), 1, 100),
        ]
    );
    assert_eq!(ids(&out), vec!["nal_0", "nal_1", "nal_2", "nal_3"]);
    Ok(())
}

#[rstest]
#[case::default_threshold(0.40, vec!["g1"])]
#[case::high_threshold(0.99, vec!["g1"])]
#[case::full_coverage_is_not_enough(1.0, vec![])]
fn gene_overlap_files(
    workspace: Workspace,
    #[case] min_coverage: f64,
    #[case] expected: Vec<&str>,
) -> anyhow::Result<()> {
    let nal = workspace.path("nal.gff3");
    run_non_alignments(&workspace.sam, &nal, &NonAlignmentConfig::default())?;

    let outputs = GeneOverlapOutputs::in_dir(&workspace.path("filtered"));
    let config = OverlapConfig { min_coverage, ..Default::default() };
    run_gene_overlap(&workspace.genes, &workspace.motifs, &nal, &outputs, &config)?;

    assert_eq!(ids(&outputs.genes), expected);
    if expected.is_empty() {
        assert!(ids(&outputs.non_alignments).is_empty());
        assert!(ids(&outputs.motifs).is_empty());
    } else {
        assert_eq!(ids(&outputs.non_alignments), vec!["nal_2"]);
        assert_eq!(ids(&outputs.motifs), vec!["gplex_0"]);
    }

    let genes_text = fs::read_to_string(&outputs.genes)?;
    assert!(genes_text.starts_with("##gff-version 3\n##sequence-region chr1 1 300\n"));
    Ok(())
}

#[rstest]
fn nearest_table_and_summary(workspace: Workspace) -> anyhow::Result<()> {
    let data = workspace.path("analyses/gplex.txt");
    let summary = workspace.path("analyses/gplex_summary.txt");
    let rows = run_nearest(
        &workspace.motifs,
        &workspace.genes,
        &data,
        Some(&summary),
        &genes_only(),
    )?;

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].relation, Relation::Overlap);
    assert_eq!(rows[0].nearest.as_ref().map(|n| n.distance), Some(40));
    assert_eq!(rows[1].relation, Relation::Downstream);
    assert_eq!(rows[1].nearest.as_ref().map(|n| n.id.as_str()), Some("g1"));
    assert_eq!(rows[1].nearest.as_ref().map(|n| n.distance), Some(-70));

    assert_eq!(read_nearest_table(&data)?, rows);

    let report = fs::read_to_string(&summary)?;
    assert!(report.starts_with("Total number of motifs:\n"));
    assert!(report.contains("70.00 bp"));
    assert!(report.contains("Downstream: 1 / 2 (50.00%)"));
    Ok(())
}

#[rstest]
fn all_annotation_types_compete(workspace: Workspace) -> anyhow::Result<()> {
    let data = workspace.path("gplex.txt");
    let rows = run_nearest(
        &workspace.motifs,
        &workspace.genes,
        &data,
        None,
        &NearestConfig::default(),
    )?;
    // the CDS inside g1 ends closer to gplex_0
    let nearest = rows[0].nearest.as_ref().unwrap();
    assert_eq!((nearest.id.as_str(), nearest.distance), ("cds1", 30));
    assert!(!workspace.path("gplex_summary.txt").exists());
    Ok(())
}

#[rstest]
fn summarize_from_table_matches_direct_summary(workspace: Workspace) -> anyhow::Result<()> {
    let data = workspace.path("gplex.txt");
    let direct = workspace.path("direct.txt");
    run_nearest(&workspace.motifs, &workspace.genes, &data, Some(&direct), &genes_only())?;

    let again = workspace.path("again.txt");
    let summary = run_summarize(&data, &again)?;
    assert_eq!(summary.all.motifs, 2);
    assert_eq!(fs::read_to_string(&direct)?, fs::read_to_string(&again)?);
    Ok(())
}

#[rstest]
fn missing_input_names_the_path(workspace: Workspace) {
    let missing = workspace.path("nope.gff3");
    let data = workspace.path("data.txt");
    let err = run_nearest(&workspace.motifs, &missing, &data, None, &NearestConfig::default())
        .unwrap_err();

    assert!(matches!(&err, GplexError::FileNotFound { path } if *path == missing));
    assert!(err.to_string().contains("nope.gff3"));
    assert!(!data.exists());
}

#[rstest]
fn malformed_gff_is_reported_with_location(workspace: Workspace) {
    let bad = workspace.path("bad.gff3");
    fs::write(&bad, "##gff-version 3\nchr1\tsrc\tgene\t1\t10\t.\t+\n").unwrap();
    let data = workspace.path("d.txt");
    let err = run_nearest(&workspace.motifs, &bad, &data, None, &NearestConfig::default())
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("line 2"), "{msg}");
    assert!(msg.contains("bad.gff3"), "{msg}");
}

#[rstest]
fn whole_pipeline(workspace: Workspace) -> anyhow::Result<()> {
    let inputs = PipelineInputs {
        alignments: workspace.sam.clone(),
        annotations: workspace.genes.clone(),
        motifs: workspace.motifs.clone(),
    };
    let config = PipelineConfig {
        nearest: genes_only(),
        ..Default::default()
    };
    let out_dir = workspace.path("run");
    let outputs = run_pipeline(&inputs, &out_dir, &config)?;

    assert_eq!(ids(&outputs.filtered.genes), vec!["g1"]);
    assert_eq!(read_nearest_table(&outputs.annotation_data)?.len(), 2);

    // against non-alignments every candidate counts, whatever the annotation filter
    let nal_rows = read_nearest_table(&outputs.nal_data)?;
    let nearest = nal_rows[0].nearest.as_ref().unwrap();
    assert_eq!((nearest.id.as_str(), nearest.distance), ("nal_2", -89));
    assert!(outputs.annotation_report.exists());
    assert!(outputs.nal_report.exists());
    Ok(())
}
