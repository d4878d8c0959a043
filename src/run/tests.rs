use crate::evidence::TableArgs;
use crate::refine::{self, RefinedCluster};
use crate::run::*;
use chromid_tetra::Profile;
use color_eyre::eyre::{Report, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// An anchor with GC 40 and length 5,000,000, and two candidates with GC 40.2 (length
/// 200,000) and GC 45 (length 50,000).
fn sequences() -> Vec<(&'static str, String)> {
    let chr = "ACGTA".repeat(1_000_000);
    let p1 = format!("{}{}{}", "ACGTA".repeat(39_700), "GC".repeat(500), "AT".repeat(250));
    let p2 = "GCGCGCGCGAAAAATTTTTA".repeat(2_500);
    vec![("chr", chr), ("p1", p1), ("p2", p2)]
}

fn write_file(dir: &Path, name: &str, lines: &[&str]) -> Result<PathBuf, Report> {
    let path = dir.join(name);
    let mut writer = BufWriter::new(File::create(&path)?);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(path)
}

fn setup() -> Result<(TempDir, RunArgs), Report> {
    let dir = tempdir()?;

    let fasta = dir.path().join("assembly.fasta");
    let mut writer = BufWriter::new(File::create(&fasta)?);
    for (id, sequence) in sequences() {
        writeln!(writer, ">{id} assembled\n{sequence}")?;
    }
    writer.flush()?;

    let domtbl = |gene: &str| format!("{gene}  -  310  HMM  PF00001.1  230  1e-40  145.2  0.1  1  1");
    let tables = TableArgs {
        core: vec![write_file(dir.path(), "core.out", &[&domtbl("chr_1"), &domtbl("p1_1"), &domtbl("p2_1")])?],
        par: vec![write_file(dir.path(), "par.out", &[&domtbl("p1_2"), &domtbl("p2_2")])?],
        rep: vec![write_file(dir.path(), "rep.out", &[&domtbl("p1_3"), &domtbl("p2_3")])?],
        dnaa: vec![write_file(
            dir.path(),
            "dnaA.tsv",
            &["#    gene name  KO  thrshld  score  E-value  KO definition", "*    chr_2  K02313  325.93  512.1  1e-150  dnaA"],
        )?],
    };

    let args = RunArgs {
        input: fasta,
        output: dir.path().join("result.txt"),
        tables,
        intermediate_dir: Some(dir.path().join("intermediate")),
        threads: 2,
        ..Default::default()
    };
    Ok((dir, args))
}

/// Distance from the anchor's profile to the first candidate's.
fn candidate_distance() -> f64 {
    let sequences = sequences();
    let chr = Profile::from_sequence(sequences[0].1.as_bytes());
    let p1 = Profile::from_sequence(sequences[1].1.as_bytes());
    chr.distance(&p1)
}

#[test]
fn chromid_within_threshold() -> Result<(), Report> {
    let (_dir, mut args) = setup()?;
    let distance = candidate_distance();
    assert!(distance > 0.0);
    args.distance_threshold = distance;

    let refined = run(&args)?;
    let expected = vec![RefinedCluster { chromosome: "chr".to_string(), chromids: vec!["p1".to_string()] }];
    assert_eq!(refined, expected);
    assert_eq!(refine::read_report(&args.output)?, expected);

    let intermediate = args.intermediate_dir.clone().unwrap_or_default();
    for file in [RUN_ARGS_FILE, EVIDENCE_FILE, CLASSIFICATION_FILE, GC_FILE, PROFILES_FILE, CLUSTERS_FILE] {
        assert!(intermediate.join(file).is_file(), "missing intermediate: {file}");
    }
    let clusters = crate::cluster::read(&intermediate.join(CLUSTERS_FILE))?;
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].members, vec!["p1"]);
    Ok(())
}

#[test]
fn chromid_beyond_threshold() -> Result<(), Report> {
    let (_dir, mut args) = setup()?;
    args.distance_threshold = candidate_distance() / 2.0;

    assert!(run(&args)?.is_empty());
    assert!(std::fs::read_to_string(&args.output)?.is_empty());
    Ok(())
}

#[test]
fn missing_input_is_an_error() -> Result<(), Report> {
    let (dir, mut args) = setup()?;
    args.input = dir.path().join("missing.fasta");
    assert!(run(&args).is_err());
    Ok(())
}

#[test]
fn run_args_round_trip() -> Result<(), Report> {
    let (dir, args) = setup()?;
    let path = dir.path().join(RUN_ARGS_FILE);
    args.write(&path)?;
    let read = RunArgs::read(&path)?;
    // threads are not serialized
    assert_eq!(read, RunArgs { threads: 0, ..args });
    Ok(())
}
