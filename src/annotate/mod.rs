//! Run the external annotation tools that produce evidence tables.
//!
//! Genes are predicted with `prodigal`, searched against six HMM libraries with `hmmsearch`,
//! and scanned for `dnaA` with KofamScan's `exec_annotation`. Each tool must be on the `PATH`.
//! A non-zero exit status from any tool is fatal.

use crate::evidence::{self, AnnotationTable, TableKind};
use crate::sequence::split;
use crate::utils;
use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Inputs larger than this are split and annotated in parallel partitions.
pub const LARGE_INPUT_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// CPUs given to each tool when partitions are annotated in parallel.
pub const PARTITION_CPUS: usize = 2;

/// An `hmmsearch` run against one HMM library.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Search {
    /// Library name, the file `<library>.hmm` in the database directory.
    pub library: &'static str,
    pub kind: TableKind,
    /// Reporting thresholds and database size options.
    pub options: &'static [&'static str],
}

pub const SEARCHES: [Search; 6] = [
    Search { library: "core1", kind: TableKind::Core, options: &["--cut_ga"] },
    Search { library: "core2", kind: TableKind::Core, options: &["-Z", "1", "--cut_ga"] },
    Search { library: "par1", kind: TableKind::Par, options: &["-Z", "1", "--cut_ga"] },
    Search { library: "par2", kind: TableKind::Par, options: &["-Z", "1", "--domE", "1e-5"] },
    Search { library: "rep1", kind: TableKind::Rep, options: &["-Z", "1", "--cut_ga"] },
    Search { library: "rep2", kind: TableKind::Rep, options: &["-Z", "1", "--domE", "1e-5"] },
];

// ----------------------------------------------------------------------------
// Databases
// ----------------------------------------------------------------------------

/// Directory of HMM libraries and the KofamScan `dnaA` profile.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Databases {
    pub dir: PathBuf,
}

impl Databases {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Databases { dir: dir.as_ref().to_path_buf() }
    }

    pub fn hmm(&self, library: &str) -> PathBuf {
        self.dir.join(format!("{library}.hmm"))
    }

    pub fn dnaa_profile(&self) -> PathBuf {
        self.dir.join("dnaa.hal")
    }

    pub fn ko_list(&self) -> PathBuf {
        self.dir.join("ko_list")
    }

    /// Check that every database file exists.
    pub fn check(&self) -> Result<(), Report> {
        SEARCHES
            .iter()
            .map(|search| self.hmm(search.library))
            .chain([self.dnaa_profile(), self.ko_list()])
            .try_for_each(|path| utils::check_input(&path))
            .wrap_err_with(|| format!("Incomplete annotation database: {:?}", self.dir))
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Run an external command to completion, capturing its output.
///
/// Fails if the program cannot be launched or exits with a non-zero status, reporting the
/// program name, exit code, and standard error.
///
/// ## Examples
///
/// ```rust,no_run
/// use chromid::annotate::execute;
/// use std::process::Command;
///
/// let output = execute(Command::new("prodigal").arg("-v"))?;
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn execute(command: &mut Command) -> Result<Output, Report> {
    let program = command.get_program().to_string_lossy().to_string();
    debug!("Running: {command:?}");

    let output = command
        .output()
        .wrap_err_with(|| format!("Failed to launch {program}."))
        .suggestion(format!("Please check that {program} is installed and on the PATH."))?;

    if !output.status.success() {
        let code = output.status.code().map_or("none".to_string(), |c| c.to_string());
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(eyre!("{program} failed with exit code {code}: {}", stderr.trim()));
    }
    Ok(output)
}

/// Annotate one fasta file with `cpus` per tool, writing tool outputs to `workdir`.
///
/// Returns the produced tables, ordered as [`SEARCHES`] followed by the `dnaA` table.
pub fn annotate_fasta<P>(
    input: &P,
    databases: &Databases,
    workdir: &Path,
    cpus: usize,
) -> Result<Vec<AnnotationTable>, Report>
where
    P: AsRef<Path> + Debug,
{
    utils::check_input(input)?;
    std::fs::create_dir_all(workdir).wrap_err_with(|| format!("Failed to create directory: {workdir:?}"))?;
    let stem = input.as_ref().file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let file = |suffix: &str| workdir.join(format!("{stem}{suffix}"));
    let cpus = cpus.max(1).to_string();

    info!("Predicting genes: {input:?}");
    let proteins = file(".faa");
    execute(
        Command::new("prodigal")
            .arg("-i")
            .arg(input.as_ref())
            .arg("-a")
            .arg(&proteins)
            .arg("-o")
            .arg(file(".genes"))
            .args(["-p", "meta", "-q"]),
    )?;

    let mut tables = Vec::new();
    for search in SEARCHES {
        info!("Searching {} library: {input:?}", search.library);
        let table = file(&format!("-{}.out", search.library));
        execute(
            Command::new("hmmsearch")
                .arg("--noali")
                .args(search.options)
                .args(["--cpu", cpus.as_str()])
                .arg("-o")
                .arg(file(&format!("-{}.log", search.library)))
                .arg("--domtblout")
                .arg(&table)
                .arg(databases.hmm(search.library))
                .arg(&proteins),
        )?;
        tables.push(AnnotationTable::new(search.kind, table));
    }

    info!("Scanning for dnaA: {input:?}");
    let table = file("-dnaA.tsv");
    execute(
        Command::new("exec_annotation")
            .arg("-o")
            .arg(&table)
            .arg("-p")
            .arg(databases.dnaa_profile())
            .arg("-k")
            .arg(databases.ko_list())
            .args(["--cpu", cpus.as_str(), "-f", "detail"])
            .arg("--tmp-dir")
            .arg(file("-kofam-tmp"))
            .arg(&proteins),
    )?;
    tables.push(AnnotationTable::new(TableKind::Dnaa, table));

    Ok(tables)
}

/// Annotate a fasta file, splitting inputs over [`LARGE_INPUT_BYTES`] into `threads`
/// partitions annotated in parallel on the current rayon pool.
pub fn annotate<P>(
    input: &P,
    databases: &Databases,
    workdir: &Path,
    threads: usize,
) -> Result<Vec<AnnotationTable>, Report>
where
    P: AsRef<Path> + Debug,
{
    utils::check_input(input)?;
    databases.check()?;

    let size = std::fs::metadata(input).wrap_err_with(|| format!("Failed to read metadata: {input:?}"))?.len();
    if size <= LARGE_INPUT_BYTES || threads <= 1 {
        return annotate_fasta(input, databases, workdir, threads);
    }

    info!("Input is larger than {LARGE_INPUT_BYTES} bytes, annotating {threads} partitions in parallel.");
    let parts = split::split(input, threads, &workdir.join("g"))?;
    let results = parts
        .par_iter()
        .map(|part| annotate_fasta(part, databases, workdir, PARTITION_CPUS))
        .collect::<Vec<_>>();
    utils::collect_partitions(results, "Annotation")
}

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------

/// Annotate a fasta file and write the filtered, labeled evidence.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    /// Input fasta file.
    #[clap(short = 'i', long, required = true)]
    pub input: PathBuf,

    /// Output file of labeled evidence rows.
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,

    /// Directory of HMM libraries, dnaa.hal, and ko_list.
    #[clap(long, default_value = "databases")]
    pub database_dir: PathBuf,

    /// Directory for tool outputs, a temporary directory if not provided.
    #[clap(short = 'w', long)]
    pub workdir: Option<PathBuf>,

    /// Number of worker threads, 0 uses all available CPUs.
    #[clap(short = 't', long, default_value_t = 1)]
    pub threads: usize,
}

pub fn run(args: &Args) -> Result<(), Report> {
    let databases = Databases::new(&args.database_dir);
    let tmp = tempfile::tempdir()?;
    let workdir = args.workdir.clone().unwrap_or(tmp.path().to_path_buf());

    let pool = utils::thread_pool(args.threads)?;
    let threads = pool.current_num_threads();
    let tables = pool.install(|| annotate(&args.input, &databases, &workdir, threads))?;

    let labeled = evidence::filter_tables(&tables)?;
    evidence::write_labeled(&labeled, &args.output)?;
    info!("Wrote {} labeled rows: {:?}", labeled.len(), args.output);
    Ok(())
}
