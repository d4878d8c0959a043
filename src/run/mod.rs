//! Run the whole pipeline, from a fasta file to the chromosome and chromid report.

#[cfg(test)]
mod tests;

use crate::annotate::{self, Databases};
use crate::cluster::{self, DEFAULT_GC_THRESHOLD};
use crate::evidence::{self, TableArgs};
use crate::profile;
use crate::refine::{self, RefinedCluster};
use crate::sequence::gc::GcTable;
use crate::{classify, utils};
use clap::Parser;
use color_eyre::eyre::{Report, Result, WrapErr};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// File names of the intermediate outputs of each stage.
pub const RUN_ARGS_FILE: &str = "run_args.json";
pub const EVIDENCE_FILE: &str = "evidence.txt";
pub const CLASSIFICATION_FILE: &str = "classification.tsv";
pub const GC_FILE: &str = "gc.tsv";
pub const PROFILES_FILE: &str = "profiles.tsv";
pub const CLUSTERS_FILE: &str = "clusters.txt";

// ----------------------------------------------------------------------------
// RunArgs
// ----------------------------------------------------------------------------

/// Find chromosomes and chromids in an assembly.
#[derive(Clone, Debug, Deserialize, Parser, PartialEq, Serialize)]
pub struct RunArgs {
    /// Input fasta file of assembled sequences.
    #[clap(short = 'i', long, required = true)]
    pub input: PathBuf,

    /// Output report.
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,

    /// Maximum tetranucleotide distance from a chromosome to a chromid.
    #[clap(short = 'd', long, required = true)]
    pub distance_threshold: f64,

    /// Maximum GC difference (percentage points) from a chromosome to a chromid.
    #[clap(short = 'g', long, default_value_t = RunArgs::default().gc_threshold)]
    pub gc_threshold: f64,

    /// Number of CPU threads to use, 0 uses all available CPUs.
    #[clap(short = 't', long, default_value_t = RunArgs::default().threads)]
    #[serde(skip)]
    pub threads: usize,

    /// Precomputed annotation tables, which skip running the annotation tools.
    #[clap(flatten)]
    pub tables: TableArgs,

    /// Directory of HMM libraries, dnaa.hal, and ko_list.
    #[clap(long, default_value = "databases")]
    pub database_dir: PathBuf,

    /// Keep the intermediate outputs of every stage in this directory.
    #[clap(long)]
    pub intermediate_dir: Option<PathBuf>,

    /// Also write the report as JSON.
    #[clap(long)]
    pub json: Option<PathBuf>,
}

impl Default for RunArgs {
    fn default() -> Self {
        RunArgs {
            input: PathBuf::new(),
            output: PathBuf::new(),
            distance_threshold: 0.0,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            threads: 1,
            tables: TableArgs::default(),
            database_dir: PathBuf::from("databases"),
            intermediate_dir: None,
            json: None,
        }
    }
}

impl RunArgs {
    /// Reads [`RunArgs`] from a JSON file.
    pub fn read<P>(path: &P) -> Result<RunArgs, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let input = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read run arguments: {path:?}."))?;
        let run_args = serde_json::from_str(&input)
            .wrap_err_with(|| format!("Failed to deserialize run arguments: {input}"))?;
        Ok(run_args)
    }

    /// Write [`RunArgs`] to a JSON file.
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::create_parent_dir(path)?;
        let output = serde_json::to_string_pretty(self)
            .wrap_err(format!("Failed to serialize run arguments: {self:?}"))?;
        std::fs::write(path, output).wrap_err(format!("Failed to write run arguments: {path:?}"))?;
        Ok(())
    }

    /// Path of an intermediate file, if intermediates are kept.
    fn intermediate(&self, file_name: &str) -> Option<PathBuf> {
        self.intermediate_dir.as_ref().map(|dir| dir.join(file_name))
    }
}

// ----------------------------------------------------------------------------
// Run
// ----------------------------------------------------------------------------

/// Run every stage on the input fasta and write the report.
///
/// Returns the refined clusters that were reported.
pub fn run(args: &RunArgs) -> Result<Vec<RefinedCluster>, Report> {
    utils::check_input(&args.input)?;
    if let Some(path) = args.intermediate(RUN_ARGS_FILE) {
        args.write(&path)?;
    }

    let pool = utils::thread_pool(args.threads)?;
    let threads = pool.current_num_threads();
    info!("Running with {threads} threads: {:?}", args.input);

    let refined = pool.install(|| -> Result<Vec<RefinedCluster>, Report> {
        // evidence, annotation outputs must outlive the filter
        let tmp = tempfile::tempdir()?;
        let tables = match args.tables.is_empty() {
            true => {
                let workdir = args
                    .intermediate_dir
                    .as_ref()
                    .map(|dir| dir.join("annotation"))
                    .unwrap_or(tmp.path().to_path_buf());
                annotate::annotate(&args.input, &Databases::new(&args.database_dir), &workdir, threads)?
            }
            false => args.tables.tables(),
        };
        let labeled = evidence::filter_tables(&tables)?;
        info!("Retained {} annotation hits from {} tables.", labeled.len(), tables.len());
        if let Some(path) = args.intermediate(EVIDENCE_FILE) {
            evidence::write_labeled(&labeled, &path)?;
        }

        // classification
        let classifications = classify::classify(labeled);
        let anchors = classifications.iter().filter(|c| c.is_anchor()).count();
        info!("Classified {} sequences, {anchors} are anchors.", classifications.len());
        if let Some(path) = args.intermediate(CLASSIFICATION_FILE) {
            classify::write(&classifications, &path)?;
        }

        // composition
        let gc_table = GcTable::from_fasta(&args.input)?;
        if let Some(path) = args.intermediate(GC_FILE) {
            gc_table.write(&path)?;
        }
        info!("Profiling tetranucleotide usage of {} sequences.", gc_table.len());
        let profiles = profile::profile_fasta(&args.input, threads, true)?;
        if let Some(path) = args.intermediate(PROFILES_FILE) {
            profiles.write(&path)?;
        }

        // clusters
        let clusters = cluster::cluster(&classifications, &gc_table, args.gc_threshold);
        if let Some(path) = args.intermediate(CLUSTERS_FILE) {
            cluster::write(&clusters, &path)?;
        }

        let chunk_size = refine::chunk_size(clusters.len(), threads);
        let refined = refine::refine(&clusters, &classifications, &profiles, args.distance_threshold, chunk_size);
        refine::log_summary(&clusters, &refined);
        Ok(refined)
    })?;

    refine::write_report(&refined, &args.output)?;
    info!("Wrote report: {:?}", args.output);
    if let Some(json) = &args.json {
        refine::write_json(&refined, json)?;
    }

    Ok(refined)
}
