//! [Command-line interface](Cli) (CLI) of the main binary.

use crate::{annotate, classify, cluster, evidence, profile, refine, run::RunArgs, sequence};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// CLI Entry Point
// ----------------------------------------------------------------------------

/// The command-line interface (CLI).
///
/// ```rust
/// use chromid::cli::{Cli, Command};
/// use clap::Parser;
///
/// let input = ["chromid-finder", "run", "--input", "assembly.fasta", "--output", "result.txt", "-d", "0.5"];
/// let args = Cli::parse_from(input);
/// match args.command {
///     Command::Run(args) => assert_eq!(args.distance_threshold, 0.5),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Deserialize, Parser, Serialize)]
#[clap(name = "chromid-finder", author, version)]
#[clap(about = "chromid-finder identifies chromosomes and chromids in bacterial assemblies.")]
pub struct Cli {
    #[clap(subcommand)]
    #[clap(help = "Set the command.")]
    pub command: Command,

    /// Set the output [Verbosity] level.
    #[clap(short = 'v', long)]
    #[clap(value_enum, default_value_t = Verbosity::default())]
    #[clap(hide_possible_values = false)]
    #[clap(global = true)]
    #[clap(help = "Set the output verbosity level.")]
    pub verbosity: Verbosity,
}

/// CLI [commands](#variants), one per pipeline stage plus the full pipeline.
#[derive(Debug, Deserialize, Serialize, Subcommand)]
pub enum Command {
    #[clap(about = "Run the full pipeline on a fasta file.")]
    Run(RunArgs),
    #[clap(about = "Annotate a fasta file with the external tools and write labeled evidence.")]
    Annotate(annotate::Args),
    #[clap(about = "Filter annotation tables and write labeled evidence.")]
    Filter(evidence::Args),
    #[clap(about = "Classify sequences from labeled evidence.")]
    Classify(classify::Args),
    #[clap(about = "Compute GC content and length of fasta records.")]
    Gc(sequence::gc::Args),
    #[clap(about = "Compute tetranucleotide profiles of fasta records.")]
    Profile(profile::Args),
    #[clap(about = "Cluster classified sequences around anchors.")]
    Cluster(cluster::Args),
    #[clap(about = "Refine clusters by tetranucleotide distance.")]
    Refine(refine::Args),
    #[clap(about = "Split a fasta file into balanced partitions.")]
    Split(sequence::split::Args),
}

// -----------------------------------------------------------------------------
// Verbosity
// -----------------------------------------------------------------------------

/// The output verbosity level.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize, ValueEnum)]
pub enum Verbosity {
    #[default]
    Info,
    Warn,
    Debug,
    Error,
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // lowercase for RUST_LOG
        let lowercase = format!("{:?}", self).to_lowercase();
        write!(f, "{lowercase}")
    }
}
