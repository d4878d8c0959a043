use chromid::cli::{Cli, Command};
use chromid::{annotate, classify, cluster, evidence, profile, refine, run, sequence};
use clap::Parser;
use color_eyre::eyre::{Report, Result};

fn main() -> Result<(), Report> {
    // Parse CLI parameters
    let args = Cli::parse();

    // initialize color_eyre crate for colorized logs
    color_eyre::install()?;

    // Set logging/verbosity level via RUST_LOG
    std::env::set_var("RUST_LOG", args.verbosity.to_string());

    // initialize env_logger crate for logging/verbosity level
    env_logger::init();

    match args.command {
        Command::Run(args) => _ = run::run(&args)?,
        Command::Annotate(args) => annotate::run(&args)?,
        Command::Filter(args) => evidence::run(&args)?,
        Command::Classify(args) => classify::run(&args)?,
        Command::Gc(args) => sequence::gc::run(&args)?,
        Command::Profile(args) => profile::run(&args)?,
        Command::Cluster(args) => cluster::run(&args)?,
        Command::Refine(args) => refine::run(&args)?,
        Command::Split(args) => sequence::split::run(&args)?,
    }

    Ok(())
}
