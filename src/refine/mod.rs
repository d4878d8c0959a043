//! Keep only the cluster members whose tetranucleotide profile is close to their anchor's.
//!
//! The distance from an anchor to a member only sums over words observed in the anchor, see
//! [`Profile::distance`](chromid_tetra::Profile::distance). A member is kept when the distance
//! is at most the threshold, and a cluster is reported when at least one member is kept.

#[cfg(test)]
mod tests;

use crate::classify::{self, Classification};
use crate::cluster::{self, Cluster};
use crate::profile::ProfileMap;
use crate::utils;
use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use indoc::formatdoc;
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CHROMOSOME_HEADER: &str = "Possible bacterial chromosome:";
pub const CHROMIDS_HEADER: &str = "Possible bacterial chromids:";
pub const BLOCK_END: &str = "------";

// ----------------------------------------------------------------------------
// Refined Cluster
// ----------------------------------------------------------------------------

/// A chromosome and the chromids that passed the distance test.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RefinedCluster {
    pub chromosome: String,
    pub chromids: Vec<String>,
}

impl Display for RefinedCluster {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let block = formatdoc! {"
            {CHROMOSOME_HEADER}
            {chromosome}
            {CHROMIDS_HEADER}
            {chromids}
            {BLOCK_END}",
            chromosome = self.chromosome,
            chromids = self.chromids.join(", "),
        };
        write!(f, "{block}")
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Refine a single cluster.
///
/// `marked` holds the ids of sequences carrying the anchor marker, these are never chromids.
/// Returns [`None`] if the anchor has no profile, or if no member passes.
///
/// ## Examples
///
/// ```rust
/// use chromid::cluster::Cluster;
/// use chromid::profile::ProfileMap;
/// use chromid::refine::refine_cluster;
/// use chromid::Profile;
/// use std::collections::HashSet;
///
/// let profiles: ProfileMap = [
///     ("chr", "{'AAAA': 1.0, 'CCCC': 2.0}"),
///     ("near", "{'AAAA': 1.0, 'CCCC': 1.5, 'GGGG': 9.0}"),
///     ("far", "{'TTTT': 1.0}"),
/// ]
/// .iter()
/// .map(|(id, literal)| literal.parse::<Profile>().map(|profile| (id.to_string(), profile)))
/// .collect::<Result<_, color_eyre::eyre::Report>>()?;
///
/// let cluster = Cluster { anchor: "chr".to_string(), members: vec!["near".to_string(), "far".to_string()] };
/// let refined = refine_cluster(&cluster, &HashSet::new(), &profiles, 0.5).unwrap();
/// assert_eq!(refined.chromids, vec!["near"]);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn refine_cluster(
    cluster: &Cluster,
    marked: &HashSet<&str>,
    profiles: &ProfileMap,
    threshold: f64,
) -> Option<RefinedCluster> {
    let anchor = profiles.get(&cluster.anchor)?;

    let chromids = cluster
        .members
        .iter()
        .filter(|member| !marked.contains(member.as_str()))
        .filter_map(|member| profiles.get(member).map(|profile| (member, profile)))
        .filter(|(_, profile)| anchor.distance(profile) <= threshold)
        .map(|(member, _)| member.clone())
        .collect_vec();

    match chromids.is_empty() {
        true => None,
        false => Some(RefinedCluster { chromosome: cluster.anchor.clone(), chromids }),
    }
}

/// Refine clusters in parallel chunks of `chunk_size` clusters, keeping input order.
pub fn refine(
    clusters: &[Cluster],
    classifications: &[Classification],
    profiles: &ProfileMap,
    threshold: f64,
    chunk_size: usize,
) -> Vec<RefinedCluster> {
    let marked: HashSet<&str> = classifications
        .iter()
        .filter(|c| c.has_anchor_marker())
        .map(|c| c.sequence_id.as_str())
        .collect();

    clusters
        .par_chunks(chunk_size.max(1))
        .map(|chunk| {
            chunk.iter().filter_map(|cluster| refine_cluster(cluster, &marked, profiles, threshold)).collect_vec()
        })
        .collect::<Vec<_>>()
        .concat()
}

/// Chunk size that spreads clusters evenly across `threads` workers.
pub fn chunk_size(num_clusters: usize, threads: usize) -> usize {
    (num_clusters / threads.max(1)).max(1)
}

/// Log how many clusters survived refinement.
pub fn log_summary(clusters: &[Cluster], refined: &[RefinedCluster]) {
    let candidates: usize = clusters.iter().map(|c| c.members.len()).sum();
    let chromids: usize = refined.iter().map(|c| c.chromids.len()).sum();
    info!(
        "Refined {} clusters ({candidates} candidates) into {} chromosomes with {chromids} chromids.",
        clusters.len(),
        refined.len()
    );
}

/// Write the final report as text blocks.
pub fn write_report<P>(refined: &[RefinedCluster], path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    utils::create_parent_dir(path)?;
    let file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
    let mut writer = BufWriter::new(file);
    for cluster in refined {
        writeln!(writer, "{cluster}").wrap_err_with(|| format!("Unable to write: {path:?}"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a report written by [`write_report`].
pub fn read_report<P>(path: &P) -> Result<Vec<RefinedCluster>, Report>
where
    P: AsRef<Path> + Debug,
{
    let lines = utils::read_lines(path)?;
    let mut lines = lines.iter().map(|line| line.trim()).filter(|line| !line.is_empty());

    let mut refined = Vec::new();
    while let Some(line) = lines.next() {
        if line != CHROMOSOME_HEADER {
            return Err(eyre!("Expected {CHROMOSOME_HEADER:?} in {path:?}, found: {line:?}"));
        }
        let chromosome = lines.next().ok_or_else(|| eyre!("Missing chromosome in {path:?}"))?;
        if lines.next() != Some(CHROMIDS_HEADER) {
            return Err(eyre!("Expected {CHROMIDS_HEADER:?} after {chromosome} in {path:?}"));
        }
        let chromids = lines.next().ok_or_else(|| eyre!("Missing chromids of {chromosome} in {path:?}"))?;
        if lines.next() != Some(BLOCK_END) {
            return Err(eyre!("Expected {BLOCK_END:?} after the chromids of {chromosome} in {path:?}"));
        }
        refined.push(RefinedCluster {
            chromosome: chromosome.to_string(),
            chromids: chromids.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
        });
    }
    debug!("Read {} refined clusters: {path:?}", refined.len());
    Ok(refined)
}

/// Write the final report as JSON.
pub fn write_json<P>(refined: &[RefinedCluster], path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    utils::create_parent_dir(path)?;
    let output = serde_json::to_string_pretty(refined)
        .wrap_err("Failed to serialize refined clusters to JSON.")?;
    std::fs::write(path, output).wrap_err_with(|| format!("Unable to write: {path:?}"))?;
    Ok(())
}

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------

/// Refine clusters by tetranucleotide distance to their anchor.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    /// Cluster file, as written by `cluster`.
    #[clap(short = 'c', long, required = true)]
    pub clusters: PathBuf,

    /// Classification table, as written by `classify`.
    #[clap(long, required = true)]
    pub classification: PathBuf,

    /// Profile table, as written by `profile`.
    #[clap(short = 'p', long, required = true)]
    pub profiles: PathBuf,

    /// Output report.
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,

    /// Maximum distance from an anchor's profile to a chromid's.
    #[clap(short = 'd', long, required = true)]
    pub distance_threshold: f64,

    /// Number of worker threads, 0 uses all available CPUs.
    #[clap(short = 't', long, default_value_t = 1)]
    pub threads: usize,

    /// Also write the report as JSON.
    #[clap(long)]
    pub json: Option<PathBuf>,
}

pub fn run(args: &Args) -> Result<(), Report> {
    let clusters = cluster::read(&args.clusters)?;
    let classifications = classify::read(&args.classification)?;
    let profiles = ProfileMap::read(&args.profiles)?;

    let pool = utils::thread_pool(args.threads)?;
    let chunk_size = chunk_size(clusters.len(), pool.current_num_threads());
    let refined =
        pool.install(|| refine(&clusters, &classifications, &profiles, args.distance_threshold, chunk_size));

    write_report(&refined, &args.output)?;
    if let Some(json) = &args.json {
        write_json(&refined, json)?;
    }
    log_summary(&clusters, &refined);
    Ok(())
}
