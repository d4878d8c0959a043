//! Group classified sequences around anchors by GC content and length.
//!
//! For every anchor, a candidate joins the anchor's [`Cluster`] when its GC content is within
//! the GC threshold of the anchor's and it is strictly shorter than the anchor. Candidates are
//! sorted by GC once, so each anchor's GC window is found with two binary searches instead of
//! a scan over every classified sequence.

#[cfg(test)]
mod tests;

use crate::classify::{self, Classification};
use crate::sequence::gc::GcTable;
use crate::utils;
use clap::Parser;
use color_eyre::eyre::{Report, Result, WrapErr};
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default maximum GC difference, in percentage points.
pub const DEFAULT_GC_THRESHOLD: f64 = 1.0;

/// Up to this many anchors are clustered on the calling thread.
pub const SEQUENTIAL_ANCHOR_LIMIT: usize = 64;

pub const ANCHOR_PREFIX: &str = "Central sequence in the cluster:";
pub const MEMBERS_PREFIX: &str = "Other sequences in the cluster:";
pub const BLOCK_END: &str = "------";

// ----------------------------------------------------------------------------
// Cluster
// ----------------------------------------------------------------------------

/// An anchor sequence and the candidate chromids that share its composition.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Cluster {
    pub anchor: String,
    pub members: Vec<String>,
}

impl Cluster {
    pub fn new(anchor: &str) -> Self {
        Cluster { anchor: anchor.to_string(), members: Vec::new() }
    }
}

impl Display for Cluster {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        writeln!(f, "{ANCHOR_PREFIX} {}", self.anchor)?;
        writeln!(f, "{MEMBERS_PREFIX} {}", self.members.join(", "))?;
        write!(f, "{BLOCK_END}")
    }
}

/// A classified sequence with known GC content, `rank` is its position in the classification.
#[derive(Clone, Debug, PartialEq)]
struct Candidate<'a> {
    id: &'a str,
    gc: f64,
    length: usize,
    rank: usize,
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Build one [`Cluster`] per anchor.
///
/// Only classified sequences are considered. Members are listed in classification order.
/// Anchors missing from the GC table get an empty cluster.
///
/// ## Examples
///
/// ```rust
/// use chromid::classify::Classification;
/// use chromid::cluster::cluster;
/// use chromid::sequence::gc::{GcRecord, GcTable};
///
/// let classifications = ["chr\tcore,dnaa", "p1\tcore,par,rep", "p2\tcore,par,rep"]
///     .iter()
///     .map(|line| line.parse::<Classification>())
///     .collect::<Result<Vec<_>, _>>()?;
/// let gc_table = GcTable::from_records([
///     GcRecord { id: "chr".to_string(), length: 5_000_000, gc: 40.0 },
///     GcRecord { id: "p1".to_string(), length: 200_000, gc: 40.2 },
///     GcRecord { id: "p2".to_string(), length: 50_000, gc: 45.0 },
/// ]);
/// let clusters = cluster(&classifications, &gc_table, 1.0);
/// assert_eq!(clusters.len(), 1);
/// assert_eq!(clusters[0].anchor, "chr");
/// assert_eq!(clusters[0].members, vec!["p1"]);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn cluster(classifications: &[Classification], gc_table: &GcTable, gc_threshold: f64) -> Vec<Cluster> {
    let classified = classifications.iter().filter(|c| c.is_classified()).collect_vec();

    let mut missing = 0;
    let mut candidates = classified
        .iter()
        .enumerate()
        .filter_map(|(rank, c)| match gc_table.get(&c.sequence_id) {
            Some(record) if record.gc.is_finite() => {
                Some(Candidate { id: &c.sequence_id, gc: record.gc, length: record.length, rank })
            }
            _ => {
                missing += 1;
                None
            }
        })
        .collect_vec();
    candidates.sort_by(|a, b| a.gc.total_cmp(&b.gc));
    if missing > 0 {
        debug!("{missing} classified sequences have no GC content and cannot be cluster members.");
    }

    let anchors = classified.iter().filter(|c| c.is_anchor()).map(|c| c.sequence_id.as_str()).collect_vec();
    debug!("Clustering {} candidates around {} anchors.", candidates.len(), anchors.len());

    let f = |anchor: &&str| cluster_anchor(anchor, &candidates, gc_table, gc_threshold);
    if anchors.len() <= SEQUENTIAL_ANCHOR_LIMIT {
        anchors.iter().map(f).collect()
    } else {
        utils::balanced_ranges(anchors.len(), rayon::current_num_threads())
            .into_par_iter()
            .map(|range| anchors[range].iter().map(f).collect_vec())
            .collect::<Vec<_>>()
            .concat()
    }
}

/// Cluster a single anchor against candidates sorted by GC.
fn cluster_anchor(anchor: &str, candidates: &[Candidate], gc_table: &GcTable, gc_threshold: f64) -> Cluster {
    let Some(record) = gc_table.get(anchor) else {
        warn!("Anchor {anchor} has no GC content, its cluster is empty.");
        return Cluster::new(anchor);
    };

    // |c.gc - a.gc| <= t, split into two monotone predicates over ascending gc
    let start = candidates.partition_point(|c| record.gc - c.gc > gc_threshold);
    let end = candidates.partition_point(|c| c.gc - record.gc <= gc_threshold);
    let window = candidates.get(start..end).unwrap_or_default();

    let members = window
        .iter()
        .filter(|c| c.length < record.length && c.id != anchor)
        .sorted_by_key(|c| c.rank)
        .map(|c| c.id.to_string())
        .collect();

    Cluster { anchor: anchor.to_string(), members }
}

/// Parse clusters from their text blocks.
///
/// Blocks whose anchor is empty, or lists more than one sequence, are logged and dropped.
///
/// ## Examples
///
/// ```rust
/// use chromid::cluster::parse_clusters;
///
/// let text = "Central sequence in the cluster: chr\n\
///             Other sequences in the cluster: p1, p2\n\
///             ------\n\
///             Central sequence in the cluster: chr2\n\
///             Other sequences in the cluster: \n\
///             ------\n";
/// let clusters = parse_clusters(text.lines());
/// assert_eq!(clusters[0].members, vec!["p1", "p2"]);
/// assert!(clusters[1].members.is_empty());
/// ```
pub fn parse_clusters<I, S>(lines: I) -> Vec<Cluster>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut clusters = Vec::new();
    let mut current: Option<Cluster> = None;

    let mut finish = |cluster: Option<Cluster>| {
        if let Some(cluster) = cluster {
            if cluster.anchor.is_empty() || cluster.anchor.contains(',') {
                warn!("Dropping cluster without exactly one anchor: {:?}", cluster.anchor);
            } else {
                clusters.push(cluster);
            }
        }
    };

    for line in lines {
        let line = line.as_ref().trim();
        if let Some(anchor) = line.strip_prefix(ANCHOR_PREFIX) {
            finish(current.take());
            current = Some(Cluster::new(anchor.trim()));
        } else if let Some(members) = line.strip_prefix(MEMBERS_PREFIX) {
            if let Some(cluster) = current.as_mut() {
                cluster.members =
                    members.split(',').map(str::trim).filter(|m| !m.is_empty()).map(String::from).collect();
            }
        } else if line == BLOCK_END {
            finish(current.take());
        }
    }
    finish(current);

    clusters
}

/// Write clusters as text blocks.
pub fn write<P>(clusters: &[Cluster], path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    utils::create_parent_dir(path)?;
    let file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
    let mut writer = BufWriter::new(file);
    for cluster in clusters {
        writeln!(writer, "{cluster}").wrap_err_with(|| format!("Unable to write: {path:?}"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read clusters written by [`write`].
pub fn read<P>(path: &P) -> Result<Vec<Cluster>, Report>
where
    P: AsRef<Path> + Debug,
{
    let clusters = parse_clusters(utils::read_lines(path)?);
    debug!("Read {} clusters: {path:?}", clusters.len());
    Ok(clusters)
}

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------

/// Cluster classified sequences around anchors by GC content and length.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    /// Classification table, as written by `classify`.
    #[clap(short = 'c', long, required = true)]
    pub classification: PathBuf,

    /// GC table (id, length, GC), as written by `gc`.
    #[clap(short = 'g', long, required = true)]
    pub gc: PathBuf,

    /// Output cluster file.
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,

    /// Maximum GC difference between an anchor and its members.
    #[clap(long, default_value_t = DEFAULT_GC_THRESHOLD)]
    pub gc_threshold: f64,

    /// Number of worker threads, 0 uses all available CPUs.
    #[clap(short = 't', long, default_value_t = 1)]
    pub threads: usize,
}

pub fn run(args: &Args) -> Result<(), Report> {
    let classifications = classify::read(&args.classification)?;
    let gc_table = GcTable::read(&args.gc)?;

    let pool = utils::thread_pool(args.threads)?;
    let clusters = pool.install(|| cluster(&classifications, &gc_table, args.gc_threshold));
    write(&clusters, &args.output)?;

    let members: usize = clusters.iter().map(|c| c.members.len()).sum();
    info!("Wrote {} clusters with {members} candidate members: {:?}", clusters.len(), args.output);
    Ok(())
}
