//! Tetranucleotide profiles of many sequences, computed in parallel.
//!
//! Profiles of individual sequences come from [`chromid_tetra::Profile`]. This module
//! partitions the work, either as batches of in-memory [`Record`]s or as byte ranges of a
//! fasta file that workers parse independently, and reads and writes the profile table.


use crate::sequence::{self, split::FastaIndex, Record};
use crate::utils;
use chromid_tetra::Profile;
use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use indicatif::{style::ProgressStyle, ProgressBar};
use itertools::Itertools;
use log::{debug, info, warn};
use noodles::fasta;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Number of records profiled by one task.
pub const BATCH_SIZE: usize = 5000;

// ----------------------------------------------------------------------------
// Profile Map
// ----------------------------------------------------------------------------

/// Profiles keyed by sequence id, remembering insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileMap {
    ids: Vec<String>,
    profiles: HashMap<String, Profile>,
}

impl ProfileMap {
    pub fn new() -> Self {
        ProfileMap { ids: Vec::new(), profiles: HashMap::new() }
    }

    /// Insert a profile. If the id is already present, the first profile is kept.
    pub fn insert(&mut self, id: &str, profile: Profile) {
        if self.profiles.contains_key(id) {
            warn!("Duplicate sequence id in profiles, keeping the first: {id}");
            return;
        }
        self.ids.push(id.to_string());
        self.profiles.insert(id.to_string(), profile);
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.profiles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over `(id, profile)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Profile)> {
        self.ids.iter().filter_map(|id| self.profiles.get(id).map(|profile| (id.as_str(), profile)))
    }

    /// Write one `id<TAB>literal` row per profile.
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::create_parent_dir(path)?;
        let file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
        let mut writer = BufWriter::new(file);
        for (id, profile) in self.iter() {
            writeln!(writer, "{id}\t{profile}").wrap_err_with(|| format!("Unable to write: {path:?}"))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a profile table written by [`ProfileMap::write`].
    ///
    /// Rows that cannot be parsed are logged and skipped.
    pub fn read<P>(path: &P) -> Result<Self, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let mut profiles = ProfileMap::new();
        let mut skipped = 0;
        for (i, line) in utils::read_lines(path)?.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = line
                .split_once('\t')
                .ok_or_else(|| eyre!("Missing tab separator."))
                .and_then(|(id, literal)| literal.parse::<Profile>().map(|profile| (id, profile)));
            match row {
                Ok((id, profile)) => profiles.insert(id, profile),
                Err(e) => {
                    warn!("Skipping line {} of {path:?}: {e}", i + 1);
                    skipped += 1;
                }
            }
        }
        debug!("Read {} profiles ({skipped} skipped): {path:?}", profiles.len());
        Ok(profiles)
    }
}

impl FromIterator<(String, Profile)> for ProfileMap {
    fn from_iter<I: IntoIterator<Item = (String, Profile)>>(iter: I) -> Self {
        let mut profiles = ProfileMap::new();
        iter.into_iter().for_each(|(id, profile)| profiles.insert(&id, profile));
        profiles
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Profile in-memory records, in batches of `batch_size` processed in parallel.
///
/// Results keep the input order.
///
/// ## Examples
///
/// ```rust
/// use chromid::profile::profile_records;
/// use chromid::sequence::Record;
///
/// let records = vec![
///     Record { id: "a".to_string(), sequence: b"AAAAAA".to_vec(), length: 6 },
///     Record { id: "b".to_string(), sequence: b"ACGTACGT".to_vec(), length: 8 },
/// ];
/// let profiles = profile_records(&records, 1);
/// let ids: Vec<_> = profiles.iter().map(|(id, _)| id).collect();
/// assert_eq!(ids, vec!["a", "b"]);
/// assert_eq!(profiles.get("a").and_then(|p| p.get("AAAA")), Some(1.0));
/// ```
pub fn profile_records(records: &[Record], batch_size: usize) -> ProfileMap {
    records
        .par_chunks(batch_size.max(1))
        .map(|batch| {
            batch.iter().map(|record| (record.id.clone(), Profile::from_sequence(&record.sequence))).collect_vec()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Profile every record of a fasta file, with up to `partitions` workers each parsing
/// its own byte range of the file.
///
/// A failure in any partition is logged and returned once all partitions have finished.
pub fn profile_fasta<P>(path: &P, partitions: usize, progress: bool) -> Result<ProfileMap, Report>
where
    P: AsRef<Path> + Debug,
{
    let index = FastaIndex::build(path)?;
    let ranges = index.partitions(partitions);
    debug!("Profiling {} records in {} partitions: {path:?}", index.len(), ranges.len());

    let progress_bar_style = ProgressStyle::with_template(
        "{bar:40} {pos}/{len} ({percent}%) | Sequences / Second: {per_sec} | Elapsed: {elapsed_precise}",
    )
    .wrap_err("Failed to create progress bar from template.")?;
    let progress_bar = match progress {
        true => ProgressBar::new(index.len() as u64),
        false => ProgressBar::hidden(),
    };
    progress_bar.set_style(progress_bar_style);

    let source_name = format!("{path:?}");
    let results = ranges
        .par_iter()
        .enumerate()
        .map(|(i, range)| -> Result<Vec<(String, Profile)>, Report> {
            let source = format!("{source_name} partition {}", i + 1);
            let mut reader = fasta::Reader::new(index.open_range(range)?);
            let records = sequence::parse_records(&mut reader, &source)?;
            let profiles = records
                .iter()
                .map(|record| {
                    progress_bar.inc(1);
                    (record.id.clone(), Profile::from_sequence(&record.sequence))
                })
                .collect_vec();
            Ok(profiles)
        })
        .collect::<Vec<_>>();
    progress_bar.finish();

    let profiles = utils::collect_partitions(results, "Profiling")?;
    Ok(profiles.into_iter().collect())
}

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------

/// Compute tetranucleotide usage-bias profiles of fasta records.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    /// Input fasta file.
    #[clap(short = 'i', long, required = true)]
    pub input: PathBuf,

    /// Output profile table.
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,

    /// Number of worker threads, 0 uses all available CPUs.
    #[clap(short = 't', long, default_value_t = 1)]
    pub threads: usize,

    /// Number of fasta partitions, defaults to the number of threads.
    #[clap(short = 'p', long)]
    pub partitions: Option<usize>,

    /// Hide the progress bar.
    #[clap(long)]
    pub no_progress: bool,
}

pub fn run(args: &Args) -> Result<(), Report> {
    let pool = utils::thread_pool(args.threads)?;
    let partitions = args.partitions.unwrap_or(pool.current_num_threads());
    let profiles = pool.install(|| profile_fasta(&args.input, partitions, !args.no_progress))?;
    profiles.write(&args.output)?;
    info!("Wrote {} profiles: {:?}", profiles.len(), args.output);
    Ok(())
}
