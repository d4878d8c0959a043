//! Aggregate evidence per sequence and decide which sequences are eligible for clustering.
//!
//! A sequence is *classified* if its categories include `{dnaa, core}`, or if they exclude
//! `dnaa` and include `{rep, core, par}`. A classified sequence carrying `dnaa` is an
//! *anchor*, a candidate chromosome.


use crate::evidence::{self, Category, EvidenceTag, LabeledLine};
use crate::utils;
use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ----------------------------------------------------------------------------
// Classification
// ----------------------------------------------------------------------------

/// The set of evidence categories held by one sequence.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Classification {
    pub sequence_id: String,
    pub categories: BTreeSet<Category>,
}

impl Classification {
    pub fn new(sequence_id: &str) -> Self {
        Classification { sequence_id: sequence_id.to_string(), categories: BTreeSet::new() }
    }

    pub fn contains(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    /// True if the sequence is eligible for clustering.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use chromid::classify::Classification;
    /// use chromid::evidence::Category::*;
    ///
    /// let mut classification = Classification::new("contig_1");
    /// classification.categories.extend([Dnaa]);
    /// assert!(!classification.is_classified());
    /// classification.categories.extend([Core]);
    /// assert!(classification.is_classified());
    /// assert!(classification.is_anchor());
    /// ```
    pub fn is_classified(&self) -> bool {
        let has = |category: Category| self.contains(&category);
        if has(Category::Dnaa) {
            has(Category::Core)
        } else {
            has(Category::Rep) && has(Category::Core) && has(Category::Par)
        }
    }

    /// True if the sequence carries the anchor marker, regardless of [`is_classified`](Self::is_classified).
    pub fn has_anchor_marker(&self) -> bool {
        self.categories.iter().any(|c| c.is_anchor_marker())
    }

    /// True if the sequence is classified and carries the anchor marker.
    pub fn is_anchor(&self) -> bool {
        self.is_classified() && self.has_anchor_marker()
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}\t{}", self.sequence_id, self.categories.iter().join(","))
    }
}

impl FromStr for Classification {
    type Err = Report;

    /// Parse a line of `sequence_id<TAB>category,category`.
    fn from_str(line: &str) -> Result<Self, Report> {
        let (sequence_id, categories) = line
            .split_once('\t')
            .ok_or_else(|| eyre!("Classification has no tab-separated categories: {line:?}"))?;
        if sequence_id.is_empty() {
            return Err(eyre!("Classification has an empty sequence id: {line:?}"));
        }
        let categories = categories
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Category::from)
            .collect();
        Ok(Classification { sequence_id: sequence_id.to_string(), categories })
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Accumulate categories per sequence, in first-seen sequence order.
pub fn aggregate<I>(tags: I) -> Vec<Classification>
where
    I: IntoIterator<Item = EvidenceTag>,
{
    let mut sequences: Vec<Classification> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for tag in tags {
        let i = *index.entry(tag.sequence_id.clone()).or_insert_with(|| {
            sequences.push(Classification::new(&tag.sequence_id));
            sequences.len() - 1
        });
        sequences[i].categories.insert(tag.category);
    }
    sequences
}

/// Classify sequences from labeled annotation rows, keeping only classified sequences.
///
/// ## Examples
///
/// ```rust
/// use chromid::classify::classify;
/// use chromid::evidence::LabeledLine;
///
/// let lines = [
///     "core_chr_1 - 300 80.0",
///     "dnaa_* chr_2 K02313 325.9 512.1",
///     "dnaa_lonely_1 K02313 325.9 300.0",
/// ]
/// .iter()
/// .map(|line| line.parse::<LabeledLine>())
/// .collect::<Result<Vec<_>, _>>()?;
///
/// let classifications = classify(lines);
/// assert_eq!(classifications.len(), 1);
/// assert_eq!(classifications[0].to_string(), "chr\tcore,dnaa");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn classify<I>(lines: I) -> Vec<Classification>
where
    I: IntoIterator<Item = LabeledLine>,
{
    let mut untagged = 0;
    let tags = lines.into_iter().filter_map(|line| {
        let tag = line.resolve_marker().tag();
        if tag.is_none() {
            untagged += 1;
        }
        tag
    });
    let all = aggregate(tags);
    if untagged > 0 {
        debug!("Skipped {untagged} labeled rows without a gene id.");
    }

    let total = all.len();
    let classified = all.into_iter().filter(|c| c.is_classified()).collect_vec();
    debug!("Classified {}/{} sequences with evidence.", classified.len(), total);
    classified
}

/// Write classifications, one per line.
pub fn write<P>(classifications: &[Classification], path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    utils::create_parent_dir(path)?;
    let file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
    let mut writer = BufWriter::new(file);
    for classification in classifications {
        writeln!(writer, "{classification}").wrap_err_with(|| format!("Unable to write: {path:?}"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read classifications. Blank lines and `#` comments are skipped, any other malformed
/// line is an error.
pub fn read<P>(path: &P) -> Result<Vec<Classification>, Report>
where
    P: AsRef<Path> + Debug,
{
    utils::read_lines(path)?
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|(i, line)| {
            line.parse::<Classification>()
                .wrap_err_with(|| format!("Failed to parse line {} of {path:?}", i + 1))
        })
        .collect()
}

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------

/// Classify sequences from labeled evidence rows.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    /// Labeled evidence rows, as written by `filter`.
    #[clap(short = 'i', long, required = true)]
    pub input: PathBuf,

    /// Output classification table.
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,
}

pub fn run(args: &Args) -> Result<(), Report> {
    utils::check_input(&args.input)?;
    let lines = evidence::read_labeled(&args.input)?;
    let classifications = classify(lines);
    write(&classifications, &args.output)?;

    let anchors = classifications.iter().filter(|c| c.is_anchor()).count();
    info!("Wrote {} classified sequences ({anchors} anchors): {:?}", classifications.len(), args.output);
    Ok(())
}
