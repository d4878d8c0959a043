//! Filter annotation tables by score and label every retained hit with its evidence
//! [`Category`].
//!
//! Annotation tables are whitespace-delimited outputs of external tools: HMMER domain tables
//! for the `core`, `par`, and `rep` libraries and a KofamScan detail table for `dnaa`. Each
//! [`TableKind`] has a fixed [`ScoreRule`]. A row is retained when its score is at least the
//! threshold, and also when the score cannot be parsed or the row is too short to hold a
//! score column.


use crate::utils;
use clap::{Args as ClapArgs, Parser};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::EnumIter;

/// Leading character of KofamScan rows whose score exceeds the KO-specific threshold.
pub const MARKER: char = '*';

/// Separator between a category label and the rest of a labeled line, and between the
/// sequence id and the gene index of a predicted gene.
pub const SEPARATOR: char = '_';

// ----------------------------------------------------------------------------
// Category
// ----------------------------------------------------------------------------

/// Evidence category of an annotation hit.
///
/// Categories are compared, ordered, and hashed by their lowercase label, so sorted
/// collections are in lexicographic label order.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Chromosome core genes.
    Core,
    /// Partitioning system genes.
    Par,
    /// Replication initiator genes.
    Rep,
    /// Chromosomal replication initiator `dnaA`, the anchor marker.
    Dnaa,
    /// Any other label, preserved verbatim.
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Core => "core",
            Category::Par => "par",
            Category::Rep => "rep",
            Category::Dnaa => "dnaa",
            Category::Other(label) => label,
        }
    }

    /// True if this category marks a replication-origin-bearing (anchor) sequence.
    pub fn is_anchor_marker(&self) -> bool {
        matches!(self, Category::Dnaa)
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        match label {
            "core" => Category::Core,
            "par" => Category::Par,
            "rep" => Category::Rep,
            "dnaa" => Category::Dnaa,
            other => Category::Other(other.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Category::from(label.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Category {}

impl Hash for Category {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Ord for Category {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ----------------------------------------------------------------------------
// Table Kind
// ----------------------------------------------------------------------------

/// Which score column to read from a table row, and the minimum score to keep it.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScoreRule {
    /// 0-based whitespace-delimited column of the score.
    pub score_index: usize,
    /// Score column for rows starting with the [`MARKER`], if different.
    pub alt_score_index: Option<usize>,
    /// Rows with a score below this value are dropped.
    pub threshold: f64,
}

impl ScoreRule {
    /// Returns true if a (non-comment) table row should be retained.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use chromid::evidence::TableKind;
    /// let rule = TableKind::Dnaa.rule();
    /// // marker rows read the score one column to the right
    /// assert!(rule.keep("* gene_1 K02313 300.0 512.1 1e-150 dnaA"));
    /// assert!(!rule.keep("  gene_2 K02313 300.0 55.4 1e-10 dnaA"));
    /// // unparsable scores are retained
    /// assert!(rule.keep("  gene_3 K02313 300.0 - - dnaA"));
    /// ```
    pub fn keep(&self, line: &str) -> bool {
        let columns = line.split_whitespace().collect_vec();
        let index = match self.alt_score_index {
            Some(alt) if line.starts_with(MARKER) => alt,
            _ => self.score_index,
        };
        match columns.get(index).map(|score| score.parse::<f64>()) {
            Some(Ok(score)) => score >= self.threshold,
            // unparsable score
            Some(Err(_)) => true,
            // too few columns, passed through unfiltered
            None => true,
        }
    }
}

/// Kind of annotation table, determining its [`Category`] and [`ScoreRule`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    strum::Display,
    EnumIter,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// HMMER domain table against the chromosome core gene library.
    Core,
    /// HMMER domain table against the partitioning gene library.
    Par,
    /// HMMER domain table against the replication initiator library.
    Rep,
    /// KofamScan detail table for `dnaA`.
    Dnaa,
}

impl TableKind {
    pub fn category(&self) -> Category {
        match self {
            TableKind::Core => Category::Core,
            TableKind::Par => Category::Par,
            TableKind::Rep => Category::Rep,
            TableKind::Dnaa => Category::Dnaa,
        }
    }

    pub fn rule(&self) -> ScoreRule {
        match self {
            // domtblout column 8 is the full sequence bit score
            TableKind::Core | TableKind::Par | TableKind::Rep => {
                ScoreRule { score_index: 7, alt_score_index: None, threshold: 30.0 }
            }
            // kofamscan detail: gene, KO, threshold, score; marker rows are shifted by one
            TableKind::Dnaa => ScoreRule { score_index: 3, alt_score_index: Some(4), threshold: 100.0 },
        }
    }
}

/// An annotation table file of a known [`TableKind`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AnnotationTable {
    pub kind: TableKind,
    pub path: PathBuf,
}

impl AnnotationTable {
    pub fn new<P: AsRef<Path>>(kind: TableKind, path: P) -> Self {
        AnnotationTable { kind, path: path.as_ref().to_path_buf() }
    }

    /// Read and filter the table. A missing table is an error.
    pub fn filter(&self) -> Result<Vec<LabeledLine>, Report> {
        let lines = utils::read_lines(&self.path)
            .wrap_err_with(|| format!("Failed to read {} annotation table.", self.kind))?;
        let labeled = filter_lines(&lines, self.kind);
        debug!("Retained {}/{} rows of {} table: {:?}", labeled.len(), lines.len(), self.kind, self.path);
        Ok(labeled)
    }
}

// ----------------------------------------------------------------------------
// Labeled Line
// ----------------------------------------------------------------------------

/// A retained annotation table row, labeled with its evidence [`Category`].
///
/// Written as `<category>_<row>`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LabeledLine {
    pub category: Category,
    pub text: String,
}

impl LabeledLine {
    pub fn new(category: Category, text: &str) -> Self {
        LabeledLine { category, text: text.to_string() }
    }

    /// Strip a leading [`MARKER`] field, joining the following field onto the label.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use chromid::evidence::{Category, LabeledLine};
    /// let line = LabeledLine::new(Category::Dnaa, "* contig_7_2 K02313 300.0 512.1");
    /// assert_eq!(line.resolve_marker().to_string(), "dnaa_contig_7_2 K02313 300.0 512.1");
    /// ```
    pub fn resolve_marker(self) -> Self {
        let mut fields = self.text.split_whitespace();
        let resolved = match fields.next() {
            Some(first) if first.starts_with(MARKER) => {
                let head = format!("{}{}", first.trim_start_matches(MARKER), fields.next().unwrap_or(""));
                Some(std::iter::once(head.as_str()).chain(fields).join(" "))
            }
            _ => None,
        };
        match resolved {
            Some(text) => LabeledLine { category: self.category, text },
            None => self,
        }
    }

    /// Extract the structured [`EvidenceTag`] of this line.
    ///
    /// The first field of the row is a gene id, `<sequence_id>_<secondary_key>`. The secondary
    /// key is the token after the last separator. Returns [`None`] if the gene id has no
    /// separator or an empty sequence id or key.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use chromid::evidence::{Category, LabeledLine};
    /// let line: LabeledLine = "core_NODE_1_length_500_12 - 300 PF00001".parse()?;
    /// let tag = line.tag().unwrap();
    /// assert_eq!(tag.category, Category::Core);
    /// assert_eq!(tag.sequence_id, "NODE_1_length_500");
    /// assert_eq!(tag.secondary_key, "12");
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn tag(&self) -> Option<EvidenceTag> {
        let gene = self.text.split_whitespace().next()?;
        let (sequence_id, secondary_key) = gene.rsplit_once(SEPARATOR)?;
        if sequence_id.is_empty() || secondary_key.is_empty() {
            return None;
        }
        Some(EvidenceTag {
            sequence_id: sequence_id.to_string(),
            category: self.category.clone(),
            secondary_key: secondary_key.to_string(),
        })
    }
}

impl Display for LabeledLine {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.category, self.text)
    }
}

impl FromStr for LabeledLine {
    type Err = Report;

    /// Split a labeled line at the first separator into category and row.
    fn from_str(line: &str) -> Result<Self, Report> {
        let (category, text) = line
            .split_once(SEPARATOR)
            .ok_or_else(|| eyre!("Labeled line has no category separator: {line:?}"))?;
        if category.is_empty() {
            return Err(eyre!("Labeled line has an empty category: {line:?}"));
        }
        Ok(LabeledLine { category: Category::from(category), text: text.to_string() })
    }
}

// ----------------------------------------------------------------------------
// Evidence Tag
// ----------------------------------------------------------------------------

/// One piece of evidence: a sequence carries a gene of a [`Category`].
#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct EvidenceTag {
    pub sequence_id: String,
    pub category: Category,
    /// Distinguishes hits on the same sequence, ex. the predicted gene index.
    pub secondary_key: String,
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Filter the rows of one table, labeling retained rows with the table's category.
///
/// Blank lines and `#` comments are skipped. Retained rows are trimmed of surrounding whitespace.
///
/// ## Examples
///
/// ```rust
/// use chromid::evidence::{filter_lines, TableKind};
/// let lines = [
///     "# target  accession  tlen  query  accession  qlen  E-value  score",
///     "contig_1_3  -  310  ParA  PF01656  230  1e-40  145.2",
///     "contig_2_8  -  290  ParA  PF01656  230  0.01  12.0",
/// ];
/// let labeled = filter_lines(&lines, TableKind::Par);
/// assert_eq!(labeled.len(), 1);
/// assert!(labeled[0].to_string().starts_with("par_contig_1_3"));
/// ```
pub fn filter_lines<I, S>(lines: I, kind: TableKind) -> Vec<LabeledLine>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let rule = kind.rule();
    let category = kind.category();
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') || !rule.keep(line) {
                return None;
            }
            Some(LabeledLine::new(category.clone(), line))
        })
        .collect()
}

/// Filter several tables, concatenating their labeled rows in table order.
pub fn filter_tables(tables: &[AnnotationTable]) -> Result<Vec<LabeledLine>, Report> {
    let mut labeled = Vec::new();
    for table in tables {
        labeled.extend(table.filter()?);
    }
    Ok(labeled)
}

/// Write labeled lines, one per line.
pub fn write_labeled<P>(lines: &[LabeledLine], path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    utils::create_parent_dir(path)?;
    let file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{line}").wrap_err_with(|| format!("Unable to write: {path:?}"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read labeled lines. Blank lines, comments, and lines without a label are skipped.
pub fn read_labeled<P>(path: &P) -> Result<Vec<LabeledLine>, Report>
where
    P: AsRef<Path> + Debug,
{
    let labeled = utils::read_lines(path)?
        .iter()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| match line.parse::<LabeledLine>() {
            Ok(labeled) => Some(labeled),
            Err(e) => {
                debug!("Skipping line of {path:?}: {e}");
                None
            }
        })
        .collect();
    Ok(labeled)
}

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------

/// Annotation tables, grouped by [`TableKind`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, ClapArgs)]
pub struct TableArgs {
    /// HMMER domain tables of the core gene library.
    #[clap(long, value_delimiter = ',')]
    pub core: Vec<PathBuf>,

    /// HMMER domain tables of the partitioning gene library.
    #[clap(long, value_delimiter = ',')]
    pub par: Vec<PathBuf>,

    /// HMMER domain tables of the replication initiator library.
    #[clap(long, value_delimiter = ',')]
    pub rep: Vec<PathBuf>,

    /// KofamScan detail tables for dnaA.
    #[clap(long, value_delimiter = ',')]
    pub dnaa: Vec<PathBuf>,
}

impl TableArgs {
    pub fn is_empty(&self) -> bool {
        self.tables().is_empty()
    }

    /// All tables, ordered core, par, rep, dnaa.
    pub fn tables(&self) -> Vec<AnnotationTable> {
        [
            (TableKind::Core, &self.core),
            (TableKind::Par, &self.par),
            (TableKind::Rep, &self.rep),
            (TableKind::Dnaa, &self.dnaa),
        ]
        .into_iter()
        .flat_map(|(kind, paths)| paths.iter().map(move |path| AnnotationTable::new(kind, path)))
        .collect()
    }
}

/// Filter annotation tables by score and label the retained rows.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    #[clap(flatten)]
    pub tables: TableArgs,

    /// Output file of labeled rows.
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,
}

pub fn run(args: &Args) -> Result<(), Report> {
    let tables = args.tables.tables();
    if tables.is_empty() {
        return Err(eyre!("No annotation tables were provided."));
    }
    let labeled = filter_tables(&tables)?;
    write_labeled(&labeled, &args.output)?;
    info!("Wrote {} labeled rows: {:?}", labeled.len(), args.output);
    Ok(())
}
