//! GC content and length of sequences, keyed by sequence id.


use crate::sequence::{self, Record};
use crate::utils;
use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

// ----------------------------------------------------------------------------
// GcRecord
// ----------------------------------------------------------------------------

/// Length and GC content (percent, `0..=100`) of one sequence.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct GcRecord {
    pub id: String,
    pub length: usize,
    pub gc: f64,
}

impl GcRecord {
    /// Compute length and GC percent of raw sequence bases.
    ///
    /// `G` and `C` are counted case-insensitively. All other symbols, including ambiguity
    /// codes, only contribute to the length. An empty sequence has a GC of 0.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use chromid::sequence::gc::GcRecord;
    /// let record = GcRecord::from_sequence("contig_1", b"GGCCAATN");
    /// assert_eq!(record.length, 8);
    /// assert_eq!(record.gc, 50.0);
    /// ```
    pub fn from_sequence(id: &str, sequence: &[u8]) -> Self {
        let length = sequence.len();
        let gc_bases = sequence.iter().filter(|b| matches!(b, b'G' | b'C' | b'g' | b'c')).count();
        let gc = match length {
            0 => 0.0,
            _ => gc_bases as f64 / length as f64 * 100.0,
        };
        GcRecord { id: id.to_string(), length, gc }
    }

    pub fn from_record(record: &Record) -> Self {
        GcRecord::from_sequence(&record.id, &record.sequence)
    }
}

/// Tab-separated `id`, `length`, `gc`.
impl Display for GcRecord {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.id, self.length, self.gc)
    }
}

// ----------------------------------------------------------------------------
// GcTable
// ----------------------------------------------------------------------------

/// GC records in input order, with lookup by sequence id.
#[derive(Clone, Debug, Default)]
pub struct GcTable {
    records: Vec<GcRecord>,
    index: HashMap<String, usize>,
}

impl GcTable {
    pub fn new() -> Self {
        GcTable { records: Vec::new(), index: HashMap::new() }
    }

    /// Build a table from records, the first record of a duplicated id wins.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = GcRecord>,
    {
        let mut table = GcTable::new();
        records.into_iter().for_each(|record| table.push(record));
        table
    }

    /// Add a record, ignoring (with a warning) ids that are already present.
    pub fn push(&mut self, record: GcRecord) {
        if self.index.contains_key(&record.id) {
            warn!("Duplicate sequence id in GC table, keeping the first: {}", record.id);
            return;
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
    }

    pub fn get(&self, id: &str) -> Option<&GcRecord> {
        self.index.get(id).map(|i| &self.records[*i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GcRecord> {
        self.records.iter()
    }

    /// Compute the table from every record of a fasta file.
    pub fn from_fasta<P>(path: &P) -> Result<Self, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let mut reader = sequence::get_reader(path)?;
        let mut table = GcTable::new();
        for result in reader.records() {
            let record = result.wrap_err_with(|| format!("Failed to parse fasta record in: {path:?}"))?;
            table.push(GcRecord::from_sequence(record.name(), record.sequence().as_ref()));
        }
        Ok(table)
    }

    /// Read a headerless, tab-separated table of `id`, `length`, `gc`.
    ///
    /// Rows with fewer than three columns or a non-numeric length or GC are dropped, which
    /// also drops a header line if there is one.
    pub fn read<P>(path: &P) -> Result<Self, Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::check_input(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .wrap_err_with(|| format!("Failed to read: {path:?}"))?;

        let mut table = GcTable::new();
        for (i, row) in reader.records().enumerate() {
            let row = row.wrap_err_with(|| format!("Failed to read row {} of {path:?}", i + 1))?;
            match parse_row(&row) {
                Ok(record) => table.push(record),
                Err(e) => debug!("Dropping row {} of {path:?}: {e}", i + 1),
            }
        }
        Ok(table)
    }

    /// Write the table as headerless tsv.
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::create_parent_dir(path)?;
        let file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
        let mut writer = BufWriter::new(file);
        for record in &self.records {
            writeln!(writer, "{record}").wrap_err_with(|| format!("Unable to write: {path:?}"))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn parse_row(row: &csv::StringRecord) -> Result<GcRecord, Report> {
    if row.len() < 3 {
        return Err(eyre!("Expected 3 columns, found {}", row.len()));
    }
    let id = row[0].trim().to_string();
    let length = parse_length(row[1].trim());
    let gc = row[2].trim().parse::<f64>().ok().filter(|gc| gc.is_finite());

    match (length, gc) {
        (Some(length), Some(gc)) => Ok(GcRecord { id, length, gc }),
        _ => Err(eyre!("Non-numeric length or GC: {:?}", row.iter().collect::<Vec<_>>())),
    }
}

/// Parse a sequence length, accepting whole-valued floats such as `5000.0`.
///
/// Fractional and negative lengths are rejected rather than truncated.
fn parse_length(field: &str) -> Option<usize> {
    match field.parse::<usize>() {
        Ok(length) => Some(length),
        Err(_) => field
            .parse::<f64>()
            .ok()
            .filter(|l| l.is_finite() && *l >= 0.0 && l.fract() == 0.0 && *l <= usize::MAX as f64)
            .map(|l| l as usize),
    }
}

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------

/// Compute the GC content and length of every sequence in a fasta file.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    /// Input fasta file.
    #[clap(short = 'i', long, required = true)]
    pub input: PathBuf,

    /// Output tsv of sequence id, length, and GC percent.
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,
}

pub fn run(args: &Args) -> Result<(), Report> {
    info!("Computing GC content: {:?}", args.input);
    let table = GcTable::from_fasta(&args.input)?;
    table.write(&args.output)?;
    info!("Wrote {} GC records: {:?}", table.len(), args.output);
    Ok(())
}
