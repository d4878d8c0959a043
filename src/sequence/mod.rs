//! Reading sequence [records](Record) from fasta files.

pub mod gc;
pub mod split;

#[cfg(test)]
mod tests;

use color_eyre::eyre::{Report, Result, WrapErr};
use noodles::fasta;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

// ----------------------------------------------------------------------------
// Record
// ----------------------------------------------------------------------------

/// A sequence (contig) of the input assembly.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Record {
    /// Identifier, the token following `>` up to the first whitespace.
    pub id: String,
    /// Raw bases, ambiguity codes included.
    #[serde(skip)]
    pub sequence: Vec<u8>,
    /// Number of bases.
    pub length: usize,
}

impl Record {
    pub fn new() -> Self {
        Record { id: String::new(), sequence: Vec::new(), length: 0 }
    }

    /// Create a sequence [`Record`] from a [`noodles`] [`fasta::Record`].
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use chromid::sequence::Record;
    /// use noodles::fasta;
    ///
    /// let mut reader = fasta::Reader::new(&b">contig_1 circular=true\nACGTN\nACG\n"[..]);
    /// let record = reader.records().next().unwrap()?;
    /// let record = Record::from_noodles(record);
    /// assert_eq!(record.id, "contig_1");
    /// assert_eq!(record.sequence, b"ACGTNACG");
    /// assert_eq!(record.length, 8);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn from_noodles(record: fasta::Record) -> Self {
        let id = record.name().to_string();
        let sequence = record.sequence().as_ref().to_vec();
        let length = sequence.len();
        Record { id, sequence, length }
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns a [`Reader`](fasta::Reader) over the sequence records in a fasta file.
///
/// The reader can be turned into an iterator with `reader.records()`, so that large files
/// can be processed as a stream rather than read into memory at once.
pub fn get_reader<P>(path: &P) -> Result<fasta::Reader<BufReader<File>>, Report>
where
    P: AsRef<Path> + Debug,
{
    crate::utils::check_input(path)?;
    let reader = File::open(path)
        .map(BufReader::new)
        .map(fasta::Reader::new)
        .wrap_err_with(|| format!("Failed to read: {path:?}"))?;
    Ok(reader)
}

/// Parse every record of a fasta stream.
///
/// A malformed record aborts the parse with an error that names the stream `source`.
pub fn parse_records<R>(reader: &mut fasta::Reader<R>, source: &str) -> Result<Vec<Record>, Report>
where
    R: BufRead,
{
    reader
        .records()
        .map(|result| {
            result
                .map(Record::from_noodles)
                .wrap_err_with(|| format!("Failed to parse fasta record in: {source}"))
        })
        .collect()
}

/// Read all sequence records of a fasta file into memory.
pub fn read_records<P>(path: &P) -> Result<Vec<Record>, Report>
where
    P: AsRef<Path> + Debug,
{
    let mut reader = get_reader(path)?;
    parse_records(&mut reader, &format!("{path:?}"))
}
