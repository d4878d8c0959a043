//! Partition a fasta file into balanced byte ranges that start on record boundaries.
//!
//! The [`FastaIndex`] is built with one sequential scan. Its partitions cover the whole file
//! without overlap, so workers can seek to a partition and parse it independently, and the
//! partitions written back to disk concatenate back to the input file.

#[cfg(test)]
mod tests;

use crate::utils;
use clap::Parser;
use color_eyre::eyre::{Report, Result, WrapErr};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Byte offsets of every record header in a fasta file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct FastaIndex {
    pub path: PathBuf,
    /// Offset of each line starting with `>`.
    pub offsets: Vec<u64>,
    /// Total file size in bytes.
    pub size: u64,
}

impl FastaIndex {
    /// Scan a fasta file once and record the byte offset of each header.
    pub fn build<P>(path: &P) -> Result<Self, Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::check_input(path)?;
        let file = File::open(path).wrap_err_with(|| format!("Failed to open: {path:?}"))?;
        let mut reader = BufReader::new(file);

        let mut offsets = Vec::new();
        let mut offset = 0_u64;
        let mut line = Vec::new();
        loop {
            line.clear();
            let bytes = reader
                .read_until(b'\n', &mut line)
                .wrap_err_with(|| format!("Failed to read: {path:?}"))?;
            if bytes == 0 {
                break;
            }
            if line.first() == Some(&b'>') {
                offsets.push(offset);
            }
            offset += bytes as u64;
        }

        debug!("Indexed {} records ({offset} bytes): {path:?}", offsets.len());
        Ok(FastaIndex { path: path.as_ref().to_path_buf(), offsets, size: offset })
    }

    /// Number of records in the file.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Split the file into at most `parts` contiguous byte ranges balanced by size.
    ///
    /// Each interior boundary is the first record start at or after its ideal position
    /// (`k * size / parts`). Bytes before the first header stay with the first range.
    /// Ranges are never empty and together cover `0..size`.
    pub fn partitions(&self, parts: usize) -> Vec<Range<u64>> {
        if self.size == 0 {
            return Vec::new();
        }
        let parts = parts.max(1) as u64;

        let mut bounds = vec![0_u64];
        for k in 1..parts {
            let ideal = k * self.size / parts;
            let i = self.offsets.partition_point(|offset| *offset < ideal);
            if let Some(offset) = self.offsets.get(i) {
                if *offset > *bounds.last().unwrap_or(&0) {
                    bounds.push(*offset);
                }
            }
        }
        bounds.push(self.size);

        bounds.windows(2).map(|w| w[0]..w[1]).filter(|range| !range.is_empty()).collect()
    }

    /// Open a reader over one byte range of the file.
    pub fn open_range(&self, range: &Range<u64>) -> Result<BufReader<std::io::Take<File>>, Report> {
        let mut file =
            File::open(&self.path).wrap_err_with(|| format!("Failed to open: {:?}", self.path))?;
        file.seek(SeekFrom::Start(range.start))
            .wrap_err_with(|| format!("Failed to seek to byte {} of {:?}", range.start, self.path))?;
        Ok(BufReader::new(file.take(range.end - range.start)))
    }
}

/// Split a fasta file into `parts` files named `<prefix>_part<i>.fasta` (1-based).
///
/// Returns the paths that were written.
pub fn split<P>(path: &P, parts: usize, prefix: &Path) -> Result<Vec<PathBuf>, Report>
where
    P: AsRef<Path> + Debug,
{
    let index = FastaIndex::build(path)?;
    let file_name = prefix.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();

    index
        .partitions(parts)
        .iter()
        .enumerate()
        .map(|(i, range)| -> Result<PathBuf, Report> {
            let output = prefix.with_file_name(format!("{file_name}_part{}.fasta", i + 1));
            utils::create_parent_dir(&output)?;
            let mut reader = index.open_range(range)?;
            let mut writer = File::create(&output)
                .map(BufWriter::new)
                .wrap_err_with(|| format!("Unable to create file: {output:?}"))?;
            std::io::copy(&mut reader, &mut writer)
                .wrap_err_with(|| format!("Unable to write partition: {output:?}"))?;
            writer.flush()?;
            Ok(output)
        })
        .collect()
}

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------

/// Split a fasta file into balanced partitions on record boundaries.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    /// Input fasta file.
    #[clap(short = 'i', long, required = true)]
    pub input: PathBuf,

    /// Number of partitions.
    #[clap(short = 'n', long, default_value_t = 4)]
    pub parts: usize,

    /// Output path prefix, partitions are written as <PREFIX>_part<N>.fasta
    #[clap(short = 'p', long, default_value = "g")]
    pub prefix: PathBuf,
}

pub fn run(args: &Args) -> Result<(), Report> {
    let outputs = split(&args.input, args.parts, &args.prefix)?;
    info!("Split {:?} into {} partitions.", args.input, outputs.len());
    Ok(())
}
