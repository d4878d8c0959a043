//! Shared helpers for file checks, thread pools, and work partitioning.

#[cfg(test)]
mod tests;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use log::error;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

/// Fail fast if a required input file does not exist.
///
/// ## Examples
///
/// ```rust
/// use chromid::utils::check_input;
/// assert!(check_input(&"does/not/exist.fasta").is_err());
/// ```
pub fn check_input<P>(path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    if !path.as_ref().is_file() {
        Err(eyre!("Required input file does not exist: {path:?}")
            .suggestion("Please check the path, or that the previous stage completed."))?;
    }
    Ok(())
}

/// Create the parent directory of a file path, if it does not exist yet.
pub fn create_parent_dir<P>(path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directory: {parent:?}"))?;
        }
    }
    Ok(())
}

/// Read all lines of a text file, failing if the file is missing.
pub fn read_lines<P>(path: &P) -> Result<Vec<String>, Report>
where
    P: AsRef<Path> + Debug,
{
    check_input(path)?;
    let file = File::open(path).wrap_err_with(|| format!("Failed to open: {path:?}"))?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .wrap_err_with(|| format!("Failed to read lines: {path:?}"))?;
    Ok(lines)
}

/// Build a [`ThreadPool`] with a fixed number of worker threads.
///
/// A value of `0` lets rayon choose from the available CPUs.
pub fn thread_pool(threads: usize) -> Result<ThreadPool, Report> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .wrap_err_with(|| format!("Failed to build a thread pool with {threads} threads."))
}

/// Split `0..len` into at most `parts` contiguous ranges whose sizes differ by at most one.
///
/// Empty ranges are never returned.
///
/// ## Examples
///
/// ```rust
/// use chromid::utils::balanced_ranges;
/// assert_eq!(balanced_ranges(10, 3), vec![0..4, 4..7, 7..10]);
/// assert_eq!(balanced_ranges(2, 4), vec![0..1, 1..2]);
/// assert!(balanced_ranges(0, 4).is_empty());
/// ```
pub fn balanced_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let (size, remainder) = (len / parts, len % parts);

    let mut start = 0;
    (0..parts)
        .map(|i| {
            let end = start + size + usize::from(i < remainder);
            let range = start..end;
            start = end;
            range
        })
        .filter(|range| !range.is_empty())
        .collect()
}

/// Collect the results of independent partitions of a stage.
///
/// Every failed partition is logged, the first failure is returned to the caller. The
/// successful outputs are concatenated in partition order.
pub fn collect_partitions<T>(
    results: Vec<Result<Vec<T>, Report>>,
    stage: &str,
) -> Result<Vec<T>, Report> {
    let num_partitions = results.len();
    let mut output = Vec::new();
    let mut first_error = None;

    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(items) => output.extend(items),
            Err(e) => {
                error!("{stage} partition {}/{num_partitions} failed: {e}", i + 1);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e.wrap_err(format!("{stage} failed in at least one partition."))),
        None => Ok(output),
    }
}
