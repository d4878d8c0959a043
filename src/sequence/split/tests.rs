use crate::sequence::split::{split, FastaIndex};
use crate::sequence::{parse_records, read_records};
use color_eyre::eyre::{Report, Result};
use noodles::fasta;
use std::io::Write;
use tempfile::NamedTempFile;

const FASTA: &str = ">chr1 chromosome\nACGTACGTACGTACGTACGT\nACGTACGTACGT\n>p1\nGGGG\n>p2\nTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTT\n>p3\nA\n>p4\nCCCCCCCC\nCCCC\n";

fn fasta_file(content: &str) -> Result<NamedTempFile, Report> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{content}")?;
    Ok(file)
}

#[test]
fn index_offsets() -> Result<(), Report> {
    let file = fasta_file(">a\nAC\n>b\nG\n")?;
    let index = FastaIndex::build(&file.path())?;
    assert_eq!(index.offsets, vec![0, 6]);
    assert_eq!(index.size, 11);
    assert_eq!(index.len(), 2);
    Ok(())
}

#[test]
fn partitions_cover_the_file() -> Result<(), Report> {
    let file = fasta_file(FASTA)?;
    let index = FastaIndex::build(&file.path())?;

    for parts in 1..10 {
        let ranges = index.partitions(parts);
        assert!(!ranges.is_empty());
        assert!(ranges.len() <= parts);
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(index.size));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(index.offsets.contains(&pair[1].start));
        }
    }
    Ok(())
}

#[test]
fn concatenated_partitions_reproduce_input() -> Result<(), Report> {
    let file = fasta_file(FASTA)?;
    let dir = tempfile::tempdir()?;

    for parts in [1, 2, 3, 5, 8] {
        let prefix = dir.path().join(format!("split{parts}"));
        let outputs = split(&file.path(), parts, &prefix)?;
        let mut concatenated = Vec::new();
        for output in &outputs {
            concatenated.extend(std::fs::read(output)?);
        }
        assert_eq!(concatenated, FASTA.as_bytes());
    }
    Ok(())
}

#[test]
fn partitions_parse_independently() -> Result<(), Report> {
    let file = fasta_file(FASTA)?;
    let index = FastaIndex::build(&file.path())?;
    let expected = read_records(&file.path())?;

    let mut observed = Vec::new();
    for range in index.partitions(3) {
        let mut reader = fasta::Reader::new(index.open_range(&range)?);
        observed.extend(parse_records(&mut reader, "partition")?);
    }
    assert_eq!(observed, expected);
    Ok(())
}

#[test]
fn preamble_and_missing_newline() -> Result<(), Report> {
    let content = "\n>a\nACGT\n>b\nTT";
    let file = fasta_file(content)?;
    let dir = tempfile::tempdir()?;
    let outputs = split(&file.path(), 2, &dir.path().join("g"))?;
    let concatenated: Vec<u8> =
        outputs.iter().map(std::fs::read).collect::<Result<Vec<_>, _>>()?.concat();
    assert_eq!(concatenated, content.as_bytes());
    Ok(())
}

#[test]
fn empty_file_has_no_partitions() -> Result<(), Report> {
    let file = fasta_file("")?;
    let index = FastaIndex::build(&file.path())?;
    assert!(index.is_empty());
    assert!(index.partitions(4).is_empty());
    Ok(())
}
