use crate::sequence::{read_records, Record};
use color_eyre::eyre::{Report, Result};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn read_multiline_records() -> Result<(), Report> {
    let mut file = NamedTempFile::new()?;
    write!(file, ">chr1 some description\nACGT\nACGT\n>plasmid_2\nNNAC\n")?;

    let records = read_records(&file.path())?;
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["chr1", "plasmid_2"]);
    assert_eq!(records[0].sequence, b"ACGTACGT".to_vec());
    assert_eq!(records[0].length, 8);
    assert_eq!(records[1].length, 4);
    assert_eq!(records[1], Record { id: "plasmid_2".to_string(), sequence: b"NNAC".to_vec(), length: 4 });
    Ok(())
}

#[test]
fn missing_fasta_is_an_error() -> Result<(), Report> {
    assert!(read_records(&"missing/assembly.fasta").is_err());
    Ok(())
}
