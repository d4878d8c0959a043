use crate::utils::{balanced_ranges, check_input, collect_partitions, create_parent_dir};
use color_eyre::eyre::{eyre, Report, Result};

#[test]
fn balanced_ranges_cover_everything() -> Result<(), Report> {
    for len in 0..50 {
        for parts in 1..8 {
            let ranges = balanced_ranges(len, parts);
            let covered: Vec<usize> = ranges.iter().cloned().flatten().collect();
            assert_eq!(covered, (0..len).collect::<Vec<_>>());
            assert!(ranges.len() <= parts);

            let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
            if let (Some(min), Some(max)) = (sizes.iter().min(), sizes.iter().max()) {
                assert!(max - min <= 1);
            }
        }
    }
    Ok(())
}

#[test]
fn balanced_ranges_zero_parts() -> Result<(), Report> {
    assert_eq!(balanced_ranges(3, 0), vec![0..3]);
    Ok(())
}

#[test]
fn collect_partitions_concatenates() -> Result<(), Report> {
    let results: Vec<Result<Vec<usize>, Report>> = vec![Ok(vec![1, 2]), Ok(vec![]), Ok(vec![3])];
    assert_eq!(collect_partitions(results, "test")?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn collect_partitions_surfaces_failure() -> Result<(), Report> {
    let results: Vec<Result<Vec<usize>, Report>> =
        vec![Ok(vec![1]), Err(eyre!("malformed record")), Err(eyre!("unreadable file"))];
    let error = collect_partitions(results, "test").unwrap_err();
    assert!(format!("{error:?}").contains("malformed record"));
    Ok(())
}

#[test]
fn missing_input_is_fatal() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("missing.tsv");
    assert!(check_input(&path).is_err());

    std::fs::write(&path, "")?;
    check_input(&path)?;
    Ok(())
}

#[test]
fn parent_dir_is_created() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("a").join("b").join("report.txt");
    create_parent_dir(&path)?;
    assert!(path.parent().unwrap().is_dir());
    Ok(())
}
