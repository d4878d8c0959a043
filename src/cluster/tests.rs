use crate::classify::Classification;
use crate::cluster::*;
use crate::evidence::Category;
use crate::sequence::gc::{GcRecord, GcTable};
use color_eyre::eyre::{Report, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn classification(id: &str, categories: &[Category]) -> Classification {
    let mut classification = Classification::new(id);
    classification.categories.extend(categories.iter().cloned());
    classification
}

fn gc(id: &str, length: usize, gc: f64) -> GcRecord {
    GcRecord { id: id.to_string(), length, gc }
}

/// Quadratic scan over every classified sequence.
fn naive_cluster(classifications: &[Classification], gc_table: &GcTable, gc_threshold: f64) -> Vec<Cluster> {
    let classified: Vec<&Classification> = classifications.iter().filter(|c| c.is_classified()).collect();
    classified
        .iter()
        .filter(|a| a.is_anchor())
        .map(|a| {
            let mut cluster = Cluster::new(&a.sequence_id);
            let Some(anchor) = gc_table.get(&a.sequence_id) else { return cluster };
            for c in &classified {
                let Some(candidate) = gc_table.get(&c.sequence_id) else { continue };
                if candidate.id != anchor.id
                    && (candidate.gc - anchor.gc).abs() <= gc_threshold
                    && candidate.length < anchor.length
                {
                    cluster.members.push(candidate.id.clone());
                }
            }
            cluster
        })
        .collect()
}

#[test]
fn gc_window_and_length() -> Result<(), Report> {
    use Category::*;
    let classifications = vec![
        classification("anchor", &[Dnaa, Core]),
        classification("inside", &[Rep, Core, Par]),
        classification("gc_high", &[Rep, Core, Par]),
        classification("too_long", &[Rep, Core, Par]),
        classification("equal_length", &[Rep, Core, Par]),
        classification("unclassified", &[Core, Par]),
        classification("boundary", &[Rep, Core, Par]),
    ];
    let gc_table = GcTable::from_records([
        gc("anchor", 1000, 50.0),
        gc("inside", 900, 49.5),
        gc("gc_high", 900, 51.5),
        gc("too_long", 1200, 50.0),
        gc("equal_length", 1000, 50.0),
        gc("unclassified", 100, 50.0),
        gc("boundary", 10, 51.0),
    ]);
    let clusters = cluster(&classifications, &gc_table, DEFAULT_GC_THRESHOLD);
    assert_eq!(clusters, vec![Cluster { anchor: "anchor".to_string(), members: vec!["inside".to_string(), "boundary".to_string()] }]);
    Ok(())
}

#[test]
fn anchors_never_include_themselves() -> Result<(), Report> {
    use Category::*;
    let classifications = vec![classification("a", &[Dnaa, Core]), classification("b", &[Dnaa, Core])];
    let gc_table = GcTable::from_records([gc("a", 2000, 40.0), gc("b", 1000, 40.5)]);
    let clusters = cluster(&classifications, &gc_table, 1.0);
    assert_eq!(clusters.len(), 2);
    // anchors may be members of larger anchors, refinement drops them later
    assert_eq!(clusters[0].members, vec!["b"]);
    assert!(clusters[1].members.is_empty());
    Ok(())
}

#[test]
fn dnaa_only_is_not_an_anchor() -> Result<(), Report> {
    use Category::*;
    let classifications = vec![classification("lonely", &[Dnaa]), classification("p", &[Rep, Core, Par])];
    let gc_table = GcTable::from_records([gc("lonely", 5000, 40.0), gc("p", 100, 40.0)]);
    assert!(cluster(&classifications, &gc_table, 1.0).is_empty());
    Ok(())
}

#[test]
fn anchor_without_gc_has_empty_cluster() -> Result<(), Report> {
    use Category::*;
    let classifications = vec![classification("chr", &[Dnaa, Core]), classification("p", &[Rep, Core, Par])];
    let gc_table = GcTable::from_records([gc("p", 100, 40.0)]);
    assert_eq!(cluster(&classifications, &gc_table, 1.0), vec![Cluster::new("chr")]);
    Ok(())
}

#[test]
fn indexed_matches_naive() -> Result<(), Report> {
    use Category::*;
    let mut rng = StdRng::seed_from_u64(42);
    for (n, threshold) in [(10, 1.0), (150, 0.5), (400, 2.0), (400, 0.0)] {
        let mut classifications = Vec::new();
        let mut records = Vec::new();
        for i in 0..n {
            let id = format!("seq_{i}");
            let categories = match (i, rng.gen_range(0..4)) {
                (0, _) | (_, 0) => vec![Dnaa, Core],
                (_, 1) => vec![Dnaa],
                _ => vec![Rep, Core, Par],
            };
            classifications.push(classification(&id, &categories));
            // coarse gc values produce exact ties on the window boundary
            let gc_value = rng.gen_range(0..=20) as f64 / 2.0 + 35.0;
            let length = rng.gen_range(0..1_000_000_usize);
            if rng.gen::<f64>() > 0.05 {
                records.push(gc(&id, length, gc_value));
            }
        }
        let gc_table = GcTable::from_records(records);
        let anchors = classifications.iter().filter(|c| c.is_anchor()).count();
        assert!(anchors > 0);

        let expected = naive_cluster(&classifications, &gc_table, threshold);
        assert_eq!(cluster(&classifications, &gc_table, threshold), expected);

        // more anchors than the sequential limit run in parallel batches
        if anchors > SEQUENTIAL_ANCHOR_LIMIT {
            let pool = crate::utils::thread_pool(4)?;
            assert_eq!(pool.install(|| cluster(&classifications, &gc_table, threshold)), expected);
        }
    }
    Ok(())
}

#[test]
fn write_then_read() -> Result<(), Report> {
    let dir = tempdir()?;
    let path = dir.path().join("clusters.txt");
    let clusters = vec![
        Cluster { anchor: "chr".to_string(), members: vec!["p1".to_string(), "p2".to_string()] },
        Cluster::new("chr2"),
    ];
    write(&clusters, &path)?;
    let text = std::fs::read_to_string(&path)?;
    assert!(text.starts_with("Central sequence in the cluster: chr\nOther sequences in the cluster: p1, p2\n------\n"));
    assert_eq!(read(&path)?, clusters);
    Ok(())
}

#[test]
fn read_drops_invalid_anchors() -> Result<(), Report> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        "Central sequence in the cluster: \n\
         Other sequences in the cluster: p1\n\
         ------\n\
         Central sequence in the cluster: a, b\n\
         Other sequences in the cluster: p2\n\
         ------\n\
         Central sequence in the cluster: chr\n\
         Other sequences in the cluster: p3\n"
    )?;
    let clusters = read(&file.path())?;
    assert_eq!(clusters, vec![Cluster { anchor: "chr".to_string(), members: vec!["p3".to_string()] }]);
    Ok(())
}
