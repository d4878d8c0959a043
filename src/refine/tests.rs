use crate::classify::Classification;
use crate::cluster::Cluster;
use crate::evidence::Category;
use crate::profile::ProfileMap;
use crate::refine::*;
use chromid_tetra::Profile;
use color_eyre::eyre::{Report, Result};
use std::collections::HashSet;
use tempfile::tempdir;

fn profiles(rows: &[(&str, &str)]) -> Result<ProfileMap, Report> {
    rows.iter().map(|(id, literal)| literal.parse::<Profile>().map(|profile| (id.to_string(), profile))).collect()
}

fn cluster(anchor: &str, members: &[&str]) -> Cluster {
    Cluster { anchor: anchor.to_string(), members: members.iter().map(|m| m.to_string()).collect() }
}

#[test]
fn distance_is_anchor_sided() -> Result<(), Report> {
    // words only in the member never contribute
    let profiles = profiles(&[("chr", "{'AAAA': 1.0}"), ("p", "{'AAAA': 1.0, 'CCCC': 50.0}")])?;
    let refined = refine_cluster(&cluster("chr", &["p"]), &HashSet::new(), &profiles, 0.0);
    assert_eq!(refined, Some(RefinedCluster { chromosome: "chr".to_string(), chromids: vec!["p".to_string()] }));

    // words only in the anchor count against a zero
    let refined = refine_cluster(&cluster("p", &["chr"]), &HashSet::new(), &profiles, 2499.0);
    assert_eq!(refined, None);
    Ok(())
}

#[test]
fn anchor_without_profile_is_dropped() -> Result<(), Report> {
    let profiles = profiles(&[("p", "{'AAAA': 1.0}")])?;
    assert_eq!(refine_cluster(&cluster("chr", &["p"]), &HashSet::new(), &profiles, 100.0), None);
    Ok(())
}

#[test]
fn marked_and_unprofiled_members_are_skipped() -> Result<(), Report> {
    let profiles = profiles(&[("chr", "{'AAAA': 1.0}"), ("other_chr", "{'AAAA': 1.0}"), ("p", "{'AAAA': 1.2}")])?;
    let marked: HashSet<&str> = ["chr", "other_chr"].into_iter().collect();
    let refined = refine_cluster(&cluster("chr", &["other_chr", "missing", "p"]), &marked, &profiles, 0.1);
    assert_eq!(refined.map(|r| r.chromids), Some(vec!["p".to_string()]));

    assert_eq!(refine_cluster(&cluster("chr", &["other_chr", "missing"]), &marked, &profiles, 0.1), None);
    Ok(())
}

#[test]
fn empty_cluster_is_dropped() -> Result<(), Report> {
    let profiles = profiles(&[("chr", "{'AAAA': 1.0}")])?;
    assert_eq!(refine_cluster(&cluster("chr", &[]), &HashSet::new(), &profiles, 1.0), None);
    Ok(())
}

#[test]
fn chunking_keeps_every_cluster() -> Result<(), Report> {
    let mut rows = vec![];
    let mut clusters = vec![];
    for i in 0..17 {
        rows.push((format!("chr_{i}"), "{'AAAA': 1.0}".to_string()));
        rows.push((format!("p_{i}"), format!("{{'AAAA': {}.0}}", 1 + i % 3)));
        clusters.push(cluster(&format!("chr_{i}"), &[&format!("p_{i}")]));
    }
    let profiles = rows
        .iter()
        .map(|(id, literal)| literal.parse::<Profile>().map(|profile| (id.clone(), profile)))
        .collect::<Result<ProfileMap, Report>>()?;

    let mut anchor = Classification::new("chr_0");
    anchor.categories.extend([Category::Dnaa, Category::Core]);
    let classifications = vec![anchor];

    let expected = refine(&clusters, &classifications, &profiles, 1.0, clusters.len());
    // distance is 0 when i % 3 == 0 and 1 when i % 3 == 1
    assert_eq!(expected.len(), 12);
    assert_eq!(expected[0].chromosome, "chr_0");
    assert_eq!(expected.last().map(|c| c.chromosome.as_str()), Some("chr_16"));
    for chunk_size in [0, 1, 2, 4, 16] {
        assert_eq!(refine(&clusters, &classifications, &profiles, 1.0, chunk_size), expected);
    }
    Ok(())
}

#[test]
fn chunk_size_per_thread() -> Result<(), Report> {
    assert_eq!(chunk_size(100, 4), 25);
    assert_eq!(chunk_size(3, 8), 1);
    assert_eq!(chunk_size(0, 0), 1);
    Ok(())
}

#[test]
fn report_round_trip() -> Result<(), Report> {
    let dir = tempdir()?;
    let path = dir.path().join("result.txt");
    let refined = vec![
        RefinedCluster { chromosome: "chr".to_string(), chromids: vec!["p1".to_string(), "p2".to_string()] },
        RefinedCluster { chromosome: "chr2".to_string(), chromids: vec!["p3".to_string()] },
    ];
    write_report(&refined, &path)?;
    let text = std::fs::read_to_string(&path)?;
    assert_eq!(
        text.lines().take(5).collect::<Vec<_>>(),
        vec!["Possible bacterial chromosome:", "chr", "Possible bacterial chromids:", "p1, p2", "------"]
    );
    assert_eq!(read_report(&path)?, refined);

    let json = dir.path().join("result.json");
    write_json(&refined, &json)?;
    let parsed: Vec<RefinedCluster> = serde_json::from_str(&std::fs::read_to_string(&json)?)?;
    assert_eq!(parsed, refined);
    Ok(())
}

#[test]
fn read_report_rejects_truncated_blocks() -> Result<(), Report> {
    let dir = tempdir()?;
    let path = dir.path().join("result.txt");
    std::fs::write(&path, "Possible bacterial chromosome:\nchr\nPossible bacterial chromids:\n")?;
    assert!(read_report(&path).is_err());
    Ok(())
}
