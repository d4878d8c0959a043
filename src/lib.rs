//! `chromid-finder` identifies **chromosomes** and **chromids** in bacterial genome and
//! metagenome assemblies.
//!
//! A chromid is a large replicon that carries core genes and a plasmid-type replication and
//! partitioning system, but shares the composition of its chromosome. The pipeline:
//!
//! 1. [Annotates](annotate) predicted genes with HMM libraries of core, partitioning, and
//!    replication genes, and with a KofamScan profile of the chromosomal initiator `dnaA`.
//! 1. [Filters](evidence) the annotation tables by score and [classifies](classify) each
//!    sequence by the categories of evidence it carries. Classified sequences with `dnaA`
//!    are *anchors*, candidate chromosomes.
//! 1. [Clusters](cluster) every anchor with the shorter classified sequences of similar
//!    [GC content](sequence::gc).
//! 1. [Refines](refine) each cluster by the tetranucleotide usage-bias [distance](chromid_tetra::Profile::distance)
//!    between the anchor and its members, computed by [`profile`].
//!
//! The whole pipeline is available as [`run::run`], and each stage as a subcommand of the
//! [`cli`].

pub mod annotate;
pub mod classify;
pub mod cli;
pub mod cluster;
pub mod evidence;
pub mod profile;
pub mod refine;
pub mod run;
pub mod sequence;
pub mod utils;

#[doc(inline)]
pub use crate::cli::{Cli, Verbosity};
#[doc(inline)]
pub use crate::run::RunArgs;
#[doc(inline)]
pub use chromid_tetra::Profile;
