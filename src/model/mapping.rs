use std::fmt;

use crate::model::Strand;

/// Identifier of one reference chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChromId(pub u32);

impl fmt::Display for ChromId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chrom{}", self.0)
    }
}

/// One aligned read, or a collapsed duplicate group carrying a multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// Leftmost reference coordinate.
    pub start: u64,
    /// Rightmost reference coordinate.
    pub stop: u64,
    /// Strand the read aligned to.
    pub strand: Strand,
    /// Replicate weight: collapsed duplicates are delivered once with the
    /// number of identical reads they stand for.
    pub replicates: u32,
}

impl Mapping {
    /// Construct a new mapping record.
    pub fn new(start: u64, stop: u64, strand: Strand, replicates: u32) -> Self {
        Self {
            start,
            stop,
            strand,
            replicates,
        }
    }
}

/// One delivery from the storage collaborator: unsorted mapping records for
/// a single chromosome. Batches themselves may arrive in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingBatch {
    /// Chromosome every record in this batch belongs to.
    pub chrom: ChromId,
    /// Mapping records, in no particular order.
    pub mappings: Vec<Mapping>,
}

impl MappingBatch {
    /// Construct a batch for one chromosome.
    pub fn new(chrom: ChromId, mappings: Vec<Mapping>) -> Self {
        Self { chrom, mappings }
    }
}
