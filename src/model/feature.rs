use std::fmt;

use crate::model::ChromId;

/// Identifier of one annotated reference feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feature{}", self.0)
    }
}

/// Strand a feature or mapping lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    /// 5' → 3' on the reference.
    Forward,
    /// Reverse complement strand.
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// Annotation type of a reference feature.
///
/// A run selects which kinds participate in counting; everything else is
/// filtered out when the feature set is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Gene annotation.
    Gene,
    /// Coding sequence.
    Cds,
    /// Messenger RNA.
    MRna,
    /// Ribosomal RNA.
    RRna,
    /// Transfer RNA.
    TRna,
    /// Non-coding RNA.
    NcRna,
    /// Any annotation type not covered above.
    Other,
}

/// An annotated genomic region with strand and boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    /// Stable feature identity.
    pub id: FeatureId,
    /// Locus tag / display name; used as the matrix row label.
    pub locus: String,
    /// Leftmost reference coordinate.
    pub start: u64,
    /// Rightmost reference coordinate.
    pub stop: u64,
    /// Strand the feature is annotated on.
    pub strand: Strand,
    /// Chromosome the feature belongs to.
    pub chrom: ChromId,
    /// Annotation type.
    pub kind: FeatureKind,
}

impl Feature {
    /// Construct a new feature.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        locus: impl Into<String>,
        start: u64,
        stop: u64,
        strand: Strand,
        chrom: ChromId,
        kind: FeatureKind,
    ) -> Self {
        Self {
            id: FeatureId(id),
            locus: locus.into(),
            start,
            stop,
            strand,
            chrom,
            kind,
        }
    }
}
