use thiserror::Error;

use crate::model::{ChromId, Feature, FeatureKind, MappingBatch, Track, TrackId};

/// Errors raised while collecting coverage for a track.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The track's backing mapping data could not be located. Fatal to the
    /// whole run, raised before any records are streamed.
    #[error("mapping data for {track} could not be located: {reason}")]
    PathResolution {
        /// Track whose source failed to resolve.
        track: TrackId,
        /// Human-readable resolution failure.
        reason: String,
    },

    /// A batch failed to arrive after streaming had started.
    #[error("mapping stream for {track} failed: {reason}")]
    Stream {
        /// Track whose stream broke.
        track: TrackId,
        /// Human-readable stream failure.
        reason: String,
    },

    /// The reference feature set could not be loaded.
    #[error("reference features for {chrom} unavailable: {reason}")]
    Reference {
        /// Chromosome whose annotation failed to load.
        chrom: ChromId,
        /// Human-readable provider failure.
        reason: String,
    },

    /// The orchestrator aborted the run while this job was still streaming.
    #[error("collection for {track} cancelled")]
    Cancelled {
        /// Track whose job observed the cancellation flag.
        track: TrackId,
    },
}

/// Storage collaborator that serves mapping batches per track.
///
/// Implementations resolve whatever backs the track (files, a database
/// connection) inside [`MappingStream::open`]; a resolution failure must be
/// reported as [`CollectionError::PathResolution`] so the orchestrator can
/// fail fast before any engine interaction.
pub trait MappingStream: Send + Sync {
    /// Resolve the track's backing data and return a batch reader over it.
    fn open(&self, track: &Track) -> Result<Box<dyn BatchReader>, CollectionError>;
}

/// Pull-style reader over one track's mapping batches.
///
/// Batches may arrive in any order and records within a batch are unsorted;
/// the collector sorts each batch itself.
pub trait BatchReader: Send {
    /// Next batch, or `None` once the stream is exhausted.
    fn next_batch(&mut self) -> Result<Option<MappingBatch>, CollectionError>;
}

/// Read-only annotation collaborator, queried once per run.
pub trait ReferenceFeatureProvider: Send + Sync {
    /// All chromosomes of the reference, in declaration order.
    fn chromosomes(&self) -> Vec<ChromId>;

    /// Features of the requested kinds on one chromosome, in declaration
    /// order (which fixes the matrix row order).
    fn features_for(
        &self,
        chrom: ChromId,
        kinds: &[FeatureKind],
    ) -> Result<Vec<Feature>, CollectionError>;
}
