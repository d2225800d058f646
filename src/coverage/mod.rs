//! Per-track coverage collection.
//!
//! A [`CoverageCollector`] turns a stream of mapping batches into a
//! per-feature overlap-count map; a [`CoverageCollectionJob`] wraps one
//! track and drives its stream to completion on a worker thread. The
//! storage side stays behind the [`MappingStream`] and
//! [`ReferenceFeatureProvider`] trait seams.

mod collector;
mod job;
mod stream;

pub use collector::{CollectorConfig, CoverageCollector};
pub use job::CoverageCollectionJob;
pub use stream::{
    BatchReader, CollectionError, MappingStream, ReferenceFeatureProvider,
};
