//! Value types shared across the pipeline: tracks (samples), annotated
//! reference features, and mapping records streamed by the storage
//! collaborator.
//!
//! All of these are plain data; they are supplied by the caller, treated as
//! read-only for the lifetime of a run, and carry no behavior beyond small
//! constructors and derived accessors.

mod feature;
mod mapping;
mod track;

pub use feature::{Feature, FeatureId, FeatureKind, Strand};
pub use mapping::{ChromId, Mapping, MappingBatch};
pub use track::{Track, TrackId};
