//! # Multi-track coverage aggregation for differential-expression prep
//!
//! This crate prepares sequencing data for differential-expression testing:
//!
//! 1. **Collection**: one concurrent job per selected track streams mapping
//!    batches from the storage collaborator into a per-feature overlap
//!    counter.
//! 2. **Barrier**: the orchestrator waits for every job; the first failure
//!    aborts the whole run before any engine interaction.
//! 3. **Assembly**: per-track count maps become a deterministic
//!    feature × track count matrix, explicit zeros included.
//! 4. **Engine**: the matrix is handed to a singleton external statistical
//!    engine guarded by a reserve/acquire/release capability protocol.
//!
//! ## Usage Example
//!
//! ```ignore
//! use diffexpr::{AnalysisConfig, AnalysisOrchestrator, SimpleRatioTest};
//!
//! let mut orchestrator = AnalysisOrchestrator::new(
//!     tracks, provider, stream, gateway,
//!     Box::new(SimpleRatioTest { numerator, denominator }),
//!     AnalysisConfig::default(),
//! );
//! orchestrator.register_observer(|status| println!("{status}"));
//! let mut handle = orchestrator.start();
//! let output = handle.wait()?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

// Core modules - leaves first, coordinator last
pub mod model;    // tracks, features, mappings
pub mod coverage; // per-track collection jobs and collaborator seams
pub mod matrix;   // count-matrix assembly
pub mod engine;   // exclusive gateway to the external engine
pub mod analysis; // orchestration and statistical-method strategies

// Re-exports for convenience
pub use analysis::{
    AnalysisConfig, AnalysisError, AnalysisHandle, AnalysisOrchestrator, AnalysisStatus,
    ExportOnly, MatrixModelTest, MethodOutput, PollConfig, SimpleRatioTest, StatisticalMethod,
};
pub use coverage::{
    BatchReader, CollectionError, CollectorConfig, CoverageCollectionJob, CoverageCollector,
    MappingStream, ReferenceFeatureProvider,
};
pub use engine::{
    EngineError, EngineGateway, EngineLease, EngineSession, EngineValue, ReservationToken,
    ResultArtifact, ResultHandle, ScopedReservation,
};
pub use matrix::{CountMatrix, CountMatrixBuilder, MatrixError};
pub use model::{
    ChromId, Feature, FeatureId, FeatureKind, Mapping, MappingBatch, Strand, Track, TrackId,
};
