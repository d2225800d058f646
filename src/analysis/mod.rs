//! Top-level analysis coordination.
//!
//! [`AnalysisOrchestrator`] runs one coverage-collection job per selected
//! track, barriers on their completion, assembles the count matrix, and
//! drives the exclusive engine through an injected [`StatisticalMethod`]
//! strategy. Progress is observable as [`AnalysisStatus`] transitions and
//! through the returned [`AnalysisHandle`].

mod method;
mod orchestrator;
mod status;

pub use method::{
    ExportOnly, MatrixModelTest, MethodOutput, PollConfig, SimpleRatioTest, StatisticalMethod,
};
pub use orchestrator::{
    AnalysisConfig, AnalysisError, AnalysisHandle, AnalysisOrchestrator, ObserverId,
};
pub use status::AnalysisStatus;
