use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::{EngineError, EngineLease, EngineValue, ResultArtifact, ResultHandle};
use crate::matrix::CountMatrix;
use crate::model::TrackId;

/// Bounded polling parameters for asynchronously produced engine results.
///
/// The engine offers no uniform completion callback, so results are polled
/// with a sleep interval up to a deadline; expiry surfaces as
/// [`EngineError::TimedOut`] instead of waiting forever.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Sleep between consecutive polls.
    pub interval: Duration,
    /// Total time budget for one result.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Artifacts a statistical method produced, handed on to the presentation
/// layer without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodOutput {
    /// Result artifacts in production order.
    pub artifacts: Vec<ResultArtifact>,
}

/// One statistical method driven against the engine.
///
/// The orchestrator loads the required packages, then hands the method a
/// command lease and the fully assembled matrix. Methods are strategies
/// injected into the orchestrator; they never touch collection state.
pub trait StatisticalMethod: Send {
    /// Display name, for logs.
    fn name(&self) -> &'static str;

    /// Engine extension packages this method needs loaded up front.
    fn required_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Submit commands and collect results for the given matrix.
    fn run(
        &self,
        lease: &mut EngineLease<'_>,
        matrix: &CountMatrix,
        poll: &PollConfig,
    ) -> Result<MethodOutput, EngineError>;
}

/// Poll one evaluation until its artifact appears or the deadline expires.
pub(crate) fn await_result(
    lease: &mut EngineLease<'_>,
    handle: ResultHandle,
    expr: &str,
    poll: &PollConfig,
) -> Result<ResultArtifact, EngineError> {
    let started = Instant::now();
    loop {
        if let Some(artifact) = lease.try_fetch(handle)? {
            return Ok(artifact);
        }
        let waited = started.elapsed();
        if waited >= poll.timeout {
            return Err(EngineError::TimedOut {
                expr: expr.to_string(),
                waited,
            });
        }
        debug!(expr, ?waited, "engine result pending");
        thread::sleep(poll.interval);
    }
}

/// Push the count matrix into the engine workspace under `counts`.
fn upload_matrix(lease: &mut EngineLease<'_>, matrix: &CountMatrix) -> Result<(), EngineError> {
    let mut values = Vec::with_capacity(matrix.row_count() * matrix.column_count());
    for row in 0..matrix.row_count() {
        for value in matrix.row(row) {
            let value = i64::try_from(*value).map_err(|_| EngineError::Runtime {
                kind: "overflow".into(),
                message: format!("count {value} does not fit the engine's integer type"),
            })?;
            values.push(value);
        }
    }
    lease.assign(
        "counts",
        EngineValue::IntegerMatrix {
            row_names: matrix.row_labels().to_vec(),
            column_names: matrix.tracks().iter().map(TrackId::to_string).collect(),
            values,
        },
    )
}

/// Resolve a track group into matrix column names. A group naming a track
/// with no column is a configuration defect and fails the run; dropping it
/// silently would hand the engine a smaller group than the caller asked for.
fn column_names(matrix: &CountMatrix, tracks: &[TrackId]) -> Result<Vec<String>, EngineError> {
    tracks
        .iter()
        .map(|track| {
            if matrix.tracks().contains(track) {
                Ok(track.to_string())
            } else {
                Err(EngineError::Runtime {
                    kind: "configuration".into(),
                    message: format!("{track} is not a column of the count matrix"),
                })
            }
        })
        .collect()
}

/// Two-group ratio test: compares mean coverage between a numerator and a
/// denominator group of tracks. Needs no engine extension.
#[derive(Debug, Clone)]
pub struct SimpleRatioTest {
    /// Tracks forming the numerator group.
    pub numerator: Vec<TrackId>,
    /// Tracks forming the denominator group.
    pub denominator: Vec<TrackId>,
}

impl StatisticalMethod for SimpleRatioTest {
    fn name(&self) -> &'static str {
        "simple-ratio-test"
    }

    fn run(
        &self,
        lease: &mut EngineLease<'_>,
        matrix: &CountMatrix,
        poll: &PollConfig,
    ) -> Result<MethodOutput, EngineError> {
        upload_matrix(lease, matrix)?;
        lease.assign(
            "group_a",
            EngineValue::Strings(column_names(matrix, &self.numerator)?),
        )?;
        lease.assign(
            "group_b",
            EngineValue::Strings(column_names(matrix, &self.denominator)?),
        )?;
        let expr = "ratio_test(counts, group_a, group_b)";
        let handle = lease.evaluate(expr)?;
        let artifact = await_result(lease, handle, expr, poll)?;
        Ok(MethodOutput {
            artifacts: vec![artifact],
        })
    }
}

/// Model-based test over an explicit design matrix. Requires the engine's
/// count-model extension package.
#[derive(Debug, Clone)]
pub struct MatrixModelTest {
    /// Design columns: name plus one coefficient per track, in ascending
    /// track-id order (the matrix's column order).
    pub design: Vec<(String, Vec<f64>)>,
}

impl StatisticalMethod for MatrixModelTest {
    fn name(&self) -> &'static str {
        "matrix-model-test"
    }

    fn required_packages(&self) -> Vec<String> {
        vec!["countmodels".to_string()]
    }

    fn run(
        &self,
        lease: &mut EngineLease<'_>,
        matrix: &CountMatrix,
        poll: &PollConfig,
    ) -> Result<MethodOutput, EngineError> {
        upload_matrix(lease, matrix)?;
        let mut names = Vec::with_capacity(self.design.len());
        for (name, coefficients) in &self.design {
            let variable = format!("design_{name}");
            lease.assign(&variable, EngineValue::Numbers(coefficients.clone()))?;
            names.push(variable);
        }
        lease.assign("design_columns", EngineValue::Strings(names))?;
        let expr = "fit_count_model(counts, design_columns)";
        let handle = lease.evaluate(expr)?;
        let artifact = await_result(lease, handle, expr, poll)?;
        Ok(MethodOutput {
            artifacts: vec![artifact],
        })
    }
}

/// No statistics at all: upload the matrix and have the engine export it
/// for external tooling.
#[derive(Debug, Clone)]
pub struct ExportOnly {
    /// Engine-side destination the table is written to.
    pub destination: String,
}

impl StatisticalMethod for ExportOnly {
    fn name(&self) -> &'static str {
        "export-only"
    }

    fn run(
        &self,
        lease: &mut EngineLease<'_>,
        matrix: &CountMatrix,
        poll: &PollConfig,
    ) -> Result<MethodOutput, EngineError> {
        upload_matrix(lease, matrix)?;
        let expr = format!("export_counts(counts, \"{}\")", self.destination);
        let handle = lease.evaluate(&expr)?;
        let artifact = await_result(lease, handle, &expr, poll)?;
        Ok(MethodOutput {
            artifacts: vec![artifact],
        })
    }
}
