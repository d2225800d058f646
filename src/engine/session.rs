use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the engine or its gateway.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The gateway is already held, or the presented token is stale,
    /// absent, or mismatched. Always fatal to the calling operation and
    /// never retried silently.
    #[error("engine is busy: another reservation is live or the token does not match")]
    Busy,

    /// A required engine extension could not be loaded, even after one
    /// automatic install attempt.
    #[error("engine package '{package}' is not available; install it manually and re-run")]
    PackageNotAvailable {
        /// Name of the missing extension package.
        package: String,
    },

    /// An asynchronously produced result did not become available before
    /// the polling deadline.
    #[error("engine evaluation '{expr}' produced no result within {waited:?}")]
    TimedOut {
        /// Expression whose result was being polled.
        expr: String,
        /// Total time spent polling.
        waited: Duration,
    },

    /// Any other engine-surfaced failure. The engine's failure modes are
    /// not enumerable from outside, so the originating kind and message are
    /// carried verbatim.
    #[error("unknown engine failure ({kind}): {message}")]
    Runtime {
        /// Type of the originating engine-side error.
        kind: String,
        /// Message of the originating engine-side error.
        message: String,
    },
}

/// Opaque handle to one evaluation's (possibly still pending) result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultHandle(u64);

impl ResultHandle {
    /// Mint a handle. Only session implementations have a reason to call
    /// this; consumers treat handles as opaque.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value, for session-side bookkeeping.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Opaque result artifact (a table, a plot file) handed on to the
/// presentation layer without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
    /// Handle of the evaluation that produced this artifact.
    pub handle: ResultHandle,
    /// Engine-side description: a table name, a temp-file path, and so on.
    pub description: String,
}

/// Data shapes that can be pushed into the engine's workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    /// Vector of integers.
    Integers(Vec<i64>),
    /// Vector of doubles.
    Numbers(Vec<f64>),
    /// Vector of strings.
    Strings(Vec<String>),
    /// Dense integer matrix with row and column names, row-major.
    IntegerMatrix {
        /// Row labels.
        row_names: Vec<String>,
        /// Column labels.
        column_names: Vec<String>,
        /// Cell values, row-major, `row_names.len() * column_names.len()`
        /// entries.
        values: Vec<i64>,
    },
}

/// Abstract command surface of the external engine.
///
/// Implementations wrap whatever process actually does the computation.
/// Results of [`EngineSession::evaluate`] may be produced asynchronously;
/// callers poll [`EngineSession::try_fetch`] until the artifact appears.
pub trait EngineSession: Send {
    /// Bind a value to a name in the engine workspace.
    fn assign(&mut self, name: &str, value: EngineValue) -> Result<(), EngineError>;

    /// Submit an expression for evaluation.
    fn evaluate(&mut self, expr: &str) -> Result<ResultHandle, EngineError>;

    /// Poll for an evaluation's artifact; `None` while still pending.
    fn try_fetch(&mut self, handle: ResultHandle) -> Result<Option<ResultArtifact>, EngineError>;

    /// Make an extension package available, attempting one automatic
    /// install if it is missing.
    fn load_package(&mut self, package: &str) -> Result<(), EngineError>;

    /// Drop all workspace state. The gateway calls this on every
    /// acquire/release boundary so no state leaks between runs.
    fn clear_workspace(&mut self) -> Result<(), EngineError>;
}
