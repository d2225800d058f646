use std::fmt;

/// Lifecycle status of one analysis run, the only payload observers see.
///
/// `Running` is emitted when the run starts; `Finished` and `Error` are
/// terminal. There is no partial-result state: a run either reaches
/// `Finished` with a usable result or `Error` with nothing usable. The
/// human-readable failure message goes to the log, not the observer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    /// Collection and engine work are in flight.
    Running,
    /// The matrix was computed and the engine call succeeded.
    Finished,
    /// A job or the engine failed; the run produced nothing usable.
    Error,
}

impl AnalysisStatus {
    /// Whether the run can no longer change status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnalysisStatus::Running)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Running => write!(f, "RUNNING"),
            AnalysisStatus::Finished => write!(f, "FINISHED"),
            AnalysisStatus::Error => write!(f, "ERROR"),
        }
    }
}
