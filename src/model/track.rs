use std::fmt;

/// Identifier of one sequencing track (sample).
///
/// Tracks are ordered by id when the count matrix assigns its columns, so
/// ids double as the canonical column ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track{}", self.0)
    }
}

/// One sequencing sample/dataset under analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Stable identity used throughout the run.
    pub id: TrackId,
    /// Human-readable description shown in logs and column labels.
    pub description: String,
}

impl Track {
    /// Construct a new track.
    pub fn new(id: u32, description: impl Into<String>) -> Self {
        Self {
            id: TrackId(id),
            description: description.into(),
        }
    }
}
