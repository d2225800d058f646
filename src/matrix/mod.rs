//! Count-matrix assembly.
//!
//! The builder captures the canonical row order (feature declaration order)
//! and collision-free row labels up front, then expands each track's
//! per-feature count map into a row-aligned column. Columns are ordered
//! ascending by track id when the matrix is built, so the same inputs always
//! produce the same matrix.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{Feature, FeatureId, TrackId};

/// Defects detected while assembling the matrix.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// A track's count map lacked an entry for a selected feature. The
    /// collector seeds explicit zeros, so this indicates corrupted
    /// aggregation state rather than "no overlap".
    #[error("no count entry for {feature} in {track}")]
    MissingCount {
        /// Feature whose entry is absent.
        feature: FeatureId,
        /// Track whose column was being expanded.
        track: TrackId,
    },

    /// The same track was added twice.
    #[error("{track} added to the matrix twice")]
    DuplicateTrack {
        /// Offending track.
        track: TrackId,
    },
}

/// Ordered feature × track table of overlap counts, the sole payload handed
/// to the external engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMatrix {
    row_labels: Vec<String>,
    feature_ids: Vec<FeatureId>,
    tracks: Vec<TrackId>,
    /// Row-major: `values[row][column]`.
    values: Vec<Vec<u64>>,
}

impl CountMatrix {
    /// Number of feature rows.
    pub fn row_count(&self) -> usize {
        self.row_labels.len()
    }

    /// Number of track columns.
    pub fn column_count(&self) -> usize {
        self.tracks.len()
    }

    /// Collision-suffixed row labels, in feature declaration order.
    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    /// Feature ids, aligned with the rows.
    pub fn feature_ids(&self) -> &[FeatureId] {
        &self.feature_ids
    }

    /// Track ids, ascending, aligned with the columns.
    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    /// Count at one cell.
    pub fn value(&self, row: usize, column: usize) -> u64 {
        self.values[row][column]
    }

    /// One feature row across all tracks.
    pub fn row(&self, row: usize) -> &[u64] {
        &self.values[row]
    }

    /// Render the matrix as tab-separated text with a header line.
    pub fn to_tsv(&self) -> String {
        let mut out = String::from("locus");
        for track in &self.tracks {
            out.push('\t');
            out.push_str(&track.to_string());
        }
        out.push('\n');
        for (label, row) in self.row_labels.iter().zip(&self.values) {
            out.push_str(label);
            for value in row {
                out.push('\t');
                out.push_str(&value.to_string());
            }
            out.push('\n');
        }
        out
    }
}

/// Assembles per-track count maps into a [`CountMatrix`].
#[derive(Debug)]
pub struct CountMatrixBuilder {
    feature_ids: Vec<FeatureId>,
    row_labels: Vec<String>,
    columns: Vec<(TrackId, Vec<u64>)>,
}

impl CountMatrixBuilder {
    /// Fix the row order and labels from the selected feature set.
    ///
    /// Features sharing a locus name keep distinct rows: the n-th duplicate
    /// is labelled `<locus>_<n>` (n starting at 2), deterministically in
    /// declaration order.
    pub fn new(features: &[Feature]) -> Self {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut row_labels = Vec::with_capacity(features.len());
        let mut feature_ids = Vec::with_capacity(features.len());

        for feature in features {
            let occurrence = seen.entry(feature.locus.as_str()).or_insert(0);
            *occurrence += 1;
            let label = if *occurrence == 1 {
                feature.locus.clone()
            } else {
                format!("{}_{}", feature.locus, occurrence)
            };
            row_labels.push(label);
            feature_ids.push(feature.id);
        }

        Self {
            feature_ids,
            row_labels,
            columns: Vec::new(),
        }
    }

    /// Expand one track's count map into a row-aligned column.
    pub fn add_track(
        &mut self,
        track: TrackId,
        counts: &HashMap<FeatureId, u64>,
    ) -> Result<(), MatrixError> {
        if self.columns.iter().any(|(id, _)| *id == track) {
            return Err(MatrixError::DuplicateTrack { track });
        }

        let mut column = Vec::with_capacity(self.feature_ids.len());
        for feature in &self.feature_ids {
            match counts.get(feature) {
                Some(value) => column.push(*value),
                None => {
                    return Err(MatrixError::MissingCount {
                        feature: *feature,
                        track,
                    })
                }
            }
        }
        self.columns.push((track, column));
        Ok(())
    }

    /// Order columns ascending by track id and produce the matrix.
    pub fn build(mut self) -> CountMatrix {
        self.columns.sort_unstable_by_key(|(track, _)| *track);

        let tracks: Vec<TrackId> = self.columns.iter().map(|(track, _)| *track).collect();
        let values = (0..self.feature_ids.len())
            .map(|row| self.columns.iter().map(|(_, col)| col[row]).collect())
            .collect();

        CountMatrix {
            row_labels: self.row_labels,
            feature_ids: self.feature_ids,
            tracks,
            values,
        }
    }
}
