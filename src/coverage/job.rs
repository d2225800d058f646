use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::coverage::{CollectionError, CoverageCollector, MappingStream};
use crate::model::{Track, TrackId};

/// One track's collection work: resolve the mapping source, stream batches
/// into the collector, complete exactly once.
///
/// The job body runs on a worker thread owned by the orchestrator. It checks
/// the shared cancellation flag between batches so an aborting run does not
/// keep streaming; the orchestrator still joins the worker either way.
#[derive(Debug)]
pub struct CoverageCollectionJob {
    track: Track,
    collector: CoverageCollector,
}

impl CoverageCollectionJob {
    /// Pair a track with its (freshly zero-seeded) collector.
    pub fn new(track: Track, collector: CoverageCollector) -> Self {
        Self { track, collector }
    }

    /// Track this job collects for.
    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Drive the stream to completion.
    ///
    /// Source resolution failures surface immediately without streaming a
    /// single batch. On success the job yields its track id and the filled
    /// collector; the pair is reported exactly once, as the function's
    /// return value.
    pub fn run(
        mut self,
        stream: &dyn MappingStream,
        cancel: &AtomicBool,
    ) -> Result<(TrackId, CoverageCollector), CollectionError> {
        let track_id = self.track.id;
        let mut reader = stream.open(&self.track)?;
        debug!(track = %track_id, "mapping source resolved, streaming batches");

        let mut batches = 0usize;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(CollectionError::Cancelled { track: track_id });
            }
            match reader.next_batch()? {
                Some(batch) => {
                    self.collector.accept(batch);
                    batches += 1;
                }
                None => break,
            }
        }

        debug!(track = %track_id, batches, "coverage collection finished");
        Ok((track_id, self.collector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{BatchReader, CollectorConfig};
    use crate::model::{ChromId, Feature, FeatureId, FeatureKind, Mapping, MappingBatch, Strand};

    struct FixedStream {
        batches: Vec<MappingBatch>,
    }

    struct FixedReader {
        batches: std::vec::IntoIter<MappingBatch>,
    }

    impl MappingStream for FixedStream {
        fn open(&self, _track: &Track) -> Result<Box<dyn BatchReader>, CollectionError> {
            Ok(Box::new(FixedReader {
                batches: self.batches.clone().into_iter(),
            }))
        }
    }

    impl BatchReader for FixedReader {
        fn next_batch(&mut self) -> Result<Option<MappingBatch>, CollectionError> {
            Ok(self.batches.next())
        }
    }

    struct BrokenStream;

    impl MappingStream for BrokenStream {
        fn open(&self, track: &Track) -> Result<Box<dyn BatchReader>, CollectionError> {
            Err(CollectionError::PathResolution {
                track: track.id,
                reason: "backing file missing".into(),
            })
        }
    }

    fn collector() -> CoverageCollector {
        let features = vec![Feature::new(
            1,
            "locus1",
            100,
            200,
            Strand::Forward,
            ChromId(1),
            FeatureKind::Gene,
        )];
        CoverageCollector::new(&features, CollectorConfig::default())
    }

    #[test]
    fn job_streams_all_batches() {
        let stream = FixedStream {
            batches: vec![
                MappingBatch::new(ChromId(1), vec![Mapping::new(90, 150, Strand::Forward, 1)]),
                MappingBatch::new(ChromId(1), vec![Mapping::new(150, 210, Strand::Forward, 2)]),
            ],
        };
        let job = CoverageCollectionJob::new(Track::new(7, "sample"), collector());
        let cancel = AtomicBool::new(false);
        let (track, collector) = job.run(&stream, &cancel).expect("job succeeds");
        assert_eq!(track, TrackId(7));
        assert_eq!(collector.counts().get(&FeatureId(1)), Some(&3));
    }

    #[test]
    fn resolution_failure_reports_without_streaming() {
        let job = CoverageCollectionJob::new(Track::new(7, "sample"), collector());
        let cancel = AtomicBool::new(false);
        let err = job.run(&BrokenStream, &cancel).unwrap_err();
        assert!(matches!(
            err,
            CollectionError::PathResolution { track: TrackId(7), .. }
        ));
    }

    #[test]
    fn cancellation_is_observed_between_batches() {
        let stream = FixedStream {
            batches: vec![MappingBatch::new(ChromId(1), vec![])],
        };
        let job = CoverageCollectionJob::new(Track::new(7, "sample"), collector());
        let cancel = AtomicBool::new(true);
        let err = job.run(&stream, &cancel).unwrap_err();
        assert!(matches!(err, CollectionError::Cancelled { track: TrackId(7) }));
    }
}
