use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::method::{MethodOutput, PollConfig, StatisticalMethod};
use crate::analysis::status::AnalysisStatus;
use crate::coverage::{
    CollectionError, CollectorConfig, CoverageCollectionJob, CoverageCollector, MappingStream,
    ReferenceFeatureProvider,
};
use crate::engine::{EngineError, EngineGateway, EngineLease, ScopedReservation};
use crate::matrix::{CountMatrix, CountMatrixBuilder, MatrixError};
use crate::model::{Feature, FeatureKind, Track, TrackId};

/// Anything that can sink an analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A coverage-collection job failed; the run aborted before any engine
    /// interaction.
    #[error(transparent)]
    Collection(#[from] CollectionError),

    /// Matrix assembly hit an inconsistency that the zero-seeding contract
    /// rules out; aggregation state is corrupt.
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    /// The engine phase failed after collection succeeded.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A worker thread died without reporting a result.
    #[error("coverage worker for {track} terminated abnormally")]
    WorkerLost {
        /// Track whose worker disappeared.
        track: TrackId,
    },

    /// The coordinator thread is gone: it panicked, never started, or its
    /// outcome was already taken.
    #[error("analysis coordinator terminated without an outcome")]
    CoordinatorLost,
}

/// Run-wide configuration.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Annotation kinds participating in counting.
    pub feature_kinds: Vec<FeatureKind>,
    /// Overlap-scan parameters shared by every track's collector.
    pub collector: CollectorConfig,
    /// Bounded polling for asynchronous engine results.
    pub poll: PollConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            feature_kinds: vec![FeatureKind::Gene],
            collector: CollectorConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

/// Identifier handed out by [`AnalysisOrchestrator::register_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(usize);

type StatusObserver = Box<dyn Fn(AnalysisStatus) + Send>;

struct SharedState {
    status: Mutex<AnalysisStatus>,
    status_changed: Condvar,
    cancel: Arc<AtomicBool>,
    reservation: Mutex<Option<ScopedReservation>>,
    observers: Mutex<Vec<StatusObserver>>,
}

impl SharedState {
    fn lock_status(&self) -> MutexGuard<'_, AnalysisStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_reservation(&self) -> MutexGuard<'_, Option<ScopedReservation>> {
        self.reservation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a status transition, wake waiters, and notify every observer.
    /// Status transitions are the observers' only channel, so every path
    /// that changes the status goes through here.
    fn emit(&self, status: AnalysisStatus) {
        *self.lock_status() = status;
        self.status_changed.notify_all();
        info!(%status, "analysis status");
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for observer in observers.iter() {
            observer(status);
        }
    }
}

/// Top-level coordinator for one analysis run.
///
/// Construction wires in the collaborators and the statistical method;
/// [`AnalysisOrchestrator::start`] consumes the orchestrator and runs the
/// whole pipeline off the caller's thread. Collection failures are always
/// fatal to the run (no degraded mode); engine failures are reported but do
/// not force the reservation away, so the session stays inspectable.
pub struct AnalysisOrchestrator {
    tracks: Vec<Track>,
    provider: Arc<dyn ReferenceFeatureProvider>,
    stream: Arc<dyn MappingStream>,
    gateway: Arc<EngineGateway>,
    method: Box<dyn StatisticalMethod>,
    config: AnalysisConfig,
    observers: Vec<(usize, StatusObserver)>,
    next_observer: usize,
}

impl fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("tracks", &self.tracks)
            .field("method", &self.method.name())
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl AnalysisOrchestrator {
    /// Wire up a run over the selected tracks.
    pub fn new(
        tracks: Vec<Track>,
        provider: Arc<dyn ReferenceFeatureProvider>,
        stream: Arc<dyn MappingStream>,
        gateway: Arc<EngineGateway>,
        method: Box<dyn StatisticalMethod>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            tracks,
            provider,
            stream,
            gateway,
            method,
            config,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Attach a status observer. Observers see every transition, in order,
    /// including the immediate `Error` of a run that failed to launch.
    pub fn register_observer(
        &mut self,
        observer: impl Fn(AnalysisStatus) + Send + 'static,
    ) -> ObserverId {
        let id = self.next_observer;
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        ObserverId(id)
    }

    /// Detach a previously registered observer. Returns `false` if the id
    /// is unknown.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id.0);
        self.observers.len() != before
    }

    /// Launch the run asynchronously and hand back its handle.
    ///
    /// The handle owns the run: it can wait for the outcome, cancel
    /// in-flight collection, reuse the engine session for follow-up calls,
    /// and releases the engine reservation no later than its own teardown.
    pub fn start(mut self) -> AnalysisHandle {
        // Observers live in the shared state from here on: transitions are
        // emitted by whichever thread owns the run at that moment, the
        // failed-spawn path included.
        let observers = std::mem::take(&mut self.observers)
            .into_iter()
            .map(|(_, observer)| observer)
            .collect();
        let shared = Arc::new(SharedState {
            status: Mutex::new(AnalysisStatus::Running),
            status_changed: Condvar::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            reservation: Mutex::new(None),
            observers: Mutex::new(observers),
        });

        let coordinator_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("analysis-coordinator".into())
            .spawn(move || self.coordinate(coordinator_shared))
            .ok();
        if thread.is_none() {
            // Could not even start the coordinator; the run is over before
            // it began, and observers hear about it like any other failure.
            shared.emit(AnalysisStatus::Error);
        }

        AnalysisHandle { shared, thread }
    }

    fn coordinate(self, shared: Arc<SharedState>) -> Result<MethodOutput, AnalysisError> {
        shared.emit(AnalysisStatus::Running);
        let result = self.run_pipeline(&shared);
        match &result {
            Ok(_) => shared.emit(AnalysisStatus::Finished),
            Err(err) => {
                warn!(error = %err, "analysis failed");
                shared.emit(AnalysisStatus::Error);
            }
        }
        result
    }

    fn run_pipeline(&self, shared: &SharedState) -> Result<MethodOutput, AnalysisError> {
        let features = self.load_features()?;
        let collectors = self.collect_coverage(&features, shared)?;
        let matrix = self.assemble_matrix(&features, collectors)?;

        // Collection is done and consistent; only now is the engine worth
        // reserving.
        let reservation = ScopedReservation::reserve(Arc::clone(&self.gateway))?;
        let run_result = self.run_method(&reservation, &matrix);
        // The reservation parks in the handle even on failure, so the
        // session can be inspected or reused before an explicit release.
        *shared.lock_reservation() = Some(reservation);
        run_result
    }

    fn load_features(&self) -> Result<Vec<Feature>, AnalysisError> {
        let mut features = Vec::new();
        for chrom in self.provider.chromosomes() {
            features.extend(
                self.provider
                    .features_for(chrom, &self.config.feature_kinds)?,
            );
        }
        info!(features = features.len(), "reference feature set loaded");
        Ok(features)
    }

    /// Spawn one worker per track, then act as the completion barrier.
    ///
    /// Workers report over a channel; receiving on the coordinator thread is
    /// the serialized completion section, so aggregation state is never
    /// observed mid-update. The first failure flips the cancellation flag;
    /// every sibling is still received and joined before the abort
    /// propagates, so no worker outlives the run.
    fn collect_coverage(
        &self,
        features: &[Feature],
        shared: &SharedState,
    ) -> Result<Vec<(TrackId, CoverageCollector)>, AnalysisError> {
        let total = self.tracks.len();
        let (sender, receiver) = mpsc::channel();
        let mut workers: Vec<(TrackId, JoinHandle<()>)> = Vec::with_capacity(total);

        for track in &self.tracks {
            let job = CoverageCollectionJob::new(
                track.clone(),
                CoverageCollector::new(features, self.config.collector),
            );
            let stream = Arc::clone(&self.stream);
            let sender = sender.clone();
            let cancel = Arc::clone(&shared.cancel);
            let spawned = thread::Builder::new()
                .name(format!("coverage-{}", track.id))
                .spawn(move || {
                    let outcome = job.run(stream.as_ref(), &cancel);
                    // The coordinator may already be gone on abort; a dead
                    // channel is not this worker's problem.
                    let _ = sender.send(outcome);
                });
            match spawned {
                Ok(handle) => workers.push((track.id, handle)),
                Err(err) => {
                    shared.cancel.store(true, Ordering::Relaxed);
                    self.join_workers(workers);
                    return Err(CollectionError::Stream {
                        track: track.id,
                        reason: format!("failed to spawn coverage worker: {err}"),
                    }
                    .into());
                }
            }
        }
        drop(sender);

        let mut completed = Vec::with_capacity(total);
        let mut first_error: Option<AnalysisError> = None;
        for _ in 0..total {
            match receiver.recv() {
                Ok(Ok((track, collector))) => {
                    debug!(%track, "coverage job completed");
                    completed.push((track, collector));
                }
                Ok(Err(err)) => {
                    shared.cancel.store(true, Ordering::Relaxed);
                    // Keep the first real failure. Cancellation markers are
                    // fallout (or the caller's own abort) and only stand in
                    // while no real failure is known.
                    let is_cancel = matches!(err, CollectionError::Cancelled { .. });
                    let standing_in = matches!(
                        first_error,
                        Some(AnalysisError::Collection(CollectionError::Cancelled { .. }))
                    );
                    if first_error.is_none() || (standing_in && !is_cancel) {
                        first_error = Some(err.into());
                    }
                }
                Err(_) => break,
            }
        }

        let lost = self.join_workers(workers);
        if let (None, Some(track)) = (&first_error, lost) {
            first_error = Some(AnalysisError::WorkerLost { track });
        }

        match first_error {
            Some(err) => Err(err),
            None if completed.len() == total => Ok(completed),
            None => {
                // Channel closed early without an error in hand: a worker
                // vanished without reporting.
                Err(AnalysisError::WorkerLost {
                    track: self
                        .tracks
                        .iter()
                        .map(|t| t.id)
                        .find(|id| !completed.iter().any(|(done, _)| done == id))
                        .unwrap_or(TrackId(0)),
                })
            }
        }
    }

    /// Join every worker; returns the first track whose worker panicked.
    fn join_workers(&self, workers: Vec<(TrackId, JoinHandle<()>)>) -> Option<TrackId> {
        let mut lost = None;
        for (track, handle) in workers {
            if handle.join().is_err() {
                warn!(%track, "coverage worker panicked");
                lost.get_or_insert(track);
            }
        }
        lost
    }

    fn assemble_matrix(
        &self,
        features: &[Feature],
        collectors: Vec<(TrackId, CoverageCollector)>,
    ) -> Result<CountMatrix, AnalysisError> {
        let mut builder = CountMatrixBuilder::new(features);
        for (track, collector) in collectors {
            builder.add_track(track, &collector.into_counts())?;
        }
        let matrix = builder.build();
        info!(
            rows = matrix.row_count(),
            columns = matrix.column_count(),
            "count matrix assembled"
        );
        Ok(matrix)
    }

    fn run_method(
        &self,
        reservation: &ScopedReservation,
        matrix: &CountMatrix,
    ) -> Result<MethodOutput, AnalysisError> {
        let mut lease = reservation.acquire()?;
        info!(method = self.method.name(), "driving engine");
        for package in self.method.required_packages() {
            lease.load_package(&package)?;
        }
        let output = self.method.run(&mut lease, matrix, &self.config.poll)?;
        Ok(output)
    }
}

/// Owner's view of a launched run.
///
/// Dropping the handle is safe at any point: a still-parked engine
/// reservation is released by its own scoped guard once the last reference
/// goes away, and workers are joined by the coordinator regardless.
pub struct AnalysisHandle {
    shared: Arc<SharedState>,
    thread: Option<JoinHandle<Result<MethodOutput, AnalysisError>>>,
}

impl fmt::Debug for AnalysisHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisHandle")
            .field("status", &self.status())
            .finish()
    }
}

impl AnalysisHandle {
    /// Current status.
    pub fn status(&self) -> AnalysisStatus {
        *self.shared.lock_status()
    }

    /// Ask in-flight collection to stop. Workers notice between batches;
    /// the run then terminates with `Error`.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
    }

    /// Block until the coordinator finishes and take the outcome. Calling
    /// this twice (or after a failed spawn) reports the run as lost.
    pub fn wait(&mut self) -> Result<MethodOutput, AnalysisError> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .unwrap_or_else(|_| Err(AnalysisError::CoordinatorLost)),
            None => Err(AnalysisError::CoordinatorLost),
        }
    }

    /// Block until the status leaves `Running`, or the timeout passes.
    pub fn wait_for_terminal(&self, timeout: Duration) -> AnalysisStatus {
        let guard = self.shared.lock_status();
        let (status, _timed_out) = self
            .shared
            .status_changed
            .wait_timeout_while(guard, timeout, |status| !status.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        *status
    }

    /// Run follow-up commands (plots, exports, diagnosis) against the still
    /// reserved engine session. Fails with [`EngineError::Busy`] once the
    /// reservation was released.
    pub fn with_engine<R>(
        &self,
        f: impl FnOnce(&mut EngineLease<'_>) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let guard = self.shared.lock_reservation();
        match guard.as_ref() {
            Some(reservation) => {
                let mut lease = reservation.acquire()?;
                f(&mut lease)
            }
            None => Err(EngineError::Busy),
        }
    }

    /// Release the engine reservation now instead of at teardown.
    pub fn release_engine(&self) -> Result<(), EngineError> {
        match self.shared.lock_reservation().take() {
            Some(reservation) => reservation.release(),
            None => Err(EngineError::Busy),
        }
    }
}
