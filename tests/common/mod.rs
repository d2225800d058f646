//! Shared mock collaborators for the integration tests: an in-memory
//! mapping stream, a fixed feature provider, and a scriptable engine whose
//! behavior the tests can inspect from outside the gateway.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use diffexpr::{
    BatchReader, ChromId, CollectionError, EngineError, EngineGateway, EngineSession,
    EngineValue, Feature, FeatureKind, MappingBatch, MappingStream, ReferenceFeatureProvider,
    ResultArtifact, ResultHandle, Strand, Track, TrackId,
};

/// Feature provider backed by a fixed declaration-ordered list.
pub struct FixedProvider {
    features: Vec<Feature>,
}

impl FixedProvider {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }
}

impl ReferenceFeatureProvider for FixedProvider {
    fn chromosomes(&self) -> Vec<ChromId> {
        let mut chroms = Vec::new();
        for feature in &self.features {
            if !chroms.contains(&feature.chrom) {
                chroms.push(feature.chrom);
            }
        }
        chroms
    }

    fn features_for(
        &self,
        chrom: ChromId,
        kinds: &[FeatureKind],
    ) -> Result<Vec<Feature>, CollectionError> {
        Ok(self
            .features
            .iter()
            .filter(|f| f.chrom == chrom && kinds.contains(&f.kind))
            .cloned()
            .collect())
    }
}

/// What the in-memory stream serves for one track.
pub enum TrackData {
    /// Finite batches, delivered in order.
    Batches(Vec<MappingBatch>),
    /// Resolution fails with the given reason.
    Unresolvable(String),
    /// Endless stream of empty batches; only cancellation ends it.
    Endless(ChromId),
}

/// In-memory [`MappingStream`].
pub struct MemoryStream {
    tracks: HashMap<TrackId, TrackData>,
}

impl MemoryStream {
    pub fn new(tracks: Vec<(TrackId, TrackData)>) -> Self {
        Self {
            tracks: tracks.into_iter().collect(),
        }
    }
}

impl MappingStream for MemoryStream {
    fn open(&self, track: &Track) -> Result<Box<dyn BatchReader>, CollectionError> {
        match self.tracks.get(&track.id) {
            Some(TrackData::Batches(batches)) => Ok(Box::new(VecReader {
                batches: batches.clone().into_iter(),
            })),
            Some(TrackData::Unresolvable(reason)) => Err(CollectionError::PathResolution {
                track: track.id,
                reason: reason.clone(),
            }),
            Some(TrackData::Endless(chrom)) => Ok(Box::new(EndlessReader { chrom: *chrom })),
            None => Err(CollectionError::PathResolution {
                track: track.id,
                reason: "track unknown to the stream".into(),
            }),
        }
    }
}

struct VecReader {
    batches: std::vec::IntoIter<MappingBatch>,
}

impl BatchReader for VecReader {
    fn next_batch(&mut self) -> Result<Option<MappingBatch>, CollectionError> {
        Ok(self.batches.next())
    }
}

struct EndlessReader {
    chrom: ChromId,
}

impl BatchReader for EndlessReader {
    fn next_batch(&mut self) -> Result<Option<MappingBatch>, CollectionError> {
        // Keep the worker busy without spinning hot; the job's cancellation
        // check between batches is what ends this stream.
        thread::sleep(Duration::from_millis(1));
        Ok(Some(MappingBatch::new(self.chrom, Vec::new())))
    }
}

/// Everything the mock engine observed, shared with the test body.
#[derive(Default)]
pub struct ProbeState {
    pub constructed: usize,
    pub cleared: usize,
    pub assigns: Vec<(String, EngineValue)>,
    pub evaluated: Vec<String>,
    pub loaded: Vec<String>,
}

/// Cloneable view into the mock engine.
#[derive(Clone, Default)]
pub struct EngineProbe(Arc<Mutex<ProbeState>>);

impl EngineProbe {
    pub fn read<R>(&self, f: impl FnOnce(&ProbeState) -> R) -> R {
        f(&self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<R>(&self, f: impl FnOnce(&mut ProbeState) -> R) -> R {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Scripted behavior of the mock engine.
#[derive(Clone, Default)]
pub struct MockEngineScript {
    /// Fetches a result stays pending before becoming ready.
    pub pending_polls: usize,
    /// Packages that fail to load even after the install attempt.
    pub missing_packages: Vec<String>,
    /// Expressions whose evaluation fails outright.
    pub failing_exprs: Vec<String>,
    /// Results never become ready, forcing the poll deadline.
    pub never_ready: bool,
}

struct MockSession {
    probe: EngineProbe,
    script: MockEngineScript,
    pending: HashMap<u64, (String, usize)>,
    next_handle: u64,
}

impl EngineSession for MockSession {
    fn assign(&mut self, name: &str, value: EngineValue) -> Result<(), EngineError> {
        self.probe
            .write(|state| state.assigns.push((name.to_string(), value)));
        Ok(())
    }

    fn evaluate(&mut self, expr: &str) -> Result<ResultHandle, EngineError> {
        self.probe
            .write(|state| state.evaluated.push(expr.to_string()));
        if self.script.failing_exprs.iter().any(|e| e == expr) {
            return Err(EngineError::Runtime {
                kind: "EvaluationException".into(),
                message: format!("scripted failure for '{expr}'"),
            });
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.pending
            .insert(handle, (expr.to_string(), self.script.pending_polls));
        Ok(ResultHandle::new(handle))
    }

    fn try_fetch(&mut self, handle: ResultHandle) -> Result<Option<ResultArtifact>, EngineError> {
        if self.script.never_ready {
            return Ok(None);
        }
        match self.pending.get_mut(&handle.raw()) {
            Some((_, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Ok(None)
            }
            Some((expr, _)) => Ok(Some(ResultArtifact {
                handle,
                description: format!("result of {expr}"),
            })),
            None => Err(EngineError::Runtime {
                kind: "UnknownHandle".into(),
                message: format!("no evaluation behind handle {}", handle.raw()),
            }),
        }
    }

    fn load_package(&mut self, package: &str) -> Result<(), EngineError> {
        self.probe
            .write(|state| state.loaded.push(package.to_string()));
        if self.script.missing_packages.iter().any(|p| p == package) {
            return Err(EngineError::PackageNotAvailable {
                package: package.to_string(),
            });
        }
        Ok(())
    }

    fn clear_workspace(&mut self) -> Result<(), EngineError> {
        self.probe.write(|state| state.cleared += 1);
        Ok(())
    }
}

/// Gateway over a scripted mock engine, plus the probe to inspect it.
pub fn mock_gateway(script: MockEngineScript) -> (Arc<EngineGateway>, EngineProbe) {
    let probe = EngineProbe::default();
    let factory_probe = probe.clone();
    let gateway = EngineGateway::new(move || {
        factory_probe.write(|state| state.constructed += 1);
        Ok(Box::new(MockSession {
            probe: factory_probe.clone(),
            script: script.clone(),
            pending: HashMap::new(),
            next_handle: 1,
        }) as Box<dyn EngineSession>)
    });
    (Arc::new(gateway), probe)
}

/// Gateway whose factory must never run; collection failures have to stop
/// the run before the engine is even constructed.
pub fn untouchable_gateway() -> Arc<EngineGateway> {
    Arc::new(EngineGateway::new(|| {
        Err(EngineError::Runtime {
            kind: "test".into(),
            message: "engine must not be constructed in this scenario".into(),
        })
    }))
}

/// Shorthand feature constructor used across the test files.
pub fn feature(
    id: u64,
    locus: &str,
    start: u64,
    stop: u64,
    strand: Strand,
    chrom: u32,
) -> Feature {
    Feature::new(id, locus, start, stop, strand, ChromId(chrom), FeatureKind::Gene)
}
