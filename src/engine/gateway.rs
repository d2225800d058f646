use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::engine::session::{
    EngineError, EngineSession, EngineValue, ResultArtifact, ResultHandle,
};

/// Capability proving the exclusive right to operate the engine.
///
/// Deliberately neither `Clone` nor `Copy`: at most one valid, unreleased
/// token exists per gateway at any time, and releasing consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct ReservationToken {
    id: u64,
}

impl ReservationToken {
    /// Numeric identity, for logs.
    pub fn id(&self) -> u64 {
        self.id
    }
}

type EngineFactory = Box<dyn Fn() -> Result<Box<dyn EngineSession>, EngineError> + Send + Sync>;

/// Token ids are unique across the whole process, so a token minted by one
/// gateway can never accidentally validate against another.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

struct GatewayState {
    held: Option<u64>,
    session: Option<Box<dyn EngineSession>>,
    transcript: Vec<String>,
}

/// Exclusive-access manager for the singleton external engine.
///
/// Two-phase capability protocol: [`EngineGateway::reserve`] test-and-sets
/// the held slot and mints a fresh token; [`EngineGateway::acquire`] turns a
/// matching token into a command lease, lazily constructing the engine
/// session on first use; [`EngineGateway::release`] consumes the token and
/// frees the slot. The engine workspace is defensively cleared on both the
/// acquire and the release boundary.
pub struct EngineGateway {
    state: Mutex<GatewayState>,
    factory: EngineFactory,
}

impl fmt::Debug for EngineGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("EngineGateway")
            .field("held", &state.held)
            .field("session_live", &state.session.is_some())
            .field("transcript_len", &state.transcript.len())
            .finish()
    }
}

impl EngineGateway {
    /// Create a gateway around an engine factory. The factory runs at most
    /// once per gateway, on the first successful acquire.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn EngineSession>, EngineError> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(GatewayState {
                held: None,
                session: None,
                transcript: Vec::new(),
            }),
            factory: Box::new(factory),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claim the engine. Fails with [`EngineError::Busy`] while
    /// another reservation is live.
    pub fn reserve(&self) -> Result<ReservationToken, EngineError> {
        let mut state = self.lock_state();
        if state.held.is_some() {
            warn!("engine reservation refused: already held");
            return Err(EngineError::Busy);
        }
        let id = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        state.held = Some(id);
        info!(token = id, "engine reserved");
        Ok(ReservationToken { id })
    }

    /// Exchange a live token for a command lease.
    pub fn acquire(&self, token: &ReservationToken) -> Result<EngineLease<'_>, EngineError> {
        let mut state = self.lock_state();
        if state.held != Some(token.id) {
            warn!(token = token.id, "engine acquire refused: token mismatch");
            return Err(EngineError::Busy);
        }
        if state.session.is_none() {
            info!("constructing engine instance");
            state.session = Some((self.factory)()?);
        }
        if let Some(session) = state.session.as_mut() {
            session.clear_workspace()?;
        }
        drop(state);
        Ok(EngineLease {
            gateway: self,
            token_id: token.id,
        })
    }

    /// Consume the token, defensively clear the engine workspace, and free
    /// the held slot. Fails with [`EngineError::Busy`] on token mismatch.
    pub fn release(&self, token: ReservationToken) -> Result<(), EngineError> {
        let mut state = self.lock_state();
        if state.held != Some(token.id) {
            warn!(token = token.id, "engine release refused: token mismatch");
            return Err(EngineError::Busy);
        }
        if let Some(session) = state.session.as_mut() {
            session.clear_workspace()?;
        }
        state.held = None;
        info!(token = token.id, "engine released");
        Ok(())
    }

    /// Whether a reservation is currently live.
    pub fn is_held(&self) -> bool {
        self.lock_state().held.is_some()
    }

    /// Copy of the diagnostic transcript: every command submitted through a
    /// lease, in submission order. Polls are not commands and are not
    /// recorded.
    pub fn transcript(&self) -> Vec<String> {
        self.lock_state().transcript.clone()
    }
}

/// Live command lease over the engine session.
///
/// The lease proves its holder's reservation; each command takes the
/// gateway's internal lock only for its own duration. Between commands the
/// gateway stays lockable, so a competing [`EngineGateway::reserve`] observes
/// the held slot and fails [`EngineError::Busy`] at once instead of queueing
/// behind a lease that is idling on a pending result. A command issued after
/// the backing reservation was released fails `Busy` as well. Every command
/// is appended to the diagnostic transcript before it executes; the engine's
/// own failure modes are opaque, and the transcript is often the only clue
/// to what it was doing.
pub struct EngineLease<'a> {
    gateway: &'a EngineGateway,
    token_id: u64,
}

impl fmt::Debug for EngineLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLease")
            .field("token", &self.token_id)
            .finish()
    }
}

impl EngineLease<'_> {
    /// Lock the gateway for one session call. `transcript` carries the
    /// command text to record; polls pass `None` and leave no record.
    fn session_call<T>(
        &mut self,
        transcript: Option<String>,
        run: impl FnOnce(&mut dyn EngineSession) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut state = self.gateway.lock_state();
        if state.held != Some(self.token_id) {
            warn!(
                token = self.token_id,
                "lease command refused: reservation no longer live"
            );
            return Err(EngineError::Busy);
        }
        if let Some(text) = transcript {
            debug!(command = %text, "engine command");
            state.transcript.push(text);
        }
        match state.session.as_mut() {
            Some(session) => run(session.as_mut()),
            None => Err(EngineError::Runtime {
                kind: "gateway".into(),
                message: "no live engine session behind the lease".into(),
            }),
        }
    }

    /// Bind a value to a name in the engine workspace.
    pub fn assign(&mut self, name: &str, value: EngineValue) -> Result<(), EngineError> {
        self.session_call(Some(format!("assign {name}")), |session| {
            session.assign(name, value)
        })
    }

    /// Submit an expression for evaluation.
    pub fn evaluate(&mut self, expr: &str) -> Result<ResultHandle, EngineError> {
        self.session_call(Some(format!("evaluate {expr}")), |session| {
            session.evaluate(expr)
        })
    }

    /// Poll for an evaluation's artifact; `None` while still pending.
    pub fn try_fetch(
        &mut self,
        handle: ResultHandle,
    ) -> Result<Option<ResultArtifact>, EngineError> {
        self.session_call(None, |session| session.try_fetch(handle))
    }

    /// Make an extension package available.
    pub fn load_package(&mut self, package: &str) -> Result<(), EngineError> {
        self.session_call(Some(format!("load_package {package}")), |session| {
            session.load_package(package)
        })
    }
}

/// RAII reservation: holds the token and releases it on drop, so an aborted
/// or panicking caller can never strand the engine in the held state.
pub struct ScopedReservation {
    gateway: Arc<EngineGateway>,
    token: Option<ReservationToken>,
}

impl fmt::Debug for ScopedReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedReservation")
            .field("token", &self.token.as_ref().map(ReservationToken::id))
            .finish()
    }
}

impl ScopedReservation {
    /// Reserve the gateway, wrapping the token for scoped release.
    pub fn reserve(gateway: Arc<EngineGateway>) -> Result<Self, EngineError> {
        let token = gateway.reserve()?;
        Ok(Self {
            gateway,
            token: Some(token),
        })
    }

    /// Acquire a command lease against the wrapped token.
    pub fn acquire(&self) -> Result<EngineLease<'_>, EngineError> {
        match self.token.as_ref() {
            Some(token) => self.gateway.acquire(token),
            None => Err(EngineError::Busy),
        }
    }

    /// Release eagerly instead of waiting for drop, surfacing any failure.
    pub fn release(mut self) -> Result<(), EngineError> {
        match self.token.take() {
            Some(token) => self.gateway.release(token),
            None => Err(EngineError::Busy),
        }
    }
}

impl Drop for ScopedReservation {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(err) = self.gateway.release(token) {
                warn!(error = %err, "failed to release engine reservation on drop");
            }
        }
    }
}
