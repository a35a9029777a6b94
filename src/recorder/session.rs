//! Recorder session lifecycle: inject → match/replay → release.
//!
//! One session per test: the session owns the interceptor, the pending-mock
//! queue, and the expected-cassette log for exactly one `inject`…`release`
//! window. Fatal diagnostics accumulate during the session and are raised
//! together at `release`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::adapters::live::{LiveFileSystem, ReqwestTransport, UuidIdGenerator};
use crate::cassette::{CassetteEntry, CassetteStore};
use crate::error::{RecorderError, TransportError};
use crate::options::RecorderOptions;
use crate::ports::http::{TransportFuture, TransportRequest, TransportResponse};
use crate::ports::{FileSystem, HttpTransport, IdGenerator};
use crate::recorder::healing::{self, CassetteAction};
use crate::recorder::interceptor::Interceptor;
use crate::recorder::matcher::{self, PendingMock};
use crate::recorder::modifiers;

/// External capabilities consumed by a recorder session.
pub struct RecorderContext {
    /// Transport used for live round-trips.
    pub transport: Arc<dyn HttpTransport>,
    /// Filesystem backing the cassette store.
    pub fs: Arc<dyn FileSystem>,
    /// Id source for healed message identifiers.
    pub ids: Arc<dyn IdGenerator>,
}

impl RecorderContext {
    /// Creates a context with real network, disk, and randomness.
    #[must_use]
    pub fn live() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
            fs: Arc::new(LiveFileSystem),
            ids: Arc::new(UuidIdGenerator::new()),
        }
    }
}

/// Whether the session replays an existing cassette or records a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Replay,
    Record,
}

struct SessionState {
    active: bool,
    mode: Mode,
    cassette_path: Option<PathBuf>,
    known_names: Vec<String>,
    records: Vec<Value>,
    pending: Vec<PendingMock>,
    expected: Vec<CassetteAction>,
    out_of_order: Vec<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            active: false,
            mode: Mode::Record,
            cassette_path: None,
            known_names: Vec::new(),
            records: Vec::new(),
            pending: Vec::new(),
            expected: Vec::new(),
            out_of_order: Vec::new(),
        }
    }
}

/// Snapshot of a session's diagnostics and produced entries.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Cassette entries as loaded, before modifiers or healing.
    pub records: Vec<Value>,
    /// Keys of entries consumed out of recording order.
    pub out_of_order_errors: Vec<String>,
    /// Keys of entries that were never matched.
    pub unmatched_recordings: Vec<String>,
    /// Entries consumed or captured, in consumption order (on-disk form).
    pub expected_cassette: Vec<Value>,
    /// Path of the cassette file for the current session.
    pub cassette_file_path: Option<PathBuf>,
}

/// The test-fixture engine: replays recorded HTTP interactions, heals stale
/// ones, and records new ones.
///
/// The code under test performs HTTP through [`RequestRecorder::transport`];
/// between `inject` and `release` every call is matched against the loaded
/// cassette.
pub struct RequestRecorder {
    options: Arc<RecorderOptions>,
    store: CassetteStore,
    live: Arc<dyn HttpTransport>,
    interceptor: Arc<Interceptor>,
    state: Arc<Mutex<SessionState>>,
    handle: Arc<SessionTransport>,
}

impl RequestRecorder {
    /// Creates a recorder with live network, disk, and randomness.
    #[must_use]
    pub fn new(options: RecorderOptions) -> Self {
        Self::with_context(options, RecorderContext::live())
    }

    /// Creates a recorder over explicit capabilities.
    #[must_use]
    pub fn with_context(options: RecorderOptions, ctx: RecorderContext) -> Self {
        let options = Arc::new(options);
        let interceptor = Arc::new(Interceptor::new(Arc::clone(&ctx.transport)));
        let state = Arc::new(Mutex::new(SessionState::new()));
        let handle = Arc::new(SessionTransport {
            state: Arc::clone(&state),
            interceptor: Arc::clone(&interceptor),
            options: Arc::clone(&options),
            ids: Arc::clone(&ctx.ids),
        });
        Self {
            options,
            store: CassetteStore::new(ctx.fs),
            live: ctx.transport,
            interceptor,
            state,
            handle,
        }
    }

    /// Transport the code under test should send its requests through.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.handle) as Arc<dyn HttpTransport>
    }

    /// Starts a session against the given cassette file (relative to the
    /// configured cassette folder).
    ///
    /// Loads the cassette into the pending queue if it exists (replay mode),
    /// otherwise every request passes through live and is captured (record
    /// mode).
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette exists but cannot be read or parsed.
    ///
    /// # Panics
    ///
    /// Panics with `Inject Failure` if a session is already active.
    pub fn inject(&self, cassette_file: &str) -> Result<(), RecorderError> {
        {
            let mut state = self.state.lock().expect("session lock poisoned");
            assert!(!state.active, "Inject Failure");
            state.known_names.push(cassette_file.to_string());
            state.records.clear();
            state.pending.clear();
            state.expected.clear();
            state.out_of_order.clear();

            let path = self.options.cassette_folder.join(cassette_file);
            if self.store.exists(&path) {
                for (idx, disk) in self.store.read(&path)?.into_iter().enumerate() {
                    let wire_value = modifiers::apply(&disk, &self.options.modifiers);
                    let wire = CassetteEntry::from_value(&wire_value).map_err(|e| {
                        RecorderError::Store(format!(
                            "invalid cassette entry {idx} in {}: {e}",
                            path.display()
                        ))
                    })?;
                    state.records.push(disk.clone());
                    state.pending.push(PendingMock { idx, key: wire.key(), disk, wire });
                }
                state.mode = Mode::Replay;
                debug!(cassette = %path.display(), entries = state.pending.len(), "replaying cassette");
            } else {
                state.mode = Mode::Record;
                debug!(cassette = %path.display(), "no cassette present, recording");
            }
            state.cassette_path = Some(path);
            state.active = true;
        }
        self.interceptor.inject();
        Ok(())
    }

    /// Ends the session: restores the transport, resolves deferred record
    /// round-trips in queue order, persists the cassette per policy, and
    /// raises accumulated diagnostics under strict mode.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::OutOfOrder`] / [`RecorderError::Unmatched`]
    /// under strict mode, or a store error if persisting fails.
    ///
    /// # Panics
    ///
    /// Panics with `Release Failure` if no session is active.
    pub async fn release(&self) -> Result<(), RecorderError> {
        let actions = {
            let mut state = self.state.lock().expect("session lock poisoned");
            assert!(state.active, "Release Failure");
            state.active = false;
            std::mem::take(&mut state.expected)
        };
        self.interceptor.release();

        let mut resolved: Vec<Value> = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                CassetteAction::Resolved(entry) => resolved.push(entry),
                CassetteAction::Deferred(request) => {
                    let response = self.live.send(&request).await.map_err(|e| {
                        RecorderError::Store(format!("record healing round-trip failed: {e}"))
                    })?;
                    resolved.push(healing::record_heal_entry(
                        &request,
                        &response,
                        self.options.strip_headers,
                        &self.options.req_header_overwrite,
                    ));
                }
            }
        }

        let (path, mode, out_of_order, unmatched_keys, pending_disks) = {
            let mut state = self.state.lock().expect("session lock poisoned");
            state.expected =
                resolved.iter().cloned().map(CassetteAction::Resolved).collect();
            (
                state.cassette_path.clone().expect("cassette path set at inject"),
                state.mode,
                state.out_of_order.clone(),
                state.pending.iter().map(|m| m.key.clone()).collect::<Vec<_>>(),
                state.pending.iter().map(|m| m.disk.clone()).collect::<Vec<_>>(),
            )
        };

        match mode {
            Mode::Record => {
                self.store.write(&path, resolved, true)?;
            }
            Mode::Replay => {
                if self.options.heal.writes_enabled() {
                    let mut entries = resolved;
                    if !self.options.heal.flags().prune {
                        entries.extend(pending_disks);
                    }
                    let keep_order = out_of_order.is_empty() && unmatched_keys.is_empty();
                    self.store.write(&path, entries, keep_order)?;
                }
            }
        }

        if self.options.strict {
            if !out_of_order.is_empty() {
                return Err(RecorderError::OutOfOrder(out_of_order.join(" ")));
            }
            if !unmatched_keys.is_empty() {
                return Err(RecorderError::Unmatched(unmatched_keys.join(", ")));
            }
        }
        Ok(())
    }

    /// Verifies that every file in the cassette folder belongs to a cassette
    /// some session injected.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::UnexpectedFiles`] naming stray files.
    pub fn shutdown(&self) -> Result<(), RecorderError> {
        let known = {
            let state = self.state.lock().expect("session lock poisoned");
            state.known_names.clone()
        };
        self.store.shutdown(&self.options.cassette_folder, &known)
    }

    /// Snapshot of the session's diagnostics and produced entries.
    ///
    /// Deferred record actions appear in `expected_cassette` only once
    /// `release` has resolved them.
    #[must_use]
    pub fn report(&self) -> SessionReport {
        let state = self.state.lock().expect("session lock poisoned");
        SessionReport {
            records: state.records.clone(),
            out_of_order_errors: state.out_of_order.clone(),
            unmatched_recordings: state.pending.iter().map(|m| m.key.clone()).collect(),
            expected_cassette: state
                .expected
                .iter()
                .filter_map(|action| match action {
                    CassetteAction::Resolved(entry) => Some(entry.clone()),
                    CassetteAction::Deferred(_) => None,
                })
                .collect(),
            cassette_file_path: state.cassette_path.clone(),
        }
    }
}

/// How an observed request is handled, decided under the session lock.
enum Plan {
    /// No session is active; delegate to the real transport.
    Passthrough,
    /// Record mode: live round-trip, then capture.
    Live,
    /// Replay a matched recording.
    Replay(ReplayPlan),
    /// No recording matched; fail the in-flight call.
    NoMatch(String),
}

struct ReplayPlan {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    delay_connection: Option<u64>,
    delay_body: Option<u64>,
}

/// The transport handed to the code under test.
struct SessionTransport {
    state: Arc<Mutex<SessionState>>,
    interceptor: Arc<Interceptor>,
    options: Arc<RecorderOptions>,
    ids: Arc<dyn IdGenerator>,
}

impl SessionTransport {
    fn plan(&self, request: &TransportRequest) -> Plan {
        let mut state = self.state.lock().expect("session lock poisoned");
        if !state.active {
            return Plan::Passthrough;
        }
        self.interceptor.capture(request);
        match state.mode {
            Mode::Record => Plan::Live,
            Mode::Replay => {
                let flags = self.options.heal.flags();
                let found = matcher::find_match(
                    &mut state.pending,
                    request,
                    &flags,
                    &self.options.req_header_overwrite,
                );
                match found {
                    Some(pos) => {
                        if flags.response {
                            healing::heal_response(&mut state.pending[pos], request, &self.ids);
                        }
                        if flags.headers {
                            healing::heal_response_headers(&mut state.pending[pos]);
                        }
                        let mock = state.pending.remove(pos);
                        if pos != 0 {
                            debug!(key = %mock.key, "entry consumed out of order");
                            state.out_of_order.push(mock.key.clone());
                        }
                        let replay = ReplayPlan {
                            status: mock.wire.status,
                            headers: mock.wire.response_headers(),
                            body: mock.wire.response_body_bytes(),
                            delay_connection: mock.wire.delay_connection,
                            delay_body: mock.wire.delay_body,
                        };
                        state.expected.push(CassetteAction::Resolved(mock.disk));
                        Plan::Replay(replay)
                    }
                    None => {
                        let key = request.key();
                        if flags.record {
                            state.expected.push(CassetteAction::Deferred(request.clone()));
                        } else if flags.stub {
                            state.expected.push(CassetteAction::Resolved(healing::stub_entry(
                                request,
                                &self.options.req_header_overwrite,
                            )));
                        }
                        Plan::NoMatch(key)
                    }
                }
            }
        }
    }
}

impl HttpTransport for SessionTransport {
    fn send(&self, request: &TransportRequest) -> TransportFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            match self.plan(&request) {
                Plan::Passthrough => {
                    let inner = self.interceptor.inner();
                    inner.send(&request).await
                }
                Plan::Live => {
                    let inner = self.interceptor.inner();
                    let response = inner.send(&request).await?;
                    let entry = healing::record_mode_entry(
                        &request,
                        &response,
                        self.options.strip_headers,
                        &self.options.req_header_overwrite,
                    );
                    self.state
                        .lock()
                        .expect("session lock poisoned")
                        .expected
                        .push(CassetteAction::Resolved(entry));
                    Ok(response)
                }
                Plan::Replay(replay) => {
                    if let Some(ms) = replay.delay_connection {
                        sleep(Duration::from_millis(ms)).await;
                    }
                    if let Some(ms) = replay.delay_body {
                        sleep(Duration::from_millis(ms)).await;
                    }
                    Ok(TransportResponse {
                        status: replay.status,
                        raw_headers: replay.headers,
                        body: replay.body,
                    })
                }
                Plan::NoMatch(key) => Err(TransportError::NoMatch { key }),
            }
        })
    }
}
