//! Interception capability over the HTTP transport seam.
//!
//! Only one interceptor may be active at a time process-wide: the recorder
//! holds global per-session state, and tests drive it serially. The atomic
//! guard turns accidental re-entrancy into an immediate contract failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::ports::http::{HttpTransport, TransportRequest};

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Serializes tests that exercise the process-wide interception guard.
#[cfg(test)]
pub(crate) fn serial_guard() -> std::sync::MutexGuard<'static, ()> {
    static GUARD: Mutex<()> = Mutex::new(());
    GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Captures every outbound request before it reaches the inner transport.
pub struct Interceptor {
    inner: Arc<dyn HttpTransport>,
    last: Mutex<Option<TransportRequest>>,
}

impl Interceptor {
    /// Creates an interceptor wrapping the given transport.
    #[must_use]
    pub fn new(inner: Arc<dyn HttpTransport>) -> Self {
        Self { inner, last: Mutex::new(None) }
    }

    /// Activates interception.
    ///
    /// # Panics
    ///
    /// Panics with `Inject Failure` if an interceptor is already active —
    /// a caller contract violation, not a recoverable condition.
    pub fn inject(&self) {
        assert!(!ACTIVE.swap(true, Ordering::SeqCst), "Inject Failure");
    }

    /// Deactivates interception and clears captured state.
    ///
    /// # Panics
    ///
    /// Panics with `Release Failure` if no interceptor is active.
    pub fn release(&self) {
        assert!(ACTIVE.swap(false, Ordering::SeqCst), "Release Failure");
        *self.last.lock().expect("interceptor lock poisoned") = None;
    }

    /// Records an outbound request as the most recently observed call.
    pub fn capture(&self, request: &TransportRequest) {
        *self.last.lock().expect("interceptor lock poisoned") = Some(request.clone());
    }

    /// Returns the most recently captured request, if any.
    #[must_use]
    pub fn get_last(&self) -> Option<TransportRequest> {
        self.last.lock().expect("interceptor lock poisoned").clone()
    }

    /// The wrapped transport, for live round-trips that bypass matching.
    #[must_use]
    pub fn inner(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.inner)
    }
}
