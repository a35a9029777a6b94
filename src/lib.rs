//! HTTP cassette record, replay, and healing engine for deterministic
//! test suites.
//!
//! The code under test performs HTTP through the [`ports::HttpTransport`]
//! seam. A [`RequestRecorder`] session intercepts every call, replays
//! matching entries from a JSON cassette, and — under the configured
//! [`options::HealSetting`] — heals stale entries against live traffic
//! instead of failing the test.
//!
//! ```no_run
//! use tapedeck::{RecorderOptions, RequestRecorder};
//!
//! # async fn run() -> Result<(), tapedeck::RecorderError> {
//! let recorder = RequestRecorder::new(RecorderOptions::new("tests/__cassettes"));
//! recorder.inject("my_test_recording.json")?;
//! let transport = recorder.transport();
//! // ... drive the code under test with `transport` ...
//! recorder.release().await?;
//! recorder.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cassette;
pub mod error;
pub mod options;
pub mod ports;
pub mod recorder;
pub mod util;

pub use cassette::{CassetteEntry, CassetteStore};
pub use error::{RecorderError, TransportError};
pub use options::{
    HealFlags, HealSetting, ModifierFn, ModifierMap, OverwriteMap, OverwriteRule, RecorderOptions,
};
pub use recorder::{RecorderContext, RequestRecorder, SessionReport};
