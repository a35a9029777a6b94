//! The request-recorder engine: session lifecycle, matching, and healing.

pub mod healing;
pub mod interceptor;
pub mod matcher;
pub mod modifiers;
pub mod session;
pub mod sqs;

pub use interceptor::Interceptor;
pub use session::{RecorderContext, RequestRecorder, SessionReport};
