//! `resilient-call` runs external calls with bounded retries, exponential
//! backoff and endpoint fallback, and reports every ending as a value.
//!
//! - [`ResilientCaller::call`] retries one request under a [`RetryPolicy`]
//! - [`ResilientCaller::call_with_fallback`] walks a list of endpoints
//! - [`HttpTransport`] sends requests with `reqwest`
//! - [`Summarizer`] is a completion-API client built on the above
//!
//! No failure escapes as a panic or a propagated error: every call ends in a
//! [`CallOutcome`].

mod caller;
mod error;
mod fallback;
mod http;
mod observe;
mod options;
mod outcome;
mod policy;
mod request;
mod sleep;
mod summarizer;
pub mod transport;
mod wire;

pub use caller::ResilientCaller;
pub use error::{AttemptError, BoxError, CallError, ConfigError, FailureKind};
pub use http::HttpTransport;
pub use observe::{AttemptClass, AttemptRecord, AttemptSink, TracingSink};
pub use options::RetryOptions;
pub use outcome::CallOutcome;
pub use policy::{RetryPolicy, StatusPredicate};
pub use request::{CallRequest, RawResponse};
pub use sleep::{Sleeper, TokioSleeper};
pub use summarizer::{
    default_summarizer_policy, Summarizer, SummarizerConfig, DEFAULT_COMPLETION_ENDPOINT,
    SUMMARY_UNAVAILABLE,
};
pub use transport::{FnTransport, Transport};

pub type Result<T> = std::result::Result<T, CallError>;
