use std::{fmt, time::Duration};

use crate::FailureKind;

/// How a single attempt ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttemptClass {
    Success,
    /// Failed, and the policy permits another attempt for this kind.
    Retryable(FailureKind),
    /// Failed in a way that ends the call immediately.
    Fatal(FailureKind),
}

impl fmt::Display for AttemptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Retryable(kind) => write!(f, "retryable:{}", kind.as_str()),
            Self::Fatal(kind) => write!(f, "fatal:{}", kind.as_str()),
        }
    }
}

/// Diagnostic record emitted once per attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: usize,
    pub max_attempts: usize,
    pub target: String,
    pub elapsed: Duration,
    pub classification: AttemptClass,
    pub status: Option<u16>,
    /// Backoff that follows this attempt, if another one is scheduled.
    pub next_delay: Option<Duration>,
}

/// Receives attempt records.
pub trait AttemptSink: Send + Sync {
    fn record(&self, record: &AttemptRecord);
}

/// Emits attempt records as `tracing` events.
///
/// Successes log at `debug`, retryable failures at `warn`, fatal failures at
/// `error`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl AttemptSink for TracingSink {
    fn record(&self, record: &AttemptRecord) {
        let elapsed_ms = millis(record.elapsed);
        let delay_ms = record.next_delay.map(millis);
        let classification = record.classification.to_string();

        match record.classification {
            AttemptClass::Success => tracing::debug!(
                attempt = record.attempt,
                max_attempts = record.max_attempts,
                target = %record.target,
                elapsed_ms,
                status = record.status,
                classification = %classification,
                "attempt succeeded"
            ),
            AttemptClass::Retryable(_) => tracing::warn!(
                attempt = record.attempt,
                max_attempts = record.max_attempts,
                target = %record.target,
                elapsed_ms,
                status = record.status,
                delay_ms,
                classification = %classification,
                "attempt failed"
            ),
            AttemptClass::Fatal(_) => tracing::error!(
                attempt = record.attempt,
                max_attempts = record.max_attempts,
                target = %record.target,
                elapsed_ms,
                status = record.status,
                classification = %classification,
                "attempt failed, not retrying"
            ),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
