use std::time::Duration;

/// Boxed source error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failure reason of a call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Connectivity, DNS or socket-level failure. Retryable.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// Attempt exceeded its per-attempt budget. Retryable.
    #[error("attempt timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
    /// Response status inside the policy's retryable set.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    /// Response status outside the policy's retryable set.
    #[error("client error {status}: {body}")]
    Client { status: u16, body: String },
    /// Request could not be built or response could not be decoded.
    #[error("malformed call: {0}")]
    Malformed(String),
    /// Every attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    ExhaustedRetries {
        /// Number of attempts performed.
        attempts: usize,
        /// Failure of the final attempt.
        last: Box<CallError>,
    },
    /// Caller requested early termination.
    #[error("call cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Number of attempts performed before cancellation was observed.
        attempts: usize,
    },
    /// Every endpoint in a fallback chain failed.
    #[error("all {endpoints} endpoints failed, last: {last}")]
    EndpointsExhausted {
        /// Number of endpoints tried.
        endpoints: usize,
        /// Failure reported for the final endpoint.
        last: Box<CallError>,
    },
}

impl CallError {
    /// Returns `true` if another attempt is permitted after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::Server { .. }
        )
    }

    /// Classification used in attempt records.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Server { .. } => FailureKind::Server,
            Self::Client { .. } => FailureKind::Client,
            Self::Malformed(_) => FailureKind::Malformed,
            Self::ExhaustedRetries { .. } => FailureKind::ExhaustedRetries,
            Self::Cancelled { .. } => FailureKind::Cancelled,
            Self::EndpointsExhausted { .. } => FailureKind::EndpointsExhausted,
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::ExhaustedRetries { last, .. } | Self::EndpointsExhausted { last, .. } => {
                last.status()
            }
            _ => None,
        }
    }
}

/// Flat classification of a [`CallError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FailureKind {
    Transport,
    Timeout,
    Server,
    Client,
    Malformed,
    ExhaustedRetries,
    Cancelled,
    EndpointsExhausted,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Server => "server",
            Self::Client => "client",
            Self::Malformed => "malformed",
            Self::ExhaustedRetries => "exhausted_retries",
            Self::Cancelled => "cancelled",
            Self::EndpointsExhausted => "endpoints_exhausted",
        }
    }
}

/// Fault raised by a single transport attempt, before classification.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// Connectivity or I/O failure.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// The transport gave up waiting for a response.
    #[error("attempt timed out")]
    Timeout,
    /// Request could not be built or response could not be read.
    #[error("malformed: {0}")]
    Malformed(String),
}

impl AttemptError {
    /// Wraps any error as a transport failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Transport(err.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

/// Invalid configuration for a policy or a client.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("backoff multiplier must be finite and >= 1.0, got {0}")]
    InvalidMultiplier(f64),
    #[error("missing {0} environment variable")]
    MissingVar(String),
    #[error("{0} is set but empty")]
    EmptyVar(String),
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("invalid folder id '{0}': must start with 'b1g' and be 20 characters long")]
    InvalidFolderId(String),
    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}
