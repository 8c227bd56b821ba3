use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

use crate::{
    AttemptClass, AttemptError, AttemptRecord, AttemptSink, CallError, CallOutcome, CallRequest,
    RawResponse, RetryPolicy, Sleeper, TokioSleeper, TracingSink, Transport,
};

/// Runs external calls with bounded retries and exponential backoff.
///
/// Attempts are strictly sequential and the caller keeps no per-call state,
/// so one instance can be cloned or shared across tasks. There is no deadline
/// over the whole sequence: worst case a call takes
/// `max_attempts * attempt_timeout` plus [`RetryPolicy::total_backoff`].
#[derive(Clone)]
pub struct ResilientCaller {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    sink: Arc<dyn AttemptSink>,
}

impl fmt::Debug for ResilientCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientCaller")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for ResilientCaller {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl ResilientCaller {
    /// Creates a caller that sleeps on the tokio timer and logs via `tracing`.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the delay primitive.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Replaces the attempt record sink.
    pub fn with_sink(mut self, sink: impl AttemptSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `request` through `transport` until success, a non-retryable
    /// failure, or retry exhaustion.
    pub async fn call<T>(&self, transport: &T, request: &CallRequest) -> CallOutcome<RawResponse>
    where
        T: Transport + ?Sized,
    {
        self.call_with_cancel(transport, request, &CancellationToken::new())
            .await
    }

    /// Same as [`ResilientCaller::call`], stopping early with
    /// [`CallError::Cancelled`] once `cancel` fires.
    ///
    /// The token is checked before every attempt and before every sleep, and
    /// a pending sleep is cut short. An attempt already in flight runs to
    /// completion or to its timeout.
    pub async fn call_with_cancel<T>(
        &self,
        transport: &T,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> CallOutcome<RawResponse>
    where
        T: Transport + ?Sized,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0usize;

        loop {
            if cancel.is_cancelled() {
                return CallOutcome::Failure(CallError::Cancelled { attempts: attempt });
            }

            let started = Instant::now();
            let result = self.run_attempt(transport, request).await;
            let elapsed = started.elapsed();
            attempt += 1;

            let failure = match self.classify(result) {
                Ok(response) => {
                    let status = Some(response.status);
                    self.emit(request, attempt, elapsed, AttemptClass::Success, status, None);
                    return CallOutcome::Success(response);
                }
                Err(err) => err,
            };

            let status = failure.status();
            if !failure.is_retryable() {
                let class = AttemptClass::Fatal(failure.kind());
                self.emit(request, attempt, elapsed, class, status, None);
                return CallOutcome::Failure(failure);
            }

            let class = AttemptClass::Retryable(failure.kind());
            if attempt >= max_attempts {
                self.emit(request, attempt, elapsed, class, status, None);
                return CallOutcome::Failure(CallError::ExhaustedRetries {
                    attempts: attempt,
                    last: Box::new(failure),
                });
            }

            let delay = self.policy.delay_for(attempt - 1);
            self.emit(request, attempt, elapsed, class, status, Some(delay));

            if cancel.is_cancelled() {
                return CallOutcome::Failure(CallError::Cancelled { attempts: attempt });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return CallOutcome::Failure(CallError::Cancelled { attempts: attempt });
                }
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }

    async fn run_attempt<T>(
        &self,
        transport: &T,
        request: &CallRequest,
    ) -> Result<RawResponse, AttemptError>
    where
        T: Transport + ?Sized,
    {
        let budget = self.policy.attempt_timeout();
        match tokio::time::timeout(budget, transport.send(request, budget)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout),
        }
    }

    /// The retryable-status rule wins over the 2xx check, so a caller can mark
    /// a success status such as 202 as "not ready yet".
    fn classify(
        &self,
        result: Result<RawResponse, AttemptError>,
    ) -> Result<RawResponse, CallError> {
        match result {
            Ok(response) if self.policy.is_retryable_status(response.status) => {
                Err(CallError::Server {
                    status: response.status,
                    body: response.body,
                })
            }
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(CallError::Client {
                status: response.status,
                body: response.body,
            }),
            Err(AttemptError::Transport(err)) => Err(CallError::Transport(err)),
            Err(AttemptError::Timeout) => Err(CallError::Timeout(self.policy.attempt_timeout())),
            Err(AttemptError::Malformed(reason)) => Err(CallError::Malformed(reason)),
        }
    }

    fn emit(
        &self,
        request: &CallRequest,
        attempt: usize,
        elapsed: Duration,
        classification: AttemptClass,
        status: Option<u16>,
        next_delay: Option<Duration>,
    ) {
        self.sink.record(&AttemptRecord {
            attempt,
            max_attempts: self.policy.max_attempts(),
            target: request.target().to_owned(),
            elapsed,
            classification,
            status,
            next_delay,
        });
    }
}
