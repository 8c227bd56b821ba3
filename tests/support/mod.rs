#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use resilient_call::{
    AttemptError, AttemptRecord, AttemptSink, CallRequest, RawResponse, Sleeper, Transport,
};
use tokio_util::sync::CancellationToken;

/// One scripted attempt result.
pub enum Step {
    Status(u16, &'static str),
    Transport,
    Timeout,
    Malformed,
}

/// Transport that replays a fixed script and counts attempts.
///
/// Once the script runs out every further attempt answers 500.
#[derive(Clone)]
pub struct ScriptedTransport {
    steps: Arc<Mutex<VecDeque<Step>>>,
    attempts: Arc<AtomicUsize>,
    targets: Arc<Mutex<Vec<String>>>,
    cancel_on_attempt: Option<(usize, CancellationToken)>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            attempts: Arc::new(AtomicUsize::new(0)),
            targets: Arc::new(Mutex::new(Vec::new())),
            cancel_on_attempt: None,
        }
    }

    /// Every attempt answers 500.
    pub fn failing() -> Self {
        Self::new(std::iter::empty())
    }

    /// Fires `token` while serving the given 1-based attempt.
    pub fn cancelling_on(mut self, attempt: usize, token: CancellationToken) -> Self {
        self.cancel_on_attempt = Some((attempt, token));
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets
            .lock()
            .expect("targets mutex must not be poisoned")
            .clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &CallRequest,
        _timeout: Duration,
    ) -> Result<RawResponse, AttemptError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.targets
            .lock()
            .expect("targets mutex must not be poisoned")
            .push(request.target().to_owned());

        if let Some((at, token)) = &self.cancel_on_attempt {
            if *at == attempt {
                token.cancel();
            }
        }

        let step = self
            .steps
            .lock()
            .expect("script mutex must not be poisoned")
            .pop_front();

        match step {
            Some(Step::Status(status, body)) => Ok(RawResponse::new(status, body)),
            Some(Step::Transport) => Err(AttemptError::transport("connection reset by peer")),
            Some(Step::Timeout) => Err(AttemptError::Timeout),
            Some(Step::Malformed) => Err(AttemptError::malformed("invalid header value")),
            None => Ok(RawResponse::new(500, "script exhausted")),
        }
    }
}

/// Sleeper that records requested delays without waiting.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .expect("delay mutex must not be poisoned")
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .expect("delay mutex must not be poisoned")
            .push(duration);
    }
}

/// Sink that keeps every attempt record.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<AttemptRecord>>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records
            .lock()
            .expect("record mutex must not be poisoned")
            .clone()
    }
}

impl AttemptSink for RecordingSink {
    fn record(&self, record: &AttemptRecord) {
        self.records
            .lock()
            .expect("record mutex must not be poisoned")
            .push(record.clone());
    }
}
