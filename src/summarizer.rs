use std::{fmt, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    wire::{CompletionOptions, CompletionRequest, CompletionResponse, Message, Role},
    CallError, CallOutcome, CallRequest, ConfigError, HttpTransport, ResilientCaller,
    RetryPolicy, StatusPredicate, Transport,
};

/// Returned by [`Summarizer::summarize_or_sentinel`] when no summary could be
/// produced.
pub const SUMMARY_UNAVAILABLE: &str = "summary unavailable: upstream call failed";

/// Public foundation-models completion endpoint.
pub const DEFAULT_COMPLETION_ENDPOINT: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional editor. Write a short summary of the text.\n\
Format: a single paragraph of 4-6 sentences.\n\
Keep only the key ideas and leave out examples.";

const API_KEY_VAR: &str = "SUMMARIZER_API_KEY";
const FOLDER_ID_VAR: &str = "SUMMARIZER_FOLDER_ID";
const ENDPOINT_VAR: &str = "SUMMARIZER_ENDPOINT";
const FALLBACK_ENDPOINTS_VAR: &str = "SUMMARIZER_FALLBACK_ENDPOINTS";

/// Connection and prompt settings for [`Summarizer`].
#[derive(Clone)]
pub struct SummarizerConfig {
    api_key: String,
    folder_id: String,
    pub endpoint: String,
    /// Tried in order after `endpoint` has exhausted its retries.
    pub fallback_endpoints: Vec<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Input beyond this many characters is dropped before sending.
    pub max_input_chars: usize,
    pub system_prompt: String,
}

impl fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("api_key", &"<redacted>")
            .field("folder_id", &self.folder_id)
            .field("endpoint", &self.endpoint)
            .field("fallback_endpoints", &self.fallback_endpoints)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_input_chars", &self.max_input_chars)
            .finish()
    }
}

impl SummarizerConfig {
    /// Validates credentials and fills every other setting with defaults.
    ///
    /// The folder id must start with `b1g` and be exactly 20 characters.
    pub fn new(api_key: impl Into<String>, folder_id: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into().trim().to_owned();
        let folder_id = folder_id.into().trim().to_owned();

        if api_key.is_empty() {
            return Err(ConfigError::EmptyVar(API_KEY_VAR.to_owned()));
        }
        if folder_id.chars().count() != 20 || !folder_id.starts_with("b1g") {
            return Err(ConfigError::InvalidFolderId(folder_id));
        }

        Ok(Self {
            api_key,
            folder_id,
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_owned(),
            fallback_endpoints: Vec::new(),
            model: "yandexgpt-lite".to_owned(),
            temperature: 0.3,
            max_tokens: 1_000,
            max_input_chars: 5_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
        })
    }

    /// Reads configuration from environment variables.
    ///
    /// Reads:
    /// - `SUMMARIZER_API_KEY`: API key, required
    /// - `SUMMARIZER_FOLDER_ID`: cloud folder id, required
    /// - `SUMMARIZER_ENDPOINT`: completion URL, optional
    /// - `SUMMARIZER_FALLBACK_ENDPOINTS`: comma-separated URLs, optional
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String, ConfigError> {
            let value = lookup(name).ok_or_else(|| ConfigError::MissingVar(name.to_owned()))?;
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyVar(name.to_owned()));
            }
            Ok(value)
        };

        let mut config = Self::new(required(API_KEY_VAR)?, required(FOLDER_ID_VAR)?)?;

        if let Some(endpoint) = lookup(ENDPOINT_VAR).filter(|value| !value.trim().is_empty()) {
            config.endpoint = endpoint.trim().to_owned();
        }
        if let Some(list) = lookup(FALLBACK_ENDPOINTS_VAR) {
            config.fallback_endpoints = list
                .split(',')
                .map(str::trim)
                .filter(|endpoint| !endpoint.is_empty())
                .map(str::to_owned)
                .collect();
        }
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_fallback_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn model_uri(&self) -> String {
        format!("gpt://{}/{}", self.folder_id, self.model)
    }
}

/// Retry policy the summarizer uses unless told otherwise: three attempts,
/// 1 s doubling backoff, 30 s per attempt, HTTP 500 retried.
pub fn default_summarizer_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_attempt_timeout(Duration::from_secs(30))
        .with_retryable_status(StatusPredicate::none().with_status(500))
}

/// Completion-API client that condenses text into a one-paragraph summary.
#[derive(Clone, Debug)]
pub struct Summarizer<T = HttpTransport> {
    config: SummarizerConfig,
    caller: ResilientCaller,
    transport: T,
}

impl Summarizer<HttpTransport> {
    pub fn new(config: SummarizerConfig) -> Self {
        Self::with_transport(config, HttpTransport::new())
    }

    /// Builds a summarizer from `SUMMARIZER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(SummarizerConfig::from_env()?))
    }
}

impl<T: Transport> Summarizer<T> {
    pub fn with_transport(config: SummarizerConfig, transport: T) -> Self {
        Self {
            config,
            caller: ResilientCaller::new(default_summarizer_policy()),
            transport,
        }
    }

    /// Replaces the retry caller, e.g. to change policy or sink.
    pub fn with_caller(mut self, caller: ResilientCaller) -> Self {
        self.caller = caller;
        self
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarizes `text`, reporting how the call ended.
    ///
    /// Blank input fails with [`CallError::Malformed`] without any request.
    pub async fn summarize(&self, text: &str) -> CallOutcome<String> {
        self.summarize_with_cancel(text, &CancellationToken::new())
            .await
    }

    pub async fn summarize_with_cancel(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> CallOutcome<String> {
        let request = match self.build_request(text) {
            Ok(request) => request,
            Err(err) => return CallOutcome::Failure(err),
        };

        self.caller
            .call_with_fallback(
                &self.transport,
                &request,
                self.config.fallback_endpoints.as_slice(),
                cancel,
            )
            .await
            .and_then(|response| response.json::<CompletionResponse>())
            .and_then(extract_summary)
    }

    /// Summarizes `text`, degrading any failure to [`SUMMARY_UNAVAILABLE`].
    pub async fn summarize_or_sentinel(&self, text: &str) -> String {
        self.summarize(text).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "summary unavailable");
            SUMMARY_UNAVAILABLE.to_owned()
        })
    }

    fn build_request(&self, text: &str) -> Result<CallRequest, CallError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CallError::Malformed("input text is empty".to_owned()));
        }

        let payload = CompletionRequest {
            model_uri: self.config.model_uri(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            },
            messages: vec![
                Message {
                    role: Role::System,
                    text: self.config.system_prompt.clone(),
                },
                Message {
                    role: Role::User,
                    text: format!(
                        "Text to process:\n\n{}",
                        truncate_chars(text, self.config.max_input_chars)
                    ),
                },
            ],
        };

        CallRequest::post(&self.config.endpoint)
            .header("Authorization", format!("Api-Key {}", self.config.api_key))
            .header("x-folder-id", &self.config.folder_id)
            .json(&payload)
    }
}

fn extract_summary(response: CompletionResponse) -> Result<String, CallError> {
    let summary = response
        .result
        .alternatives
        .into_iter()
        .next()
        .map(|alternative| alternative.message.text.trim().to_owned())
        .ok_or_else(|| CallError::Malformed("completion returned no alternatives".to_owned()))?;

    if summary.is_empty() {
        return Err(CallError::Malformed("completion returned empty text".to_owned()));
    }
    Ok(summary)
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
