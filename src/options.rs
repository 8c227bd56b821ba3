use serde::Deserialize;

use crate::ConfigError;

/// Plain-data retry configuration, convertible into a [`crate::RetryPolicy`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor applied to the delay after every retry.
    pub backoff_multiplier: f64,
    /// Per-attempt timeout in milliseconds.
    pub attempt_timeout_ms: u64,
    /// Optional ceiling for a single backoff delay in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Response statuses treated as retryable server errors.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            attempt_timeout_ms: 30_000,
            max_delay_ms: None,
            retryable_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

const MAX_ATTEMPTS_VAR: &str = "RETRY_MAX_ATTEMPTS";
const BASE_DELAY_VAR: &str = "RETRY_BASE_DELAY_MS";
const MULTIPLIER_VAR: &str = "RETRY_BACKOFF_MULTIPLIER";
const ATTEMPT_TIMEOUT_VAR: &str = "RETRY_ATTEMPT_TIMEOUT_MS";
const MAX_DELAY_VAR: &str = "RETRY_MAX_DELAY_MS";
const STATUSES_VAR: &str = "RETRY_STATUSES";

impl RetryOptions {
    /// Parses options from a JSON object. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from the environment, falling back to defaults.
    ///
    /// Recognised variables:
    /// - `RETRY_MAX_ATTEMPTS`
    /// - `RETRY_BASE_DELAY_MS`
    /// - `RETRY_BACKOFF_MULTIPLIER`
    /// - `RETRY_ATTEMPT_TIMEOUT_MS`
    /// - `RETRY_MAX_DELAY_MS`
    /// - `RETRY_STATUSES` (comma-separated, e.g. `500,503`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(value) = non_empty(&lookup, MAX_ATTEMPTS_VAR) {
            options.max_attempts = parse_var(MAX_ATTEMPTS_VAR, &value)?;
        }
        if let Some(value) = non_empty(&lookup, BASE_DELAY_VAR) {
            options.base_delay_ms = parse_var(BASE_DELAY_VAR, &value)?;
        }
        if let Some(value) = non_empty(&lookup, MULTIPLIER_VAR) {
            options.backoff_multiplier = parse_var(MULTIPLIER_VAR, &value)?;
        }
        if let Some(value) = non_empty(&lookup, ATTEMPT_TIMEOUT_VAR) {
            options.attempt_timeout_ms = parse_var(ATTEMPT_TIMEOUT_VAR, &value)?;
        }
        if let Some(value) = non_empty(&lookup, MAX_DELAY_VAR) {
            options.max_delay_ms = Some(parse_var(MAX_DELAY_VAR, &value)?);
        }
        if let Some(value) = non_empty(&lookup, STATUSES_VAR) {
            options.retryable_statuses = value
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| parse_var(STATUSES_VAR, part))
                .collect::<Result<Vec<u16>, _>>()?;
        }

        options.validate()?;
        Ok(options)
    }

    /// Checks the invariants a [`crate::RetryPolicy`] relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.backoff_multiplier));
        }
        Ok(())
    }
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        name: name.to_owned(),
        reason: format!("'{value}': {err}"),
    })
}
