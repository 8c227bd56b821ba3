use std::{fmt, sync::Arc, time::Duration};

use crate::{ConfigError, RetryOptions};

type StatusFn = dyn Fn(u16) -> bool + Send + Sync;

/// Decides which response statuses count as retryable server errors.
///
/// Built from a set of explicit statuses plus an optional custom check. A
/// status is retryable when either matches.
#[derive(Clone, Default)]
pub struct StatusPredicate {
    statuses: Vec<u16>,
    custom: Option<Arc<StatusFn>>,
}

impl StatusPredicate {
    /// Treats no status as retryable; only transport faults and timeouts retry.
    pub fn none() -> Self {
        Self::default()
    }

    /// Treats exactly the given statuses as retryable.
    pub fn statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            custom: None,
        }
    }

    /// Treats every 5xx status as retryable.
    pub fn server_errors() -> Self {
        Self::from_fn(|status| (500..600).contains(&status))
    }

    /// Uses a caller-supplied check.
    pub fn from_fn<F>(check: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        Self {
            statuses: Vec::new(),
            custom: Some(Arc::new(check)),
        }
    }

    /// Adds one more retryable status on top of the current rules.
    pub fn with_status(mut self, status: u16) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.statuses.contains(&status) || self.custom.as_ref().is_some_and(|check| check(status))
    }
}

impl fmt::Debug for StatusPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusPredicate")
            .field("statuses", &self.statuses)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Immutable retry configuration shared by every call of a
/// [`crate::ResilientCaller`].
///
/// With `max_attempts = N` a call performs at most N attempts and sleeps at
/// most N-1 times. The delay after failed attempt `i` (0-based) is
/// `base_delay * backoff_multiplier^i`, clamped to `max_delay` when set.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
    backoff_multiplier: f64,
    attempt_timeout: Duration,
    max_delay: Option<Duration>,
    retryable_status: StatusPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let options = RetryOptions::default();
        Self {
            max_attempts: options.max_attempts,
            base_delay: Duration::from_millis(options.base_delay_ms),
            backoff_multiplier: options.backoff_multiplier,
            attempt_timeout: Duration::from_millis(options.attempt_timeout_ms),
            max_delay: None,
            retryable_status: StatusPredicate::statuses(options.retryable_statuses),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default per-attempt timeout and status set.
    pub fn new(
        max_attempts: usize,
        base_delay: Duration,
        backoff_multiplier: f64,
    ) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(backoff_multiplier));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            backoff_multiplier,
            ..Self::default()
        })
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the per-attempt time budget.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Caps every individual backoff delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Replaces the retryable-status predicate.
    pub fn with_retryable_status(mut self, predicate: StatusPredicate) -> Self {
        self.retryable_status = predicate;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status.is_retryable(status)
    }

    /// Backoff to wait after the failed attempt with 0-based index `retry`.
    pub fn delay_for(&self, retry: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        let nanos = self.base_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exp);
        let delay = if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos.round() as u64)
        } else {
            Duration::MAX
        };
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Sum of every backoff delay a fully failing call sleeps through.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|retry| self.delay_for(retry))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl TryFrom<&RetryOptions> for RetryPolicy {
    type Error = ConfigError;

    fn try_from(options: &RetryOptions) -> Result<Self, Self::Error> {
        options.validate()?;
        let policy = Self::new(
            options.max_attempts,
            Duration::from_millis(options.base_delay_ms),
            options.backoff_multiplier,
        )?
        .with_attempt_timeout(Duration::from_millis(options.attempt_timeout_ms))
        .with_retryable_status(StatusPredicate::statuses(
            options.retryable_statuses.iter().copied(),
        ));

        Ok(match options.max_delay_ms {
            Some(ms) => policy.with_max_delay(Duration::from_millis(ms)),
            None => policy,
        })
    }
}

impl TryFrom<RetryOptions> for RetryPolicy {
    type Error = ConfigError;

    fn try_from(options: RetryOptions) -> Result<Self, Self::Error> {
        Self::try_from(&options)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{ConfigError, RetryOptions, RetryPolicy, StatusPredicate};

    #[test]
    fn delays_grow_geometrically() {
        let policy = RetryPolicy::new(4, Duration::from_secs(1), 2.0).expect("valid policy");
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.total_backoff(), Duration::from_secs(7));
    }

    #[test]
    fn fractional_multiplier() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 1.5).expect("valid policy");
        assert_eq!(policy.delay_for(1), Duration::from_millis(150));
    }

    #[test]
    fn zero_base_delay_is_immediate() {
        let policy = RetryPolicy::new(5, Duration::ZERO, 3.0).expect("valid policy");
        assert_eq!(policy.delay_for(3), Duration::ZERO);
        assert_eq!(policy.total_backoff(), Duration::ZERO);
    }

    #[test]
    fn max_delay_caps_each_sleep() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), 2.0)
            .expect("valid policy")
            .with_max_delay(Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(60), Duration::from_secs(5));
    }

    #[test]
    fn huge_exponent_saturates() {
        let policy = RetryPolicy::new(2, Duration::from_secs(1), 10.0).expect("valid policy");
        assert_eq!(policy.delay_for(usize::MAX), Duration::MAX);
    }

    #[test]
    fn single_attempt_has_no_backoff() {
        assert_eq!(RetryPolicy::no_retry().total_backoff(), Duration::ZERO);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            RetryPolicy::new(0, Duration::ZERO, 2.0),
            Err(ConfigError::ZeroAttempts)
        ));
        assert!(matches!(
            RetryPolicy::new(1, Duration::ZERO, 0.9),
            Err(ConfigError::InvalidMultiplier(_))
        ));
        assert!(matches!(
            RetryPolicy::new(1, Duration::ZERO, f64::NAN),
            Err(ConfigError::InvalidMultiplier(_))
        ));
    }

    #[test]
    fn none_predicate_plus_single_status() {
        let predicate = StatusPredicate::none().with_status(500);
        assert!(predicate.is_retryable(500));
        assert!(!predicate.is_retryable(502));
        assert!(!predicate.is_retryable(404));
    }

    #[test]
    fn custom_predicate_combines_with_statuses() {
        let predicate = StatusPredicate::from_fn(|status| status == 418).with_status(503);
        assert!(predicate.is_retryable(418));
        assert!(predicate.is_retryable(503));
        assert!(!predicate.is_retryable(500));
        assert!(StatusPredicate::server_errors().is_retryable(599));
    }

    #[test]
    fn policy_from_options() {
        let options = RetryOptions {
            max_attempts: 4,
            base_delay_ms: 250,
            backoff_multiplier: 2.0,
            attempt_timeout_ms: 1_000,
            max_delay_ms: Some(600),
            retryable_statuses: vec![500],
        };
        let policy = RetryPolicy::try_from(&options).expect("valid options");

        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.attempt_timeout(), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(600));
        assert!(policy.is_retryable_status(500));
        assert!(!policy.is_retryable_status(503));
    }
}
