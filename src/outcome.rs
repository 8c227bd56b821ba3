use crate::CallError;

/// Terminal result of a full retry sequence.
#[must_use]
#[derive(Debug)]
pub enum CallOutcome<T> {
    Success(T),
    Failure(CallError),
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&CallError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<T, CallError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(err),
        }
    }

    pub fn map<U, F>(self, f: F) -> CallOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success(value) => CallOutcome::Success(f(value)),
            Self::Failure(err) => CallOutcome::Failure(err),
        }
    }

    /// Chains a fallible conversion of the success value, such as decoding.
    pub fn and_then<U, F>(self, f: F) -> CallOutcome<U>
    where
        F: FnOnce(T) -> Result<U, CallError>,
    {
        match self {
            Self::Success(value) => f(value).into(),
            Self::Failure(err) => CallOutcome::Failure(err),
        }
    }

    /// Degrades a failure to a fallback value.
    pub fn unwrap_or_else<F>(self, f: F) -> T
    where
        F: FnOnce(&CallError) -> T,
    {
        match self {
            Self::Success(value) => value,
            Self::Failure(err) => f(&err),
        }
    }
}

impl<T> From<Result<T, CallError>> for CallOutcome<T> {
    fn from(result: Result<T, CallError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}

impl<T> From<CallOutcome<T>> for Result<T, CallError> {
    fn from(outcome: CallOutcome<T>) -> Self {
        outcome.into_result()
    }
}
