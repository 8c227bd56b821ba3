use std::{fmt, future::Future, time::Duration};

use async_trait::async_trait;

use crate::{AttemptError, CallRequest, RawResponse};

/// Performs one attempt of an external call.
///
/// Implementations should honour `timeout` where the underlying client
/// supports it; the caller enforces it as well.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &CallRequest,
        timeout: Duration,
    ) -> Result<RawResponse, AttemptError>;
}

#[async_trait]
impl<T> Transport for &T
where
    T: Transport + ?Sized,
{
    async fn send(
        &self,
        request: &CallRequest,
        timeout: Duration,
    ) -> Result<RawResponse, AttemptError> {
        (**self).send(request, timeout).await
    }
}

/// Transport backed by a closure. See [`from_fn`].
#[derive(Clone)]
pub struct FnTransport<F> {
    attempt: F,
}

impl<F> fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransport").finish_non_exhaustive()
    }
}

/// Wraps a single-shot attempt function as a [`Transport`].
///
/// The returned future must not borrow the request; clone what it needs.
///
/// ```no_run
/// use resilient_call::{transport, AttemptError, RawResponse};
///
/// let echo = transport::from_fn(|request, _timeout| {
///     let target = request.target().to_owned();
///     async move { Ok::<_, AttemptError>(RawResponse::new(200, target)) }
/// });
/// ```
pub fn from_fn<F, Fut>(attempt: F) -> FnTransport<F>
where
    F: Fn(&CallRequest, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RawResponse, AttemptError>> + Send + 'static,
{
    FnTransport { attempt }
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(&CallRequest, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RawResponse, AttemptError>> + Send + 'static,
{
    async fn send(
        &self,
        request: &CallRequest,
        timeout: Duration,
    ) -> Result<RawResponse, AttemptError> {
        (self.attempt)(request, timeout).await
    }
}
