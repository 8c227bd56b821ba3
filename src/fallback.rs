use tokio_util::sync::CancellationToken;

use crate::{CallError, CallOutcome, CallRequest, RawResponse, ResilientCaller, Transport};

impl ResilientCaller {
    /// Runs the full retry sequence against the request's own target, then
    /// against each of `fallbacks` in order, returning the first success.
    ///
    /// Cancellation stops the chain immediately. With no fallbacks the
    /// primary failure is returned unchanged; otherwise a failure of every
    /// endpoint yields [`CallError::EndpointsExhausted`].
    pub async fn call_with_fallback<T, S>(
        &self,
        transport: &T,
        request: &CallRequest,
        fallbacks: &[S],
        cancel: &CancellationToken,
    ) -> CallOutcome<RawResponse>
    where
        T: Transport + ?Sized,
        S: AsRef<str>,
    {
        let primary = self.call_with_cancel(transport, request, cancel).await;
        let mut last = match primary {
            CallOutcome::Success(response) => return CallOutcome::Success(response),
            CallOutcome::Failure(err @ CallError::Cancelled { .. }) => {
                return CallOutcome::Failure(err)
            }
            CallOutcome::Failure(err) => err,
        };

        if fallbacks.is_empty() {
            return CallOutcome::Failure(last);
        }

        let mut failed = request.target();
        for target in fallbacks {
            let target = target.as_ref();
            tracing::warn!(
                failed = %failed,
                next = %target,
                error = %last,
                "endpoint failed, falling back"
            );

            let attempt = request.with_target(target);
            last = match self.call_with_cancel(transport, &attempt, cancel).await {
                CallOutcome::Success(response) => return CallOutcome::Success(response),
                CallOutcome::Failure(err @ CallError::Cancelled { .. }) => {
                    return CallOutcome::Failure(err)
                }
                CallOutcome::Failure(err) => err,
            };
            failed = target;
        }

        CallOutcome::Failure(CallError::EndpointsExhausted {
            endpoints: fallbacks.len() + 1,
            last: Box::new(last),
        })
    }
}
