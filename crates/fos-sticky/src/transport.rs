//! Message transport to the settings service

use crate::config::RetryPolicy;
use crate::error::{Result, StickyError};
use crate::messages::{Request, Response};
use std::future::Future;
use tracing::{debug, error, warn};

/// Request/response channel to the service
pub trait ServiceChannel {
    /// Deliver one request. `Err(StickyError::Disconnected)` means the
    /// service was not listening and the send may be retried.
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response>>;
}

/// Send with a bounded number of retries on disconnection. Other errors
/// are returned at once.
pub async fn send_with_retry<C: ServiceChannel>(
    channel: &C,
    request: &Request,
    policy: &RetryPolicy,
) -> Result<Response> {
    for attempt in 1..=policy.attempts {
        debug!("Sending {} (attempt {})", request.name(), attempt);
        match channel.send(request).await {
            Ok(response) => return Ok(response),
            Err(StickyError::Disconnected) if attempt < policy.attempts => {
                warn!("Service not listening for {}, retrying in {:?}", request.name(), policy.delay());
                smol::Timer::after(policy.delay()).await;
            }
            Err(StickyError::Disconnected) => break,
            Err(e) => return Err(e),
        }
    }
    error!("Giving up on {} after {} attempts", request.name(), policy.attempts);
    Err(StickyError::ServiceUnavailable { attempts: policy.attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Location;
    use std::cell::Cell;

    /// Fails with `Disconnected` a fixed number of times
    struct Flaky {
        failures: Cell<u32>,
        calls: Cell<u32>,
    }

    impl ServiceChannel for Flaky {
        async fn send(&self, _: &Request) -> Result<Response> {
            self.calls.set(self.calls.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(StickyError::Disconnected);
            }
            Ok(Response::AcceptedSettings)
        }
    }

    fn request() -> Request {
        Request::GetSettings { location: Location::from_url("https://example.com/") }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy { attempts: 3, delay_ms: 1 }
    }

    #[test]
    fn test_retries_until_success() {
        let channel = Flaky { failures: Cell::new(2), calls: Cell::new(0) };
        let response = smol::block_on(send_with_retry(&channel, &request(), &quick())).unwrap();
        assert_eq!(response, Response::AcceptedSettings);
        assert_eq!(channel.calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let channel = Flaky { failures: Cell::new(10), calls: Cell::new(0) };
        let err = smol::block_on(send_with_retry(&channel, &request(), &quick())).unwrap_err();
        assert!(matches!(err, StickyError::ServiceUnavailable { attempts: 3 }));
        assert_eq!(channel.calls.get(), 3);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        struct Broken;
        impl ServiceChannel for Broken {
            async fn send(&self, _: &Request) -> Result<Response> {
                Err(StickyError::Transport("closed".into()))
            }
        }
        let err = smol::block_on(send_with_retry(&Broken, &request(), &quick())).unwrap_err();
        assert!(matches!(err, StickyError::Transport(_)));
    }
}
