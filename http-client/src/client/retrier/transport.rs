use super::{RetryDecision, RetryOptions, RetryPolicy, RetryResult};
use taskline_engine::{ErrorKind as EngineErrorKind, Request};

/// The default policy: resend on failures that plausibly clear up on their
/// own, give up on deterministic ones.
///
/// A URL that failed to parse or a body that overflowed the size limit will
/// fail identically on every attempt, so retrying those only wastes the
/// budget. Everything else is treated as transient, TLS handshakes included,
/// and so are error kinds the engine grows later.
#[derive(Copy, Clone, Debug, Default)]
pub struct TransportRetryPolicy;

impl RetryPolicy for TransportRetryPolicy {
    fn retry(&self, _request: &mut Request, opts: RetryOptions) -> RetryResult {
        return match opts.error().kind() {
            EngineErrorKind::InvalidUrl
            | EngineErrorKind::SizeLimitExceeded
            | EngineErrorKind::LocalIoError => RetryDecision::DontRetry,
            _ => RetryDecision::RetryRequest,
        }
        .into();
    }
}

#[cfg(test)]
mod tests {
    use super::{super::super::RetryStats, *};
    use std::error::Error;
    use taskline_engine::Error as EngineError;

    #[test]
    fn test_transport_policy_judges_by_error_kind() -> Result<(), Box<dyn Error>> {
        let policy = TransportRetryPolicy::default();
        let stats = RetryStats::new();
        let mut request = Request::builder()
            .url("http://www.example.test/".parse()?)
            .build();

        let transient = EngineError::new_with_msg(EngineErrorKind::ConnectError, "refused");
        assert_eq!(
            policy
                .retry(&mut request, RetryOptions::new(&transient, &stats))
                .decision(),
            RetryDecision::RetryRequest
        );

        let handshake = EngineError::new_with_msg(EngineErrorKind::TlsError, "handshake reset");
        assert_eq!(
            policy
                .retry(&mut request, RetryOptions::new(&handshake, &stats))
                .decision(),
            RetryDecision::RetryRequest
        );

        let deterministic =
            EngineError::new_with_msg(EngineErrorKind::SizeLimitExceeded, "response too large");
        assert_eq!(
            policy
                .retry(&mut request, RetryOptions::new(&deterministic, &stats))
                .decision(),
            RetryDecision::DontRetry
        );
        Ok(())
    }
}
