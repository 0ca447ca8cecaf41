use super::{RetryDecision, RetryOptions, RetryPolicy, RetryResult};
use taskline_engine::Request;

/// Never retries, whatever failed.
#[derive(Copy, Clone, Debug, Default)]
pub struct NeverRetryPolicy;

impl RetryPolicy for NeverRetryPolicy {
    #[inline]
    fn retry(&self, _request: &mut Request, _opts: RetryOptions) -> RetryResult {
        RetryDecision::DontRetry.into()
    }
}

#[cfg(test)]
mod tests {
    use super::{super::super::RetryStats, *};
    use std::error::Error;
    use taskline_engine::{Error as EngineError, ErrorKind as EngineErrorKind};

    #[test]
    fn test_never_is_never() -> Result<(), Box<dyn Error>> {
        let policy = NeverRetryPolicy::default();
        let stats = RetryStats::new();
        let mut request = Request::builder()
            .url("http://www.example.test/".parse()?)
            .build();
        let err = EngineError::new_with_msg(EngineErrorKind::ConnectError, "refused");

        assert_eq!(
            policy
                .retry(&mut request, RetryOptions::new(&err, &stats))
                .decision(),
            RetryDecision::DontRetry
        );
        Ok(())
    }
}
