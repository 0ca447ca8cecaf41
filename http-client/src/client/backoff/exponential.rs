use super::{Backoff, BackoffOptions, GotBackoffDuration};
use std::time::Duration;
use taskline_engine::Request;

/// Delay that multiplies with every further retry on the same hop.
///
/// The first retry waits `base_delay`, each one after that multiplies the
/// previous wait by `base_number`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExponentialBackoff {
    base_number: u32,
    base_delay: Duration,
}

const DEFAULT_BASE_NUMBER: u32 = 2;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

impl ExponentialBackoff {
    #[inline]
    pub const fn new(base_number: u32, base_delay: Duration) -> Self {
        Self {
            base_number,
            base_delay,
        }
    }

    /// Multiplier applied per further retry.
    #[inline]
    pub const fn base_number(&self) -> u32 {
        self.base_number
    }

    /// Delay of the first retry.
    #[inline]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

impl Backoff for ExponentialBackoff {
    fn time(&self, _request: &mut Request, opts: BackoffOptions) -> GotBackoffDuration {
        let exponent = opts.retried().retried_on_current_hop().saturating_sub(1) as u32;
        GotBackoffDuration::from(self.base_delay * self.base_number.pow(exponent))
    }
}

impl Default for ExponentialBackoff {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_BASE_NUMBER, DEFAULT_BASE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::{super::super::RetryStats, *};
    use std::error::Error;
    use taskline_engine::{Error as EngineError, ErrorKind as EngineErrorKind};

    #[test]
    fn test_exponential_backoff_doubles_per_retry() -> Result<(), Box<dyn Error>> {
        let backoff = ExponentialBackoff::default();
        let mut stats = RetryStats::new();
        let mut request = Request::builder()
            .url("http://www.example.test/".parse()?)
            .build();
        let err = EngineError::new_with_msg(EngineErrorKind::TimeoutError, "timed out");

        let mut delays = Vec::new();
        for _ in 0..3 {
            stats.increase_retried();
            delays.push(
                backoff
                    .time(&mut request, BackoffOptions::new(&err, &stats))
                    .duration(),
            );
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
        Ok(())
    }
}
