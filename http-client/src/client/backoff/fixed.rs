use super::{Backoff, BackoffOptions, GotBackoffDuration};
use std::time::Duration;
use taskline_engine::Request;

/// The same delay before every retry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FixedBackoff {
    delay: Duration,
}

/// No delay at all, retries are resubmitted immediately.
pub const NO_BACKOFF: FixedBackoff = FixedBackoff::new(Duration::from_nanos(0));

impl FixedBackoff {
    /// Waits `delay` before every retry.
    #[inline]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The configured delay.
    #[inline]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Backoff for FixedBackoff {
    #[inline]
    fn time(&self, _request: &mut Request, _opts: BackoffOptions) -> GotBackoffDuration {
        self.delay.into()
    }
}

impl Default for FixedBackoff {
    #[inline]
    fn default() -> Self {
        NO_BACKOFF
    }
}
