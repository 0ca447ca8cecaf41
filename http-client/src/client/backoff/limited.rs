use super::{Backoff, BackoffOptions, ExponentialBackoff, GotBackoffDuration, RandomizedBackoff};
use std::time::Duration;
use taskline_engine::Request;

/// Clamps another backoff into a closed interval.
#[derive(Copy, Clone, Debug)]
pub struct LimitedBackoff<P> {
    max_backoff: Duration,
    min_backoff: Duration,
    base_backoff: P,
}

const DEFAULT_MIN_BACKOFF: Duration = Duration::from_nanos(0);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

impl<P> LimitedBackoff<P> {
    /// Clamps `base_backoff` between `min_backoff` and `max_backoff`.
    #[inline]
    pub const fn new(base_backoff: P, min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            base_backoff,
            min_backoff,
            max_backoff,
        }
    }

    /// Shortest delay allowed.
    #[inline]
    pub const fn min_backoff(&self) -> Duration {
        self.min_backoff
    }

    /// Longest delay allowed.
    #[inline]
    pub const fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// The backoff being clamped.
    #[inline]
    pub const fn base_backoff(&self) -> &P {
        &self.base_backoff
    }
}

impl<P: Backoff> Backoff for LimitedBackoff<P> {
    #[inline]
    fn time(&self, request: &mut Request, opts: BackoffOptions) -> GotBackoffDuration {
        self.base_backoff
            .time(request, opts)
            .duration()
            .clamp(self.min_backoff, self.max_backoff)
            .into()
    }
}

impl Default for LimitedBackoff<RandomizedBackoff<ExponentialBackoff>> {
    #[inline]
    fn default() -> Self {
        Self::new(
            RandomizedBackoff::default(),
            DEFAULT_MIN_BACKOFF,
            DEFAULT_MAX_BACKOFF,
        )
    }
}
