mod exponential;
mod fixed;
mod limited;
mod randomized;

use super::RetryStats;
use auto_impl::auto_impl;
use std::{
    fmt::Debug,
    ops::{Deref, DerefMut},
    time::Duration,
};
use taskline_engine::{Error as EngineError, Request};

pub use exponential::ExponentialBackoff;
pub use fixed::{FixedBackoff, NO_BACKOFF};
pub use limited::LimitedBackoff;
pub use randomized::{RandomizedBackoff, Ratio};

/// Computes how long to wait before the next attempt of a request.
#[auto_impl(&, Box, Arc)]
pub trait Backoff: Debug + Sync + Send {
    fn time(&self, request: &mut Request, opts: BackoffOptions) -> GotBackoffDuration;
}

/// What happened during the failed attempt, as seen by a backoff.
#[derive(Copy, Clone, Debug)]
pub struct BackoffOptions<'a> {
    error: &'a EngineError,
    stats: &'a RetryStats,
}

impl<'a> BackoffOptions<'a> {
    #[inline]
    pub(super) fn new(error: &'a EngineError, stats: &'a RetryStats) -> Self {
        Self { error, stats }
    }

    /// The transport failure that caused the retry.
    #[inline]
    pub fn error(&self) -> &'a EngineError {
        self.error
    }

    /// Retry counters, the pending retry already counted.
    #[inline]
    pub fn retried(&self) -> &'a RetryStats {
        self.stats
    }
}

/// Wrapped backoff duration.
#[derive(Copy, Clone, Debug)]
pub struct GotBackoffDuration(Duration);

impl GotBackoffDuration {
    /// Backoff duration.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Mutable backoff duration.
    #[inline]
    pub fn duration_mut(&mut self) -> &mut Duration {
        &mut self.0
    }
}

impl From<Duration> for GotBackoffDuration {
    #[inline]
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl From<GotBackoffDuration> for Duration {
    #[inline]
    fn from(got: GotBackoffDuration) -> Self {
        got.0
    }
}

impl AsRef<Duration> for GotBackoffDuration {
    #[inline]
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl AsMut<Duration> for GotBackoffDuration {
    #[inline]
    fn as_mut(&mut self) -> &mut Duration {
        &mut self.0
    }
}

impl Deref for GotBackoffDuration {
    type Target = Duration;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for GotBackoffDuration {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
