mod limited;
mod never;
mod transport;

use super::RetryStats;
use auto_impl::auto_impl;
use std::{
    fmt::Debug,
    ops::{Deref, DerefMut},
};
use taskline_engine::{Error as EngineError, Request};

pub use limited::LimitedRetryPolicy;
pub use never::NeverRetryPolicy;
pub use transport::TransportRetryPolicy;

/// Decides whether a failed attempt is worth resending.
///
/// Consulted once per transport failure, before the failure is allowed to
/// become terminal. The request is passed mutably so a policy may adjust it
/// for the next attempt.
#[auto_impl(&, Box, Arc)]
pub trait RetryPolicy: Debug + Sync + Send {
    fn retry(&self, request: &mut Request, opts: RetryOptions) -> RetryResult;
}

/// What happened during one attempt, as seen by a retry policy.
#[derive(Copy, Clone, Debug)]
pub struct RetryOptions<'a> {
    error: &'a EngineError,
    stats: &'a RetryStats,
}

impl<'a> RetryOptions<'a> {
    #[inline]
    pub(super) fn new(error: &'a EngineError, stats: &'a RetryStats) -> Self {
        Self { error, stats }
    }

    /// The transport failure being judged.
    #[inline]
    pub fn error(&self) -> &'a EngineError {
        self.error
    }

    /// Retry counters before this decision.
    #[inline]
    pub fn retried(&self) -> &'a RetryStats {
        self.stats
    }
}

/// Verdict of a retry policy.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum RetryDecision {
    /// Give up and deliver the failure
    DontRetry,

    /// Resend the request after the backoff delay
    RetryRequest,
}

/// Wrapped verdict, so policies can evolve without breaking callers.
#[derive(Copy, Clone, Debug)]
pub struct RetryResult(RetryDecision);

impl RetryResult {
    /// Decision of the retry policy.
    #[inline]
    pub fn decision(&self) -> RetryDecision {
        self.0
    }

    /// Mutable decision of the retry policy.
    #[inline]
    pub fn decision_mut(&mut self) -> &mut RetryDecision {
        &mut self.0
    }
}

impl From<RetryDecision> for RetryResult {
    #[inline]
    fn from(decision: RetryDecision) -> Self {
        Self(decision)
    }
}

impl From<RetryResult> for RetryDecision {
    #[inline]
    fn from(result: RetryResult) -> Self {
        result.0
    }
}

impl Deref for RetryResult {
    type Target = RetryDecision;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RetryResult {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
