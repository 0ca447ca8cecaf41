use super::{RetryDecision, RetryOptions, RetryPolicy, RetryResult};
use taskline_engine::Request;

/// Caps another policy at a fixed number of retries per hop.
///
/// The inner policy is only consulted while the per-hop retry counter is
/// below the cap, so `retries` is the number of RESENDS a hop may get on
/// top of its first attempt. A cap of zero makes the first failure
/// terminal. Redirects reset the counter, every hop gets the full budget.
#[derive(Copy, Clone, Debug)]
pub struct LimitedRetryPolicy<P> {
    retries: usize,
    base_policy: P,
}

const DEFAULT_RETRIES: usize = 0;

impl<P> LimitedRetryPolicy<P> {
    /// Wraps `base_policy`, allowing at most `retries` resends per hop.
    #[inline]
    pub const fn new(base_policy: P, retries: usize) -> Self {
        Self {
            base_policy,
            retries,
        }
    }

    /// Maximum resends per hop.
    #[inline]
    pub const fn retries(&self) -> usize {
        self.retries
    }

    /// The policy being capped.
    #[inline]
    pub const fn base_policy(&self) -> &P {
        &self.base_policy
    }
}

impl<P: Default> Default for LimitedRetryPolicy<P> {
    #[inline]
    fn default() -> Self {
        Self::new(P::default(), DEFAULT_RETRIES)
    }
}

impl<P: RetryPolicy> RetryPolicy for LimitedRetryPolicy<P> {
    fn retry(&self, request: &mut Request, opts: RetryOptions) -> RetryResult {
        if opts.retried().retried_on_current_hop() >= self.retries {
            return RetryDecision::DontRetry.into();
        }
        self.base_policy.retry(request, opts)
    }
}
