use super::{Backoff, BackoffOptions, GotBackoffDuration};
use rand::{thread_rng, Rng};
use std::time::Duration;
use taskline_engine::Request;

pub use num_rational::Ratio;

/// Spreads another backoff's delay over a randomized interval.
///
/// The base delay is scaled by `minification` and `magnification` and a
/// uniform point between the two is picked, so synchronized retry storms
/// from many parallel requests drift apart.
#[derive(Copy, Clone, Debug)]
pub struct RandomizedBackoff<P> {
    base_backoff: P,
    minification: Ratio<u8>,
    magnification: Ratio<u8>,
}

const DEFAULT_MINIFICATION: Ratio<u8> = Ratio::new_raw(1, 2);
const DEFAULT_MAGNIFICATION: Ratio<u8> = Ratio::new_raw(3, 2);

impl<P> RandomizedBackoff<P> {
    /// Randomizes `base_backoff` between the two scaled bounds.
    ///
    /// Both ratios must have non-zero denominators.
    #[inline]
    pub const fn new(base_backoff: P, minification: Ratio<u8>, magnification: Ratio<u8>) -> Self {
        Self {
            base_backoff,
            minification,
            magnification,
        }
    }

    /// Lower bound scale.
    #[inline]
    pub const fn minification(&self) -> Ratio<u8> {
        self.minification
    }

    /// Upper bound scale.
    #[inline]
    pub const fn magnification(&self) -> Ratio<u8> {
        self.magnification
    }

    /// The backoff being randomized.
    #[inline]
    pub const fn base_backoff(&self) -> &P {
        &self.base_backoff
    }
}

impl<P: Backoff> Backoff for RandomizedBackoff<P> {
    fn time(&self, request: &mut Request, opts: BackoffOptions) -> GotBackoffDuration {
        let base = self.base_backoff.time(request, opts).duration();
        let minified = scale(base, self.minification);
        let magnified = scale(base, self.magnification);
        let randomized = if magnified > minified {
            thread_rng().gen_range(minified..magnified)
        } else {
            minified
        };
        randomized.into()
    }
}

impl<P: Default> Default for RandomizedBackoff<P> {
    #[inline]
    fn default() -> Self {
        Self::new(P::default(), DEFAULT_MINIFICATION, DEFAULT_MAGNIFICATION)
    }
}

fn scale(duration: Duration, ratio: Ratio<u8>) -> Duration {
    duration * u32::from(*ratio.numer()) / u32::from(*ratio.denom())
}

#[cfg(test)]
mod tests {
    use super::{
        super::{super::RetryStats, FixedBackoff},
        *,
    };
    use std::error::Error;
    use taskline_engine::{Error as EngineError, ErrorKind as EngineErrorKind};

    #[test]
    fn test_randomized_backoff_stays_within_bounds() -> Result<(), Box<dyn Error>> {
        let backoff = RandomizedBackoff::new(
            FixedBackoff::new(Duration::from_millis(100)),
            Ratio::new_raw(1, 2),
            Ratio::new_raw(3, 2),
        );
        let mut stats = RetryStats::new();
        stats.increase_retried();
        let mut request = Request::builder()
            .url("http://www.example.test/".parse()?)
            .build();
        let err = EngineError::new_with_msg(EngineErrorKind::ConnectError, "refused");

        for _ in 0..100 {
            let delay = backoff
                .time(&mut request, BackoffOptions::new(&err, &stats))
                .duration();
            assert!(delay >= Duration::from_millis(50));
            assert!(delay < Duration::from_millis(150));
        }
        Ok(())
    }

    #[test]
    fn test_zero_base_stays_zero() -> Result<(), Box<dyn Error>> {
        let backoff = RandomizedBackoff::<FixedBackoff>::default();
        let mut stats = RetryStats::new();
        stats.increase_retried();
        let mut request = Request::builder()
            .url("http://www.example.test/".parse()?)
            .build();
        let err = EngineError::new_with_msg(EngineErrorKind::ConnectError, "refused");

        let delay = backoff
            .time(&mut request, BackoffOptions::new(&err, &stats))
            .duration();
        assert_eq!(delay, Duration::ZERO);
        Ok(())
    }
}
