use super::super::cancellation::CancellationToken;
use std::time::Duration;
use taskline_engine::{ChainScope, Unit};

// Upper bound on how long a cancellation can go unnoticed while waiting.
pub(super) const TIMER_STEP: Duration = Duration::from_millis(333);

/// Builds a timer unit that waits `delay` and then runs `and_then`.
///
/// The wait is split into steps of at most [`TIMER_STEP`]; every firing
/// re-checks the token, and a cancelled token aborts the owning chain
/// instead of continuing.
pub(super) fn delay_unit(
    delay: Duration,
    token: CancellationToken,
    and_then: impl FnOnce(&mut ChainScope) + Send + 'static,
) -> Unit {
    let step = delay.min(TIMER_STEP);
    let remaining = delay - step;
    Unit::timer(step, move |scope| {
        if token.is_cancelled() {
            scope.abort();
        } else if remaining.is_zero() {
            and_then(scope);
        } else {
            scope.push_front(delay_unit(remaining, token, and_then));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering::Relaxed},
        Arc,
    };
    use taskline_engine::Chain;

    fn fire(unit: Unit, scope: &mut ChainScope) -> Duration {
        match unit {
            Unit::Timer { delay, on_fire } => {
                on_fire(scope);
                delay
            }
            Unit::Http { .. } => panic!("expected a timer unit"),
        }
    }

    fn drive(unit: Unit) -> (Vec<Duration>, bool) {
        let mut chain = Chain::of([unit]);
        let mut delays = Vec::new();
        while let Some(unit) = chain.pop_front() {
            let mut scope = ChainScope::new();
            delays.push(fire(unit, &mut scope));
            chain.apply(scope);
        }
        (delays, chain.is_aborted())
    }

    fn flag_setter(flag: &Arc<AtomicBool>) -> impl FnOnce(&mut ChainScope) + Send + 'static {
        let flag = flag.to_owned();
        move |_scope| flag.store(true, Relaxed)
    }

    #[test]
    fn test_long_delay_splits_into_steps() {
        let fired = Arc::new(AtomicBool::new(false));
        let unit = delay_unit(
            Duration::from_millis(1000),
            CancellationToken::new(),
            flag_setter(&fired),
        );
        let (delays, aborted) = drive(unit);
        assert_eq!(
            delays,
            [
                Duration::from_millis(333),
                Duration::from_millis(333),
                Duration::from_millis(333),
                Duration::from_millis(1),
            ]
        );
        assert!(fired.load(Relaxed));
        assert!(!aborted);
    }

    #[test]
    fn test_short_delay_is_a_single_unit() {
        let fired = Arc::new(AtomicBool::new(false));
        let unit = delay_unit(
            Duration::from_millis(5),
            CancellationToken::new(),
            flag_setter(&fired),
        );
        let (delays, _) = drive(unit);
        assert_eq!(delays, [Duration::from_millis(5)]);
        assert!(fired.load(Relaxed));
    }

    #[test]
    fn test_zero_delay_fires_immediately() {
        let fired = Arc::new(AtomicBool::new(false));
        let unit = delay_unit(Duration::ZERO, CancellationToken::new(), flag_setter(&fired));
        let (delays, _) = drive(unit);
        assert_eq!(delays, [Duration::ZERO]);
        assert!(fired.load(Relaxed));
    }

    #[test]
    fn test_cancellation_lands_within_one_step() {
        let token = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let unit = delay_unit(Duration::from_secs(2), token.to_owned(), flag_setter(&fired));

        let mut chain = Chain::of([unit]);
        let first = chain.pop_front().unwrap();
        let mut scope = ChainScope::new();
        assert_eq!(fire(first, &mut scope), TIMER_STEP);
        chain.apply(scope);

        // cancelled between two steps; the very next firing aborts
        token.cancel();
        let second = chain.pop_front().unwrap();
        let mut scope = ChainScope::new();
        fire(second, &mut scope);
        chain.apply(scope);

        assert!(chain.is_aborted());
        assert!(chain.pop_front().is_none());
        assert!(!fired.load(Relaxed));
    }
}
