use super::{Request, Response, Result as UnitResult};
use assert_impl::assert_impl;
use std::{collections::VecDeque, fmt, time::Duration};

/// Callback invoked exactly once when an HTTP unit completes.
pub type OnComplete = Box<dyn FnOnce(&mut ChainScope, Completion) + Send + 'static>;

/// Callback invoked exactly once when a timer unit fires.
pub type OnFire = Box<dyn FnOnce(&mut ChainScope) + Send + 'static>;

/// One unit-of-work handed to a [`Scheduler`](super::Scheduler).
pub enum Unit {
    /// One HTTP exchange; the engine performs it and then invokes
    /// `on_complete` with the request handed back alongside the outcome.
    Http {
        request: Request,
        on_complete: OnComplete,
    },

    /// One delay; the engine invokes `on_fire` once `delay` has passed.
    Timer { delay: Duration, on_fire: OnFire },
}

impl Unit {
    /// Builds an HTTP unit.
    #[inline]
    pub fn http(request: Request, on_complete: impl FnOnce(&mut ChainScope, Completion) + Send + 'static) -> Self {
        Self::Http {
            request,
            on_complete: Box::new(on_complete),
        }
    }

    /// Builds a timer unit.
    #[inline]
    pub fn timer(delay: Duration, on_fire: impl FnOnce(&mut ChainScope) + Send + 'static) -> Self {
        Self::Timer {
            delay,
            on_fire: Box::new(on_fire),
        }
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { request, .. } => f.debug_struct("Http").field("request", request).finish(),
            Self::Timer { delay, .. } => f.debug_struct("Timer").field("delay", delay).finish(),
        }
    }
}

/// Outcome delivered to an HTTP unit's completion callback.
///
/// Ownership of the request travels with the outcome, so the callback can
/// rewind and resubmit the same body without cloning it.
#[derive(Debug)]
pub struct Completion {
    request: Request,
    outcome: UnitResult<Response>,
}

impl Completion {
    /// Packs one finished exchange; engines build one per HTTP unit.
    #[inline]
    pub fn new(request: Request, outcome: UnitResult<Response>) -> Self {
        Self { request, outcome }
    }

    /// The request exactly as the engine received it.
    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Splits into the request and its outcome.
    #[inline]
    pub fn into_parts(self) -> (Request, UnitResult<Response>) {
        (self.request, self.outcome)
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

/// FIFO of units a scheduler executes strictly in order.
#[derive(Debug, Default)]
pub struct Chain {
    units: VecDeque<Unit>,
    aborted: bool,
}

impl Chain {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds a chain from units, preserving their order.
    #[inline]
    pub fn of(units: impl IntoIterator<Item = Unit>) -> Self {
        Self {
            units: units.into_iter().collect(),
            aborted: false,
        }
    }

    /// Appends a unit after everything already queued.
    #[inline]
    pub fn push_back(&mut self, unit: Unit) {
        self.units.push_back(unit);
    }

    /// Takes the next unit to execute.
    ///
    /// Returns `None` once the chain is drained or aborted.
    #[inline]
    pub fn pop_front(&mut self) -> Option<Unit> {
        if self.aborted {
            None
        } else {
            self.units.pop_front()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Whether a callback asked to drop the remainder of this chain.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Applies the splices and abort flag a callback recorded.
    ///
    /// Front items land ahead of the remaining units in the order they were
    /// pushed; back items append. Engines call this right after each unit
    /// callback returns and before taking the next unit.
    pub fn apply(&mut self, scope: ChainScope) {
        let ChainScope { front, back, aborted } = scope;
        for unit in front.into_iter().rev() {
            self.units.push_front(unit);
        }
        self.units.extend(back);
        if aborted {
            self.aborted = true;
        }
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
    }
}

/// Mutation surface a unit callback gets over its owning chain.
///
/// Nothing takes effect while the callback is still running: the engine
/// applies the recorded splices and the abort flag once the callback
/// returns, via [`Chain::apply`].
#[derive(Debug, Default)]
pub struct ChainScope {
    front: Vec<Unit>,
    back: Vec<Unit>,
    aborted: bool,
}

impl ChainScope {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Queues a unit to run immediately after the current one.
    ///
    /// Multiple pushes run in the order they were pushed.
    #[inline]
    pub fn push_front(&mut self, unit: Unit) {
        self.front.push(unit);
    }

    /// Queues a unit to run after everything already in the chain.
    #[inline]
    pub fn push_back(&mut self, unit: Unit) {
        self.back.push(unit);
    }

    /// Drops every unit still queued once the callback returns.
    ///
    /// Safe to call more than once.
    #[inline]
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn marker(ms: u64) -> Unit {
        Unit::timer(Duration::from_millis(ms), |_| {})
    }

    fn delay_of(unit: &Unit) -> u64 {
        match unit {
            Unit::Timer { delay, .. } => delay.as_millis() as u64,
            Unit::Http { .. } => panic!("expected a timer unit"),
        }
    }

    #[test]
    fn test_chain_preserves_unit_order() {
        let mut chain = Chain::of([marker(1), marker(2), marker(3)]);
        assert_eq!(chain.len(), 3);
        assert_eq!(delay_of(&chain.pop_front().unwrap()), 1);
        assert_eq!(delay_of(&chain.pop_front().unwrap()), 2);
        assert_eq!(delay_of(&chain.pop_front().unwrap()), 3);
        assert!(chain.pop_front().is_none());
    }

    #[test]
    fn test_scope_splices_front_in_push_order() {
        let mut chain = Chain::of([marker(9)]);
        let mut scope = ChainScope::new();
        scope.push_front(marker(1));
        scope.push_front(marker(2));
        scope.push_back(marker(8));
        chain.apply(scope);

        let order: Vec<_> = (0..4).map(|_| delay_of(&chain.pop_front().unwrap())).collect();
        assert_eq!(order, [1, 2, 9, 8]);
    }

    #[test]
    fn test_aborted_chain_stops_yielding_units() {
        let mut chain = Chain::of([marker(1), marker(2)]);
        chain.pop_front().unwrap();

        let mut scope = ChainScope::new();
        scope.abort();
        scope.abort();
        assert!(scope.is_aborted());

        chain.apply(scope);
        assert!(chain.is_aborted());
        assert!(!chain.is_empty());
        assert!(chain.pop_front().is_none());
    }

    #[test]
    fn test_completion_returns_request_ownership() {
        let request = Request::builder().body("payload").build();
        let completion = Completion::new(request, Ok(Response::builder().build()));
        assert_eq!(completion.request().body().size(), 7);

        let (mut request, outcome) = completion.into_parts();
        assert!(outcome.is_ok());
        let mut body = Vec::new();
        request.body_mut().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"payload");
    }
}
