use super::{ApiResult, Error, PreparedRequest, Response};
use anyhow::Result as AnyResult;
use taskline_engine::{Extensions, Unit};
use url::Url;

/// Terminal handler for delivered responses.
///
/// Receives `Err` only when the request has no failure handler of its own.
/// Whatever it returns as [`FollowUps`] is spliced into the owning chain.
pub type OnResponse =
    Box<dyn FnOnce(ApiResult<Response>, Extensions) -> AnyResult<FollowUps> + Send + 'static>;

/// Terminal handler for failed requests.
pub type OnFailure = Box<dyn FnOnce(Error, Extensions) -> AnyResult<FollowUps> + Send + 'static>;

/// One piece of work a terminal handler hands back to the session.
#[derive(Debug)]
#[non_exhaustive]
pub enum FollowUp {
    /// GET this URL with session defaults, delivered to the session's
    /// default handlers.
    Get(Url),

    /// Submit this prepared request with default options.
    Request(PreparedRequest),

    /// Splice this unit as given.
    Unit(Unit),
}

impl From<Url> for FollowUp {
    #[inline]
    fn from(url: Url) -> Self {
        Self::Get(url)
    }
}

impl From<PreparedRequest> for FollowUp {
    #[inline]
    fn from(request: PreparedRequest) -> Self {
        Self::Request(request)
    }
}

impl From<Unit> for FollowUp {
    #[inline]
    fn from(unit: Unit) -> Self {
        Self::Unit(unit)
    }
}

/// Work a terminal handler schedules onto its own chain.
///
/// `next` items run before anything already queued behind the current
/// unit, in the order they were added. `queued` items run after the rest
/// of the chain. Returning [`FollowUps::none`] ends the chain here.
#[derive(Debug, Default)]
#[must_use]
pub struct FollowUps {
    next: Vec<FollowUp>,
    queued: Vec<FollowUp>,
}

impl FollowUps {
    /// Nothing further, the chain continues with whatever it already holds.
    #[inline]
    pub fn none() -> Self {
        Default::default()
    }

    /// Runs `item` before anything already queued on the chain.
    #[inline]
    pub fn next(mut self, item: impl Into<FollowUp>) -> Self {
        self.next.push(item.into());
        self
    }

    /// Runs `item` after everything already queued on the chain.
    #[inline]
    pub fn queued(mut self, item: impl Into<FollowUp>) -> Self {
        self.queued.push(item.into());
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.next.is_empty() && self.queued.is_empty()
    }

    pub(super) fn into_parts(self) -> (Vec<FollowUp>, Vec<FollowUp>) {
        (self.next, self.queued)
    }
}

impl<T: Into<FollowUp>> From<T> for FollowUps {
    #[inline]
    fn from(item: T) -> Self {
        Self::none().next(item)
    }
}
