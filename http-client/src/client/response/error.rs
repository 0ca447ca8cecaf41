use super::{super::RetryStats, Response};
use anyhow::Error as AnyError;
use assert_impl::assert_impl;
use std::{
    error::Error as StdError,
    fmt::{self, Debug, Display},
    time::Duration,
};
use taskline_engine::{ErrorKind as EngineErrorKind, Method};
use url::Url;

/// Terminal failure classes of a logical request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The engine reported a transport failure and the retry policy gave up
    TransportError(EngineErrorKind),

    /// The redirect budget ran out before a non-redirect response arrived
    TooManyRedirects,

    /// A retry or redirect had to resend a body that cannot be rewound
    NonReplayableBody,

    /// The response could not be interpreted
    MalformedResponse,
}

/// Terminal failure of one logical request.
///
/// Always carries enough context to log on its own: the method and URL the
/// request was for, plus the retry counters at the moment it failed.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    error: AnyError,
    method: Method,
    url: Url,
    stats: RetryStats,
    elapsed: Option<Duration>,
    response: Option<Response>,
}

impl Error {
    /// Wraps an underlying error with its failure class and request context.
    #[inline]
    pub fn new(kind: ErrorKind, err: impl Into<AnyError>, method: Method, url: Url) -> Self {
        Error {
            kind,
            error: err.into(),
            method,
            url,
            stats: Default::default(),
            elapsed: Default::default(),
            response: Default::default(),
        }
    }

    /// Builds an error from a bare message.
    #[inline]
    pub fn new_with_msg(
        kind: ErrorKind,
        msg: impl Display + Debug + Send + Sync + 'static,
        method: Method,
        url: Url,
    ) -> Self {
        Error {
            kind,
            error: AnyError::msg(msg),
            method,
            url,
            stats: Default::default(),
            elapsed: Default::default(),
            response: Default::default(),
        }
    }

    /// Attaches the retry counters at failure time.
    #[inline]
    #[must_use]
    pub fn retried(mut self, stats: &RetryStats) -> Self {
        self.stats = stats.to_owned();
        self
    }

    /// Attaches the elapsed time of the attempt that failed.
    #[inline]
    #[must_use]
    pub fn set_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// Attaches the response that triggered the failure.
    #[inline]
    #[must_use]
    pub fn set_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// Failure class.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Method of the failed request.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URL of the hop that failed.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Retry counters at failure time.
    #[inline]
    pub fn stats(&self) -> &RetryStats {
        &self.stats
    }

    /// Elapsed time of the failing attempt, when one was measured.
    #[inline]
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// The response that triggered the failure.
    ///
    /// Present for [`ErrorKind::TooManyRedirects`], where it is the redirect
    /// that exceeded the budget, with the hops followed so far as history.
    #[inline]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    #[inline]
    pub fn into_response(self) -> Option<Response> {
        self.response
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}][{}] {} {}: {}",
            self.kind, self.stats, self.method, self.url, self.error
        )?;
        if let Some(elapsed) = self.elapsed {
            write!(f, " (after {:?})", elapsed)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    #[inline]
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.error.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_request_context() {
        let mut stats = RetryStats::new();
        stats.increase_retried();
        let err = Error::new_with_msg(
            ErrorKind::TransportError(EngineErrorKind::ConnectError),
            "connection refused",
            Method::POST,
            "http://api.example.test/submit".parse().unwrap(),
        )
        .retried(&stats)
        .set_elapsed(Duration::from_millis(120));

        let rendered = err.to_string();
        assert!(rendered.contains("POST"));
        assert!(rendered.contains("http://api.example.test/submit"));
        assert!(rendered.contains("[1/1/0]"));
        assert!(rendered.contains("connection refused"));
        assert_eq!(err.kind(), ErrorKind::TransportError(EngineErrorKind::ConnectError));
        assert_eq!(err.stats().attempts(), 2);
    }
}
