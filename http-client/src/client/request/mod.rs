mod builder;
mod multipart;

use super::{
    authorization::AuthorizationError,
    backoff::Backoff,
    follow_up::{FollowUps, OnFailure, OnResponse},
    response::{ApiResult, Error as ResponseError, Response},
    retrier::RetryPolicy,
};
use anyhow::Result as AnyResult;
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    io::Error as IoError,
    time::Duration,
};
use taskline_engine::{
    header::InvalidHeaderValue, Extensions, HeaderMap, InvalidUri, Method, RequestBody, Version,
};
use thiserror::Error;
use url::{ParseError as UrlParseError, Url};

pub use builder::RequestBuilder;
pub use multipart::{FieldName, FileName, Multipart, Part, PartMetadata};

pub type QueryPairKey<'q> = Cow<'q, str>;
pub type QueryPairValue<'q> = Cow<'q, str>;
pub type QueryPair<'q> = (QueryPairKey<'q>, QueryPairValue<'q>);
pub type QueryPairs<'q> = Vec<QueryPair<'q>>;

/// Why a request could not even be framed for submission.
///
/// Everything here is deterministic: resubmitting the same inputs fails the
/// same way, so build errors are reported to the caller instead of being
/// routed through retry policies.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BuildError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] UrlParseError),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("proxy url must use the http scheme, got: {0}")]
    UnsupportedProxyScheme(String),

    #[error("cannot reach {0} targets through an http proxy")]
    UnsupportedProxyTarget(String),

    #[error("invalid uri: {0}")]
    InvalidUri(#[from] InvalidUri),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),

    #[error("failed to sign authorization: {0}")]
    AuthorizationError(#[from] AuthorizationError),

    #[error("request body was set more than once")]
    BodyConflict,

    #[error("failed to serialize json body: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("failed to read body data: {0}")]
    IoError(#[from] IoError),
}

pub type BuildResult<T> = Result<T, BuildError>;

/// A fully merged request, ready to submit.
///
/// Session defaults, per-call overrides, cookies and authorization have all
/// been folded in. What is still missing is per-submission framing (`Host`,
/// `Content-Length`, proxy addressing), which the session adds on every
/// attempt.
#[derive(Debug)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    version: Version,
    headers: HeaderMap,
    body: RequestBody,
}

impl PreparedRequest {
    pub(super) fn from_parts(
        method: Method,
        url: Url,
        version: Version,
        headers: HeaderMap,
        body: RequestBody,
    ) -> Self {
        Self {
            method,
            url,
            version,
            headers,
            body,
        }
    }

    pub(super) fn into_parts(self) -> (Method, Url, Version, HeaderMap, RequestBody) {
        (self.method, self.url, self.version, self.headers, self.body)
    }

    /// HTTP method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute target URL.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP version the request asks for.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Merged request headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body.
    #[inline]
    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}

/// Per-call overrides of session behavior.
///
/// Every slot is optional; an unset slot falls back to what the session was
/// built with. Terminal handlers live here too, they belong to one logical
/// request rather than to the session.
#[derive(Default)]
pub struct SendOptions {
    pub(super) send_timeout: Option<Duration>,
    pub(super) receive_timeout: Option<Duration>,
    pub(super) keep_alive: Option<bool>,
    pub(super) size_limit: Option<u64>,
    pub(super) follow_redirects: Option<bool>,
    pub(super) max_redirects: Option<usize>,
    pub(super) max_retries: Option<usize>,
    pub(super) retry_policy: Option<Box<dyn RetryPolicy>>,
    pub(super) backoff: Option<Box<dyn Backoff>>,
    pub(super) extensions: Extensions,
    pub(super) callback: Option<OnResponse>,
    pub(super) errback: Option<OnFailure>,
}

impl SendOptions {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Caps the time the engine may spend sending one attempt.
    #[inline]
    pub fn send_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Caps the time the engine may spend receiving one attempt.
    #[inline]
    pub fn receive_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Overrides connection reuse for this request.
    #[inline]
    pub fn keep_alive(&mut self, keep_alive: bool) -> &mut Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Caps the response body size in bytes.
    #[inline]
    pub fn size_limit(&mut self, limit: u64) -> &mut Self {
        self.size_limit = Some(limit);
        self
    }

    /// Overrides whether 3xx responses are followed.
    #[inline]
    pub fn allow_redirects(&mut self, allow: bool) -> &mut Self {
        self.follow_redirects = Some(allow);
        self
    }

    /// Overrides the redirect budget.
    #[inline]
    pub fn max_redirects(&mut self, max_redirects: usize) -> &mut Self {
        self.max_redirects = Some(max_redirects);
        self
    }

    /// Overrides how many resends a hop may get.
    #[inline]
    pub fn max_retries(&mut self, max_retries: usize) -> &mut Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Overrides which failures are worth retrying.
    #[inline]
    pub fn retry_policy(&mut self, policy: impl RetryPolicy + 'static) -> &mut Self {
        self.retry_policy = Some(Box::new(policy));
        self
    }

    /// Overrides the delay between retries.
    #[inline]
    pub fn backoff(&mut self, backoff: impl Backoff + 'static) -> &mut Self {
        self.backoff = Some(Box::new(backoff));
        self
    }

    /// Replaces the extensions handed to the terminal handler.
    #[inline]
    pub fn extensions(&mut self, extensions: Extensions) -> &mut Self {
        self.extensions = extensions;
        self
    }

    /// Adds one extension value for the terminal handler.
    #[inline]
    pub fn add_extension<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.extensions.insert(value);
        self
    }

    /// Handles the delivered response.
    #[inline]
    pub fn callback(
        &mut self,
        callback: impl FnOnce(ApiResult<Response>, Extensions) -> AnyResult<FollowUps>
            + Send
            + 'static,
    ) -> &mut Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Handles a terminal failure.
    #[inline]
    pub fn errback(
        &mut self,
        errback: impl FnOnce(ResponseError, Extensions) -> AnyResult<FollowUps> + Send + 'static,
    ) -> &mut Self {
        self.errback = Some(Box::new(errback));
        self
    }
}

impl Debug for SendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendOptions")
            .field("send_timeout", &self.send_timeout)
            .field("receive_timeout", &self.receive_timeout)
            .field("keep_alive", &self.keep_alive)
            .field("size_limit", &self.size_limit)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .field("max_retries", &self.max_retries)
            .field("retry_policy", &self.retry_policy)
            .field("backoff", &self.backoff)
            .field("has_callback", &self.callback.is_some())
            .field("has_errback", &self.errback.is_some())
            .finish()
    }
}
