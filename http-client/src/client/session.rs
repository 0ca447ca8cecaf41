use super::{
    authorization::Authorization,
    backoff::{Backoff, ExponentialBackoff, LimitedBackoff, RandomizedBackoff},
    call,
    callbacks::{Callbacks, CallbacksBuilder},
    cancellation::CancellationToken,
    follow_up::{FollowUps, OnFailure, OnResponse},
    proxy::Proxy,
    redirect::RedirectPolicy,
    request::{BuildResult, PreparedRequest, RequestBuilder, SendOptions},
    response::{ApiResult, Error as ResponseError, Response},
    retrier::{RetryPolicy, TransportRetryPolicy},
    stats::RetryStats,
};
use crate::cookies::{netscape, CookieJar};
use anyhow::Result as AnyResult;
use assert_impl::assert_impl;
use std::{
    fmt,
    io::Result as IoResult,
    mem::replace,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};
use tap::Tap;
use taskline_engine::{
    Chain, Extensions, HeaderMap, Method, Request, Scheduler, StatusCode, Unit, Version,
};
use url::Url;

pub(super) const DEFAULT_USER_AGENT: &str =
    concat!("taskline-http-client/", env!("CARGO_PKG_VERSION"));

type DefaultOnResponse =
    dyn Fn(ApiResult<Response>, Extensions) -> AnyResult<FollowUps> + Send + Sync + 'static;
type DefaultOnFailure =
    dyn Fn(ResponseError, Extensions) -> AnyResult<FollowUps> + Send + Sync + 'static;

/// A group of requests sharing one scheduler, one cookie jar, one
/// cancellation token and one set of defaults.
///
/// Sessions are cheap to clone; clones share all of the above. Requests
/// start from the verb methods and settle through the handlers attached
/// per call or configured as session defaults:
///
/// ```
/// use taskline_http_client::{FollowUps, Session};
/// # fn run(scheduler: impl taskline_engine::Scheduler + 'static) -> anyhow::Result<()> {
/// let session = Session::builder(scheduler).build();
/// session
///     .get("http://httpbin.org/get")
///     .callback(|result, _extensions| {
///         let mut response = result?;
///         println!("{}", response.text()?);
///         Ok(FollowUps::none())
///     })
///     .submit()?;
/// session.join();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    scheduler: Arc<dyn Scheduler>,
    default_headers: HeaderMap,
    user_agent: String,
    authorization: Option<Authorization>,
    proxy: Option<Proxy>,
    http_version: Version,
    keep_alive: bool,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    size_limit: Option<u64>,
    max_retries: usize,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn Backoff>,
    redirect_policy: RedirectPolicy,
    cancellation_token: CancellationToken,
    jar: Mutex<CookieJar>,
    callbacks: Callbacks,
    callback: Option<Arc<DefaultOnResponse>>,
    errback: Option<Arc<DefaultOnFailure>>,
}

/// How [`Session::join`] came back.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum JoinOutcome {
    /// Every chain drained on its own.
    Completed,

    /// The session was cancelled; whatever was still queued got dropped.
    Cancelled,
}

impl Session {
    #[inline]
    pub fn builder(scheduler: impl Scheduler + 'static) -> SessionBuilder {
        SessionBuilder::new(Arc::new(scheduler))
    }

    /// Starts a request with an arbitrary method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::DELETE, url)
    }

    pub fn options(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::OPTIONS, url)
    }

    /// Starts a HEAD request, with redirects off.
    pub fn head(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::HEAD, url).tap_mut(|builder| {
            builder.allow_redirects(false);
        })
    }

    /// Builds a prepared request into a chain unit without launching it.
    ///
    /// The unit carries the whole request lifecycle: retries, redirect
    /// hops and handler delivery all happen inside it. Compose units into
    /// a [`Chain`] and hand them to [`launch`](Self::launch) to run
    /// requests strictly one after another.
    pub fn unit(&self, request: PreparedRequest, options: SendOptions) -> BuildResult<Unit> {
        call::build_unit(self, request, options)
    }

    /// Launches a prepared request on a chain of its own.
    pub fn send(&self, request: PreparedRequest, options: SendOptions) -> BuildResult<()> {
        let unit = self.unit(request, options)?;
        self.launch(Chain::of([unit]));
        Ok(())
    }

    /// Hands a chain to the session's scheduler.
    #[inline]
    pub fn launch(&self, chain: Chain) {
        self.inner.scheduler.launch(chain);
    }

    /// Flags every outstanding and future request of this session to stop.
    ///
    /// In-flight exchanges finish at the engine's pace; their outcomes are
    /// dropped without reaching any handler.
    #[inline]
    pub fn cancel(&self) {
        self.inner.cancellation_token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation_token.is_cancelled()
    }

    /// The token shared by everything this session runs.
    #[inline]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancellation_token
    }

    /// Blocks until the scheduler has drained every launched chain.
    pub fn join(&self) -> JoinOutcome {
        self.inner.scheduler.wait_idle();
        if self.is_cancelled() {
            JoinOutcome::Cancelled
        } else {
            JoinOutcome::Completed
        }
    }

    /// Snapshot of the session's cookie jar.
    pub fn cookies(&self) -> CookieJar {
        self.inner.jar.lock().unwrap().to_owned()
    }

    /// Merges cookies from a Netscape-format file into the jar.
    ///
    /// Returns how many cookies the file contributed.
    pub fn load_cookies(&self, path: impl AsRef<Path>) -> IoResult<usize> {
        let loaded = netscape::load(path)?;
        let count = loaded.len();
        self.inner.jar.lock().unwrap().merge(loaded);
        Ok(count)
    }

    /// Writes the jar to a Netscape-format file.
    ///
    /// Session cookies are written only when `include_session` is set.
    /// Returns how many cookies were written.
    pub fn save_cookies(&self, path: impl AsRef<Path>, include_session: bool) -> IoResult<usize> {
        netscape::save(path, &self.cookies(), include_session)
    }

    pub(super) fn jar(&self) -> &Mutex<CookieJar> {
        &self.inner.jar
    }

    pub(super) fn callbacks(&self) -> &Callbacks {
        &self.inner.callbacks
    }

    pub(super) fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }

    pub(super) fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    pub(super) fn authorization(&self) -> Option<&Authorization> {
        self.inner.authorization.as_ref()
    }

    pub(super) fn proxy(&self) -> Option<&Proxy> {
        self.inner.proxy.as_ref()
    }

    pub(super) fn http_version(&self) -> Version {
        self.inner.http_version
    }

    pub(super) fn keep_alive_default(&self) -> bool {
        self.inner.keep_alive
    }

    pub(super) fn send_timeout_default(&self) -> Option<Duration> {
        self.inner.send_timeout
    }

    pub(super) fn receive_timeout_default(&self) -> Option<Duration> {
        self.inner.receive_timeout
    }

    pub(super) fn size_limit_default(&self) -> Option<u64> {
        self.inner.size_limit
    }

    pub(super) fn max_retries(&self) -> usize {
        self.inner.max_retries
    }

    pub(super) fn retry_policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.inner.retry_policy
    }

    pub(super) fn backoff(&self) -> &Arc<dyn Backoff> {
        &self.inner.backoff
    }

    pub(super) fn redirect_policy(&self) -> &RedirectPolicy {
        &self.inner.redirect_policy
    }

    pub(super) fn default_callback(&self) -> Option<OnResponse> {
        self.inner.callback.as_ref().map(|callback| {
            let callback = callback.to_owned();
            Box::new(move |result, extensions| callback(result, extensions)) as OnResponse
        })
    }

    pub(super) fn default_errback(&self) -> Option<OnFailure> {
        self.inner.errback.as_ref().map(|errback| {
            let errback = errback.to_owned();
            Box::new(move |error, extensions| errback(error, extensions)) as OnFailure
        })
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

impl fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInner")
            .field("user_agent", &self.user_agent)
            .field("default_headers", &self.default_headers)
            .field("has_authorization", &self.authorization.is_some())
            .field("proxy", &self.proxy)
            .field("http_version", &self.http_version)
            .field("keep_alive", &self.keep_alive)
            .field("send_timeout", &self.send_timeout)
            .field("receive_timeout", &self.receive_timeout)
            .field("size_limit", &self.size_limit)
            .field("max_retries", &self.max_retries)
            .field("retry_policy", &self.retry_policy)
            .field("backoff", &self.backoff)
            .field("redirect_policy", &self.redirect_policy)
            .field("cancellation_token", &self.cancellation_token)
            .field("callbacks", &self.callbacks)
            .field("has_callback", &self.callback.is_some())
            .field("has_errback", &self.errback.is_some())
            .finish()
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    scheduler: Arc<dyn Scheduler>,
    default_headers: HeaderMap,
    user_agent: Option<String>,
    authorization: Option<Authorization>,
    proxy: Option<Proxy>,
    http_version: Version,
    keep_alive: bool,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    size_limit: Option<u64>,
    max_retries: usize,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn Backoff>,
    redirect_policy: RedirectPolicy,
    cancellation_token: CancellationToken,
    cookie_jar: CookieJar,
    callbacks: CallbacksBuilder,
    callback: Option<Arc<DefaultOnResponse>>,
    errback: Option<Arc<DefaultOnFailure>>,
}

impl SessionBuilder {
    fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            default_headers: Default::default(),
            user_agent: None,
            authorization: None,
            proxy: None,
            http_version: Version::HTTP_11,
            keep_alive: true,
            send_timeout: None,
            receive_timeout: None,
            size_limit: None,
            max_retries: 0,
            retry_policy: Arc::new(TransportRetryPolicy),
            backoff: Arc::new(
                LimitedBackoff::<RandomizedBackoff<ExponentialBackoff>>::default(),
            ),
            redirect_policy: Default::default(),
            cancellation_token: Default::default(),
            cookie_jar: Default::default(),
            callbacks: Callbacks::builder(),
            callback: None,
            errback: None,
        }
    }

    /// Headers merged into every request, per-call headers winning.
    #[inline]
    pub fn default_headers(&mut self, headers: HeaderMap) -> &mut Self {
        self.default_headers = headers;
        self
    }

    #[inline]
    pub fn user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Credentials signed into every request that has no `Authorization`
    /// of its own.
    #[inline]
    pub fn authorization(&mut self, authorization: Authorization) -> &mut Self {
        self.authorization = Some(authorization);
        self
    }

    /// Forward proxy every request of this session goes through.
    #[inline]
    pub fn proxy(&mut self, proxy: Proxy) -> &mut Self {
        self.proxy = Some(proxy);
        self
    }

    #[inline]
    pub fn http_version(&mut self, version: Version) -> &mut Self {
        self.http_version = version;
        self
    }

    #[inline]
    pub fn keep_alive(&mut self, keep_alive: bool) -> &mut Self {
        self.keep_alive = keep_alive;
        self
    }

    #[inline]
    pub fn send_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.send_timeout = Some(timeout);
        self
    }

    #[inline]
    pub fn receive_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Largest response body the engine is allowed to accept.
    #[inline]
    pub fn size_limit(&mut self, limit: u64) -> &mut Self {
        self.size_limit = Some(limit);
        self
    }

    /// Retries allowed per redirect hop, on top of the first attempt.
    #[inline]
    pub fn max_retries(&mut self, max_retries: usize) -> &mut Self {
        self.max_retries = max_retries;
        self
    }

    #[inline]
    pub fn retry_policy(&mut self, policy: impl RetryPolicy + 'static) -> &mut Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    #[inline]
    pub fn backoff(&mut self, backoff: impl Backoff + 'static) -> &mut Self {
        self.backoff = Arc::new(backoff);
        self
    }

    #[inline]
    pub fn redirect_policy(&mut self, policy: RedirectPolicy) -> &mut Self {
        self.redirect_policy = policy;
        self
    }

    /// Token shared with other parties that may cancel this session.
    #[inline]
    pub fn cancellation_token(&mut self, token: CancellationToken) -> &mut Self {
        self.cancellation_token = token;
        self
    }

    /// Seeds the session's cookie jar.
    #[inline]
    pub fn cookie_jar(&mut self, jar: CookieJar) -> &mut Self {
        self.cookie_jar = jar;
        self
    }

    /// Seeds the jar from a `Cookie`-header style `name=value; ...` string.
    #[inline]
    pub fn cookie_string(&mut self, cookies: impl AsRef<str>) -> &mut Self {
        self.cookie_jar.merge(CookieJar::from_cookie_string(cookies.as_ref()));
        self
    }

    /// Default terminal handler for requests submitted without one.
    pub fn callback(
        &mut self,
        callback: impl Fn(ApiResult<Response>, Extensions) -> AnyResult<FollowUps>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Default failure handler for requests submitted without one.
    pub fn errback(
        &mut self,
        errback: impl Fn(ResponseError, Extensions) -> AnyResult<FollowUps> + Send + Sync + 'static,
    ) -> &mut Self {
        self.errback = Some(Arc::new(errback));
        self
    }

    #[inline]
    pub fn on_submit(
        &mut self,
        callback: impl Fn(&Request, &RetryStats) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.on_submit(callback);
        self
    }

    #[inline]
    pub fn on_before_backoff(
        &mut self,
        callback: impl Fn(&Request, &RetryStats, Duration) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.on_before_backoff(callback);
        self
    }

    #[inline]
    pub fn on_after_backoff(
        &mut self,
        callback: impl Fn(&Request, &RetryStats, Duration) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.on_after_backoff(callback);
        self
    }

    #[inline]
    pub fn on_redirect(
        &mut self,
        callback: impl Fn(&Url, &Url, StatusCode) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.on_redirect(callback);
        self
    }

    #[inline]
    pub fn on_error(
        &mut self,
        callback: impl Fn(&ResponseError) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.on_error(callback);
        self
    }

    #[inline]
    pub fn on_settled(
        &mut self,
        callback: impl Fn(&RetryStats) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.on_settled(callback);
        self
    }

    /// Builds the session, resetting this builder.
    pub fn build(&mut self) -> Session {
        let scheduler = self.scheduler.to_owned();
        let mut owned = replace(self, Self::new(scheduler));
        Session {
            inner: Arc::new(SessionInner {
                scheduler: owned.scheduler,
                default_headers: owned.default_headers,
                user_agent: owned
                    .user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
                authorization: owned.authorization,
                proxy: owned.proxy,
                http_version: owned.http_version,
                keep_alive: owned.keep_alive,
                send_timeout: owned.send_timeout,
                receive_timeout: owned.receive_timeout,
                size_limit: owned.size_limit,
                max_retries: owned.max_retries,
                retry_policy: owned.retry_policy,
                backoff: owned.backoff,
                redirect_policy: owned.redirect_policy,
                cancellation_token: owned.cancellation_token,
                jar: Mutex::new(owned.cookie_jar),
                callbacks: owned.callbacks.build(),
                callback: owned.callback,
                errback: owned.errback,
            }),
        }
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("user_agent", &self.user_agent)
            .field("default_headers", &self.default_headers)
            .field("has_authorization", &self.authorization.is_some())
            .field("proxy", &self.proxy)
            .field("http_version", &self.http_version)
            .field("keep_alive", &self.keep_alive)
            .field("max_retries", &self.max_retries)
            .field("retry_policy", &self.retry_policy)
            .field("backoff", &self.backoff)
            .field("redirect_policy", &self.redirect_policy)
            .field("callbacks", &self.callbacks)
            .field("has_callback", &self.callback.is_some())
            .field("has_errback", &self.errback.is_some())
            .finish()
    }
}
