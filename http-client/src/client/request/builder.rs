use super::{
    super::{
        authorization::Authorization,
        backoff::Backoff,
        follow_up::FollowUps,
        response::{ApiResult, Error as ResponseError, Response},
        retrier::RetryPolicy,
        Session,
    },
    multipart::Multipart,
    BuildError, BuildResult, PreparedRequest, QueryPairKey, QueryPairValue, QueryPairs,
    SendOptions,
};
use anyhow::Result as AnyResult;
use mime::{Mime, APPLICATION_JSON, APPLICATION_WWW_FORM_URLENCODED};
use serde::Serialize;
use serde_json::Result as JsonResult;
use std::{
    borrow::{Borrow, Cow},
    io::{Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult},
    mem::take,
    time::Duration,
};
use taskline_engine::{
    header::{IntoHeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, USER_AGENT},
    Extensions, HeaderMap, HeaderValue, Method, RequestBody, Reset, Unit, Version,
};
use url::Url;

/// Builder for one logical request.
///
/// Accumulates the target, headers, query, cookies, body and per-call
/// overrides, then ends in one of three ways: [`submit`](Self::submit)
/// hands the request to the scheduler, [`unit`](Self::unit) returns it as
/// a chain unit for manual composition, and [`prepare`](Self::prepare)
/// returns the merged request without submitting it.
#[derive(Debug)]
pub struct RequestBuilder<'r> {
    session: &'r Session,
    method: Method,
    url: String,
    version: Option<Version>,
    headers: HeaderMap,
    query: Option<Cow<'r, str>>,
    query_pairs: QueryPairs<'r>,
    cookies: Vec<(String, String)>,
    authorization: Option<Authorization>,
    body: Option<(RequestBody, Option<Mime>)>,
    body_conflict: bool,
    options: SendOptions,
}

impl<'r> RequestBuilder<'r> {
    pub(in super::super) fn new(session: &'r Session, method: Method, url: String) -> Self {
        Self {
            session,
            method,
            url,
            version: Default::default(),
            headers: Default::default(),
            query: Default::default(),
            query_pairs: Default::default(),
            cookies: Default::default(),
            authorization: Default::default(),
            body: Default::default(),
            body_conflict: false,
            options: Default::default(),
        }
    }

    /// Sets the HTTP version to ask for.
    #[inline]
    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    /// Inserts one header, overriding any session default of the same name.
    #[inline]
    pub fn header(
        &mut self,
        header_name: impl IntoHeaderName,
        header_value: impl Into<HeaderValue>,
    ) -> &mut Self {
        self.headers.insert(header_name, header_value.into());
        self
    }

    /// Merges a whole header map over the session defaults.
    #[inline]
    pub fn headers(&mut self, headers: HeaderMap) -> &mut Self {
        self.headers.extend(headers);
        self
    }

    /// Replaces the URL's query string.
    #[inline]
    pub fn query(&mut self, query: impl Into<Cow<'r, str>>) -> &mut Self {
        self.query = Some(query.into());
        self
    }

    /// Appends percent-encoded query pairs to the URL.
    #[inline]
    pub fn query_pairs(&mut self, query_pairs: impl Into<QueryPairs<'r>>) -> &mut Self {
        self.query_pairs.extend(query_pairs.into());
        self
    }

    /// Appends one percent-encoded query pair to the URL.
    #[inline]
    pub fn append_query_pair(
        &mut self,
        query_pair_key: impl Into<QueryPairKey<'r>>,
        query_pair_value: impl Into<QueryPairValue<'r>>,
    ) -> &mut Self {
        self.query_pairs
            .push((query_pair_key.into(), query_pair_value.into()));
        self
    }

    /// Adds one cookie for this request only.
    ///
    /// Per-call cookies override jar cookies of the same name and are not
    /// stored back into the jar.
    #[inline]
    pub fn cookie(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Signs this request, overriding the session's authorization.
    #[inline]
    pub fn authorization(&mut self, authorization: Authorization) -> &mut Self {
        self.authorization = Some(authorization);
        self
    }

    /// Asks for a JSON response.
    #[inline]
    pub fn accept_json(&mut self) -> &mut Self {
        self.header(ACCEPT, HeaderValue::from_static("application/json"))
    }

    /// Uses owned bytes as the body.
    #[inline]
    pub fn bytes_as_body(
        &mut self,
        body: impl Into<Vec<u8>>,
        content_type: Option<Mime>,
    ) -> &mut Self {
        self.set_body(RequestBody::from_bytes(body.into()), content_type)
    }

    /// Uses a one-shot reader as the body.
    ///
    /// `content_length` is announced up front. A one-shot body cannot be
    /// replayed: a retry or redirect that must resend it fails the request
    /// instead.
    #[inline]
    pub fn stream_as_body(
        &mut self,
        body: impl Read + std::fmt::Debug + Send + Sync + 'static,
        content_length: u64,
        content_type: Option<Mime>,
    ) -> &mut Self {
        self.set_body(RequestBody::from_reader(body, content_length), content_type)
    }

    /// Uses a rewindable reader as the body, replayable across retries.
    #[inline]
    pub fn resettable_stream_as_body(
        &mut self,
        body: impl Read + Reset + std::fmt::Debug + Send + Sync + 'static,
        content_length: u64,
        content_type: Option<Mime>,
    ) -> &mut Self {
        self.set_body(
            RequestBody::from_resettable_reader(body, content_length),
            content_type,
        )
    }

    /// Serializes `body` as the JSON request body.
    #[inline]
    pub fn json(&mut self, body: impl Serialize) -> JsonResult<&mut Self> {
        let body = serde_json::to_vec(&body)?;
        Ok(self.set_body(RequestBody::from_bytes(body), Some(APPLICATION_JSON)))
    }

    /// Uses form-encoded pairs as the body, `None` values encoding as bare
    /// keys.
    pub fn post_form<I, K, V>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Borrow<(K, Option<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = form_urlencoded::Serializer::new(String::new());
        for pair in iter {
            let (key, value) = pair.borrow();
            if let Some(value) = value {
                form.append_pair(key.as_ref(), value.as_ref());
            } else {
                form.append_key_only(key.as_ref());
            }
        }
        self.set_body(
            RequestBody::from_bytes(form.finish().into_bytes()),
            Some(APPLICATION_WWW_FORM_URLENCODED),
        )
    }

    /// Encodes a multipart payload as the body.
    pub fn multipart(&mut self, multipart: impl Into<Multipart>) -> IoResult<&mut Self> {
        let multipart = multipart.into();
        let mime = format!("multipart/form-data; boundary={}", multipart.boundary())
            .parse::<Mime>()
            .map_err(|err| IoError::new(IoErrorKind::InvalidInput, err))?;
        let body = multipart.into_bytes()?;
        Ok(self.set_body(RequestBody::from_bytes(body), Some(mime)))
    }

    /// Caps the time the engine may spend sending one attempt.
    #[inline]
    pub fn send_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.options.send_timeout(timeout);
        self
    }

    /// Caps the time the engine may spend receiving one attempt.
    #[inline]
    pub fn receive_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.options.receive_timeout(timeout);
        self
    }

    /// Overrides connection reuse for this request.
    #[inline]
    pub fn keep_alive(&mut self, keep_alive: bool) -> &mut Self {
        self.options.keep_alive(keep_alive);
        self
    }

    /// Caps the response body size in bytes.
    #[inline]
    pub fn size_limit(&mut self, limit: u64) -> &mut Self {
        self.options.size_limit(limit);
        self
    }

    /// Overrides whether 3xx responses are followed.
    #[inline]
    pub fn allow_redirects(&mut self, allow: bool) -> &mut Self {
        self.options.allow_redirects(allow);
        self
    }

    /// Overrides the redirect budget.
    #[inline]
    pub fn max_redirects(&mut self, max_redirects: usize) -> &mut Self {
        self.options.max_redirects(max_redirects);
        self
    }

    /// Overrides how many resends each hop may get.
    #[inline]
    pub fn max_retries(&mut self, max_retries: usize) -> &mut Self {
        self.options.max_retries(max_retries);
        self
    }

    /// Overrides which failures are worth retrying.
    #[inline]
    pub fn retry_policy(&mut self, policy: impl RetryPolicy + 'static) -> &mut Self {
        self.options.retry_policy(policy);
        self
    }

    /// Overrides the delay between retries.
    #[inline]
    pub fn backoff(&mut self, backoff: impl Backoff + 'static) -> &mut Self {
        self.options.backoff(backoff);
        self
    }

    /// Replaces the extensions handed to the terminal handler.
    #[inline]
    pub fn extensions(&mut self, extensions: Extensions) -> &mut Self {
        self.options.extensions(extensions);
        self
    }

    /// Adds one extension value for the terminal handler.
    #[inline]
    pub fn add_extension<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.options.add_extension(value);
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
        self.options.callback(callback);
        self
    }

    /// Handles a terminal failure.
    #[inline]
    pub fn errback(
        &mut self,
        errback: impl FnOnce(ResponseError, Extensions) -> AnyResult<FollowUps> + Send + 'static,
    ) -> &mut Self {
        self.options.errback(errback);
        self
    }

    /// Merges everything into a submission-ready request, resetting the
    /// builder.
    ///
    /// Per-call overrides set through this builder are not carried by the
    /// prepared request; they apply only when ending in
    /// [`submit`](Self::submit) or [`unit`](Self::unit).
    pub fn prepare(&mut self) -> BuildResult<PreparedRequest> {
        Ok(self.take_parts()?.0)
    }

    /// Builds a chain unit for manual composition with
    /// [`Session::launch`](super::super::Session::launch).
    pub fn unit(&mut self) -> BuildResult<Unit> {
        let (prepared, options) = self.take_parts()?;
        self.session.unit(prepared, options)
    }

    /// Hands the request to the session's scheduler.
    pub fn submit(&mut self) -> BuildResult<()> {
        let (prepared, options) = self.take_parts()?;
        self.session.send(prepared, options)
    }

    fn set_body(&mut self, body: RequestBody, content_type: Option<Mime>) -> &mut Self {
        if self.body.is_some() {
            self.body_conflict = true;
        } else {
            self.body = Some((body, content_type));
        }
        self
    }

    fn take_parts(&mut self) -> BuildResult<(PreparedRequest, SendOptions)> {
        if self.body_conflict {
            return Err(BuildError::BodyConflict);
        }

        let mut url = Url::parse(&self.url)?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(BuildError::UnsupportedScheme(scheme.to_owned())),
        }
        if let Some(query) = self.query.take() {
            url.set_query(Some(&query));
        }
        let query_pairs = take(&mut self.query_pairs);
        if !query_pairs.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (key, value) in query_pairs {
                serializer.append_pair(&key, &value);
            }
        }

        let mut headers = self.session.default_headers().to_owned();
        headers.extend(take(&mut self.headers));
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_str(self.session.user_agent())?);
        }
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        }

        let (body, content_type) = self.body.take().unwrap_or_default();
        if let Some(content_type) = content_type {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type.as_ref())?);
            }
        }

        if !headers.contains_key(AUTHORIZATION) {
            if let Some(authorization) = self
                .authorization
                .take()
                .or_else(|| self.session.authorization().cloned())
            {
                authorization.sign(&mut headers)?;
            }
        }

        if !headers.contains_key(COOKIE) {
            let mut pairs: Vec<(String, String)> = {
                let jar = self.session.jar().lock().unwrap();
                jar.cookies_for(&url)
                    .iter()
                    .map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
                    .collect()
            };
            for (name, value) in take(&mut self.cookies) {
                match pairs.iter_mut().find(|(existing, _)| *existing == name) {
                    Some(pair) => pair.1 = value,
                    None => pairs.push((name, value)),
                }
            }
            if !pairs.is_empty() {
                let joined = pairs
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect::<Vec<_>>()
                    .join("; ");
                headers.insert(COOKIE, HeaderValue::from_str(&joined)?);
            }
        }

        let version = self.version.take().unwrap_or(self.session.http_version());
        let prepared = PreparedRequest::from_parts(
            self.method.to_owned(),
            url,
            version,
            headers,
            body,
        );
        Ok((prepared, take(&mut self.options)))
    }
}
