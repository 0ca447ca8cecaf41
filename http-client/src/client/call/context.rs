use super::{
    super::{
        backoff::{Backoff, BackoffOptions},
        follow_up::{FollowUp, FollowUps, OnFailure, OnResponse},
        redirect::{redirect_method, resolve_location},
        request::{BuildError, SendOptions},
        response::{ApiResult, Error as ResponseError, ErrorKind, Response},
        retrier::{RetryDecision, RetryOptions, RetryPolicy},
        session::Session,
        stats::RetryStats,
    },
    frame_engine_request,
    timer::delay_unit,
    TransportOptions,
};
use anyhow::{anyhow, Error as AnyError, Result as AnyResult};
use log::{debug, info, warn};
use std::{
    mem::take,
    time::{Duration, Instant},
};
use taskline_engine::{
    header::{CONTENT_TYPE, COOKIE, TRANSFER_ENCODING},
    ChainScope, Completion, Error as EngineError, ErrorKind as EngineErrorKind, Extensions, Method,
    Request as EngineRequest, RequestBody, Reset, Response as EngineResponse, Unit, Version,
};
use url::Url;

/// Everything one logical request carries across its physical attempts.
///
/// The context owns the resolved policies, the terminal handlers and the
/// accumulated history, and moves by value through the chain: each attempt's
/// completion callback consumes it and either resubmits (retry, redirect)
/// or delivers the outcome. Method and URL always describe the current hop.
pub(super) struct TaskContext {
    pub(super) session: Session,
    pub(super) method: Method,
    pub(super) url: Url,
    pub(super) version: Version,
    pub(super) follow_redirects: bool,
    pub(super) max_redirects: usize,
    pub(super) retry_policy: Box<dyn RetryPolicy>,
    pub(super) backoff: Box<dyn Backoff>,
    pub(super) transport: TransportOptions,
    pub(super) extensions: Extensions,
    pub(super) callback: Option<OnResponse>,
    pub(super) errback: Option<OnFailure>,
    pub(super) stats: RetryStats,
    pub(super) history: Vec<Response>,
}

impl TaskContext {
    /// Announces the attempt to the observation hooks and wraps the context
    /// into the HTTP unit that performs it.
    pub(super) fn into_submitted_unit(self, request: EngineRequest) -> Unit {
        self.session
            .callbacks()
            .call_submit_callbacks(&request, &self.stats);
        debug!(
            "handing {} {} to the scheduler: attempt {}, {} redirects so far",
            self.method,
            self.url,
            self.stats.attempts(),
            self.stats.redirected()
        );
        self.into_http_unit(request)
    }

    fn into_http_unit(self, request: EngineRequest) -> Unit {
        let submitted_at = Instant::now();
        Unit::http(request, move |scope, completion| {
            self.handle_completion(scope, completion, submitted_at.elapsed())
        })
    }

    fn handle_completion(self, scope: &mut ChainScope, completion: Completion, elapsed: Duration) {
        if self.session.cancellation_token().is_cancelled() {
            debug!("cancelled, dropping {} {}", self.method, self.url);
            scope.abort();
            return;
        }
        let (request, outcome) = completion.into_parts();
        match outcome {
            Ok(response) => self.handle_exchange(scope, request, response, elapsed),
            Err(error) => self.handle_transport_error(scope, request, error, elapsed),
        }
    }

    fn handle_exchange(
        mut self,
        scope: &mut ChainScope,
        request: EngineRequest,
        response: EngineResponse,
        elapsed: Duration,
    ) {
        {
            let mut jar = self.session.jar().lock().unwrap();
            jar.store_response_cookies(response.headers(), &self.url);
        }
        let response =
            Response::from_engine(response, self.method.to_owned(), self.url.to_owned(), elapsed);
        if self.follow_redirects && response.is_redirect() {
            self.handle_redirect(scope, request, response);
        } else {
            let mut response = response;
            response.set_history(take(&mut self.history));
            self.deliver(scope, Ok(response));
        }
    }

    /// Rewrites the request for the hop a redirect response asks for and
    /// resubmits it, or fails when the response cannot be followed.
    fn handle_redirect(
        mut self,
        scope: &mut ChainScope,
        request: EngineRequest,
        response: Response,
    ) {
        if self.history.len() >= self.max_redirects {
            let source = anyhow!("exceeded {} redirects", self.max_redirects);
            self.fail_with_response(scope, ErrorKind::TooManyRedirects, source, response);
            return;
        }
        let location = match response.location() {
            Some(location) => location.to_owned(),
            None => {
                let source = anyhow!("location header is not valid UTF-8");
                self.fail_with_response(scope, ErrorKind::MalformedResponse, source, response);
                return;
            }
        };
        let target = match resolve_location(&self.url, &location) {
            Ok(target) => target,
            Err(err) => {
                self.fail_with_response(scope, ErrorKind::MalformedResponse, err, response);
                return;
            }
        };
        let status_code = response.status_code();
        let next_method = redirect_method(status_code.as_u16(), &self.method);

        let mut request = request;
        let mut headers = take(request.headers_mut());
        let body = request.into_body();
        let body = if next_method != self.method {
            // demoted to GET, the entity goes away with its framing headers
            headers.remove(CONTENT_TYPE);
            headers.remove(TRANSFER_ENCODING);
            RequestBody::default()
        } else {
            let mut body = body;
            if body.size() > 0 {
                if let Err(err) = body.reset() {
                    self.fail_with_response(scope, ErrorKind::NonReplayableBody, err, response);
                    return;
                }
            }
            body
        };

        // cookies are always recomputed for the new target
        headers.remove(COOKIE);
        {
            let jar = self.session.jar().lock().unwrap();
            if let Some(cookie_header) = jar.cookie_header(&target) {
                headers.insert(COOKIE, cookie_header);
            }
        }
        self.session
            .redirect_policy()
            .rebuild_authorization(&mut headers, &self.url, &target);

        let next_request = match frame_engine_request(
            &self.session,
            &next_method,
            &target,
            self.version,
            headers,
            body,
            &self.transport,
        ) {
            Ok(next_request) => next_request,
            Err(err) => {
                let kind = match &err {
                    BuildError::UnsupportedProxyTarget(_) => {
                        ErrorKind::TransportError(EngineErrorKind::ProxyError)
                    }
                    _ => ErrorKind::MalformedResponse,
                };
                self.fail_with_response(scope, kind, err, response);
                return;
            }
        };

        info!(
            "following {} redirect: {} {} -> {} {}",
            status_code, self.method, self.url, next_method, target
        );
        self.session
            .callbacks()
            .call_redirect_callbacks(&self.url, &target, status_code);
        self.stats.switch_hop();
        self.history.push(response);
        self.method = next_method;
        self.url = target;
        scope.push_front(self.into_submitted_unit(next_request));
    }

    /// Consults the retry policy about a failed attempt and either resends
    /// the same request after the backoff delay or delivers the failure.
    fn handle_transport_error(
        mut self,
        scope: &mut ChainScope,
        request: EngineRequest,
        error: EngineError,
        elapsed: Duration,
    ) {
        let mut request = request;
        let verdict = self
            .retry_policy
            .retry(&mut request, RetryOptions::new(&error, &self.stats))
            .decision();
        if verdict != RetryDecision::RetryRequest {
            debug!("not retrying {} {}: {}", self.method, self.url, error);
            let failure = ResponseError::new(
                ErrorKind::TransportError(error.kind()),
                error,
                self.method.to_owned(),
                self.url.to_owned(),
            )
            .retried(&self.stats)
            .set_elapsed(elapsed);
            self.deliver(scope, Err(failure));
            return;
        }

        // the pending resend counts before the backoff sees the stats
        self.stats.increase_retried();
        let delay = self
            .backoff
            .time(&mut request, BackoffOptions::new(&error, &self.stats))
            .duration();
        if request.body().size() > 0 {
            if let Err(err) = request.body_mut().reset() {
                warn!("cannot resend {} {}: {}", self.method, self.url, err);
                let failure = ResponseError::new(
                    ErrorKind::NonReplayableBody,
                    err,
                    self.method.to_owned(),
                    self.url.to_owned(),
                )
                .retried(&self.stats)
                .set_elapsed(elapsed);
                self.deliver(scope, Err(failure));
                return;
            }
        }
        info!(
            "retrying {} {} in {:?} after {}: attempt {}",
            self.method,
            self.url,
            delay,
            error,
            self.stats.attempts()
        );
        self.session
            .callbacks()
            .call_before_backoff_callbacks(&request, &self.stats, delay);
        if delay.is_zero() {
            self.session
                .callbacks()
                .call_after_backoff_callbacks(&request, &self.stats, delay);
            scope.push_front(self.into_submitted_unit(request));
        } else {
            let token = self.session.cancellation_token().to_owned();
            scope.push_front(delay_unit(delay, token, move |scope| {
                self.session
                    .callbacks()
                    .call_after_backoff_callbacks(&request, &self.stats, delay);
                scope.push_front(self.into_submitted_unit(request));
            }));
        }
    }

    fn fail_with_response(
        mut self,
        scope: &mut ChainScope,
        kind: ErrorKind,
        source: impl Into<AnyError>,
        mut response: Response,
    ) {
        response.set_history(take(&mut self.history));
        let elapsed = response.elapsed();
        let failure = ResponseError::new(kind, source, self.method.to_owned(), self.url.to_owned())
            .retried(&self.stats)
            .set_elapsed(elapsed)
            .set_response(response);
        self.deliver(scope, Err(failure));
    }

    /// Hands the settled outcome to exactly one terminal handler and splices
    /// whatever follow-up work it returns.
    fn deliver(mut self, scope: &mut ChainScope, outcome: ApiResult<Response>) {
        if let Err(error) = &outcome {
            self.session.callbacks().call_error_callbacks(error);
        }
        self.session.callbacks().call_settled_callbacks(&self.stats);

        let extensions = take(&mut self.extensions);
        let follow_ups = match outcome {
            Ok(response) => match self.callback.take() {
                Some(callback) => {
                    report_handler(callback(Ok(response), extensions), "response callback")
                }
                None => {
                    debug!(
                        "response of {} {} dropped: no handler configured",
                        self.method, self.url
                    );
                    None
                }
            },
            Err(error) => {
                if let Some(errback) = self.errback.take() {
                    report_handler(errback(error, extensions), "failure callback")
                } else if let Some(callback) = self.callback.take() {
                    report_handler(callback(Err(error), extensions), "response callback")
                } else {
                    debug!("failure of {} {} dropped: {}", self.method, self.url, error);
                    None
                }
            }
        };
        if let Some(follow_ups) = follow_ups {
            self.apply_follow_ups(scope, follow_ups);
        }
    }

    fn apply_follow_ups(self, scope: &mut ChainScope, follow_ups: FollowUps) {
        let (next, queued) = follow_ups.into_parts();
        for follow_up in next {
            if let Some(unit) = self.follow_up_unit(follow_up) {
                scope.push_front(unit);
            }
        }
        for follow_up in queued {
            if let Some(unit) = self.follow_up_unit(follow_up) {
                scope.push_back(unit);
            }
        }
    }

    /// A follow-up that cannot be built is logged and skipped, it never
    /// fails the chain.
    fn follow_up_unit(&self, follow_up: FollowUp) -> Option<Unit> {
        match follow_up {
            FollowUp::Unit(unit) => Some(unit),
            FollowUp::Get(url) => match self.session.get(url.as_str()).unit() {
                Ok(unit) => Some(unit),
                Err(err) => {
                    warn!("skipping follow-up GET {}: {}", url, err);
                    None
                }
            },
            FollowUp::Request(prepared) => match self.session.unit(prepared, SendOptions::new()) {
                Ok(unit) => Some(unit),
                Err(err) => {
                    warn!("skipping follow-up request: {}", err);
                    None
                }
            },
        }
    }
}

fn report_handler(result: AnyResult<FollowUps>, slot: &str) -> Option<FollowUps> {
    match result {
        Ok(follow_ups) => Some(follow_ups),
        Err(err) => {
            warn!("{} failed: {:#}", slot, err);
            None
        }
    }
}
