use super::{Error, RetryStats};
use anyhow::Result as AnyResult;
use log::warn;
use std::{
    fmt::{self, Debug},
    time::Duration,
};
use taskline_engine::{Request, StatusCode};
use url::Url;

type OnSubmit = Box<dyn Fn(&Request, &RetryStats) -> AnyResult<()> + Send + Sync + 'static>;
type OnBackoff =
    Box<dyn Fn(&Request, &RetryStats, Duration) -> AnyResult<()> + Send + Sync + 'static>;
type OnRedirect = Box<dyn Fn(&Url, &Url, StatusCode) -> AnyResult<()> + Send + Sync + 'static>;
type OnError = Box<dyn Fn(&Error) -> AnyResult<()> + Send + Sync + 'static>;
type OnSettled = Box<dyn Fn(&RetryStats) -> AnyResult<()> + Send + Sync + 'static>;

/// Observation hooks a session fires while driving requests.
///
/// Hooks observe, they cannot steer: a hook that returns an error is logged
/// and the request carries on.
#[derive(Default)]
pub(super) struct Callbacks {
    on_submit: Box<[OnSubmit]>,
    on_before_backoff: Box<[OnBackoff]>,
    on_after_backoff: Box<[OnBackoff]>,
    on_redirect: Box<[OnRedirect]>,
    on_error: Box<[OnError]>,
    on_settled: Box<[OnSettled]>,
}

#[derive(Default)]
pub(super) struct CallbacksBuilder {
    on_submit: Vec<OnSubmit>,
    on_before_backoff: Vec<OnBackoff>,
    on_after_backoff: Vec<OnBackoff>,
    on_redirect: Vec<OnRedirect>,
    on_error: Vec<OnError>,
    on_settled: Vec<OnSettled>,
}

impl Callbacks {
    #[inline]
    pub(super) fn builder() -> CallbacksBuilder {
        Default::default()
    }

    pub(super) fn call_submit_callbacks(&self, request: &Request, stats: &RetryStats) {
        for callback in self.on_submit.iter() {
            if let Err(err) = callback(request, stats) {
                warn!("submit callback failed: {}", err);
            }
        }
    }

    pub(super) fn call_before_backoff_callbacks(
        &self,
        request: &Request,
        stats: &RetryStats,
        delay: Duration,
    ) {
        for callback in self.on_before_backoff.iter() {
            if let Err(err) = callback(request, stats, delay) {
                warn!("before backoff callback failed: {}", err);
            }
        }
    }

    pub(super) fn call_after_backoff_callbacks(
        &self,
        request: &Request,
        stats: &RetryStats,
        delay: Duration,
    ) {
        for callback in self.on_after_backoff.iter() {
            if let Err(err) = callback(request, stats, delay) {
                warn!("after backoff callback failed: {}", err);
            }
        }
    }

    pub(super) fn call_redirect_callbacks(&self, old_url: &Url, new_url: &Url, status: StatusCode) {
        for callback in self.on_redirect.iter() {
            if let Err(err) = callback(old_url, new_url, status) {
                warn!("redirect callback failed: {}", err);
            }
        }
    }

    pub(super) fn call_error_callbacks(&self, error: &Error) {
        for callback in self.on_error.iter() {
            if let Err(err) = callback(error) {
                warn!("error callback failed: {}", err);
            }
        }
    }

    pub(super) fn call_settled_callbacks(&self, stats: &RetryStats) {
        for callback in self.on_settled.iter() {
            if let Err(err) = callback(stats) {
                warn!("settled callback failed: {}", err);
            }
        }
    }
}

impl CallbacksBuilder {
    /// Fires whenever an attempt is handed to the scheduler, retries and
    /// redirect hops included.
    #[inline]
    pub(super) fn on_submit(
        &mut self,
        callback: impl Fn(&Request, &RetryStats) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_submit.push(Box::new(callback));
        self
    }

    /// Fires before a retry delay starts ticking.
    #[inline]
    pub(super) fn on_before_backoff(
        &mut self,
        callback: impl Fn(&Request, &RetryStats, Duration) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_before_backoff.push(Box::new(callback));
        self
    }

    /// Fires when a retry delay has elapsed, before the resend.
    #[inline]
    pub(super) fn on_after_backoff(
        &mut self,
        callback: impl Fn(&Request, &RetryStats, Duration) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_after_backoff.push(Box::new(callback));
        self
    }

    /// Fires for every followed redirect hop.
    #[inline]
    pub(super) fn on_redirect(
        &mut self,
        callback: impl Fn(&Url, &Url, StatusCode) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_redirect.push(Box::new(callback));
        self
    }

    /// Fires before a terminal failure is delivered.
    #[inline]
    pub(super) fn on_error(
        &mut self,
        callback: impl Fn(&Error) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_error.push(Box::new(callback));
        self
    }

    /// Fires after a logical request settled, successfully or not.
    #[inline]
    pub(super) fn on_settled(
        &mut self,
        callback: impl Fn(&RetryStats) -> AnyResult<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_settled.push(Box::new(callback));
        self
    }

    #[inline]
    pub(super) fn build(&mut self) -> Callbacks {
        let owned = std::mem::take(self);
        Callbacks {
            on_submit: owned.on_submit.into(),
            on_before_backoff: owned.on_before_backoff.into(),
            on_after_backoff: owned.on_after_backoff.into(),
            on_redirect: owned.on_redirect.into(),
            on_error: owned.on_error.into(),
            on_settled: owned.on_settled.into(),
        }
    }
}

impl Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        macro_rules! field {
            ($ctx:ident, $method_name:expr, $method:ident) => {
                $ctx.field($method_name, &self.$method.len())
            };
        }
        let s = &mut f.debug_struct("Callbacks");
        field!(s, "on_submit", on_submit);
        field!(s, "on_before_backoff", on_before_backoff);
        field!(s, "on_after_backoff", on_after_backoff);
        field!(s, "on_redirect", on_redirect);
        field!(s, "on_error", on_error);
        field!(s, "on_settled", on_settled);
        s.finish()
    }
}

impl Debug for CallbacksBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        macro_rules! field {
            ($ctx:ident, $method_name:expr, $method:ident) => {
                $ctx.field($method_name, &self.$method.len())
            };
        }
        let s = &mut f.debug_struct("CallbacksBuilder");
        field!(s, "on_submit", on_submit);
        field!(s, "on_before_backoff", on_before_backoff);
        field!(s, "on_after_backoff", on_after_backoff);
        field!(s, "on_redirect", on_redirect);
        field!(s, "on_error", on_error);
        field!(s, "on_settled", on_settled);
        s.finish()
    }
}
