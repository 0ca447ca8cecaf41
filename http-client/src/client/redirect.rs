use std::{fmt, mem::take, sync::Arc};
use taskline_engine::{header::AUTHORIZATION, HeaderMap, Method};
use url::{ParseError, Url};

type RebuildAuthFn = Arc<dyn Fn(&mut HeaderMap, &Url, &Url) + Send + Sync>;

/// How a session treats 3xx responses.
///
/// The authorization hook runs on every followed hop and decides what
/// happens to the `Authorization` header. Without a hook the header is
/// dropped whenever the redirect leaves the original host, credentials
/// meant for one host must not leak to another.
#[derive(Clone)]
pub struct RedirectPolicy {
    follow: bool,
    max_redirects: usize,
    rebuild_auth: Option<RebuildAuthFn>,
}

const DEFAULT_MAX_REDIRECTS: usize = 30;

impl RedirectPolicy {
    #[inline]
    pub fn builder() -> RedirectPolicyBuilder {
        Default::default()
    }

    /// Whether 3xx responses are followed at all.
    #[inline]
    pub fn follow(&self) -> bool {
        self.follow
    }

    /// Hops allowed per logical request.
    #[inline]
    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    pub(super) fn rebuild_authorization(
        &self,
        headers: &mut HeaderMap,
        old_url: &Url,
        new_url: &Url,
    ) {
        if let Some(rebuild) = &self.rebuild_auth {
            rebuild(headers, old_url, new_url);
        } else if old_url.host_str() != new_url.host_str() {
            headers.remove(AUTHORIZATION);
        }
    }
}

impl Default for RedirectPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            follow: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            rebuild_auth: None,
        }
    }
}

impl fmt::Debug for RedirectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectPolicy")
            .field("follow", &self.follow)
            .field("max_redirects", &self.max_redirects)
            .field("has_rebuild_auth", &self.rebuild_auth.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct RedirectPolicyBuilder {
    inner: RedirectPolicy,
}

impl RedirectPolicyBuilder {
    /// Turns following on or off.
    #[inline]
    pub fn follow(&mut self, follow: bool) -> &mut Self {
        self.inner.follow = follow;
        self
    }

    /// Caps the number of hops per logical request.
    #[inline]
    pub fn max_redirects(&mut self, max_redirects: usize) -> &mut Self {
        self.inner.max_redirects = max_redirects;
        self
    }

    /// Replaces the cross-origin authorization rule.
    ///
    /// The hook receives the outgoing headers plus the old and new URL and
    /// may keep, drop or rewrite `Authorization` as it sees fit.
    #[inline]
    pub fn on_rebuild_authorization(
        &mut self,
        rebuild: impl Fn(&mut HeaderMap, &Url, &Url) + Send + Sync + 'static,
    ) -> &mut Self {
        self.inner.rebuild_auth = Some(Arc::new(rebuild));
        self
    }

    #[inline]
    pub fn build(&mut self) -> RedirectPolicy {
        take(self).inner
    }
}

/// Resolves a `Location` header against the URL that sent it.
///
/// Relative references resolve the way browsers resolve them, and a target
/// without a fragment of its own inherits the fragment of the source URL.
pub(super) fn resolve_location(base: &Url, location: &str) -> Result<Url, ParseError> {
    let mut target = base.join(location)?;
    if target.fragment().map_or(true, str::is_empty) {
        if let Some(fragment) = base.fragment() {
            target.set_fragment(Some(fragment));
        }
    }
    Ok(target)
}

/// Method the next hop is sent with.
///
/// 301, 302 and 303 rewrite everything but GET and HEAD to GET. 307 and
/// 308 never rewrite.
pub(super) fn redirect_method(status_code: u16, method: &Method) -> Method {
    match status_code {
        301 | 302 | 303 if method != Method::GET && method != Method::HEAD => Method::GET,
        _ => method.to_owned(),
    }
}
