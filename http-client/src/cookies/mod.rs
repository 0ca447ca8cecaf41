pub mod netscape;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::warn;
use std::{collections::BTreeMap, net::IpAddr};
use taskline_engine::{header::SET_COOKIE, HeaderMap, HeaderValue};
use url::Url;

/// One cookie, scoped the way servers scope them.
///
/// `domain` is stored lowercased without a leading dot; `host_only` tells
/// whether it came from a `Domain` attribute (subdomains match) or was
/// inferred from the request host (exact match only). An empty domain is a
/// wildcard and matches every host, which is how cookies given on the
/// command line as bare `name=value` pairs behave.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    expires: Option<DateTime<Utc>>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    /// A wildcard session cookie `name=value` for path `/`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            host_only: false,
            path: "/".to_owned(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    /// Parses one `Set-Cookie` header value in the context of the request
    /// URL it arrived on.
    ///
    /// Returns `None` for values that are malformed or that claim a domain
    /// the responding host is not part of. A parsed cookie may already be
    /// expired; storing such a cookie means deleting its predecessor.
    pub fn parse(set_cookie: &str, url: &Url) -> Option<Self> {
        let mut parts = set_cookie.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(value);
        let request_host = url.host_str()?.to_ascii_lowercase();

        let mut domain = None;
        let mut path = None;
        let mut expires = None;
        let mut max_age = None;
        let mut secure = false;
        let mut http_only = false;
        for attribute in parts {
            let (key, val) = match attribute.split_once('=') {
                Some((key, val)) => (key.trim(), val.trim()),
                None => (attribute.trim(), ""),
            };
            if key.eq_ignore_ascii_case("domain") {
                let val = val.trim_start_matches('.').to_ascii_lowercase();
                if !val.is_empty() {
                    domain = Some(val);
                }
            } else if key.eq_ignore_ascii_case("path") {
                if val.starts_with('/') {
                    path = Some(val.to_owned());
                }
            } else if key.eq_ignore_ascii_case("expires") {
                if let Some(parsed) = parse_http_date(val) {
                    expires = Some(parsed);
                }
            } else if key.eq_ignore_ascii_case("max-age") {
                if let Ok(seconds) = val.parse::<i64>() {
                    max_age = Some(seconds);
                }
            } else if key.eq_ignore_ascii_case("secure") {
                secure = true;
            } else if key.eq_ignore_ascii_case("httponly") {
                http_only = true;
            }
        }

        // Max-Age wins over Expires; non-positive means "delete now".
        // Durations are backed by milliseconds, so seconds past that range
        // must be clamped before one is constructed.
        let expires = match max_age {
            Some(seconds) if seconds <= 0 => Some(Utc::now() - chrono::Duration::seconds(1)),
            Some(seconds) => Some(
                Utc::now()
                    .checked_add_signed(chrono::Duration::seconds(seconds.min(i64::MAX / 1_000)))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            None => expires,
        };
        let (domain, host_only) = match domain {
            Some(domain) => {
                if !domain_suffix_matches(&request_host, &domain) {
                    return None;
                }
                (domain, false)
            }
            None => (request_host, true),
        };
        Some(Self {
            name: name.to_owned(),
            value: value.to_owned(),
            domain,
            host_only,
            path: path.unwrap_or_else(|| default_path(url)),
            expires,
            secure,
            http_only,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[inline]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[inline]
    pub fn host_only(&self) -> bool {
        self.host_only
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    #[inline]
    pub fn secure(&self) -> bool {
        self.secure
    }

    #[inline]
    pub fn http_only(&self) -> bool {
        self.http_only
    }

    /// Whether this cookie lives only as long as the jar.
    #[inline]
    pub fn is_session(&self) -> bool {
        self.expires.is_none()
    }

    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(false, |expires| expires <= now)
    }

    /// Restricts the cookie to a domain and its subdomains.
    #[inline]
    #[must_use]
    pub fn set_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain
            .into()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        self.host_only = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn set_host_only(mut self, host_only: bool) -> Self {
        self.host_only = host_only;
        self
    }

    #[inline]
    #[must_use]
    pub fn set_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn set_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    #[inline]
    #[must_use]
    pub fn set_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[inline]
    #[must_use]
    pub fn set_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Whether this cookie should be sent to `url` right now.
    #[inline]
    pub fn matches(&self, url: &Url) -> bool {
        self.matches_at(url, Utc::now())
    }

    fn matches_at(&self, url: &Url, now: DateTime<Utc>) -> bool {
        if self.is_expired_at(now) {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        let host = match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return false,
        };
        self.domain_matches(&host) && path_matches(&self.path, url.path())
    }

    fn domain_matches(&self, host: &str) -> bool {
        if self.domain.is_empty() {
            return true;
        }
        if self.host_only {
            host == self.domain
        } else {
            domain_suffix_matches(host, &self.domain)
        }
    }

    fn key(&self) -> (String, String, String) {
        (self.domain.to_owned(), self.path.to_owned(), self.name.to_owned())
    }
}

/// Cookies a session remembers between requests.
///
/// Keyed by `(domain, path, name)`, so a host can shadow a parent-domain
/// cookie without deleting it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CookieJar {
    cookies: BTreeMap<(String, String, String), Cookie>,
}

impl CookieJar {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds a jar of wildcard cookies from a `k=v; k2=v2` string.
    ///
    /// Items without `=` are skipped.
    pub fn from_cookie_string(cookie_string: &str) -> Self {
        let mut jar = Self::new();
        for item in cookie_string.split(';') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match item.split_once('=') {
                Some((name, value)) if !name.trim().is_empty() => {
                    jar.set(Cookie::new(name.trim(), value.trim()));
                }
                _ => warn!("skipping malformed cookie item: {:?}", item),
            }
        }
        jar
    }

    /// Inserts a cookie, replacing one with the same domain, path and name.
    #[inline]
    pub fn set(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie.key(), cookie);
    }

    #[inline]
    pub fn remove(&mut self, domain: &str, path: &str, name: &str) -> Option<Cookie> {
        self.cookies
            .remove(&(domain.to_owned(), path.to_owned(), name.to_owned()))
    }

    #[inline]
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }

    /// Merges another jar into this one; the other jar's cookies win.
    pub fn merge(&mut self, other: CookieJar) {
        for (key, cookie) in other.cookies {
            self.cookies.insert(key, cookie);
        }
    }

    /// Stores every `Set-Cookie` of a response, in the context of the URL
    /// that produced it.
    ///
    /// An already-expired cookie deletes its stored predecessor, which is
    /// how servers remove cookies. Unreadable or malformed values are
    /// logged and skipped.
    pub fn store_response_cookies(&mut self, headers: &HeaderMap, url: &Url) {
        for value in headers.get_all(SET_COOKIE) {
            match value.to_str() {
                Ok(text) => match Cookie::parse(text, url) {
                    Some(cookie) if cookie.is_expired_at(Utc::now()) => {
                        self.remove(&cookie.domain, &cookie.path, &cookie.name);
                    }
                    Some(cookie) => self.set(cookie),
                    None => warn!("discarding malformed set-cookie: {:?}", text),
                },
                Err(err) => warn!("discarding unreadable set-cookie header: {}", err),
            }
        }
    }

    /// Cookies to send to `url`, longest path first.
    pub fn cookies_for(&self, url: &Url) -> Vec<&Cookie> {
        let now = Utc::now();
        let mut matched: Vec<&Cookie> = self
            .cookies
            .values()
            .filter(|cookie| cookie.matches_at(url, now))
            .collect();
        matched.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| a.name.cmp(&b.name))
        });
        matched
    }

    /// Assembles the `Cookie` header for `url`, if anything matches.
    pub fn cookie_header(&self, url: &Url) -> Option<HeaderValue> {
        let cookies = self.cookies_for(url);
        if cookies.is_empty() {
            return None;
        }
        let joined = cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ");
        match HeaderValue::from_str(&joined) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("cookie header for {} not sendable: {}", url, err);
                None
            }
        }
    }
}

fn domain_suffix_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
            && host.parse::<IpAddr>().is_err())
}

fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/')
                || request_path[cookie_path.len()..].starts_with('/')))
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    if !path.starts_with('/') {
        return "/".to_owned();
    }
    match path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(last_slash) => path[..last_slash].to_owned(),
    }
}

const DATE_FORMATS: &[&str] = &[
    // RFC 1123, the normal case
    "%a, %d %b %Y %H:%M:%S GMT",
    // RFC 850, two-digit years
    "%A, %d-%b-%y %H:%M:%S GMT",
    // RFC 850 with four-digit years, seen in the wild
    "%a, %d-%b-%Y %H:%M:%S GMT",
    // asctime
    "%a %b %e %H:%M:%S %Y",
];

fn parse_http_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(text: &str) -> Url {
        text.parse().unwrap()
    }

    #[test]
    fn test_parse_set_cookie_attributes() {
        let cookie = Cookie::parse(
            "sid=abc123; Domain=.example.test; Path=/app; Expires=Wed, 21 Oct 2065 07:28:00 GMT; Secure; HttpOnly",
            &url("https://www.example.test/app/login"),
        )
        .unwrap();
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "abc123");
        assert_eq!(cookie.domain(), "example.test");
        assert!(!cookie.host_only());
        assert_eq!(cookie.path(), "/app");
        assert!(cookie.secure());
        assert!(cookie.http_only());
        assert!(!cookie.is_session());
        assert!(!cookie.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_parse_rejects_foreign_domain() {
        assert!(Cookie::parse(
            "sid=abc; Domain=other.test",
            &url("http://www.example.test/")
        )
        .is_none());
        assert!(Cookie::parse("=nameless", &url("http://www.example.test/")).is_none());
    }

    #[test]
    fn test_parse_defaults_scope_to_request() {
        let cookie = Cookie::parse("sid=abc", &url("http://www.example.test/a/b/c")).unwrap();
        assert_eq!(cookie.domain(), "www.example.test");
        assert!(cookie.host_only());
        assert_eq!(cookie.path(), "/a/b");
        assert!(cookie.is_session());
    }

    #[test]
    fn test_max_age_wins_over_expires() {
        let cookie = Cookie::parse(
            "sid=abc; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=3600",
            &url("http://www.example.test/"),
        )
        .unwrap();
        assert!(!cookie.is_expired_at(Utc::now()));

        let gone = Cookie::parse("sid=abc; Max-Age=0", &url("http://www.example.test/")).unwrap();
        assert!(gone.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_huge_max_age_saturates() {
        let cookie = Cookie::parse(
            "sid=abc; Max-Age=9223372036854775000",
            &url("http://www.example.test/"),
        )
        .unwrap();
        assert!(!cookie.is_session());
        assert!(!cookie.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_http_date_formats() {
        for text in [
            "Sun, 06 Nov 1994 08:49:37 GMT",
            "Sunday, 06-Nov-94 08:49:37 GMT",
            "Sun, 06-Nov-1994 08:49:37 GMT",
            "Sun Nov  6 08:49:37 1994",
        ] {
            let parsed = parse_http_date(text).unwrap();
            assert_eq!(parsed.timestamp(), 784111777, "format {:?}", text);
        }
        assert!(parse_http_date("not a date").is_none());
    }

    #[test]
    fn test_domain_matching() {
        let subdomains = Cookie::new("a", "1").set_domain("example.test");
        assert!(subdomains.matches(&url("http://example.test/")));
        assert!(subdomains.matches(&url("http://deep.www.example.test/")));
        assert!(!subdomains.matches(&url("http://notexample.test/")));
        assert!(!subdomains.matches(&url("http://other.test/")));

        let host_only = Cookie::parse("b=2", &url("http://www.example.test/")).unwrap();
        assert!(host_only.matches(&url("http://www.example.test/")));
        assert!(!host_only.matches(&url("http://sub.www.example.test/")));

        let wildcard = Cookie::new("c", "3");
        assert!(wildcard.matches(&url("http://anything.anywhere/")));
    }

    #[test]
    fn test_path_and_secure_matching() {
        let cookie = Cookie::new("a", "1").set_path("/app");
        assert!(cookie.matches(&url("http://h.test/app")));
        assert!(cookie.matches(&url("http://h.test/app/deeper")));
        assert!(!cookie.matches(&url("http://h.test/application")));
        assert!(!cookie.matches(&url("http://h.test/")));

        let secure = Cookie::new("s", "1").set_secure(true);
        assert!(secure.matches(&url("https://h.test/")));
        assert!(!secure.matches(&url("http://h.test/")));
    }

    #[test]
    fn test_jar_stores_and_expires() {
        let mut jar = CookieJar::new();
        let origin = url("http://www.example.test/");

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2; Max-Age=3600"));
        headers.append(SET_COOKIE, HeaderValue::from_static("broken"));
        jar.store_response_cookies(&headers, &origin);
        assert_eq!(jar.len(), 2);

        // a later response deletes "b" by sending it expired
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("b=gone; Max-Age=0"));
        jar.store_response_cookies(&headers, &origin);
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.iter().next().unwrap().name(), "a");
    }

    #[test]
    fn test_cookie_header_prefers_longer_paths() {
        let mut jar = CookieJar::new();
        jar.set(Cookie::new("root", "1").set_domain("h.test"));
        jar.set(Cookie::new("app", "2").set_domain("h.test").set_path("/app"));
        jar.set(Cookie::new("other", "3").set_domain("other.test"));

        let header = jar.cookie_header(&url("http://h.test/app/page")).unwrap();
        assert_eq!(header.to_str().unwrap(), "app=2; root=1");
        assert!(jar.cookie_header(&url("http://nobody.test/")).is_none());
    }

    #[test]
    fn test_cookie_string_round_trip() {
        let jar = CookieJar::from_cookie_string("k=v; another=1; malformed; ");
        assert_eq!(jar.len(), 2);
        let header = jar
            .cookie_header(&url("http://anything.test/"))
            .unwrap();
        assert_eq!(header.to_str().unwrap(), "another=1; k=v");
    }

    #[test]
    fn test_ip_hosts_never_domain_match() {
        let cookie = Cookie::new("a", "1").set_domain("0.1");
        assert!(!cookie.matches(&url("http://10.0.0.1/")));
    }
}
