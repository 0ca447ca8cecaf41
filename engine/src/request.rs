use assert_impl::assert_impl;
use http::{
    header::{HeaderMap, IntoHeaderName},
    uri::{Authority, Uri},
    HeaderValue, Method, Version,
};
use std::{
    fmt::Debug,
    io::{Cursor, Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult},
    mem::take,
    time::Duration,
};

/// One HTTP exchange as handed to an engine.
///
/// Timeouts left unset mean "use the engine's default"; `connect_to`
/// overrides the connection target, in which case the engine must connect
/// there and write the request line in absolute form (proxy framing).
#[derive(Debug)]
pub struct Request {
    url: Uri,
    method: Method,
    version: Version,
    headers: HeaderMap,
    body: RequestBody,
    connect_to: Option<Authority>,
    keep_alive: bool,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    size_limit: Option<u64>,
}

impl Request {
    /// Creates a request builder.
    #[inline]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Request URL.
    #[inline]
    pub fn url(&self) -> &Uri {
        &self.url
    }

    #[inline]
    pub fn url_mut(&mut self) -> &mut Uri {
        &mut self.url
    }

    /// Request method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.method
    }

    /// HTTP version to speak.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn version_mut(&mut self) -> &mut Version {
        &mut self.version
    }

    /// Request headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Request body.
    #[inline]
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    #[inline]
    pub fn body_mut(&mut self) -> &mut RequestBody {
        &mut self.body
    }

    #[inline]
    pub fn into_body(self) -> RequestBody {
        self.body
    }

    /// Connection target override, if any.
    #[inline]
    pub fn connect_to(&self) -> Option<&Authority> {
        self.connect_to.as_ref()
    }

    #[inline]
    pub fn connect_to_mut(&mut self) -> &mut Option<Authority> {
        &mut self.connect_to
    }

    /// Whether the connection may be reused after this exchange.
    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    #[inline]
    pub fn keep_alive_mut(&mut self) -> &mut bool {
        &mut self.keep_alive
    }

    /// Send-phase timeout; `None` means the engine default.
    #[inline]
    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout
    }

    /// Receive-phase timeout; `None` means the engine default.
    #[inline]
    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout
    }

    /// Response size cap; exceeding it must complete the unit with
    /// [`ErrorKind::SizeLimitExceeded`](super::ErrorKind::SizeLimitExceeded).
    #[inline]
    pub fn size_limit(&self) -> Option<u64> {
        self.size_limit
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

impl Default for Request {
    #[inline]
    fn default() -> Self {
        Self {
            url: Default::default(),
            method: Default::default(),
            version: Default::default(),
            headers: Default::default(),
            body: Default::default(),
            connect_to: None,
            keep_alive: true,
            send_timeout: None,
            receive_timeout: None,
            size_limit: None,
        }
    }
}

/// Builder for [`Request`].
#[derive(Debug, Default)]
pub struct RequestBuilder {
    inner: Request,
}

impl RequestBuilder {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the request URL.
    #[inline]
    pub fn url(&mut self, url: Uri) -> &mut Self {
        self.inner.url = url;
        self
    }

    /// Sets the request method.
    #[inline]
    pub fn method(&mut self, method: Method) -> &mut Self {
        self.inner.method = method;
        self
    }

    /// Sets the HTTP version.
    #[inline]
    pub fn version(&mut self, version: Version) -> &mut Self {
        self.inner.version = version;
        self
    }

    /// Replaces the header map.
    #[inline]
    pub fn headers(&mut self, headers: HeaderMap) -> &mut Self {
        self.inner.headers = headers;
        self
    }

    /// Inserts one header.
    #[inline]
    pub fn header(&mut self, header_name: impl IntoHeaderName, header_value: impl Into<HeaderValue>) -> &mut Self {
        self.inner.headers.insert(header_name, header_value.into());
        self
    }

    /// Sets the request body.
    #[inline]
    pub fn body(&mut self, body: impl Into<RequestBody>) -> &mut Self {
        self.inner.body = body.into();
        self
    }

    /// Routes the connection to the given authority instead of the URL host.
    #[inline]
    pub fn connect_to(&mut self, authority: Authority) -> &mut Self {
        self.inner.connect_to = Some(authority);
        self
    }

    /// Sets connection reuse after this exchange.
    #[inline]
    pub fn keep_alive(&mut self, keep_alive: bool) -> &mut Self {
        self.inner.keep_alive = keep_alive;
        self
    }

    /// Bounds the send phase.
    #[inline]
    pub fn send_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.inner.send_timeout = Some(timeout);
        self
    }

    /// Bounds the receive phase.
    #[inline]
    pub fn receive_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.inner.receive_timeout = Some(timeout);
        self
    }

    /// Caps the response size.
    #[inline]
    pub fn size_limit(&mut self, limit: u64) -> &mut Self {
        self.inner.size_limit = Some(limit);
        self
    }

    /// Builds the request and resets the builder.
    #[inline]
    pub fn build(&mut self) -> Request {
        take(&mut self.inner)
    }
}

/// Rewind support for request bodies.
///
/// Retries and redirects resend a body that may already have been read;
/// a body that cannot rewind reports `Unsupported` and the caller decides
/// whether that is fatal.
pub trait Reset {
    fn reset(&mut self) -> IoResult<()>;
}

impl<T: AsRef<[u8]>> Reset for Cursor<T> {
    #[inline]
    fn reset(&mut self) -> IoResult<()> {
        self.set_position(0);
        Ok(())
    }
}

/// Readers an engine accepts as bodies.
pub trait ReadDebug: Read + Debug + Send + Sync {}
impl<T: Read + Debug + Send + Sync> ReadDebug for T {}

trait ReadResetDebug: Read + Reset + Debug + Send + Sync {}
impl<T: Read + Reset + Debug + Send + Sync> ReadResetDebug for T {}

/// HTTP request body.
///
/// Byte-backed and resettable-reader bodies replay; a plain reader body is
/// one-shot and fails [`Reset::reset`].
#[derive(Debug)]
pub struct RequestBody(BodyInner);

#[derive(Debug)]
enum BodyInner {
    Bytes(Cursor<Vec<u8>>),
    Reader { reader: Box<dyn ReadDebug>, size: u64 },
    Resettable { reader: Box<dyn ReadResetDebug>, size: u64 },
}

impl RequestBody {
    /// Builds a body from owned bytes.
    #[inline]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(BodyInner::Bytes(Cursor::new(bytes)))
    }

    /// Builds a one-shot body from a reader; it cannot be replayed.
    #[inline]
    pub fn from_reader(reader: impl Read + Debug + Send + Sync + 'static, size: u64) -> Self {
        Self(BodyInner::Reader {
            reader: Box::new(reader),
            size,
        })
    }

    /// Builds a replayable body from a reader that can rewind.
    #[inline]
    pub fn from_resettable_reader(reader: impl Read + Reset + Debug + Send + Sync + 'static, size: u64) -> Self {
        Self(BodyInner::Resettable {
            reader: Box::new(reader),
            size,
        })
    }

    /// Body size in bytes, as declared for readers or measured for bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        match &self.0 {
            BodyInner::Bytes(bytes) => bytes.get_ref().len() as u64,
            BodyInner::Reader { size, .. } => *size,
            BodyInner::Resettable { size, .. } => *size,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

impl Default for RequestBody {
    #[inline]
    fn default() -> Self {
        Self::from_bytes(Default::default())
    }
}

impl Read for RequestBody {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match &mut self.0 {
            BodyInner::Bytes(bytes) => bytes.read(buf),
            BodyInner::Reader { reader, .. } => reader.read(buf),
            BodyInner::Resettable { reader, .. } => reader.read(buf),
        }
    }
}

impl Reset for RequestBody {
    fn reset(&mut self) -> IoResult<()> {
        match &mut self.0 {
            BodyInner::Bytes(bytes) => bytes.reset(),
            BodyInner::Reader { .. } => Err(IoError::new(
                IoErrorKind::Unsupported,
                "request body reader cannot be rewound",
            )),
            BodyInner::Resettable { reader, .. } => reader.reset(),
        }
    }
}

impl From<Vec<u8>> for RequestBody {
    #[inline]
    fn from(body: Vec<u8>) -> Self {
        Self::from_bytes(body)
    }
}

impl From<String> for RequestBody {
    #[inline]
    fn from(body: String) -> Self {
        Self::from_bytes(body.into_bytes())
    }
}

impl From<&[u8]> for RequestBody {
    #[inline]
    fn from(body: &[u8]) -> Self {
        Self::from_bytes(body.to_owned())
    }
}

impl From<&str> for RequestBody {
    #[inline]
    fn from(body: &str) -> Self {
        Self::from_bytes(body.as_bytes().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::USER_AGENT;

    #[test]
    fn test_builder_defaults() {
        let request = Request::builder().build();
        assert_eq!(request.method(), Method::GET);
        assert!(request.keep_alive());
        assert!(request.connect_to().is_none());
        assert!(request.send_timeout().is_none());
        assert!(request.receive_timeout().is_none());
        assert!(request.size_limit().is_none());
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_builder_assembles_request() {
        let request = Request::builder()
            .url("http://example.test/a?b=c".parse().unwrap())
            .method(Method::POST)
            .header(USER_AGENT, HeaderValue::from_static("taskline-test"))
            .body("hello")
            .keep_alive(false)
            .send_timeout(Duration::from_secs(3))
            .size_limit(1024)
            .build();
        assert_eq!(request.url().path(), "/a");
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.headers().get(USER_AGENT).unwrap(), "taskline-test");
        assert_eq!(request.body().size(), 5);
        assert!(!request.keep_alive());
        assert_eq!(request.send_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(request.size_limit(), Some(1024));
    }

    #[test]
    fn test_bytes_body_resets() {
        let mut body = RequestBody::from_bytes(b"abcdef".to_vec());
        let mut buf = [0u8; 3];
        body.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        body.reset().unwrap();
        let mut all = Vec::new();
        body.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"abcdef");
    }

    #[test]
    fn test_one_shot_reader_body_refuses_reset() {
        struct OneShot(std::io::Take<std::io::Repeat>);
        impl Read for OneShot {
            fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
                self.0.read(buf)
            }
        }
        impl Debug for OneShot {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("OneShot")
            }
        }

        let mut body = RequestBody::from_reader(OneShot(std::io::repeat(b'x').take(4)), 4);
        assert_eq!(body.size(), 4);
        let err = body.reset().unwrap_err();
        assert_eq!(err.kind(), IoErrorKind::Unsupported);
    }

    #[test]
    fn test_resettable_reader_body_resets() {
        let mut body = RequestBody::from_resettable_reader(Cursor::new(b"xyz".to_vec()), 3);
        let mut all = Vec::new();
        body.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"xyz");
        body.reset().unwrap();
        all.clear();
        body.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"xyz");
    }
}
