use assert_impl::assert_impl;
use http::{
    header::{HeaderMap, IntoHeaderName},
    HeaderValue, StatusCode, Version,
};
use std::{
    fmt::Debug,
    io::{Cursor, Read, Result as IoResult},
    mem::take,
};

use super::ReadDebug;

/// One HTTP exchange outcome as assembled by an engine.
///
/// The reason phrase is kept verbatim when the server sent one; otherwise
/// [`Response::reason_phrase`] falls back to the canonical phrase for the
/// status code.
#[derive(Debug, Default)]
pub struct Response {
    status_code: StatusCode,
    version: Version,
    headers: HeaderMap,
    reason_phrase: Option<Box<str>>,
    body: ResponseBody,
}

impl Response {
    /// Creates a response builder.
    #[inline]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// Response status code.
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    #[inline]
    pub fn status_code_mut(&mut self) -> &mut StatusCode {
        &mut self.status_code
    }

    /// HTTP version the server spoke.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Response headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Reason phrase as sent by the server, or the canonical phrase of the
    /// status code when the server sent none.
    #[inline]
    pub fn reason_phrase(&self) -> &str {
        match &self.reason_phrase {
            Some(reason) => reason,
            None => self.status_code.canonical_reason().unwrap_or(""),
        }
    }

    /// Response body.
    #[inline]
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    #[inline]
    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    #[inline]
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

/// Builder for [`Response`]; engines assemble one per completed exchange.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    inner: Response,
}

impl ResponseBuilder {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the status code.
    #[inline]
    pub fn status_code(&mut self, status_code: StatusCode) -> &mut Self {
        self.inner.status_code = status_code;
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

    /// Records the reason phrase the server actually sent.
    #[inline]
    pub fn reason_phrase(&mut self, reason_phrase: impl Into<String>) -> &mut Self {
        self.inner.reason_phrase = Some(reason_phrase.into().into_boxed_str());
        self
    }

    /// Uses fully buffered bytes as the body.
    #[inline]
    pub fn bytes_as_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.inner.body = ResponseBody::from_bytes(body.into());
        self
    }

    /// Uses a streaming reader as the body.
    #[inline]
    pub fn stream_as_body(&mut self, body: impl Read + Debug + Send + Sync + 'static) -> &mut Self {
        self.inner.body = ResponseBody::from_reader(body);
        self
    }

    /// Builds the response and resets the builder.
    #[inline]
    pub fn build(&mut self) -> Response {
        take(&mut self.inner)
    }
}

/// HTTP response body.
///
/// Engines may hand back fully buffered bytes or a streaming reader;
/// [`ResponseBody::into_bytes`] materializes either form.
#[derive(Debug)]
pub struct ResponseBody(BodyInner);

#[derive(Debug)]
enum BodyInner {
    Bytes(Cursor<Vec<u8>>),
    Reader(Box<dyn ReadDebug>),
}

impl ResponseBody {
    /// Builds a body from owned bytes.
    #[inline]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(BodyInner::Bytes(Cursor::new(bytes)))
    }

    /// Builds a body that streams from a reader.
    #[inline]
    pub fn from_reader(reader: impl Read + Debug + Send + Sync + 'static) -> Self {
        Self(BodyInner::Reader(Box::new(reader)))
    }

    /// Reads whatever has not been consumed yet into memory.
    pub fn into_bytes(mut self) -> IoResult<Vec<u8>> {
        if let BodyInner::Bytes(bytes) = &mut self.0 {
            if bytes.position() == 0 {
                return Ok(take(bytes).into_inner());
            }
        }
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

impl Default for ResponseBody {
    #[inline]
    fn default() -> Self {
        Self::from_bytes(Default::default())
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match &mut self.0 {
            BodyInner::Bytes(bytes) => bytes.read(buf),
            BodyInner::Reader(reader) => reader.read(buf),
        }
    }
}

impl From<Vec<u8>> for ResponseBody {
    #[inline]
    fn from(body: Vec<u8>) -> Self {
        Self::from_bytes(body)
    }
}

impl From<String> for ResponseBody {
    #[inline]
    fn from(body: String) -> Self {
        Self::from_bytes(body.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    #[test]
    fn test_builder_defaults() {
        let response = Response::builder().build();
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.version(), Version::HTTP_11);
        assert_eq!(response.reason_phrase(), "OK");
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_reason_phrase_prefers_server_phrase() {
        let response = Response::builder()
            .status_code(StatusCode::NOT_FOUND)
            .reason_phrase("Gone Fishing")
            .build();
        assert_eq!(response.reason_phrase(), "Gone Fishing");

        let response = Response::builder().status_code(StatusCode::NOT_FOUND).build();
        assert_eq!(response.reason_phrase(), "Not Found");

        let response = Response::builder()
            .status_code(StatusCode::from_u16(599).unwrap())
            .build();
        assert_eq!(response.reason_phrase(), "");
    }

    #[test]
    fn test_builder_assembles_response() {
        let response = Response::builder()
            .status_code(StatusCode::CREATED)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .bytes_as_body("created")
            .build();
        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(response.into_body().into_bytes().unwrap(), b"created");
    }

    #[test]
    fn test_stream_body_materializes() {
        let response = Response::builder()
            .stream_as_body(Cursor::new(b"streamed".to_vec()))
            .build();
        assert_eq!(response.into_body().into_bytes().unwrap(), b"streamed");
    }

    #[test]
    fn test_partially_read_body_yields_remainder() {
        let mut body = ResponseBody::from_bytes(b"abcdef".to_vec());
        let mut buf = [0u8; 2];
        body.read_exact(&mut buf).unwrap();
        assert_eq!(body.into_bytes().unwrap(), b"cdef");
    }
}
