mod error;

use assert_impl::assert_impl;
use log::warn;
use serde::de::DeserializeOwned;
use std::{io::Read, mem::take, time::Duration};
use taskline_engine::{
    header::LOCATION, Error as EngineError, ErrorKind as EngineErrorKind, HeaderMap, HeaderValue,
    Method, Response as EngineResponse, ResponseBody, StatusCode, Version,
};
use url::Url;

pub use error::{Error, ErrorKind};

/// Result of a delivered logical request.
pub type ApiResult<T> = Result<T, Error>;

/// Response of one logical request, as handed to terminal handlers.
///
/// Compared to the engine-level response this knows which URL actually
/// answered (after redirects), how long the final attempt took, and which
/// redirect hops were followed on the way here.
#[derive(Debug)]
pub struct Response {
    status_code: StatusCode,
    version: Version,
    headers: HeaderMap,
    reason_phrase: Box<str>,
    url: Url,
    method: Method,
    elapsed: Duration,
    history: Vec<Response>,
    body: ResponseBody,
}

impl Response {
    pub(super) fn from_engine(
        mut response: EngineResponse,
        method: Method,
        url: Url,
        elapsed: Duration,
    ) -> Self {
        let status_code = response.status_code();
        let version = response.version();
        let reason_phrase = response.reason_phrase().to_owned().into_boxed_str();
        let headers = take(response.headers_mut());
        Self {
            status_code,
            version,
            headers,
            reason_phrase,
            url,
            method,
            elapsed,
            history: Default::default(),
            body: response.into_body(),
        }
    }

    pub(super) fn set_history(&mut self, history: Vec<Response>) {
        self.history = history;
    }

    /// HTTP status code.
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// HTTP version the server answered with.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Response headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Convenience accessor for a single header value.
    #[inline]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Reason phrase as sent by the server, or the canonical one.
    #[inline]
    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    /// URL that produced this response, after any redirects.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Method of the request that produced this response.
    ///
    /// May differ from the submitted method when a redirect rewrote it.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Elapsed time of the final attempt, from hand-off to completion.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Redirect hops followed before this response, oldest first.
    #[inline]
    pub fn history(&self) -> &[Response] {
        &self.history
    }

    /// Whether the status code is 2xx.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }

    /// Whether this response asks the client to go elsewhere.
    ///
    /// Only statuses the session knows how to follow count, and only when a
    /// `Location` header is present.
    #[inline]
    pub fn is_redirect(&self) -> bool {
        matches!(self.status_code.as_u16(), 301 | 302 | 303 | 307 | 308)
            && self.headers.contains_key(LOCATION)
    }

    /// `Location` header as a string, if present and readable.
    #[inline]
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|value| {
            value
                .to_str()
                .map_err(|err| warn!("unreadable location header: {}", err))
                .ok()
        })
    }

    /// Body stream.
    #[inline]
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Mutable body stream.
    #[inline]
    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    /// Extracts the body stream.
    #[inline]
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Drains the body into memory.
    pub fn into_bytes(mut self) -> ApiResult<Vec<u8>> {
        self.read_body()
    }

    /// Drains the body and decodes it as text, replacing invalid UTF-8.
    pub fn text(&mut self) -> ApiResult<String> {
        let bytes = self.read_body()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Drains the body and deserializes it as JSON.
    pub fn json<T: DeserializeOwned>(&mut self) -> ApiResult<T> {
        let bytes = self.read_body()?;
        serde_json::from_slice(&bytes)
            .map_err(|err| self.interpret_error(ErrorKind::MalformedResponse, err))
    }

    fn read_body(&mut self) -> ApiResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.body.read_to_end(&mut bytes).map_err(|err| {
            let kind = ErrorKind::TransportError(EngineErrorKind::ReceiveError);
            self.interpret_error(kind, EngineError::new(EngineErrorKind::ReceiveError, err))
        })?;
        Ok(bytes)
    }

    fn interpret_error(&self, kind: ErrorKind, err: impl Into<anyhow::Error>) -> Error {
        Error::new(kind, err, self.method.to_owned(), self.url.to_owned())
    }

    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
        assert_impl!(Sync: Self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::error::Error as StdError;

    fn delivered(engine_response: EngineResponse) -> Response {
        Response::from_engine(
            engine_response,
            Method::GET,
            "http://www.example.test/found".parse().unwrap(),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_response_json() -> Result<(), Box<dyn StdError>> {
        #[derive(Deserialize)]
        struct Greeting {
            message: String,
        }

        let mut response = delivered(
            EngineResponse::builder()
                .status_code(StatusCode::OK)
                .bytes_as_body(json!({"message": "hello"}).to_string())
                .build(),
        );
        let greeting = response.json::<Greeting>()?;
        assert_eq!(greeting.message, "hello");
        Ok(())
    }

    #[test]
    fn test_response_json_rejects_garbage() {
        let mut response = delivered(
            EngineResponse::builder()
                .status_code(StatusCode::OK)
                .bytes_as_body("{not json")
                .build(),
        );
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert_eq!(err.url().as_str(), "http://www.example.test/found");
    }

    #[test]
    fn test_response_text_is_lossy() -> Result<(), Box<dyn StdError>> {
        let mut response = delivered(
            EngineResponse::builder()
                .status_code(StatusCode::OK)
                .bytes_as_body(vec![b'o', b'k', 0xff])
                .build(),
        );
        assert_eq!(response.text()?, "ok\u{fffd}");
        Ok(())
    }

    #[test]
    fn test_redirect_detection_requires_location() {
        let bare = delivered(
            EngineResponse::builder()
                .status_code(StatusCode::MOVED_PERMANENTLY)
                .build(),
        );
        assert!(!bare.is_redirect());

        let with_location = delivered(
            EngineResponse::builder()
                .status_code(StatusCode::MOVED_PERMANENTLY)
                .header(LOCATION, HeaderValue::from_static("/new"))
                .build(),
        );
        assert!(with_location.is_redirect());
        assert_eq!(with_location.location(), Some("/new"));

        let not_a_redirect = delivered(
            EngineResponse::builder()
                .status_code(StatusCode::NOT_MODIFIED)
                .header(LOCATION, HeaderValue::from_static("/cached"))
                .build(),
        );
        assert!(!not_a_redirect.is_redirect());
    }
}
