use std::fmt;
use taskline_engine::{
    header::{InvalidHeaderValue, AUTHORIZATION},
    HeaderMap, HeaderValue,
};
use thiserror::Error;

/// HTTP authentication applied to outgoing requests before submission.
#[derive(Clone)]
#[non_exhaustive]
pub enum Authorization {
    /// `Authorization: Basic` with the given credentials.
    Basic { username: String, password: String },

    /// `Authorization: Bearer` with the given token.
    Bearer(String),
}

impl Authorization {
    #[inline]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    #[inline]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Inserts the `Authorization` header for this scheme, replacing any
    /// previous value.
    pub fn sign(&self, headers: &mut HeaderMap) -> AuthorizationResult<()> {
        headers.insert(AUTHORIZATION, self.header_value()?);
        Ok(())
    }

    fn header_value(&self) -> AuthorizationResult<HeaderValue> {
        let value = match self {
            Self::Basic { username, password } => {
                let encoded = base64::encode(format!("{}:{}", username, password));
                HeaderValue::from_str(&format!("Basic {}", encoded))?
            }
            Self::Bearer(token) => HeaderValue::from_str(&format!("Bearer {}", token))?,
        };
        Ok(value)
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f.debug_struct("Basic").field("username", username).finish(),
            Self::Bearer(_) => f.debug_struct("Bearer").finish(),
        }
    }
}

/// Errors assembling an `Authorization` header.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AuthorizationError {
    /// The assembled value contains bytes HTTP headers forbid
    #[error("invalid authorization header: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
}

pub type AuthorizationResult<T> = Result<T, AuthorizationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_signs_rfc7617_example() {
        let mut headers = HeaderMap::new();
        Authorization::basic("Aladdin", "open sesame").sign(&mut headers).unwrap();
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn test_bearer_signs_token() {
        let mut headers = HeaderMap::new();
        Authorization::bearer("mF_9.B5f-4.1JqM").sign(&mut headers).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer mF_9.B5f-4.1JqM");
    }

    #[test]
    fn test_bearer_rejects_control_bytes() {
        let mut headers = HeaderMap::new();
        let err = Authorization::bearer("bad\ntoken").sign(&mut headers).unwrap_err();
        assert!(matches!(err, AuthorizationError::InvalidHeaderValue(_)));
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let debugged = format!("{:?}", Authorization::basic("user", "hunter2"));
        assert!(!debugged.contains("hunter2"));
        let debugged = format!("{:?}", Authorization::bearer("secret-token"));
        assert!(!debugged.contains("secret-token"));
    }
}
