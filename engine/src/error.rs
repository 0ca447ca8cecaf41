use anyhow::Error as AnyError;
use std::{error::Error as StdError, fmt, result};
use thiserror::Error as ThisError;

/// Failure classes an engine may report for a completed HTTP unit.
///
/// This is the structured completion state of a unit-of-work: the engine
/// maps whatever its transport reports into one of these kinds and attaches
/// the underlying error as the source.
#[derive(ThisError, Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Protocol violation on the wire
    #[error("protocol error")]
    ProtocolError,

    /// The request URL was rejected by the transport
    #[error("invalid URL")]
    InvalidUrl,

    /// Could not establish a connection
    #[error("connect error")]
    ConnectError,

    /// Could not reach or traverse the configured proxy
    #[error("proxy error")]
    ProxyError,

    /// Name resolution failed
    #[error("DNS error")]
    DnsError,

    /// TLS negotiation failed
    #[error("TLS error")]
    TlsError,

    /// Sending the request failed mid-transfer
    #[error("send error")]
    SendError,

    /// Receiving the response failed mid-transfer
    #[error("receive error")]
    ReceiveError,

    /// The send or receive timeout expired
    #[error("timeout")]
    TimeoutError,

    /// The response exceeded the configured size limit
    #[error("response size limit exceeded")]
    SizeLimitExceeded,

    /// Local I/O failure (reading the request body, for example)
    #[error("local I/O error")]
    LocalIoError,

    /// Anything the engine could not classify
    #[error("unknown error")]
    UnknownError,
}

/// Failure outcome of an HTTP unit-of-work.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    error: AnyError,
}

impl Error {
    /// Wraps an underlying transport error with its failure class.
    #[inline]
    pub fn new(kind: ErrorKind, err: impl Into<AnyError>) -> Self {
        Error {
            kind,
            error: err.into(),
        }
    }

    /// Builds an error from a bare message.
    #[inline]
    pub fn new_with_msg(kind: ErrorKind, msg: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Error {
            kind,
            error: AnyError::msg(msg),
        }
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn into_inner(self) -> AnyError {
        self.error
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.error)
    }
}

impl StdError for Error {
    #[inline]
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.error.as_ref())
    }
}

/// Outcome of an HTTP unit-of-work.
pub type Result<T> = result::Result<T, Error>;
