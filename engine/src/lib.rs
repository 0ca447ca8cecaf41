//! Contract types for Taskline task-execution engines.
//!
//! An engine backend implements [`Scheduler`] over the unit-of-work model
//! defined here; clients build [`Chain`]s of [`Unit`]s and observe outcomes
//! through completion callbacks.

#![deny(unsafe_code)]

mod error;
mod request;
mod response;
mod scheduler;
mod unit;

pub use error::{Error, ErrorKind, Result};
pub use request::{ReadDebug, Request, RequestBody, RequestBuilder, Reset};
pub use response::{Response, ResponseBody, ResponseBuilder};
pub use scheduler::Scheduler;
pub use unit::{Chain, ChainScope, Completion, OnComplete, OnFire, Unit};

pub use http::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    method::Method,
    status::StatusCode,
    uri::{Authority, InvalidUri, Uri},
    Extensions, Version,
};
