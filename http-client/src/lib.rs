//! Session-level HTTP request orchestration over a Taskline engine.
//!
//! A [`Session`] prepares logical requests, frames each attempt into an
//! engine unit, and drives retries, backoff waits, redirect hops and
//! cookie updates from the engine's completion callbacks until the
//! outcome reaches a terminal handler.

#![deny(unsafe_code)]

mod client;
pub mod cookies;

#[cfg(test)]
mod test_utils;

pub extern crate taskline_engine as engine;

pub use client::{
    ApiResult, Authorization, AuthorizationError, AuthorizationResult, Backoff, BackoffOptions,
    BuildError, BuildResult, CancellationToken, Error, ErrorKind, ExponentialBackoff, FieldName,
    FileName, FixedBackoff, FollowUp, FollowUps, GotBackoffDuration, JoinOutcome,
    LimitedBackoff, LimitedRetryPolicy, Multipart, NeverRetryPolicy, OnFailure, OnResponse, Part,
    PartMetadata, PreparedRequest, Proxy, QueryPair, QueryPairKey, QueryPairValue, QueryPairs,
    RandomizedBackoff, Ratio, RedirectPolicy, RedirectPolicyBuilder, RequestBuilder, Response,
    RetryDecision, RetryOptions, RetryPolicy, RetryResult, RetryStats, SendOptions, Session,
    SessionBuilder, TransportRetryPolicy, NO_BACKOFF,
};
pub use cookies::{Cookie, CookieJar};
