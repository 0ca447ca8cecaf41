mod authorization;
mod backoff;
mod call;
mod callbacks;
mod cancellation;
mod follow_up;
mod proxy;
mod redirect;
mod request;
mod response;
mod retrier;
mod session;
mod stats;

pub use authorization::{Authorization, AuthorizationError, AuthorizationResult};
pub use backoff::{
    Backoff, BackoffOptions, ExponentialBackoff, FixedBackoff, GotBackoffDuration, LimitedBackoff,
    RandomizedBackoff, Ratio, NO_BACKOFF,
};
pub use cancellation::CancellationToken;
pub use follow_up::{FollowUp, FollowUps, OnFailure, OnResponse};
pub use proxy::Proxy;
pub use redirect::{RedirectPolicy, RedirectPolicyBuilder};
pub use request::{
    BuildError, BuildResult, FieldName, FileName, Multipart, Part, PartMetadata, PreparedRequest,
    QueryPair, QueryPairKey, QueryPairValue, QueryPairs, RequestBuilder, SendOptions,
};
pub use response::{ApiResult, Error, ErrorKind, Response};
pub use retrier::{
    LimitedRetryPolicy, NeverRetryPolicy, RetryDecision, RetryOptions, RetryPolicy, RetryResult,
    TransportRetryPolicy,
};
pub use session::{JoinOutcome, Session, SessionBuilder};
pub use stats::RetryStats;
