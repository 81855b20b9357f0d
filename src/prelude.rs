//! Convenient re-exports for declaring and calling endpoints.
pub use crate::{
    binding::{Args, BodyEncoding, Param},
    cache::{CacheOptions, CacheRegistry},
    client::{Client, ClientBuilder, ClientConfig, ClientHooks},
    decode::{Decoder, Full, Json, JsonPointer, Raw, Text, Unit},
    endpoint::{BoundEndpoint, Endpoint},
    error::{Error, ErrorKind, Result},
    pipeline::{priority, Context, Interceptor},
    rate_limit::TokenBucketLimiter,
    request::Request,
    response::Response,
    retry::{Condition, RetryPolicy, RetryPolicyBuilder, Wait},
    transport::{ServiceTransport, Transport},
    Credentials,
};
