//! Authentication error types.
//!
//! These errors are specific to the verification process (missing parameters,
//! expired signatures, unknown access keys). Callers are expected to map them
//! onto the wire-level S3 error taxonomy at the HTTP boundary; this type does
//! not know about HTTP status codes or AWS error codes itself.

use thiserror::Error;

/// Errors that can occur while verifying a SigV4 request.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The computed signature did not match the one supplied by the client.
    #[error("the request signature we calculated does not match the signature you provided")]
    SignatureDoesNotMatch,

    /// The access key id in the request is not known to the credential provider.
    #[error("the AWS access key id you provided does not exist in our records")]
    InvalidAccessKeyId,

    /// The caller is authenticated but not permitted to perform this action.
    #[error("access denied")]
    AccessDenied,

    /// `X-Amz-Date` is further from the current time than the allowed skew.
    #[error("the difference between the request time and the current time is too large")]
    RequestTimeTooSkewed,

    /// A presigned URL's `X-Amz-Expires` window has elapsed.
    #[error("request has expired")]
    RequestExpired,

    /// A required query parameter was absent or malformed.
    #[error("missing or invalid query parameter: {0}")]
    MissingQueryParam(String),

    /// A header listed in `SignedHeaders` was not present on the request.
    #[error("missing signed header: {0}")]
    MissingHeader(String),

    /// `X-Amz-Algorithm` (or `Authorization`'s algorithm token) was not `AWS4-HMAC-SHA256`.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The credential scope (`AKID/date/region/service/aws4_request`) was malformed.
    #[error("invalid credential scope")]
    InvalidCredential,

    /// The `Authorization` header was missing or did not parse as `AWS4-HMAC-SHA256 ...`.
    #[error("missing or malformed Authorization header")]
    MalformedAuthorizationHeader,

    /// `X-Amz-Date` (or the `Date` header fallback) was missing or unparsable.
    #[error("missing or invalid X-Amz-Date header")]
    MissingDateHeader,

    /// A chunk in a `STREAMING-AWS4-HMAC-SHA256-PAYLOAD` body was malformed or its
    /// chained signature did not match.
    #[error("malformed or unsigned chunk in streaming upload")]
    InvalidChunkSignature,
}
