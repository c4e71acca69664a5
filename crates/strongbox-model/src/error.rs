//! The wire-facing S3 error type: the sixteen error codes the protocol
//! surface can return, and the XML `Error` shape they render into.

/// S3 error codes returned by the protocol surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum S3ErrorCode {
    NoSuchBucket,
    NoSuchKey,
    BucketAlreadyExists,
    BucketNotEmpty,
    AccessDenied,
    SignatureDoesNotMatch,
    InvalidAccessKeyId,
    RequestTimeTooSkewed,
    NoSuchUpload,
    InvalidPart,
    InvalidArgument,
    EntityTooLarge,
    BadDigest,
    MethodNotAllowed,
    InternalError,
    NotImplemented,
}

impl S3ErrorCode {
    /// Returns the AWS-compatible error code string, e.g. `"NoSuchBucket"`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::AccessDenied => "AccessDenied",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidArgument => "InvalidArgument",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::BadDigest => "BadDigest",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::InternalError => "InternalError",
            Self::NotImplemented => "NotImplemented",
        }
    }

    /// The HTTP status code AWS associates with this error code.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::NoSuchBucket | Self::NoSuchKey | Self::NoSuchUpload => http::StatusCode::NOT_FOUND,
            Self::BucketAlreadyExists | Self::BucketNotEmpty => http::StatusCode::CONFLICT,
            Self::AccessDenied
            | Self::SignatureDoesNotMatch
            | Self::InvalidAccessKeyId
            | Self::RequestTimeTooSkewed => http::StatusCode::FORBIDDEN,
            Self::InvalidPart | Self::InvalidArgument | Self::BadDigest => http::StatusCode::BAD_REQUEST,
            Self::EntityTooLarge => http::StatusCode::PAYLOAD_TOO_LARGE,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => http::StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// The default human-readable message AWS uses for this error code.
    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::NoSuchBucket => "The specified bucket does not exist",
            Self::NoSuchKey => "The specified key does not exist",
            Self::BucketAlreadyExists => "The requested bucket name is not available",
            Self::BucketNotEmpty => "The bucket you tried to delete is not empty",
            Self::AccessDenied => "Access Denied",
            Self::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided"
            }
            Self::InvalidAccessKeyId => "The access key ID you provided does not exist",
            Self::RequestTimeTooSkewed => {
                "The difference between the request time and the server's time is too large"
            }
            Self::NoSuchUpload => "The specified multipart upload does not exist",
            Self::InvalidPart => "One or more of the specified parts could not be found",
            Self::InvalidArgument => "Invalid Argument",
            Self::EntityTooLarge => "Your proposed upload exceeds the maximum allowed size",
            Self::BadDigest => "The Content-MD5 you specified did not match what we received",
            Self::MethodNotAllowed => "The specified method is not allowed against this resource",
            Self::InternalError => "We encountered an internal error. Please try again",
            Self::NotImplemented => "A header you provided implies functionality that is not implemented",
        }
    }
}

impl std::fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An S3-protocol error: code, message, and enough context to render the
/// AWS `Error` XML shape and pick the right HTTP status.
#[derive(Debug)]
pub struct S3Error {
    pub code: S3ErrorCode,
    pub message: String,
    pub resource: Option<String>,
    pub request_id: Option<String>,
    pub status_code: http::StatusCode,
    pub source: Option<anyhow::Error>,
}

impl S3Error {
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.default_message().to_owned(),
            code,
            resource: None,
            request_id: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn no_such_bucket(bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        Self::new(S3ErrorCode::NoSuchBucket).with_resource(bucket)
    }

    #[must_use]
    pub fn no_such_key(resource: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchKey).with_resource(resource)
    }

    #[must_use]
    pub fn no_such_upload(upload_id: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchUpload)
            .with_message(format!("The upload ID {} does not exist", upload_id.into()))
    }

    #[must_use]
    pub fn bucket_already_exists(bucket: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::BucketAlreadyExists).with_resource(bucket)
    }

    #[must_use]
    pub fn bucket_not_empty(bucket: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::BucketNotEmpty).with_resource(bucket)
    }

    #[must_use]
    pub fn access_denied() -> Self {
        Self::new(S3ErrorCode::AccessDenied)
    }

    #[must_use]
    pub fn signature_does_not_match() -> Self {
        Self::new(S3ErrorCode::SignatureDoesNotMatch)
    }

    #[must_use]
    pub fn invalid_access_key_id() -> Self {
        Self::new(S3ErrorCode::InvalidAccessKeyId)
    }

    #[must_use]
    pub fn request_time_too_skewed() -> Self {
        Self::new(S3ErrorCode::RequestTimeTooSkewed)
    }

    #[must_use]
    pub fn invalid_part(message: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::InvalidPart).with_message(message)
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::InvalidArgument).with_message(message)
    }

    #[must_use]
    pub fn entity_too_large() -> Self {
        Self::new(S3ErrorCode::EntityTooLarge)
    }

    #[must_use]
    pub fn bad_digest() -> Self {
        Self::new(S3ErrorCode::BadDigest)
    }

    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(S3ErrorCode::MethodNotAllowed)
    }

    #[must_use]
    pub fn internal_error(source: anyhow::Error) -> Self {
        Self::new(S3ErrorCode::InternalError).with_source(source)
    }

    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NotImplemented).with_message(message)
    }
}

impl std::fmt::Display for S3Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Constructs an [`S3Error`] for a known code, optionally with a message.
///
/// ```ignore
/// s3_error!(NoSuchBucket)
/// s3_error!(InvalidArgument, "max-keys must be non-negative")
/// ```
#[macro_export]
macro_rules! s3_error {
    ($code:ident) => {
        $crate::error::S3Error::new($crate::error::S3ErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::S3Error::new($crate::error::S3ErrorCode::$code).with_message($msg)
    };
}
