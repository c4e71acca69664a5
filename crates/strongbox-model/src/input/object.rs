//! Object-level request inputs.

use crate::request::StreamingBlob;

/// `CopyObject` request.
#[derive(Debug, Clone, Default)]
pub struct CopyObjectInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP label (URI path).
    pub key: String,
    /// HTTP header: `x-amz-copy-source`, of the form `[/]bucket/key`.
    pub copy_source: String,
}

/// `DeleteObject` request.
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP label (URI path).
    pub key: String,
}

/// `GetObject` request.
#[derive(Debug, Clone, Default)]
pub struct GetObjectInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP label (URI path).
    pub key: String,
    /// HTTP header: `If-None-Match`.
    pub if_none_match: Option<String>,
    /// HTTP header: `Range`, e.g. `bytes=0-499`.
    pub range: Option<String>,
}

/// `HeadObject` request.
#[derive(Debug, Clone, Default)]
pub struct HeadObjectInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP label (URI path).
    pub key: String,
    /// HTTP header: `If-None-Match`.
    pub if_none_match: Option<String>,
    /// HTTP header: `Range`.
    pub range: Option<String>,
}

/// `PutObject` request.
#[derive(Debug, Clone, Default)]
pub struct PutObjectInput {
    /// HTTP payload body.
    pub body: Option<StreamingBlob>,
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP header: `Content-Length`.
    pub content_length: Option<i64>,
    /// HTTP header: `Content-MD5`.
    pub content_md5: Option<String>,
    /// HTTP header: `Content-Type`.
    pub content_type: Option<String>,
    /// HTTP label (URI path).
    pub key: String,
}
