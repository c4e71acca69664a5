//! Object-level response outputs.

use crate::request::StreamingBlob;

/// `CopyObject` response. The body is a small XML payload carrying
/// `e_tag`/`last_modified`; there is no `Content-Length` header contract
/// beyond that body.
#[derive(Debug, Clone, Default)]
pub struct CopyObjectOutput {
    pub e_tag: Option<String>,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// `DeleteObject` response. Empty; deleting a missing key still succeeds.
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectOutput {}

/// `GetObject` response.
#[derive(Debug, Clone, Default)]
pub struct GetObjectOutput {
    /// HTTP header: `accept-ranges`.
    pub accept_ranges: Option<String>,
    /// HTTP payload body.
    pub body: Option<StreamingBlob>,
    /// HTTP header: `Content-Length`.
    pub content_length: Option<i64>,
    /// HTTP header: `Content-Range`. Set only on a ranged (206) response.
    pub content_range: Option<String>,
    /// HTTP header: `Content-Type`.
    pub content_type: Option<String>,
    /// HTTP header: `ETag`.
    pub e_tag: Option<String>,
    /// HTTP header: `Last-Modified`.
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// `HeadObject` response. Same header set as `GetObject`, no body.
#[derive(Debug, Clone, Default)]
pub struct HeadObjectOutput {
    pub accept_ranges: Option<String>,
    pub content_length: Option<i64>,
    pub content_range: Option<String>,
    pub content_type: Option<String>,
    pub e_tag: Option<String>,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// `PutObject` response.
#[derive(Debug, Clone, Default)]
pub struct PutObjectOutput {
    /// HTTP header: `ETag`.
    pub e_tag: Option<String>,
}
