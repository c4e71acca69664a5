//! Multipart upload request inputs.

use crate::request::StreamingBlob;
use crate::types::CompletedMultipartUpload;

/// `AbortMultipartUpload` request.
#[derive(Debug, Clone, Default)]
pub struct AbortMultipartUploadInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP label (URI path).
    pub key: String,
    /// HTTP query: `uploadId`.
    pub upload_id: String,
}

/// `CompleteMultipartUpload` request.
#[derive(Debug, Clone, Default)]
pub struct CompleteMultipartUploadInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP label (URI path).
    pub key: String,
    /// HTTP payload body: ordered `{PartNumber,ETag}` list.
    pub multipart_upload: Option<CompletedMultipartUpload>,
    /// HTTP query: `uploadId`.
    pub upload_id: String,
}

/// `CreateMultipartUpload` request.
#[derive(Debug, Clone, Default)]
pub struct CreateMultipartUploadInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP header: `Content-Type`.
    pub content_type: Option<String>,
    /// HTTP label (URI path).
    pub key: String,
}

/// `ListParts` request.
#[derive(Debug, Clone, Default)]
pub struct ListPartsInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP label (URI path).
    pub key: String,
    /// HTTP query: `max-parts`.
    pub max_parts: Option<i32>,
    /// HTTP query: `part-number-marker`.
    pub part_number_marker: Option<String>,
    /// HTTP query: `uploadId`.
    pub upload_id: String,
}

/// `UploadPart` request.
#[derive(Debug, Clone, Default)]
pub struct UploadPartInput {
    /// HTTP payload body.
    pub body: Option<StreamingBlob>,
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP header: `Content-Length`.
    pub content_length: Option<i64>,
    /// HTTP label (URI path).
    pub key: String,
    /// HTTP query: `partNumber`.
    pub part_number: i32,
    /// HTTP query: `uploadId`.
    pub upload_id: String,
}
