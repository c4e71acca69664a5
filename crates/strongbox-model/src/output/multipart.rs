//! Multipart upload response outputs.

use crate::types::Part;

/// `AbortMultipartUpload` response. Empty; idempotent.
#[derive(Debug, Clone, Default)]
pub struct AbortMultipartUploadOutput {}

/// `CompleteMultipartUpload` response.
#[derive(Debug, Clone, Default)]
pub struct CompleteMultipartUploadOutput {
    pub location: Option<String>,
    pub bucket: Option<String>,
    pub key: Option<String>,
    /// The composite `md5-of-md5s + "-N"` ETag.
    pub e_tag: Option<String>,
}

/// `CreateMultipartUpload` response.
#[derive(Debug, Clone, Default)]
pub struct CreateMultipartUploadOutput {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub upload_id: Option<String>,
}

/// `ListParts` response.
#[derive(Debug, Clone, Default)]
pub struct ListPartsOutput {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub upload_id: Option<String>,
    pub max_parts: Option<i32>,
    pub part_number_marker: Option<String>,
    pub next_part_number_marker: Option<String>,
    pub is_truncated: Option<bool>,
    pub parts: Vec<Part>,
}

/// `UploadPart` response.
#[derive(Debug, Clone, Default)]
pub struct UploadPartOutput {
    /// HTTP header: `ETag`.
    pub e_tag: Option<String>,
}
