//! Bucket-level response outputs.

use crate::types::Bucket;

/// `CreateBucket` response.
#[derive(Debug, Clone, Default)]
pub struct CreateBucketOutput {
    /// HTTP header: `Location`.
    pub location: Option<String>,
}

/// `HeadBucket` response. An empty body; existence is conveyed by the
/// 200 status alone.
#[derive(Debug, Clone, Default)]
pub struct HeadBucketOutput {}

/// `ListBuckets` response.
#[derive(Debug, Clone, Default)]
pub struct ListBucketsOutput {
    pub buckets: Vec<Bucket>,
}
