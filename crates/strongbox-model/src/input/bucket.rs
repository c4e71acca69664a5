//! Bucket-level request inputs.

/// `CreateBucket` request.
#[derive(Debug, Clone, Default)]
pub struct CreateBucketInput {
    /// HTTP label (URI path).
    pub bucket: String,
}

/// `DeleteBucket` request.
#[derive(Debug, Clone, Default)]
pub struct DeleteBucketInput {
    /// HTTP label (URI path).
    pub bucket: String,
}

/// `HeadBucket` request.
#[derive(Debug, Clone, Default)]
pub struct HeadBucketInput {
    /// HTTP label (URI path).
    pub bucket: String,
}

/// `ListBuckets` request. S3 offers pagination here; Strongbox always
/// returns the full set in one response since bucket counts are small.
#[derive(Debug, Clone, Default)]
pub struct ListBucketsInput {}
