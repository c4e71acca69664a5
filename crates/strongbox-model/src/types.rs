//! Shared value types referenced by more than one operation's input or
//! output.

/// A bucket as returned by `ListBuckets`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    pub name: String,
    pub creation_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// One object entry in a `ListObjects`/`ListObjectsV2` result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    pub key: String,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    pub e_tag: Option<String>,
    pub size: Option<i64>,
}

/// A common key prefix grouped by the `delimiter` parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonPrefix {
    pub prefix: Option<String>,
}

/// One part reference supplied in a `CompleteMultipartUpload` request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedPart {
    pub e_tag: Option<String>,
    pub part_number: Option<i32>,
}

/// The `CompleteMultipartUpload` request body: an ordered list of parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedMultipartUpload {
    pub parts: Vec<CompletedPart>,
}

/// One uploaded part as returned by `ListParts`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub part_number: Option<i32>,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    pub e_tag: Option<String>,
    pub size: Option<i64>,
}
