//! `ListObjects` / `ListObjectsV2` request inputs.

/// `ListObjects` (v1) request.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsInput {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP query: `delimiter`.
    pub delimiter: Option<String>,
    /// HTTP query: `marker`.
    pub marker: Option<String>,
    /// HTTP query: `max-keys`.
    pub max_keys: Option<i32>,
    /// HTTP query: `prefix`.
    pub prefix: Option<String>,
}

/// `ListObjectsV2` request.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsV2Input {
    /// HTTP label (URI path).
    pub bucket: String,
    /// HTTP query: `continuation-token`.
    pub continuation_token: Option<String>,
    /// HTTP query: `delimiter`.
    pub delimiter: Option<String>,
    /// HTTP query: `max-keys`.
    pub max_keys: Option<i32>,
    /// HTTP query: `prefix`.
    pub prefix: Option<String>,
    /// HTTP query: `start-after`.
    pub start_after: Option<String>,
}
