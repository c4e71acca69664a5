//! `ListObjects` / `ListObjectsV2` response outputs.

use crate::types::{CommonPrefix, Object};

/// `ListObjects` (v1) response.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsOutput {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub next_marker: Option<String>,
    pub max_keys: Option<i32>,
    pub delimiter: Option<String>,
    pub is_truncated: Option<bool>,
    pub contents: Vec<Object>,
    pub common_prefixes: Vec<CommonPrefix>,
}

/// `ListObjectsV2` response.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsV2Output {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
    pub next_continuation_token: Option<String>,
    pub start_after: Option<String>,
    pub max_keys: Option<i32>,
    pub delimiter: Option<String>,
    pub is_truncated: Option<bool>,
    pub key_count: Option<i32>,
    pub contents: Vec<Object>,
    pub common_prefixes: Vec<CommonPrefix>,
}
