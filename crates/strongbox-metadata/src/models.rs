//! Row types returned by [`crate::MetadataStore`].
//!
//! These mirror the entities in the data model 1:1; they are deliberately
//! richer than `strongbox_model::types`' wire-shape structs (which carry
//! only what a particular XML response needs) since the HTTP layer derives
//! its response shapes from these, not the other way around.

use chrono::{DateTime, Utc};

/// A bucket row.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub is_public: bool,
}

/// An object row.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub etag: String,
    pub content_type: String,
    pub storage_path: String,
    pub last_modified: DateTime<Utc>,
}

/// An in-progress or recently terminated multipart upload session.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSessionRecord {
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// One uploaded part of a multipart session.
#[derive(Debug, Clone, PartialEq)]
pub struct PartRecord {
    pub upload_id: String,
    pub part_number: i64,
    pub etag: String,
    pub size: u64,
    pub storage_path: String,
}

/// An API key row.
///
/// `secret_access_key` is stored retrievable, not hashed: SigV4 verification
/// must re-derive the HMAC signing key from the raw secret, which a one-way
/// hash cannot support. This is intentionally distinct from
/// `admin.password_bcrypt`, which only ever needs an equality check.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyRecord {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub description: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// One bucket permission grant for an access key.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRecord {
    pub access_key_id: String,
    pub bucket_name: String,
    pub can_read: bool,
    pub can_write: bool,
}

/// One audit log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogRecord {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor: String,
    pub ip: String,
    pub forwarded_ip: Option<String>,
    pub resource: String,
    pub detail: Option<String>,
    pub success: bool,
    pub user_agent: Option<String>,
    pub location: Option<String>,
}

/// A single page of a `ListObjects`/`ListObjectsV2` query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectListPage {
    pub contents: Vec<ObjectRecord>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

/// Filter parameters for [`crate::MetadataStore::query_audit_logs`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub resource_prefix: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Aggregate counts returned by [`crate::MetadataStore::audit_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
}

/// A freshly minted API key pair, returned only once at creation/reset time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApiKey {
    pub access_key_id: String,
    pub secret_access_key: String,
}
