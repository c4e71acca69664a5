//! Cross-origin migration: pull objects from a source S3-compatible endpoint
//! into a local bucket, signing outbound requests with the source's own
//! SigV4 credentials.
//!
//! Jobs are in-memory only (per §4.6/§5: "Jobs survive in-memory only"):
//! restarting the process loses job history, which is an accepted tradeoff
//! for a self-hosted, single-node store.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use http_body_util::{BodyExt, Empty};
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use parking_lot::{Mutex, RwLock};
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio::sync::Semaphore;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use strongbox_auth::canonical::build_canonical_request;
use strongbox_auth::sigv4::{build_string_to_sign, compute_signature, derive_signing_key, hash_payload};
use strongbox_metadata::MetadataStore;
use strongbox_metadata::models::ObjectRecord;
use strongbox_store::FileStore;

use crate::error::MaintenanceError;

const MAX_LIST_PAGE: u32 = 1000;

/// Credentials and endpoint for a source S3-compatible service.
#[derive(Debug, Clone)]
pub struct SourceEndpoint {
    /// Scheme and authority, e.g. `http://minio.example.com:9000`.
    pub base_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

/// Configuration for one migration job.
#[derive(Debug, Clone)]
pub struct MigrateJobConfig {
    /// Source endpoint and credentials to read from.
    pub source: SourceEndpoint,
    /// Bucket to list and read from on the source.
    pub source_bucket: String,
    /// Only objects whose key starts with this are migrated.
    pub source_prefix: String,
    /// Local bucket to write into.
    pub target_bucket: String,
    /// Replaces `source_prefix` in each migrated key.
    pub target_prefix: String,
    /// When `false`, an already-present target key is left untouched.
    pub overwrite_existing: bool,
    /// Number of objects transferred concurrently.
    pub concurrency: usize,
}

/// Lifecycle state of a migration job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Listing or transferring objects.
    Running,
    /// Every object was attempted; see `objects_failed` for partial failures.
    Completed,
    /// The source could not be listed, or validation failed before any transfer began.
    Failed,
    /// Stopped early by [`MigrationEngine::cancel_job`].
    Cancelled,
}

/// A point-in-time snapshot of a migration job's progress.
#[derive(Debug, Clone)]
pub struct MigrateJobStatus {
    /// Id returned by [`MigrationEngine::start_job`].
    pub id: Uuid,
    /// Current lifecycle state.
    pub state: JobState,
    /// Object count from the source listing, once known.
    pub objects_total: Option<u64>,
    /// Objects successfully transferred so far.
    pub objects_done: u64,
    /// Objects that failed to transfer (not fatal to the job as a whole).
    pub objects_failed: u64,
    /// Bytes written to the target store so far.
    pub bytes_done: u64,
    /// Set when the job failed before any transfer began.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobHandle {
    status: Arc<RwLock<MigrateJobStatus>>,
    cancel: CancellationToken,
}

/// Runs and tracks migration jobs against one local `(MetadataStore,
/// FileStore)` pair. Cheap to clone: everything it owns is itself cheaply
/// cloneable or `Arc`-wrapped.
#[derive(Clone)]
pub struct MigrationEngine {
    metadata: MetadataStore,
    store: FileStore,
    client: Client<HttpConnector, Empty<Bytes>>,
    jobs: Arc<Mutex<HashMap<Uuid, JobHandle>>>,
}

impl std::fmt::Debug for MigrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEngine").finish_non_exhaustive()
    }
}

impl MigrationEngine {
    #[must_use]
    pub fn new(metadata: MetadataStore, store: FileStore) -> Self {
        Self {
            metadata,
            store,
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Validate the source is reachable, then spawn the job and return its id
    /// immediately; progress is polled via [`Self::status`].
    pub async fn start_job(&self, config: MigrateJobConfig) -> Result<Uuid, MaintenanceError> {
        let id = Uuid::new_v4();
        list_objects_page(&self.client, &config.source, &config.source_bucket, &config.source_prefix, None)
            .await
            .map_err(|err| MaintenanceError::SourceUnreachable(err.to_string()))?;

        let status = Arc::new(RwLock::new(MigrateJobStatus {
            id,
            state: JobState::Running,
            objects_total: None,
            objects_done: 0,
            objects_failed: 0,
            bytes_done: 0,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }));
        let cancel = CancellationToken::new();
        self.jobs.lock().insert(id, JobHandle { status: status.clone(), cancel: cancel.clone() });

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_job(id, config, status, cancel).await;
        });

        Ok(id)
    }

    /// Request cooperative cancellation of a running job. A no-op if the job
    /// is unknown or already terminal.
    pub fn cancel_job(&self, id: Uuid) {
        if let Some(handle) = self.jobs.lock().get(&id) {
            handle.cancel.cancel();
        }
    }

    /// Current snapshot of a job, if it is known.
    #[must_use]
    pub fn status(&self, id: Uuid) -> Option<MigrateJobStatus> {
        self.jobs.lock().get(&id).map(|handle| handle.status.read().clone())
    }

    /// Every job this engine has seen since the process started, in-flight
    /// and terminal alike.
    #[must_use]
    pub fn list_jobs(&self) -> Vec<MigrateJobStatus> {
        self.jobs.lock().values().map(|handle| handle.status.read().clone()).collect()
    }

    async fn run_job(
        &self,
        id: Uuid,
        config: MigrateJobConfig,
        status: Arc<RwLock<MigrateJobStatus>>,
        cancel: CancellationToken,
    ) {
        let objects = match list_all_source_objects(&self.client, &config.source, &config.source_bucket, &config.source_prefix).await {
            Ok(objects) => objects,
            Err(err) => {
                finish(&status, JobState::Failed, Some(err.to_string()));
                return;
            }
        };
        status.write().objects_total = Some(objects.len() as u64);

        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        let mut tasks = Vec::with_capacity(objects.len());

        for object in objects {
            if cancel.is_cancelled() {
                break;
            }
            let permit = Arc::clone(&semaphore).acquire_owned().await.expect("semaphore is never closed");
            let engine = self.clone();
            let config = config.clone();
            let status = Arc::clone(&status);
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = engine.migrate_one(&config, &object, &cancel).await;
                let mut status = status.write();
                match outcome {
                    Ok(size) => {
                        status.objects_done += 1;
                        status.bytes_done += size;
                    }
                    Err(err) if cancel.is_cancelled() => {
                        warn!(key = %object.key, error = %err, "migration object transfer interrupted by cancellation");
                    }
                    Err(err) => {
                        status.objects_failed += 1;
                        warn!(key = %object.key, error = %err, "migration object transfer failed");
                    }
                }
            }));
        }

        for task in tasks {
            let _ = task.await;
        }

        if cancel.is_cancelled() {
            finish(&status, JobState::Cancelled, None);
        } else {
            info!(job = %id, "migration job complete");
            finish(&status, JobState::Completed, None);
        }
    }

    async fn migrate_one(&self, config: &MigrateJobConfig, object: &SourceObject, cancel: &CancellationToken) -> Result<u64, MaintenanceError> {
        let target_key = format!("{}{}", config.target_prefix, object.key.strip_prefix(&config.source_prefix).unwrap_or(&object.key));

        if !config.overwrite_existing && self.metadata.get_object(&config.target_bucket, &target_key).is_ok() {
            return Ok(0);
        }

        let path = format!("/{}/{}", config.source_bucket, object.key);
        let response = signed_get(&self.client, &config.source, &path, "").await?;
        if !response.status().is_success() {
            return Err(MaintenanceError::Transfer(format!("source returned {}", response.status())));
        }

        let stream = response
            .into_body()
            .into_data_stream()
            .map_err(|err| std::io::Error::other(err.to_string()));
        let mut reader = CancelableReader { inner: StreamReader::new(stream), cancel: cancel.clone() };
        let write = self.store.put_object(&config.target_bucket, &target_key, &mut reader).await?;

        self.metadata.put_object(&ObjectRecord {
            bucket: config.target_bucket.clone(),
            key: target_key,
            size: write.size,
            etag: write.etag,
            content_type: "application/octet-stream".to_owned(),
            storage_path: write.relative_path.to_string_lossy().into_owned(),
            last_modified: Utc::now(),
        })?;

        Ok(write.size)
    }
}

fn finish(status: &Arc<RwLock<MigrateJobStatus>>, state: JobState, error: Option<String>) {
    let mut status = status.write();
    status.state = state;
    status.error = error;
    status.finished_at = Some(Utc::now());
}

#[derive(Debug, Clone)]
struct SourceObject {
    key: String,
    #[allow(dead_code)]
    size: u64,
}

async fn list_all_source_objects(
    client: &Client<HttpConnector, Empty<Bytes>>,
    source: &SourceEndpoint,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<SourceObject>, MaintenanceError> {
    let mut objects = Vec::new();
    let mut continuation_token = None;
    loop {
        let page = list_objects_page(client, source, bucket, prefix, continuation_token.as_deref()).await?;
        objects.extend(page.objects);
        if !page.is_truncated {
            break;
        }
        continuation_token = page.next_continuation_token;
        if continuation_token.is_none() {
            break;
        }
    }
    Ok(objects)
}

struct ListPage {
    objects: Vec<SourceObject>,
    is_truncated: bool,
    next_continuation_token: Option<String>,
}

async fn list_objects_page(
    client: &Client<HttpConnector, Empty<Bytes>>,
    source: &SourceEndpoint,
    bucket: &str,
    prefix: &str,
    continuation_token: Option<&str>,
) -> Result<ListPage, MaintenanceError> {
    let mut query = format!("list-type=2&max-keys={MAX_LIST_PAGE}&prefix={}", encode_query_value(prefix));
    if let Some(token) = continuation_token {
        query.push_str(&format!("&continuation-token={}", encode_query_value(token)));
    }

    let path = format!("/{bucket}");
    let response = signed_get(client, source, &path, &query).await?;
    if !response.status().is_success() {
        return Err(MaintenanceError::SourceUnreachable(format!("list returned {}", response.status())));
    }

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|err| MaintenanceError::InvalidSourceResponse(err.to_string()))?
        .to_bytes();

    parse_list_objects_v2(&body)
}

fn parse_list_objects_v2(xml: &[u8]) -> Result<ListPage, MaintenanceError> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut objects = Vec::new();
    let mut is_truncated = false;
    let mut next_continuation_token = None;

    let mut current_tag = String::new();
    let mut in_contents = false;
    let mut current_key = None;
    let mut current_size: u64 = 0;

    loop {
        match reader
            .read_event()
            .map_err(|err| MaintenanceError::InvalidSourceResponse(err.to_string()))?
        {
            Event::Start(tag) => {
                current_tag = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                if current_tag == "Contents" {
                    in_contents = true;
                    current_key = None;
                    current_size = 0;
                }
            }
            Event::Text(text) => {
                let value = text
                    .decode()
                    .map_err(|err| MaintenanceError::InvalidSourceResponse(err.to_string()))?
                    .into_owned();
                match current_tag.as_str() {
                    "Key" if in_contents => current_key = Some(value),
                    "Size" if in_contents => current_size = value.parse().unwrap_or(0),
                    "IsTruncated" => is_truncated = value == "true",
                    "NextContinuationToken" => next_continuation_token = Some(value),
                    _ => {}
                }
            }
            Event::End(tag) => {
                if tag.name().as_ref() == b"Contents" {
                    if let Some(key) = current_key.take() {
                        objects.push(SourceObject { key, size: current_size });
                    }
                    in_contents = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ListPage { objects, is_truncated, next_continuation_token })
}

async fn signed_get(
    client: &Client<HttpConnector, Empty<Bytes>>,
    source: &SourceEndpoint,
    path: &str,
    query: &str,
) -> Result<hyper::Response<hyper::body::Incoming>, MaintenanceError> {
    let uri: http::Uri = format!("{}{}{}", source.base_url, path, if query.is_empty() { String::new() } else { format!("?{query}") })
        .parse()
        .map_err(|err: http::uri::InvalidUri| MaintenanceError::SourceUnreachable(err.to_string()))?;
    let host = uri.authority().map(http::uri::Authority::to_string).unwrap_or_default();

    let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let date = Utc::now().format("%Y%m%d").to_string();
    let payload_hash = hash_payload(b"");

    let headers = [("host", host.as_str()), ("x-amz-content-sha256", payload_hash.as_str()), ("x-amz-date", amz_date.as_str())];
    let signed_headers = ["host", "x-amz-content-sha256", "x-amz-date"];
    let canonical = build_canonical_request("GET", path, query, &headers, &signed_headers, &payload_hash);
    let canonical_hash = hash_payload(canonical.as_bytes());
    let credential_scope = format!("{date}/{}/s3/aws4_request", source.region);
    let string_to_sign = build_string_to_sign(&amz_date, &credential_scope, &canonical_hash);
    let signing_key = derive_signing_key(&source.secret_access_key, &date, &source.region, "s3");
    let signature = compute_signature(&signing_key, &string_to_sign);
    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{date}/{}/s3/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature={signature}",
        source.access_key_id, source.region
    );

    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("host", host)
        .header("x-amz-date", amz_date)
        .header("x-amz-content-sha256", payload_hash)
        .header("authorization", authorization)
        .body(Empty::<Bytes>::new())
        .map_err(|err| MaintenanceError::Transfer(err.to_string()))?;

    client.request(request).await.map_err(|err| MaintenanceError::SourceUnreachable(err.to_string()))
}

fn encode_query_value(value: &str) -> String {
    use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
    const SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');
    utf8_percent_encode(value, SET).to_string()
}

pin_project! {
    /// Wraps a streaming reader so every poll checks a cancellation token
    /// first, giving migration transfers a cancel point between chunk reads
    /// without having to change `FileStore::put_object`'s own buffering.
    struct CancelableReader<R> {
        #[pin]
        inner: R,
        cancel: CancellationToken,
    }
}

impl<R: AsyncRead> AsyncRead for CancelableReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut tokio::io::ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.project();
        if this.cancel.is_cancelled() {
            return Poll::Ready(Err(std::io::Error::other("migration job cancelled")));
        }
        this.inner.poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_list_objects_v2_page() {
        let xml = br#"<?xml version="1.0"?>
        <ListBucketResult>
            <IsTruncated>true</IsTruncated>
            <NextContinuationToken>abc</NextContinuationToken>
            <Contents><Key>a.txt</Key><Size>5</Size></Contents>
            <Contents><Key>dir/b.txt</Key><Size>10</Size></Contents>
        </ListBucketResult>"#;

        let page = parse_list_objects_v2(xml).unwrap();
        assert!(page.is_truncated);
        assert_eq!(page.next_continuation_token.as_deref(), Some("abc"));
        assert_eq!(page.objects.len(), 2);
        assert_eq!(page.objects[0].key, "a.txt");
        assert_eq!(page.objects[1].size, 10);
    }

    #[test]
    fn test_should_parse_final_page_with_no_continuation_token() {
        let xml = b"<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>";
        let page = parse_list_objects_v2(xml).unwrap();
        assert!(!page.is_truncated);
        assert!(page.next_continuation_token.is_none());
        assert!(page.objects.is_empty());
    }

    #[test]
    fn test_should_percent_encode_query_values() {
        assert_eq!(encode_query_value("a b/c"), "a%20b%2Fc");
    }
}
