//! Business logic wiring S3 wire operations to the metadata store and file store.
//!
//! [`StrongboxHandler`] is the one [`S3Handler`] implementation this binary ships:
//! it turns a routed, authenticated request into metadata/file store calls and
//! back into a typed output, the same split every other handler in the HTTP
//! layer assumes between [`FromS3Request`] and [`IntoS3Response`].

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use strongbox_auth::AuthError;
use strongbox_auth::CredentialProvider;
use strongbox_auth::permission::ApiKeyCache;
use strongbox_http::body::S3ResponseBody;
use strongbox_http::dispatch::S3Handler;
use strongbox_http::request::FromS3Request;
use strongbox_http::response::IntoS3Response;
use strongbox_http::router::RoutingContext;
use strongbox_metadata::MetadataStore;
use strongbox_metadata::audit::audit_entry;
use strongbox_metadata::error::MetadataError;
use strongbox_metadata::models::ObjectRecord;
use strongbox_model::S3Operation;
use strongbox_model::error::S3Error;
use strongbox_model::input::{
    AbortMultipartUploadInput, CompleteMultipartUploadInput, CopyObjectInput, CreateBucketInput,
    CreateMultipartUploadInput, DeleteBucketInput, DeleteObjectInput, GetObjectInput, HeadBucketInput,
    HeadObjectInput, ListObjectsInput, ListObjectsV2Input, ListPartsInput, PutObjectInput, UploadPartInput,
};
use strongbox_model::output::{
    AbortMultipartUploadOutput, CompleteMultipartUploadOutput, CopyObjectOutput, CreateBucketOutput,
    CreateMultipartUploadOutput, DeleteObjectOutput, GetObjectOutput, HeadBucketOutput, HeadObjectOutput,
    ListBucketsOutput, ListObjectsOutput, ListObjectsV2Output, ListPartsOutput, PutObjectOutput, UploadPartOutput,
};
use strongbox_model::types::{Bucket, CommonPrefix, Object, Part};
use strongbox_store::FileStore;
use strongbox_store::error::FileStoreError;
use strongbox_store::naming::validate_bucket_name;

const DEFAULT_MAX_KEYS: u32 = 1000;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const MIN_PART_NUMBER: i32 = 1;
const MAX_PART_NUMBER: i32 = 10_000;
const MIN_MULTIPART_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Ties the metadata store, file store, and api-key cache together behind
/// the sixteen S3 wire operations this server exposes.
#[derive(Debug, Clone)]
pub struct StrongboxHandler {
    metadata: MetadataStore,
    store: FileStore,
    api_key_cache: Arc<ApiKeyCache>,
}

impl StrongboxHandler {
    /// Wire a handler over an already-open metadata store, file store, and
    /// the api-key cache shared with the service layer's signature check.
    #[must_use]
    pub fn new(metadata: MetadataStore, store: FileStore, api_key_cache: Arc<ApiKeyCache>) -> Self {
        Self { metadata, store, api_key_cache }
    }
}

impl S3Handler for StrongboxHandler {
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: Bytes,
        ctx: RoutingContext,
        access_key_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3Error>> + Send>> {
        let handler = self.clone();
        let access_key_id = access_key_id.to_owned();
        Box::pin(async move { handler.dispatch(op, parts, body, ctx, access_key_id).await })
    }
}

impl StrongboxHandler {
    async fn dispatch(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: Bytes,
        ctx: RoutingContext,
        access_key_id: String,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        match op {
            S3Operation::ListBuckets => self.list_buckets(&access_key_id),
            S3Operation::CreateBucket => self.create_bucket(&parts, body, &ctx, &access_key_id).await,
            S3Operation::DeleteBucket => self.delete_bucket(&parts, body, &ctx, &access_key_id),
            S3Operation::HeadBucket => self.head_bucket(&parts, body, &ctx, &access_key_id),
            S3Operation::ListObjects => self.list_objects(&parts, body, &ctx, &access_key_id),
            S3Operation::ListObjectsV2 => self.list_objects_v2(&parts, body, &ctx, &access_key_id),
            S3Operation::GetObject => self.get_object(&parts, body, &ctx, &access_key_id).await,
            S3Operation::HeadObject => self.head_object(&parts, body, &ctx, &access_key_id),
            S3Operation::PutObject => self.put_object(&parts, body, &ctx, &access_key_id).await,
            S3Operation::DeleteObject => self.delete_object(&parts, body, &ctx, &access_key_id).await,
            S3Operation::CopyObject => self.copy_object(&parts, body, &ctx, &access_key_id).await,
            S3Operation::CreateMultipartUpload => self.create_multipart_upload(&parts, body, &ctx, &access_key_id),
            S3Operation::UploadPart => self.upload_part(&parts, body, &ctx, &access_key_id).await,
            S3Operation::CompleteMultipartUpload => {
                self.complete_multipart_upload(&parts, body, &ctx, &access_key_id).await
            }
            S3Operation::AbortMultipartUpload => self.abort_multipart_upload(&parts, body, &ctx, &access_key_id).await,
            S3Operation::ListParts => self.list_parts(&parts, body, &ctx, &access_key_id),
        }
    }

    // -- Permission -----------------------------------------------------

    /// ListBuckets has no single bucket to scope a grant against; any
    /// enabled, known key may call it and sees every bucket. An anonymous
    /// caller (no `Authorization` header, no presigned signature) is refused.
    fn require_authenticated(&self, access_key_id: &str) -> Result<(), S3Error> {
        if access_key_id.is_empty() {
            return Err(S3Error::access_denied());
        }
        self.api_key_cache.get_secret_key(access_key_id).map(|_| ()).map_err(auth_to_s3)
    }

    /// Plain read-permission check, no public-bucket bypass. Used by every
    /// read operation except `GetObject`/`HeadObject`.
    fn require_read(&self, access_key_id: &str, bucket: &str) -> Result<(), S3Error> {
        self.api_key_cache.evaluate_permission(access_key_id, bucket, false).map_err(auth_to_s3)
    }

    /// Read-permission check for an object fetch: a public bucket allows an
    /// unauthenticated `GetObject`/`HeadObject`, every other read still needs
    /// a grant.
    fn require_object_read(&self, access_key_id: &str, bucket: &str) -> Result<(), S3Error> {
        if self.bucket_is_public(bucket) {
            return Ok(());
        }
        self.require_read(access_key_id, bucket)
    }

    fn require_write(&self, access_key_id: &str, bucket: &str) -> Result<(), S3Error> {
        self.api_key_cache.evaluate_permission(access_key_id, bucket, true).map_err(auth_to_s3)
    }

    fn bucket_is_public(&self, bucket: &str) -> bool {
        self.metadata.get_bucket(bucket).map(|record| record.is_public).unwrap_or(false)
    }

    fn audit(&self, action: &str, actor: &str, resource: &str, success: bool) {
        let actor = if actor.is_empty() { "anonymous" } else { actor };
        let entry = audit_entry(action, actor, "", resource, success);
        if let Err(err) = self.metadata.write_audit_log(&entry) {
            warn!(error = %err, action, resource, "failed to write audit log entry");
        }
    }

    // -- Buckets ----------------------------------------------------------

    fn list_buckets(&self, access_key_id: &str) -> Result<http::Response<S3ResponseBody>, S3Error> {
        self.require_authenticated(access_key_id)?;
        let buckets = self
            .metadata
            .list_buckets()
            .map_err(|err| metadata_to_s3(err, ""))?
            .into_iter()
            .map(|record| Bucket { name: record.name, creation_date: Some(record.created_at) })
            .collect();
        ListBucketsOutput { buckets }.into_s3_response()
    }

    async fn create_bucket(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = CreateBucketInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        validate_bucket_name(&input.bucket).map_err(|err| S3Error::invalid_argument(err.to_string()))?;
        self.require_write(access_key_id, &input.bucket)?;

        let result = self.metadata.create_bucket(&input.bucket).map_err(|err| metadata_to_s3(err, &input.bucket));
        if result.is_ok() {
            self.store.create_bucket(&input.bucket).await.map_err(|err| store_to_s3(err, &input.bucket))?;
        }
        self.audit("CreateBucket", access_key_id, &input.bucket, result.is_ok());
        result?;

        CreateBucketOutput { location: Some(format!("/{}", input.bucket)) }.into_s3_response()
    }

    fn delete_bucket(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = DeleteBucketInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_write(access_key_id, &input.bucket)?;

        let result = self.metadata.delete_bucket(&input.bucket).map_err(|err| metadata_to_s3(err, &input.bucket));
        self.audit("DeleteBucket", access_key_id, &input.bucket, result.is_ok());
        result?;

        // No `DeleteBucketOutput` type exists on the wire surface: the
        // response is a bare 204, same shape `DeleteObject` uses.
        http::Response::builder()
            .status(http::StatusCode::NO_CONTENT)
            .body(S3ResponseBody::empty())
            .map_err(|err| S3Error::internal_error(anyhow::anyhow!(err)))
    }

    fn head_bucket(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = HeadBucketInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_read(access_key_id, &input.bucket)?;
        self.metadata.get_bucket(&input.bucket).map_err(|err| metadata_to_s3(err, &input.bucket))?;
        HeadBucketOutput {}.into_s3_response()
    }

    // -- Listing ------------------------------------------------------------

    fn list_objects(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = ListObjectsInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_read(access_key_id, &input.bucket)?;
        let max_keys = non_negative_max_keys(input.max_keys)?;
        let prefix = input.prefix.clone().unwrap_or_default();

        let page = self
            .metadata
            .list_objects(&input.bucket, &prefix, input.delimiter.as_deref(), input.marker.as_deref(), max_keys)
            .map_err(|err| metadata_to_s3(err, &input.bucket))?;

        ListObjectsOutput {
            name: Some(input.bucket),
            prefix: input.prefix,
            marker: input.marker,
            next_marker: page.next_marker,
            max_keys: Some(max_keys as i32),
            delimiter: input.delimiter,
            is_truncated: Some(page.is_truncated),
            contents: page.contents.into_iter().map(object_record_to_entry).collect(),
            common_prefixes: page.common_prefixes.into_iter().map(|p| CommonPrefix { prefix: Some(p) }).collect(),
        }
        .into_s3_response()
    }

    fn list_objects_v2(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = ListObjectsV2Input::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_read(access_key_id, &input.bucket)?;
        let max_keys = non_negative_max_keys(input.max_keys)?;
        let prefix = input.prefix.clone().unwrap_or_default();
        let marker = input.continuation_token.as_deref().or(input.start_after.as_deref());

        let page = self
            .metadata
            .list_objects(&input.bucket, &prefix, input.delimiter.as_deref(), marker, max_keys)
            .map_err(|err| metadata_to_s3(err, &input.bucket))?;

        let contents: Vec<Object> = page.contents.into_iter().map(object_record_to_entry).collect();
        let key_count = contents.len() as i32;
        ListObjectsV2Output {
            name: Some(input.bucket),
            prefix: input.prefix,
            continuation_token: input.continuation_token,
            next_continuation_token: page.next_marker,
            start_after: input.start_after,
            max_keys: Some(max_keys as i32),
            delimiter: input.delimiter,
            is_truncated: Some(page.is_truncated),
            key_count: Some(key_count),
            contents,
            common_prefixes: page.common_prefixes.into_iter().map(|p| CommonPrefix { prefix: Some(p) }).collect(),
        }
        .into_s3_response()
    }

    // -- Objects --------------------------------------------------------

    async fn get_object(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = GetObjectInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_object_read(access_key_id, &input.bucket)?;
        let record = self.metadata.get_object(&input.bucket, &input.key).map_err(|err| metadata_to_s3(err, &input.key))?;

        if input.if_none_match.as_deref() == Some(record.etag.as_str()) {
            return http::Response::builder()
                .status(http::StatusCode::NOT_MODIFIED)
                .header("ETag", &record.etag)
                .body(S3ResponseBody::empty())
                .map_err(|err| S3Error::internal_error(anyhow::anyhow!(err)));
        }

        let bytes = self.read_object_bytes(&record).await?;
        let total = bytes.len() as u64;

        let (data, content_range, content_length) = match input.range.as_deref().and_then(|r| parse_range(r, total)) {
            Some((start, end)) => {
                let slice = bytes.slice(start as usize..=end as usize);
                (slice, Some(format!("bytes {start}-{end}/{total}")), (end - start + 1) as i64)
            }
            None => (bytes, None, total as i64),
        };

        GetObjectOutput {
            accept_ranges: Some("bytes".to_owned()),
            body: Some(strongbox_model::request::StreamingBlob::new(data)),
            content_length: Some(content_length),
            content_range,
            content_type: Some(record.content_type),
            e_tag: Some(record.etag),
            last_modified: Some(record.last_modified),
        }
        .into_s3_response()
    }

    fn head_object(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = HeadObjectInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_object_read(access_key_id, &input.bucket)?;
        let record = self.metadata.get_object(&input.bucket, &input.key).map_err(|err| metadata_to_s3(err, &input.key))?;

        if input.if_none_match.as_deref() == Some(record.etag.as_str()) {
            return http::Response::builder()
                .status(http::StatusCode::NOT_MODIFIED)
                .header("ETag", &record.etag)
                .body(S3ResponseBody::empty())
                .map_err(|err| S3Error::internal_error(anyhow::anyhow!(err)));
        }

        let (content_range, content_length) = match input.range.as_deref().and_then(|r| parse_range(r, record.size)) {
            Some((start, end)) => (Some(format!("bytes {start}-{end}/{}", record.size)), (end - start + 1) as i64),
            None => (None, record.size as i64),
        };

        HeadObjectOutput {
            accept_ranges: Some("bytes".to_owned()),
            content_length: Some(content_length),
            content_range,
            content_type: Some(record.content_type),
            e_tag: Some(record.etag),
            last_modified: Some(record.last_modified),
        }
        .into_s3_response()
    }

    async fn put_object(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = PutObjectInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_write(access_key_id, &input.bucket)?;

        let payload = input.body.map(|blob| blob.data).unwrap_or_default();
        let mut reader = std::io::Cursor::new(payload);
        let write = self
            .store
            .put_object(&input.bucket, &input.key, &mut reader)
            .await
            .map_err(|err| store_to_s3(err, &input.bucket));

        let result = write.and_then(|write| {
            let record = ObjectRecord {
                bucket: input.bucket.clone(),
                key: input.key.clone(),
                size: write.size,
                etag: write.etag.clone(),
                content_type: input.content_type.clone().unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned()),
                storage_path: write.relative_path.to_string_lossy().into_owned(),
                last_modified: chrono::Utc::now(),
            };
            self.metadata.put_object(&record).map(|()| write.etag).map_err(|err| metadata_to_s3(err, &input.key))
        });

        self.audit("PutObject", access_key_id, &format!("{}/{}", input.bucket, input.key), result.is_ok());
        let etag = result?;

        PutObjectOutput { e_tag: Some(etag) }.into_s3_response()
    }

    async fn delete_object(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = DeleteObjectInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_write(access_key_id, &input.bucket)?;

        // Deleting a key that is already gone still succeeds, matching S3.
        let result = match self.metadata.delete_object(&input.bucket, &input.key) {
            Ok(record) => {
                self.store
                    .delete_object(&input.bucket, Path::new(&record.storage_path))
                    .await
                    .map_err(|err| store_to_s3(err, &input.key))
            }
            Err(MetadataError::NoSuchKey) => Ok(()),
            Err(err) => Err(metadata_to_s3(err, &input.key)),
        };
        self.audit("DeleteObject", access_key_id, &format!("{}/{}", input.bucket, input.key), result.is_ok());
        result?;

        DeleteObjectOutput {}.into_s3_response()
    }

    async fn copy_object(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = CopyObjectInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        let (source_bucket, source_key) = parse_copy_source(&input.copy_source)?;
        self.require_object_read(access_key_id, &source_bucket)?;
        self.require_write(access_key_id, &input.bucket)?;

        let source_record =
            self.metadata.get_object(&source_bucket, &source_key).map_err(|err| metadata_to_s3(err, &source_key))?;
        let bytes = self.read_object_bytes(&source_record).await?;
        let mut reader = std::io::Cursor::new(bytes);
        let write = self
            .store
            .put_object(&input.bucket, &input.key, &mut reader)
            .await
            .map_err(|err| store_to_s3(err, &input.bucket))?;

        let last_modified = chrono::Utc::now();
        let record = ObjectRecord {
            bucket: input.bucket.clone(),
            key: input.key.clone(),
            size: write.size,
            etag: write.etag.clone(),
            content_type: source_record.content_type,
            storage_path: write.relative_path.to_string_lossy().into_owned(),
            last_modified,
        };
        let result = self.metadata.put_object(&record).map_err(|err| metadata_to_s3(err, &input.key));
        self.audit(
            "CopyObject",
            access_key_id,
            &format!("{source_bucket}/{source_key} -> {}/{}", input.bucket, input.key),
            result.is_ok(),
        );
        result?;

        CopyObjectOutput { e_tag: Some(write.etag), last_modified: Some(last_modified) }.into_s3_response()
    }

    // -- Multipart --------------------------------------------------------

    fn create_multipart_upload(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input =
            CreateMultipartUploadInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_write(access_key_id, &input.bucket)?;

        let content_type = input.content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());
        let session = self
            .metadata
            .create_upload(&input.bucket, &input.key, &content_type)
            .map_err(|err| metadata_to_s3(err, &input.bucket))?;

        CreateMultipartUploadOutput {
            bucket: Some(input.bucket),
            key: Some(input.key),
            upload_id: Some(session.upload_id),
        }
        .into_s3_response()
    }

    async fn upload_part(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = UploadPartInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_write(access_key_id, &input.bucket)?;
        self.metadata.get_upload(&input.upload_id).map_err(|err| metadata_to_s3(err, &input.upload_id))?;

        let part_number = validate_part_number(input.part_number)?;
        let payload = input.body.map(|blob| blob.data).unwrap_or_default();
        let mut reader = std::io::Cursor::new(payload);
        let write = self
            .store
            .stage_part(&input.bucket, &input.upload_id, part_number, &mut reader)
            .await
            .map_err(|err| store_to_s3(err, &input.bucket))?;

        let part = strongbox_metadata::models::PartRecord {
            upload_id: input.upload_id.clone(),
            part_number: i64::from(input.part_number),
            etag: write.etag.clone(),
            size: write.size,
            storage_path: write.relative_path.to_string_lossy().into_owned(),
        };
        self.metadata.put_part(&part).map_err(|err| metadata_to_s3(err, &input.upload_id))?;

        UploadPartOutput { e_tag: Some(write.etag) }.into_s3_response()
    }

    async fn complete_multipart_upload(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input =
            CompleteMultipartUploadInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_write(access_key_id, &input.bucket)?;
        let session = self.metadata.get_upload(&input.upload_id).map_err(|err| metadata_to_s3(err, &input.upload_id))?;

        let requested_parts = input
            .multipart_upload
            .map(|completed| completed.parts)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| S3Error::invalid_argument("CompleteMultipartUpload requires at least one part"))?;

        let last_index = requested_parts.len() - 1;
        let mut part_numbers = Vec::with_capacity(requested_parts.len());
        let mut previous_number: Option<u32> = None;
        for (index, completed) in requested_parts.iter().enumerate() {
            let number = completed.part_number.ok_or_else(|| S3Error::invalid_part("missing PartNumber"))?;
            let number = u32::try_from(number).map_err(|_| S3Error::invalid_part("PartNumber must be positive"))?;
            check_ascending_part_number(previous_number, number)?;
            previous_number = Some(number);

            let stored = self.metadata.get_part(&input.upload_id, i64::from(number)).map_err(|_| S3Error::invalid_part(number.to_string()))?;
            if completed.e_tag.as_deref() != Some(stored.etag.as_str()) {
                return Err(S3Error::invalid_part(format!("ETag mismatch for part {number}")));
            }
            check_part_min_size(index == last_index, number, stored.size)?;
            part_numbers.push(number);
        }

        let write = self
            .store
            .assemble_parts(&input.bucket, &input.key, &input.upload_id, &part_numbers)
            .await
            .map_err(|err| store_to_s3(err, &input.bucket))?;

        let record = ObjectRecord {
            bucket: input.bucket.clone(),
            key: input.key.clone(),
            size: write.size,
            etag: write.etag.clone(),
            content_type: session.content_type,
            storage_path: write.relative_path.to_string_lossy().into_owned(),
            last_modified: chrono::Utc::now(),
        };
        let result = self.metadata.put_object(&record).map_err(|err| metadata_to_s3(err, &input.key));
        self.audit("CompleteMultipartUpload", access_key_id, &format!("{}/{}", input.bucket, input.key), result.is_ok());
        result?;

        self.metadata.delete_upload(&input.upload_id).map_err(|err| metadata_to_s3(err, &input.upload_id))?;

        CompleteMultipartUploadOutput {
            location: Some(format!("/{}/{}", input.bucket, input.key)),
            bucket: Some(input.bucket),
            key: Some(input.key),
            e_tag: Some(write.etag),
        }
        .into_s3_response()
    }

    async fn abort_multipart_upload(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input =
            AbortMultipartUploadInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_write(access_key_id, &input.bucket)?;
        self.metadata.get_upload(&input.upload_id).map_err(|err| metadata_to_s3(err, &input.upload_id))?;

        self.store.abort_multipart(&input.bucket, &input.upload_id).await.map_err(|err| store_to_s3(err, &input.bucket))?;
        self.metadata.delete_upload(&input.upload_id).map_err(|err| metadata_to_s3(err, &input.upload_id))?;

        AbortMultipartUploadOutput {}.into_s3_response()
    }

    fn list_parts(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
        ctx: &RoutingContext,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let input = ListPartsInput::from_s3_request(parts, ctx.bucket.as_deref(), ctx.key.as_deref(), &ctx.query_params, body)?;
        self.require_read(access_key_id, &input.bucket)?;
        self.metadata.get_upload(&input.upload_id).map_err(|err| metadata_to_s3(err, &input.upload_id))?;

        let records = self.metadata.list_parts(&input.upload_id).map_err(|err| metadata_to_s3(err, &input.upload_id))?;
        let wire_parts = records
            .into_iter()
            .map(|record| Part {
                part_number: i32::try_from(record.part_number).ok(),
                last_modified: None,
                e_tag: Some(record.etag),
                size: i64::try_from(record.size).ok(),
            })
            .collect();

        ListPartsOutput {
            bucket: Some(input.bucket),
            key: Some(input.key),
            upload_id: Some(input.upload_id),
            max_parts: input.max_parts,
            part_number_marker: input.part_number_marker,
            next_part_number_marker: None,
            is_truncated: Some(false),
            parts: wire_parts,
        }
        .into_s3_response()
    }

    async fn read_object_bytes(&self, record: &ObjectRecord) -> Result<Bytes, S3Error> {
        use tokio::io::AsyncReadExt;
        let mut file = self
            .store
            .get_object(&record.bucket, Path::new(&record.storage_path))
            .await
            .map_err(|err| store_to_s3(err, &record.key))?;
        let mut buf = Vec::with_capacity(record.size as usize);
        file.read_to_end(&mut buf).await.map_err(|err| S3Error::internal_error(anyhow::anyhow!(err)))?;
        Ok(Bytes::from(buf))
    }
}

fn object_record_to_entry(record: ObjectRecord) -> Object {
    Object {
        key: record.key,
        last_modified: Some(record.last_modified),
        e_tag: Some(record.etag),
        size: Some(record.size as i64),
    }
}

/// Reject a `partNumber` outside the `[1, 10000]` range S3 allows.
fn validate_part_number(part_number: i32) -> Result<u32, S3Error> {
    if part_number < MIN_PART_NUMBER || part_number > MAX_PART_NUMBER {
        return Err(S3Error::invalid_argument(format!("partNumber must be between {MIN_PART_NUMBER} and {MAX_PART_NUMBER}")));
    }
    u32::try_from(part_number).map_err(|_| S3Error::invalid_argument("partNumber must be positive"))
}

/// `CompleteMultipartUpload` requires parts listed in strictly ascending
/// `PartNumber` order; S3 rejects a request that lists part 2 before part 1
/// even if both parts exist.
fn check_ascending_part_number(previous: Option<u32>, number: u32) -> Result<(), S3Error> {
    if previous.is_some_and(|previous| number <= previous) {
        return Err(S3Error::invalid_argument("parts must be ordered by strictly ascending PartNumber"));
    }
    Ok(())
}

/// Every part but the last must be at least 5 MiB; S3 cannot be assembled
/// from a small "filler" part in the middle of an upload.
fn check_part_min_size(is_last: bool, number: u32, size: u64) -> Result<(), S3Error> {
    if !is_last && size < MIN_MULTIPART_PART_SIZE {
        return Err(S3Error::invalid_part(format!("part {number} is smaller than the 5 MiB minimum")));
    }
    Ok(())
}

/// Reject a negative `max-keys`; `None` falls back to the protocol default.
fn non_negative_max_keys(max_keys: Option<i32>) -> Result<u32, S3Error> {
    match max_keys {
        None => Ok(DEFAULT_MAX_KEYS),
        Some(n) if n >= 0 => Ok(n as u32),
        Some(_) => Err(S3Error::invalid_argument("max-keys must be non-negative")),
    }
}

/// Parse an `x-amz-copy-source` header value of the form `[/]bucket/key`.
fn parse_copy_source(copy_source: &str) -> Result<(String, String), S3Error> {
    let decoded = percent_encoding::percent_decode_str(copy_source)
        .decode_utf8()
        .map_err(|_| S3Error::invalid_argument("x-amz-copy-source is not valid UTF-8"))?;
    let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);
    let (bucket, key) = trimmed
        .split_once('/')
        .ok_or_else(|| S3Error::invalid_argument("x-amz-copy-source must be of the form bucket/key"))?;
    if bucket.is_empty() || key.is_empty() {
        return Err(S3Error::invalid_argument("x-amz-copy-source must be of the form bucket/key"));
    }
    Ok((bucket.to_owned(), key.to_owned()))
}

/// Parse a single-range `Range: bytes=start-end` header into an inclusive
/// `(start, end)` pair clamped to `total`. Multi-range requests and anything
/// malformed are treated as "ignore the header" by returning `None`.
fn parse_range(range: &str, total: u64) -> Option<(u64, u64)> {
    if total == 0 {
        return None;
    }
    let spec = range.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;

    if start.is_empty() {
        let suffix_len: u64 = end.parse().ok()?;
        if suffix_len == 0 {
            return None;
        }
        let suffix_len = suffix_len.min(total);
        return Some((total - suffix_len, total - 1));
    }

    let start: u64 = start.parse().ok()?;
    if start >= total {
        return None;
    }
    let end = if end.is_empty() { total - 1 } else { end.parse().ok()? };
    if start > end {
        return None;
    }
    Some((start, end.min(total - 1)))
}

fn auth_to_s3(err: AuthError) -> S3Error {
    match err {
        AuthError::InvalidAccessKeyId => S3Error::invalid_access_key_id(),
        _ => S3Error::access_denied(),
    }
}

fn metadata_to_s3(err: MetadataError, resource: &str) -> S3Error {
    match err {
        MetadataError::NoSuchBucket => S3Error::no_such_bucket(resource),
        MetadataError::NoSuchKey => S3Error::no_such_key(resource),
        MetadataError::NoSuchUpload => S3Error::no_such_upload(resource),
        MetadataError::BucketAlreadyExists => S3Error::bucket_already_exists(resource),
        MetadataError::BucketNotEmpty => S3Error::bucket_not_empty(resource),
        MetadataError::InvalidPart(msg) => S3Error::invalid_part(msg),
        MetadataError::InvalidArgument(msg) => S3Error::invalid_argument(msg),
        MetadataError::NoSuchApiKey => S3Error::invalid_access_key_id(),
        MetadataError::Connection(source) => S3Error::internal_error(anyhow::anyhow!(source)),
        MetadataError::Pool(source) => S3Error::internal_error(anyhow::anyhow!(source)),
    }
}

fn store_to_s3(err: FileStoreError, resource: &str) -> S3Error {
    match err {
        FileStoreError::NotFound => S3Error::no_such_key(resource),
        FileStoreError::BucketNotEmpty => S3Error::bucket_not_empty(resource),
        FileStoreError::InvalidName(msg) => S3Error::invalid_argument(msg),
        FileStoreError::Io(source) => S3Error::internal_error(anyhow::anyhow!(source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_accept_part_numbers_in_range() {
        assert_eq!(validate_part_number(1).unwrap(), 1);
        assert_eq!(validate_part_number(10_000).unwrap(), 10_000);
    }

    #[test]
    fn test_should_reject_part_number_out_of_range() {
        assert!(validate_part_number(0).is_err());
        assert!(validate_part_number(10_001).is_err());
        assert!(validate_part_number(-1).is_err());
    }

    #[test]
    fn test_should_accept_strictly_ascending_part_numbers() {
        assert!(check_ascending_part_number(None, 1).is_ok());
        assert!(check_ascending_part_number(Some(1), 2).is_ok());
    }

    #[test]
    fn test_should_reject_out_of_order_part_numbers() {
        assert!(check_ascending_part_number(Some(2), 1).is_err());
        assert!(check_ascending_part_number(Some(2), 2).is_err());
    }

    #[test]
    fn test_should_reject_undersized_non_final_part() {
        assert!(check_part_min_size(false, 1, MIN_MULTIPART_PART_SIZE - 1).is_err());
        assert!(check_part_min_size(false, 1, MIN_MULTIPART_PART_SIZE).is_ok());
    }

    #[test]
    fn test_should_allow_undersized_final_part() {
        assert!(check_part_min_size(true, 2, 3).is_ok());
    }

    #[test]
    fn test_should_parse_single_range() {
        assert_eq!(parse_range("bytes=0-4", 10), Some((0, 4)));
        assert_eq!(parse_range("bytes=5-", 10), Some((5, 9)));
        assert_eq!(parse_range("bytes=-3", 10), Some((7, 9)));
    }

    #[test]
    fn test_should_ignore_malformed_or_multi_range() {
        assert_eq!(parse_range("bytes=0-4,6-8", 10), None);
        assert_eq!(parse_range("bytes=20-30", 10), None);
        assert_eq!(parse_range("nonsense", 10), None);
    }

    #[test]
    fn test_should_parse_copy_source() {
        assert_eq!(parse_copy_source("/src-bucket/src-key").unwrap(), ("src-bucket".to_owned(), "src-key".to_owned()));
        assert_eq!(parse_copy_source("src-bucket/nested/key").unwrap(), ("src-bucket".to_owned(), "nested/key".to_owned()));
    }

    #[test]
    fn test_should_reject_malformed_copy_source() {
        assert!(parse_copy_source("no-slash").is_err());
        assert!(parse_copy_source("/bucket/").is_err());
    }

    #[test]
    fn test_should_reject_negative_max_keys() {
        assert_eq!(non_negative_max_keys(None).unwrap(), DEFAULT_MAX_KEYS);
        assert_eq!(non_negative_max_keys(Some(5)).unwrap(), 5);
        assert!(non_negative_max_keys(Some(-1)).is_err());
    }
}
