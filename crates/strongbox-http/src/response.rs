//! S3 Output struct to HTTP response serialization.
//!
//! This module provides the [`IntoS3Response`] trait and implementations for converting
//! typed S3 Output structs from `strongbox-model` into HTTP responses with the
//! appropriate status code, headers, and body.
//!
//! Response categories:
//! - **Header-only**: Write operations that return metadata in response headers
//!   (`PutObject`, `UploadPart`, `DeleteObject`, `HeadBucket`, ...).
//! - **XML body**: List operations and multipart-session responses, serialized via
//!   `strongbox_xml::to_xml`.
//! - **Streaming body**: `GetObject` passes the object body straight through.
//! - **Mixed**: `CopyObject` and `CompleteMultipartUpload` return both an XML body and
//!   response headers.

use http::header::HeaderValue;
use strongbox_model::error::S3Error;
use strongbox_model::output::{
    AbortMultipartUploadOutput, CompleteMultipartUploadOutput, CopyObjectOutput,
    CreateBucketOutput, CreateMultipartUploadOutput, DeleteObjectOutput, GetObjectOutput,
    HeadBucketOutput, HeadObjectOutput, ListBucketsOutput, ListObjectsOutput,
    ListObjectsV2Output, ListPartsOutput, PutObjectOutput, UploadPartOutput,
};
use strongbox_xml::to_xml;

use crate::body::S3ResponseBody;

/// Trait for converting an S3 output struct into an HTTP response.
///
/// Each S3 operation's Output type implements this trait to produce the correct
/// HTTP response with headers, status code, and body.
pub trait IntoS3Response {
    /// Convert this output into an HTTP response.
    ///
    /// # Errors
    ///
    /// Returns an `S3Error` if the response cannot be constructed (e.g., invalid
    /// header value, XML serialization failure).
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error>;
}

// ---------------------------------------------------------------------------
// Helper functions for building responses
// ---------------------------------------------------------------------------

/// Set an optional header on a response builder if the value is `Some`.
fn set_optional_header(builder: http::response::Builder, name: &str, value: Option<&str>) -> http::response::Builder {
    if let Some(v) = value {
        if let Ok(hv) = HeaderValue::from_str(v) {
            return builder.header(name, hv);
        }
    }
    builder
}

/// Set an optional integer header.
fn set_optional_int_header(builder: http::response::Builder, name: &str, value: Option<i64>) -> http::response::Builder {
    if let Some(v) = value {
        return builder.header(name, v);
    }
    builder
}

/// Set an optional HTTP date header from a `DateTime<Utc>`.
fn set_optional_timestamp_header(
    builder: http::response::Builder,
    name: &str,
    value: Option<&chrono::DateTime<chrono::Utc>>,
) -> http::response::Builder {
    if let Some(v) = value {
        let formatted = v.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(hv) = HeaderValue::from_str(&formatted) {
            return builder.header(name, hv);
        }
    }
    builder
}

/// Build a response from a builder, converting build errors to `S3Error`.
fn build_response(builder: http::response::Builder, body: S3ResponseBody) -> Result<http::Response<S3ResponseBody>, S3Error> {
    builder
        .body(body)
        .map_err(|e| S3Error::internal_error(anyhow::anyhow!("failed to build HTTP response: {e}")))
}

/// Serialize an XML body and wrap it into a `200 OK` / `application/xml` response.
fn xml_response<T: strongbox_xml::S3Serialize>(root_element: &str, value: &T) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let xml = to_xml(root_element, value).map_err(|e| S3Error::internal_error(anyhow::anyhow!("failed to serialize XML response: {e}")))?;
    let builder = http::Response::builder().status(http::StatusCode::OK).header("Content-Type", "application/xml");
    build_response(builder, S3ResponseBody::from_xml(xml))
}

// ---------------------------------------------------------------------------
// Bucket operations
// ---------------------------------------------------------------------------

impl IntoS3Response for CreateBucketOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let mut builder = http::Response::builder().status(http::StatusCode::OK);
        builder = set_optional_header(builder, "Location", self.location.as_deref());
        build_response(builder, S3ResponseBody::empty())
    }
}

impl IntoS3Response for HeadBucketOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let builder = http::Response::builder().status(http::StatusCode::OK);
        build_response(builder, S3ResponseBody::empty())
    }
}

impl IntoS3Response for ListBucketsOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        xml_response("ListAllMyBucketsResult", &self)
    }
}

// ---------------------------------------------------------------------------
// List operations
// ---------------------------------------------------------------------------

impl IntoS3Response for ListObjectsOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        xml_response("ListBucketResult", &self)
    }
}

impl IntoS3Response for ListObjectsV2Output {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        xml_response("ListBucketResult", &self)
    }
}

// ---------------------------------------------------------------------------
// Object operations
// ---------------------------------------------------------------------------

impl IntoS3Response for GetObjectOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let status = if self.content_range.is_some() { http::StatusCode::PARTIAL_CONTENT } else { http::StatusCode::OK };
        let mut builder = http::Response::builder().status(status);
        builder = set_optional_header(builder, "accept-ranges", self.accept_ranges.as_deref());
        builder = set_optional_int_header(builder, "Content-Length", self.content_length);
        builder = set_optional_header(builder, "Content-Range", self.content_range.as_deref());
        builder = set_optional_header(builder, "Content-Type", self.content_type.as_deref());
        builder = set_optional_header(builder, "ETag", self.e_tag.as_deref());
        builder = set_optional_timestamp_header(builder, "Last-Modified", self.last_modified.as_ref());

        let body = if let Some(blob) = self.body { S3ResponseBody::from_bytes(blob.data) } else { S3ResponseBody::empty() };
        build_response(builder, body)
    }
}

impl IntoS3Response for HeadObjectOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let status = if self.content_range.is_some() { http::StatusCode::PARTIAL_CONTENT } else { http::StatusCode::OK };
        let mut builder = http::Response::builder().status(status);
        builder = set_optional_header(builder, "accept-ranges", self.accept_ranges.as_deref());
        builder = set_optional_int_header(builder, "Content-Length", self.content_length);
        builder = set_optional_header(builder, "Content-Range", self.content_range.as_deref());
        builder = set_optional_header(builder, "Content-Type", self.content_type.as_deref());
        builder = set_optional_header(builder, "ETag", self.e_tag.as_deref());
        builder = set_optional_timestamp_header(builder, "Last-Modified", self.last_modified.as_ref());
        build_response(builder, S3ResponseBody::empty())
    }
}

impl IntoS3Response for PutObjectOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let mut builder = http::Response::builder().status(http::StatusCode::OK);
        builder = set_optional_header(builder, "ETag", self.e_tag.as_deref());
        build_response(builder, S3ResponseBody::empty())
    }
}

impl IntoS3Response for CopyObjectOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        xml_response("CopyObjectResult", &self)
    }
}

impl IntoS3Response for DeleteObjectOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        build_response(http::Response::builder().status(http::StatusCode::NO_CONTENT), S3ResponseBody::empty())
    }
}

// ---------------------------------------------------------------------------
// Multipart operations
// ---------------------------------------------------------------------------

impl IntoS3Response for CreateMultipartUploadOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        xml_response("InitiateMultipartUploadResult", &self)
    }
}

impl IntoS3Response for UploadPartOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let mut builder = http::Response::builder().status(http::StatusCode::OK);
        builder = set_optional_header(builder, "ETag", self.e_tag.as_deref());
        build_response(builder, S3ResponseBody::empty())
    }
}

impl IntoS3Response for CompleteMultipartUploadOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        xml_response("CompleteMultipartUploadResult", &self)
    }
}

impl IntoS3Response for AbortMultipartUploadOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        build_response(http::Response::builder().status(http::StatusCode::NO_CONTENT), S3ResponseBody::empty())
    }
}

impl IntoS3Response for ListPartsOutput {
    fn into_s3_response(self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        xml_response("ListPartsResult", &self)
    }
}

/// Convert an `S3Error` into an HTTP response carrying the AWS `Error` XML shape.
#[must_use]
pub fn error_to_response(err: &S3Error, request_id: &str) -> http::Response<S3ResponseBody> {
    let xml = strongbox_xml::error_to_xml(err.code.as_str(), &err.message, err.resource.as_deref(), request_id);
    http::Response::builder()
        .status(err.status_code)
        .header("Content-Type", "application/xml")
        .body(S3ResponseBody::from_xml(xml))
        .unwrap_or_else(|_| {
            http::Response::builder()
                .status(http::StatusCode::INTERNAL_SERVER_ERROR)
                .body(S3ResponseBody::empty())
                .expect("static fallback response is always valid")
        })
}
