//! HTTP request to S3 Input struct deserialization.
//!
//! This module provides the [`FromS3Request`] trait and implementations for converting
//! raw HTTP request parts (headers, query parameters, URI labels, body) into typed S3
//! Input structs defined in `strongbox-model`.
//!
//! Field extraction follows the doc comments on each input struct's fields:
//! - `HTTP header: x-amz-xxx` - extract from request headers
//! - `HTTP query: name` - extract from query parameters
//! - `HTTP label (URI path)` - from the bucket/key routing context
//! - `HTTP payload body` - from the request body (XML or raw bytes)

use bytes::Bytes;
use strongbox_model::error::S3Error;
use strongbox_model::input::{
    AbortMultipartUploadInput, CompleteMultipartUploadInput, CopyObjectInput,
    CreateBucketInput, CreateMultipartUploadInput, DeleteBucketInput, DeleteObjectInput,
    GetObjectInput, HeadBucketInput, HeadObjectInput, ListBucketsInput, ListObjectsInput,
    ListObjectsV2Input, ListPartsInput, PutObjectInput, UploadPartInput,
};
use strongbox_model::request::StreamingBlob;
use strongbox_model::types::CompletedMultipartUpload;
use strongbox_xml::from_xml;

/// Trait for extracting an S3 input struct from HTTP request components.
///
/// Each S3 operation has a corresponding Input struct. Implementors of this trait
/// know how to populate that struct from the HTTP request parts.
pub trait FromS3Request: Sized {
    /// Extract the input from HTTP request parts.
    ///
    /// # Arguments
    /// - `parts` - The HTTP request head (method, URI, headers).
    /// - `bucket` - The resolved bucket name, if any.
    /// - `key` - The resolved object key, if any.
    /// - `query_params` - Parsed query parameters from the URI.
    /// - `body` - The raw request body bytes.
    ///
    /// # Errors
    ///
    /// Returns an `S3Error` if required fields are missing or field values
    /// cannot be parsed.
    fn from_s3_request(
        parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        query_params: &[(String, String)],
        body: Bytes,
    ) -> Result<Self, S3Error>;
}

// ---------------------------------------------------------------------------
// Helper functions for extracting typed values from HTTP request parts
// ---------------------------------------------------------------------------

/// Extract a header value as a string.
pub fn header_str(parts: &http::request::Parts, name: &str) -> Option<String> {
    parts.headers.get(name).and_then(|v| v.to_str().ok()).map(ToOwned::to_owned)
}

/// Extract a header value and parse it into a type implementing `FromStr`.
pub fn header_parse<T: std::str::FromStr>(parts: &http::request::Parts, name: &str) -> Option<T> {
    parts.headers.get(name).and_then(|v| v.to_str().ok()).and_then(|s| s.parse().ok())
}

/// Get a query parameter value by name.
#[must_use]
pub fn query_param(params: &[(String, String)], name: &str) -> Option<String> {
    params.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

/// Get a query parameter and parse it into a type implementing `FromStr`.
#[must_use]
pub fn query_param_parse<T: std::str::FromStr>(params: &[(String, String)], name: &str) -> Option<T> {
    params.iter().find(|(k, _)| k == name).and_then(|(_, v)| v.parse().ok())
}

/// Require a bucket name from the routing context, returning an error if absent.
fn require_bucket(bucket: Option<&str>) -> Result<String, S3Error> {
    bucket.map(ToOwned::to_owned).ok_or_else(|| S3Error::invalid_argument("Bucket name is required"))
}

/// Require an object key from the routing context, returning an error if absent.
fn require_key(key: Option<&str>) -> Result<String, S3Error> {
    key.map(ToOwned::to_owned).ok_or_else(|| S3Error::invalid_argument("Object key is required"))
}

/// Parse an XML body into a typed value, returning an `S3Error` on failure.
fn parse_xml_body<T: strongbox_xml::S3Deserialize>(body: &Bytes) -> Result<T, S3Error> {
    from_xml(body).map_err(|e| S3Error::invalid_argument(format!("failed to parse XML body: {e}")))
}

// ---------------------------------------------------------------------------
// Bucket operations
// ---------------------------------------------------------------------------

impl FromS3Request for ListBucketsInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        _bucket: Option<&str>,
        _key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {})
    }
}

impl FromS3Request for CreateBucketInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        _key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
        })
    }
}

impl FromS3Request for DeleteBucketInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        _key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
        })
    }
}

impl FromS3Request for HeadBucketInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        _key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
        })
    }
}

// ---------------------------------------------------------------------------
// List operations
// ---------------------------------------------------------------------------

impl FromS3Request for ListObjectsInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        _key: Option<&str>,
        query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
            delimiter: query_param(query_params, "delimiter"),
            marker: query_param(query_params, "marker"),
            max_keys: query_param_parse(query_params, "max-keys"),
            prefix: query_param(query_params, "prefix"),
        })
    }
}

impl FromS3Request for ListObjectsV2Input {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        _key: Option<&str>,
        query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
            continuation_token: query_param(query_params, "continuation-token"),
            delimiter: query_param(query_params, "delimiter"),
            max_keys: query_param_parse(query_params, "max-keys"),
            prefix: query_param(query_params, "prefix"),
            start_after: query_param(query_params, "start-after"),
        })
    }
}

// ---------------------------------------------------------------------------
// Object operations
// ---------------------------------------------------------------------------

impl FromS3Request for GetObjectInput {
    fn from_s3_request(
        parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
            key: require_key(key)?,
            if_none_match: header_str(parts, "If-None-Match"),
            range: header_str(parts, "Range"),
        })
    }
}

impl FromS3Request for HeadObjectInput {
    fn from_s3_request(
        parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
            key: require_key(key)?,
            if_none_match: header_str(parts, "If-None-Match"),
            range: header_str(parts, "Range"),
        })
    }
}

impl FromS3Request for PutObjectInput {
    fn from_s3_request(
        parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        _query_params: &[(String, String)],
        body: Bytes,
    ) -> Result<Self, S3Error> {
        let body_blob = if body.is_empty() { None } else { Some(StreamingBlob::new(body)) };

        Ok(Self {
            body: body_blob,
            bucket: require_bucket(bucket)?,
            content_length: header_parse(parts, "Content-Length"),
            content_md5: header_str(parts, "Content-MD5"),
            content_type: header_str(parts, "Content-Type"),
            key: require_key(key)?,
        })
    }
}

impl FromS3Request for CopyObjectInput {
    fn from_s3_request(
        parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        let copy_source = header_str(parts, "x-amz-copy-source")
            .ok_or_else(|| S3Error::invalid_argument("x-amz-copy-source header is required for CopyObject"))?;

        Ok(Self {
            bucket: require_bucket(bucket)?,
            key: require_key(key)?,
            copy_source,
        })
    }
}

impl FromS3Request for DeleteObjectInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
            key: require_key(key)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Multipart operations
// ---------------------------------------------------------------------------

impl FromS3Request for CreateMultipartUploadInput {
    fn from_s3_request(
        parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        _query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        Ok(Self {
            bucket: require_bucket(bucket)?,
            content_type: header_str(parts, "Content-Type"),
            key: require_key(key)?,
        })
    }
}

impl FromS3Request for UploadPartInput {
    fn from_s3_request(
        parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        query_params: &[(String, String)],
        body: Bytes,
    ) -> Result<Self, S3Error> {
        let part_number = query_param_parse(query_params, "partNumber")
            .ok_or_else(|| S3Error::invalid_argument("partNumber query parameter is required"))?;
        let upload_id = query_param(query_params, "uploadId")
            .ok_or_else(|| S3Error::invalid_argument("uploadId query parameter is required"))?;
        let body_blob = if body.is_empty() { None } else { Some(StreamingBlob::new(body)) };

        Ok(Self {
            body: body_blob,
            bucket: require_bucket(bucket)?,
            content_length: header_parse(parts, "Content-Length"),
            key: require_key(key)?,
            part_number,
            upload_id,
        })
    }
}

impl FromS3Request for CompleteMultipartUploadInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        query_params: &[(String, String)],
        body: Bytes,
    ) -> Result<Self, S3Error> {
        let upload_id = query_param(query_params, "uploadId")
            .ok_or_else(|| S3Error::invalid_argument("uploadId query parameter is required"))?;

        Ok(Self {
            bucket: require_bucket(bucket)?,
            key: require_key(key)?,
            multipart_upload: if body.is_empty() { None } else { Some(parse_xml_body::<CompletedMultipartUpload>(&body)?) },
            upload_id,
        })
    }
}

impl FromS3Request for AbortMultipartUploadInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        let upload_id = query_param(query_params, "uploadId")
            .ok_or_else(|| S3Error::invalid_argument("uploadId query parameter is required"))?;

        Ok(Self {
            bucket: require_bucket(bucket)?,
            key: require_key(key)?,
            upload_id,
        })
    }
}

impl FromS3Request for ListPartsInput {
    fn from_s3_request(
        _parts: &http::request::Parts,
        bucket: Option<&str>,
        key: Option<&str>,
        query_params: &[(String, String)],
        _body: Bytes,
    ) -> Result<Self, S3Error> {
        let upload_id = query_param(query_params, "uploadId")
            .ok_or_else(|| S3Error::invalid_argument("uploadId query parameter is required"))?;

        Ok(Self {
            bucket: require_bucket(bucket)?,
            key: require_key(key)?,
            max_parts: query_param_parse(query_params, "max-parts"),
            part_number_marker: query_param(query_params, "part-number-marker"),
            upload_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(method: &str, uri: &str) -> http::request::Parts {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .expect("valid request")
            .into_parts();
        parts
    }

    #[test]
    fn test_should_require_bucket_for_create_bucket() {
        let p = parts("PUT", "/");
        let err = CreateBucketInput::from_s3_request(&p, None, None, &[], Bytes::new()).unwrap_err();
        assert_eq!(err.code, strongbox_model::error::S3ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_should_extract_range_and_if_none_match_for_get_object() {
        let mut p = parts("GET", "/b/k");
        p.headers.insert("Range", "bytes=0-99".parse().unwrap());
        p.headers.insert("If-None-Match", "\"abc\"".parse().unwrap());
        let input = GetObjectInput::from_s3_request(&p, Some("b"), Some("k"), &[], Bytes::new()).unwrap();
        assert_eq!(input.range.as_deref(), Some("bytes=0-99"));
        assert_eq!(input.if_none_match.as_deref(), Some("\"abc\""));
    }

    #[test]
    fn test_should_populate_put_object_body_and_headers() {
        let mut p = parts("PUT", "/b/k");
        p.headers.insert("Content-Type", "text/plain".parse().unwrap());
        let input = PutObjectInput::from_s3_request(&p, Some("b"), Some("k"), &[], Bytes::from("hello")).unwrap();
        assert_eq!(input.content_type.as_deref(), Some("text/plain"));
        assert_eq!(input.body.unwrap().data, Bytes::from("hello"));
    }

    #[test]
    fn test_should_require_copy_source_header_for_copy_object() {
        let p = parts("PUT", "/b/k");
        let err = CopyObjectInput::from_s3_request(&p, Some("b"), Some("k"), &[], Bytes::new()).unwrap_err();
        assert_eq!(err.code, strongbox_model::error::S3ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_should_require_upload_id_for_list_parts() {
        let p = parts("GET", "/b/k");
        let err = ListPartsInput::from_s3_request(&p, Some("b"), Some("k"), &[], Bytes::new()).unwrap_err();
        assert_eq!(err.code, strongbox_model::error::S3ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_should_parse_upload_part_query_params() {
        let params = vec![("partNumber".to_owned(), "3".to_owned()), ("uploadId".to_owned(), "xyz".to_owned())];
        let p = parts("PUT", "/b/k?partNumber=3&uploadId=xyz");
        let input = UploadPartInput::from_s3_request(&p, Some("b"), Some("k"), &params, Bytes::from("part")).unwrap();
        assert_eq!(input.part_number, 3);
        assert_eq!(input.upload_id, "xyz");
    }

    #[test]
    fn test_should_leave_multipart_upload_none_for_empty_complete_body() {
        let params = vec![("uploadId".to_owned(), "xyz".to_owned())];
        let p = parts("POST", "/b/k?uploadId=xyz");
        let input = CompleteMultipartUploadInput::from_s3_request(&p, Some("b"), Some("k"), &params, Bytes::new()).unwrap();
        assert!(input.multipart_upload.is_none());
    }

    #[test]
    fn test_should_parse_list_objects_v2_query_params() {
        let params = vec![
            ("prefix".to_owned(), "photos/".to_owned()),
            ("delimiter".to_owned(), "/".to_owned()),
            ("max-keys".to_owned(), "50".to_owned()),
        ];
        let p = parts("GET", "/b?list-type=2&prefix=photos/&delimiter=/&max-keys=50");
        let input = ListObjectsV2Input::from_s3_request(&p, Some("b"), None, &params, Bytes::new()).unwrap();
        assert_eq!(input.prefix.as_deref(), Some("photos/"));
        assert_eq!(input.delimiter.as_deref(), Some("/"));
        assert_eq!(input.max_keys, Some(50));
    }
}
