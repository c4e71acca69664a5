//! The main S3 HTTP service implementing hyper's `Service` trait.
//!
//! [`S3HttpService`] ties together routing, authentication, dispatch, and response
//! serialization into a single hyper-compatible service. It handles:
//!
//! 1. Health check interception (`GET /_localstack/health`)
//! 2. CORS preflight requests (`OPTIONS`)
//! 3. Request body collection and aws-chunked de-framing
//! 4. S3 request routing via [`S3Router`]
//! 5. Optional SigV4 authentication (header, streaming-chunked, or presigned)
//! 6. Operation dispatch to the [`S3Handler`]
//! 7. Common response headers (`x-amz-request-id`, `Server`, `Date`)
//! 8. Error response formatting

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use strongbox_auth::CredentialProvider;
use strongbox_auth::chunked::streaming_verifier_for_request;
use strongbox_auth::sigv4::{STREAMING_PAYLOAD, UNSIGNED_PAYLOAD};
use strongbox_model::error::S3Error;

use crate::body::S3ResponseBody;
use crate::codec::{decode_aws_chunked, decode_aws_chunked_signed, is_aws_chunked, strip_aws_chunked_encoding};
use crate::dispatch::{S3Handler, dispatch_operation};
use crate::response::error_to_response;
use crate::router::S3Router;

/// Configuration for the S3 HTTP service.
#[derive(Clone)]
pub struct S3HttpConfig {
    /// The base domain for virtual-hosted-style requests (e.g., `s3.localhost`).
    pub domain: String,
    /// Whether to enable virtual-hosted-style bucket addressing.
    pub virtual_hosting: bool,
    /// Whether to skip SigV4 signature validation (useful for development).
    pub skip_signature_validation: bool,
    /// The AWS region this service operates in.
    pub region: String,
    /// Optional credential provider for SigV4 and presigned URL verification.
    pub credential_provider: Option<Arc<dyn CredentialProvider>>,
}

impl std::fmt::Debug for S3HttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3HttpConfig")
            .field("domain", &self.domain)
            .field("virtual_hosting", &self.virtual_hosting)
            .field("skip_signature_validation", &self.skip_signature_validation)
            .field("region", &self.region)
            .field("credential_provider", &self.credential_provider.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for S3HttpConfig {
    fn default() -> Self {
        Self {
            domain: "s3.localhost".to_owned(),
            virtual_hosting: true,
            skip_signature_validation: true,
            region: "us-east-1".to_owned(),
            credential_provider: None,
        }
    }
}

/// The S3 HTTP service that implements hyper's `Service` trait.
///
/// This service processes incoming HTTP requests through the full S3 request lifecycle:
/// routing, authentication, dispatch to the handler, and response formatting.
///
/// # Type Parameters
///
/// - `H`: The business logic handler implementing [`S3Handler`].
#[derive(Debug)]
pub struct S3HttpService<H: S3Handler> {
    handler: Arc<H>,
    router: S3Router,
    config: Arc<S3HttpConfig>,
}

impl<H: S3Handler> S3HttpService<H> {
    /// Create a new S3 HTTP service with the given handler and configuration.
    #[must_use]
    pub fn new(handler: H, config: S3HttpConfig) -> Self {
        let router = S3Router::new(&config.domain, config.virtual_hosting);
        Self { handler: Arc::new(handler), router, config: Arc::new(config) }
    }

    /// Create a new S3 HTTP service from an `Arc<H>` handler and configuration.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, config: S3HttpConfig) -> Self {
        let router = S3Router::new(&config.domain, config.virtual_hosting);
        Self { handler, router, config: Arc::new(config) }
    }
}

impl<H: S3Handler> Clone for S3HttpService<H> {
    fn clone(&self) -> Self {
        Self { handler: Arc::clone(&self.handler), router: self.router.clone(), config: Arc::clone(&self.config) }
    }
}

impl<H: S3Handler> Service<http::Request<Incoming>> for S3HttpService<H> {
    type Response = http::Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let router = self.router.clone();
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response = process_request(req, handler.as_ref(), &router, &config, &request_id).await;
            let response = add_common_headers(response, &request_id);
            Ok(response)
        })
    }
}

/// Process an incoming HTTP request through the S3 pipeline.
async fn process_request<H: S3Handler>(
    req: http::Request<Incoming>,
    handler: &H,
    router: &S3Router,
    config: &S3HttpConfig,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing S3 request");

    // 1. Health check interception.
    if is_health_check(&method, uri.path()) {
        return health_check_response();
    }

    // 2. CORS preflight.
    if method == http::Method::OPTIONS {
        return cors_preflight_response();
    }

    // 3. Route the request (needs the original request for headers).
    let ctx = match router.resolve(&req) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(%method, %uri, error = %err, request_id, "failed to route S3 request");
            return error_to_response(&err, request_id);
        }
    };

    info!(operation = %ctx.operation, bucket = ?ctx.bucket, key = ?ctx.key, request_id, "routed S3 request");

    // 4. Collect and de-frame the body.
    let (mut parts, incoming) = req.into_parts();
    let raw_body = match collect_body(incoming).await {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, request_id, "failed to collect request body");
            return error_to_response(&S3Error::internal_error(anyhow::anyhow!(err)), request_id);
        }
    };

    let declared_hash = parts
        .headers
        .get("x-amz-content-sha256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNSIGNED_PAYLOAD)
        .to_owned();

    // A concrete (non-sentinel) hash must match the actual body we received.
    if !matches!(declared_hash.as_str(), UNSIGNED_PAYLOAD | STREAMING_PAYLOAD)
        && !declared_hash.starts_with("STREAMING-")
        && hash_payload(&raw_body) != declared_hash
    {
        warn!(request_id, "x-amz-content-sha256 does not match request body");
        return error_to_response(&S3Error::signature_does_not_match(), request_id);
    }

    // 5. Authentication. An empty access key id means the request reached the
    // handler anonymously; only a public bucket's object reads may proceed.
    let mut access_key_id = String::new();
    if !config.skip_signature_validation {
        if let Some(ref cred_provider) = config.credential_provider {
            let has_presigned = parts.uri.query().is_some_and(|q| q.contains("X-Amz-Signature"));

            // A request with neither a presigned signature nor an Authorization
            // header is passed through as anonymous: the handler's permission
            // check is what actually allows it, and only for public-bucket
            // object reads.
            let auth_result = if has_presigned {
                strongbox_auth::verify_presigned(&parts, cred_provider.as_ref())
            } else if parts.headers.contains_key("authorization") {
                strongbox_auth::verify_sigv4(&parts, &declared_hash, cred_provider.as_ref())
            } else {
                Ok(strongbox_auth::AuthResult {
                    access_key_id: String::new(),
                    region: String::new(),
                    service: String::new(),
                    signed_headers: Vec::new(),
                })
            };

            match auth_result {
                Ok(result) => access_key_id = result.access_key_id,
                Err(auth_err) => {
                    warn!(error = %auth_err, request_id, "authentication failed");
                    return error_to_response(&S3Error::signature_does_not_match().with_message(auth_err.to_string()), request_id);
                }
            }

            // Streaming chunk-signed uploads carry a per-chunk signature chain
            // seeded from the header signature just verified above.
            if declared_hash == STREAMING_PAYLOAD {
                match streaming_verifier_for_request(&parts, cred_provider.as_ref()) {
                    Ok(mut verifier) => match decode_aws_chunked_signed(&raw_body, &mut verifier) {
                        Ok(decoded) => {
                            strip_aws_chunked_encoding(&mut parts.headers);
                            return dispatch_response(handler, parts, decoded, ctx, &access_key_id, request_id).await;
                        }
                        Err(err) => {
                            warn!(error = %err, request_id, "chunk signature verification failed");
                            return error_to_response(&err, request_id);
                        }
                    },
                    Err(auth_err) => {
                        warn!(error = %auth_err, request_id, "failed to build chunk verifier");
                        return error_to_response(&S3Error::signature_does_not_match(), request_id);
                    }
                }
            }
        }
    }

    // 6. De-frame unsigned aws-chunked bodies (anonymous requests, dev mode).
    let body = if is_aws_chunked(&parts) {
        match decode_aws_chunked(&raw_body) {
            Ok(decoded) => {
                strip_aws_chunked_encoding(&mut parts.headers);
                decoded
            }
            Err(err) => {
                warn!(error = %err, request_id, "failed to decode aws-chunked body");
                return error_to_response(&err, request_id);
            }
        }
    } else {
        raw_body
    };

    dispatch_response(handler, parts, body, ctx, &access_key_id, request_id).await
}

/// Dispatch a fully-decoded request body to the handler and format the result.
async fn dispatch_response<H: S3Handler>(
    handler: &H,
    parts: http::request::Parts,
    body: Bytes,
    ctx: crate::router::RoutingContext,
    access_key_id: &str,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    match dispatch_operation(handler, parts, body, ctx, access_key_id).await {
        Ok(response) => response,
        Err(err) => {
            debug!(error = %err, request_id, "S3 operation returned error");
            error_to_response(&err, request_id)
        }
    }
}

/// Collect the full body from a hyper `Incoming` stream into `Bytes`.
async fn collect_body(incoming: Incoming) -> Result<Bytes, hyper::Error> {
    let collected = incoming.collect().await?;
    Ok(collected.to_bytes())
}

/// Compute the hex SHA-256 digest of a request payload.
fn hash_payload(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && (path == "/_localstack/health" || path == "/_health" || path == "/health")
}

/// Produce a health check response.
fn health_check_response() -> http::Response<S3ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(S3ResponseBody::from_string(r#"{"status":"running","service":"s3"}"#))
        .expect("static health response should be valid")
}

/// Produce a CORS preflight response.
fn cors_preflight_response() -> http::Response<S3ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, PUT, POST, DELETE, HEAD, OPTIONS")
        .header("Access-Control-Allow-Headers", "*, Authorization, Content-Type, x-amz-*")
        .header("Access-Control-Max-Age", "86400")
        .body(S3ResponseBody::empty())
        .expect("static CORS response should be valid")
}

/// Add common response headers to every S3 response.
fn add_common_headers(mut response: http::Response<S3ResponseBody>, request_id: &str) -> http::Response<S3ResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::header::HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", hv);
    }

    headers.insert("Server", http::header::HeaderValue::from_static("StrongboxStore"));
    headers.insert("Access-Control-Allow-Origin", http::header::HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Expose-Headers",
        http::header::HeaderValue::from_static("x-amz-request-id, ETag"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_detect_health_check_paths() {
        assert!(is_health_check(&http::Method::GET, "/_localstack/health"));
        assert!(is_health_check(&http::Method::GET, "/_health"));
        assert!(is_health_check(&http::Method::GET, "/health"));
        assert!(!is_health_check(&http::Method::POST, "/_health"));
        assert!(!is_health_check(&http::Method::GET, "/mybucket"));
    }

    #[test]
    fn test_should_produce_health_check_response() {
        let resp = health_check_response();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(resp.headers().get("Content-Type").and_then(|v| v.to_str().ok()), Some("application/json"));
    }

    #[test]
    fn test_should_produce_cors_preflight_response() {
        let resp = cors_preflight_response();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert!(resp.headers().contains_key("Access-Control-Allow-Origin"));
        assert!(resp.headers().contains_key("Access-Control-Allow-Methods"));
    }

    #[test]
    fn test_should_add_common_headers() {
        let resp = http::Response::builder().status(http::StatusCode::OK).body(S3ResponseBody::empty()).expect("valid response");
        let resp = add_common_headers(resp, "test-request-id");
        assert_eq!(resp.headers().get("x-amz-request-id").and_then(|v| v.to_str().ok()), Some("test-request-id"));
        assert_eq!(resp.headers().get("Server").and_then(|v| v.to_str().ok()), Some("StrongboxStore"));
    }

    #[test]
    fn test_should_create_default_config() {
        let config = S3HttpConfig::default();
        assert_eq!(config.domain, "s3.localhost");
        assert!(config.virtual_hosting);
        assert!(config.skip_signature_validation);
        assert_eq!(config.region, "us-east-1");
        assert!(config.credential_provider.is_none());
    }

    #[test]
    fn test_should_debug_format_config() {
        let config = S3HttpConfig::default();
        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("S3HttpConfig"));
        assert!(debug_str.contains("s3.localhost"));
    }

    #[test]
    fn test_should_compute_matching_payload_hash() {
        let hash = hash_payload(b"hello");
        assert_eq!(hash, hex::encode(Sha256::digest(b"hello")));
    }
}
