//! AWS chunked transfer encoding decoder.
//!
//! When S3 clients (e.g. minio-go) send PutObject with `Content-Encoding:
//! aws-chunked`, the body uses a proprietary chunked format:
//!
//! ```text
//! <hex-size>;chunk-signature=<sig>\r\n
//! <data>\r\n
//! 0;chunk-signature=<sig>\r\n
//! \r\n
//! ```
//!
//! This module detects and decodes that framing so the server stores the raw
//! object data rather than the chunk envelope.

use bytes::{Bytes, BytesMut};
use http::header::HeaderMap;
use strongbox_auth::chunked::ChunkVerifier;
use strongbox_model::error::S3Error;

/// Return `true` if the request uses AWS chunked transfer encoding.
///
/// Detection checks:
/// - `Content-Encoding` header contains `aws-chunked`, OR
/// - `x-amz-content-sha256` starts with `STREAMING-`
pub fn is_aws_chunked(parts: &http::request::Parts) -> bool {
    if let Some(ce) = parts.headers.get(http::header::CONTENT_ENCODING) {
        if let Ok(s) = ce.to_str() {
            if s.contains("aws-chunked") {
                return true;
            }
        }
    }

    if let Some(sha) = parts.headers.get("x-amz-content-sha256") {
        if let Ok(s) = sha.to_str() {
            if s.starts_with("STREAMING-") {
                return true;
            }
        }
    }

    false
}

/// Decode an AWS-chunked body into the raw payload bytes.
///
/// # Errors
///
/// Returns an error if the chunked framing is malformed (missing size line,
/// invalid hex size, or truncated data).
pub fn decode_aws_chunked(body: &[u8]) -> Result<Bytes, S3Error> {
    decode_chunks(body, None)
}

/// Decode an AWS-chunked, SigV4-chunk-signed body, verifying each chunk's
/// signature against the running chain before appending its data.
///
/// # Errors
///
/// Returns an error if the framing is malformed (as [`decode_aws_chunked`]),
/// a chunk omits its `chunk-signature` extension, or any chunk's signature
/// fails to verify against the chain.
pub fn decode_aws_chunked_signed(body: &[u8], verifier: &mut ChunkVerifier) -> Result<Bytes, S3Error> {
    decode_chunks(body, Some(verifier))
}

fn decode_chunks(body: &[u8], mut verifier: Option<&mut ChunkVerifier>) -> Result<Bytes, S3Error> {
    let mut output = BytesMut::new();
    let mut pos = 0;

    loop {
        // Find the end of the size line (\r\n).
        let line_end = find_crlf(body, pos)
            .ok_or_else(|| S3Error::invalid_argument("Malformed aws-chunked body: missing chunk size line"))?;

        let size_line = &body[pos..line_end];

        // The size line format is: <hex-size>[;chunk-signature=<sig>][;other-ext]
        // Extract the hex size (everything before the first `;`).
        let (hex_part, signature) = if let Some(semi) = size_line.iter().position(|&b| b == b';') {
            let ext = std::str::from_utf8(&size_line[semi + 1..])
                .ok()
                .and_then(|s| s.strip_prefix("chunk-signature="));
            (&size_line[..semi], ext)
        } else {
            (size_line, None)
        };

        let hex_str = std::str::from_utf8(hex_part)
            .map_err(|_| S3Error::invalid_argument("Malformed aws-chunked body: invalid chunk size encoding"))?;

        let chunk_size = usize::from_str_radix(hex_str.trim(), 16)
            .map_err(|_| S3Error::invalid_argument(format!("Malformed aws-chunked body: invalid chunk size '{hex_str}'")))?;

        // Skip past the size line CRLF.
        pos = line_end + 2;

        // Read exactly `chunk_size` bytes of data.
        if pos + chunk_size > body.len() {
            return Err(S3Error::invalid_argument("Malformed aws-chunked body: chunk data truncated"));
        }
        let chunk_data = &body[pos..pos + chunk_size];

        if let Some(ref mut v) = verifier {
            let sig = signature.ok_or_else(|| S3Error::invalid_argument("Malformed aws-chunked body: chunk missing signature extension"))?;
            v.verify_chunk(chunk_data, sig).map_err(|_| S3Error::signature_does_not_match())?;
        }

        pos += chunk_size;

        // Expect trailing CRLF after the chunk data.
        if pos + 2 > body.len() || body[pos] != b'\r' || body[pos + 1] != b'\n' {
            return Err(S3Error::invalid_argument("Malformed aws-chunked body: missing CRLF after chunk data"));
        }
        pos += 2;

        if chunk_size == 0 {
            // Terminal chunk — we're done.
            break;
        }

        output.extend_from_slice(chunk_data);
    }

    Ok(output.freeze())
}

/// Remove `aws-chunked` from the `Content-Encoding` header.
///
/// If the header becomes empty after removal, the entire header is deleted.
pub fn strip_aws_chunked_encoding(headers: &mut HeaderMap) {
    let Some(ce) = headers.get(http::header::CONTENT_ENCODING) else {
        return;
    };

    let Ok(value) = ce.to_str() else {
        return;
    };

    let remaining: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|&v| !v.eq_ignore_ascii_case("aws-chunked"))
        .collect();

    if remaining.is_empty() {
        headers.remove(http::header::CONTENT_ENCODING);
    } else if let Ok(new_val) = http::header::HeaderValue::from_str(&remaining.join(", ")) {
        headers.insert(http::header::CONTENT_ENCODING, new_val);
    }
}

/// Find the position of the next `\r\n` starting from `start`.
fn find_crlf(data: &[u8], start: usize) -> Option<usize> {
    if data.len() < start + 2 {
        return None;
    }
    data[start..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|p| start + p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_parts(content_encoding: Option<&str>, sha256: Option<&str>) -> http::request::Parts {
        let mut builder = http::Request::builder().method("PUT").uri("/test");
        if let Some(ce) = content_encoding {
            builder = builder.header("content-encoding", ce);
        }
        if let Some(sha) = sha256 {
            builder = builder.header("x-amz-content-sha256", sha);
        }
        let (parts, ()) = builder.body(()).expect("valid request").into_parts();
        parts
    }

    #[test]
    fn test_should_detect_aws_chunked_content_encoding() {
        let parts = make_parts(Some("aws-chunked"), None);
        assert!(is_aws_chunked(&parts));
    }

    #[test]
    fn test_should_detect_streaming_sha256() {
        let parts = make_parts(None, Some("STREAMING-AWS4-HMAC-SHA256-PAYLOAD"));
        assert!(is_aws_chunked(&parts));
    }

    #[test]
    fn test_should_not_detect_plain_request() {
        let parts = make_parts(None, Some("UNSIGNED-PAYLOAD"));
        assert!(!is_aws_chunked(&parts));
    }

    #[test]
    fn test_should_not_detect_no_headers() {
        let parts = make_parts(None, None);
        assert!(!is_aws_chunked(&parts));
    }

    #[test]
    fn test_should_decode_single_chunk() {
        let body = b"5;chunk-signature=abc123\r\nhello\r\n0;chunk-signature=def456\r\n\r\n";
        let result = decode_aws_chunked(body).expect("should decode");
        assert_eq!(result.as_ref(), b"hello");
    }

    #[test]
    fn test_should_decode_multiple_chunks() {
        let body =
            b"5;chunk-signature=aaa\r\nhello\r\n6;chunk-signature=bbb\r\n world\r\n0;chunk-signature=ccc\r\n\r\n";
        let result = decode_aws_chunked(body).expect("should decode");
        assert_eq!(result.as_ref(), b"hello world");
    }

    #[test]
    fn test_should_decode_empty_body() {
        let body = b"0;chunk-signature=abc\r\n\r\n";
        let result = decode_aws_chunked(body).expect("should decode");
        assert!(result.is_empty());
    }

    #[test]
    fn test_should_reject_malformed_no_crlf() {
        let body = b"5;chunk-signature=abc";
        assert!(decode_aws_chunked(body).is_err());
    }

    #[test]
    fn test_should_reject_truncated_data() {
        let body = b"10;chunk-signature=abc\r\nshort\r\n";
        assert!(decode_aws_chunked(body).is_err());
    }

    #[test]
    fn test_should_strip_aws_chunked_encoding_only() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_ENCODING,
            "aws-chunked".parse().unwrap(),
        );
        strip_aws_chunked_encoding(&mut headers);
        assert!(headers.get(http::header::CONTENT_ENCODING).is_none());
    }

    #[test]
    fn test_should_strip_aws_chunked_keep_other() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_ENCODING,
            "gzip, aws-chunked".parse().unwrap(),
        );
        strip_aws_chunked_encoding(&mut headers);
        assert_eq!(
            headers
                .get(http::header::CONTENT_ENCODING)
                .unwrap()
                .to_str()
                .unwrap(),
            "gzip"
        );
    }

    #[test]
    fn test_should_decode_chunk_without_signature_extension() {
        let body = b"3\r\nabc\r\n0\r\n\r\n";
        let result = decode_aws_chunked(body).expect("should decode");
        assert_eq!(result.as_ref(), b"abc");
    }

    fn test_verifier() -> ChunkVerifier {
        use strongbox_auth::sigv4::derive_signing_key;
        let signing_key = derive_signing_key("secret", "20130524", "us-east-1", "s3");
        ChunkVerifier::new(signing_key, "20130524T000000Z", "20130524/us-east-1/s3/aws4_request", "seedsignature")
    }

    fn sign_chunk(verifier: &ChunkVerifier, data: &[u8]) -> String {
        use strongbox_auth::sigv4::{compute_signature, hash_payload};
        const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256-PAYLOAD\n20130524T000000Z\n20130524/us-east-1/s3/aws4_request\n{}\n{EMPTY_SHA256}\n{}",
            verifier.previous_signature(),
            hash_payload(data)
        );
        compute_signature(verifier.signing_key(), &string_to_sign)
    }

    #[test]
    fn test_should_decode_and_verify_signed_chunks() {
        let mut verifier = test_verifier();
        let sig1 = sign_chunk(&verifier, b"hello");
        let body1 = format!("5;chunk-signature={sig1}\r\nhello\r\n");

        // Build the terminal chunk's signature against the chain state after chunk 1.
        let mut chain_after_1 = test_verifier();
        chain_after_1.verify_chunk(b"hello", &sig1).unwrap();
        let sig_term = sign_chunk(&chain_after_1, b"");
        let body = format!("{body1}0;chunk-signature={sig_term}\r\n\r\n");

        let result = decode_aws_chunked_signed(body.as_bytes(), &mut verifier).expect("should verify and decode");
        assert_eq!(result.as_ref(), b"hello");
    }

    #[test]
    fn test_should_reject_signed_chunk_with_bad_signature() {
        let mut verifier = test_verifier();
        let body = b"5;chunk-signature=deadbeef\r\nhello\r\n0;chunk-signature=deadbeef\r\n\r\n";
        assert!(decode_aws_chunked_signed(body, &mut verifier).is_err());
    }

    #[test]
    fn test_should_reject_signed_chunk_missing_signature_extension() {
        let mut verifier = test_verifier();
        let body = b"5\r\nhello\r\n0\r\n\r\n";
        assert!(decode_aws_chunked_signed(body, &mut verifier).is_err());
    }
}
