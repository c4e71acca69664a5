//! S3 response body types supporting buffered, streamed, and empty modes.
//!
//! This module provides [`S3ResponseBody`], the HTTP response body type used throughout
//! the S3 HTTP service. It supports three modes:
//!
//! - **Buffered**: For small responses such as XML payloads, error bodies, and raw bytes.
//! - **Streamed**: For `GetObject`, a `tokio::fs::File` read in fixed-size chunks so a
//!   large object never lives in memory all at once.
//! - **Empty**: For responses with no body content (e.g., 204 No Content, HEAD responses).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// The chunk size used when streaming a file body.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// S3 response body supporting buffered, streamed, and empty modes.
///
/// Implements [`http_body::Body`] so it can be used directly with hyper responses.
#[derive(Default)]
pub enum S3ResponseBody {
    /// Buffered body for small responses: XML payloads, error bodies, raw bytes.
    Buffered(Full<Bytes>),
    /// Streamed body reading a file (or a bounded slice of one) in fixed-size
    /// chunks, for large object bodies.
    Streamed(ReaderStream<Box<dyn AsyncRead + Send + Unpin>>),
    /// Empty body for 204 responses, DELETE confirmations, HEAD responses, etc.
    #[default]
    Empty,
}

impl std::fmt::Debug for S3ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(full) => f.debug_tuple("Buffered").field(full).finish(),
            Self::Streamed(_) => f.write_str("Streamed(..)"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl S3ResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(s.into())))
    }

    /// Create a buffered body from an XML byte vector.
    #[must_use]
    pub fn from_xml(xml: Vec<u8>) -> Self {
        Self::Buffered(Full::new(Bytes::from(xml)))
    }

    /// Create a streamed body reading `file` in fixed-size chunks.
    ///
    /// Used for `GetObject` so the full object never has to sit in memory at once.
    #[must_use]
    pub fn from_file(file: tokio::fs::File) -> Self {
        Self::Streamed(ReaderStream::with_capacity(Box::new(file), STREAM_CHUNK_SIZE))
    }

    /// Create a streamed body from a byte-bounded slice of a file, for a ranged
    /// `GetObject` response (`Range: bytes=start-end`).
    #[must_use]
    pub fn from_file_range(file: tokio::fs::File, len: u64) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(tokio::io::AsyncReadExt::take(file, len));
        Self::Streamed(ReaderStream::with_capacity(reader, STREAM_CHUNK_SIZE))
    }
}

impl http_body::Body for S3ResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full).poll_frame(cx).map_err(|never| match never {}),
            Self::Streamed(stream) => {
                use futures::Stream;
                match Pin::new(stream).poll_next(cx) {
                    Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(http_body::Frame::data(chunk)))),
                    Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
                    Poll::Ready(None) => Poll::Ready(None),
                    Poll::Pending => Poll::Pending,
                }
            }
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streamed(_) => false,
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streamed(_) => http_body::SizeHint::default(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body::Body;
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn test_should_report_empty_body_as_end_of_stream() {
        let body = S3ResponseBody::empty();
        assert!(body.is_end_stream());
    }

    #[test]
    fn test_should_have_zero_size_for_empty_body() {
        let body = S3ResponseBody::empty();
        let hint = body.size_hint();
        assert_eq!(hint.exact(), Some(0));
    }

    #[test]
    fn test_should_create_buffered_body_from_bytes() {
        let body = S3ResponseBody::from_bytes(Bytes::from("hello"));
        assert!(!body.is_end_stream());
        let hint = body.size_hint();
        assert_eq!(hint.exact(), Some(5));
    }

    #[test]
    fn test_should_create_buffered_body_from_string() {
        let body = S3ResponseBody::from_string("hello world");
        assert!(!body.is_end_stream());
        let hint = body.size_hint();
        assert_eq!(hint.exact(), Some(11));
    }

    #[test]
    fn test_should_create_buffered_body_from_xml() {
        let xml = b"<Root><Key>value</Key></Root>".to_vec();
        let body = S3ResponseBody::from_xml(xml);
        assert!(!body.is_end_stream());
    }

    #[test]
    fn test_should_default_to_empty() {
        let body = S3ResponseBody::default();
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_should_stream_file_contents() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        std::io::Write::write_all(&mut tmp, b"streamed payload").expect("write temp file");
        let file = tokio::fs::File::open(tmp.path()).await.expect("reopen async");

        let body = S3ResponseBody::from_file(file);
        assert!(!body.is_end_stream());

        let collected = body.collect().await.expect("collect stream").to_bytes();
        assert_eq!(collected.as_ref(), b"streamed payload");
    }
}
