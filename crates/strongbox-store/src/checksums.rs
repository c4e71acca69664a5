//! MD5-based ETag computation.
//!
//! Every object's ETag is the lowercase hex MD5 of its bytes, computed
//! incrementally as the object streams to disk. A completed multipart
//! upload gets a composite ETag instead: the hex MD5 of the concatenated
//! *raw* MD5 digests of its parts, suffixed with `-<part count>`, matching
//! the form every S3-compatible client already expects.

use md5::{Digest, Md5};

/// Incremental MD5 hasher used while a `PutObject` or `UploadPart` body
/// streams to its temp file, so the ETag is ready the moment the write
/// finishes without a second read pass over the data.
#[derive(Debug, Default)]
pub struct StreamingMd5 {
    hasher: Md5,
}

impl StreamingMd5 {
    /// Create a fresh hasher.
    #[must_use]
    pub fn new() -> Self {
        Self { hasher: Md5::new() }
    }

    /// Feed the next chunk of the stream into the running digest.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Finish hashing and return the lowercase hex digest.
    #[must_use]
    pub fn finish_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finish hashing and return the raw digest bytes, needed to build a
    /// composite multipart ETag without re-parsing hex back to bytes.
    #[must_use]
    pub fn finish_bytes(self) -> [u8; 16] {
        self.hasher.finalize().into()
    }
}

/// Compute the hex MD5 of a byte slice in one shot.
#[must_use]
pub fn compute_md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Compose the multipart ETag from each part's raw MD5 digest bytes, in
/// part-number order.
///
/// This is the `"<hex-of-hex-of-concatenated-digests>-<part-count>"` form:
/// hash together the raw MD5 bytes of every part (not their hex strings),
/// then append the part count.
#[must_use]
pub fn compute_multipart_etag(part_digests: &[[u8; 16]]) -> String {
    let mut hasher = Md5::new();
    for digest in part_digests {
        hasher.update(digest);
    }
    format!("{}-{}", hex::encode(hasher.finalize()), part_digests.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_match_one_shot_and_streaming_digest() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let one_shot = compute_md5_hex(data);

        let mut streaming = StreamingMd5::new();
        streaming.update(&data[..10]);
        streaming.update(&data[10..]);
        assert_eq!(streaming.finish_hex(), one_shot);
    }

    #[test]
    fn test_should_compute_composite_etag_from_part_digests() {
        let part1 = Md5::digest(b"part one data").into();
        let part2 = Md5::digest(b"part two data").into();

        let etag = compute_multipart_etag(&[part1, part2]);
        assert!(etag.ends_with("-2"));

        let mut expect = Md5::new();
        expect.update(part1);
        expect.update(part2);
        let expected_hash = hex::encode(expect.finalize());
        assert_eq!(etag, format!("{expected_hash}-2"));
    }

    #[test]
    fn test_should_vary_composite_etag_with_part_order() {
        let part1: [u8; 16] = Md5::digest(b"alpha").into();
        let part2: [u8; 16] = Md5::digest(b"beta").into();

        assert_ne!(
            compute_multipart_etag(&[part1, part2]),
            compute_multipart_etag(&[part2, part1])
        );
    }
}
