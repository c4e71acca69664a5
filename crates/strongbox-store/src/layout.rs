//! Object key to on-disk path mapping.
//!
//! A key is free-form (may contain `/`, `.`, `..`, or any byte a client
//! sends), but the file it lands in must not be able to escape the bucket's
//! storage root. Instead of writing the key into the path verbatim, it is
//! percent-encoded into a single path segment (so no literal `/` or `..`
//! ever reaches a path component) and sharded two levels deep by the first
//! bytes of its SHA-256 hash, so one bucket with millions of keys never puts
//! millions of files in one directory.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Everything except unreserved alphanumerics, `-`, and `_` is encoded —
/// notably including `.`, so an encoded key can never literally read `..`
/// and be mistaken for a parent-directory reference.
const ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'\\')
    .add(b'.')
    .add(b'%')
    .add(b' ')
    .add(b':')
    .add(b'?')
    .add(b'#')
    .add(b'[')
    .add(b']')
    .add(b'@')
    .add(b'!')
    .add(b'$')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b';')
    .add(b'=');

/// The relative path (under `buckets/<bucket>/`) an object's key maps to.
#[must_use]
pub fn object_relative_path(key: &str) -> PathBuf {
    let digest = Sha256::digest(key.as_bytes());
    let hex = hex::encode(digest);
    let encoded = utf8_percent_encode(key, ENCODE_SET).to_string();
    PathBuf::from(&hex[0..2]).join(&hex[2..4]).join(encoded)
}

/// Recover the original key from a path produced by [`object_relative_path`].
///
/// Returns `None` if the final path component is not valid percent-encoded
/// UTF-8 (it was not produced by this module, or is corrupt).
#[must_use]
pub fn decode_key_from_path(path: &std::path::Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    percent_decode_str(file_name).decode_utf8().ok().map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_round_trip_arbitrary_key() {
        for key in ["simple", "a/b/c", "has spaces", "unicode-键", "a.b.c"] {
            let path = object_relative_path(key);
            assert_eq!(decode_key_from_path(&path).as_deref(), Some(key));
        }
    }

    #[test]
    fn test_should_never_encode_dot_dot_as_literal_path_component() {
        let path = object_relative_path("..");
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert_ne!(file_name, "..");
        assert_ne!(file_name, ".");
    }

    #[test]
    fn test_should_never_produce_a_raw_slash_in_final_component() {
        let path = object_relative_path("a/b/../../etc/passwd");
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(!file_name.contains('/'));
        assert!(!file_name.contains(".."));
    }

    #[test]
    fn test_should_shard_by_hash_prefix() {
        let path = object_relative_path("my-key");
        let mut components = path.components();
        let shard1 = components.next().unwrap().as_os_str().to_str().unwrap();
        let shard2 = components.next().unwrap().as_os_str().to_str().unwrap();
        assert_eq!(shard1.len(), 2);
        assert_eq!(shard2.len(), 2);
    }
}
