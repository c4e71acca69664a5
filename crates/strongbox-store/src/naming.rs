//! Shared bucket-name validation.
//!
//! Both the admin surface and the S3 wire surface validate bucket names with
//! this one rule so neither can create a bucket the other refuses to address:
//! a lower-case DNS-label subset, 3-63 characters, no `/`, `\`, or `..`.

use thiserror::Error;

/// A bucket name failed validation.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid bucket name: {0}")]
pub struct InvalidBucketName(String);

/// Validate a bucket name against the DNS-label subset this store accepts.
///
/// # Errors
///
/// Returns [`InvalidBucketName`] if the name is outside 3-63 characters,
/// contains anything other than lower-case ASCII letters, digits, `-`, or
/// `.`, starts/ends with `-` or `.`, or contains a `..` segment.
pub fn validate_bucket_name(name: &str) -> Result<(), InvalidBucketName> {
    let reject = |reason: &str| Err(InvalidBucketName(format!("{name}: {reason}")));

    if name.len() < 3 || name.len() > 63 {
        return reject("must be 3-63 characters");
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return reject("must contain only lower-case letters, digits, '-', and '.'");
    }
    if name.starts_with(['-', '.']) || name.ends_with(['-', '.']) {
        return reject("must not start or end with '-' or '.'");
    }
    if name.contains("..") {
        return reject("must not contain '..'");
    }
    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return reject("must not be formatted as an IP address");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_accept_valid_names() {
        for name in ["my-bucket", "a.b.c", "bucket123", "abc"] {
            assert!(validate_bucket_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_should_reject_short_and_long_names() {
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_should_reject_uppercase_and_path_separators() {
        assert!(validate_bucket_name("MyBucket").is_err());
        assert!(validate_bucket_name("my/bucket").is_err());
        assert!(validate_bucket_name("my\\bucket").is_err());
    }

    #[test]
    fn test_should_reject_dot_dot_segment() {
        assert!(validate_bucket_name("my..bucket").is_err());
    }

    #[test]
    fn test_should_reject_leading_or_trailing_punctuation() {
        assert!(validate_bucket_name("-bucket").is_err());
        assert!(validate_bucket_name("bucket-").is_err());
        assert!(validate_bucket_name(".bucket").is_err());
    }

    #[test]
    fn test_should_reject_ip_address_form() {
        assert!(validate_bucket_name("192.168.1.1").is_err());
    }
}
