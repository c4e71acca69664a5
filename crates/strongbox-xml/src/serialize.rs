//! S3 XML serialization: converting Rust types to S3-compatible XML.
//!
//! This module provides the [`S3Serialize`] trait and implementations for all S3 types
//! that need to be serialized to XML for response bodies. The serialization follows the
//! AWS S3 RestXml protocol conventions:
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 format (`2006-02-03T16:45:09.000Z`)
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`

use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesText, Event};

use crate::error::XmlError;
use strongbox_model::output::{
    CompleteMultipartUploadOutput, CopyObjectOutput, CreateMultipartUploadOutput,
    ListBucketsOutput, ListObjectsOutput, ListObjectsV2Output, ListPartsOutput,
};
use strongbox_model::types::{Bucket, CommonPrefix, Object, Part};

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing S3 types to XML.
///
/// Implementors write their content as child elements inside the current XML context.
/// The root element name and namespace are handled by the top-level [`to_xml`] function.
///
/// Uses `io::Result` because `quick_xml::Writer` closures require `io::Result<()>`.
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as S3-compatible XML with declaration and namespace.
///
/// Produces a complete XML document with:
/// - XML declaration (`<?xml version="1.0" encoding="UTF-8"?>`)
/// - Root element with the S3 namespace
/// - Serialized content from the value
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(quick_xml::events::BytesDecl::new(
        "1.0",
        Some("UTF-8"),
        None,
    )))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

// ---------------------------------------------------------------------------
// Helper functions for writing common XML patterns
// ---------------------------------------------------------------------------

/// Write a simple `<tag>text</tag>` element.
fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Write `<tag>text</tag>` only if the value is `Some`.
fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

/// Write `<tag>value</tag>` for an optional boolean.
fn write_optional_bool<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<bool>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, if v { "true" } else { "false" })?;
    }
    Ok(())
}

/// Write `<tag>value</tag>` for an optional i32.
fn write_optional_i32<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<i32>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, &v.to_string())?;
    }
    Ok(())
}

/// Write `<tag>value</tag>` for an optional i64.
fn write_optional_i64<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<i64>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, &v.to_string())?;
    }
    Ok(())
}

/// Write `<tag>iso8601</tag>` for an optional timestamp.
fn write_optional_timestamp<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&chrono::DateTime<chrono::Utc>>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, &format_timestamp(v))?;
    }
    Ok(())
}

/// Format a `DateTime<Utc>` as ISO 8601 with milliseconds and `Z` suffix.
fn format_timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ---------------------------------------------------------------------------
// S3Serialize implementations for output types
// ---------------------------------------------------------------------------

impl S3Serialize for Bucket {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Bucket").write_inner_content(|w| {
            write_text_element(w, "Name", &self.name)?;
            write_optional_timestamp(w, "CreationDate", self.creation_date.as_ref())?;
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for ListBucketsOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in &self.buckets {
                bucket.serialize_xml(w)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for Object {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Contents").write_inner_content(|w| {
            write_text_element(w, "Key", &self.key)?;
            write_optional_timestamp(w, "LastModified", self.last_modified.as_ref())?;
            write_optional_text(w, "ETag", self.e_tag.as_deref())?;
            write_optional_i64(w, "Size", self.size)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for CommonPrefix {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer
            .create_element("CommonPrefixes")
            .write_inner_content(|w| {
                write_optional_text(w, "Prefix", self.prefix.as_deref())?;
                Ok(())
            })?;
        Ok(())
    }
}

impl S3Serialize for ListObjectsOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Name", self.name.as_deref())?;
        write_optional_text(writer, "Prefix", self.prefix.as_deref())?;
        write_optional_text(writer, "Marker", self.marker.as_deref())?;
        write_optional_text(writer, "NextMarker", self.next_marker.as_deref())?;
        write_optional_i32(writer, "MaxKeys", self.max_keys)?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_optional_bool(writer, "IsTruncated", self.is_truncated)?;
        for object in &self.contents {
            object.serialize_xml(writer)?;
        }
        for prefix in &self.common_prefixes {
            prefix.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl S3Serialize for ListObjectsV2Output {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Name", self.name.as_deref())?;
        write_optional_text(writer, "Prefix", self.prefix.as_deref())?;
        write_optional_text(
            writer,
            "ContinuationToken",
            self.continuation_token.as_deref(),
        )?;
        write_optional_text(
            writer,
            "NextContinuationToken",
            self.next_continuation_token.as_deref(),
        )?;
        write_optional_text(writer, "StartAfter", self.start_after.as_deref())?;
        write_optional_i32(writer, "MaxKeys", self.max_keys)?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_optional_bool(writer, "IsTruncated", self.is_truncated)?;
        write_optional_i32(writer, "KeyCount", self.key_count)?;
        for object in &self.contents {
            object.serialize_xml(writer)?;
        }
        for prefix in &self.common_prefixes {
            prefix.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl S3Serialize for CreateMultipartUploadOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Bucket", self.bucket.as_deref())?;
        write_optional_text(writer, "Key", self.key.as_deref())?;
        write_optional_text(writer, "UploadId", self.upload_id.as_deref())?;
        Ok(())
    }
}

impl S3Serialize for CompleteMultipartUploadOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Location", self.location.as_deref())?;
        write_optional_text(writer, "Bucket", self.bucket.as_deref())?;
        write_optional_text(writer, "Key", self.key.as_deref())?;
        write_optional_text(writer, "ETag", self.e_tag.as_deref())?;
        Ok(())
    }
}

impl S3Serialize for Part {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Part").write_inner_content(|w| {
            write_optional_i32(w, "PartNumber", self.part_number)?;
            write_optional_timestamp(w, "LastModified", self.last_modified.as_ref())?;
            write_optional_text(w, "ETag", self.e_tag.as_deref())?;
            write_optional_i64(w, "Size", self.size)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for ListPartsOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Bucket", self.bucket.as_deref())?;
        write_optional_text(writer, "Key", self.key.as_deref())?;
        write_optional_text(writer, "UploadId", self.upload_id.as_deref())?;
        write_optional_i32(writer, "MaxParts", self.max_parts)?;
        write_optional_text(
            writer,
            "PartNumberMarker",
            self.part_number_marker.as_deref(),
        )?;
        write_optional_text(
            writer,
            "NextPartNumberMarker",
            self.next_part_number_marker.as_deref(),
        )?;
        write_optional_bool(writer, "IsTruncated", self.is_truncated)?;
        for part in &self.parts {
            part.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl S3Serialize for CopyObjectOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "ETag", self.e_tag.as_deref())?;
        write_optional_timestamp(writer, "LastModified", self.last_modified.as_ref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_should_serialize_empty_bucket_list() {
        let output = ListBucketsOutput { buckets: vec![] };
        let xml = to_xml("ListAllMyBucketsResult", &output).expect("serializes");
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");
        assert!(xml_str.contains("<ListAllMyBucketsResult xmlns="));
        assert!(xml_str.contains("<Buckets></Buckets>"));
    }

    #[test]
    fn test_should_serialize_bucket_list() {
        let output = ListBucketsOutput {
            buckets: vec![Bucket {
                name: "my-bucket".to_owned(),
                creation_date: Some(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            }],
        };
        let xml = to_xml("ListAllMyBucketsResult", &output).expect("serializes");
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");
        assert!(xml_str.contains("<Name>my-bucket</Name>"));
        assert!(xml_str.contains("<CreationDate>2024-01-01T00:00:00.000Z</CreationDate>"));
    }

    #[test]
    fn test_should_serialize_list_objects_with_common_prefixes() {
        let output = ListObjectsV2Output {
            name: Some("b".to_owned()),
            prefix: Some("a/".to_owned()),
            is_truncated: Some(false),
            key_count: Some(1),
            contents: vec![Object {
                key: "a/b.txt".to_owned(),
                last_modified: None,
                e_tag: Some("\"abc\"".to_owned()),
                size: Some(5),
            }],
            common_prefixes: vec![CommonPrefix {
                prefix: Some("a/sub/".to_owned()),
            }],
            ..Default::default()
        };
        let xml = to_xml("ListBucketResult", &output).expect("serializes");
        let xml_str = std::str::from_utf8(&xml).expect("valid UTF-8");
        assert!(xml_str.contains("<Key>a/b.txt</Key>"));
        assert!(xml_str.contains("<Prefix>a/sub/</Prefix>"));
        assert!(xml_str.contains("<KeyCount>1</KeyCount>"));
    }

    #[test]
    fn test_should_escape_key_special_characters() {
        let object = Object {
            key: "a&b<c>.txt".to_owned(),
            last_modified: None,
            e_tag: None,
            size: Some(0),
        };
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        object.serialize_xml(&mut writer).expect("serializes");
        let xml_str = std::str::from_utf8(&buf).expect("valid UTF-8");
        assert!(xml_str.contains("a&amp;b&lt;c&gt;.txt"));
    }
}
