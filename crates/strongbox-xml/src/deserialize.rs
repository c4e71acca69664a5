//! S3 XML deserialization: parsing S3-compatible XML into Rust types.
//!
//! This module provides the [`S3Deserialize`] trait and implementations for all S3 types
//! that need to be deserialized from XML request bodies. The deserialization follows the
//! AWS S3 RestXml protocol conventions.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::XmlError;
use strongbox_model::types::{CompletedMultipartUpload, CompletedPart};

/// Trait for deserializing S3 types from XML.
///
/// Implementors parse XML elements from the reader and populate the struct fields.
/// The root element has already been consumed by the caller; the implementation
/// reads child elements until the matching end tag.
pub trait S3Deserialize: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// The reader is positioned just after the opening tag of this element.
    /// The implementation should read all child content and return when
    /// the matching end tag is consumed.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or required fields are missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize S3-compatible XML into a typed value.
///
/// Finds the root element and delegates to the type's `S3Deserialize` implementation.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed or deserialization fails.
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    // Skip the XML declaration and find the root element.
    loop {
        match reader.read_event()? {
            Event::Start(_) => {
                return T::deserialize_xml(&mut reader);
            }
            Event::Eof => {
                return Err(XmlError::MissingElement("root element".to_string()));
            }
            // Skip declaration, comments, processing instructions, whitespace.
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions for reading common XML patterns
// ---------------------------------------------------------------------------

/// Read the text content of the current element and consume its end tag.
///
/// Expects the reader to be positioned right after a `Start` event. Reads
/// the text content and consumes through the matching `End` event.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => {
                return Ok(text);
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while reading text content".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while skipping element".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Parse an i32 from XML text.
fn parse_i32(s: &str) -> Result<i32, XmlError> {
    s.parse::<i32>()
        .map_err(|e| XmlError::ParseError(format!("invalid i32 '{s}': {e}")))
}

// ---------------------------------------------------------------------------
// S3Deserialize implementations for input types
// ---------------------------------------------------------------------------

impl S3Deserialize for CompletedPart {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut part = Self::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = e.name();
                    let tag = std::str::from_utf8(name.as_ref())
                        .map_err(|err| XmlError::ParseError(err.to_string()))?;
                    match tag {
                        "ETag" => part.e_tag = Some(read_text_content(reader)?),
                        "PartNumber" => {
                            part.part_number = Some(parse_i32(&read_text_content(reader)?)?);
                        }
                        _ => skip_element(reader)?,
                    }
                }
                Event::End(_) => return Ok(part),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF while reading Part".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }
}

impl S3Deserialize for CompletedMultipartUpload {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut upload = Self::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = e.name();
                    let tag = std::str::from_utf8(name.as_ref())
                        .map_err(|err| XmlError::ParseError(err.to_string()))?;
                    match tag {
                        "Part" => upload.parts.push(CompletedPart::deserialize_xml(reader)?),
                        _ => skip_element(reader)?,
                    }
                }
                Event::End(_) => return Ok(upload),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF while reading CompleteMultipartUpload".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_complete_multipart_upload_body() {
        let xml = br#"<CompleteMultipartUpload>
            <Part><PartNumber>1</PartNumber><ETag>"etag1"</ETag></Part>
            <Part><PartNumber>2</PartNumber><ETag>"etag2"</ETag></Part>
        </CompleteMultipartUpload>"#;
        let parsed: CompletedMultipartUpload = from_xml(xml).expect("parses");
        assert_eq!(parsed.parts.len(), 2);
        assert_eq!(parsed.parts[0].part_number, Some(1));
        assert_eq!(parsed.parts[0].e_tag.as_deref(), Some("\"etag1\""));
        assert_eq!(parsed.parts[1].part_number, Some(2));
    }

    #[test]
    fn test_should_parse_empty_parts_list() {
        let xml = b"<CompleteMultipartUpload></CompleteMultipartUpload>";
        let parsed: CompletedMultipartUpload = from_xml(xml).expect("parses");
        assert!(parsed.parts.is_empty());
    }

    #[test]
    fn test_should_reject_truncated_xml() {
        let xml = b"<CompleteMultipartUpload><Part><PartNumber>1</PartNumber>";
        let result: Result<CompletedMultipartUpload, _> = from_xml(xml);
        assert!(result.is_err());
    }
}
