// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP binary encoding (RFC 8010 SS3).
//
// Wire layout:
//
//   version-number   2 bytes  (major, minor)
//   operation-id     2 bytes  (or status-code in responses)
//   request-id       4 bytes
//   attribute-group  N bytes  (delimiter tag + attributes)
//   end-of-attrs     1 byte   (0x03)
//   data             remainder (document data, if any)
//
// Each attribute is value-tag, name-length, name, value-length, value;
// additional values repeat with a zero name-length.  Collections
// (RFC 8010 SS3.1.6) nest memberAttrName/value pairs between
// begCollection and endCollection.

use ipptest_core::error::{IppTestError, Result};
use tracing::warn;

use crate::message::{Attribute, IppValue, Message, Resolution};
use crate::tags::{GroupTag, ValueTag};

/// Delimiter tags are in the range 0x00..=0x0F.
const MAX_DELIMITER_TAG: u8 = 0x0F;

/// Tag byte announcing a four-byte extended tag.
const EXTENSION_TAG: u8 = 0x7F;

/// A decoded message plus framing details the validator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub message: Message,
    /// Whether an end-of-attributes-tag was seen.
    pub terminated: bool,
    /// Bytes consumed by the IPP message, excluding trailing document data.
    pub length: usize,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a message. Separators force the next group delimiter to be
/// written even when it repeats the current group.
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(256);
    buf.push(message.version.0);
    buf.push(message.version.1);
    buf.extend_from_slice(&message.code.to_be_bytes());
    buf.extend_from_slice(&message.request_id.to_be_bytes());

    let mut current: Option<GroupTag> = None;
    for attr in &message.attributes {
        if attr.is_separator() {
            current = None;
            continue;
        }
        if current != Some(attr.group) {
            buf.push(attr.group.0);
            current = Some(attr.group);
        }
        write_attribute(&mut buf, attr)?;
    }

    buf.push(GroupTag::END.0);
    Ok(buf)
}

fn write_attribute(buf: &mut Vec<u8>, attr: &Attribute) -> Result<()> {
    let name = attr.name().unwrap_or_default();
    if attr.values.is_empty() {
        return Err(IppTestError::Codec(format!("attribute \"{name}\" has no values")));
    }
    for (i, value) in attr.values.iter().enumerate() {
        let name = if i == 0 { name } else { "" };
        write_value(buf, attr.value_tag, name, value)?;
    }
    Ok(())
}

fn write_value(buf: &mut Vec<u8>, tag: ValueTag, name: &str, value: &IppValue) -> Result<()> {
    if let IppValue::Collection(members) = value {
        write_raw(buf, ValueTag::BEGIN_COLLECTION.0, name, &[])?;
        for member in members.iter().filter(|m| !m.is_separator()) {
            let member_name = member.name().unwrap_or_default();
            write_raw(buf, ValueTag::MEMBER_NAME.0, "", member_name.as_bytes())?;
            for v in &member.values {
                write_value(buf, member.value_tag, "", v)?;
            }
        }
        return write_raw(buf, ValueTag::END_COLLECTION.0, "", &[]);
    }

    let bytes = value_bytes(value)?;
    write_raw(buf, tag.0, name, &bytes)
}

fn value_bytes(value: &IppValue) -> Result<Vec<u8>> {
    Ok(match value {
        IppValue::Integer(v) => v.to_be_bytes().to_vec(),
        IppValue::Boolean(b) => vec![u8::from(*b)],
        IppValue::Range { lower, upper } => {
            let mut out = lower.to_be_bytes().to_vec();
            out.extend_from_slice(&upper.to_be_bytes());
            out
        }
        IppValue::Resolution(r) => {
            let mut out = r.xres.to_be_bytes().to_vec();
            out.extend_from_slice(&r.yres.to_be_bytes());
            out.push(r.units);
            out
        }
        IppValue::Date(d) => d.to_vec(),
        IppValue::String(s) => s.as_bytes().to_vec(),
        IppValue::LangString { text, language } => {
            let mut out = Vec::with_capacity(4 + text.len() + language.len());
            out.extend_from_slice(&length_u16(language.len())?.to_be_bytes());
            out.extend_from_slice(language.as_bytes());
            out.extend_from_slice(&length_u16(text.len())?.to_be_bytes());
            out.extend_from_slice(text.as_bytes());
            out
        }
        IppValue::Octets(bytes) => bytes.clone(),
        IppValue::OutOfBand => Vec::new(),
        IppValue::Collection(_) => {
            return Err(IppTestError::Codec("collection encoded as a plain value".into()));
        }
    })
}

/// Write a raw attribute (value-tag, name, value bytes).
fn write_raw(buf: &mut Vec<u8>, value_tag: u8, name: &str, value: &[u8]) -> Result<()> {
    buf.push(value_tag);
    buf.extend_from_slice(&length_u16(name.len())?.to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&length_u16(value.len())?.to_be_bytes());
    buf.extend_from_slice(value);
    Ok(())
}

fn length_u16(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| IppTestError::Codec(format!("field of {len} bytes exceeds 65535")))
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Byte cursor over an IPP message.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(IppTestError::Codec(format!("truncated {what}")));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read one value-tag, name, value triple after the tag byte.
    fn name_and_value(&mut self) -> Result<(&'a [u8], &'a [u8])> {
        let name_len = self.u16("name-length field")? as usize;
        let name = self.take(name_len, "attribute name")?;
        let value_len = self.u16("value-length field")? as usize;
        let value = self.take(value_len, "attribute value")?;
        Ok((name, value))
    }

    fn value_tag(&mut self) -> Result<u8> {
        let tag = self.u8("value tag")?;
        if tag == EXTENSION_TAG {
            return Err(IppTestError::Codec("extended value tags are not supported".into()));
        }
        Ok(tag)
    }
}

/// Decode an IPP message.
///
/// A message that ends before its end-of-attributes-tag decodes with
/// `terminated == false`; a message cut inside an attribute is an error.
pub fn decode(data: &[u8]) -> Result<Decoded> {
    if data.len() < 8 {
        return Err(IppTestError::Codec(format!(
            "message too short: {} bytes (minimum 8)",
            data.len()
        )));
    }

    let mut message = Message::new(
        u16::from_be_bytes([data[2], data[3]]),
        i32::from_be_bytes([data[4], data[5], data[6], data[7]]),
    );
    message.version = (data[0], data[1]);

    let mut r = Reader { data, pos: 8 };
    let mut group: Option<GroupTag> = None;
    let mut terminated = false;

    while let Some(tag) = r.peek() {
        if tag <= MAX_DELIMITER_TAG {
            r.pos += 1;
            if tag == GroupTag::END.0 {
                terminated = true;
                break;
            }
            // Two consecutive groups with the same tag are separate groups.
            if group == Some(GroupTag(tag)) {
                message.push(Attribute::separator());
            }
            group = Some(GroupTag(tag));
            continue;
        }

        let value_tag = r.value_tag()?;
        let (name, raw) = r.name_and_value()?;
        let value = if value_tag == ValueTag::BEGIN_COLLECTION.0 {
            IppValue::Collection(read_collection(&mut r)?)
        } else {
            decode_value(ValueTag(value_tag), raw)?
        };

        let Some(current) = group else {
            // Attribute outside a group -- discard (malformed).
            warn!("IPP attribute outside of any group -- discarded");
            continue;
        };

        if name.is_empty() {
            match message.attributes.last_mut().filter(|a| !a.is_separator()) {
                Some(prev) => prev.values.push(value),
                None => {
                    return Err(IppTestError::Codec(
                        "additional value without a preceding attribute".into(),
                    ));
                }
            }
        } else {
            message.push(Attribute::new(
                current,
                ValueTag(value_tag),
                String::from_utf8_lossy(name).into_owned(),
                vec![value],
            ));
        }
    }

    Ok(Decoded {
        message,
        terminated,
        length: r.pos.min(data.len()),
    })
}

/// Read collection members up to and including the endCollection tag.
fn read_collection(r: &mut Reader<'_>) -> Result<Vec<Attribute>> {
    let mut members: Vec<Attribute> = Vec::new();
    let mut pending_name: Option<String> = None;

    loop {
        if r.at_end() {
            return Err(IppTestError::Codec("truncated collection".into()));
        }
        let tag = r.value_tag()?;
        let (_, raw) = r.name_and_value()?;

        match tag {
            t if t == ValueTag::END_COLLECTION.0 => return Ok(members),
            t if t == ValueTag::MEMBER_NAME.0 => {
                pending_name = Some(String::from_utf8_lossy(raw).into_owned());
            }
            t => {
                let value = if t == ValueTag::BEGIN_COLLECTION.0 {
                    IppValue::Collection(read_collection(r)?)
                } else {
                    decode_value(ValueTag(t), raw)?
                };
                match pending_name.take() {
                    Some(name) => members.push(Attribute::new(
                        GroupTag::ZERO,
                        ValueTag(t),
                        name,
                        vec![value],
                    )),
                    None => match members.last_mut() {
                        Some(prev) => prev.values.push(value),
                        None => {
                            return Err(IppTestError::Codec(
                                "collection value without a member name".into(),
                            ));
                        }
                    },
                }
            }
        }
    }
}

fn fixed<const N: usize>(raw: &[u8], what: &str) -> Result<[u8; N]> {
    raw.try_into()
        .map_err(|_| IppTestError::Codec(format!("{what} value not {N} bytes")))
}

fn decode_value(tag: ValueTag, raw: &[u8]) -> Result<IppValue> {
    if tag.is_out_of_band() {
        return Ok(IppValue::OutOfBand);
    }
    Ok(match tag {
        ValueTag::INTEGER | ValueTag::ENUM => {
            IppValue::Integer(i32::from_be_bytes(fixed::<4>(raw, "integer")?))
        }
        ValueTag::BOOLEAN => match fixed::<1>(raw, "boolean")?[0] {
            0 => IppValue::Boolean(false),
            1 => IppValue::Boolean(true),
            _ => IppValue::Octets(raw.to_vec()),
        },
        ValueTag::RANGE => {
            let b = fixed::<8>(raw, "rangeOfInteger")?;
            IppValue::Range {
                lower: i32::from_be_bytes([b[0], b[1], b[2], b[3]]),
                upper: i32::from_be_bytes([b[4], b[5], b[6], b[7]]),
            }
        }
        ValueTag::RESOLUTION => {
            let b = fixed::<9>(raw, "resolution")?;
            IppValue::Resolution(Resolution {
                xres: i32::from_be_bytes([b[0], b[1], b[2], b[3]]),
                yres: i32::from_be_bytes([b[4], b[5], b[6], b[7]]),
                units: b[8],
            })
        }
        ValueTag::DATE_TIME => IppValue::Date(fixed::<11>(raw, "dateTime")?),
        ValueTag::TEXT_WITH_LANGUAGE | ValueTag::NAME_WITH_LANGUAGE => decode_lang_string(raw)?,
        t if t.is_string() => match std::str::from_utf8(raw) {
            Ok(s) => IppValue::String(s.to_string()),
            Err(_) => IppValue::Octets(raw.to_vec()),
        },
        _ => IppValue::Octets(raw.to_vec()),
    })
}

fn decode_lang_string(raw: &[u8]) -> Result<IppValue> {
    let mut r = Reader { data: raw, pos: 0 };
    let lang_len = r.u16("language length")? as usize;
    let language = r.take(lang_len, "language")?;
    let text_len = r.u16("text length")? as usize;
    let text = r.take(text_len, "text")?;
    if !r.at_end() {
        return Err(IppTestError::Codec("trailing bytes after text value".into()));
    }
    match (std::str::from_utf8(text), std::str::from_utf8(language)) {
        (Ok(text), Ok(language)) => Ok(IppValue::LangString {
            text: text.to_string(),
            language: language.to_string(),
        }),
        _ => Ok(IppValue::Octets(text.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBuilder;
    use pretty_assertions::assert_eq;

    /// Write a single attribute in raw wire form.
    fn write_test_attr(buf: &mut Vec<u8>, tag: u8, name: &str, value: &[u8]) {
        write_raw(buf, tag, name, value).expect("short field");
    }

    fn header(buf: &mut Vec<u8>, status: u16, request_id: i32) {
        buf.extend_from_slice(&[1, 1]);
        buf.extend_from_slice(&status.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
    }

    #[test]
    fn decode_minimal_response() {
        let mut buf = Vec::new();
        header(&mut buf, 0x0000, 7);
        buf.push(GroupTag::OPERATION.0);
        write_test_attr(&mut buf, 0x47, "attributes-charset", b"utf-8");
        write_test_attr(&mut buf, 0x48, "attributes-natural-language", b"en");
        buf.push(GroupTag::END.0);

        let decoded = decode(&buf).expect("should decode");
        assert!(decoded.terminated);
        assert_eq!(decoded.length, buf.len());
        assert_eq!(decoded.message.request_id, 7);
        assert_eq!(decoded.message.attributes.len(), 2);
        assert_eq!(
            decoded.message.attributes[0].values,
            vec![IppValue::String("utf-8".into())]
        );
    }

    #[test]
    fn additional_values_join_previous_attribute() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1);
        buf.push(GroupTag::PRINTER.0);
        write_test_attr(&mut buf, 0x44, "sides-supported", b"one-sided");
        write_test_attr(&mut buf, 0x44, "", b"two-sided-long-edge");
        buf.push(GroupTag::END.0);

        let msg = decode(&buf).expect("decode").message;
        assert_eq!(msg.attributes.len(), 1);
        assert_eq!(msg.attributes[0].count(), 2);
    }

    #[test]
    fn repeated_group_tag_decodes_as_separator() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1);
        buf.push(GroupTag::JOB.0);
        write_test_attr(&mut buf, 0x21, "job-id", &1i32.to_be_bytes());
        buf.push(GroupTag::JOB.0);
        write_test_attr(&mut buf, 0x21, "job-id", &2i32.to_be_bytes());
        buf.push(GroupTag::END.0);

        let msg = decode(&buf).expect("decode").message;
        assert_eq!(msg.attributes.len(), 3);
        assert!(msg.attributes[1].is_separator());
    }

    #[test]
    fn missing_end_tag_is_reported_not_fatal() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1);
        buf.push(GroupTag::OPERATION.0);
        write_test_attr(&mut buf, 0x47, "attributes-charset", b"utf-8");

        let decoded = decode(&buf).expect("decode");
        assert!(!decoded.terminated);
    }

    #[test]
    fn truncated_attribute_is_an_error() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1);
        buf.push(GroupTag::OPERATION.0);
        buf.push(0x47);
        buf.push(0x00);
        let err = decode(&buf).expect_err("truncated");
        assert!(err.to_string().contains("truncated name-length field"));
        assert!(decode(&[1, 1, 0]).is_err());
    }

    #[test]
    fn bad_utf8_and_bad_boolean_survive_as_octets() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1);
        buf.push(GroupTag::PRINTER.0);
        write_test_attr(&mut buf, 0x41, "printer-info", &[0xff, 0xfe]);
        write_test_attr(&mut buf, 0x22, "color-supported", &[0x02]);
        buf.push(GroupTag::END.0);

        let msg = decode(&buf).expect("decode").message;
        assert_eq!(msg.attributes[0].values, vec![IppValue::Octets(vec![0xff, 0xfe])]);
        assert_eq!(msg.attributes[1].values, vec![IppValue::Octets(vec![0x02])]);
    }

    #[test]
    fn wrong_integer_length_is_an_error() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1);
        buf.push(GroupTag::PRINTER.0);
        write_test_attr(&mut buf, 0x21, "copies", &[0, 1]);
        buf.push(GroupTag::END.0);
        assert!(decode(&buf).is_err());
    }

    #[test]
    fn builder_output_survives_encode_and_decode() {
        let members = vec![
            Attribute::new(
                GroupTag::ZERO,
                ValueTag::KEYWORD,
                "media-type",
                vec![IppValue::String("stationery".into())],
            ),
            Attribute::new(
                GroupTag::ZERO,
                ValueTag::BEGIN_COLLECTION,
                "media-size",
                vec![IppValue::Collection(vec![Attribute::new(
                    GroupTag::ZERO,
                    ValueTag::INTEGER,
                    "x-dimension",
                    vec![IppValue::Integer(21000)],
                )])],
            ),
        ];
        let msg = MessageBuilder::new(0x0002, 42)
            .standard_operation_attrs()
            .attr(
                ValueTag::TEXT_WITH_LANGUAGE,
                "job-name",
                vec![IppValue::LangString {
                    text: "Rapport".into(),
                    language: "fr".into(),
                }],
            )
            .begin_group(GroupTag::JOB)
            .attr(ValueTag::BEGIN_COLLECTION, "media-col", vec![IppValue::Collection(members)])
            .attr(ValueTag::RANGE, "page-ranges", vec![IppValue::Range { lower: 1, upper: 5 }])
            .attr(ValueTag::NO_VALUE, "job-hold-until", vec![IppValue::OutOfBand])
            .build();

        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert!(decoded.terminated);
        assert_eq!(decoded.message, msg);
    }

    #[test]
    fn separators_force_repeated_delimiters() {
        let msg = MessageBuilder::new(0, 1)
            .begin_group(GroupTag::JOB)
            .integer("job-id", 10)
            .begin_group(GroupTag::JOB)
            .integer("job-id", 11)
            .build();
        let bytes = encode(&msg).expect("encode");
        let delimiters = bytes[8..].iter().filter(|b| **b == GroupTag::JOB.0).count();
        assert_eq!(delimiters, 2);
    }

    #[test]
    fn trailing_document_data_is_not_counted() {
        let msg = MessageBuilder::new(0x0002, 1).standard_operation_attrs().build();
        let mut bytes = encode(&msg).expect("encode");
        let ipp_len = bytes.len();
        bytes.extend_from_slice(b"%PDF-1.7");
        assert_eq!(decode(&bytes).expect("decode").length, ipp_len);
    }
}
