// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory IPP message model.
//
// Attributes are kept in wire order with their group tag, so a decoded
// response can be checked for group ordering and re-encoded byte for byte.
// A separator (an attribute with no name) marks the boundary between two
// consecutive groups that share a tag, e.g. the job groups of Get-Jobs.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::tags::{GroupTag, ValueTag, enum_string};

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Resolution value (RFC 8010 SS3.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub xres: i32,
    pub yres: i32,
    pub units: u8,
}

impl Resolution {
    /// Dots per inch.
    pub const PER_INCH: u8 = 3;
    /// Dots per centimetre.
    pub const PER_CM: u8 = 4;

    pub fn unit_suffix(&self) -> &'static str {
        if self.units == Self::PER_INCH {
            "dpi"
        } else {
            "dpcm"
        }
    }
}

/// One attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum IppValue {
    /// integer and enum.
    Integer(i32),
    Boolean(bool),
    Range { lower: i32, upper: i32 },
    Resolution(Resolution),
    /// RFC 2579 DateAndTime, undecoded.
    Date([u8; 11]),
    /// Any character-string syntax without a language.
    String(String),
    /// textWithLanguage / nameWithLanguage.
    LangString { text: String, language: String },
    /// octetString values, and values whose bytes are not valid for their
    /// declared syntax (bad UTF-8, out-of-range booleans).
    Octets(Vec<u8>),
    Collection(Vec<Attribute>),
    /// Out-of-band values carry no data.
    OutOfBand,
}

impl IppValue {
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Text of a string value, with or without language.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::LangString { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Attribute]> {
        match self {
            Self::Collection(members) => Some(members),
            _ => None,
        }
    }

    /// Render a single value the way the report and `DEFINE-VALUE` show it.
    pub fn render(&self, attr_name: &str, tag: ValueTag) -> String {
        match self {
            Self::Integer(v) if tag == ValueTag::ENUM => enum_string(attr_name, *v),
            Self::Integer(v) => v.to_string(),
            Self::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Self::Range { lower, upper } => format!("{lower}-{upper}"),
            Self::Resolution(r) if r.xres == r.yres => format!("{}{}", r.xres, r.unit_suffix()),
            Self::Resolution(r) => format!("{}x{}{}", r.xres, r.yres, r.unit_suffix()),
            Self::Date(bytes) => date_to_utc(bytes)
                .map(|d| d.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                .unwrap_or_else(|| printable_or_hex(bytes)),
            Self::String(s) => escape_text(s),
            Self::LangString { text, language } => format!("{}[{}]", escape_text(text), language),
            Self::Octets(bytes) => printable_or_hex(bytes),
            Self::Collection(members) => {
                let inner: Vec<String> = members
                    .iter()
                    .filter(|m| !m.is_separator())
                    .map(|m| format!("{}={}", m.name().unwrap_or_default(), m.value_string()))
                    .collect();
                format!("{{{}}}", inner.join(" "))
            }
            Self::OutOfBand => tag.name(),
        }
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '"' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render bytes as text when every byte is printable ASCII, otherwise as
/// `<HEX>` in upper case.
pub fn printable_or_hex(bytes: &[u8]) -> String {
    if bytes.iter().any(|b| *b < 0x20 || *b >= 0x7f) {
        format!("<{}>", hex::encode_upper(bytes))
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Convert an RFC 2579 DateAndTime to UTC. `None` when the fields do not
/// form a real date.
pub fn date_to_utc(bytes: &[u8; 11]) -> Option<DateTime<Utc>> {
    let year = i32::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    let local = NaiveDate::from_ymd_opt(year, u32::from(bytes[2]), u32::from(bytes[3]))?
        .and_hms_opt(u32::from(bytes[4]), u32::from(bytes[5]), u32::from(bytes[6]).min(59))?;
    let offset = i64::from(bytes[9]) * 3600 + i64::from(bytes[10]) * 60;
    let offset = match bytes[8] {
        b'-' => -offset,
        _ => offset,
    };
    let utc = local - chrono::Duration::seconds(offset);
    Some(Utc.from_utc_datetime(&utc))
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// A named attribute with one or more values.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// `None` marks a group separator.
    pub name: Option<String>,
    pub group: GroupTag,
    pub value_tag: ValueTag,
    pub values: Vec<IppValue>,
}

impl Attribute {
    pub fn new(
        group: GroupTag,
        value_tag: ValueTag,
        name: impl Into<String>,
        values: Vec<IppValue>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            group,
            value_tag,
            values,
        }
    }

    pub fn separator() -> Self {
        Self {
            name: None,
            group: GroupTag::ZERO,
            value_tag: ValueTag(0),
            values: Vec::new(),
        }
    }

    pub fn is_separator(&self) -> bool {
        self.name.is_none()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Syntax label such as `1setOf keyword`.
    pub fn type_label(&self) -> String {
        format!(
            "{}{}",
            if self.count() > 1 { "1setOf " } else { "" },
            self.value_tag
        )
    }

    /// Values rendered and joined with commas.
    pub fn value_string(&self) -> String {
        let name = self.name().unwrap_or_default();
        self.values
            .iter()
            .map(|v| v.render(name, self.value_tag))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether any integer value equals `value` or any range contains it.
    pub fn contains_integer(&self, value: i32) -> bool {
        self.values.iter().any(|v| match v {
            IppValue::Integer(i) => *i == value,
            IppValue::Range { lower, upper } => (*lower..=*upper).contains(&value),
            _ => false,
        })
    }

    /// Whether any string value equals `value`, ignoring case for text,
    /// name and MIME media type syntaxes.
    pub fn contains_string(&self, value: &str) -> bool {
        let fold = self.value_tag.is_case_insensitive();
        self.values.iter().filter_map(IppValue::as_str).any(|s| {
            if fold {
                s.eq_ignore_ascii_case(value)
            } else {
                s == value
            }
        })
    }

    /// Collection members named `name` across every collection value.
    fn members(&self, name: &str) -> Vec<&Attribute> {
        self.values
            .iter()
            .filter_map(IppValue::as_collection)
            .flat_map(|members| members.iter().filter(|m| m.name() == Some(name)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// An IPP request or response.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub version: (u8, u8),
    /// Operation code for requests, status code for responses.
    pub code: u16,
    pub request_id: i32,
    pub attributes: Vec<Attribute>,
}

impl Message {
    pub fn new(code: u16, request_id: i32) -> Self {
        Self {
            version: (1, 1),
            code,
            request_id,
            attributes: Vec::new(),
        }
    }

    pub fn push(&mut self, attr: Attribute) {
        self.attributes.push(attr);
    }

    /// Every attribute matching a `/`-separated path, in wire order, paired
    /// with the group of its top-level attribute. Path segments after the
    /// first descend into collection members.
    pub fn find_all<'a>(&'a self, path: &str) -> Vec<(GroupTag, &'a Attribute)> {
        let mut segments = path.split('/');
        let Some(first) = segments.next() else {
            return Vec::new();
        };

        let mut hits: Vec<(GroupTag, &Attribute)> = self
            .attributes
            .iter()
            .filter(|a| a.name() == Some(first))
            .map(|a| (a.group, a))
            .collect();

        for segment in segments {
            hits = hits
                .into_iter()
                .flat_map(|(group, a)| a.members(segment).into_iter().map(move |m| (group, m)))
                .collect();
        }
        hits
    }

    pub fn find(&self, path: &str) -> Option<&Attribute> {
        self.find_all(path).into_iter().next().map(|(_, a)| a)
    }

    /// The operation-group `status-message` text, when present.
    pub fn status_message(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.group == GroupTag::OPERATION && a.name() == Some("status-message"))
            .filter(|a| a.value_tag == ValueTag::TEXT)
            .and_then(|a| a.values.first())
            .and_then(IppValue::as_str)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing IPP messages attribute by attribute.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: Message,
    group: GroupTag,
}

impl MessageBuilder {
    /// Start a message with the given operation or status code.
    pub fn new(code: u16, request_id: i32) -> Self {
        Self {
            message: Message::new(code, request_id),
            group: GroupTag::OPERATION,
        }
    }

    pub fn version(&mut self, major: u8, minor: u8) -> &mut Self {
        self.message.version = (major, minor);
        self
    }

    /// Start a new attribute group. Starting the current group again
    /// inserts a separator.
    pub fn begin_group(&mut self, group: GroupTag) -> &mut Self {
        if group == self.group && !self.message.attributes.is_empty() {
            self.message.push(Attribute::separator());
        }
        self.group = group;
        self
    }

    pub fn charset(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(ValueTag::CHARSET, name, value)
    }

    pub fn natural_language(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(ValueTag::NATURAL_LANGUAGE, name, value)
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(ValueTag::TEXT, name, value)
    }

    pub fn name_attr(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(ValueTag::NAME, name, value)
    }

    pub fn keyword(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(ValueTag::KEYWORD, name, value)
    }

    /// A 1setOf keyword attribute.
    pub fn keywords(&mut self, name: &str, values: &[&str]) -> &mut Self {
        let values = values.iter().map(|v| IppValue::String((*v).into())).collect();
        self.attr(ValueTag::KEYWORD, name, values)
    }

    pub fn uri(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(ValueTag::URI, name, value)
    }

    pub fn integer(&mut self, name: &str, value: i32) -> &mut Self {
        self.attr(ValueTag::INTEGER, name, vec![IppValue::Integer(value)])
    }

    pub fn enum_attr(&mut self, name: &str, value: i32) -> &mut Self {
        self.attr(ValueTag::ENUM, name, vec![IppValue::Integer(value)])
    }

    pub fn boolean(&mut self, name: &str, value: bool) -> &mut Self {
        self.attr(ValueTag::BOOLEAN, name, vec![IppValue::Boolean(value)])
    }

    pub fn string(&mut self, tag: ValueTag, name: &str, value: &str) -> &mut Self {
        self.attr(tag, name, vec![IppValue::String(value.into())])
    }

    /// Append an attribute with arbitrary values to the current group.
    pub fn attr(&mut self, tag: ValueTag, name: &str, values: Vec<IppValue>) -> &mut Self {
        self.message
            .push(Attribute::new(self.group, tag, name, values));
        self
    }

    /// The standard leading charset and natural-language attributes.
    pub fn standard_operation_attrs(&mut self) -> &mut Self {
        self.charset("attributes-charset", "utf-8")
            .natural_language("attributes-natural-language", "en")
    }

    pub fn build(&self) -> Message {
        self.message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn printer_response() -> Message {
        let media_col = vec![
            Attribute::new(
                GroupTag::ZERO,
                ValueTag::KEYWORD,
                "media-source",
                vec![IppValue::String("tray-1".into())],
            ),
            Attribute::new(
                GroupTag::ZERO,
                ValueTag::INTEGER,
                "media-top-margin",
                vec![IppValue::Integer(423)],
            ),
        ];
        MessageBuilder::new(0, 1)
            .standard_operation_attrs()
            .begin_group(GroupTag::PRINTER)
            .enum_attr("printer-state", 3)
            .keywords("sides-supported", &["one-sided", "two-sided-long-edge"])
            .attr(
                ValueTag::BEGIN_COLLECTION,
                "media-col-default",
                vec![IppValue::Collection(media_col)],
            )
            .build()
    }

    #[test]
    fn value_string_joins_and_renders_enums() {
        let msg = printer_response();
        let state = msg.find("printer-state").expect("printer-state present");
        assert_eq!(state.value_string(), "idle");
        let sides = msg.find("sides-supported").expect("sides present");
        assert_eq!(sides.value_string(), "one-sided,two-sided-long-edge");
        assert_eq!(sides.type_label(), "1setOf keyword");
    }

    #[test]
    fn collection_renders_members_and_paths_descend() {
        let msg = printer_response();
        let col = msg.find("media-col-default").expect("collection");
        assert_eq!(col.value_string(), "{media-source=tray-1 media-top-margin=423}");

        let hits = msg.find_all("media-col-default/media-top-margin");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, GroupTag::PRINTER);
        assert!(hits[0].1.contains_integer(423));
        assert!(msg.find("media-col-default/nope").is_none());
    }

    #[test]
    fn paths_descend_through_nested_collections() {
        let int = |name: &str, v: i32| {
            Attribute::new(GroupTag::ZERO, ValueTag::INTEGER, name, vec![IppValue::Integer(v)])
        };
        let media_col = |x: i32| {
            let size = vec![int("x-dimension", x), int("y-dimension", 29700)];
            IppValue::Collection(vec![Attribute::new(
                GroupTag::ZERO,
                ValueTag::BEGIN_COLLECTION,
                "media-size",
                vec![IppValue::Collection(size)],
            )])
        };
        let msg = MessageBuilder::new(0, 1)
            .standard_operation_attrs()
            .begin_group(GroupTag::JOB)
            .attr(
                ValueTag::BEGIN_COLLECTION,
                "media-col",
                vec![media_col(21000), media_col(21590)],
            )
            .build();

        let path = String::from("media-col/media-size/x-dimension");
        let hits = msg.find_all(&path);
        drop(path);
        let widths: Vec<Option<i32>> =
            hits.iter().map(|(_, a)| a.values[0].as_integer()).collect();
        assert_eq!(widths, vec![Some(21000), Some(21590)]);
        assert!(hits.iter().all(|(group, _)| *group == GroupTag::JOB));
        assert!(msg.find_all("media-col/media-size/z-dimension").is_empty());
    }

    #[test]
    fn begin_group_twice_inserts_separator() {
        let msg = MessageBuilder::new(0, 1)
            .begin_group(GroupTag::JOB)
            .integer("job-id", 1)
            .begin_group(GroupTag::JOB)
            .integer("job-id", 2)
            .build();
        assert_eq!(msg.attributes.len(), 3);
        assert!(msg.attributes[1].is_separator());
        assert_eq!(msg.find_all("job-id").len(), 2);
    }

    #[test]
    fn text_escaping_and_languages() {
        let v = IppValue::LangString {
            text: r#"say "hi" [now]"#.into(),
            language: "en".into(),
        };
        assert_eq!(v.render("x", ValueTag::TEXT_WITH_LANGUAGE), r#"say \"hi\" \[now][en]"#);
    }

    #[test]
    fn resolution_and_range_rendering() {
        let same = IppValue::Resolution(Resolution { xres: 600, yres: 600, units: Resolution::PER_INCH });
        let diff = IppValue::Resolution(Resolution { xres: 300, yres: 600, units: Resolution::PER_CM });
        assert_eq!(same.render("r", ValueTag::RESOLUTION), "600dpi");
        assert_eq!(diff.render("r", ValueTag::RESOLUTION), "300x600dpcm");
        let range = IppValue::Range { lower: 1, upper: 9 };
        assert_eq!(range.render("r", ValueTag::RANGE), "1-9");
    }

    #[test]
    fn octets_render_as_hex_when_unprintable() {
        assert_eq!(printable_or_hex(b"abc"), "abc");
        assert_eq!(printable_or_hex(&[0x01, 0xab]), "<01AB>");
    }

    #[test]
    fn dates_convert_through_utc_offset() {
        // 2026-01-02 10:30:00 -05:00 is 15:30 UTC.
        let bytes = [0x07, 0xEA, 1, 2, 10, 30, 0, 0, b'-', 5, 0];
        let utc = date_to_utc(&bytes).expect("valid date");
        assert_eq!(utc.format("%Y-%m-%dT%H:%M:%SZ").to_string(), "2026-01-02T15:30:00Z");
        assert!(date_to_utc(&[0x07, 0xEA, 13, 2, 0, 0, 0, 0, b'+', 0, 0]).is_none());
    }

    #[test]
    fn contains_string_folds_case_for_names_only() {
        let name = Attribute::new(
            GroupTag::JOB,
            ValueTag::NAME,
            "job-name",
            vec![IppValue::String("Report".into())],
        );
        assert!(name.contains_string("report"));
        let kw = Attribute::new(
            GroupTag::JOB,
            ValueTag::KEYWORD,
            "sides",
            vec![IppValue::String("one-sided".into())],
        );
        assert!(!kw.contains_string("ONE-SIDED"));
    }

    #[test]
    fn status_message_requires_text_in_operation_group() {
        let msg = MessageBuilder::new(0x0406, 1)
            .standard_operation_attrs()
            .text("status-message", "no such job")
            .build();
        assert_eq!(msg.status_message(), Some("no such job"));
        assert_eq!(printer_response().status_message(), None);
    }
}
