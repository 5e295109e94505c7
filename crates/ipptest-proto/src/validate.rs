// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attribute syntax checks against RFC 2911 SS4.1.
//
// Every problem found is reported; validation never stops at the first
// error so one run shows everything wrong with a response.

use std::sync::LazyLock;

use regex::Regex;

use crate::message::{Attribute, IppValue, Resolution};
use crate::tags::ValueTag;
use crate::uri::UriParts;

/// RFC 5646 language tag, checked without case.
static LANGUAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "(?i)^(",
        "(([a-z]{2,3}(-[a-z][a-z][a-z]){0,3})|[a-z]{4,8})",
        "(-[a-z][a-z][a-z][a-z]){0,1}",
        "(-([a-z][a-z]|[0-9][0-9][0-9])){0,1}",
        "(-([a-z]{5,8}|[0-9][0-9][0-9]))*",
        "(-[a-wy-z](-[a-z0-9]{2,8})+)*",
        "(-x(-[a-z0-9]{1,8})+)*",
        "|x(-[a-z0-9]{1,8})+",
        "|[a-z]{1,3}(-[a-z][0-9]{2,8}){1,2}",
        ")$"
    ))
    .expect("language tag pattern is valid")
});

/// RFC 2045 media type with optional parameters.
static MIME_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^[-a-zA-Z0-9!#$&.+^_]{1,127}/[-a-zA-Z0-9!#$&.+^_]{1,127}"#,
        r#"(;[-a-zA-Z0-9!#$&.+^_]{1,127}=([-a-zA-Z0-9!#$&.+^_]{1,127}|"[^"]*"))*$"#
    ))
    .expect("media type pattern is valid")
});

/// Maximum octets in text and name values (RFC 2911 SS4.1.1, SS4.1.2).
const MAX_TEXT: usize = 1023;
/// Maximum octets in keywords and attribute names.
const MAX_KEYWORD: usize = 255;
const MAX_URI: usize = 1023;
const MAX_URI_SCHEME: usize = 63;
const MAX_CHARSET: usize = 40;
const MAX_LANGUAGE: usize = 63;
const MAX_MIME_TYPE: usize = 255;
const MAX_OCTETS: usize = 1023;

fn is_keyword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')
}

/// Check an attribute's name and every value against its syntax. Returns
/// one message per problem; an empty list means the attribute is valid.
pub fn validate_attribute(attr: &Attribute) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(name) = attr.name() else {
        return errors;
    };

    if name.is_empty() || !name.chars().all(is_keyword_char) {
        errors.push(format!(
            "\"{name}\": Bad attribute name - invalid character (RFC 2911 section 4.1.3)."
        ));
    }
    if name.len() > MAX_KEYWORD {
        errors.push(format!(
            "\"{name}\": Bad attribute name - bad length {} (RFC 2911 section 4.1.3).",
            name.len()
        ));
    }

    for value in &attr.values {
        check_value(name, attr.value_tag, value, &mut errors);
    }
    errors
}

fn check_value(name: &str, tag: ValueTag, value: &IppValue, errors: &mut Vec<String>) {
    match (tag, value) {
        (ValueTag::BOOLEAN, IppValue::Octets(raw)) => {
            let byte = raw.first().copied().unwrap_or_default();
            errors.push(format!(
                "\"{name}\": Bad boolean value {byte} (RFC 2911 section 4.1.10)."
            ));
        }
        (ValueTag::ENUM, IppValue::Integer(v)) if *v < 1 => {
            errors.push(format!(
                "\"{name}\": Bad enum value {v} - out of range (RFC 2911 section 4.1.4)."
            ));
        }
        (ValueTag::OCTET_STRING, IppValue::Octets(raw)) if raw.len() > MAX_OCTETS => {
            errors.push(format!(
                "\"{name}\": Bad octetString value - bad length {} (RFC 2911 section 4.1.10).",
                raw.len()
            ));
        }
        (ValueTag::DATE_TIME, IppValue::Date(d)) => check_date(name, d, errors),
        (ValueTag::RESOLUTION, IppValue::Resolution(r)) => check_resolution(name, r, errors),
        (ValueTag::RANGE, IppValue::Range { lower, upper }) if lower > upper => {
            errors.push(format!(
                "\"{name}\": Bad rangeOfInteger value {lower}-{upper} - lower greater than upper (RFC 2911 section 4.1.13)."
            ));
        }
        (ValueTag::BEGIN_COLLECTION, IppValue::Collection(members)) => {
            let member_errors: Vec<String> =
                members.iter().flat_map(validate_attribute).collect();
            if !member_errors.is_empty() {
                errors.push(format!("\"{name}\": Bad collection value."));
                errors.extend(member_errors);
            }
        }
        (ValueTag::TEXT | ValueTag::TEXT_WITH_LANGUAGE, v) => {
            check_text(name, "text", "4.1.1", v, errors);
        }
        (ValueTag::NAME | ValueTag::NAME_WITH_LANGUAGE, v) => {
            check_text(name, "name", "4.1.2", v, errors);
        }
        (ValueTag::KEYWORD, v) => {
            let s = string_of(v);
            if s.is_empty() || !s.chars().all(is_keyword_char) {
                errors.push(format!(
                    "\"{name}\": Bad keyword value \"{s}\" - invalid character (RFC 2911 section 4.1.3)."
                ));
            }
            check_length(name, "keyword", &s, MAX_KEYWORD, "4.1.3", errors);
        }
        (ValueTag::URI, v) => {
            let s = string_of(v);
            if let Err(err) = UriParts::parse(&s) {
                errors.push(format!(
                    "\"{name}\": Bad URI value \"{s}\" - {err} (RFC 2911 section 4.1.5)."
                ));
            }
            check_length(name, "URI", &s, MAX_URI, "4.1.5", errors);
        }
        (ValueTag::URI_SCHEME, v) => {
            let s = string_of(v);
            let valid = s.starts_with(|c: char| c.is_ascii_lowercase())
                && s.chars().all(|c| {
                    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.')
                });
            if !valid {
                bad_characters(name, "uriScheme", &s, "4.1.6", errors);
            }
            check_length(name, "uriScheme", &s, MAX_URI_SCHEME, "4.1.6", errors);
        }
        (ValueTag::CHARSET, v) => {
            let s = string_of(v);
            let valid = !s.is_empty()
                && s.chars().all(|c| c.is_ascii_graphic() && !c.is_ascii_uppercase());
            if !valid {
                bad_characters(name, "charset", &s, "4.1.7", errors);
            }
            check_length(name, "charset", &s, MAX_CHARSET, "4.1.7", errors);
        }
        (ValueTag::NATURAL_LANGUAGE, v) => {
            let s = string_of(v);
            if !LANGUAGE_RE.is_match(&s) {
                bad_characters(name, "naturalLanguage", &s, "4.1.8", errors);
            }
            check_length(name, "naturalLanguage", &s, MAX_LANGUAGE, "4.1.8", errors);
        }
        (ValueTag::MIME_TYPE, v) => {
            let s = string_of(v);
            if !MIME_TYPE_RE.is_match(&s) {
                bad_characters(name, "mimeMediaType", &s, "4.1.9", errors);
            }
            check_length(name, "mimeMediaType", &s, MAX_MIME_TYPE, "4.1.9", errors);
        }
        _ => {}
    }
}

fn string_of(value: &IppValue) -> String {
    match value {
        IppValue::Octets(raw) => String::from_utf8_lossy(raw).into_owned(),
        v => v.as_str().unwrap_or_default().to_string(),
    }
}

fn check_text(name: &str, kind: &str, section: &str, value: &IppValue, errors: &mut Vec<String>) {
    let s = string_of(value);
    if matches!(value, IppValue::Octets(_)) {
        errors.push(format!(
            "\"{name}\": Bad {kind} value \"{s}\" - bad UTF-8 sequence (RFC 2911 section {section})."
        ));
    }
    check_length(name, kind, &s, MAX_TEXT, section, errors);
}

fn check_length(
    name: &str,
    kind: &str,
    s: &str,
    max: usize,
    section: &str,
    errors: &mut Vec<String>,
) {
    if s.len() > max {
        errors.push(format!(
            "\"{name}\": Bad {kind} value \"{s}\" - bad length {} (RFC 2911 section {section}).",
            s.len()
        ));
    }
}

fn bad_characters(name: &str, kind: &str, s: &str, section: &str, errors: &mut Vec<String>) {
    errors.push(format!(
        "\"{name}\": Bad {kind} value \"{s}\" - bad characters (RFC 2911 section {section})."
    ));
}

fn check_date(name: &str, d: &[u8; 11], errors: &mut Vec<String>) {
    let mut bad = |what: &str, shown: String| {
        errors.push(format!(
            "\"{name}\": Bad dateTime {what} {shown} (RFC 2911 section 4.1.13)."
        ));
    };
    if !(1..=12).contains(&d[2]) {
        bad("month", d[2].to_string());
    }
    if !(1..=31).contains(&d[3]) {
        bad("day", d[3].to_string());
    }
    if d[4] > 23 {
        bad("hours", d[4].to_string());
    }
    if d[5] > 59 {
        bad("minutes", d[5].to_string());
    }
    if d[6] > 60 {
        bad("seconds", d[6].to_string());
    }
    if d[7] > 9 {
        bad("deciseconds", d[7].to_string());
    }
    if d[8] != b'-' && d[8] != b'+' {
        bad("UTC sign", format!("'{}'", char::from(d[8])));
    }
    if d[9] > 11 {
        bad("UTC hours", d[9].to_string());
    }
    if d[10] > 59 {
        bad("UTC minutes", d[10].to_string());
    }
}

fn check_resolution(name: &str, r: &Resolution, errors: &mut Vec<String>) {
    let units = match r.units {
        Resolution::PER_INCH => "dpi",
        Resolution::PER_CM => "dpc",
        _ => "unknown",
    };
    let mut bad = |why: &str| {
        errors.push(format!(
            "\"{name}\": Bad resolution value {}x{}{units} - {why} (RFC 2911 section 4.1.13).",
            r.xres, r.yres
        ));
    };
    if r.xres <= 0 {
        bad("cross feed resolution must be positive");
    }
    if r.yres <= 0 {
        bad("feed resolution must be positive");
    }
    if r.units != Resolution::PER_INCH && r.units != Resolution::PER_CM {
        bad("bad units value");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::GroupTag;
    use pretty_assertions::assert_eq;

    fn attr(tag: ValueTag, name: &str, value: IppValue) -> Attribute {
        Attribute::new(GroupTag::PRINTER, tag, name, vec![value])
    }

    fn string_attr(tag: ValueTag, name: &str, value: &str) -> Attribute {
        attr(tag, name, IppValue::String(value.into()))
    }

    #[test]
    fn valid_attributes_produce_no_errors() {
        for a in [
            string_attr(ValueTag::KEYWORD, "sides", "two-sided-long-edge"),
            string_attr(ValueTag::CHARSET, "attributes-charset", "utf-8"),
            string_attr(ValueTag::NATURAL_LANGUAGE, "attributes-natural-language", "en-us"),
            string_attr(ValueTag::MIME_TYPE, "document-format", "text/plain;charset=utf-8"),
            string_attr(ValueTag::URI, "printer-uri-supported", "ipp://p.local/ipp/print"),
            string_attr(ValueTag::URI_SCHEME, "uri-scheme", "ipps"),
            attr(ValueTag::ENUM, "printer-state", IppValue::Integer(3)),
            attr(ValueTag::RANGE, "copies-supported", IppValue::Range { lower: 1, upper: 99 }),
        ] {
            assert_eq!(validate_attribute(&a), Vec::<String>::new(), "{:?}", a.name);
        }
    }

    #[test]
    fn bad_attribute_name() {
        let a = string_attr(ValueTag::KEYWORD, "bad name", "ok");
        assert_eq!(
            validate_attribute(&a),
            vec!["\"bad name\": Bad attribute name - invalid character (RFC 2911 section 4.1.3).".to_string()]
        );
    }

    #[test]
    fn keyword_and_charset_characters() {
        let a = string_attr(ValueTag::KEYWORD, "sides", "One Sided");
        assert_eq!(
            validate_attribute(&a),
            vec!["\"sides\": Bad keyword value \"One Sided\" - invalid character (RFC 2911 section 4.1.3).".to_string()]
        );
        let a = string_attr(ValueTag::CHARSET, "attributes-charset", "UTF-8");
        assert_eq!(validate_attribute(&a).len(), 1);
    }

    #[test]
    fn text_length_and_utf8() {
        let long = "x".repeat(1024);
        let a = string_attr(ValueTag::TEXT, "printer-info", &long);
        let errs = validate_attribute(&a);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].ends_with("- bad length 1024 (RFC 2911 section 4.1.1)."));

        let a = attr(ValueTag::NAME, "printer-name", IppValue::Octets(vec![0xC3, 0x28]));
        let errs = validate_attribute(&a);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("bad UTF-8 sequence (RFC 2911 section 4.1.2)"));
    }

    #[test]
    fn enum_boolean_and_range_limits() {
        let a = attr(ValueTag::ENUM, "printer-state", IppValue::Integer(0));
        assert_eq!(
            validate_attribute(&a),
            vec!["\"printer-state\": Bad enum value 0 - out of range (RFC 2911 section 4.1.4).".to_string()]
        );
        let a = attr(ValueTag::BOOLEAN, "color-supported", IppValue::Octets(vec![2]));
        assert_eq!(
            validate_attribute(&a),
            vec!["\"color-supported\": Bad boolean value 2 (RFC 2911 section 4.1.10).".to_string()]
        );
        let a = attr(ValueTag::RANGE, "r", IppValue::Range { lower: 5, upper: 1 });
        assert_eq!(validate_attribute(&a).len(), 1);
    }

    #[test]
    fn date_fields_are_each_checked() {
        let d = [0x07, 0xEA, 13, 0, 24, 60, 61, 10, b'x', 12, 60];
        let errs = validate_attribute(&attr(ValueTag::DATE_TIME, "printer-current-time", IppValue::Date(d)));
        assert_eq!(errs.len(), 9);
        assert_eq!(
            errs[0],
            "\"printer-current-time\": Bad dateTime month 13 (RFC 2911 section 4.1.13)."
        );
        assert_eq!(
            errs[6],
            "\"printer-current-time\": Bad dateTime UTC sign 'x' (RFC 2911 section 4.1.13)."
        );
    }

    #[test]
    fn resolution_checks() {
        let r = Resolution { xres: 0, yres: 300, units: 9 };
        let errs = validate_attribute(&attr(ValueTag::RESOLUTION, "printer-resolution-default", IppValue::Resolution(r)));
        assert_eq!(errs.len(), 2);
        assert!(errs[0].contains("0x300unknown - cross feed resolution must be positive"));
        assert!(errs[1].contains("bad units value"));
    }

    #[test]
    fn uri_errors_carry_reason() {
        let a = string_attr(ValueTag::URI, "printer-uri-supported", "ipp://bad host/");
        assert_eq!(
            validate_attribute(&a),
            vec!["\"printer-uri-supported\": Bad URI value \"ipp://bad host/\" - Bad hostname/address in URI (RFC 2911 section 4.1.5).".to_string()]
        );
    }

    #[test]
    fn language_and_media_type_patterns() {
        assert_eq!(validate_attribute(&string_attr(ValueTag::NATURAL_LANGUAGE, "l", "zh-Hans-CN")).len(), 0);
        assert_eq!(validate_attribute(&string_attr(ValueTag::NATURAL_LANGUAGE, "l", "en_US")).len(), 1);
        assert_eq!(validate_attribute(&string_attr(ValueTag::MIME_TYPE, "f", "application/pdf")).len(), 0);
        assert_eq!(validate_attribute(&string_attr(ValueTag::MIME_TYPE, "f", "pdf")).len(), 1);
    }

    #[test]
    fn collection_reports_header_then_member_errors() {
        let members = vec![string_attr(ValueTag::KEYWORD, "media-type", "Bad Type")];
        let a = attr(ValueTag::BEGIN_COLLECTION, "media-col", IppValue::Collection(members));
        let errs = validate_attribute(&a);
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0], "\"media-col\": Bad collection value.");
        assert!(errs[1].starts_with("\"media-type\": Bad keyword value"));
    }

    #[test]
    fn separators_are_ignored() {
        assert!(validate_attribute(&Attribute::separator()).is_empty());
    }
}
