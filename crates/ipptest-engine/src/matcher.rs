// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attribute value matching for WITH-* and WITH-VALUE-FROM constraints.
//
// Each matcher returns the first matching value (for DEFINE-VALUE) and the
// `GOT:` detail lines to report when the match fails.

use regex::Regex;

use ipptest_proto::message::{Attribute, IppValue, printable_or_hex};
use ipptest_proto::tags::ValueTag;
use ipptest_proto::uri::{UriParts, uris_equal};

use crate::descriptor::{Quantifier, UriComponent, ValueConstraint};

/// Octet strings at or above this size never match a regular expression.
const MAX_REGEX_OCTETS: usize = 1024;

/// Result of matching one attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub matched: bool,
    /// First value that satisfied the constraint.
    pub first: Option<String>,
    /// `GOT:` lines describing the values seen.
    pub got: Vec<String>,
}

impl MatchOutcome {
    fn matched() -> Self {
        Self {
            matched: true,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// OF-TYPE
// ---------------------------------------------------------------------------

/// Whether `tag` is one of the `|` or `,` separated syntaxes in `of_type`.
/// `text`, `name` and `collection` also accept their language and
/// delimiter variants.
pub fn of_type_matches(of_type: &str, tag: ValueTag) -> bool {
    of_type.split(['|', ',']).any(|syntax| match syntax {
        "text" => tag == ValueTag::TEXT || tag == ValueTag::TEXT_WITH_LANGUAGE,
        "name" => tag == ValueTag::NAME || tag == ValueTag::NAME_WITH_LANGUAGE,
        "collection" => tag == ValueTag::BEGIN_COLLECTION,
        other => ValueTag::from_name(other) == Some(tag),
    })
}

// ---------------------------------------------------------------------------
// String extraction
// ---------------------------------------------------------------------------

/// The part of a string value a constraint compares: a URI component when
/// one is selected, a normalised URI for network URIs, otherwise the value.
pub fn component_string(
    tag: ValueTag,
    value: &IppValue,
    component: Option<UriComponent>,
) -> String {
    let raw = value.as_str().unwrap_or_default();
    match component {
        Some(UriComponent::Hostname) => UriParts::parse(raw)
            .map(|p| p.host_without_dot().to_string())
            .unwrap_or_default(),
        Some(UriComponent::Resource) => UriParts::parse(raw)
            .map(|p| p.resource)
            .unwrap_or_default(),
        Some(UriComponent::Scheme) => UriParts::parse(raw)
            .map(|p| p.scheme)
            .unwrap_or_default(),
        None if tag == ValueTag::URI && is_network_uri(raw) => UriParts::parse(raw)
            .map(|p| p.normalized())
            .unwrap_or_default(),
        None => raw.to_string(),
    }
}

fn is_network_uri(s: &str) -> bool {
    ["ipp://", "http://", "ipps://", "https://"]
        .iter()
        .any(|prefix| s.starts_with(prefix))
}

/// Text bound by DEFINE-VALUE when no value constraint picked one: the last
/// value of the attribute.
pub fn last_value_text(attr: &Attribute) -> String {
    let name = attr.name().unwrap_or_default();
    match attr.values.last() {
        Some(IppValue::Integer(v)) => v.to_string(),
        Some(v @ (IppValue::Boolean(_) | IppValue::Resolution(_) | IppValue::Range { .. })) => {
            v.render(name, attr.value_tag)
        }
        Some(IppValue::String(s)) => s.clone(),
        Some(IppValue::LangString { text, .. }) => text.clone(),
        _ => attr.value_string(),
    }
}

// ---------------------------------------------------------------------------
// Integer clauses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Lt,
    Gt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Clause {
    op: Op,
    value: i64,
    /// Upper bound of an `a-b` clause.
    upper: Option<i64>,
}

/// Longest `strtol`-style integer prefix and the bytes it used.
fn integer_prefix(s: &str) -> Option<(i64, usize)> {
    let bytes = s.as_bytes();
    let mut pos = 0;
    let negative = match bytes.first() {
        Some(b'-') => {
            pos = 1;
            true
        }
        Some(b'+') => {
            pos = 1;
            false
        }
        _ => false,
    };
    let (radix, start) = match (bytes.get(pos), bytes.get(pos + 1)) {
        (Some(b'0'), Some(b'x' | b'X'))
            if bytes.get(pos + 2).is_some_and(u8::is_ascii_hexdigit) =>
        {
            (16, pos + 2)
        }
        (Some(b'0'), _) => (8, pos),
        _ => (10, pos),
    };
    let end = bytes[start..]
        .iter()
        .position(|b| !(*b as char).is_digit(radix))
        .map_or(bytes.len(), |n| start + n);
    if end == start {
        return None;
    }
    let magnitude = i64::from_str_radix(&s[start..end], radix).ok()?;
    Some((if negative { -magnitude } else { magnitude }, end))
}

/// Parse a WITH-VALUE integer expression such as `1,5`, `<10` or `1-5`
/// into clauses. The last operator character before a number wins, so `>=5`
/// and `<=5` both mean `=5`. Scanning stops at the first character that
/// cannot start a clause.
fn parse_clauses(spec: &str) -> Vec<Clause> {
    let bytes = spec.as_bytes();
    let starts_clause =
        |b: u8| b.is_ascii_whitespace() || b.is_ascii_digit() || matches!(b, b'-' | b',' | b'<' | b'=' | b'>');

    let mut clauses = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() && starts_clause(bytes[pos]) {
        let mut op = Op::Eq;
        while pos < bytes.len() && !bytes[pos].is_ascii_digit() && bytes[pos] != b'-' {
            match bytes[pos] {
                b'<' => op = Op::Lt,
                b'>' => op = Op::Gt,
                b'=' => op = Op::Eq,
                _ => {}
            }
            pos += 1;
        }
        let Some((value, used)) = integer_prefix(&spec[pos..]) else {
            break;
        };
        pos += used;

        let mut upper = None;
        if op == Op::Eq
            && bytes.get(pos) == Some(&b'-')
            && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)
        {
            if let Some((bound, used)) = integer_prefix(&spec[pos + 1..]) {
                upper = Some(bound);
                pos += 1 + used;
            }
        }
        clauses.push(Clause { op, value, upper });
    }
    clauses
}

fn integer_matches(clauses: &[Clause], actual: i32) -> bool {
    let actual = i64::from(actual);
    clauses.iter().any(|c| match (c.op, c.upper) {
        (Op::Eq, Some(upper)) => (c.value..=upper).contains(&actual),
        (Op::Eq, None) => actual == c.value,
        (Op::Lt, _) => actual < c.value,
        (Op::Gt, _) => actual > c.value,
    })
}

fn range_matches(clauses: &[Clause], lower: i32, upper: i32) -> bool {
    let (lower, upper) = (i64::from(lower), i64::from(upper));
    clauses.iter().any(|c| match (c.op, c.upper) {
        (Op::Eq, Some(bound)) => lower == c.value && upper == bound,
        (Op::Eq, None) => lower == c.value || upper == c.value,
        (Op::Lt, _) => upper < c.value,
        (Op::Gt, _) => upper > c.value,
    })
}

// ---------------------------------------------------------------------------
// WITH-VALUE and friends
// ---------------------------------------------------------------------------

/// Fold per-value results under `quantifier`. `values` yields whether each
/// value matched and the text to record when it did.
fn quantify(quantifier: Quantifier, values: impl Iterator<Item = (bool, String)>) -> (bool, Option<String>) {
    let mut matched = quantifier == Quantifier::All;
    let mut first = None;
    for (hit, text) in values {
        if hit {
            first.get_or_insert(text);
            if quantifier == Quantifier::Any {
                matched = true;
                break;
            }
        } else if quantifier == Quantifier::All {
            matched = false;
            break;
        }
    }
    (matched, first)
}

/// Check `attr` against a literal or regex constraint. Other constraints
/// match trivially here; WITH-VALUE-FROM goes through [`with_value_from`].
pub fn with_value(attr: &Attribute, constraint: &ValueConstraint, quantifier: Quantifier) -> MatchOutcome {
    let (literal, regex, component) = match constraint {
        ValueConstraint::Literal { value, component } => (Some(value.as_str()), None, *component),
        ValueConstraint::Regex { regex, component } => (None, Some(regex), *component),
        ValueConstraint::None | ValueConstraint::ValueFrom(_) => return MatchOutcome::matched(),
    };
    if literal.is_some_and(str::is_empty) {
        return MatchOutcome::matched();
    }

    let name = attr.name().unwrap_or_default();
    let tag = attr.value_tag;
    let pattern = literal.unwrap_or_default();

    match tag {
        ValueTag::INTEGER | ValueTag::ENUM => {
            let clauses = match regex {
                Some(re) => parse_clauses(re.as_str()),
                None => parse_clauses(pattern),
            };
            let (matched, first) = quantify(
                quantifier,
                attr.values.iter().map(|v| {
                    let n = v.as_integer().unwrap_or_default();
                    (integer_matches(&clauses, n), n.to_string())
                }),
            );
            let got = if matched {
                Vec::new()
            } else {
                attr.values
                    .iter()
                    .map(|v| format!("GOT: {name}={}", v.as_integer().unwrap_or_default()))
                    .collect()
            };
            MatchOutcome { matched, first, got }
        }

        ValueTag::RANGE => {
            let clauses = parse_clauses(pattern);
            let bounds = |v: &IppValue| match v {
                IppValue::Range { lower, upper } => (*lower, *upper),
                _ => (0, 0),
            };
            let (matched, first) = quantify(
                quantifier,
                attr.values.iter().map(|v| {
                    let (lower, upper) = bounds(v);
                    (range_matches(&clauses, lower, upper), format!("{lower}-{upper}"))
                }),
            );
            let got = if matched {
                Vec::new()
            } else {
                attr.values
                    .iter()
                    .map(|v| {
                        let (lower, upper) = bounds(v);
                        format!("GOT: {name}={lower}-{upper}")
                    })
                    .collect()
            };
            MatchOutcome { matched, first, got }
        }

        ValueTag::BOOLEAN => {
            let wanted = pattern == "true" || pattern == "1";
            let (matched, first) = quantify(
                quantifier,
                attr.values
                    .iter()
                    .map(|v| (*v == IppValue::Boolean(wanted), pattern.to_string())),
            );
            let got = if matched {
                Vec::new()
            } else {
                attr.values
                    .iter()
                    .map(|v| format!("GOT: {name}={}", v.render(name, tag)))
                    .collect()
            };
            MatchOutcome { matched, first, got }
        }

        ValueTag::RESOLUTION => {
            let (matched, first) = quantify(
                quantifier,
                attr.values
                    .iter()
                    .map(|v| (v.render(name, tag) == pattern, pattern.to_string())),
            );
            let got = if matched {
                Vec::new()
            } else {
                attr.values
                    .iter()
                    .map(|v| v.render(name, tag))
                    .filter(|text| text != pattern)
                    .map(|text| format!("GOT: {name}={text}"))
                    .collect()
            };
            MatchOutcome { matched, first, got }
        }

        ValueTag::NO_VALUE | ValueTag::UNKNOWN => MatchOutcome::matched(),

        ValueTag::OCTET_STRING => octets_match(attr, pattern, regex, quantifier),

        t if t.is_string() => {
            let (matched, first) = quantify(
                quantifier,
                attr.values.iter().map(|v| {
                    let text = component_string(tag, v, component);
                    let hit = match regex {
                        Some(re) => re.is_match(&text),
                        None => string_equals(tag, component, pattern, &text),
                    };
                    (hit, text)
                }),
            );
            let got = if matched {
                Vec::new()
            } else {
                attr.values
                    .iter()
                    .map(|v| format!("GOT: {name}=\"{}\"", v.as_str().unwrap_or_default()))
                    .collect()
            };
            MatchOutcome { matched, first, got }
        }

        // Collections and dates keep the quantifier's starting value.
        _ => MatchOutcome {
            matched: quantifier == Quantifier::All,
            ..Default::default()
        },
    }
}

fn string_equals(tag: ValueTag, component: Option<UriComponent>, wanted: &str, got: &str) -> bool {
    match tag {
        ValueTag::URI if component.is_none() => uris_equal(wanted, got),
        ValueTag::URI
            if matches!(component, Some(UriComponent::Scheme | UriComponent::Hostname)) =>
        {
            wanted.eq_ignore_ascii_case(got)
        }
        t if t.is_case_insensitive() => wanted.eq_ignore_ascii_case(got),
        _ => wanted == got,
    }
}

fn octets_match(attr: &Attribute, pattern: &str, regex: Option<&Regex>, quantifier: Quantifier) -> MatchOutcome {
    let name = attr.name().unwrap_or_default();
    let bytes_of = |v: &IppValue| -> Vec<u8> {
        match v {
            IppValue::Octets(b) => b.clone(),
            other => other.as_str().unwrap_or_default().as_bytes().to_vec(),
        }
    };
    let got_lines = || -> Vec<String> {
        attr.values
            .iter()
            .map(|v| format!("GOT: {name}=\"{}\"", printable_or_hex(&bytes_of(v))))
            .collect()
    };

    let (matched, first) = if let Some(re) = regex {
        quantify(
            quantifier,
            attr.values.iter().map(|v| {
                let data = bytes_of(v);
                if data.len() >= MAX_REGEX_OCTETS {
                    return (false, String::new());
                }
                let text = String::from_utf8_lossy(&data).into_owned();
                (re.is_match(&text), text)
            }),
        )
    } else {
        let wanted = match pattern.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
            Some(digits) => match hex::decode(digits) {
                Ok(bytes) => bytes,
                Err(_) => {
                    return MatchOutcome {
                        matched: false,
                        first: None,
                        got: vec!["Bad WITH-VALUE hex value.".to_string()],
                    };
                }
            },
            None => pattern.as_bytes().to_vec(),
        };
        quantify(
            quantifier,
            attr.values.iter().map(|v| {
                let data = bytes_of(v);
                (data == wanted, printable_or_hex(&data))
            }),
        )
    };

    MatchOutcome {
        matched,
        first,
        got: if matched { Vec::new() } else { got_lines() },
    }
}

// ---------------------------------------------------------------------------
// WITH-VALUE-FROM
// ---------------------------------------------------------------------------

/// Check that every value of `attr` appears among the values of `from`.
pub fn with_value_from(attr: &Attribute, from: &Attribute) -> MatchOutcome {
    let name = attr.name().unwrap_or_default();
    let tag = attr.value_tag;
    let wrong_tag = || MatchOutcome {
        matched: false,
        first: None,
        got: vec![format!("GOT: {name} OF-TYPE {tag}")],
    };

    let mut outcome = MatchOutcome::matched();
    let mut record = |hit: bool, text: String, got: String| {
        if hit {
            outcome.first.get_or_insert(text);
        } else {
            outcome.got.push(got);
            outcome.matched = false;
        }
    };

    match tag {
        ValueTag::INTEGER | ValueTag::ENUM => {
            let compatible = if tag == ValueTag::INTEGER {
                from.value_tag == ValueTag::INTEGER || from.value_tag == ValueTag::RANGE
            } else {
                from.value_tag == ValueTag::ENUM
            };
            if !compatible {
                return wrong_tag();
            }
            for n in attr.values.iter().filter_map(IppValue::as_integer) {
                record(from.contains_integer(n), n.to_string(), format!("GOT: {name}={n}"));
            }
        }

        ValueTag::RESOLUTION => {
            if from.value_tag != ValueTag::RESOLUTION {
                return wrong_tag();
            }
            for v in &attr.values {
                let text = v.render(name, tag);
                record(from.values.contains(v), text.clone(), format!("GOT: {name}={text}"));
            }
        }

        ValueTag::NO_VALUE | ValueTag::UNKNOWN => return MatchOutcome::matched(),

        ValueTag::URI => {
            for s in attr.values.iter().filter_map(IppValue::as_str) {
                let hit = from
                    .values
                    .iter()
                    .filter_map(IppValue::as_str)
                    .any(|f| uris_equal(s, f));
                record(hit, s.to_string(), format!("GOT: {name}='{s}'"));
            }
        }

        t if t.is_string() => {
            for s in attr.values.iter().filter_map(IppValue::as_str) {
                record(from.contains_string(s), s.to_string(), format!("GOT: {name}='{s}'"));
            }
        }

        _ => return MatchOutcome::default(),
    }
    outcome
}
