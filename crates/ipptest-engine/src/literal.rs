// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request attribute literals: `ATTR syntax name value[,value...]` and the
// `MEMBER` entries of collection values.

use ipptest_core::error::Result;
use ipptest_proto::message::{Attribute, IppValue, Resolution};
use ipptest_proto::tags::{GroupTag, ValueTag, enum_value};

use crate::tokenizer::Tokenizer;
use crate::vars::Variables;

/// Parse an integer the way C's `strtol` with base 0 reads it: optional
/// sign, then `0x` hex, leading-zero octal or decimal. The whole string
/// must be consumed.
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_i32(s: &str) -> Option<i32> {
    parse_int(s).and_then(|v| i32::try_from(v).ok())
}

/// Leading decimal digits of `s` and the remainder.
fn leading_number(s: &str) -> Option<(i32, &str)> {
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map_or(s.len(), |(i, _)| i);
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// Parse `N[xM]dpi|dpc|dpcm|other`.
pub fn parse_resolution(s: &str) -> Option<Resolution> {
    let (xres, rest) = leading_number(s)?;
    let (yres, units) = match rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
        Some(tail) => leading_number(tail)?,
        None => (xres, rest),
    };
    let units = if units.eq_ignore_ascii_case("dpi") {
        Resolution::PER_INCH
    } else if units.eq_ignore_ascii_case("dpc") || units.eq_ignore_ascii_case("dpcm") {
        Resolution::PER_CM
    } else if units.eq_ignore_ascii_case("other") {
        0
    } else {
        return None;
    };
    Some(Resolution { xres, yres, units })
}

/// Parse `lower-upper`.
pub fn parse_range(s: &str) -> Option<(i32, i32)> {
    let (lower, rest) = leading_number(s)?;
    let (upper, rest) = leading_number(rest.strip_prefix('-')?)?;
    rest.is_empty().then_some((lower, upper))
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads attribute literals from the token stream.
pub struct LiteralReader<'a> {
    tok: &'a mut Tokenizer,
    vars: &'a Variables,
}

impl<'a> LiteralReader<'a> {
    pub fn new(tok: &'a mut Tokenizer, vars: &'a Variables) -> Self {
        Self { tok, vars }
    }

    /// Read `syntax name value[,value...]` after an `ATTR` or `MEMBER`
    /// keyword. The attribute is tagged with `group`.
    pub fn read_attribute(&mut self, group: GroupTag) -> Result<Attribute> {
        let syntax = self
            .tok
            .next_token()?
            .ok_or_else(|| self.tok.error("Missing ATTR syntax"))?;
        let tag = ValueTag::from_name(&syntax.text)
            .filter(|t| t.0 >= 0x10)
            .ok_or_else(|| self.tok.error(format!("Bad ATTR syntax \"{}\"", syntax.text)))?;
        let name = self
            .tok
            .next_token()?
            .ok_or_else(|| self.tok.error("Missing ATTR name"))?
            .text;
        let name = self.vars.expand(&name);

        if tag.is_out_of_band() {
            return Ok(Attribute::new(group, tag, name, vec![IppValue::OutOfBand]));
        }

        let mut values = vec![self.read_value(tag, &name)?];
        while self.tok.peek()?.is_some_and(|t| t.is(',')) {
            self.tok.next_token()?;
            values.push(self.read_value(tag, &name)?);
        }
        Ok(Attribute::new(group, tag, name, values))
    }

    fn read_value(&mut self, tag: ValueTag, name: &str) -> Result<IppValue> {
        let token = self
            .tok
            .next_token()?
            .ok_or_else(|| self.tok.error("Missing value"))?;

        if tag == ValueTag::BEGIN_COLLECTION {
            if !token.is('{') {
                return Err(self.tok.error("Bad ATTR collection value"));
            }
            return self.read_collection();
        }

        let text = self.vars.expand(&token.text);
        self.parse_value(tag, name, &text)
    }

    fn parse_value(&self, tag: ValueTag, name: &str, text: &str) -> Result<IppValue> {
        let value = match tag {
            ValueTag::BOOLEAN => IppValue::Boolean(text.eq_ignore_ascii_case("true")),
            ValueTag::INTEGER => IppValue::Integer(
                parse_i32(text)
                    .ok_or_else(|| self.tok.error(format!("Bad integer value \"{text}\"")))?,
            ),
            ValueTag::ENUM => IppValue::Integer(
                parse_i32(text)
                    .or_else(|| enum_value(name, text))
                    .ok_or_else(|| self.tok.error(format!("Bad enum value \"{text}\"")))?,
            ),
            ValueTag::RESOLUTION => IppValue::Resolution(
                parse_resolution(text)
                    .ok_or_else(|| self.tok.error(format!("Bad resolution value \"{text}\"")))?,
            ),
            ValueTag::RANGE => {
                let (lower, upper) = parse_range(text).ok_or_else(|| {
                    self.tok
                        .error(format!("Bad rangeOfInteger value \"{text}\""))
                })?;
                IppValue::Range { lower, upper }
            }
            ValueTag::OCTET_STRING => IppValue::Octets(text.as_bytes().to_vec()),
            ValueTag::TEXT_WITH_LANGUAGE | ValueTag::NAME_WITH_LANGUAGE => IppValue::LangString {
                text: text.to_string(),
                language: "en".to_string(),
            },
            t if t.is_string() => IppValue::String(text.to_string()),
            _ => return Err(self.tok.error("Unsupported ATTR value")),
        };
        Ok(value)
    }

    /// Read `MEMBER ...` entries up to the closing `}`.
    fn read_collection(&mut self) -> Result<IppValue> {
        let mut members = Vec::new();
        loop {
            let token = self
                .tok
                .next_token()?
                .ok_or_else(|| self.tok.error("Missing \"}\" for collection"))?;
            if token.is('}') {
                break;
            }
            if !token.quoted && token.text.eq_ignore_ascii_case("MEMBER") {
                members.push(self.read_attribute(GroupTag::ZERO)?);
            } else {
                return Err(self
                    .tok
                    .error(format!("Unknown directive \"{}\"", token.text)));
            }
        }
        Ok(IppValue::Collection(members))
    }
}
