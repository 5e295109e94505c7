// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Response validation.
//
// Every check runs on every attempt and appends to one error list; nothing
// short-circuits, so a report shows all of a response's problems at once.
// The order of the checks is the order the messages appear in the report.

use std::collections::HashSet;

use chrono::DateTime;
use tracing::debug;

use ipptest_core::types::{IppVersion, OutputMode};
use ipptest_proto::codec::Decoded;
use ipptest_proto::message::{Attribute, IppValue, Message};
use ipptest_proto::tags::{GroupTag, STATUS_INTERNAL_ERROR, ValueTag, status_name};
use ipptest_proto::transport::{Exchange, IPP_MIME_TYPE};
use ipptest_proto::validate::validate_attribute;

use crate::descriptor::{ExpectRecord, TestDescriptor, ValueConstraint, with_directive_name};
use crate::matcher::{last_value_text, of_type_matches, with_value, with_value_from};
use crate::vars::Variables;

/// Longest `status-message` allowed (text(255)).
const MAX_STATUS_MESSAGE: usize = 255;

/// Longest `detailed-status-message` allowed (text(MAX)).
const MAX_DETAILED_STATUS_MESSAGE: usize = 1023;

/// Outcome of one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub errors: Vec<String>,
    /// A REPEAT-* condition asked for another attempt.
    pub repeat: bool,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Run-wide settings the checks depend on.
#[derive(Debug, Clone, Copy)]
pub struct CheckSettings {
    pub output: OutputMode,
    pub validate_headers: bool,
}

/// Status name and message to report for an exchange.
pub fn status_of(exchange: &Exchange) -> (String, String) {
    match (&exchange.response, &exchange.failure) {
        (Some(decoded), _) => {
            let name = status_name(decoded.message.code);
            let text = decoded
                .message
                .status_message()
                .map_or_else(|| name.clone(), str::to_string);
            (name, text)
        }
        (None, Some((status, message))) => (status_name(*status), message.clone()),
        (None, None) => (status_name(STATUS_INTERNAL_ERROR), String::new()),
    }
}

/// Check one exchange against a test. `attempts` counts the requests sent
/// so far for this test, including this one.
pub fn validate(
    test: &TestDescriptor,
    settings: CheckSettings,
    attempts: u32,
    exchange: &Exchange,
    vars: &mut Variables,
) -> Verdict {
    let mut verdict = Verdict::default();

    check_http(exchange, settings.validate_headers, &mut verdict);

    let Some(decoded) = &exchange.response else {
        let (status, message) = status_of(exchange);
        verdict.error(format!("IPP request failed with status {status} ({message})"));
        return verdict;
    };
    let response = &decoded.message;

    bind_response_variables(response, vars);
    check_framing(decoded, test.version, test.request_id(), &mut verdict);
    check_leading_attributes(response, &mut verdict);
    check_status_message(response, "status-message", "text(255)", MAX_STATUS_MESSAGE, "3.1.6.2", &mut verdict);
    check_status_message(
        response,
        "detailed-status-message",
        "text(MAX)",
        MAX_DETAILED_STATUS_MESSAGE,
        "3.1.6.3",
        &mut verdict,
    );
    check_groups(response, settings.output, &mut verdict);
    check_statuses(test, response, attempts, vars, &mut verdict);
    for expect in &test.expects {
        check_expect(expect, response, attempts, vars, &mut verdict);
    }

    debug!(
        test = %test.name,
        attempts,
        errors = verdict.errors.len(),
        repeat = verdict.repeat,
        "validated response"
    );
    verdict
}

// ---------------------------------------------------------------------------
// Transport-level checks
// ---------------------------------------------------------------------------

fn check_http(exchange: &Exchange, validate_headers: bool, verdict: &mut Verdict) {
    if exchange.http_version != (1, 1) {
        let (major, minor) = exchange.http_version;
        verdict.error(format!("Bad HTTP version ({major}.{minor})"));
    }
    if !validate_headers {
        return;
    }

    let content_type = exchange.content_type.as_deref().filter(|s| !s.is_empty());
    if !content_type.is_some_and(|ct| ct.eq_ignore_ascii_case(IPP_MIME_TYPE)) {
        verdict.error(format!(
            "Bad HTTP Content-Type in response ({})",
            content_type.unwrap_or("<missing>")
        ));
    }

    if let Some(date) = exchange.date.as_deref().filter(|s| !s.is_empty()) {
        if DateTime::parse_from_rfc2822(date).is_err() {
            verdict.error(format!("Bad HTTP Date in response ({date})"));
        }
    }
}

// ---------------------------------------------------------------------------
// Message structure
// ---------------------------------------------------------------------------

fn first_with_tag<'a>(message: &'a Message, name: &str, tag: ValueTag) -> Option<&'a Attribute> {
    message
        .attributes
        .iter()
        .find(|a| a.name() == Some(name) && a.value_tag == tag)
}

fn bind_response_variables(response: &Message, vars: &mut Variables) {
    if let Some(id) = first_with_tag(response, "job-id", ValueTag::INTEGER)
        .and_then(|a| a.values.first())
        .and_then(IppValue::as_integer)
    {
        vars.set("job-id", id.to_string());
    }
    if let Some(uri) = first_with_tag(response, "job-uri", ValueTag::URI)
        .and_then(|a| a.values.first())
        .and_then(IppValue::as_str)
    {
        vars.set("job-uri", uri);
    }
    if let Some(id) = first_with_tag(response, "notify-subscription-id", ValueTag::INTEGER)
        .and_then(|a| a.values.first())
        .and_then(IppValue::as_integer)
    {
        vars.set("notify-subscription-id", id.to_string());
    }
}

fn check_framing(decoded: &Decoded, version: IppVersion, request_id: i32, verdict: &mut Verdict) {
    let response = &decoded.message;
    if !decoded.terminated {
        verdict.error("Missing end-of-attributes-tag in response (RFC 2910 section 3.5.1)");
    }
    if version.is_checked() && response.version != (version.major(), version.minor()) {
        let (major, minor) = response.version;
        verdict.error(format!(
            "Bad version {major}.{minor} in response - expected {version} (RFC 2911 section 3.1.8)."
        ));
    }
    if response.request_id != request_id {
        verdict.error(format!(
            "Bad request ID {} in response - expected {request_id} (RFC 2911 section 3.1.1)",
            response.request_id
        ));
    }
}

fn describe(attr: &Attribute) -> String {
    format!(
        "\"{} ({})\" in group {}",
        attr.name().unwrap_or("(null)"),
        attr.type_label(),
        attr.group
    )
}

fn is_single_operation_attr(attr: &Attribute, name: &str, tag: ValueTag) -> bool {
    attr.name() == Some(name)
        && attr.value_tag == tag
        && attr.group == GroupTag::OPERATION
        && attr.count() == 1
}

fn check_leading_attributes(response: &Message, verdict: &mut Verdict) {
    let mut attrs = response.attributes.iter();
    let Some(first) = attrs.next() else {
        verdict.error(
            "Missing first attribute \"attributes-charset (charset)\" in group operation-attributes-tag (RFC 2911 section 3.1.4).",
        );
        return;
    };
    if !is_single_operation_attr(first, "attributes-charset", ValueTag::CHARSET) {
        verdict.error(format!(
            "Bad first attribute {}, expected \"attributes-charset (charset)\" in group operation-attributes-tag (RFC 2911 section 3.1.4).",
            describe(first)
        ));
    }

    match attrs.next() {
        None => verdict.error(
            "Missing second attribute \"attributes-natural-language (naturalLanguage)\" in group operation-attributes-tag (RFC 2911 section 3.1.4).",
        ),
        Some(second)
            if !is_single_operation_attr(second, "attributes-natural-language", ValueTag::NATURAL_LANGUAGE) =>
        {
            verdict.error(format!(
                "Bad first attribute {}, expected \"attributes-natural-language (naturalLanguage)\" in group operation-attributes-tag (RFC 2911 section 3.1.4).",
                describe(second)
            ));
        }
        Some(_) => {}
    }
}

fn check_status_message(
    response: &Message,
    name: &str,
    syntax: &str,
    max_len: usize,
    section: &str,
    verdict: &mut Verdict,
) {
    let Some(attr) = response.find(name) else {
        return;
    };
    let prefix = format!("{name} ({syntax})");
    let suffix = format!("(RFC 2911 section {section}).");

    if attr.value_tag != ValueTag::TEXT {
        verdict.error(format!("{prefix} has wrong value tag {} {suffix}", attr.value_tag));
    }
    if attr.group != GroupTag::OPERATION {
        verdict.error(format!("{prefix} has wrong group tag {} {suffix}", attr.group));
    }
    if attr.count() != 1 {
        verdict.error(format!("{prefix} has {} values {suffix}", attr.count()));
    }
    if let Some(text) = attr.values.first().and_then(IppValue::as_str) {
        if text.len() > max_len {
            verdict.error(format!("{prefix} has bad length {} {suffix}", text.len()));
        }
    }
}

fn groups_out_of_order(current: GroupTag, previous: GroupTag) -> bool {
    match current {
        GroupTag::ZERO => false,
        GroupTag::OPERATION => true,
        GroupTag::UNSUPPORTED => previous != GroupTag::OPERATION,
        GroupTag::JOB | GroupTag::PRINTER => {
            previous != GroupTag::OPERATION && previous != GroupTag::UNSUPPORTED
        }
        GroupTag::SUBSCRIPTION => previous > current && previous != GroupTag::DOCUMENT,
        _ => previous > current,
    }
}

fn check_groups(response: &Message, output: OutputMode, verdict: &mut Verdict) {
    let Some(first) = response.attributes.first() else {
        return;
    };
    let mut group = first.group;
    let mut seen: HashSet<&str> = HashSet::new();

    for attr in &response.attributes {
        if attr.group != group {
            seen.clear();
            if groups_out_of_order(attr.group, group) {
                verdict.error(format!("Attribute groups out of order ({} < {group})", attr.group));
            }
            if attr.group != GroupTag::ZERO {
                group = attr.group;
            }
        }

        let Some(name) = attr.name() else {
            continue;
        };
        verdict.errors.extend(validate_attribute(attr));
        if !seen.insert(name) && output.flags_duplicates() {
            verdict.error(format!("Duplicate \"{name}\" attribute in {group} group"));
        }
    }
}

// ---------------------------------------------------------------------------
// STATUS records
// ---------------------------------------------------------------------------

fn gated(vars: &Variables, if_defined: Option<&str>, if_not_defined: Option<&str>) -> bool {
    if_defined.is_some_and(|v| !vars.is_defined(v)) || if_not_defined.is_some_and(|v| vars.is_defined(v))
}

fn check_statuses(
    test: &TestDescriptor,
    response: &Message,
    attempts: u32,
    vars: &mut Variables,
    verdict: &mut Verdict,
) {
    if test.statuses.is_empty() {
        return;
    }

    let mut status_ok = false;
    for record in &test.statuses {
        if gated(vars, record.if_defined.as_deref(), record.if_not_defined.as_deref()) {
            continue;
        }
        if response.code == record.status {
            status_ok = true;
            if record.repeat.on_match && record.repeat.below_limit(attempts) {
                verdict.repeat = true;
            }
            if let Some(var) = &record.define_match {
                vars.set(var.as_str(), "1");
            }
        } else {
            if record.repeat.on_no_match && record.repeat.below_limit(attempts) {
                verdict.repeat = true;
            }
            if let Some(var) = &record.define_no_match {
                vars.set(var.as_str(), "1");
                status_ok = true;
            }
        }
    }
    if status_ok {
        return;
    }

    let got = status_name(response.code);
    for record in &test.statuses {
        if gated(vars, record.if_defined.as_deref(), record.if_not_defined.as_deref()) {
            continue;
        }
        if !record.repeat.on_match || !record.repeat.below_limit(attempts) {
            verdict.error(format!("EXPECTED: STATUS {} (got {got})", status_name(record.status)));
        }
    }
    if let Some(message) = first_with_tag(response, "status-message", ValueTag::TEXT)
        .and_then(|a| a.values.first())
        .and_then(IppValue::as_str)
    {
        verdict.error(format!("status-message=\"{message}\""));
    }
}

// ---------------------------------------------------------------------------
// EXPECT records
// ---------------------------------------------------------------------------

/// `WITH-VALUE "x"`, `WITH-ALL-VALUES /x/` or `WITH-VALUE-FROM y`.
fn constraint_text(expect: &ExpectRecord) -> String {
    let with = with_directive_name(expect.quantifier, expect.constraint.component());
    match &expect.constraint {
        ValueConstraint::None => String::new(),
        ValueConstraint::Literal { value, .. } => format!("{with} \"{value}\""),
        ValueConstraint::Regex { regex, .. } => format!("{with} /{}/", regex.as_str()),
        ValueConstraint::ValueFrom(from) => format!("WITH-VALUE-FROM {from}"),
    }
}

/// Whether `attr` satisfies the record's value constraint.
fn value_matches(expect: &ExpectRecord, attr: &Attribute, response: &Message) -> bool {
    match &expect.constraint {
        ValueConstraint::ValueFrom(from) => response
            .find(from)
            .is_some_and(|f| with_value_from(attr, f).matched),
        other => with_value(attr, other, expect.quantifier).matched,
    }
}

fn check_expect(
    expect: &ExpectRecord,
    response: &Message,
    attempts: u32,
    vars: &mut Variables,
    verdict: &mut Verdict,
) {
    if gated(vars, expect.if_defined.as_deref(), expect.if_not_defined.as_deref()) {
        return;
    }

    let hits = response.find_all(&expect.name);
    let Some(start) = hits
        .iter()
        .position(|(group, _)| expect.in_group.is_none_or(|want| *group == want))
    else {
        check_occurrence(expect, None, response, attempts, vars, verdict);
        return;
    };

    for hit in &hits[start..] {
        if !check_occurrence(expect, Some(*hit), response, attempts, vars, verdict) || !expect.expect_all {
            break;
        }
    }
}

/// Check one occurrence; `found` pairs the attribute with the group of its
/// top-level attribute. Returns false when the record failed.
fn check_occurrence(
    expect: &ExpectRecord,
    found: Option<(GroupTag, &Attribute)>,
    response: &Message,
    attempts: u32,
    vars: &mut Variables,
    verdict: &mut Verdict,
) -> bool {
    let name = expect.name.as_str();
    let below_limit = expect.repeat.below_limit(attempts);
    let reports = !expect.defines_outcome();

    let not_expected_hit = match found {
        Some((_, attr)) if expect.not_expected => {
            expect.constraint.is_none() || value_matches(expect, attr, response)
        }
        _ => false,
    };
    let missing = found.is_none() && !(expect.not_expected || expect.optional);
    let type_ok = found.is_none_or(|(_, attr)| {
        expect
            .of_type
            .as_deref()
            .is_none_or(|t| of_type_matches(t, attr.value_tag))
    });
    let group_ok = found.is_none_or(|(group, _)| expect.in_group.is_none_or(|want| group == want));

    if not_expected_hit || missing || !type_ok || !group_ok {
        if let Some(var) = &expect.define_no_match {
            vars.set(var.as_str(), "1");
        } else if reports {
            if not_expected_hit {
                if expect.constraint.is_none() {
                    verdict.error(format!("NOT EXPECTED: {name}"));
                } else {
                    verdict.error(format!("NOT EXPECTED: {name} {}", constraint_text(expect)));
                }
            } else if missing {
                verdict.error(format!("EXPECTED: {name}"));
            } else if let Some((group, attr)) = found {
                if !type_ok {
                    verdict.error(format!(
                        "EXPECTED: {name} OF-TYPE {} (got {})",
                        expect.of_type.as_deref().unwrap_or_default(),
                        attr.value_tag
                    ));
                }
                if !group_ok {
                    if let Some(want) = expect.in_group {
                        verdict.error(format!("EXPECTED: {name} IN-GROUP {want} (got {group})."));
                    }
                }
            }
        }
        if expect.repeat.on_no_match && below_limit {
            verdict.repeat = true;
        }
        return false;
    }

    // Absent optional attributes and non-matching `!` records pass here.
    let Some((_, attr)) = found else {
        return true;
    };
    if expect.not_expected {
        return true;
    }

    let fail = |verdict: &mut Verdict, vars: &mut Variables, lines: Vec<String>| {
        if let Some(var) = &expect.define_no_match {
            vars.set(var.as_str(), "1");
        } else if reports {
            verdict.errors.extend(lines);
        }
        if expect.repeat.on_no_match && below_limit {
            verdict.repeat = true;
        }
    };

    let mut first_match = None;
    match &expect.constraint {
        ValueConstraint::None => {}
        ValueConstraint::ValueFrom(from) => {
            let outcome = response
                .find(from)
                .map(|f| with_value_from(attr, f))
                .unwrap_or_default();
            if !outcome.matched {
                let repeating = expect.repeat.on_match || expect.repeat.on_no_match;
                let lines = if !repeating || !below_limit {
                    std::iter::once(format!("EXPECTED: {name} WITH-VALUES-FROM {from}"))
                        .chain(outcome.got)
                        .collect()
                } else {
                    Vec::new()
                };
                fail(verdict, vars, lines);
                return false;
            }
        }
        literal_or_regex => {
            let outcome = with_value(attr, literal_or_regex, expect.quantifier);
            if !outcome.matched {
                let silent = expect.repeat.on_match || (expect.repeat.on_no_match && below_limit);
                let lines = if silent {
                    Vec::new()
                } else {
                    std::iter::once(format!("EXPECTED: {name} {}", constraint_text(expect)))
                        .chain(outcome.got)
                        .collect()
                };
                fail(verdict, vars, lines);
                return false;
            }
            first_match = Some(outcome.first.unwrap_or_default());
        }
    }

    if let Some(count) = expect.count {
        if attr.count() != count {
            fail(verdict, vars, vec![format!(
                "EXPECTED: {name} COUNT {count} (got {})",
                attr.count()
            )]);
            return false;
        }
    }

    if let Some(other_name) = &expect.same_count_as {
        let other = response.find(other_name);
        if other.is_none_or(|o| o.count() != attr.count()) {
            let detail = match other {
                None => "not returned".to_string(),
                Some(o) => format!("{} values", o.count()),
            };
            fail(verdict, vars, vec![format!(
                "EXPECTED: {name} ({} values) SAME-COUNT-AS {other_name} ({detail})",
                attr.count()
            )]);
            return false;
        }
    }

    if let Some(var) = &expect.define_match {
        vars.set(var.as_str(), "1");
    }
    if let Some(var) = &expect.define_value {
        let text = first_match.unwrap_or_else(|| last_value_text(attr));
        vars.set(var.as_str(), text);
    }
    if expect.repeat.on_match && below_limit {
        verdict.repeat = true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Quantifier, RepeatRule, StatusRecord};
    use ipptest_proto::message::MessageBuilder;
    use pretty_assertions::assert_eq;
    use regex::Regex;

    const SETTINGS: CheckSettings = CheckSettings {
        output: OutputMode::Test,
        validate_headers: false,
    };

    fn printer_response(request_id: i32) -> Message {
        let mut builder = MessageBuilder::new(0x0000, request_id);
        builder
            .standard_operation_attrs()
            .begin_group(GroupTag::PRINTER)
            .uri("printer-uri-supported", "ipp://printer.local/ipp/print")
            .enum_attr("printer-state", 3)
            .keywords("sides-supported", &["one-sided", "two-sided-long-edge"])
            .keyword("sides-default", "one-sided")
            .integer("job-id", 17);
        builder.build()
    }

    fn exchange(message: &Message) -> Exchange {
        Exchange::from_message(message).expect("encode")
    }

    fn test_with(expects: Vec<ExpectRecord>) -> TestDescriptor {
        let mut test = TestDescriptor::new("Get-Printer-Attributes", "/ipp/print", 1);
        test.expects = expects;
        test
    }

    fn run(test: &TestDescriptor, message: &Message) -> (Verdict, Variables) {
        let mut vars = Variables::new();
        let verdict = validate(test, SETTINGS, 1, &exchange(message), &mut vars);
        (verdict, vars)
    }

    #[test]
    fn clean_response_passes_and_binds_job_id() {
        let test = test_with(vec![ExpectRecord::new("printer-state", false)]);
        let (verdict, vars) = run(&test, &printer_response(1));
        assert_eq!(verdict.errors, Vec::<String>::new());
        assert_eq!(vars.get("job-id"), Some("17"));
    }

    #[test]
    fn missing_response_reports_failure_status() {
        let test = test_with(Vec::new());
        let mut vars = Variables::new();
        let failed = Exchange::failed(0x0500, "connection refused");
        let verdict = validate(&test, SETTINGS, 1, &failed, &mut vars);
        assert_eq!(verdict.errors, vec![
            "IPP request failed with status server-error-internal-error (connection refused)"
        ]);
    }

    #[test]
    fn framing_and_header_checks() {
        let test = test_with(Vec::new());
        let mut ex = exchange(&printer_response(9));
        ex.http_version = (1, 0);
        ex.content_type = Some("text/html".into());
        ex.date = Some("yesterday".into());
        if let Some(decoded) = ex.response.as_mut() {
            decoded.terminated = false;
            decoded.message.version = (2, 0);
        }
        let settings = CheckSettings {
            validate_headers: true,
            ..SETTINGS
        };
        let mut vars = Variables::new();
        let verdict = validate(&test, settings, 1, &ex, &mut vars);
        assert_eq!(verdict.errors, vec![
            "Bad HTTP version (1.0)",
            "Bad HTTP Content-Type in response (text/html)",
            "Bad HTTP Date in response (yesterday)",
            "Missing end-of-attributes-tag in response (RFC 2910 section 3.5.1)",
            "Bad version 2.0 in response - expected 1.1 (RFC 2911 section 3.1.8).",
            "Bad request ID 9 in response - expected 1 (RFC 2911 section 3.1.1)",
        ]);
    }

    #[test]
    fn unchecked_version_skips_version_check() {
        let mut test = test_with(Vec::new());
        test.version = IppVersion::UNCHECKED;
        let mut message = printer_response(1);
        message.version = (2, 0);
        let (verdict, _) = run(&test, &message);
        assert!(verdict.passed());
    }

    #[test]
    fn leading_attributes_must_be_charset_then_language() {
        let mut builder = MessageBuilder::new(0x0000, 1);
        builder.natural_language("attributes-natural-language", "en");
        let (verdict, _) = run(&test_with(Vec::new()), &builder.build());
        assert_eq!(verdict.errors, vec![
            "Bad first attribute \"attributes-natural-language (naturalLanguage)\" in group operation-attributes-tag, expected \"attributes-charset (charset)\" in group operation-attributes-tag (RFC 2911 section 3.1.4).",
            "Missing second attribute \"attributes-natural-language (naturalLanguage)\" in group operation-attributes-tag (RFC 2911 section 3.1.4).",
        ]);

        let empty = Message::new(0, 1);
        let (verdict, _) = run(&test_with(Vec::new()), &empty);
        assert!(verdict.errors[0].starts_with("Missing first attribute"));
    }

    #[test]
    fn status_message_limits() {
        let long = "x".repeat(300);
        let mut builder = MessageBuilder::new(0x0000, 1);
        builder.standard_operation_attrs().text("status-message", &long);
        let (verdict, _) = run(&test_with(Vec::new()), &builder.build());
        assert_eq!(verdict.errors, vec![
            "status-message (text(255)) has bad length 300 (RFC 2911 section 3.1.6.2)."
        ]);

        let mut builder = MessageBuilder::new(0x0000, 1);
        builder
            .standard_operation_attrs()
            .keyword("status-message", "ok")
            .begin_group(GroupTag::PRINTER)
            .text("detailed-status-message", "fine");
        let (verdict, _) = run(&test_with(Vec::new()), &builder.build());
        assert_eq!(verdict.errors, vec![
            "status-message (text(255)) has wrong value tag keyword (RFC 2911 section 3.1.6.2).",
            "detailed-status-message (text(MAX)) has wrong group tag printer-attributes-tag (RFC 2911 section 3.1.6.3).",
        ]);
    }

    #[test]
    fn group_order_and_duplicates() {
        let mut builder = MessageBuilder::new(0x0000, 1);
        builder
            .standard_operation_attrs()
            .begin_group(GroupTag::PRINTER)
            .keyword("sides-default", "one-sided")
            .keyword("sides-default", "one-sided")
            .begin_group(GroupTag::OPERATION)
            .text("status-message", "ok");
        let message = builder.build();
        let (verdict, _) = run(&test_with(Vec::new()), &message);
        assert_eq!(verdict.errors, vec![
            "Duplicate \"sides-default\" attribute in printer-attributes-tag group",
            "Attribute groups out of order (operation-attributes-tag < printer-attributes-tag)",
        ]);

        let list = CheckSettings {
            output: OutputMode::List,
            ..SETTINGS
        };
        let mut vars = Variables::new();
        let verdict = validate(&test_with(Vec::new()), list, 1, &exchange(&message), &mut vars);
        assert_eq!(verdict.errors.len(), 1);
    }

    #[test]
    fn group_order_rules() {
        assert!(!groups_out_of_order(GroupTag::PRINTER, GroupTag::OPERATION));
        assert!(!groups_out_of_order(GroupTag::JOB, GroupTag::UNSUPPORTED));
        assert!(groups_out_of_order(GroupTag::UNSUPPORTED, GroupTag::PRINTER));
        assert!(!groups_out_of_order(GroupTag::SUBSCRIPTION, GroupTag::DOCUMENT));
        assert!(groups_out_of_order(GroupTag::DOCUMENT, GroupTag::SYSTEM));
        assert!(!groups_out_of_order(GroupTag::ZERO, GroupTag::PRINTER));
    }

    #[test]
    fn status_records() {
        let mut test = test_with(Vec::new());
        test.statuses = vec![StatusRecord::new(0x0400)];
        let (verdict, _) = run(&test, &printer_response(1));
        assert_eq!(verdict.errors, vec![
            "EXPECTED: STATUS client-error-bad-request (got successful-ok)"
        ]);

        test.statuses.push(StatusRecord::new(0x0000));
        let (verdict, _) = run(&test, &printer_response(1));
        assert!(verdict.passed());
    }

    #[test]
    fn status_define_no_match_counts_as_ok() {
        let mut test = test_with(Vec::new());
        let mut record = StatusRecord::new(0x0400);
        record.define_no_match = Some("not-bad".into());
        test.statuses = vec![record];
        let (verdict, vars) = run(&test, &printer_response(1));
        assert!(verdict.passed());
        assert_eq!(vars.get("not-bad"), Some("1"));
    }

    #[test]
    fn status_repeat_match_is_silent_below_limit() {
        let mut test = test_with(Vec::new());
        let mut record = StatusRecord::new(0x0000);
        record.repeat = RepeatRule {
            limit: 5,
            on_match: true,
            on_no_match: false,
        };
        test.statuses = vec![record];
        let (verdict, _) = run(&test, &printer_response(1));
        assert!(verdict.repeat);
        assert!(verdict.passed());
    }

    #[test]
    fn expect_presence_messages() {
        let test = test_with(vec![
            ExpectRecord::new("printer-name", false),
            ExpectRecord::new("!printer-state", false),
            ExpectRecord::new("?printer-info", false),
        ]);
        let (verdict, _) = run(&test, &printer_response(1));
        assert_eq!(verdict.errors, vec![
            "EXPECTED: printer-name",
            "NOT EXPECTED: printer-state"
        ]);
    }

    #[test]
    fn of_type_and_in_group() {
        let mut by_type = ExpectRecord::new("printer-state", false);
        by_type.of_type = Some("integer".into());
        let mut by_group = ExpectRecord::new("sides-default", false);
        by_group.in_group = Some(GroupTag::JOB);
        let (verdict, _) = run(&test_with(vec![by_type, by_group]), &printer_response(1));
        assert_eq!(verdict.errors, vec![
            "EXPECTED: printer-state OF-TYPE integer (got enum)",
            "EXPECTED: sides-default",
        ]);
    }

    #[test]
    fn with_value_failure_lists_values() {
        let mut e = ExpectRecord::new("sides-supported", false);
        e.constraint = ValueConstraint::Literal {
            value: "two-sided-short-edge".into(),
            component: None,
        };
        let (verdict, _) = run(&test_with(vec![e]), &printer_response(1));
        assert_eq!(verdict.errors, vec![
            "EXPECTED: sides-supported WITH-VALUE \"two-sided-short-edge\"",
            "GOT: sides-supported=\"one-sided\"",
            "GOT: sides-supported=\"two-sided-long-edge\"",
        ]);
    }

    #[test]
    fn regex_failure_uses_slashes() {
        let mut e = ExpectRecord::new("sides-supported", false);
        e.quantifier = Quantifier::All;
        e.constraint = ValueConstraint::Regex {
            regex: Regex::new("^one").expect("pattern"),
            component: None,
        };
        let (verdict, _) = run(&test_with(vec![e]), &printer_response(1));
        assert_eq!(verdict.errors[0], "EXPECTED: sides-supported WITH-ALL-VALUES /^one/");
    }

    #[test]
    fn value_from_count_and_same_count() {
        let mut from = ExpectRecord::new("sides-default", false);
        from.constraint = ValueConstraint::ValueFrom("sides-supported".into());
        let mut count = ExpectRecord::new("sides-supported", false);
        count.count = Some(3);
        let mut same = ExpectRecord::new("sides-supported", false);
        same.same_count_as = Some("media-supported".into());
        let (verdict, _) = run(&test_with(vec![from, count, same]), &printer_response(1));
        assert_eq!(verdict.errors, vec![
            "EXPECTED: sides-supported COUNT 3 (got 2)",
            "EXPECTED: sides-supported (2 values) SAME-COUNT-AS media-supported (not returned)",
        ]);
    }

    #[test]
    fn define_variants_bind_instead_of_failing() {
        let mut matched = ExpectRecord::new("printer-state", false);
        matched.define_match = Some("has-state".into());
        matched.define_value = Some("state".into());
        let mut absent = ExpectRecord::new("printer-name", false);
        absent.define_no_match = Some("no-name".into());
        let mut quiet = ExpectRecord::new("printer-info", false);
        quiet.define_value = Some("info".into());
        let mut first = ExpectRecord::new("sides-supported", false);
        first.constraint = ValueConstraint::Regex {
            regex: Regex::new("^two").expect("pattern"),
            component: None,
        };
        first.define_value = Some("two-sided".into());

        let (verdict, vars) = run(&test_with(vec![matched, absent, quiet, first]), &printer_response(1));
        assert!(verdict.passed(), "{:?}", verdict.errors);
        assert_eq!(vars.get("has-state"), Some("1"));
        assert_eq!(vars.get("state"), Some("3"));
        assert_eq!(vars.get("no-name"), Some("1"));
        assert_eq!(vars.get("info"), None);
        assert_eq!(vars.get("two-sided"), Some("two-sided-long-edge"));
    }

    #[test]
    fn not_expected_with_value_fails_only_on_match() {
        let mut e = ExpectRecord::new("!sides-default", false);
        e.constraint = ValueConstraint::Literal {
            value: "two-sided-long-edge".into(),
            component: None,
        };
        let (verdict, _) = run(&test_with(vec![e.clone()]), &printer_response(1));
        assert!(verdict.passed());

        e.constraint = ValueConstraint::Literal {
            value: "one-sided".into(),
            component: None,
        };
        let (verdict, _) = run(&test_with(vec![e]), &printer_response(1));
        assert_eq!(verdict.errors, vec!["NOT EXPECTED: sides-default WITH-VALUE \"one-sided\""]);
    }

    #[test]
    fn expect_all_checks_every_occurrence() {
        let mut builder = MessageBuilder::new(0x0000, 1);
        builder
            .standard_operation_attrs()
            .begin_group(GroupTag::JOB)
            .enum_attr("job-state", 9)
            .begin_group(GroupTag::JOB)
            .enum_attr("job-state", 5);
        let message = builder.build();

        let mut each = ExpectRecord::new("job-state", true);
        each.constraint = ValueConstraint::Literal {
            value: "9".into(),
            component: None,
        };
        let (verdict, _) = run(&test_with(vec![each.clone()]), &message);
        assert_eq!(verdict.errors, vec![
            "EXPECTED: job-state WITH-VALUE \"9\"",
            "GOT: job-state=5"
        ]);

        each.expect_all = false;
        let (verdict, _) = run(&test_with(vec![each]), &message);
        assert!(verdict.passed());
    }

    #[test]
    fn gated_records_are_skipped() {
        let mut e = ExpectRecord::new("printer-name", false);
        e.if_defined = Some("want-name".into());
        let (verdict, _) = run(&test_with(vec![e]), &printer_response(1));
        assert!(verdict.passed());
    }

    #[test]
    fn repeat_no_match_requests_another_attempt() {
        let mut e = ExpectRecord::new("printer-state", false);
        e.constraint = ValueConstraint::Literal {
            value: "5".into(),
            component: None,
        };
        e.repeat = RepeatRule {
            limit: 3,
            on_match: false,
            on_no_match: true,
        };
        let test = test_with(vec![e]);
        let mut vars = Variables::new();
        let ex = exchange(&printer_response(1));

        let verdict = validate(&test, SETTINGS, 1, &ex, &mut vars);
        assert!(verdict.repeat);
        assert!(verdict.passed());

        let verdict = validate(&test, SETTINGS, 3, &ex, &mut vars);
        assert!(!verdict.repeat);
        assert_eq!(verdict.errors[0], "EXPECTED: printer-state WITH-VALUE \"5\"");
    }

    #[test]
    fn status_of_prefers_status_message() {
        let mut builder = MessageBuilder::new(0x0400, 1);
        builder.standard_operation_attrs().text("status-message", "Bad things");
        let ex = exchange(&builder.build());
        assert_eq!(status_of(&ex), ("client-error-bad-request".to_string(), "Bad things".to_string()));
    }
}
