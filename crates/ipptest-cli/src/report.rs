// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Console and JSON reporters.
//
// The console reporter reproduces the classic test-mode layout: a quoted
// file header, one 68-column line per test closed by PASS, FAIL or SKIP,
// and detail lines indented by eight spaces. List and CSV modes turn the
// DISPLAY attributes of each response object into table rows.

use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use ipptest_core::error::IppTestError;
use ipptest_core::types::{Counters, OutputMode};
use ipptest_engine::reporter::{Reporter, TestOutcome};
use ipptest_proto::message::{Attribute, Message};
use ipptest_proto::tags::{GroupTag, operation_name};

/// Indentation of detail lines under a test.
const DETAIL_INDENT: &str = "        ";

fn write_or_warn(out: &mut impl Write, text: &str) {
    if let Err(err) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        warn!(error = %err, "unable to write report output");
    }
}

/// `name (syntax) = values`, or the separator marker.
fn attribute_line(attr: &Attribute) -> String {
    match attr.name() {
        None => format!("{DETAIL_INDENT}-- separator --\n"),
        Some(name) => format!(
            "{DETAIL_INDENT}{name} ({}) = {}\n",
            attr.type_label(),
            attr.value_string()
        ),
    }
}

/// Block until the operator presses a key on the controlling terminal.
fn wait_for_key() {
    let result = std::fs::File::open("/dev/tty").and_then(|mut tty| tty.read(&mut [0u8; 1]));
    if let Err(err) = result {
        debug!(error = %err, "no terminal to wait on");
    }
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Human-readable reporter for the test, list, CSV and quiet modes.
pub struct ConsoleReporter<W: Write> {
    out: W,
    output: OutputMode,
    verbosity: u8,
    current: String,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, output: OutputMode, verbosity: u8) -> Self {
        Self {
            out,
            output,
            verbosity,
            current: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn is_test_mode(&self) -> bool {
        self.output == OutputMode::Test
    }

    fn emit(&mut self, text: &str) {
        write_or_warn(&mut self.out, text);
    }

    fn emit_test_line(&mut self) {
        let line = format!("    {:<68.68} [", self.current);
        self.emit(&line);
    }

    fn emit_displayed(&mut self, response: &Message, displayed: &[String]) {
        let lines: String = response
            .attributes
            .iter()
            .filter(|a| a.name().is_some_and(|n| displayed.iter().any(|d| d == n)))
            .map(attribute_line)
            .collect();
        self.emit(&lines);
    }

    /// Header row plus one row per response object outside the operation
    /// group.
    fn emit_table(&mut self, response: &Message, displayed: &[String]) {
        let widths: Vec<usize> = displayed
            .iter()
            .map(|name| {
                response
                    .attributes
                    .iter()
                    .filter(|a| a.name() == Some(name.as_str()))
                    .map(|a| a.value_string().len())
                    .fold(name.len(), usize::max)
            })
            .collect();

        let mut text = String::new();
        let names: Vec<String> = displayed.to_vec();
        text.push_str(&self.table_row(&names, &widths));
        if self.output == OutputMode::List {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            text.push_str(&rule.join(" "));
            text.push('\n');
        }

        for object in objects(response) {
            let cells: Vec<String> = displayed
                .iter()
                .map(|name| {
                    object
                        .iter()
                        .find(|a| a.name() == Some(name.as_str()))
                        .map(|a| a.value_string())
                        .unwrap_or_default()
                })
                .collect();
            text.push_str(&self.table_row(&cells, &widths));
        }
        self.emit(&text);
    }

    fn table_row(&self, cells: &[String], widths: &[usize]) -> String {
        let row = if self.output == OutputMode::Csv {
            cells.iter().map(|c| csv_cell(c)).collect::<Vec<_>>().join(",")
        } else {
            cells
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!("{row}\n")
    }
}

/// Runs of attributes after the operation group, split at separators.
fn objects(response: &Message) -> Vec<&[Attribute]> {
    let attrs = &response.attributes;
    let mut objects = Vec::new();
    let mut i = 0;
    while i < attrs.len() {
        while i < attrs.len() && attrs[i].group <= GroupTag::OPERATION {
            i += 1;
        }
        let start = i;
        while i < attrs.len() && attrs[i].group > GroupTag::OPERATION {
            i += 1;
        }
        if i > start {
            objects.push(&attrs[start..i]);
        }
    }
    objects
}

fn csv_cell(value: &str) -> String {
    if !value.contains([',', '"', '\\']) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '\\' || c == '"' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn file_started(&mut self, path: &Path, _nested: bool) {
        if self.is_test_mode() {
            let header = format!("\"{}\":\n", path.display());
            self.emit(&header);
        }
    }

    fn test_started(&mut self, name: &str, request: &Message) {
        self.current = name.to_string();
        if !self.is_test_mode() {
            return;
        }
        if self.verbosity > 0 {
            let mut dump = format!("    {}:\n", operation_name(request.code));
            dump.extend(request.attributes.iter().map(attribute_line));
            self.emit(&dump);
        }
        self.emit_test_line();
    }

    fn test_skipped(&mut self, _outcome: &TestOutcome) {
        if self.is_test_mode() {
            self.emit("SKIP]\n");
        }
    }

    fn repeat_progress(&mut self, attempt: u32, displayed: &[String], response: Option<&Message>) {
        if !self.is_test_mode() {
            return;
        }
        self.emit(&format!("{attempt:04}]\n"));
        if let Some(response) = response {
            self.emit_displayed(response, displayed);
        }
        self.emit_test_line();
    }

    fn test_finished(&mut self, outcome: &TestOutcome) {
        let response = outcome.response.as_ref();

        if self.is_test_mode() {
            let mut text = String::from(if outcome.passed { "PASS]\n" } else { "FAIL]\n" });
            if !outcome.passed || (self.verbosity > 0 && response.is_some()) {
                text.push_str(&format!(
                    "{DETAIL_INDENT}RECEIVED: {} bytes in response\n",
                    outcome.response_bytes
                ));
                text.push_str(&format!(
                    "{DETAIL_INDENT}status-code = {} ({})\n",
                    outcome.status, outcome.status_message
                ));
                if let Some(response) = response.filter(|_| self.verbosity > 0) {
                    text.extend(response.attributes.iter().map(attribute_line));
                }
            }
            self.emit(&text);
        } else if !outcome.passed && self.output != OutputMode::Quiet {
            eprintln!("{}", outcome.status_message);
        }

        let has_displayed = !outcome.displayed.is_empty();
        if outcome.passed && self.output.is_tabular() && self.verbosity == 0 && has_displayed {
            if let Some(response) = response {
                self.emit_table(response, &outcome.displayed);
            }
        } else if !outcome.passed && self.is_test_mode() {
            let errors: String = outcome
                .errors
                .iter()
                .map(|e| format!("{DETAIL_INDENT}{e}\n"))
                .collect();
            self.emit(&errors);
        }

        if has_displayed && self.verbosity == 0 && self.is_test_mode() {
            if let Some(response) = response {
                self.emit_displayed(response, &outcome.displayed);
            }
        }
    }

    fn pause(&mut self, message: &str) {
        self.emit(&format!("{message}\n---- PRESS ANY KEY ----"));
        wait_for_key();
        self.emit("\n");
    }

    fn fatal(&mut self, error: &IppTestError) {
        eprintln!("ipptest: {error}");
    }

    fn summary(&mut self, counters: &Counters) {
        if self.is_test_mode() && counters.tests > 1 {
            let text = format!(
                "\nSummary: {} tests, {} passed, {} failed, {} skipped\nScore: {}%\n",
                counters.tests,
                counters.passed,
                counters.failed,
                counters.skipped,
                counters.score()
            );
            self.emit(&text);
        }
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// One response attribute in the JSON report.
#[derive(Debug, Serialize)]
struct AttributeRecord {
    group: String,
    name: String,
    syntax: String,
    value: String,
}

impl AttributeRecord {
    fn from_attribute(attr: &Attribute) -> Option<Self> {
        Some(Self {
            group: attr.group.to_string(),
            name: attr.name()?.to_string(),
            syntax: attr.type_label(),
            value: attr.value_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct TestRecord {
    #[serde(flatten)]
    outcome: TestOutcome,
    response_attributes: Vec<AttributeRecord>,
}

#[derive(Debug, Serialize)]
struct FileRecord {
    path: String,
    nested: bool,
    tests: Vec<TestRecord>,
}

#[derive(Debug, Serialize)]
struct RunRecord<'a> {
    successful: bool,
    files: &'a [FileRecord],
    fatal_errors: &'a [String],
    summary: Counters,
    score: u32,
}

/// Collects the whole run and writes one JSON document at the end.
pub struct JsonReporter<W: Write> {
    out: W,
    files: Vec<FileRecord>,
    fatal: Vec<String>,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            files: Vec::new(),
            fatal: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn record(&mut self, outcome: &TestOutcome) {
        let response_attributes = outcome
            .response
            .iter()
            .flat_map(|m| m.attributes.iter())
            .filter_map(AttributeRecord::from_attribute)
            .collect();
        let record = TestRecord {
            outcome: outcome.clone(),
            response_attributes,
        };
        match self.files.last_mut() {
            Some(file) => file.tests.push(record),
            None => self.files.push(FileRecord {
                path: String::new(),
                nested: false,
                tests: vec![record],
            }),
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn file_started(&mut self, path: &Path, nested: bool) {
        self.files.push(FileRecord {
            path: path.display().to_string(),
            nested,
            tests: Vec::new(),
        });
    }

    fn test_started(&mut self, _name: &str, _request: &Message) {}

    fn test_skipped(&mut self, outcome: &TestOutcome) {
        self.record(outcome);
    }

    fn repeat_progress(&mut self, _attempt: u32, _displayed: &[String], _response: Option<&Message>) {}

    fn test_finished(&mut self, outcome: &TestOutcome) {
        self.record(outcome);
    }

    fn pause(&mut self, message: &str) {
        eprint!("{message}\n---- PRESS ANY KEY ----");
        wait_for_key();
        eprintln!();
    }

    fn fatal(&mut self, error: &IppTestError) {
        eprintln!("ipptest: {error}");
        self.fatal.push(error.to_string());
    }

    fn summary(&mut self, counters: &Counters) {
        let run = RunRecord {
            successful: counters.failed == 0 && self.fatal.is_empty(),
            files: &self.files,
            fatal_errors: &self.fatal,
            summary: *counters,
            score: counters.score(),
        };
        let written = serde_json::to_writer_pretty(&mut self.out, &run)
            .map_err(IppTestError::from)
            .and_then(|()| writeln!(self.out).map_err(IppTestError::from));
        if let Err(err) = written {
            warn!(error = %err, "unable to write JSON report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipptest_proto::message::MessageBuilder;
    use pretty_assertions::assert_eq;

    fn jobs_response() -> Message {
        MessageBuilder::new(0, 1)
            .standard_operation_attrs()
            .begin_group(GroupTag::JOB)
            .integer("job-id", 1)
            .keyword("job-state-reasons", "none")
            .text("job-name", "a, b")
            .begin_group(GroupTag::JOB)
            .integer("job-id", 22)
            .keyword("job-state-reasons", "job-printing")
            .build()
    }

    fn outcome(passed: bool) -> TestOutcome {
        TestOutcome {
            name: "Get-Jobs".into(),
            operation: "Get-Jobs".into(),
            passed,
            status: "successful-ok".into(),
            status_message: "successful-ok".into(),
            response: Some(jobs_response()),
            response_bytes: 120,
            attempts: 1,
            ..Default::default()
        }
    }

    fn console(output: OutputMode, verbosity: u8) -> ConsoleReporter<Vec<u8>> {
        ConsoleReporter::new(Vec::new(), output, verbosity)
    }

    fn text(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).expect("utf-8")
    }

    #[test]
    fn test_mode_pass_line() {
        let mut r = console(OutputMode::Test, 0);
        r.file_started(Path::new("jobs.test"), false);
        r.test_started("Get-Jobs", &Message::new(0x000A, 1));
        r.test_finished(&outcome(true));
        assert_eq!(text(r), format!("\"jobs.test\":\n    {:<68} [PASS]\n", "Get-Jobs"));
    }

    #[test]
    fn test_mode_failure_details() {
        let mut r = console(OutputMode::Test, 0);
        r.test_started("Get-Jobs", &Message::new(0x000A, 1));
        let mut failed = outcome(false);
        failed.errors = vec!["EXPECTED: job-uri".into()];
        r.test_finished(&failed);
        assert_eq!(
            text(r),
            format!(
                "    {:<68} [FAIL]\n        RECEIVED: 120 bytes in response\n        status-code = successful-ok (successful-ok)\n        EXPECTED: job-uri\n",
                "Get-Jobs"
            )
        );
    }

    #[test]
    fn long_names_are_truncated_and_repeats_numbered() {
        let mut r = console(OutputMode::Test, 0);
        let name = "x".repeat(80);
        r.test_started(&name, &Message::new(0x000B, 1));
        r.repeat_progress(1, &["job-id".to_string()], Some(&jobs_response()));
        r.test_skipped(&TestOutcome::default());
        let line = format!("    {} [", "x".repeat(68));
        assert_eq!(
            text(r),
            format!("{line}0001]\n        job-id (integer) = 1\n        job-id (integer) = 22\n{line}SKIP]\n")
        );
    }

    #[test]
    fn list_mode_prints_a_table_per_object() {
        let mut r = console(OutputMode::List, 0);
        let mut done = outcome(true);
        done.displayed = vec!["job-id".into(), "job-state-reasons".into()];
        r.test_finished(&done);
        assert_eq!(
            text(r),
            "job-id job-state-reasons\n------ -----------------\n1      none             \n22     job-printing     \n"
        );
    }

    #[test]
    fn csv_mode_quotes_special_values() {
        let mut r = console(OutputMode::Csv, 0);
        let mut done = outcome(true);
        done.displayed = vec!["job-id".into(), "job-name".into()];
        r.test_finished(&done);
        assert_eq!(text(r), "job-id,job-name\n1,\"a, b\"\n22,\n");
    }

    #[test]
    fn summary_only_for_multiple_tests() {
        let mut r = console(OutputMode::Test, 0);
        r.summary(&Counters { tests: 1, passed: 1, failed: 0, skipped: 0 });
        r.summary(&Counters { tests: 4, passed: 2, failed: 1, skipped: 1 });
        assert_eq!(text(r), "\nSummary: 4 tests, 2 passed, 1 failed, 1 skipped\nScore: 75%\n");
    }

    #[test]
    fn quiet_mode_prints_nothing() {
        let mut r = console(OutputMode::Quiet, 0);
        r.file_started(Path::new("a.test"), false);
        r.test_started("a", &Message::new(0x000B, 1));
        r.test_finished(&outcome(true));
        r.summary(&Counters { tests: 2, passed: 2, failed: 0, skipped: 0 });
        assert_eq!(text(r), "");
    }

    #[test]
    fn json_document_groups_tests_by_file() {
        let mut r = JsonReporter::new(Vec::new());
        r.file_started(Path::new("jobs.test"), false);
        r.test_finished(&outcome(true));
        r.test_skipped(&TestOutcome {
            name: "Cancel".into(),
            passed: true,
            skipped: true,
            status: "skip".into(),
            ..Default::default()
        });
        r.summary(&Counters { tests: 2, passed: 1, failed: 0, skipped: 1 });

        let doc: serde_json::Value = serde_json::from_slice(&r.into_inner()).expect("valid JSON");
        assert_eq!(doc["successful"], true);
        assert_eq!(doc["score"], 100);
        assert_eq!(doc["summary"]["tests"], 2);
        let tests = doc["files"][0]["tests"].as_array().expect("tests");
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0]["name"], "Get-Jobs");
        assert_eq!(tests[0]["response_attributes"][2]["name"], "job-id");
        assert_eq!(tests[0]["response_attributes"][2]["group"], "job-attributes-tag");
        assert_eq!(tests[1]["skipped"], true);
        assert!(tests[0].get("response").is_none());
    }
}
