// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reporter interface between the interpreter and whatever renders results.
//
// The session calls these hooks in order: `file_started`, then per test
// `test_started` followed by `repeat_progress` zero or more times and one of
// `test_skipped` / `test_finished`, and finally `summary` once per run.

use std::path::Path;

use serde::Serialize;

use ipptest_core::error::IppTestError;
use ipptest_core::types::Counters;
use ipptest_proto::message::Message;

/// Everything known about a test once it is finished.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestOutcome {
    pub name: String,
    pub test_id: Option<String>,
    pub file_id: Option<String>,
    /// Symbolic operation name.
    pub operation: String,
    pub request_id: i32,
    pub passed: bool,
    pub skipped: bool,
    /// Symbolic IPP status of the final attempt.
    pub status: String,
    pub status_message: String,
    /// Failure details in report order.
    pub errors: Vec<String>,
    /// Response of the final attempt, when one arrived.
    #[serde(skip)]
    pub response: Option<Message>,
    /// DISPLAY attribute names.
    pub displayed: Vec<String>,
    /// Encoded size of the response.
    pub response_bytes: usize,
    pub attempts: u32,
}

/// Renders the progress and results of a run.
pub trait Reporter {
    /// A script file is about to run. `nested` is true for INCLUDEd files.
    fn file_started(&mut self, path: &Path, nested: bool);

    /// A test is about to send `request` (or be skipped).
    fn test_started(&mut self, name: &str, request: &Message);

    fn test_skipped(&mut self, outcome: &TestOutcome);

    /// An attempt asked for a repeat; `response` is the one being discarded.
    fn repeat_progress(&mut self, attempt: u32, displayed: &[String], response: Option<&Message>);

    fn test_finished(&mut self, outcome: &TestOutcome);

    /// A PAUSE directive. Returns once the operator continues.
    fn pause(&mut self, message: &str);

    /// A script error ended a file.
    fn fatal(&mut self, error: &IppTestError);

    fn summary(&mut self, counters: &Counters);
}

// ---------------------------------------------------------------------------
// Recording reporter
// ---------------------------------------------------------------------------

/// One reporter call, as captured by [`RecordingReporter`].
#[derive(Debug, Clone)]
pub enum ReportEvent {
    FileStarted { path: String, nested: bool },
    TestStarted(String),
    Skipped(TestOutcome),
    Repeat(u32),
    Finished(TestOutcome),
    Pause(String),
    Fatal(String),
    Summary(Counters),
}

/// Reporter that keeps every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished and skipped outcomes, in order.
    pub fn outcomes(&self) -> Vec<&TestOutcome> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Finished(outcome) | ReportEvent::Skipped(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    pub fn fatal_messages(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Fatal(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn repeats(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, ReportEvent::Repeat(_)))
            .count()
    }
}

impl Reporter for RecordingReporter {
    fn file_started(&mut self, path: &Path, nested: bool) {
        self.events.push(ReportEvent::FileStarted {
            path: path.display().to_string(),
            nested,
        });
    }

    fn test_started(&mut self, name: &str, _request: &Message) {
        self.events.push(ReportEvent::TestStarted(name.to_string()));
    }

    fn test_skipped(&mut self, outcome: &TestOutcome) {
        self.events.push(ReportEvent::Skipped(outcome.clone()));
    }

    fn repeat_progress(&mut self, attempt: u32, _displayed: &[String], _response: Option<&Message>) {
        self.events.push(ReportEvent::Repeat(attempt));
    }

    fn test_finished(&mut self, outcome: &TestOutcome) {
        self.events.push(ReportEvent::Finished(outcome.clone()));
    }

    fn pause(&mut self, message: &str) {
        self.events.push(ReportEvent::Pause(message.to_string()));
    }

    fn fatal(&mut self, error: &IppTestError) {
        self.events.push(ReportEvent::Fatal(error.to_string()));
    }

    fn summary(&mut self, counters: &Counters) {
        self.events.push(ReportEvent::Summary(*counters));
    }
}
