// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Script interpreter.
//
// A session owns everything shared by the scripts of one run: the variable
// table, the transport, the reporter and the cumulative counters. Each
// script file gets fresh per-file state; INCLUDE runs a nested file against
// the same session. Tests execute as soon as their closing brace is read,
// so a script error stops the file before any later test runs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use ipptest_core::config::RunConfig;
use ipptest_core::error::{IppTestError, Result};
use ipptest_core::types::{Counters, IppVersion, Transfer};
use ipptest_proto::tags::{GroupTag, STATUS_INTERNAL_ERROR, operation_code, operation_name, status_code};
use ipptest_proto::transport::{Exchange, Request, Transport};

use crate::descriptor::{ExpectRecord, StatusRecord, TestDescriptor, ValueConstraint, with_directive_name};
use crate::directive::{Attachment, Directive};
use crate::literal::{LiteralReader, parse_int};
use crate::repeat::{RepeatController, RepeatState};
use crate::reporter::{Reporter, TestOutcome};
use crate::tokenizer::{Token, Tokenizer};
use crate::validator::{CheckSettings, Verdict, status_of, validate};
use crate::vars::Variables;

/// Request id seed in the style of the classic tester: a multiple of 137
/// plus one, below 137000.
pub fn random_request_id() -> i32 {
    let bucket = (Uuid::new_v4().as_u128() % 1000) as i32;
    bucket * 137 + 1
}

/// Map a FILE, SKIP-IF-MISSING or INCLUDE argument to a path.
///
/// `<name>` is looked up under `data_dir/ipptest/`. Absolute and directly
/// readable paths are used as given; anything else is relative to the
/// directory of `script`.
pub fn resolve_path(script: &Path, name: &str, data_dir: &Path) -> PathBuf {
    if let Some(inner) = name.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        return data_dir.join("ipptest").join(inner);
    }
    let path = Path::new(name);
    if path.is_absolute() || is_readable(path) {
        return path.to_path_buf();
    }
    match script.parent() {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

/// Locate a script named on the command line, falling back to the
/// installed test directory.
pub fn locate_script(name: &str, data_dir: &Path) -> PathBuf {
    let path = Path::new(name);
    if path.exists() || path.is_absolute() {
        return path.to_path_buf();
    }
    let installed = data_dir.join("ipptest").join(name);
    if installed.exists() { installed } else { path.to_path_buf() }
}

fn is_readable(path: &Path) -> bool {
    std::fs::File::open(path).is_ok()
}

/// Parse `secs[,interval]` for DELAY.
fn parse_delay(value: &str) -> Option<(Duration, Option<Duration>)> {
    let (delay, interval) = match value.split_once(',') {
        Some((delay, interval)) => (delay, Some(interval)),
        None => (value, None),
    };
    let delay: f64 = delay.trim().parse().ok()?;
    if !delay.is_finite() || delay < 0.0 {
        return None;
    }
    let interval = match interval {
        Some(text) => {
            let secs: f64 = text.trim().parse().ok()?;
            if !secs.is_finite() || secs <= 0.0 {
                return None;
            }
            Some(Duration::from_secs_f64(secs))
        }
        None => None,
    };
    Some((Duration::from_secs_f64(delay), interval))
}

/// Leading decimal digits, as `atoi` reads them.
fn leading_digits(s: &str) -> i64 {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().unwrap_or(0)
}

/// Next token's text or a script error.
fn argument(tok: &mut Tokenizer, missing: &str) -> Result<String> {
    match tok.next_token()? {
        Some(token) => Ok(token.text),
        None => Err(tok.error(missing)),
    }
}

/// A `yes`/`no` argument.
fn yes_no(tok: &mut Tokenizer, missing: &str) -> Result<bool> {
    match tok.next_token()? {
        Some(token) if token.text.eq_ignore_ascii_case("yes") => Ok(true),
        Some(token) if token.text.eq_ignore_ascii_case("no") => Ok(false),
        _ => Err(tok.error(missing)),
    }
}

/// A WITH-* value: the first token plus any `,`-joined continuations.
fn with_value_text(tok: &mut Tokenizer) -> Result<Option<String>> {
    let Some(first) = tok.next_token()? else {
        return Ok(None);
    };
    let mut value = first.text;
    while tok.peek()?.is_some_and(|t| t.is(',')) {
        tok.next_token()?;
        value.push(',');
        match tok.next_token()? {
            Some(next) => value.push_str(&next.text),
            None => break,
        }
    }
    Ok(Some(value))
}

/// Drop each backslash that escapes a following character.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn directive_of(token: &Token) -> Option<Directive> {
    Directive::lookup(&token.text)
        .filter(|d| !token.quoted || !matches!(d, Directive::OpenTest | Directive::CloseTest))
}

fn unexpected(tok: &Tokenizer, token: &Token) -> IppTestError {
    tok.error(format!("Unexpected token {} seen", token.text))
}

// ---------------------------------------------------------------------------
// Per-file state
// ---------------------------------------------------------------------------

/// What to do after a directive.
enum Flow {
    Continue,
    Stop,
}

/// Bookkeeping that belongs to one script file.
#[derive(Debug)]
struct FileState {
    path: PathBuf,
    nested: bool,
    /// Every test so far passed.
    pass: bool,
    /// The most recent test passed.
    prev_pass: bool,
    show_header: bool,
    default_ignore_errors: bool,
    default_transfer: Transfer,
    default_version: IppVersion,
    stop_after_include_error: bool,
    skip_rest: bool,
    file_id: Option<String>,
}

impl FileState {
    fn new(path: PathBuf, nested: bool, config: &RunConfig) -> Self {
        Self {
            path,
            nested,
            pass: true,
            prev_pass: true,
            show_header: true,
            default_ignore_errors: config.ignore_errors,
            default_transfer: config.default_transfer,
            default_version: config.default_version,
            stop_after_include_error: config.stop_after_include_error,
            skip_rest: false,
            file_id: None,
        }
    }

    /// Test name used until NAME sets one.
    fn default_test_name(&self) -> String {
        self.path.with_extension("").display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Runs test scripts against one target.
pub struct Session<T: Transport, R: Reporter> {
    config: RunConfig,
    vars: Variables,
    transport: T,
    reporter: R,
    cancel: Arc<AtomicBool>,
    counters: Counters,
    request_id: i32,
}

impl<T: Transport, R: Reporter> Session<T, R> {
    pub fn new(config: RunConfig, vars: Variables, transport: T, reporter: R) -> Self {
        Self {
            config,
            vars,
            transport,
            reporter,
            cancel: Arc::new(AtomicBool::new(false)),
            counters: Counters::default(),
            request_id: random_request_id(),
        }
    }

    /// Use `flag` for cooperative cancellation; setting it stops the run
    /// before the next attempt.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Start request ids after `id`.
    pub fn with_request_id(mut self, id: i32) -> Self {
        self.request_id = id;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.vars
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Report the cumulative counters.
    pub fn finish(&mut self) {
        self.reporter.summary(&self.counters);
    }

    /// Run one top-level script. Returns whether every test passed (or was
    /// ignored). A script error is reported and returned.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn run_file(&mut self, path: &Path) -> Result<bool> {
        match self.run_script(path.to_path_buf(), false).await {
            Ok(passed) => {
                info!(passed, tests = self.counters.tests, "script finished");
                Ok(passed)
            }
            Err(err) => {
                self.reporter.fatal(&err);
                Err(err)
            }
        }
    }

    fn run_script(&mut self, path: PathBuf, nested: bool) -> Pin<Box<dyn Future<Output = Result<bool>> + '_>> {
        Box::pin(async move {
            let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
                IppTestError::Config(format!("Unable to open test file \"{}\": {e}", path.display()))
            })?;
            debug!(path = %path.display(), nested, "running script");

            let mut tok = Tokenizer::new(path.display().to_string(), &source);
            let mut state = FileState::new(path, nested, &self.config);
            let mut open: Option<TestDescriptor> = None;
            let mut attach = Attachment::None;

            while let Some(token) = tok.next_token()? {
                if self.is_cancelled() {
                    return Ok(false);
                }
                let directive = directive_of(&token);

                let Some(test) = open.as_mut() else {
                    match directive {
                        Some(Directive::OpenTest) => {
                            open = Some(self.open_test(&mut state));
                            attach = Attachment::None;
                        }
                        Some(d) if d.is_global() => {
                            if let Flow::Stop = self.global_directive(d, &mut tok, &mut state).await? {
                                break;
                            }
                        }
                        _ => return Err(unexpected(&tok, &token)),
                    }
                    continue;
                };

                let Some(directive) = directive else {
                    return Err(unexpected(&tok, &token));
                };
                attach = attach.retained_after(directive);

                if directive == Directive::CloseTest {
                    let Some(test) = open.take() else { continue };
                    if !self.run_test(test, &mut state).await? {
                        break;
                    }
                    continue;
                }
                self.test_directive(directive, &token, test, &mut tok, &mut attach, &state)?;
            }

            if open.is_some() {
                return Err(tok.error("Unexpected end of file"));
            }
            Ok(state.pass)
        })
    }

    // -----------------------------------------------------------------------
    // Global directives
    // -----------------------------------------------------------------------

    fn open_test(&mut self, state: &mut FileState) -> TestDescriptor {
        if state.show_header {
            self.reporter.file_started(&state.path, state.nested);
            state.show_header = false;
        }

        self.request_id += 1;
        self.vars.refresh_date_current();

        let resource = self.vars.get("resource").unwrap_or("/").to_string();
        let mut test = TestDescriptor::new(state.default_test_name(), resource, self.request_id);
        test.version = state.default_version;
        test.transfer = state.default_transfer;
        test.ignore_errors = state.default_ignore_errors;
        test.file_id = state.file_id.clone();
        test.skip = state.skip_rest;
        test
    }

    async fn global_directive(&mut self, directive: Directive, tok: &mut Tokenizer, state: &mut FileState) -> Result<Flow> {
        match directive {
            Directive::Define | Directive::DefineDefault => self.define(directive, tok)?,
            Directive::FileId => {
                let value = argument(tok, "Missing FILE-ID value")?;
                self.vars.refresh_date_current();
                state.file_id = Some(self.vars.expand(&value));
            }
            Directive::IgnoreErrors => {
                state.default_ignore_errors = yes_no(tok, "Missing IGNORE-ERRORS value")?;
            }
            Directive::Include => {
                let target = argument(tok, "Missing INCLUDE filename")?;
                return self.include(state, &target).await;
            }
            Directive::IncludeIfDefined | Directive::IncludeIfNotDefined => {
                let missing = format!("Missing {} name or filename", directive.keyword());
                let name = argument(tok, &missing)?;
                let target = argument(tok, &missing)?;
                let wanted = directive == Directive::IncludeIfDefined;
                if self.vars.is_defined(&name) == wanted {
                    return self.include(state, &target).await;
                }
            }
            Directive::SkipIfDefined => {
                let name = argument(tok, "Missing SKIP-IF-DEFINED variable")?;
                state.skip_rest |= self.vars.is_defined(&name);
            }
            Directive::SkipIfNotDefined => {
                let name = argument(tok, "Missing SKIP-IF-NOT-DEFINED variable")?;
                state.skip_rest |= !self.vars.is_defined(&name);
            }
            Directive::StopAfterIncludeError => {
                state.stop_after_include_error = yes_no(tok, "Missing STOP-AFTER-INCLUDE-ERROR value")?;
            }
            Directive::Transfer => state.default_transfer = read_transfer(tok)?,
            Directive::Version => {
                let version = read_version(tok)?;
                if !version.is_checked() {
                    return Err(tok.error(format!("Bad VERSION \"{version}\"")));
                }
                state.default_version = version;
            }
            _ => return Err(tok.error(format!("Unexpected token {} seen", directive.keyword()))),
        }
        Ok(Flow::Continue)
    }

    fn define(&mut self, directive: Directive, tok: &mut Tokenizer) -> Result<()> {
        let missing = format!("Missing {} name and/or value", directive.keyword());
        let name = argument(tok, &missing)?;
        let value = argument(tok, &missing)?;
        if directive == Directive::DefineDefault && self.vars.is_defined(&name) {
            return Ok(());
        }
        self.vars.refresh_date_current();
        let value = self.vars.expand(&value);
        self.vars.set(name, value);
        Ok(())
    }

    async fn include(&mut self, state: &mut FileState, target: &str) -> Result<Flow> {
        let path = resolve_path(&state.path, target, &self.config.data_dir);
        // The nested run shares this session's transport and its kept-alive
        // connection; only the pass flags are per file.
        info!(include = %path.display(), "including script");

        let passed = match self.run_script(path, true).await {
            Ok(passed) => passed,
            Err(IppTestError::Cancelled) => return Err(IppTestError::Cancelled),
            Err(err) => {
                warn!(error = %err, "included script failed");
                self.reporter.fatal(&err);
                false
            }
        };

        state.show_header = true;
        if !passed && state.stop_after_include_error {
            state.pass = false;
            state.prev_pass = false;
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }

    // -----------------------------------------------------------------------
    // Test directives
    // -----------------------------------------------------------------------

    fn test_directive(
        &mut self,
        directive: Directive,
        token: &Token,
        test: &mut TestDescriptor,
        tok: &mut Tokenizer,
        attach: &mut Attachment,
        state: &FileState,
    ) -> Result<()> {
        match directive {
            Directive::Attr => {
                let attr = LiteralReader::new(tok, &self.vars).read_attribute(GroupTag::ZERO)?;
                test.push_attribute(attr);
            }
            Directive::Compression => {
                let value = self.vars.expand(&argument(tok, "Missing COMPRESSION value")?);
                if value != "none" {
                    return Err(tok.error(format!("Unsupported COMPRESSION value \"{value}\"")));
                }
            }
            Directive::Define | Directive::DefineDefault => self.define(directive, tok)?,
            Directive::Delay => {
                let value = self.vars.expand(&argument(tok, "Missing DELAY value")?);
                let (delay, interval) =
                    parse_delay(&value).ok_or_else(|| tok.error(format!("Bad DELAY value \"{value}\"")))?;
                test.delay = delay;
                test.repeat_interval = interval.unwrap_or(delay);
            }
            Directive::Display => test.displayed.push(argument(tok, "Missing DISPLAY name")?),
            Directive::File => {
                let value = self.vars.expand(&argument(tok, "Missing FILE filename")?);
                let path = resolve_path(&state.path, &value, &self.config.data_dir);
                if !is_readable(&path) {
                    return Err(tok.error(format!(
                        "Filename \"{value}\" (mapped to \"{}\") cannot be read",
                        path.display()
                    )));
                }
                test.document = Some(path);
            }
            Directive::Group => {
                let name = argument(tok, "Missing GROUP tag")?;
                let group = GroupTag::from_name(&name)
                    .filter(|g| *g != GroupTag::ZERO)
                    .ok_or_else(|| tok.error(format!("Bad GROUP tag \"{name}\"")))?;
                test.begin_group(group);
            }
            Directive::IgnoreErrors => test.ignore_errors = yes_no(tok, "Missing IGNORE-ERRORS value")?,
            Directive::Name => test.name = self.vars.expand(&argument(tok, "Missing NAME value")?),
            Directive::Operation => {
                let raw = argument(tok, "Missing OPERATION code")?;
                let value = self.vars.expand(&raw);
                let code = operation_code(&value)
                    .or_else(|| parse_int(&value).and_then(|n| u16::try_from(n).ok()).filter(|n| *n != 0))
                    .ok_or_else(|| tok.error(format!("Bad OPERATION code \"{raw}\"")))?;
                test.request.code = code;
            }
            Directive::Pause => {
                let message = argument(tok, "Missing PAUSE message")?;
                self.reporter.pause(&message);
            }
            Directive::RequestId => {
                let value = argument(tok, "Missing REQUEST-ID value")?;
                let id = if value.starts_with(|c: char| c.is_ascii_digit()) {
                    i32::try_from(leading_digits(&value))
                        .map_err(|_| tok.error(format!("Bad REQUEST-ID value \"{value}\"")))?
                } else if value.eq_ignore_ascii_case("random") {
                    random_request_id()
                } else {
                    return Err(tok.error(format!("Bad REQUEST-ID value \"{value}\"")));
                };
                self.request_id = id;
                test.request.request_id = id;
            }
            Directive::Resource => test.resource = argument(tok, "Missing RESOURCE path")?,
            Directive::SkipIfDefined => {
                let name = argument(tok, "Missing SKIP-IF-DEFINED value")?;
                test.skip |= self.vars.is_defined(&name);
            }
            Directive::SkipIfMissing => {
                let value = self.vars.expand(&argument(tok, "Missing SKIP-IF-MISSING filename")?);
                let path = resolve_path(&state.path, &value, &self.config.data_dir);
                test.skip |= !is_readable(&path);
            }
            Directive::SkipIfNotDefined => {
                let name = argument(tok, "Missing SKIP-IF-NOT-DEFINED value")?;
                test.skip |= !self.vars.is_defined(&name);
            }
            Directive::SkipPreviousError => {
                test.skip_previous_error = yes_no(tok, "Missing SKIP-PREVIOUS-ERROR value")?;
            }
            Directive::TestId => {
                test.test_id = Some(self.vars.expand(&argument(tok, "Missing TEST-ID value")?));
            }
            Directive::Transfer => test.transfer = read_transfer(tok)?,
            Directive::Version => test.version = read_version(tok)?,

            Directive::Status => {
                let value = argument(tok, "Missing STATUS code")?;
                let status = status_code(&value)
                    .or_else(|| parse_int(&value).and_then(|n| u16::try_from(n).ok()).filter(|n| *n != 0))
                    .ok_or_else(|| tok.error(format!("Bad STATUS code \"{value}\"")))?;
                test.statuses.push(StatusRecord::new(status));
                *attach = Attachment::Status(test.statuses.len() - 1);
            }
            Directive::Expect | Directive::ExpectAll => {
                let name = argument(tok, "Missing EXPECT name")?;
                test.expects
                    .push(ExpectRecord::new(&name, directive == Directive::ExpectAll));
                *attach = Attachment::Expect(test.expects.len() - 1);
            }

            _ if directive.is_expect_modifier() || directive.is_status_modifier() => {
                self.modifier(directive, test, tok, *attach)?;
            }
            _ => return Err(unexpected(tok, token)),
        }
        Ok(())
    }

    /// A directive that refines the most recent EXPECT or STATUS.
    fn modifier(&self, directive: Directive, test: &mut TestDescriptor, tok: &mut Tokenizer, attach: Attachment) -> Result<()> {
        let keyword = directive.keyword();
        let expect_only = format!("{keyword} without a preceding EXPECT");
        let either = format!("{keyword} without a preceding EXPECT or STATUS");

        let (expect, status) = match attach {
            Attachment::Expect(i) => (test.expects.get_mut(i), None),
            Attachment::Status(i) => (None, test.statuses.get_mut(i)),
            Attachment::None => (None, None),
        };

        match directive {
            Directive::Count => {
                let value = argument(tok, "Missing COUNT number")?;
                let count = leading_digits(&value);
                if count <= 0 {
                    return Err(tok.error(format!("Bad COUNT \"{value}\"")));
                }
                let expect = expect.ok_or_else(|| tok.error(expect_only.as_str()))?;
                expect.count = usize::try_from(count).ok();
            }
            Directive::DefineMatch | Directive::DefineNoMatch | Directive::IfDefined | Directive::IfNotDefined => {
                let what = match directive {
                    Directive::DefineMatch | Directive::DefineNoMatch => "variable",
                    _ => "name",
                };
                let name = argument(tok, &format!("Missing {keyword} {what}"))?;
                let slot = match (expect, status) {
                    (Some(e), _) => match directive {
                        Directive::DefineMatch => &mut e.define_match,
                        Directive::DefineNoMatch => &mut e.define_no_match,
                        Directive::IfDefined => &mut e.if_defined,
                        _ => &mut e.if_not_defined,
                    },
                    (None, Some(s)) => match directive {
                        Directive::DefineMatch => &mut s.define_match,
                        Directive::DefineNoMatch => &mut s.define_no_match,
                        Directive::IfDefined => &mut s.if_defined,
                        _ => &mut s.if_not_defined,
                    },
                    (None, None) => return Err(tok.error(either.as_str())),
                };
                *slot = Some(name);
            }
            Directive::DefineValue => {
                let name = argument(tok, "Missing DEFINE-VALUE variable")?;
                expect.ok_or_else(|| tok.error(expect_only.as_str()))?.define_value = Some(name);
            }
            Directive::InGroup => {
                let name = argument(tok, "Missing IN-GROUP group tag")?;
                let group = GroupTag::from_name(&name)
                    .filter(|g| *g != GroupTag::ZERO)
                    .ok_or_else(|| tok.error(format!("Bad IN-GROUP group tag \"{name}\"")))?;
                expect.ok_or_else(|| tok.error(expect_only.as_str()))?.in_group = Some(group);
            }
            Directive::OfType => {
                let spec = argument(tok, "Missing OF-TYPE value tag(s)")?;
                expect.ok_or_else(|| tok.error(expect_only.as_str()))?.of_type = Some(spec);
            }
            Directive::SameCountAs => {
                let name = argument(tok, "Missing SAME-COUNT-AS name")?;
                expect.ok_or_else(|| tok.error(expect_only.as_str()))?.same_count_as = Some(name);
            }
            Directive::RepeatLimit | Directive::RepeatMatch | Directive::RepeatNoMatch => {
                let limit = if directive == Directive::RepeatLimit {
                    let value = argument(tok, "Missing REPEAT-LIMIT value")?;
                    let limit = leading_digits(&value);
                    if limit <= 0 {
                        return Err(tok.error("Bad REPEAT-LIMIT value"));
                    }
                    Some(u32::try_from(limit).unwrap_or(u32::MAX))
                } else {
                    None
                };
                let rule = match (expect, status) {
                    (Some(e), _) => &mut e.repeat,
                    (None, Some(s)) => &mut s.repeat,
                    (None, None) => return Err(tok.error(either.as_str())),
                };
                match directive {
                    Directive::RepeatMatch => rule.on_match = true,
                    Directive::RepeatNoMatch => rule.on_no_match = true,
                    _ => rule.limit = limit.unwrap_or(rule.limit),
                }
            }
            Directive::With(quantifier, component) => {
                let name = with_directive_name(quantifier, component);
                let raw = with_value_text(tok)?.ok_or_else(|| tok.error(format!("Missing {name} value")))?;
                let expect = expect.ok_or_else(|| tok.error(format!("{name} without a preceding EXPECT")))?;
                if !expect.constraint.is_none() {
                    return Err(tok.error(format!("Only one value constraint allowed for EXPECT {}", expect.name)));
                }
                let value = self.vars.expand(&raw);
                expect.constraint = match value.strip_prefix('/').and_then(|v| v.strip_suffix('/')) {
                    Some(pattern) => {
                        let regex = Regex::new(pattern).map_err(|e| {
                            tok.error(format!("Unable to compile {name} regular expression \"{pattern}\" - {e}"))
                        })?;
                        ValueConstraint::Regex { regex, component }
                    }
                    None => ValueConstraint::Literal {
                        value: unescape(&value),
                        component,
                    },
                };
                expect.quantifier = quantifier;
            }
            Directive::WithValueFrom => {
                let raw = argument(tok, "Missing WITH-VALUE-FROM value")?;
                let expect = expect.ok_or_else(|| tok.error("WITH-VALUE-FROM without a preceding EXPECT"))?;
                if !expect.constraint.is_none() {
                    return Err(tok.error(format!("Only one value constraint allowed for EXPECT {}", expect.name)));
                }
                expect.constraint = ValueConstraint::ValueFrom(self.vars.expand(&raw));
            }
            _ => return Err(tok.error(format!("Unexpected token {keyword} seen"))),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Test execution
    // -----------------------------------------------------------------------

    /// Execute a closed test. Returns whether the file should continue.
    async fn run_test(&mut self, test: TestDescriptor, state: &mut FileState) -> Result<bool> {
        if self.is_cancelled() {
            return Ok(false);
        }

        self.counters.tests += 1;
        let message = test.finished_request();
        self.reporter.test_started(&test.name, &message);

        let mut outcome = TestOutcome {
            name: test.name.clone(),
            test_id: test.test_id.clone(),
            file_id: test.file_id.clone(),
            operation: operation_name(message.code),
            request_id: message.request_id,
            displayed: test.displayed.clone(),
            ..Default::default()
        };

        if test.skip || (test.skip_previous_error && !state.prev_pass) {
            self.counters.skipped += 1;
            outcome.passed = true;
            outcome.skipped = true;
            outcome.status = "skip".to_string();
            info!(test = %test.name, "skipped");
            self.reporter.test_skipped(&outcome);
            return Ok(true);
        }

        let request = Request {
            message,
            resource: test.resource.clone(),
            document: test.document.clone(),
            chunked: test.transfer.use_chunking(test.document.is_some()),
        };
        let settings = CheckSettings {
            output: self.config.output,
            validate_headers: self.config.validate_headers,
        };

        let mut repeat = RepeatController::new(test.delay, test.repeat_interval);
        let mut last: Option<(Exchange, Verdict)> = None;

        while repeat.should_attempt() {
            if self.is_cancelled() {
                repeat.stop();
                break;
            }
            let wait = repeat.begin_attempt();
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            state.prev_pass = true;
            let exchange = match self.transport.send(&request).await {
                Ok(exchange) => exchange,
                Err(err) => {
                    warn!(test = %test.name, error = %err, "request failed");
                    Exchange::failed(STATUS_INTERNAL_ERROR, err.to_string())
                }
            };
            if exchange.response.is_none() || exchange.http_status != 200 {
                state.prev_pass = false;
            }

            let verdict = validate(&test, settings, repeat.attempts(), &exchange, &mut self.vars);
            let again = verdict.repeat && !self.is_cancelled();
            if repeat.finish_attempt(again) == RepeatState::Repeat {
                let response = exchange.response.as_ref().map(|d| &d.message);
                self.reporter
                    .repeat_progress(repeat.attempts(), &test.displayed, response);
            }
            last = Some((exchange, verdict));
        }

        let Some((exchange, verdict)) = last else {
            return Ok(false);
        };

        if !verdict.passed() {
            state.prev_pass = false;
        }
        if !state.prev_pass {
            state.pass = false;
            self.counters.failed += 1;
        } else {
            self.counters.passed += 1;
        }

        let (status, status_message) = status_of(&exchange);
        outcome.passed = state.prev_pass;
        outcome.status = status;
        outcome.status_message = status_message;
        outcome.errors = verdict.errors;
        outcome.attempts = repeat.attempts();
        if let Some(decoded) = exchange.response {
            outcome.response_bytes = decoded.length;
            outcome.response = Some(decoded.message);
        }

        if outcome.passed {
            info!(test = %outcome.name, attempts = outcome.attempts, "passed");
        } else {
            warn!(test = %outcome.name, errors = outcome.errors.len(), "failed");
        }
        self.reporter.test_finished(&outcome);

        Ok(test.ignore_errors || state.prev_pass)
    }
}

fn read_transfer(tok: &mut Tokenizer) -> Result<Transfer> {
    let value = argument(tok, "Missing TRANSFER value")?;
    Transfer::parse(&value).ok_or_else(|| tok.error(format!("Bad TRANSFER value \"{value}\"")))
}

/// VERSION argument; `0.0` turns off the response version check.
fn read_version(tok: &mut Tokenizer) -> Result<IppVersion> {
    let value = argument(tok, "Missing VERSION number")?;
    if value == "0.0" {
        return Ok(IppVersion::UNCHECKED);
    }
    IppVersion::parse(&value).ok_or_else(|| tok.error(format!("Bad VERSION \"{value}\"")))
}
