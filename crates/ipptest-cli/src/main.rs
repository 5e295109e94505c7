// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ipptest: run IPP conformance test scripts against a printer or server.
//
// Usage: ipptest [options] URI file...
//
// Exits 0 when every test in every file passed.

mod report;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ipptest_core::config::RunConfig;
use ipptest_core::error::{IppTestError, Result};
use ipptest_core::types::{AddressFamily, DocumentType, IppVersion, OutputMode, Transfer};
use ipptest_engine::reporter::Reporter;
use ipptest_engine::session::{Session, locate_script};
use ipptest_engine::vars::Variables;
use ipptest_proto::transport::{HttpTransport, Transport};
use ipptest_proto::uri::UriParts;

use report::{ConsoleReporter, JsonReporter};

/// Command-line options. Anything left unset keeps the value from
/// `--config` or the built-in default.
#[derive(Debug, Parser)]
#[command(
    name = "ipptest",
    about = "IPP conformance tester: sends the requests in test scripts and checks the responses",
    disable_help_flag = true
)]
struct Cli {
    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    // -- Output --
    /// Produce a test report (the default).
    #[arg(short = 't', group = "output")]
    test: bool,

    /// Produce a list of DISPLAY attributes.
    #[arg(short = 'l', group = "output")]
    list: bool,

    /// Produce CSV output of DISPLAY attributes.
    #[arg(short = 'c', group = "output")]
    csv: bool,

    /// Be quiet and produce only the exit status.
    #[arg(short = 'q', group = "output")]
    quiet: bool,

    /// Produce a JSON report.
    #[arg(long, group = "output")]
    json: bool,

    /// Show request and response attributes; repeat for debug logging.
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    // -- Test behaviour --
    /// Ignore errors and keep running each file.
    #[arg(short = 'I')]
    ignore_errors: bool,

    /// Stop a file when one of its INCLUDEs fails.
    #[arg(long)]
    stop_after_include_error: bool,

    /// Validate HTTP response headers.
    #[arg(short = 'h')]
    validate_headers: bool,

    /// Send requests using chunking.
    #[arg(short = 'C', group = "transfer")]
    chunked: bool,

    /// Send requests using content-length.
    #[arg(short = 'L', group = "transfer")]
    length: bool,

    /// Default IPP version (1.0, 1.1, 2.0, 2.1 or 2.2).
    #[arg(short = 'V', value_name = "VERSION")]
    ipp_version: Option<String>,

    /// Request timeout in seconds.
    #[arg(short = 'T', value_name = "SECONDS")]
    timeout: Option<f64>,

    /// Connect using IPv4 only.
    #[arg(short = '4', group = "family")]
    ipv4: bool,

    /// Connect using IPv6 only.
    #[arg(short = '6', group = "family")]
    ipv6: bool,

    // -- Variables --
    /// Define a variable.
    #[arg(short = 'd', value_name = "NAME=VALUE")]
    defines: Vec<String>,

    /// Default document file for FILE $filename.
    #[arg(short = 'f', value_name = "FILENAME")]
    file: Option<PathBuf>,

    // -- Repetition --
    /// Repeat the last file this many times in total (with -i).
    #[arg(short = 'n', value_name = "COUNT")]
    repeat: Option<u32>,

    /// Repeat the last file every SECONDS.
    #[arg(short = 'i', value_name = "SECONDS")]
    interval: Option<f64>,

    /// Load settings from a JSON file before applying options.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Printer or server URI.
    uri: String,

    /// Test scripts to run in order.
    #[arg(required = true)]
    files: Vec<String>,
}

impl Cli {
    fn output(&self) -> Option<OutputMode> {
        [
            (self.test, OutputMode::Test),
            (self.list, OutputMode::List),
            (self.csv, OutputMode::Csv),
            (self.quiet, OutputMode::Quiet),
            (self.json, OutputMode::Json),
        ]
        .into_iter()
        .find_map(|(set, mode)| set.then_some(mode))
    }
}

/// Merge the configuration file, environment and options.
fn build_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    }
    .with_env();

    if let Some(output) = cli.output() {
        config.output = output;
    }
    config.verbosity = config.verbosity.max(cli.verbose);
    config.ignore_errors |= cli.ignore_errors;
    config.stop_after_include_error |= cli.stop_after_include_error;
    config.validate_headers |= cli.validate_headers;
    if cli.chunked {
        config.default_transfer = Transfer::Chunked;
    } else if cli.length {
        config.default_transfer = Transfer::Length;
    }
    if let Some(version) = &cli.ipp_version {
        config.default_version = IppVersion::parse(version)
            .ok_or_else(|| IppTestError::Config(format!("Bad version {version} for \"-V\"")))?;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = Some(timeout);
    }
    if cli.ipv4 {
        config.family = AddressFamily::Ipv4;
    } else if cli.ipv6 {
        config.family = AddressFamily::Ipv6;
    }
    if let Some(count) = cli.repeat {
        config.repeat_count = count;
    }
    if let Some(interval) = cli.interval {
        if !(interval.is_finite() && interval > 0.0) {
            return Err(IppTestError::Config(format!("Invalid seconds {interval} for \"-i\"")));
        }
        config.repeat_interval_secs = interval;
    }

    config.check()?;
    Ok(config)
}

/// `name=value`, or `name` alone for an empty value.
fn split_define(define: &str) -> (&str, &str) {
    define.split_once('=').unwrap_or((define, ""))
}

/// Bind `filename` and `filetype` for `-f`, looking in the installed test
/// directory when the file is not found as given.
fn set_document(vars: &mut Variables, file: &Path, data_dir: &Path) {
    let path = if file.exists() || file.is_absolute() {
        file.to_path_buf()
    } else {
        let installed = data_dir.join("ipptest").join(file);
        if installed.exists() { installed } else { file.to_path_buf() }
    };
    vars.set("filename", path.display().to_string());
    vars.set("filetype", DocumentType::from_path(&path).mime_type());
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Resolves on SIGINT or SIGTERM. Returns false when no handler could be
/// installed.
#[cfg(unix)]
async fn shutdown_signal() -> bool {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "unable to listen for SIGTERM");
            return tokio::signal::ctrl_c().await.is_ok();
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.is_ok(),
        _ = terminate.recv() => true,
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}

fn install_cancel_handler(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if shutdown_signal().await {
            info!("cancel requested; stopping after the current request");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

/// Run one file; script errors were already reported by the session.
async fn run_one<T: Transport, R: Reporter>(session: &mut Session<T, R>, path: &Path) -> bool {
    match session.run_file(path).await {
        Ok(passed) => passed,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "file aborted");
            false
        }
    }
}

/// Run every file in order, then repeat the last one as configured, and
/// report the summary. Returns whether everything passed.
async fn run_files<T: Transport, R: Reporter>(
    session: &mut Session<T, R>,
    files: &[PathBuf],
    config: &RunConfig,
) -> bool {
    let mut passed = true;
    for path in files {
        if session.is_cancelled() {
            break;
        }
        passed &= run_one(session, path).await;
    }

    if let Some(last) = files.last().filter(|_| config.repeat_interval_secs > 0.0) {
        let interval = Duration::from_secs_f64(config.repeat_interval_secs);
        let mut remaining = config.repeat_count.saturating_sub(1);
        let forever = config.repeat_count == 0;
        while (forever || remaining > 0) && !session.is_cancelled() {
            tokio::time::sleep(interval).await;
            if session.is_cancelled() {
                break;
            }
            passed &= run_one(session, last).await;
            remaining = remaining.saturating_sub(1);
        }
    }

    session.finish();
    passed
}

async fn run(cli: Cli) -> Result<bool> {
    let config = build_config(&cli)?;

    let mut vars = Variables::new();
    for define in &cli.defines {
        let (name, value) = split_define(define);
        vars.set(name, value);
    }
    vars.set_uri(&cli.uri)?;
    if let Some(file) = &cli.file {
        set_document(&mut vars, file, &config.data_dir);
    }

    let uri = UriParts::parse(&cli.uri)?;
    let timeout = config.timeout_secs.map(Duration::from_secs_f64);
    let transport = HttpTransport::new(&uri, config.family, timeout)?;

    let cancel = Arc::new(AtomicBool::new(false));
    install_cancel_handler(Arc::clone(&cancel));

    let files: Vec<PathBuf> = cli
        .files
        .iter()
        .map(|name| locate_script(name, &config.data_dir))
        .collect();
    info!(uri = %cli.uri, files = files.len(), output = ?config.output, "starting run");

    let passed = if config.output == OutputMode::Json {
        let reporter = JsonReporter::new(io::stdout());
        let mut session = Session::new(config.clone(), vars, transport, reporter).with_cancel_flag(cancel);
        run_files(&mut session, &files, &config).await
    } else {
        let reporter = ConsoleReporter::new(io::stdout(), config.output, config.verbosity);
        let mut session = Session::new(config.clone(), vars, transport, reporter).with_cancel_flag(cancel);
        run_files(&mut session, &files, &config).await
    };
    Ok(passed)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "run aborted");
            eprintln!("ipptest: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipptest_engine::reporter::RecordingReporter;
    use ipptest_proto::message::MessageBuilder;
    use ipptest_proto::transport::MockTransport;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments parse")
    }

    #[test]
    fn options_override_defaults() {
        let cli = parse(&[
            "ipptest", "-l", "-v", "-v", "-I", "-h", "-C", "-V", "2.0", "-T", "5", "-4", "-n", "3", "-i",
            "0.5", "ipp://printer.local/ipp/print", "get.test",
        ]);
        let config = build_config(&cli).expect("config");
        assert_eq!(config.output, OutputMode::List);
        assert_eq!(config.verbosity, 2);
        assert!(config.ignore_errors && config.validate_headers);
        assert_eq!(config.default_transfer, Transfer::Chunked);
        assert_eq!(config.default_version, IppVersion::V2_0);
        assert_eq!(config.timeout_secs, Some(5.0));
        assert_eq!(config.family, AddressFamily::Ipv4);
        assert_eq!(config.repeat_count, 3);
        assert_eq!(config.repeat_interval_secs, 0.5);
    }

    #[test]
    fn bad_option_values_are_config_errors() {
        let cli = parse(&["ipptest", "-V", "3.0", "ipp://p/", "a.test"]);
        assert!(matches!(build_config(&cli), Err(IppTestError::Config(_))));

        let cli = parse(&["ipptest", "-i", "0", "ipp://p/", "a.test"]);
        assert!(matches!(build_config(&cli), Err(IppTestError::Config(_))));

        assert!(Cli::try_parse_from(["ipptest", "-t", "-c", "ipp://p/", "a.test"]).is_err());
        assert!(Cli::try_parse_from(["ipptest", "ipp://p/"]).is_err());
    }

    #[test]
    fn config_file_then_options() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"output": "csv", "ignore_errors": true}}"#).expect("write");
        let path = file.path().display().to_string();

        let config = build_config(&parse(&["ipptest", "--config", &path, "ipp://p/", "a.test"])).expect("config");
        assert_eq!(config.output, OutputMode::Csv);
        assert!(config.ignore_errors);

        let config =
            build_config(&parse(&["ipptest", "--config", &path, "--json", "ipp://p/", "a.test"])).expect("config");
        assert_eq!(config.output, OutputMode::Json);
    }

    #[test]
    fn defines_split_on_first_equals() {
        assert_eq!(split_define("name=a=b"), ("name", "a=b"));
        assert_eq!(split_define("flag"), ("flag", ""));
    }

    #[test]
    fn document_variables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc = dir.path().join("page.pdf");
        std::fs::write(&doc, b"%PDF-1.7").expect("write");

        let mut vars = Variables::new();
        set_document(&mut vars, &doc, Path::new("/nonexistent"));
        assert_eq!(vars.get("filename"), Some(doc.display().to_string().as_str()));
        assert_eq!(vars.get("filetype"), Some("application/pdf"));
    }

    #[tokio::test]
    async fn repeats_last_file_and_reports_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("first.test");
        let last = dir.path().join("last.test");
        std::fs::write(&first, "{ OPERATION Get-Printer-Attributes }\n").expect("write");
        std::fs::write(&last, "{ OPERATION Get-Jobs STATUS successful-ok }\n").expect("write");

        let mut transport = MockTransport::new();
        for _ in 0..4 {
            transport.reply(MessageBuilder::new(0, 0).standard_operation_attrs().build());
        }
        let config = RunConfig {
            repeat_count: 3,
            repeat_interval_secs: 0.001,
            ..RunConfig::default()
        };
        let mut vars = Variables::new();
        vars.set_uri("ipp://printer.local/ipp/print").expect("uri");
        let mut session = Session::new(config.clone(), vars, transport, RecordingReporter::new());

        let passed = run_files(&mut session, &[first, last], &config).await;
        assert!(passed);
        assert_eq!(session.counters().tests, 4);
        assert_eq!(session.transport().remaining(), 0);
        assert!(matches!(
            session.reporter().events.last(),
            Some(ipptest_engine::reporter::ReportEvent::Summary(c)) if c.passed == 4
        ));
    }

    #[tokio::test]
    async fn missing_file_fails_but_later_files_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.test");
        std::fs::write(&good, "{ OPERATION Get-Jobs }\n").expect("write");

        let mut transport = MockTransport::new();
        transport.reply(MessageBuilder::new(0, 0).standard_operation_attrs().build());
        let config = RunConfig::default();
        let mut session = Session::new(config.clone(), Variables::new(), transport, RecordingReporter::new());

        let files = [dir.path().join("missing.test"), good];
        assert!(!run_files(&mut session, &files, &config).await);
        assert_eq!(session.counters().tests, 1);
        assert_eq!(session.reporter().fatal_messages().len(), 1);
    }
}
