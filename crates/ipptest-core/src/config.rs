// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IppTestError, Result};
use crate::types::{AddressFamily, IppVersion, OutputMode, Transfer};

/// Environment variable that overrides the installed data directory.
pub const DATADIR_ENV: &str = "IPPTEST_DATADIR";

/// Data directory used when neither the config nor the environment sets one.
pub const DEFAULT_DATADIR: &str = "/usr/share/cups";

/// Settings for one invocation of the tester.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Output format for results.
    pub output: OutputMode,
    /// Verbosity level; above zero, responses are shown for passing tests too.
    pub verbosity: u8,
    /// Keep running a script after a failed test.
    pub ignore_errors: bool,
    /// Stop a script when one of its INCLUDEs failed.
    pub stop_after_include_error: bool,
    /// Check the HTTP Content-Type and Date response headers.
    pub validate_headers: bool,
    /// Body framing used when a script does not set TRANSFER.
    pub default_transfer: Transfer,
    /// IPP version used when a script does not set VERSION.
    pub default_version: IppVersion,
    /// Per-request timeout in seconds; the transport default when unset.
    pub timeout_secs: Option<f64>,
    /// Address family used to resolve the target host.
    pub family: AddressFamily,
    /// Root for `<name>` path lookups (`<data_dir>/ipptest/<name>`).
    pub data_dir: PathBuf,
    /// Total runs of the last script file when a repeat interval is set;
    /// zero repeats until cancelled.
    pub repeat_count: u32,
    /// Seconds to wait between repeated runs of the last file.
    pub repeat_interval_secs: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output: OutputMode::Test,
            verbosity: 0,
            ignore_errors: false,
            stop_after_include_error: false,
            validate_headers: false,
            default_transfer: Transfer::Auto,
            default_version: IppVersion::V1_1,
            timeout_secs: None,
            family: AddressFamily::Any,
            data_dir: PathBuf::from(DEFAULT_DATADIR),
            repeat_count: 0,
            repeat_interval_secs: 0.0,
        }
    }
}

impl RunConfig {
    /// Load settings from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.check()?;
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Some(dir) = std::env::var_os(DATADIR_ENV).filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Reject values no run could use.
    pub fn check(&self) -> Result<()> {
        if let Some(t) = self.timeout_secs.filter(|t| !(t.is_finite() && *t > 0.0)) {
            return Err(IppTestError::Config(format!(
                "timeout must be a positive number of seconds, got {t}"
            )));
        }
        if !(self.repeat_interval_secs.is_finite() && self.repeat_interval_secs >= 0.0) {
            return Err(IppTestError::Config(format!(
                "repeat interval must not be negative, got {}",
                self.repeat_interval_secs
            )));
        }
        if !self.default_version.is_checked() {
            return Err(IppTestError::Config(
                "default IPP version must be one of 1.0, 1.1, 2.0, 2.1, 2.2".into(),
            ));
        }
        Ok(())
    }
}
