// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for ipptest.

use thiserror::Error;

/// Top-level error type for all ipptest operations.
///
/// Test outcome failures (a status mismatch, a missing attribute) are never
/// errors: they are collected into a verdict. This type covers everything
/// that stops a run or a request from happening at all.
#[derive(Debug, Error)]
pub enum IppTestError {
    // -- Script errors --
    #[error("{message} on line {line} of \"{file}\".")]
    Script {
        message: String,
        file: String,
        line: usize,
    },

    // -- Protocol errors --
    #[error("malformed IPP message: {0}")]
    Codec(String),

    #[error("IPP transport failed: {0}")]
    Transport(String),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    // -- Configuration --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cancelled")]
    Cancelled,
}

impl IppTestError {
    /// Build a script error carrying the file name and 1-based line number.
    pub fn script(message: impl Into<String>, file: impl Into<String>, line: usize) -> Self {
        Self::Script {
            message: message.into(),
            file: file.into(),
            line,
        }
    }

    /// Script errors abort the whole invocation; everything else is a
    /// run-time failure.
    pub fn is_script_error(&self) -> bool {
        matches!(self, Self::Script { .. })
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, IppTestError>;
