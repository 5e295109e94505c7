// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ipptest-engine: reads test scripts, sends the requests they describe and
// judges the responses.

pub mod descriptor;
pub mod directive;
pub mod literal;
pub mod matcher;
pub mod repeat;
pub mod reporter;
pub mod session;
pub mod tokenizer;
pub mod validator;
pub mod vars;

pub use descriptor::{ExpectRecord, StatusRecord, TestDescriptor};
pub use reporter::{RecordingReporter, ReportEvent, Reporter, TestOutcome};
pub use session::{Session, locate_script, resolve_path};
pub use tokenizer::{Token, Tokenizer};
pub use validator::{CheckSettings, Verdict, validate};
pub use vars::Variables;
