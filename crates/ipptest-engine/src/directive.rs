// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Directive names and their classification.

use crate::descriptor::{Quantifier, UriComponent};

/// Every directive keyword a script may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    // -- Structure --
    OpenTest,
    CloseTest,

    // -- Variables and files --
    Define,
    DefineDefault,
    FileId,
    Include,
    IncludeIfDefined,
    IncludeIfNotDefined,
    StopAfterIncludeError,

    // -- Test settings --
    Attr,
    Compression,
    Delay,
    Display,
    File,
    Group,
    IgnoreErrors,
    Name,
    Operation,
    Pause,
    RequestId,
    Resource,
    SkipIfDefined,
    SkipIfMissing,
    SkipIfNotDefined,
    SkipPreviousError,
    TestId,
    Transfer,
    Version,

    // -- Expectations --
    Status,
    Expect,
    ExpectAll,

    // -- Modifiers --
    Count,
    DefineMatch,
    DefineNoMatch,
    DefineValue,
    IfDefined,
    IfNotDefined,
    InGroup,
    OfType,
    RepeatLimit,
    RepeatMatch,
    RepeatNoMatch,
    SameCountAs,
    With(Quantifier, Option<UriComponent>),
    WithValueFrom,
}

/// Keyword table. Lookups ignore ASCII case.
const NAMES: &[(&str, Directive)] = &[
    ("{", Directive::OpenTest),
    ("}", Directive::CloseTest),
    ("DEFINE", Directive::Define),
    ("DEFINE-DEFAULT", Directive::DefineDefault),
    ("FILE-ID", Directive::FileId),
    ("INCLUDE", Directive::Include),
    ("INCLUDE-IF-DEFINED", Directive::IncludeIfDefined),
    ("INCLUDE-IF-NOT-DEFINED", Directive::IncludeIfNotDefined),
    ("STOP-AFTER-INCLUDE-ERROR", Directive::StopAfterIncludeError),
    ("ATTR", Directive::Attr),
    ("COMPRESSION", Directive::Compression),
    ("DELAY", Directive::Delay),
    ("DISPLAY", Directive::Display),
    ("FILE", Directive::File),
    ("GROUP", Directive::Group),
    ("IGNORE-ERRORS", Directive::IgnoreErrors),
    ("NAME", Directive::Name),
    ("OPERATION", Directive::Operation),
    ("PAUSE", Directive::Pause),
    ("REQUEST-ID", Directive::RequestId),
    ("RESOURCE", Directive::Resource),
    ("SKIP-IF-DEFINED", Directive::SkipIfDefined),
    ("SKIP-IF-MISSING", Directive::SkipIfMissing),
    ("SKIP-IF-NOT-DEFINED", Directive::SkipIfNotDefined),
    ("SKIP-PREVIOUS-ERROR", Directive::SkipPreviousError),
    ("TEST-ID", Directive::TestId),
    ("TRANSFER", Directive::Transfer),
    ("VERSION", Directive::Version),
    ("STATUS", Directive::Status),
    ("EXPECT", Directive::Expect),
    ("EXPECT-ALL", Directive::ExpectAll),
    ("COUNT", Directive::Count),
    ("DEFINE-MATCH", Directive::DefineMatch),
    ("DEFINE-NO-MATCH", Directive::DefineNoMatch),
    ("DEFINE-VALUE", Directive::DefineValue),
    ("IF-DEFINED", Directive::IfDefined),
    ("IF-NOT-DEFINED", Directive::IfNotDefined),
    ("IN-GROUP", Directive::InGroup),
    ("OF-TYPE", Directive::OfType),
    ("REPEAT-LIMIT", Directive::RepeatLimit),
    ("REPEAT-MATCH", Directive::RepeatMatch),
    ("REPEAT-NO-MATCH", Directive::RepeatNoMatch),
    ("SAME-COUNT-AS", Directive::SameCountAs),
    ("WITH-VALUE", Directive::With(Quantifier::Any, None)),
    ("WITH-ALL-VALUES", Directive::With(Quantifier::All, None)),
    ("WITH-HOSTNAME", Directive::With(Quantifier::Any, Some(UriComponent::Hostname))),
    ("WITH-ALL-HOSTNAMES", Directive::With(Quantifier::All, Some(UriComponent::Hostname))),
    ("WITH-RESOURCE", Directive::With(Quantifier::Any, Some(UriComponent::Resource))),
    ("WITH-ALL-RESOURCES", Directive::With(Quantifier::All, Some(UriComponent::Resource))),
    ("WITH-SCHEME", Directive::With(Quantifier::Any, Some(UriComponent::Scheme))),
    ("WITH-ALL-SCHEMES", Directive::With(Quantifier::All, Some(UriComponent::Scheme))),
    ("WITH-VALUE-FROM", Directive::WithValueFrom),
];

impl Directive {
    pub fn lookup(word: &str) -> Option<Self> {
        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(word))
            .map(|(_, directive)| *directive)
    }

    /// Canonical upper-case keyword.
    pub fn keyword(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, directive)| *directive == self)
            .map_or("", |(name, _)| name)
    }

    /// Directives that may follow an EXPECT without detaching from it.
    pub fn is_expect_modifier(self) -> bool {
        matches!(
            self,
            Self::Count
                | Self::DefineMatch
                | Self::DefineNoMatch
                | Self::DefineValue
                | Self::IfDefined
                | Self::IfNotDefined
                | Self::InGroup
                | Self::OfType
                | Self::RepeatLimit
                | Self::RepeatMatch
                | Self::RepeatNoMatch
                | Self::SameCountAs
                | Self::With(..)
                | Self::WithValueFrom
        )
    }

    /// Directives that may follow a STATUS without detaching from it.
    pub fn is_status_modifier(self) -> bool {
        matches!(
            self,
            Self::DefineMatch
                | Self::DefineNoMatch
                | Self::IfDefined
                | Self::IfNotDefined
                | Self::RepeatLimit
                | Self::RepeatMatch
                | Self::RepeatNoMatch
        )
    }

    /// Directives accepted outside a test block.
    pub fn is_global(self) -> bool {
        matches!(
            self,
            Self::OpenTest
                | Self::Define
                | Self::DefineDefault
                | Self::FileId
                | Self::IgnoreErrors
                | Self::Include
                | Self::IncludeIfDefined
                | Self::IncludeIfNotDefined
                | Self::SkipIfDefined
                | Self::SkipIfNotDefined
                | Self::StopAfterIncludeError
                | Self::Transfer
                | Self::Version
        )
    }
}

/// The record the next modifier attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attachment {
    #[default]
    None,
    Expect(usize),
    Status(usize),
}

impl Attachment {
    /// Attachment left in place after `directive` runs. EXPECT and STATUS
    /// set a fresh one themselves.
    pub fn retained_after(self, directive: Directive) -> Self {
        match self {
            Self::Expect(_) if directive.is_expect_modifier() => self,
            Self::Status(_) if directive.is_status_modifier() => self,
            _ => Self::None,
        }
    }
}
