// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test descriptor and the expectation records attached to it.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use ipptest_core::types::{IppVersion, Transfer};
use ipptest_proto::message::{Attribute, Message};
use ipptest_proto::tags::GroupTag;

/// Repeat limit used when a record does not set REPEAT-LIMIT.
pub const DEFAULT_REPEAT_LIMIT: u32 = 1000;

/// Repeat interval used when a test does not set DELAY.
pub const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Value constraints
// ---------------------------------------------------------------------------

/// URI part a WITH-HOSTNAME, WITH-RESOURCE or WITH-SCHEME compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriComponent {
    Hostname,
    Resource,
    Scheme,
}

/// Whether one value or every value must satisfy a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quantifier {
    #[default]
    Any,
    All,
}

/// The single value constraint an EXPECT may carry.
#[derive(Debug, Clone, Default)]
pub enum ValueConstraint {
    #[default]
    None,
    Literal {
        value: String,
        component: Option<UriComponent>,
    },
    Regex {
        regex: Regex,
        component: Option<UriComponent>,
    },
    /// Every value must appear in the named response attribute.
    ValueFrom(String),
}

impl ValueConstraint {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn component(&self) -> Option<UriComponent> {
        match self {
            Self::Literal { component, .. } | Self::Regex { component, .. } => *component,
            _ => None,
        }
    }
}

/// Directive name that produces a constraint with this quantifier and
/// URI component, as used in failure messages.
pub fn with_directive_name(quantifier: Quantifier, component: Option<UriComponent>) -> &'static str {
    match (quantifier, component) {
        (Quantifier::All, Some(UriComponent::Hostname)) => "WITH-ALL-HOSTNAMES",
        (Quantifier::All, Some(UriComponent::Resource)) => "WITH-ALL-RESOURCES",
        (Quantifier::All, Some(UriComponent::Scheme)) => "WITH-ALL-SCHEMES",
        (Quantifier::All, None) => "WITH-ALL-VALUES",
        (Quantifier::Any, Some(UriComponent::Hostname)) => "WITH-HOSTNAME",
        (Quantifier::Any, Some(UriComponent::Resource)) => "WITH-RESOURCE",
        (Quantifier::Any, Some(UriComponent::Scheme)) => "WITH-SCHEME",
        (Quantifier::Any, None) => "WITH-VALUE",
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// REPEAT-LIMIT, REPEAT-MATCH and REPEAT-NO-MATCH settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatRule {
    pub limit: u32,
    pub on_match: bool,
    pub on_no_match: bool,
}

impl Default for RepeatRule {
    fn default() -> Self {
        Self {
            limit: DEFAULT_REPEAT_LIMIT,
            on_match: false,
            on_no_match: false,
        }
    }
}

impl RepeatRule {
    /// Whether another attempt is allowed after `attempts` requests.
    pub fn below_limit(&self, attempts: u32) -> bool {
        attempts < self.limit
    }
}

/// One STATUS directive.
#[derive(Debug, Clone, Default)]
pub struct StatusRecord {
    pub status: u16,
    pub if_defined: Option<String>,
    pub if_not_defined: Option<String>,
    pub define_match: Option<String>,
    pub define_no_match: Option<String>,
    pub repeat: RepeatRule,
}

impl StatusRecord {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// One EXPECT or EXPECT-ALL directive and its modifiers.
#[derive(Debug, Clone, Default)]
pub struct ExpectRecord {
    /// Attribute name or `/`-separated member path.
    pub name: String,
    pub not_expected: bool,
    pub optional: bool,
    pub expect_all: bool,
    /// `|` or `,` separated syntax names.
    pub of_type: Option<String>,
    pub in_group: Option<GroupTag>,
    pub same_count_as: Option<String>,
    pub if_defined: Option<String>,
    pub if_not_defined: Option<String>,
    pub count: Option<usize>,
    pub constraint: ValueConstraint,
    pub quantifier: Quantifier,
    pub define_match: Option<String>,
    pub define_no_match: Option<String>,
    pub define_value: Option<String>,
    pub repeat: RepeatRule,
}

impl ExpectRecord {
    /// Build from an EXPECT argument, honouring the `!` and `?` prefixes.
    pub fn new(spec: &str, expect_all: bool) -> Self {
        let (name, not_expected, optional) = if let Some(rest) = spec.strip_prefix('!') {
            (rest, true, false)
        } else if let Some(rest) = spec.strip_prefix('?') {
            (rest, false, true)
        } else {
            (spec, false, false)
        };
        Self {
            name: name.to_string(),
            not_expected,
            optional,
            expect_all,
            ..Default::default()
        }
    }

    /// Whether a DEFINE-* modifier turns failures into variable bindings.
    pub fn defines_outcome(&self) -> bool {
        self.define_match.is_some() || self.define_value.is_some()
    }
}

// ---------------------------------------------------------------------------
// Test descriptor
// ---------------------------------------------------------------------------

/// Everything one `{ ... }` block declares.
#[derive(Debug, Clone)]
pub struct TestDescriptor {
    pub name: String,
    pub test_id: Option<String>,
    pub file_id: Option<String>,
    pub resource: String,
    pub version: IppVersion,
    pub transfer: Transfer,
    pub ignore_errors: bool,
    pub skip: bool,
    pub skip_previous_error: bool,
    pub delay: Duration,
    pub repeat_interval: Duration,
    pub request: Message,
    /// Group of the last GROUP directive; ZERO before the first one.
    pub group: GroupTag,
    pub statuses: Vec<StatusRecord>,
    pub expects: Vec<ExpectRecord>,
    pub displayed: Vec<String>,
    pub document: Option<PathBuf>,
}

impl TestDescriptor {
    pub fn new(name: impl Into<String>, resource: impl Into<String>, request_id: i32) -> Self {
        Self {
            name: name.into(),
            test_id: None,
            file_id: None,
            resource: resource.into(),
            version: IppVersion::V1_1,
            transfer: Transfer::Auto,
            ignore_errors: false,
            skip: false,
            skip_previous_error: false,
            delay: Duration::ZERO,
            repeat_interval: DEFAULT_REPEAT_INTERVAL,
            request: Message::new(0, request_id),
            group: GroupTag::ZERO,
            statuses: Vec::new(),
            expects: Vec::new(),
            displayed: Vec::new(),
            document: None,
        }
    }

    pub fn request_id(&self) -> i32 {
        self.request.request_id
    }

    /// Switch the request to `group`, inserting a separator when the group
    /// repeats.
    pub fn begin_group(&mut self, group: GroupTag) {
        if group == self.group {
            self.request.push(Attribute::separator());
        }
        self.group = group;
    }

    /// Append a request attribute to the current group. Attributes before
    /// the first GROUP land in the operation group.
    pub fn push_attribute(&mut self, mut attr: Attribute) {
        attr.group = if self.group == GroupTag::ZERO {
            GroupTag::OPERATION
        } else {
            self.group
        };
        self.request.push(attr);
    }

    /// The request as sent: version and request-id applied.
    pub fn finished_request(&self) -> Message {
        let mut message = self.request.clone();
        message.version = (self.version.major(), self.version.minor());
        message
    }
}
