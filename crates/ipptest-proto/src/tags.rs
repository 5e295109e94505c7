// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP tag, operation and status-code registries.
//
// Delimiter tags (RFC 8010 SS3.5.1) and value tags (RFC 8010 SS3.5.2) share
// a single one-byte namespace, so names are resolved through one table and
// then narrowed to `GroupTag` or `ValueTag` by range.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Group (delimiter) tags
// ---------------------------------------------------------------------------

/// An attribute group delimiter tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupTag(pub u8);

impl GroupTag {
    /// No group: collection members and separators.
    pub const ZERO: Self = Self(0x00);
    pub const OPERATION: Self = Self(0x01);
    pub const JOB: Self = Self(0x02);
    /// End-of-attributes-tag -- terminates the attribute section.
    pub const END: Self = Self(0x03);
    pub const PRINTER: Self = Self(0x04);
    pub const UNSUPPORTED: Self = Self(0x05);
    pub const SUBSCRIPTION: Self = Self(0x06);
    pub const EVENT_NOTIFICATION: Self = Self(0x07);
    pub const RESOURCE: Self = Self(0x08);
    pub const DOCUMENT: Self = Self(0x09);
    pub const SYSTEM: Self = Self(0x0A);

    /// Resolve a group name such as `printer-attributes-tag` or `printer`.
    pub fn from_name(name: &str) -> Option<Self> {
        lookup_tag(name).filter(|t| *t < 0x10).map(Self)
    }

    pub fn name(self) -> String {
        tag_name(self.0)
    }
}

impl fmt::Display for GroupTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ---------------------------------------------------------------------------
// Value tags
// ---------------------------------------------------------------------------

/// An attribute value syntax tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueTag(pub u8);

impl ValueTag {
    // -- Out-of-band --
    pub const UNSUPPORTED_VALUE: Self = Self(0x10);
    pub const DEFAULT: Self = Self(0x11);
    pub const UNKNOWN: Self = Self(0x12);
    pub const NO_VALUE: Self = Self(0x13);
    pub const NOT_SETTABLE: Self = Self(0x15);
    pub const DELETE_ATTRIBUTE: Self = Self(0x16);
    pub const ADMIN_DEFINE: Self = Self(0x17);

    // -- Integer types --
    /// Integer value (4 bytes, signed big-endian).
    pub const INTEGER: Self = Self(0x21);
    /// Boolean value (1 byte: 0x00 = false, 0x01 = true).
    pub const BOOLEAN: Self = Self(0x22);
    /// Enum value (4 bytes, same encoding as integer).
    pub const ENUM: Self = Self(0x23);

    // -- Octet-string types --
    pub const OCTET_STRING: Self = Self(0x30);
    /// RFC 2579 DateAndTime, 11 bytes.
    pub const DATE_TIME: Self = Self(0x31);
    /// Cross-feed, feed (4 bytes each) and units (1 byte).
    pub const RESOLUTION: Self = Self(0x32);
    pub const RANGE: Self = Self(0x33);
    pub const BEGIN_COLLECTION: Self = Self(0x34);
    pub const TEXT_WITH_LANGUAGE: Self = Self(0x35);
    pub const NAME_WITH_LANGUAGE: Self = Self(0x36);
    pub const END_COLLECTION: Self = Self(0x37);

    // -- Character-string types --
    pub const TEXT: Self = Self(0x41);
    pub const NAME: Self = Self(0x42);
    pub const KEYWORD: Self = Self(0x44);
    pub const URI: Self = Self(0x45);
    pub const URI_SCHEME: Self = Self(0x46);
    pub const CHARSET: Self = Self(0x47);
    pub const NATURAL_LANGUAGE: Self = Self(0x48);
    pub const MIME_TYPE: Self = Self(0x49);
    pub const MEMBER_NAME: Self = Self(0x4A);

    /// Resolve a syntax name such as `keyword`, `text` or `collection`.
    ///
    /// Delimiter names also resolve here; callers reject values below 0x10.
    pub fn from_name(name: &str) -> Option<Self> {
        lookup_tag(name).map(Self)
    }

    pub fn name(self) -> String {
        tag_name(self.0)
    }

    /// Out-of-band values carry no data.
    pub fn is_out_of_band(self) -> bool {
        (0x10..0x20).contains(&self.0)
    }

    /// Tags whose values are character strings on the wire.
    pub fn is_string(self) -> bool {
        (0x40..0x60).contains(&self.0) || self == Self::TEXT_WITH_LANGUAGE || self == Self::NAME_WITH_LANGUAGE
    }

    /// Tags compared case-insensitively by `ippContainsString`-style lookups.
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Self::MIME_TYPE | Self::NAME | Self::NAME_WITH_LANGUAGE | Self::TEXT | Self::TEXT_WITH_LANGUAGE
        )
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Registered names indexed by tag byte, 0x00..=0x4A.
const TAG_NAMES: [&str; 0x4B] = [
    "zero",
    "operation-attributes-tag",
    "job-attributes-tag",
    "end-of-attributes-tag",
    "printer-attributes-tag",
    "unsupported-attributes-tag",
    "subscription-attributes-tag",
    "event-notification-attributes-tag",
    "resource-attributes-tag",
    "document-attributes-tag",
    "system-attributes-tag",
    "0x0b",
    "0x0c",
    "0x0d",
    "0x0e",
    "0x0f",
    "unsupported",
    "default",
    "unknown",
    "no-value",
    "0x14",
    "not-settable",
    "delete-attribute",
    "admin-define",
    "0x18",
    "0x19",
    "0x1a",
    "0x1b",
    "0x1c",
    "0x1d",
    "0x1e",
    "0x1f",
    "0x20",
    "integer",
    "boolean",
    "enum",
    "0x24",
    "0x25",
    "0x26",
    "0x27",
    "0x28",
    "0x29",
    "0x2a",
    "0x2b",
    "0x2c",
    "0x2d",
    "0x2e",
    "0x2f",
    "octetString",
    "dateTime",
    "resolution",
    "rangeOfInteger",
    "collection",
    "textWithLanguage",
    "nameWithLanguage",
    "endCollection",
    "0x38",
    "0x39",
    "0x3a",
    "0x3b",
    "0x3c",
    "0x3d",
    "0x3e",
    "0x3f",
    "0x40",
    "textWithoutLanguage",
    "nameWithoutLanguage",
    "0x43",
    "keyword",
    "uri",
    "uriScheme",
    "charset",
    "naturalLanguage",
    "mimeMediaType",
    "memberAttrName",
];

/// Short forms accepted by scripts in addition to the registered names.
const TAG_ALIASES: &[(&str, u8)] = &[
    ("operation", 0x01),
    ("job", 0x02),
    ("printer", 0x04),
    ("subscription", 0x06),
    ("event", 0x07),
    ("resource", 0x08),
    ("document", 0x09),
    ("system", 0x0A),
    ("language", 0x48),
    ("mimetype", 0x49),
    ("name", 0x42),
    ("text", 0x41),
    ("begCollection", 0x34),
];

/// Registered name for a tag byte, or `0xNN` when unregistered.
pub fn tag_name(tag: u8) -> String {
    TAG_NAMES
        .get(tag as usize)
        .map(|s| (*s).to_string())
        .unwrap_or_else(|| format!("0x{tag:02x}"))
}

/// Case-insensitive lookup over registered names and aliases.
pub fn lookup_tag(name: &str) -> Option<u8> {
    TAG_NAMES
        .iter()
        .position(|n| !n.starts_with("0x") && n.eq_ignore_ascii_case(name))
        .map(|i| i as u8)
        .or_else(|| {
            TAG_ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                .map(|(_, tag)| *tag)
        })
}

// ---------------------------------------------------------------------------
// Operation codes (RFC 8011 SS4, PWG 5100.x, CUPS extensions)
// ---------------------------------------------------------------------------

const OPERATIONS: &[(u16, &str)] = &[
    (0x0002, "Print-Job"),
    (0x0003, "Print-URI"),
    (0x0004, "Validate-Job"),
    (0x0005, "Create-Job"),
    (0x0006, "Send-Document"),
    (0x0007, "Send-URI"),
    (0x0008, "Cancel-Job"),
    (0x0009, "Get-Job-Attributes"),
    (0x000A, "Get-Jobs"),
    (0x000B, "Get-Printer-Attributes"),
    (0x000C, "Hold-Job"),
    (0x000D, "Release-Job"),
    (0x000E, "Restart-Job"),
    (0x0010, "Pause-Printer"),
    (0x0011, "Resume-Printer"),
    (0x0012, "Purge-Jobs"),
    (0x0013, "Set-Printer-Attributes"),
    (0x0014, "Set-Job-Attributes"),
    (0x0015, "Get-Printer-Supported-Values"),
    (0x0016, "Create-Printer-Subscriptions"),
    (0x0017, "Create-Job-Subscriptions"),
    (0x0018, "Get-Subscription-Attributes"),
    (0x0019, "Get-Subscriptions"),
    (0x001A, "Renew-Subscription"),
    (0x001B, "Cancel-Subscription"),
    (0x001C, "Get-Notifications"),
    (0x001D, "Send-Notifications"),
    (0x001E, "Get-Resource-Attributes"),
    (0x001F, "Get-Resource-Data"),
    (0x0020, "Get-Resources"),
    (0x0021, "Get-Print-Support-Files"),
    (0x0022, "Enable-Printer"),
    (0x0023, "Disable-Printer"),
    (0x0024, "Pause-Printer-After-Current-Job"),
    (0x0025, "Hold-New-Jobs"),
    (0x0026, "Release-Held-New-Jobs"),
    (0x0027, "Deactivate-Printer"),
    (0x0028, "Activate-Printer"),
    (0x0029, "Restart-Printer"),
    (0x002A, "Shutdown-Printer"),
    (0x002B, "Startup-Printer"),
    (0x002C, "Reprocess-Job"),
    (0x002D, "Cancel-Current-Job"),
    (0x002E, "Suspend-Current-Job"),
    (0x002F, "Resume-Job"),
    (0x0030, "Promote-Job"),
    (0x0031, "Schedule-Job-After"),
    (0x0033, "Cancel-Document"),
    (0x0034, "Get-Document-Attributes"),
    (0x0035, "Get-Documents"),
    (0x0036, "Delete-Document"),
    (0x0037, "Set-Document-Attributes"),
    (0x0038, "Cancel-Jobs"),
    (0x0039, "Cancel-My-Jobs"),
    (0x003A, "Resubmit-Job"),
    (0x003B, "Close-Job"),
    (0x003C, "Identify-Printer"),
    (0x003D, "Validate-Document"),
    (0x003E, "Add-Document-Images"),
    (0x003F, "Acknowledge-Document"),
    (0x0040, "Acknowledge-Identify-Printer"),
    (0x0041, "Acknowledge-Job"),
    (0x0042, "Fetch-Document"),
    (0x0043, "Fetch-Job"),
    (0x0044, "Get-Output-Device-Attributes"),
    (0x0045, "Update-Active-Jobs"),
    (0x0046, "Deregister-Output-Device"),
    (0x0047, "Update-Document-Status"),
    (0x0048, "Update-Job-Status"),
    (0x0049, "Update-Output-Device-Attributes"),
    (0x004A, "Get-Next-Document-Data"),
    (0x004B, "Allocate-Printer-Resources"),
    (0x004C, "Create-Printer"),
    (0x004D, "Deallocate-Printer-Resources"),
    (0x004E, "Delete-Printer"),
    (0x004F, "Get-Printers"),
    (0x0050, "Shutdown-One-Printer"),
    (0x0051, "Startup-One-Printer"),
    (0x0052, "Cancel-Resource"),
    (0x0053, "Create-Resource"),
    (0x0054, "Install-Resource"),
    (0x0055, "Send-Resource-Data"),
    (0x0056, "Set-Resource-Attributes"),
    (0x0057, "Create-Resource-Subscriptions"),
    (0x0058, "Create-System-Subscriptions"),
    (0x0059, "Disable-All-Printers"),
    (0x005A, "Enable-All-Printers"),
    (0x005B, "Get-System-Attributes"),
    (0x005C, "Get-System-Supported-Values"),
    (0x005D, "Pause-All-Printers"),
    (0x005E, "Pause-All-Printers-After-Current-Job"),
    (0x005F, "Register-Output-Device"),
    (0x0060, "Restart-System"),
    (0x0061, "Resume-All-Printers"),
    (0x0062, "Set-System-Attributes"),
    (0x0063, "Shutdown-All-Printers"),
    (0x0064, "Startup-All-Printers"),
    (0x4001, "CUPS-Get-Default"),
    (0x4002, "CUPS-Get-Printers"),
    (0x4003, "CUPS-Add-Modify-Printer"),
    (0x4004, "CUPS-Delete-Printer"),
    (0x4005, "CUPS-Get-Classes"),
    (0x4006, "CUPS-Add-Modify-Class"),
    (0x4007, "CUPS-Delete-Class"),
    (0x4008, "CUPS-Accept-Jobs"),
    (0x4009, "CUPS-Reject-Jobs"),
    (0x400A, "CUPS-Set-Default"),
    (0x400B, "CUPS-Get-Devices"),
    (0x400C, "CUPS-Get-PPDs"),
    (0x400D, "CUPS-Move-Job"),
    (0x400E, "CUPS-Authenticate-Job"),
    (0x400F, "CUPS-Get-PPD"),
    (0x4027, "CUPS-Get-Document"),
    (0x4028, "CUPS-Create-Local-Printer"),
];

/// Name of an operation code, or `0xNNNN` when unregistered.
pub fn operation_name(code: u16) -> String {
    OPERATIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| (*n).to_string())
        .unwrap_or_else(|| format!("0x{code:04x}"))
}

/// Case-insensitive reverse lookup of an operation name.
pub fn operation_code(name: &str) -> Option<u16> {
    OPERATIONS
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(c, _)| *c)
}

// ---------------------------------------------------------------------------
// Status codes (RFC 8011 SS4.1.6.1, PWG 5100.x)
// ---------------------------------------------------------------------------

const STATUSES: &[(u16, &str)] = &[
    (0x0000, "successful-ok"),
    (0x0001, "successful-ok-ignored-or-substituted-attributes"),
    (0x0002, "successful-ok-conflicting-attributes"),
    (0x0003, "successful-ok-ignored-subscriptions"),
    (0x0004, "successful-ok-ignored-notifications"),
    (0x0005, "successful-ok-too-many-events"),
    (0x0006, "successful-ok-but-cancel-subscription"),
    (0x0007, "successful-ok-events-complete"),
    (0x0400, "client-error-bad-request"),
    (0x0401, "client-error-forbidden"),
    (0x0402, "client-error-not-authenticated"),
    (0x0403, "client-error-not-authorized"),
    (0x0404, "client-error-not-possible"),
    (0x0405, "client-error-timeout"),
    (0x0406, "client-error-not-found"),
    (0x0407, "client-error-gone"),
    (0x0408, "client-error-request-entity-too-large"),
    (0x0409, "client-error-request-value-too-long"),
    (0x040A, "client-error-document-format-not-supported"),
    (0x040B, "client-error-attributes-or-values-not-supported"),
    (0x040C, "client-error-uri-scheme-not-supported"),
    (0x040D, "client-error-charset-not-supported"),
    (0x040E, "client-error-conflicting-attributes"),
    (0x040F, "client-error-compression-not-supported"),
    (0x0410, "client-error-compression-error"),
    (0x0411, "client-error-document-format-error"),
    (0x0412, "client-error-document-access-error"),
    (0x0413, "client-error-attributes-not-settable"),
    (0x0414, "client-error-ignored-all-subscriptions"),
    (0x0415, "client-error-too-many-subscriptions"),
    (0x0416, "client-error-ignored-all-notifications"),
    (0x0417, "client-error-print-support-file-not-found"),
    (0x0418, "client-error-document-password-error"),
    (0x0419, "client-error-document-permission-error"),
    (0x041A, "client-error-document-security-error"),
    (0x041B, "client-error-document-unprintable-error"),
    (0x041C, "client-error-account-info-needed"),
    (0x041D, "client-error-account-closed"),
    (0x041E, "client-error-account-limit-reached"),
    (0x041F, "client-error-account-authorization-failed"),
    (0x0420, "client-error-not-fetchable"),
    (0x0500, "server-error-internal-error"),
    (0x0501, "server-error-operation-not-supported"),
    (0x0502, "server-error-service-unavailable"),
    (0x0503, "server-error-version-not-supported"),
    (0x0504, "server-error-device-error"),
    (0x0505, "server-error-temporary-error"),
    (0x0506, "server-error-not-accepting-jobs"),
    (0x0507, "server-error-busy"),
    (0x0508, "server-error-job-canceled"),
    (0x0509, "server-error-multiple-document-jobs-not-supported"),
    (0x050A, "server-error-printer-is-deactivated"),
    (0x050B, "server-error-too-many-jobs"),
    (0x050C, "server-error-too-many-documents"),
];

/// Generic failure status used when no IPP response arrived.
pub const STATUS_INTERNAL_ERROR: u16 = 0x0500;

/// Name of a status code, or `0xNNNN` when unregistered.
pub fn status_name(code: u16) -> String {
    STATUSES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| (*n).to_string())
        .unwrap_or_else(|| format!("0x{code:04x}"))
}

/// Case-insensitive reverse lookup of a status name.
pub fn status_code(name: &str) -> Option<u16> {
    STATUSES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(c, _)| *c)
}

// ---------------------------------------------------------------------------
// Enum keywords
// ---------------------------------------------------------------------------

const JOB_STATES: &[(i32, &str)] = &[
    (3, "pending"),
    (4, "pending-held"),
    (5, "processing"),
    (6, "processing-stopped"),
    (7, "canceled"),
    (8, "aborted"),
    (9, "completed"),
];

const PRINTER_STATES: &[(i32, &str)] = &[(3, "idle"), (4, "processing"), (5, "stopped")];

const ORIENTATIONS: &[(i32, &str)] = &[
    (3, "portrait"),
    (4, "landscape"),
    (5, "reverse-landscape"),
    (6, "reverse-portrait"),
    (7, "none"),
];

const PRINT_QUALITIES: &[(i32, &str)] = &[(3, "draft"), (4, "normal"), (5, "high")];

const FINISHINGS: &[(i32, &str)] = &[
    (3, "none"),
    (4, "staple"),
    (5, "punch"),
    (6, "cover"),
    (7, "bind"),
    (8, "saddle-stitch"),
    (9, "edge-stitch"),
    (10, "fold"),
    (11, "trim"),
    (12, "bale"),
    (13, "booklet-maker"),
    (14, "jog-offset"),
    (15, "coat"),
    (16, "laminate"),
    (20, "staple-top-left"),
    (21, "staple-bottom-left"),
    (22, "staple-top-right"),
    (23, "staple-bottom-right"),
];

/// Keyword table for an enum-valued attribute, by attribute name.
fn enum_table(attr: &str) -> Option<&'static [(i32, &'static str)]> {
    match attr {
        "job-state" | "document-state" => Some(JOB_STATES),
        "printer-state" | "system-state" => Some(PRINTER_STATES),
        "orientation-requested" | "orientation-requested-default"
        | "orientation-requested-supported" => Some(ORIENTATIONS),
        "print-quality" | "print-quality-default" | "print-quality-supported" => {
            Some(PRINT_QUALITIES)
        }
        a if a.starts_with("finishings") => Some(FINISHINGS),
        _ => None,
    }
}

fn is_operation_attr(attr: &str) -> bool {
    matches!(attr, "operations-supported" | "operation-id")
}

/// Keyword for an enum value, or its decimal form when unknown.
pub fn enum_string(attr: &str, value: i32) -> String {
    if is_operation_attr(attr) {
        if let Ok(code) = u16::try_from(value) {
            let name = operation_name(code);
            if !name.starts_with("0x") {
                return name;
            }
        }
        return value.to_string();
    }

    enum_table(attr)
        .and_then(|t| t.iter().find(|(v, _)| *v == value))
        .map(|(_, n)| (*n).to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Enum value for a keyword, or `None` when the keyword is not registered.
pub fn enum_value(attr: &str, keyword: &str) -> Option<i32> {
    if is_operation_attr(attr) {
        return operation_code(keyword).map(i32::from);
    }
    enum_table(attr)?
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(keyword))
        .map(|(v, _)| *v)
}
