// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared domain types for the ipptest workspace.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How test results are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Nothing on stdout; exit status only.
    Quiet,
    /// One PASS/FAIL/SKIP line per test plus failure detail.
    Test,
    /// Machine-readable JSON report.
    Json,
    /// Plain-text table of DISPLAY attributes.
    List,
    /// Comma-separated table of DISPLAY attributes.
    Csv,
}

impl OutputMode {
    /// Tabular modes render the response rather than the verdict, so
    /// repeated attribute names are expected there and not flagged.
    pub fn flags_duplicates(self) -> bool {
        !matches!(self, Self::List | Self::Csv)
    }

    /// Modes that render DISPLAY attributes as table rows.
    pub fn is_tabular(self) -> bool {
        matches!(self, Self::List | Self::Csv)
    }
}

/// Request body framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transfer {
    /// Chunked when a document is attached, Content-Length otherwise.
    Auto,
    Chunked,
    Length,
}

impl Transfer {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "chunked" => Some(Self::Chunked),
            "length" => Some(Self::Length),
            _ => None,
        }
    }

    /// Whether a request is sent with chunked framing.
    pub fn use_chunking(self, has_document: bool) -> bool {
        match self {
            Self::Chunked => true,
            Self::Length => false,
            Self::Auto => has_document,
        }
    }
}

/// IP address family used when resolving the target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Any,
    Ipv4,
    Ipv6,
}

/// An IPP version number stored as `major * 10 + minor`.
///
/// `0.0` is only meaningful inside a test, where it disables the response
/// version check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IppVersion(pub u8);

impl IppVersion {
    pub const UNCHECKED: Self = Self(0);
    pub const V1_0: Self = Self(10);
    pub const V1_1: Self = Self(11);
    pub const V2_0: Self = Self(20);
    pub const V2_1: Self = Self(21);
    pub const V2_2: Self = Self(22);

    /// Parse one of the version strings accepted by `VERSION` and `-V`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1.0" => Some(Self::V1_0),
            "1.1" => Some(Self::V1_1),
            "2.0" => Some(Self::V2_0),
            "2.1" => Some(Self::V2_1),
            "2.2" => Some(Self::V2_2),
            _ => None,
        }
    }

    pub fn major(self) -> u8 {
        self.0 / 10
    }

    pub fn minor(self) -> u8 {
        self.0 % 10
    }

    pub fn is_checked(self) -> bool {
        self.0 != 0
    }
}

impl Default for IppVersion {
    fn default() -> Self {
        Self::V1_1
    }
}

impl std::fmt::Display for IppVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Cumulative results across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub tests: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl Counters {
    /// Percentage of tests that passed or were skipped.
    pub fn score(&self) -> u32 {
        if self.tests == 0 {
            return 0;
        }
        100 * (self.passed + self.skipped) / self.tests
    }
}

/// Supported document formats for the default request file, keyed by
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Gif,
    Html,
    Jpeg,
    Pcl,
    Pdf,
    Png,
    PostScript,
    PwgRaster,
    Tiff,
    Text,
    Urf,
    Xps,
    Other,
}

impl DocumentType {
    /// Infer the document type from a file name's extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "gif" => Self::Gif,
            "htm" | "html" => Self::Html,
            "jpg" | "jpeg" => Self::Jpeg,
            "pcl" => Self::Pcl,
            "pdf" => Self::Pdf,
            "png" => Self::Png,
            "ps" => Self::PostScript,
            "pwg" | "ras" => Self::PwgRaster,
            "tif" | "tiff" => Self::Tiff,
            "txt" => Self::Text,
            "urf" => Self::Urf,
            "xps" => Self::Xps,
            _ => Self::Other,
        }
    }

    /// MIME type bound to the `filetype` variable.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Html => "text/html",
            Self::Jpeg => "image/jpeg",
            Self::Pcl => "application/vnd.hp-PCL",
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::PostScript => "application/postscript",
            Self::PwgRaster => "image/pwg-raster",
            Self::Tiff => "image/tiff",
            Self::Text => "text/plain",
            Self::Urf => "image/urf",
            Self::Xps => "application/openxps",
            Self::Other => "application/octet-stream",
        }
    }
}

/// Format a timestamp the way the `date-*` variables expose it.
pub fn iso_date(when: DateTime<Utc>) -> String {
    when.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn version_parse_and_display() {
        let v = IppVersion::parse("2.0").expect("valid version");
        assert_eq!(v, IppVersion::V2_0);
        assert_eq!(v.to_string(), "2.0");
        assert_eq!((v.major(), v.minor()), (2, 0));
        assert!(IppVersion::parse("3.0").is_none());
        assert!(IppVersion::parse("0.0").is_none());
        assert!(!IppVersion::UNCHECKED.is_checked());
    }

    #[test]
    fn transfer_auto_chunks_only_with_documents() {
        assert!(Transfer::Auto.use_chunking(true));
        assert!(!Transfer::Auto.use_chunking(false));
        assert!(Transfer::Chunked.use_chunking(false));
        assert!(!Transfer::Length.use_chunking(true));
        assert_eq!(Transfer::parse("length"), Some(Transfer::Length));
        assert_eq!(Transfer::parse("LENGTH"), None);
    }

    #[test]
    fn score_counts_skips_as_success() {
        let c = Counters {
            tests: 4,
            passed: 2,
            failed: 1,
            skipped: 1,
        };
        assert_eq!(c.score(), 75);
        assert_eq!(Counters::default().score(), 0);
    }

    #[test]
    fn document_type_from_extension() {
        assert_eq!(
            DocumentType::from_path(Path::new("doc.PDF")).mime_type(),
            "application/pdf"
        );
        assert_eq!(
            DocumentType::from_path(Path::new("page.ras")).mime_type(),
            "image/pwg-raster"
        );
        assert_eq!(
            DocumentType::from_path(Path::new("README")).mime_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn duplicate_flagging_depends_on_mode() {
        assert!(OutputMode::Test.flags_duplicates());
        assert!(OutputMode::Quiet.flags_duplicates());
        assert!(!OutputMode::Csv.flags_duplicates());
        assert!(OutputMode::List.is_tabular());
    }

    #[test]
    fn iso_date_uses_zulu_suffix() {
        let when = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).single().expect("valid date");
        assert_eq!(iso_date(when), "2026-03-04T05:06:07Z");
    }
}
