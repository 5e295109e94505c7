// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// URI splitting, reassembly and comparison for printer URIs.

use std::fmt;

use ipptest_core::error::IppTestError;
use thiserror::Error;

/// Why a URI could not be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("Bad/empty URI")]
    Empty,
    #[error("Missing scheme in URI")]
    MissingScheme,
    #[error("Bad scheme in URI")]
    BadScheme,
    #[error("Bad username in URI")]
    BadUsername,
    #[error("Bad hostname/address in URI")]
    BadHostname,
    #[error("Bad port number in URI")]
    BadPort,
    #[error("Bad resource in URI")]
    BadResource,
}

impl From<UriError> for IppTestError {
    fn from(err: UriError) -> Self {
        IppTestError::InvalidUri(err.to_string())
    }
}

/// Components of a URI.
///
/// Hierarchical URIs (`scheme://authority/path`) fill every field; others
/// such as `mailto:` keep everything after the colon in `resource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriParts {
    pub scheme: String,
    pub userpass: String,
    pub host: String,
    pub port: u16,
    pub resource: String,
}

/// Well-known port for a scheme, 0 when there is none.
pub fn default_port(scheme: &str) -> u16 {
    match scheme.to_ascii_lowercase().as_str() {
        "http" => 80,
        "https" => 443,
        "ipp" | "ipps" => 631,
        "lpd" => 515,
        "socket" => 9100,
        _ => 0,
    }
}

impl UriParts {
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        if uri.is_empty() {
            return Err(UriError::Empty);
        }
        let (scheme, rest) = uri.split_once(':').ok_or(UriError::MissingScheme)?;
        if scheme.is_empty() {
            return Err(UriError::MissingScheme);
        }
        let valid_scheme = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(UriError::BadScheme);
        }

        let Some(authority_and_path) = rest.strip_prefix("//") else {
            check_resource(rest)?;
            return Ok(Self {
                scheme: scheme.to_string(),
                userpass: String::new(),
                host: String::new(),
                port: 0,
                resource: rest.to_string(),
            });
        };

        let split = authority_and_path
            .find(['/', '?', '#'])
            .unwrap_or(authority_and_path.len());
        let (authority, resource) = authority_and_path.split_at(split);

        let (userpass, hostport) = match authority.rsplit_once('@') {
            Some((up, hp)) => (up, hp),
            None => ("", authority),
        };
        if userpass.chars().any(|c| c.is_control() || c == ' ') {
            return Err(UriError::BadUsername);
        }

        let (host, port) = split_host_port(hostport)?;
        let port = match port {
            Some(p) => p,
            None => default_port(scheme),
        };

        let resource = if resource.is_empty() { "/" } else { resource };
        check_resource(resource)?;

        Ok(Self {
            scheme: scheme.to_string(),
            userpass: userpass.to_string(),
            host: host.to_string(),
            port,
            resource: resource.to_string(),
        })
    }

    /// Host name without a trailing dot.
    pub fn host_without_dot(&self) -> &str {
        self.host.strip_suffix('.').unwrap_or(&self.host)
    }

    /// Reassemble with the host's trailing dot removed and the port spelled
    /// out.
    pub fn normalized(&self) -> String {
        let mut out = format!("{}:", self.scheme);
        if self.host.is_empty() {
            out.push_str(&self.resource);
            return out;
        }
        out.push_str("//");
        if !self.userpass.is_empty() {
            out.push_str(&self.userpass);
            out.push('@');
        }
        let host = self.host_without_dot();
        if host.contains(':') {
            out.push('[');
            out.push_str(host);
            out.push(']');
        } else {
            out.push_str(host);
        }
        if self.port > 0 {
            out.push_str(&format!(":{}", self.port));
        }
        out.push_str(&self.resource);
        out
    }
}

impl fmt::Display for UriParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

fn split_host_port(hostport: &str) -> Result<(&str, Option<u16>), UriError> {
    let (host, port) = if let Some(bracketed) = hostport.strip_prefix('[') {
        let (addr, after) = bracketed.split_once(']').ok_or(UriError::BadHostname)?;
        let valid = !addr.is_empty()
            && addr
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '%'));
        if !valid {
            return Err(UriError::BadHostname);
        }
        let port = match after {
            "" => None,
            p => Some(p.strip_prefix(':').ok_or(UriError::BadPort)?),
        };
        (addr, port)
    } else {
        match hostport.rsplit_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (hostport, None),
        }
    };

    if !hostport.starts_with('[') {
        let valid_host = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '%'));
        if !valid_host {
            return Err(UriError::BadHostname);
        }
    }

    let port = match port {
        None => None,
        Some(p) => match p.parse::<u16>() {
            Ok(n) if n > 0 && p.chars().all(|c| c.is_ascii_digit()) => Some(n),
            _ => return Err(UriError::BadPort),
        },
    };
    Ok((host, port))
}

fn check_resource(resource: &str) -> Result<(), UriError> {
    let bytes = resource.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b <= b' ' || b >= 0x7f {
            return Err(UriError::BadResource);
        }
        if b == b'%' {
            let escape = bytes.get(i + 1..i + 3).ok_or(UriError::BadResource)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return Err(UriError::BadResource);
            }
            i += 2;
        }
        i += 1;
    }
    Ok(())
}

/// Whether two URIs name the same resource.
///
/// Scheme and host compare without case (ignoring a trailing dot on the
/// host); credentials and port compare exactly; the resource compares
/// without case only for `mailto` and `urn`. A URI that cannot be split
/// never equals anything.
pub fn uris_equal(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (UriParts::parse(a), UriParts::parse(b)) else {
        return false;
    };

    if !a.scheme.eq_ignore_ascii_case(&b.scheme)
        || a.userpass != b.userpass
        || !a.host_without_dot().eq_ignore_ascii_case(b.host_without_dot())
        || a.port != b.port
    {
        return false;
    }

    let folded = ["mailto", "urn"]
        .iter()
        .any(|s| a.scheme.eq_ignore_ascii_case(s));
    if folded {
        a.resource.eq_ignore_ascii_case(&b.resource)
    } else {
        a.resource == b.resource
    }
}
