// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Script variable table and `$name` substitution.

use std::collections::HashMap;

use chrono::Utc;
use ipptest_core::types::iso_date;
use ipptest_proto::uri::{UriError, UriParts};
use tracing::debug;

/// Names that read another variable.
const ALIASES: &[(&str, &str)] = &[("method", "scheme"), ("host", "hostname")];

/// Name → value table shared by every script in a run.
#[derive(Debug, Clone)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Default for Variables {
    fn default() -> Self {
        Self::new()
    }
}

impl Variables {
    /// A table holding `date-start`, `date-current` and `user`.
    pub fn new() -> Self {
        let now = iso_date(Utc::now());
        let mut values = HashMap::new();
        values.insert("date-start".to_string(), now.clone());
        values.insert("date-current".to_string(), now);
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default();
        values.insert("user".to_string(), user);
        Self { values }
    }

    fn canonical(name: &str) -> &str {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map_or(name, |(_, target)| target)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(Self::canonical(name)).map(String::as_str)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        debug!(%name, %value, "set variable");
        let key = Self::canonical(&name).to_string();
        self.values.insert(key, value);
    }

    /// Bind the target URI and the parts derived from it.
    pub fn set_uri(&mut self, uri: &str) -> Result<(), UriError> {
        let parts = UriParts::parse(uri)?;
        self.set("uri", uri);
        self.set("scheme", parts.scheme.as_str());
        self.set("username", parts.userpass.as_str());
        self.set("hostname", parts.host.as_str());
        self.set("port", parts.port.to_string());
        self.set("resource", parts.resource.as_str());
        Ok(())
    }

    /// Re-bind `date-current` to now.
    pub fn refresh_date_current(&mut self) {
        self.values
            .insert("date-current".to_string(), iso_date(Utc::now()));
    }

    /// Substitute variable references in `template`.
    ///
    /// `$$` is a dollar sign, `$ENV[NAME]` reads the environment, and
    /// `$name`, `${name}` and `$(name)` read the table. A bare name runs
    /// over ASCII alphanumerics, `-` and `_`. Unknown names expand to
    /// nothing. Substituted text is not scanned again.
    pub fn expand(&self, template: &str) -> String {
        if !template.contains('$') {
            return template.to_string();
        }

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(at) = rest.find('$') {
            out.push_str(&rest[..at]);
            let after = &rest[at + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
            } else if let Some(tail) = after.strip_prefix("ENV[") {
                let (name, tail) = tail.split_once(']').unwrap_or((tail, ""));
                if let Ok(value) = std::env::var(name) {
                    out.push_str(&value);
                }
                rest = tail;
            } else if let Some((name, tail)) = bracketed(after) {
                out.push_str(self.get(name).unwrap_or_default());
                rest = tail;
            } else {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                    .unwrap_or(after.len());
                let (name, tail) = after.split_at(end);
                if name.is_empty() {
                    out.push('$');
                } else {
                    out.push_str(self.get(name).unwrap_or_default());
                }
                rest = tail;
            }
        }
        out.push_str(rest);
        out
    }
}

/// Split `{name}rest` or `(name)rest`.
fn bracketed(s: &str) -> Option<(&str, &str)> {
    let close = match s.chars().next()? {
        '{' => '}',
        '(' => ')',
        _ => return None,
    };
    s[1..].split_once(close)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Variables {
        let mut vars = Variables::new();
        vars.set("job-id", "42");
        vars.set("job-id-var", "job-id");
        vars
    }

    #[test]
    fn expands_all_reference_forms() {
        let vars = table();
        assert_eq!(vars.expand("id=$job-id"), "id=42");
        assert_eq!(vars.expand("id=${job-id}!"), "id=42!");
        assert_eq!(vars.expand("id=$(job-id)x"), "id=42x");
        assert_eq!(vars.expand("cost $$5"), "cost $5");
        assert_eq!(vars.expand("trailing $"), "trailing $");
    }

    #[test]
    fn unknown_names_expand_to_nothing() {
        assert_eq!(table().expand("[$nope]"), "[]");
    }

    #[test]
    fn substitution_is_single_pass() {
        let vars = table();
        let once = vars.expand("$job-id-var");
        assert_eq!(once, "job-id");
        assert_eq!(vars.expand(&once), once);
    }

    #[test]
    fn reads_environment() {
        let vars = Variables::new();
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(vars.expand("$ENV[PATH]"), path);
        assert_eq!(vars.expand("<$ENV[IPPTEST_SURELY_UNSET_VARIABLE]>"), "<>");
    }

    #[test]
    fn uri_parts_and_aliases() {
        let mut vars = Variables::new();
        vars.set_uri("ipp://alice@printer.local:8631/ipp/print")
            .expect("valid uri");
        assert_eq!(vars.get("scheme"), Some("ipp"));
        assert_eq!(vars.get("method"), Some("ipp"));
        assert_eq!(vars.get("host"), Some("printer.local"));
        assert_eq!(vars.get("port"), Some("8631"));
        assert_eq!(vars.get("resource"), Some("/ipp/print"));
        assert_eq!(vars.get("username"), Some("alice"));
        assert_eq!(vars.expand("$uri"), "ipp://alice@printer.local:8631/ipp/print");
    }

    #[test]
    fn bad_uri_is_rejected() {
        let mut vars = Variables::new();
        assert_eq!(vars.set_uri("printer"), Err(UriError::MissingScheme));
    }

    #[test]
    fn dates_are_bound_at_start() {
        let mut vars = Variables::new();
        let start = vars.get("date-start").expect("bound").to_string();
        vars.refresh_date_current();
        assert!(vars.get("date-current").expect("bound") >= start.as_str());
        assert!(start.ends_with('Z'));
    }
}
