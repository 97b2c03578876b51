//! Sensitive value detection and redaction for published plans
//!
//! Structured plans are redacted by path: every location Terraform marks as
//! sensitive (`sensitive_values`, `before_sensitive`, `after_sensitive`,
//! sensitive outputs and variables) plus attributes whose names look like
//! secrets. Paths use dotted keys and `[i]` indexes from the document root,
//! e.g. `resource_changes[0].change.after.password`.
//!
//! Free text is redacted with a fixed set of patterns.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Replacement for redacted values
pub const REDACTED: &str = "***REDACTED***";

/// Attribute name fragments treated as secrets even when not marked sensitive
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "private_key",
    "ssh_key",
    "cert",
    "certificate",
];

/// Shorter secrets are only scrubbed where they form a whole JSON string
/// literal, never as a substring
const MIN_SCRUB_LEN: usize = 4;

lazy_static! {
    static ref SSH_KEY: Regex =
        Regex::new(r"ssh-rsa\s+[A-Za-z0-9+/]+={0,3}(?:[ \t]+[^\s\x22]+)?")
            .expect("Invalid SSH key regex");
    static ref UUID: Regex = Regex::new(
        r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b"
    )
    .expect("Invalid UUID regex");
    static ref IPV4: Regex =
        Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("Invalid IPv4 regex");
    static ref SECRET_FIELD: Regex = Regex::new(
        r#""(password|admin_password|access_key|secret_key|token|api_key|client_secret)"\s*:\s*"(?:[^"\\]|\\.)*""#
    )
    .expect("Invalid secret field regex");
}

/// Redact SSH keys, subscription ids, IPv4 addresses and secret-bearing JSON
/// fields from free text
pub fn redact_text(text: &str) -> String {
    let text = SSH_KEY.replace_all(text, "ssh-rsa ***REDACTED SSH KEY***");
    let text = UUID.replace_all(&text, "***REDACTED-SUBSCRIPTION-ID***");
    let text = IPV4.replace_all(&text, "***REDACTED-IP***");
    let text = SECRET_FIELD.replace_all(&text, format!("\"${{1}}\": \"{}\"", REDACTED));
    text.into_owned()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|fragment| key.contains(fragment))
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}

/// The set of sensitive paths found in a plan document
#[derive(Debug, Default, Clone)]
pub struct SensitivePaths {
    paths: BTreeSet<String>,
}

impl SensitivePaths {
    pub fn collect(plan: &Value) -> Self {
        let mut paths = BTreeSet::new();
        walk(plan, "", &mut paths);
        sensitive_variables(plan, &mut paths);
        Self { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Whether `prefix` or anything below it is sensitive
    pub fn any_under(&self, prefix: &str) -> bool {
        self.paths.iter().any(|p| {
            p == prefix
                || p.strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
        })
    }

    /// Deep copy of `plan` with every non-null sensitive value replaced
    pub fn redact(&self, plan: &Value) -> Value {
        self.redact_at(plan, "")
    }

    fn redact_at(&self, value: &Value, path: &str) -> Value {
        if !path.is_empty() && self.paths.contains(path) && !value.is_null() {
            return Value::String(REDACTED.to_string());
        }

        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.redact_at(v, &child(path, k))))
                    .collect::<Map<String, Value>>(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| self.redact_at(v, &index(path, i)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Cleartext strings held at sensitive paths, longest first
    pub fn secrets(&self, plan: &Value) -> Vec<String> {
        let mut secrets = BTreeSet::new();
        self.secrets_at(plan, "", &mut secrets);

        let mut secrets: Vec<String> = secrets.into_iter().collect();
        secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        secrets
    }

    fn secrets_at(&self, value: &Value, path: &str, out: &mut BTreeSet<String>) {
        if !path.is_empty() && self.paths.contains(path) {
            string_leaves(value, out);
            return;
        }

        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    self.secrets_at(v, &child(path, k), out);
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    self.secrets_at(v, &index(path, i), out);
                }
            }
            _ => {}
        }
    }
}

fn string_leaves(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) if !s.is_empty() && s != REDACTED => {
            out.insert(s.clone());
        }
        Value::Object(map) => map.values().for_each(|v| string_leaves(v, out)),
        Value::Array(items) => items.iter().for_each(|v| string_leaves(v, out)),
        _ => {}
    }
}

/// Replace every occurrence of the given secrets, raw or JSON-escaped
pub fn scrub(text: &str, secrets: &[String]) -> String {
    let mut text = text.to_string();
    for secret in secrets {
        if secret.chars().count() < MIN_SCRUB_LEN {
            text = scrub_literal(&text, secret);
            continue;
        }

        text = text.replace(secret.as_str(), REDACTED);
        if let Ok(quoted) = serde_json::to_string(secret) {
            let escaped = &quoted[1..quoted.len() - 1];
            if escaped != secret {
                text = text.replace(escaped, REDACTED);
            }
        }
    }
    text
}

/// Replace `"secret"` string values; object keys with the same text stay
fn scrub_literal(text: &str, secret: &str) -> String {
    let Ok(quoted) = serde_json::to_string(secret) else {
        return text.to_string();
    };
    let Ok(literal) = Regex::new(&format!(r"{}(\s*:)?", regex::escape(&quoted))) else {
        return text.to_string();
    };

    literal
        .replace_all(text, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                format!("\"{}\"", REDACTED)
            }
        })
        .into_owned()
}

fn walk(node: &Value, path: &str, out: &mut BTreeSet<String>) {
    match node {
        Value::Object(map) => {
            for (flags, target) in [
                ("sensitive_values", "values"),
                ("before_sensitive", "before"),
                ("after_sensitive", "after"),
            ] {
                if let Some(flags) = map.get(flags) {
                    mark(flags, &child(path, target), out);
                }
            }

            // outputs: { "sensitive": true, "value": ... }
            if map.get("sensitive") == Some(&Value::Bool(true)) && map.contains_key("value") {
                out.insert(child(path, "value"));
            }

            for target in ["before", "after", "values"] {
                if let Some(value) = map.get(target) {
                    by_key_name(value, &child(path, target), out);
                }
            }

            for (key, value) in map {
                if value.is_object() || value.is_array() {
                    walk(value, &child(path, key), out);
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &index(path, i), out);
            }
        }
        _ => {}
    }
}

/// Follow a sensitivity flag tree; `true` marks the whole subtree
fn mark(flags: &Value, path: &str, out: &mut BTreeSet<String>) {
    match flags {
        Value::Bool(true) => {
            out.insert(path.to_string());
        }
        Value::Object(map) => {
            for (key, value) in map {
                mark(value, &child(path, key), out);
            }
        }
        Value::Array(items) => {
            for (i, value) in items.iter().enumerate() {
                mark(value, &index(path, i), out);
            }
        }
        _ => {}
    }
}

fn by_key_name(node: &Value, path: &str, out: &mut BTreeSet<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let key_path = child(path, key);
                if is_sensitive_key(key) {
                    out.insert(key_path.clone());
                }
                by_key_name(value, &key_path, out);
            }
        }
        Value::Array(items) => {
            for (i, value) in items.iter().enumerate() {
                by_key_name(value, &index(path, i), out);
            }
        }
        _ => {}
    }
}

/// Input variables declared sensitive in the configuration, or named like
/// a secret
fn sensitive_variables(plan: &Value, out: &mut BTreeSet<String>) {
    let Some(variables) = plan.get("variables").and_then(Value::as_object) else {
        return;
    };
    let declared = plan
        .pointer("/configuration/root_module/variables")
        .and_then(Value::as_object);

    for name in variables.keys() {
        let declared_sensitive = declared
            .and_then(|d| d.get(name))
            .and_then(|v| v.get("sensitive"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if declared_sensitive || is_sensitive_key(name) {
            out.insert(format!("variables.{}.value", name));
        }
    }
}
