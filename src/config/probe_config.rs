use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::http_probe::catalog::BypassHeader;
use crate::http_probe::classifier::ResponseRules;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {option} value '{value}': expected comma separated integers")]
    InvalidIntList { option: &'static str, value: String },

    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("failed to read config file {path}: {source}")]
    ReadProfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    ParseProfile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Output toggles. They are independent and may all be enabled at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Print only the URL of each hit.
    pub simple: bool,
    /// Print a YAML document with the status and body of each hit.
    pub yaml: bool,
    /// Print each hit's request in Burp Suite style.
    pub print_requests: bool,
}

/// Everything a probe needs. Built once, then shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Uppercased and validated at construction.
    pub method: Method,
    pub catalog: Vec<BypassHeader>,
    /// Appended after the catalog header on every request.
    pub custom_headers: Vec<(String, String)>,
    pub rules: ResponseRules,
    pub timeout: Duration,
    pub output: OutputOptions,
}

pub fn parse_method(raw: &str) -> Result<Method, ConfigError> {
    let upper = raw.trim().to_uppercase();
    if upper.is_empty() {
        return Err(ConfigError::InvalidMethod(raw.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| ConfigError::InvalidMethod(raw.to_string()))
}

/// Parses a comma separated list of non-negative integers. An empty string is an empty set.
pub fn parse_int_list(option: &'static str, raw: &str) -> Result<BTreeSet<u64>, ConfigError> {
    if raw.is_empty() {
        return Ok(BTreeSet::new());
    }

    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidIntList {
                    option,
                    value: raw.to_string(),
                })
        })
        .collect()
}

/// Parses `"Key: Value, Key2: Value2"`. Malformed pairs are logged and skipped.
///
/// Pairs are split on every comma, so header values cannot contain one.
pub fn parse_custom_headers(raw: &str) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if raw.is_empty() {
        return headers;
    }

    for pair in raw.split(',') {
        let Some((name, value)) = pair.split_once(':') else {
            log::warn!("Invalid header format: {pair}");
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
            log::warn!("Invalid header format: {pair}");
            continue;
        }
        push_header(&mut headers, name, value);
    }

    headers
}

/// Adds a header, replacing the value of an earlier one with the same (case-insensitive) name.
pub fn push_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(existing) => existing.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}
