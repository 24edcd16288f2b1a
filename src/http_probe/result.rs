use reqwest::Method;
use url::Url;

use super::catalog::BypassHeader;

/// The request as it was put on the wire, kept for the raw request dump.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub url: Url,
    /// Headers in append order: the catalog header first, then every custom header.
    pub headers: Vec<(String, String)>,
}

impl SentRequest {
    pub fn new(
        method: Method,
        url: Url,
        bypass: &BypassHeader,
        custom_headers: &[(String, String)],
    ) -> Self {
        let mut headers = Vec::with_capacity(custom_headers.len() + 1);
        headers.push((bypass.name.clone(), bypass.value.clone()));
        headers.extend(custom_headers.iter().cloned());
        Self {
            method,
            url,
            headers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseMetrics {
    pub status: u16,
    pub size: usize,
    pub words: usize,
    pub lines: usize,
}

impl ResponseMetrics {
    pub fn measure(status: u16, body: &[u8], text: &str) -> Self {
        Self {
            status,
            size: body.len(),
            words: word_count(text),
            lines: line_count(text),
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts `\n`-delimited segments, so an empty body is one line and a trailing
/// newline adds an empty segment.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

pub struct ProbeResult {
    /// The normalized URL the probe was started with.
    pub target: String,
    pub request: SentRequest,
    pub header: BypassHeader,
    pub metrics: ResponseMetrics,
    pub body: String,
}

impl ProbeResult {
    pub fn new(target: &str, request: SentRequest, header: &BypassHeader, status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).into_owned();
        Self {
            target: target.to_string(),
            request,
            header: header.clone(),
            metrics: ResponseMetrics::measure(status, body, &text),
            body: text,
        }
    }
}
