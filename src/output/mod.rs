use std::io::Write;

use colored::{Color, Colorize};
use serde::Serialize;
use url::Position;

use crate::config::probe_config::OutputOptions;
use crate::http_probe::result::{ProbeResult, SentRequest};

/// User-Agent the client sends unless a header overrides it.
pub const DEFAULT_USER_AGENT: &str = "403-Bypass-Tool";

/// Receives every response that passed classification.
pub trait ResultSink: Send + Sync {
    fn emit(&self, result: &ProbeResult);
}

/// Writes each hit to stdout according to the configured output toggles.
pub struct StdoutSink {
    options: OutputOptions,
}

impl StdoutSink {
    pub fn new(options: OutputOptions) -> Self {
        Self { options }
    }
}

impl ResultSink for StdoutSink {
    fn emit(&self, result: &ProbeResult) {
        let record = render_record(result, &self.options);
        // one write per record so concurrent workers never split a record
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(record.as_bytes()).and_then(|_| stdout.flush()) {
            log::error!("Writing result for {}: {e}", result.target);
        }
    }
}

#[derive(Serialize)]
struct ResponseDetails<'a> {
    status: u16,
    body: &'a str,
}

pub fn render_record(result: &ProbeResult, options: &OutputOptions) -> String {
    let mut out = String::new();

    if options.yaml {
        match render_yaml(result) {
            Ok(yaml) => {
                out.push_str("Response in YAML format:\n");
                out.push_str(&yaml);
                out.push('\n');
            }
            Err(e) => log::error!("Marshaling YAML for {}: {e}", result.target),
        }
    }

    if options.simple {
        out.push_str(&result.target);
    } else {
        let line = render_status_line(result);
        match status_color(result.metrics.status) {
            Some(color) => out.push_str(&line.color(color).to_string()),
            None => out.push_str(&line),
        }
    }
    out.push('\n');

    if options.print_requests {
        out.push_str(&render_raw_request(&result.request));
    }

    out
}

pub fn render_yaml(result: &ProbeResult) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&ResponseDetails {
        status: result.metrics.status,
        body: &result.body,
    })
}

/// `<method> | <status> | <url> | <header>: <value> | Size: <n>`
pub fn render_status_line(result: &ProbeResult) -> String {
    format!(
        "{} | {} | {} | {}: {} | Size: {}",
        result.request.method,
        result.metrics.status,
        result.target,
        result.header.name,
        result.header.value,
        result.metrics.size
    )
}

pub fn status_color(status: u16) -> Option<Color> {
    match status {
        500.. => Some(Color::Red),
        400.. => Some(Color::Yellow),
        300.. => Some(Color::Blue),
        200.. => Some(Color::Green),
        _ => None,
    }
}

/// Renders the request in Burp Suite style: request line, Host, headers, blank line.
pub fn render_raw_request(request: &SentRequest) -> String {
    let url = &request.url;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let mut out = format!(
        "{} {} HTTP/1.1\nHost: {}\n",
        request.method,
        &url[Position::BeforePath..Position::AfterQuery],
        host
    );

    for (name, value) in &request.headers {
        out.push_str(&format!("{name}: {value}\n"));
    }
    let has = |wanted: &str| request.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(wanted));
    if !has("User-Agent") {
        out.push_str(&format!("User-Agent: {DEFAULT_USER_AGENT}\n"));
    }
    if !has("Accept") {
        out.push_str("Accept: */*\n");
    }
    out.push('\n');

    out
}
