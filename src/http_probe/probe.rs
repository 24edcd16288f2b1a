use std::sync::Arc;
use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::{Client, Response, StatusCode, redirect};
use thiserror::Error;
use unicode_truncate::UnicodeTruncateStr;
use url::Url;

use super::prelude::*;
use super::report;
use crate::config::probe_config::ProbeConfig;
use crate::output::{DEFAULT_USER_AGENT, ResultSink};
use crate::stats::RequestCounter;

const MAX_REDIRECTS: usize = 10;
const PREVIEW_WIDTH: usize = 80;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },
}

#[derive(Debug, Error)]
enum SendError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),
}

/// Shared, read-only state handed to every probe.
pub struct ProbeContext {
    pub client: Client,
    pub config: Arc<ProbeConfig>,
    pub sink: Arc<dyn ResultSink>,
    pub counter: RequestCounter,
}

/// Builds the client shared by all workers.
///
/// Redirects are disabled here and followed in `send` so the configured method is
/// kept on every hop. Certificates are not verified.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(redirect::Policy::none())
        .user_agent(DEFAULT_USER_AGENT)
        .http1_only()
        .http1_title_case_headers()
        .build()
}

/// Sends one request per catalog header to `url` and emits every response that
/// passes classification. Transport failures are logged and the next header is tried.
pub async fn probe_url(ctx: &ProbeContext, url: &str) -> Result<(), ProbeError> {
    if url.is_empty() || url == "\0" {
        return Ok(());
    }

    let target = Url::parse(url).map_err(|source| ProbeError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(ProbeError::UnsupportedScheme {
            url: url.to_string(),
            scheme: target.scheme().to_string(),
        });
    }

    let config = &ctx.config;
    for bypass in &config.catalog {
        log::debug!(
            "Creating request with method {} for header {}={}",
            config.method,
            bypass.name,
            bypass.value
        );
        let request = SentRequest::new(config.method.clone(), target.clone(), bypass, &config.custom_headers);

        let response = match send(&ctx.client, &request, config.timeout, &ctx.counter).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Request to {url} with {}: {} failed: {}", bypass.name, bypass.value, report(&e));
                continue;
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Reading response body from {url} with {}: {}", bypass.name, report(&e));
                continue;
            }
        };

        let result = ProbeResult::new(url, request, bypass, status, &body);
        if !classify(&result.metrics, &config.rules) {
            log::debug!(
                "Dropped {url} [{}]: status {}, size {}",
                bypass.name,
                status,
                result.metrics.size
            );
            continue;
        }

        ctx.sink.emit(&result);
        log::debug!("Request completed: {url} [{}] {}", bypass.name, preview(&result.body));
    }

    Ok(())
}

/// Sends the request, following redirects by hand with the same method and headers.
async fn send(
    client: &Client,
    request: &SentRequest,
    timeout: Duration,
    counter: &RequestCounter,
) -> Result<Response, SendError> {
    let mut url = request.url.clone();

    for _ in 0..=MAX_REDIRECTS {
        let mut builder = client.request(request.method.clone(), url.clone()).timeout(timeout);
        // `header` appends, so a custom header never replaces the catalog one
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        counter.record();
        let response = builder.send().await?;

        let Some(next) = redirect_target(&url, &response) else {
            return Ok(response);
        };
        log::debug!("Following redirect {url} -> {next} with method {}", request.method);
        url = next;
    }

    Err(SendError::TooManyRedirects(MAX_REDIRECTS))
}

fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    match response.status() {
        StatusCode::MOVED_PERMANENTLY
        | StatusCode::FOUND
        | StatusCode::SEE_OTHER
        | StatusCode::TEMPORARY_REDIRECT
        | StatusCode::PERMANENT_REDIRECT => {}
        _ => return None,
    }

    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

fn preview(body: &str) -> String {
    let flat = body.replace(['\r', '\n'], " ");
    let (truncated, _) = flat.unicode_truncate(PREVIEW_WIDTH);
    truncated.to_string()
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::probe_config::OutputOptions;
    use crate::http_probe::catalog::default_catalog;
    use crate::http_probe::classifier::ResponseRules;
    use crate::output::test_support::CollectingSink;
    use crate::stats::spawn_reporter;

    fn config(catalog: Vec<BypassHeader>) -> ProbeConfig {
        ProbeConfig {
            method: Method::GET,
            catalog,
            custom_headers: Vec::new(),
            rules: ResponseRules::default(),
            timeout: Duration::from_secs(5),
            output: OutputOptions::default(),
        }
    }

    fn context(config: ProbeConfig) -> (ProbeContext, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let (counter, _reporter) = spawn_reporter(Duration::from_secs(1));
        let ctx = ProbeContext {
            client: build_client().expect("client"),
            config: Arc::new(config),
            sink: sink.clone(),
            counter,
        };
        (ctx, sink)
    }

    #[tokio::test]
    async fn test_every_catalog_header_is_tried() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let (ctx, sink) = context(config(default_catalog()));
        probe_url(&ctx, &server.uri()).await.unwrap();

        let names: Vec<String> = sink.hits().into_iter().map(|(_, name, _)| name).collect();
        let expected: Vec<String> = default_catalog().into_iter().map(|h| h.name).collect();
        assert_eq!(names, expected);
        assert_eq!(server.received_requests().await.unwrap().len(), 19);
    }

    #[tokio::test]
    async fn test_custom_header_is_appended_after_catalog_header() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut cfg = config(vec![BypassHeader::new("X-Forwarded-For", "127.0.0.1")]);
        cfg.custom_headers = vec![
            ("X-Forwarded-For".to_string(), "10.0.0.1".to_string()),
            ("X-Test".to_string(), "Test".to_string()),
        ];
        let (ctx, _sink) = context(cfg);
        probe_url(&ctx, &server.uri()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let forwarded: Vec<&str> = requests[0]
            .headers
            .get_all("x-forwarded-for")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(forwarded, vec!["127.0.0.1", "10.0.0.1"]);
        assert_eq!(requests[0].headers.get("x-test").unwrap(), "Test");
    }

    #[tokio::test]
    async fn test_headers_do_not_leak_between_requests() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (ctx, _sink) = context(config(vec![
            BypassHeader::new("X-Original-URL", "/original-url"),
            BypassHeader::new("X-Rewrite-URL", "/rewrite-url"),
        ]));
        probe_url(&ctx, &server.uri()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].headers.get("x-original-url").is_some());
        assert!(requests[0].headers.get("x-rewrite-url").is_none());
        assert!(requests[1].headers.get("x-rewrite-url").is_some());
        assert!(requests[1].headers.get("x-original-url").is_none());
    }

    #[tokio::test]
    async fn test_filtered_status_is_not_reported() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let mut cfg = config(default_catalog());
        cfg.rules.filter.status.insert(403);
        let (ctx, sink) = context(cfg);
        probe_url(&ctx, &server.uri()).await.unwrap();

        assert!(sink.hits().is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 19);
    }

    #[tokio::test]
    async fn test_match_size() {
        let server = MockServer::start().await;
        Mock::given(path("/short"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(511)))
            .mount(&server)
            .await;
        Mock::given(path("/exact"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(512)))
            .mount(&server)
            .await;

        let mut cfg = config(vec![BypassHeader::new("X-Forwarded-For", "127.0.0.1")]);
        cfg.rules.matcher.size.insert(512);
        let (ctx, sink) = context(cfg);
        probe_url(&ctx, &format!("{}/short", server.uri())).await.unwrap();
        probe_url(&ctx, &format!("{}/exact", server.uri())).await.unwrap();

        let hits = sink.hits();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].0.ends_with("/exact"));
    }

    #[tokio::test]
    async fn test_redirect_keeps_method() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/end"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/end"))
            .respond_with(ResponseTemplate::new(200).set_body_string("made it"))
            .mount(&server)
            .await;

        let mut cfg = config(vec![BypassHeader::new("X-Original-URL", "/original-url")]);
        cfg.method = Method::PUT;
        let (ctx, sink) = context(cfg);
        probe_url(&ctx, &format!("{}/start", server.uri())).await.unwrap();

        let hits = sink.hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].2, 200);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert_eq!(request.method, Method::PUT);
            assert_eq!(request.headers.get("x-original-url").unwrap(), "/original-url");
        }
        assert_eq!(requests[1].url.path(), "/end");
    }

    #[tokio::test]
    async fn test_redirect_loop_is_abandoned() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/loop"))
            .mount(&server)
            .await;

        let (ctx, sink) = context(config(vec![BypassHeader::new("X-Forwarded-For", "127.0.0.1")]));
        probe_url(&ctx, &server.uri()).await.unwrap();

        assert!(sink.hits().is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), MAX_REDIRECTS + 1);
    }

    #[tokio::test]
    async fn test_transport_error_moves_to_next_header() {
        let mut cfg = config(vec![
            BypassHeader::new("X-Forwarded-For", "127.0.0.1"),
            BypassHeader::new("X-Remote-IP", "127.0.0.1"),
        ]);
        cfg.timeout = Duration::from_secs(2);
        let (ctx, sink) = context(cfg);

        // nothing listens on port 1
        probe_url(&ctx, "http://127.0.0.1:1/").await.unwrap();
        assert!(sink.hits().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_nul_urls_are_skipped() {
        let (ctx, sink) = context(config(default_catalog()));
        probe_url(&ctx, "").await.unwrap();
        probe_url(&ctx, "\0").await.unwrap();
        assert!(sink.hits().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_urls_are_errors() {
        let (ctx, _sink) = context(config(default_catalog()));

        let err = probe_url(&ctx, "not a url").await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUrl { .. }));

        let err = probe_url(&ctx, "ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, ProbeError::UnsupportedScheme { scheme, .. } if scheme == "ftp"));
    }

    #[test]
    fn test_preview_flattens_and_truncates() {
        assert_eq!(preview("a\r\nb"), "a  b");
        assert_eq!(preview(&"x".repeat(200)).len(), PREVIEW_WIDTH);
    }
}
