/// Headers commonly trusted by reverse proxies and CDNs, in the order they are tried.
pub const BYPASS_HEADERS: &[(&str, &str)] = &[
    ("X-Forwarded-For", "127.0.0.1"),
    ("Client-IP", "127.0.0.1"),
    ("Cluster-Client-IP", "127.0.0.1"),
    ("Connection", "keep-alive"),
    ("Content-Length", "0"),
    ("Forwarded-For", "127.0.0.1"),
    ("Host", "example.com"),
    ("Referer", "https://example.com"),
    ("True-Client-IP", "127.0.0.1"),
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36",
    ),
    ("X-Custom-IP-Authorization", "127.0.0.1"),
    ("X-Forwarded", "127.0.0.1"),
    ("X-Forwarded-Port", "443"),
    ("X-Original-URL", "/original-url"),
    ("X-Originating-IP", "127.0.0.1"),
    ("X-ProxyUser-Ip", "127.0.0.1"),
    ("X-Remote-Addr", "127.0.0.1"),
    ("X-Remote-IP", "127.0.0.1"),
    ("X-Rewrite-URL", "/rewrite-url"),
];

/// A single spoofed header sent alongside a probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassHeader {
    pub name: String,
    pub value: String,
}

impl BypassHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Builds the built-in catalog. Called once at startup.
pub fn default_catalog() -> Vec<BypassHeader> {
    BYPASS_HEADERS
        .iter()
        .map(|(name, value)| BypassHeader::new(*name, *value))
        .collect()
}
