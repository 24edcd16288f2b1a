use std::path::PathBuf;

use clap::Parser;

use crate::dispatcher::RateScope;
use crate::runner::Mode;

/// MonkeyWrench - probe URLs for 403 bypasses using spoofed proxy headers
#[derive(Debug, Parser)]
#[command(name = "monkeywrench", version, about)]
#[command(after_help = "Examples:
  # Full mode with custom headers
  monkeywrench --mode full --file urls.txt -H 'User-Agent: Mozilla, X-Test: Test'

  # Headers mode with stdin input and YAML output
  cat urls.txt | monkeywrench --mode headers --yaml --requests")]
pub struct Cli {
    /// The mode to run
    #[arg(long, value_enum)]
    pub mode: Mode,

    /// Path to the file containing URLs (reads stdin when omitted)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// YAML profile with default settings
    #[arg(long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// HTTP method to use [default: GET]
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Number of workers to use, clamped to 1-100 [default: 10]
    #[arg(long, allow_negative_numbers = true, env = "MONKEYWRENCH_WORKERS")]
    pub workers: Option<i64>,

    /// Rate limit in requests per second, 0 for unlimited [default: 0]
    #[arg(long, env = "MONKEYWRENCH_RATE")]
    pub rate: Option<f64>,

    /// Whether the rate applies to each worker or to all workers together
    #[arg(long, value_enum, default_value_t = RateScope::PerWorker)]
    pub rate_scope: RateScope,

    /// Per-request timeout in seconds [default: 15]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Comma-separated list of custom headers in 'Key: Value' format
    #[arg(short = 'H', long = "header")]
    pub headers: Option<String>,

    /// Print HTTP requests in Burp Suite style
    #[arg(long)]
    pub requests: bool,

    /// Enable YAML output for responses
    #[arg(long)]
    pub yaml: bool,

    /// Print only the URL
    #[arg(long)]
    pub simple: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Exclude responses by size (comma-separated)
    #[arg(long = "fs", default_value = "")]
    pub filter_size: String,

    /// Exclude responses by word count (comma-separated)
    #[arg(long = "fw", default_value = "")]
    pub filter_words: String,

    /// Exclude responses by HTTP status code (comma-separated)
    #[arg(long = "fc", default_value = "")]
    pub filter_status: String,

    /// Exclude responses by line count (comma-separated)
    #[arg(long = "fl", default_value = "")]
    pub filter_lines: String,

    /// Match responses by size (comma-separated)
    #[arg(long = "ms", default_value = "")]
    pub match_size: String,

    /// Match responses by word count (comma-separated)
    #[arg(long = "mw", default_value = "")]
    pub match_words: String,

    /// Match responses by HTTP status code (comma-separated)
    #[arg(long = "mc", default_value = "")]
    pub match_status: String,

    /// Match responses by line count (comma-separated)
    #[arg(long = "ml", default_value = "")]
    pub match_lines: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mode_is_required() {
        assert!(Cli::try_parse_from(["monkeywrench"]).is_err());
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "monkeywrench",
            "--mode",
            "headers",
            "-X",
            "post",
            "--workers",
            "0",
            "--rate",
            "1.5",
            "-H",
            "X-Test: 1",
            "--fc",
            "403,404",
            "--ms",
            "512",
            "--simple",
        ])
        .unwrap();

        assert_eq!(cli.mode, Mode::Headers);
        assert_eq!(cli.method.as_deref(), Some("post"));
        assert_eq!(cli.workers, Some(0));
        assert_eq!(cli.rate, Some(1.5));
        assert_eq!(cli.rate_scope, RateScope::PerWorker);
        assert_eq!(cli.headers.as_deref(), Some("X-Test: 1"));
        assert_eq!(cli.filter_status, "403,404");
        assert_eq!(cli.match_size, "512");
        assert!(cli.simple);
        assert!(!cli.yaml);
    }

    #[test]
    fn test_shared_rate_scope() {
        let cli = Cli::try_parse_from(["monkeywrench", "--mode", "full", "--rate-scope", "shared"]).unwrap();
        assert_eq!(cli.mode, Mode::Full);
        assert_eq!(cli.rate_scope, RateScope::Shared);
    }
}
