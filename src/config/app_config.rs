use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatcher::{self, RateScope};
use crate::http_probe::catalog::default_catalog;
use crate::http_probe::classifier::{Metric, MetricSets, ResponseRules};
use crate::runner::Mode;

use super::cli::Cli;
use super::model::Profile;
use super::probe_config::{
    ConfigError, DEFAULT_TIMEOUT, OutputOptions, ProbeConfig, parse_custom_headers, parse_int_list,
    parse_method, push_header,
};

const DEFAULT_METHOD: &str = "GET";
const DEFAULT_WORKERS: i64 = 10;

pub struct AppConfig {
    pub probe: ProbeConfig,
    pub mode: Mode,
    /// `None` reads URLs from stdin.
    pub input: Option<PathBuf>,
    /// Already clamped to the dispatcher's bounds.
    pub workers: usize,
    pub rate: f64,
    pub rate_scope: RateScope,
}

/// Load the application configuration from the command line and the optional YAML profile.
/// The profile location comes from `--config` or the `CONFIG_FILE` environment variable.
/// Every error here is fatal and is reported before any request is sent.
pub fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let profile = match &cli.config {
        Some(path) => load_profile(path)?,
        None => Profile::default(),
    };
    resolve(cli, profile)
}

pub fn load_profile(path: &Path) -> Result<Profile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadProfile {
        path: path.to_path_buf(),
        source,
    })?;
    let profile = serde_yaml::from_str(&raw).map_err(|source| ConfigError::ParseProfile {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Loaded profile from {}", path.display());
    Ok(profile)
}

/// Merge command line values over the profile, and the profile over built-in defaults.
pub fn resolve(cli: &Cli, profile: Profile) -> Result<AppConfig, ConfigError> {
    let rules = parse_rules(cli, &profile)?;

    let method = cli
        .method
        .as_deref()
        .or(profile.method.as_deref())
        .unwrap_or(DEFAULT_METHOD);
    let method = parse_method(method)?;

    let mut custom_headers = Vec::new();
    for (name, value) in &profile.headers {
        push_header(&mut custom_headers, name, value);
    }
    if let Some(raw) = &cli.headers {
        for (name, value) in parse_custom_headers(raw) {
            push_header(&mut custom_headers, &name, &value);
        }
    }

    let timeout = cli
        .timeout
        .or(profile.timeout_seconds)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);

    let workers = cli.workers.or(profile.workers).unwrap_or(DEFAULT_WORKERS);
    let workers = dispatcher::clamp_workers(usize::try_from(workers).unwrap_or(0));
    let rate = cli.rate.or(profile.rate).unwrap_or(0.0);

    log::debug!("Using HTTP method: {method}");
    log::debug!("Workers: {workers}, rate: {rate}/s ({:?})", cli.rate_scope);

    Ok(AppConfig {
        probe: ProbeConfig {
            method,
            catalog: default_catalog(),
            custom_headers,
            rules,
            timeout,
            output: OutputOptions {
                simple: cli.simple,
                yaml: cli.yaml,
                print_requests: cli.requests,
            },
        },
        mode: cli.mode,
        input: cli.file.clone(),
        workers,
        rate,
        rate_scope: cli.rate_scope,
    })
}

fn parse_rules(cli: &Cli, profile: &Profile) -> Result<ResponseRules, ConfigError> {
    let filters = [
        (Metric::Size, "filter size", &cli.filter_size),
        (Metric::Words, "filter words", &cli.filter_words),
        (Metric::Status, "filter status", &cli.filter_status),
        (Metric::Lines, "filter lines", &cli.filter_lines),
    ];
    let matchers = [
        (Metric::Size, "match size", &cli.match_size),
        (Metric::Words, "match words", &cli.match_words),
        (Metric::Status, "match status", &cli.match_status),
        (Metric::Lines, "match lines", &cli.match_lines),
    ];

    let mut rules = ResponseRules::default();
    fill_sets(&mut rules.filter, &filters)?;
    fill_sets(&mut rules.matcher, &matchers)?;
    profile.filter.merge_into(&mut rules.filter);
    profile.matcher.merge_into(&mut rules.matcher);
    if !rules.filter.is_empty() || !rules.matcher.is_empty() {
        log::debug!("Response rules: {rules:?}");
    }
    Ok(rules)
}

fn fill_sets(sets: &mut MetricSets, options: &[(Metric, &'static str, &String)]) -> Result<(), ConfigError> {
    for (metric, option, raw) in options {
        *sets.get_mut(*metric) = parse_int_list(option, raw)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::io::Write;

    use clap::Parser;
    use reqwest::Method;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["monkeywrench", "--mode", "full"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("valid arguments")
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&cli(&[]), Profile::default()).unwrap();

        assert_eq!(config.mode, Mode::Full);
        assert_eq!(config.workers, 10);
        assert_eq!(config.rate, 0.0);
        assert_eq!(config.rate_scope, RateScope::PerWorker);
        assert!(config.input.is_none());
        assert_eq!(config.probe.method, Method::GET);
        assert_eq!(config.probe.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.probe.catalog.len(), 19);
        assert!(config.probe.custom_headers.is_empty());
        assert_eq!(config.probe.rules, ResponseRules::default());
        assert_eq!(config.probe.output, OutputOptions::default());
    }

    #[test]
    fn test_worker_clamp() {
        assert_eq!(resolve(&cli(&["--workers", "0"]), Profile::default()).unwrap().workers, 1);
        assert_eq!(resolve(&cli(&["--workers", "500"]), Profile::default()).unwrap().workers, 100);
        assert_eq!(resolve(&cli(&["--workers", "-3"]), Profile::default()).unwrap().workers, 1);
    }

    #[test]
    fn test_filter_and_match_strings() {
        let config = resolve(&cli(&["--fc", "403", "--ms", "512,1024"]), Profile::default()).unwrap();
        assert_eq!(config.probe.rules.filter.status, BTreeSet::from([403]));
        assert_eq!(config.probe.rules.matcher.size, BTreeSet::from([512, 1024]));
        assert!(config.probe.rules.filter.size.is_empty());
    }

    #[test]
    fn test_bad_integer_list_is_fatal() {
        let err = resolve(&cli(&["--fw", "ten"]), Profile::default())
            .err()
            .expect("should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidIntList {
                option: "filter words",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_custom_header_is_ignored() {
        let config = resolve(&cli(&["-H", "BadHeader"]), Profile::default()).unwrap();
        assert!(config.probe.custom_headers.is_empty());
    }

    #[test]
    fn test_cli_overrides_profile() {
        let profile: Profile = serde_yaml::from_str(
            r#"
            method: put
            workers: 3
            rate: 4.0
            timeout_seconds: 2
            headers:
                X-Api-Key: from-profile
                X-Team: red
            filter:
                status: [404]
            "#,
        )
        .unwrap();

        let config = resolve(
            &cli(&["-X", "delete", "--workers", "7", "-H", "X-Api-Key: from-cli", "--fc", "403"]),
            profile,
        )
        .unwrap();

        assert_eq!(config.probe.method, Method::DELETE);
        assert_eq!(config.workers, 7);
        assert_eq!(config.rate, 4.0);
        assert_eq!(config.probe.timeout, Duration::from_secs(2));
        assert_eq!(
            config.probe.custom_headers,
            vec![
                ("X-Api-Key".to_string(), "from-cli".to_string()),
                ("X-Team".to_string(), "red".to_string()),
            ]
        );
        assert_eq!(config.probe.rules.filter.status, BTreeSet::from([403, 404]));
    }

    #[test]
    fn test_load_profile_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "method: head\nmatch:\n  status: [200]").unwrap();

        let profile = load_profile(file.path()).unwrap();
        assert_eq!(profile.method.as_deref(), Some("head"));
        assert_eq!(profile.matcher.status, vec![200]);
    }

    #[test]
    fn test_missing_profile_is_fatal() {
        let err = load_profile(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadProfile { .. }));
    }

    #[test]
    fn test_invalid_profile_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers: [not, a, number]").unwrap();

        let err = load_profile(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseProfile { .. }));
    }
}
