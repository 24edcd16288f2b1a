use std::collections::BTreeMap;

use serde::Deserialize;

use crate::http_probe::classifier::{Metric, MetricSets};

/// An optional YAML profile with defaults for a run.
/// Values given on the command line take precedence over the profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    /// HTTP method used for every request.
    pub method: Option<String>,

    /// Number of concurrent workers, clamped to 1..=100.
    pub workers: Option<i64>,

    /// Requests per second; 0 means unlimited.
    pub rate: Option<f64>,

    /// Per-request timeout in seconds.
    pub timeout_seconds: Option<u64>,

    /// Custom headers sent with every request, after the bypass header.
    pub headers: BTreeMap<String, String>,

    /// Responses to exclude.
    pub filter: RuleLists,

    /// Responses to keep. Every non-empty list must contain the response's value.
    #[serde(rename = "match")]
    pub matcher: RuleLists,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleLists {
    pub size: Vec<u64>,
    pub words: Vec<u64>,
    pub status: Vec<u64>,
    pub lines: Vec<u64>,
}

impl RuleLists {
    pub fn get(&self, metric: Metric) -> &[u64] {
        match metric {
            Metric::Size => &self.size,
            Metric::Words => &self.words,
            Metric::Status => &self.status,
            Metric::Lines => &self.lines,
        }
    }

    /// Adds every listed value to the matching set.
    pub fn merge_into(&self, sets: &mut MetricSets) {
        for metric in Metric::ALL {
            sets.get_mut(metric).extend(self.get(metric).iter().copied());
        }
    }
}
