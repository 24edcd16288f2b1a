use std::collections::BTreeSet;

use super::result::ResponseMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Size,
    Words,
    Status,
    Lines,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Size, Metric::Words, Metric::Status, Metric::Lines];

    pub fn of(self, metrics: &ResponseMetrics) -> u64 {
        match self {
            Metric::Size => metrics.size as u64,
            Metric::Words => metrics.words as u64,
            Metric::Status => u64::from(metrics.status),
            Metric::Lines => metrics.lines as u64,
        }
    }
}

/// One integer set per metric. An empty set means "no rule for this metric".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricSets {
    pub size: BTreeSet<u64>,
    pub words: BTreeSet<u64>,
    pub status: BTreeSet<u64>,
    pub lines: BTreeSet<u64>,
}

impl MetricSets {
    pub fn get(&self, metric: Metric) -> &BTreeSet<u64> {
        match metric {
            Metric::Size => &self.size,
            Metric::Words => &self.words,
            Metric::Status => &self.status,
            Metric::Lines => &self.lines,
        }
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut BTreeSet<u64> {
        match metric {
            Metric::Size => &mut self.size,
            Metric::Words => &mut self.words,
            Metric::Status => &mut self.status,
            Metric::Lines => &mut self.lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        Metric::ALL.iter().all(|m| self.get(*m).is_empty())
    }
}

/// Filter sets exclude matching responses; match sets keep only matching responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseRules {
    pub filter: MetricSets,
    pub matcher: MetricSets,
}

/// Returns true when the response should be reported.
///
/// Every filter is checked before any match rule. A rejection from any metric is final.
pub fn classify(metrics: &ResponseMetrics, rules: &ResponseRules) -> bool {
    for metric in Metric::ALL {
        let set = rules.filter.get(metric);
        if !set.is_empty() && set.contains(&metric.of(metrics)) {
            return false;
        }
    }

    for metric in Metric::ALL {
        let set = rules.matcher.get(metric);
        if !set.is_empty() && !set.contains(&metric.of(metrics)) {
            return false;
        }
    }

    true
}
