//! Statistics snapshots returned by plugins and aggregated by the core.

use serde::Serialize;

/// Point-in-time statistics of one plugin instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub name: String,
    pub values: serde_json::Map<String, serde_json::Value>,
    pub children: Vec<Statistics>,
}

impl Statistics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// Ordered list of statistics, one entry per collection member.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsList(pub Vec<Statistics>);

impl StatisticsList {
    pub fn push(&mut self, stats: Statistics) {
        self.0.push(stats);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statistics> {
        self.0.iter()
    }
}

impl FromIterator<Statistics> for StatisticsList {
    fn from_iter<I: IntoIterator<Item = Statistics>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
