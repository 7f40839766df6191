// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Metric table
//!
//! Which statistics a link recorder emits for every edge, and how each one
//! is keyed, merged and flushed.
//!
//! | kind      | column    | merge | flush    |
//! |-----------|-----------|-------|----------|
//! | histogram | `0x01`    | sum   | link     |
//! | sum       | `0x02`    | sum   | avg/max  |
//! | max       | `0x03`    | max   | avg/max  |

use crate::config::MapLinkConfig;
use linkmap_storage::bulk::{FlushCategory, MergeOp};
use linkmap_storage::keys::ColumnKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Histogram,
    Sum,
    Max,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Histogram, MetricKind::Sum, MetricKind::Max];

    const fn index(self) -> usize {
        match self {
            MetricKind::Histogram => 0,
            MetricKind::Sum => 1,
            MetricKind::Max => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub enabled: bool,
    pub column: ColumnKind,
    pub op: MergeOp,
    pub category: FlushCategory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTable {
    specs: [MetricSpec; 3],
}

impl MetricTable {
    /// The histogram is always recorded.
    pub fn new(enable_avg: bool, enable_max: bool) -> Self {
        Self {
            specs: [
                MetricSpec {
                    enabled: true,
                    column: ColumnKind::Histogram,
                    op: MergeOp::Sum,
                    category: FlushCategory::Link,
                },
                MetricSpec {
                    enabled: enable_avg,
                    column: ColumnKind::Sum,
                    op: MergeOp::Sum,
                    category: FlushCategory::AvgMax,
                },
                MetricSpec {
                    enabled: enable_max,
                    column: ColumnKind::Max,
                    op: MergeOp::Max,
                    category: FlushCategory::AvgMax,
                },
            ],
        }
    }

    pub fn from_config(config: &MapLinkConfig) -> Self {
        Self::new(config.enable_avg, config.enable_max)
    }

    pub fn spec(&self, kind: MetricKind) -> &MetricSpec {
        &self.specs[kind.index()]
    }

    pub fn enabled(&self) -> impl Iterator<Item = (MetricKind, &MetricSpec)> + '_ {
        MetricKind::ALL
            .into_iter()
            .map(|kind| (kind, self.spec(kind)))
            .filter(|(_, spec)| spec.enabled)
    }
}

impl Default for MetricTable {
    fn default() -> Self {
        Self::new(true, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_always_enabled() {
        let table = MetricTable::new(false, false);
        let enabled: Vec<_> = table.enabled().map(|(kind, _)| kind).collect();
        assert_eq!(enabled, vec![MetricKind::Histogram]);
    }

    #[test]
    fn test_avg_and_max_flush_together() {
        let table = MetricTable::default();
        assert_eq!(table.spec(MetricKind::Histogram).category, FlushCategory::Link);
        assert_eq!(table.spec(MetricKind::Sum).category, FlushCategory::AvgMax);
        assert_eq!(table.spec(MetricKind::Max).op, MergeOp::Max);
        assert_eq!(table.spec(MetricKind::Max).column, ColumnKind::Max);
        assert_eq!(table.enabled().count(), 3);
    }
}
