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

//! Bulk operation reporting
//!
//! The merge buffers and writers report what they flushed, what they lost
//! and when a buffer outgrew its limit. Reporting is fire-and-forget.

use crate::bulk::FlushCategory;
use crate::store::{StoreError, TableName};
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

pub trait BulkOperationReporter: Send + Sync {
    fn report_flush(&self, table: &TableName, category: FlushCategory, rows: usize, columns: usize);

    fn report_failure(
        &self,
        table: &TableName,
        category: FlushCategory,
        rows: usize,
        columns: usize,
        error: &StoreError,
    );

    /// A cell was created while `buffer` held more than `limit` cells.
    fn report_overflow(&self, buffer: &str, live_cells: usize, limit: usize);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl BulkOperationReporter for NoopReporter {
    fn report_flush(&self, _: &TableName, _: FlushCategory, _: usize, _: usize) {}

    fn report_failure(&self, _: &TableName, _: FlushCategory, _: usize, _: usize, _: &StoreError) {}

    fn report_overflow(&self, _: &str, _: usize, _: usize) {}
}

/// Prometheus counters for bulk flushes.
#[derive(Clone)]
pub struct BulkOperationMetrics {
    flushed_rows: IntCounterVec,
    flushed_columns: IntCounterVec,
    failed_rows: IntCounterVec,
    failed_columns: IntCounterVec,
    overflows: IntCounterVec,
    overflow_live_cells: IntGaugeVec,
}

impl BulkOperationMetrics {
    /// Create the metric families and register them on `registry`.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let flush_labels = &["table", "category"];
        let metrics = Self {
            flushed_rows: IntCounterVec::new(
                Opts::new("linkmap_bulk_flushed_rows_total", "Rows written by bulk flushes"),
                flush_labels,
            )?,
            flushed_columns: IntCounterVec::new(
                Opts::new("linkmap_bulk_flushed_columns_total", "Columns written by bulk flushes"),
                flush_labels,
            )?,
            failed_rows: IntCounterVec::new(
                Opts::new("linkmap_bulk_failed_rows_total", "Rows lost to failed bulk writes"),
                flush_labels,
            )?,
            failed_columns: IntCounterVec::new(
                Opts::new(
                    "linkmap_bulk_failed_columns_total",
                    "Columns lost to failed bulk writes",
                ),
                flush_labels,
            )?,
            overflows: IntCounterVec::new(
                Opts::new("linkmap_bulk_overflow_total", "Cells created above the buffer limit"),
                &["buffer"],
            )?,
            overflow_live_cells: IntGaugeVec::new(
                Opts::new("linkmap_bulk_overflow_live_cells", "Live cells at the latest overflow"),
                &["buffer"],
            )?,
        };

        registry.register(Box::new(metrics.flushed_rows.clone()))?;
        registry.register(Box::new(metrics.flushed_columns.clone()))?;
        registry.register(Box::new(metrics.failed_rows.clone()))?;
        registry.register(Box::new(metrics.failed_columns.clone()))?;
        registry.register(Box::new(metrics.overflows.clone()))?;
        registry.register(Box::new(metrics.overflow_live_cells.clone()))?;
        Ok(metrics)
    }
}

impl BulkOperationReporter for BulkOperationMetrics {
    fn report_flush(
        &self,
        table: &TableName,
        category: FlushCategory,
        rows: usize,
        columns: usize,
    ) {
        let labels = [table.as_str(), category.as_str()];
        self.flushed_rows.with_label_values(&labels).inc_by(rows as u64);
        self.flushed_columns.with_label_values(&labels).inc_by(columns as u64);
    }

    fn report_failure(
        &self,
        table: &TableName,
        category: FlushCategory,
        rows: usize,
        columns: usize,
        _error: &StoreError,
    ) {
        let labels = [table.as_str(), category.as_str()];
        self.failed_rows.with_label_values(&labels).inc_by(rows as u64);
        self.failed_columns.with_label_values(&labels).inc_by(columns as u64);
    }

    fn report_overflow(&self, buffer: &str, live_cells: usize, _limit: usize) {
        self.overflows.with_label_values(&[buffer]).inc();
        self.overflow_live_cells
            .with_label_values(&[buffer])
            .set(live_cells as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_count_flushes_and_failures() {
        let registry = Registry::new();
        let metrics = BulkOperationMetrics::register(&registry).unwrap();
        let table = TableName::new("ApplicationMap");

        metrics.report_flush(&table, FlushCategory::Link, 3, 10);
        metrics.report_flush(&table, FlushCategory::Link, 1, 2);
        metrics.report_failure(
            &table,
            FlushCategory::AvgMax,
            2,
            4,
            &StoreError::Unavailable("down".into()),
        );

        assert_eq!(metrics.flushed_rows.with_label_values(&["ApplicationMap", "link"]).get(), 4);
        let flushed = metrics.flushed_columns.with_label_values(&["ApplicationMap", "link"]);
        assert_eq!(flushed.get(), 12);
        let failed = metrics.failed_columns.with_label_values(&["ApplicationMap", "avg_max"]);
        assert_eq!(failed.get(), 4);
        assert!(!registry.gather().is_empty());
    }

    #[test]
    fn test_overflow_tracks_live_cells() {
        let registry = Registry::new();
        let metrics = BulkOperationMetrics::register(&registry).unwrap();
        metrics.report_overflow("out_link/link", 1001, 1000);
        metrics.report_overflow("out_link/link", 1002, 1000);

        assert_eq!(metrics.overflows.with_label_values(&["out_link/link"]).get(), 2);
        assert_eq!(metrics.overflow_live_cells.with_label_values(&["out_link/link"]).get(), 1002);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        BulkOperationMetrics::register(&registry).unwrap();
        assert!(BulkOperationMetrics::register(&registry).is_err());
    }
}
