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

//! Bulk writer
//!
//! One writer per statistics table. It owns the buffers of both flush
//! categories and drains them into the store. Once a drain returns, the
//! writer alone is responsible for the data: a failed or timed out write is
//! reported and logged as lost, never merged back.

use super::{BulkIncrementer, CellKey, FlushCategory, MergeOp, RowRef};
use crate::keys::{ColumnName, RowKey};
use crate::reporter::BulkOperationReporter;
use crate::store::{FlushBatch, RowWrite, StatisticsStore, StoreError, TableName};
use std::collections::HashSet;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct BulkWriterConfig {
    /// Upper bound of one store write.
    pub write_timeout: Duration,
    /// Rows per store write; larger batches are split.
    pub max_rows_per_write: usize,
}

impl Default for BulkWriterConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(3),
            max_rows_per_write: 1000,
        }
    }
}

/// Result of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub written_rows: usize,
    pub written_columns: usize,
    pub failed_rows: usize,
    pub failed_columns: usize,
}

impl FlushOutcome {
    pub fn is_empty(&self) -> bool {
        self.written_rows == 0 && self.failed_rows == 0
    }

    pub fn is_success(&self) -> bool {
        self.failed_rows == 0
    }
}

impl AddAssign for FlushOutcome {
    fn add_assign(&mut self, other: Self) {
        self.written_rows += other.written_rows;
        self.written_columns += other.written_columns;
        self.failed_rows += other.failed_rows;
        self.failed_columns += other.failed_columns;
    }
}

pub struct BulkWriter {
    name: String,
    table: TableName,
    link: Arc<dyn BulkIncrementer>,
    avg_max: Arc<dyn BulkIncrementer>,
    store: Arc<dyn StatisticsStore>,
    reporter: Arc<dyn BulkOperationReporter>,
    config: BulkWriterConfig,
}

impl BulkWriter {
    pub fn new(
        name: impl Into<String>,
        table: TableName,
        link: Arc<dyn BulkIncrementer>,
        avg_max: Arc<dyn BulkIncrementer>,
        store: Arc<dyn StatisticsStore>,
        reporter: Arc<dyn BulkOperationReporter>,
        config: BulkWriterConfig,
    ) -> Self {
        Self {
            name: name.into(),
            table,
            link,
            avg_max,
            store,
            reporter,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn buffer(&self, category: FlushCategory) -> &Arc<dyn BulkIncrementer> {
        match category {
            FlushCategory::Link => &self.link,
            FlushCategory::AvgMax => &self.avg_max,
        }
    }

    /// Histogram-style `+1` on the link buffer.
    pub fn increment(&self, row: &impl RowKey, column: &impl ColumnName) {
        self.merge(FlushCategory::Link, MergeOp::Sum, row, column, 1);
    }

    /// Sum on the avg/max buffer.
    pub fn add(&self, row: &impl RowKey, column: &impl ColumnName, delta: u64) {
        self.merge(FlushCategory::AvgMax, MergeOp::Sum, row, column, delta);
    }

    pub fn update_max(&self, row: &impl RowKey, column: &impl ColumnName, value: u64) {
        self.merge(FlushCategory::AvgMax, MergeOp::Max, row, column, value);
    }

    pub fn merge(
        &self,
        category: FlushCategory,
        op: MergeOp,
        row: &impl RowKey,
        column: &impl ColumnName,
        value: u64,
    ) {
        let key = CellKey::new(self.table.clone(), row.row_key(), column.column_name());
        let buffer = self.buffer(category);
        match op {
            MergeOp::Sum => buffer.increment(key, value),
            MergeOp::Max => buffer.update_max(key, value),
        };
    }

    pub async fn flush_link(&self) -> FlushOutcome {
        self.flush(FlushCategory::Link).await
    }

    pub async fn flush_avg_max(&self) -> FlushOutcome {
        self.flush(FlushCategory::AvgMax).await
    }

    pub async fn flush(&self, category: FlushCategory) -> FlushOutcome {
        let batch = self.buffer(category).take_increments(None);
        self.submit(category, batch).await
    }

    /// Flush everything except the listed rows, which stay for the next cycle.
    pub async fn flush_excluding(
        &self,
        category: FlushCategory,
        exclude: &HashSet<RowRef>,
    ) -> FlushOutcome {
        let batch = self.buffer(category).take_increments(Some(exclude));
        self.submit(category, batch).await
    }

    async fn submit(&self, category: FlushCategory, batch: FlushBatch) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();
        if batch.is_empty() {
            return outcome;
        }
        let started = Instant::now();
        let chunk_size = self.config.max_rows_per_write.max(1);

        for (table, rows) in batch.into_tables() {
            for chunk in rows.chunks(chunk_size) {
                let columns: usize = chunk.iter().map(RowWrite::column_count).sum();
                match self.write(&table, chunk).await {
                    Ok(()) => {
                        outcome.written_rows += chunk.len();
                        outcome.written_columns += columns;
                        self.reporter.report_flush(&table, category, chunk.len(), columns);
                    }
                    Err(e) => {
                        outcome.failed_rows += chunk.len();
                        outcome.failed_columns += columns;
                        error!(
                            writer = %self.name,
                            table = %table,
                            category = %category,
                            rows = chunk.len(),
                            columns,
                            error = %e,
                            "bulk write failed, statistics dropped"
                        );
                        self.reporter
                            .report_failure(&table, category, chunk.len(), columns, &e);
                    }
                }
            }
        }

        if outcome.is_success() {
            debug!(
                writer = %self.name,
                category = %category,
                rows = outcome.written_rows,
                columns = outcome.written_columns,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "flushed"
            );
        } else {
            info!(
                writer = %self.name,
                category = %category,
                written_rows = outcome.written_rows,
                failed_rows = outcome.failed_rows,
                "flush completed with failures"
            );
        }
        outcome
    }

    async fn write(&self, table: &TableName, rows: &[RowWrite]) -> Result<(), StoreError> {
        match tokio::time::timeout(self.config.write_timeout, self.store.write(table, rows)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.write_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::{MergeBuffer, RowKeyMerge};
    use crate::keys::NoSaltDistributor;
    use crate::reporter::NoopReporter;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn buffer() -> Arc<dyn BulkIncrementer> {
        Arc::new(MergeBuffer::new(RowKeyMerge::new(Arc::new(NoSaltDistributor))))
    }

    fn writer(store: Arc<dyn StatisticsStore>, config: BulkWriterConfig) -> BulkWriter {
        BulkWriter::new(
            "test",
            TableName::new("Map"),
            buffer(),
            buffer(),
            store,
            Arc::new(NoopReporter),
            config,
        )
    }

    struct StalledStore;

    #[async_trait]
    impl StatisticsStore for StalledStore {
        async fn write(&self, _: &TableName, _: &[RowWrite]) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingStore {
        writes: AtomicUsize,
    }

    #[async_trait]
    impl StatisticsStore for CountingStore {
        async fn write(&self, _: &TableName, rows: &[RowWrite]) -> Result<(), StoreError> {
            assert!(rows.len() <= 2);
            self.writes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_categories_flush_independently() {
        let store = InMemoryStore::new();
        let writer = writer(Arc::new(store.clone()), BulkWriterConfig::default());
        let row = Bytes::from_static(b"row");

        writer.increment(&row, &Bytes::from_static(b"hist"));
        writer.add(&row, &Bytes::from_static(b"sum"), 100);
        writer.update_max(&row, &Bytes::from_static(b"max"), 100);

        let outcome = writer.flush_link().await;
        assert_eq!(outcome.written_columns, 1);
        assert_eq!(writer.buffer(FlushCategory::AvgMax).live_cells(), 2);

        let outcome = writer.flush_avg_max().await;
        assert_eq!(outcome.written_rows, 1);
        assert_eq!(outcome.written_columns, 2);

        let table = TableName::new("Map");
        assert_eq!(store.get(&table, b"row", b"hist"), Some(1));
        assert_eq!(store.get(&table, b"row", b"sum"), Some(100));
        assert_eq!(store.get(&table, b"row", b"max"), Some(100));
    }

    #[tokio::test]
    async fn test_empty_flush_skips_store() {
        let store = InMemoryStore::new();
        let writer = writer(Arc::new(store.clone()), BulkWriterConfig::default());
        assert!(writer.flush_link().await.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_large_batches_are_chunked() {
        let store = Arc::new(CountingStore::default());
        let writer = writer(
            store.clone(),
            BulkWriterConfig {
                max_rows_per_write: 2,
                ..Default::default()
            },
        );
        for i in 0..5u8 {
            writer.increment(&Bytes::copy_from_slice(&[i]), &Bytes::from_static(b"c"));
        }
        let outcome = writer.flush_link().await;
        assert_eq!(outcome.written_rows, 5);
        assert_eq!(store.writes.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_write_is_dropped() {
        let writer = writer(
            Arc::new(StalledStore),
            BulkWriterConfig {
                write_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        writer.increment(&Bytes::from_static(b"row"), &Bytes::from_static(b"c"));

        let outcome = writer.flush_link().await;
        assert_eq!(outcome.failed_rows, 1);
        assert_eq!(outcome.failed_columns, 1);
        assert_eq!(writer.buffer(FlushCategory::Link).live_cells(), 0);
    }

    #[tokio::test]
    async fn test_excluded_row_waits_for_next_flush() {
        let store = InMemoryStore::new();
        let writer = writer(Arc::new(store.clone()), BulkWriterConfig::default());
        let table = TableName::new("Map");
        let hot = Bytes::from_static(b"hot");
        let cold = Bytes::from_static(b"cold");
        let column = Bytes::from_static(b"c");

        writer.increment(&hot, &column);
        writer.increment(&cold, &column);

        let exclude: HashSet<RowRef> = [(table.clone(), hot.clone())].into();
        let outcome = writer.flush_excluding(FlushCategory::Link, &exclude).await;
        assert_eq!(outcome.written_rows, 1);
        assert_eq!(store.get(&table, b"cold", b"c"), Some(1));
        assert_eq!(store.get(&table, b"hot", b"c"), None);
        assert_eq!(writer.buffer(FlushCategory::Link).live_cells(), 1);

        writer.increment(&hot, &column);
        let outcome = writer.flush_link().await;
        assert_eq!(outcome.written_rows, 1);
        assert_eq!(store.get(&table, b"hot", b"c"), Some(2));
        assert_eq!(store.get(&table, b"cold", b"c"), Some(1));
        assert_eq!(writer.buffer(FlushCategory::Link).live_cells(), 0);
    }
}
