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

//! Size-limited merge buffer under single and concurrent producers.

use async_trait::async_trait;
use bytes::Bytes;
use linkmap_storage::bulk::FlushCategory;
use linkmap_storage::keys::{OneByteSimpleHash, RowKeyDistributor, RowKeyDistributorByHashPrefix};
use linkmap_storage::{
    BulkIncrementer, BulkOperationReporter, BulkWriter, BulkWriterConfig, CellKey, FlushBatch,
    MergeBuffer, RowKeyMerge, RowWrite, SizeLimitedBulkIncrementer, StatisticsStore, StoreError,
    TableName,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

const BULK_LIMIT: usize = 1000;
const PRODUCERS: usize = 16;

#[derive(Default)]
struct RecordingReporter {
    overflows: AtomicUsize,
    flushed_columns: AtomicUsize,
    failed_columns: AtomicUsize,
    failures: Mutex<Vec<StoreError>>,
}

impl BulkOperationReporter for RecordingReporter {
    fn report_flush(&self, _: &TableName, _: FlushCategory, _: usize, columns: usize) {
        self.flushed_columns.fetch_add(columns, Ordering::Relaxed);
    }

    fn report_failure(
        &self,
        _: &TableName,
        _: FlushCategory,
        _: usize,
        columns: usize,
        error: &StoreError,
    ) {
        self.failed_columns.fetch_add(columns, Ordering::Relaxed);
        self.failures.lock().unwrap().push(error.clone());
    }

    fn report_overflow(&self, _: &str, _: usize, _: usize) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }
}

/// `count` increments of one (table, row, column).
struct TestDataSet {
    key: CellKey,
    count: u64,
}

impl TestDataSet {
    fn new(table: &TableName, row_id: u32, column_id: u32, count: u64) -> Self {
        Self {
            key: CellKey::new(
                table.clone(),
                Bytes::from(format!("row-{row_id}")),
                Bytes::from(format!("column-{column_id}")),
            ),
            count,
        }
    }
}

/// Sums flush batches by (table, salted row, column).
#[derive(Default)]
struct TestVerifier {
    totals: HashMap<(TableName, Bytes, Bytes), u64>,
}

impl TestVerifier {
    fn add(&mut self, batch: FlushBatch) {
        for (table, rows) in batch.into_tables() {
            for row in rows {
                for (column, value) in row.increments {
                    *self
                        .totals
                        .entry((table.clone(), row.row_key.clone(), column))
                        .or_insert(0) += value;
                }
            }
        }
    }

    fn actual(&self, data: &TestDataSet, distributor: &dyn RowKeyDistributor) -> u64 {
        let salted = Bytes::from(distributor.add_salt(&data.key.row_key));
        self.totals
            .get(&(data.key.table.clone(), salted, data.key.column.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn verify(&self, data: &TestDataSet, distributor: &dyn RowKeyDistributor) {
        assert_eq!(self.actual(data, distributor), data.count, "{:?}", data.key);
    }

    fn total(&self) -> u64 {
        self.totals.values().sum()
    }
}

fn distributor() -> Arc<dyn RowKeyDistributor> {
    Arc::new(RowKeyDistributorByHashPrefix::new(OneByteSimpleHash::new(64).unwrap()))
}

fn incrementer(
    distributor: &Arc<dyn RowKeyDistributor>,
    reporter: Arc<RecordingReporter>,
) -> Arc<SizeLimitedBulkIncrementer> {
    let buffer = MergeBuffer::new(RowKeyMerge::new(Arc::clone(distributor)));
    Arc::new(SizeLimitedBulkIncrementer::new("test", buffer, BULK_LIMIT, reporter))
}

/// Indices into `data_sets`, one per increment, shuffled.
fn shuffled_increments(data_sets: &[TestDataSet]) -> Vec<u32> {
    let mut increments: Vec<u32> = data_sets
        .iter()
        .enumerate()
        .flat_map(|(i, data)| std::iter::repeat(i as u32).take(data.count as usize))
        .collect();
    increments.shuffle(&mut rand::thread_rng());
    increments
}

/// Runs `PRODUCERS` threads over `increments` while one flusher drains, and
/// returns everything the flusher collected.
fn run_concurrently(
    incrementer: &Arc<SizeLimitedBulkIncrementer>,
    data_sets: Arc<Vec<TestDataSet>>,
    increments: Vec<u32>,
) -> TestVerifier {
    let done = Arc::new(AtomicBool::new(false));

    let flusher = {
        let incrementer = Arc::clone(incrementer);
        let done = Arc::clone(&done);
        thread::Builder::new()
            .name("flusher".into())
            .spawn(move || {
                let mut verifier = TestVerifier::default();
                while !done.load(Ordering::Acquire) {
                    verifier.add(incrementer.take_increments(None));
                    thread::yield_now();
                }
                verifier.add(incrementer.take_increments(None));
                verifier
            })
            .unwrap()
    };

    let chunk = increments.len().div_ceil(PRODUCERS);
    let producers: Vec<_> = increments
        .chunks(chunk)
        .map(|part| part.to_vec())
        .enumerate()
        .map(|(n, part)| {
            let incrementer = Arc::clone(incrementer);
            let data_sets = Arc::clone(&data_sets);
            thread::Builder::new()
                .name(format!("incrementer-{n}"))
                .spawn(move || {
                    for index in part {
                        incrementer.increment(data_sets[index as usize].key.clone(), 1);
                    }
                })
                .unwrap()
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    flusher.join().unwrap()
}

#[test]
fn single_table() {
    let distributor = distributor();
    let incrementer = incrementer(&distributor, Arc::default());
    let table = TableName::new("A");
    let data_sets = vec![
        TestDataSet::new(&table, 0, 0, 100),
        TestDataSet::new(&table, 0, 1, 200),
    ];

    for index in shuffled_increments(&data_sets) {
        incrementer.increment(data_sets[index as usize].key.clone(), 1);
    }

    let mut verifier = TestVerifier::default();
    verifier.add(incrementer.take_increments(None));
    for data in &data_sets {
        verifier.verify(data, distributor.as_ref());
    }
}

#[test]
fn multiple_tables() {
    let distributor = distributor();
    let incrementer = incrementer(&distributor, Arc::default());
    let table_a = TableName::with_namespace("a", "A");
    let table_b = TableName::with_namespace("b", "A");
    let mut data_sets = Vec::new();
    let mut count = 100;
    for table in [&table_a, &table_b] {
        for row in 0..2 {
            for column in 0..2 {
                data_sets.push(TestDataSet::new(table, row, column, count));
                count += 100;
            }
        }
    }

    for index in shuffled_increments(&data_sets) {
        incrementer.increment(data_sets[index as usize].key.clone(), 1);
    }

    let mut verifier = TestVerifier::default();
    verifier.add(incrementer.take_increments(None));
    for data in &data_sets {
        verifier.verify(data, distributor.as_ref());
    }
}

#[test]
fn single_table_concurrent() {
    let distributor = distributor();
    let incrementer = incrementer(&distributor, Arc::default());
    let table = TableName::new("A");
    let data_sets = Arc::new(vec![
        TestDataSet::new(&table, 0, 0, 1_000_000),
        TestDataSet::new(&table, 0, 1, 1_000_001),
    ]);
    let increments = shuffled_increments(&data_sets);

    let verifier = run_concurrently(&incrementer, Arc::clone(&data_sets), increments);

    for data in data_sets.iter() {
        verifier.verify(data, distributor.as_ref());
    }
    assert_eq!(verifier.total(), 2_000_001);
    assert!(verifier.total() > BULK_LIMIT as u64);
    assert_eq!(incrementer.live_cells(), 0);
}

#[test]
fn multiple_tables_concurrent() {
    let (num_tables, num_rows, num_columns, max_call_count) = (10, 20, 10, 200);
    let distributor = distributor();
    let incrementer = incrementer(&distributor, Arc::default());
    let mut rng = rand::thread_rng();

    let mut data_sets = Vec::new();
    for t in 0..num_tables {
        let table = TableName::new(t.to_string());
        for row in 0..num_rows {
            for column in 0..num_columns {
                let count = rng.gen_range(1..=max_call_count);
                data_sets.push(TestDataSet::new(&table, row, column, count));
            }
        }
    }
    let expected: u64 = data_sets.iter().map(|d| d.count).sum();
    let data_sets = Arc::new(data_sets);
    let increments = shuffled_increments(&data_sets);

    let verifier = run_concurrently(&incrementer, Arc::clone(&data_sets), increments);

    for data in data_sets.iter() {
        verifier.verify(data, distributor.as_ref());
    }
    assert_eq!(verifier.total(), expected);
    assert!(verifier.total() > BULK_LIMIT as u64);
}

#[test]
fn overflow_is_reported_and_nothing_is_dropped() {
    let distributor = distributor();
    let reporter = Arc::new(RecordingReporter::default());
    let incrementer = incrementer(&distributor, Arc::clone(&reporter));
    let table = TableName::new("A");

    let data_sets: Vec<_> = (0..2 * BULK_LIMIT as u32)
        .map(|column| TestDataSet::new(&table, 0, column, 1))
        .collect();
    for data in &data_sets {
        incrementer.increment(data.key.clone(), 1);
    }

    assert_eq!(reporter.overflows.load(Ordering::Relaxed), BULK_LIMIT);
    assert_eq!(incrementer.live_cells(), 2 * BULK_LIMIT);

    let mut verifier = TestVerifier::default();
    verifier.add(incrementer.take_increments(None));
    for data in &data_sets {
        verifier.verify(data, distributor.as_ref());
    }
    assert_eq!(incrementer.live_cells(), 0);
}

#[test]
fn concurrent_max_converges() {
    let distributor = distributor();
    let incrementer = incrementer(&distributor, Arc::default());
    let key = CellKey::new(
        TableName::new("A"),
        Bytes::from_static(b"row"),
        Bytes::from_static(b"max"),
    );

    let mut values: Vec<u64> = (0..100_000).collect();
    values.shuffle(&mut rand::thread_rng());
    let chunk = values.len().div_ceil(PRODUCERS);
    let handles: Vec<_> = values
        .chunks(chunk)
        .map(|part| {
            let part = part.to_vec();
            let incrementer = Arc::clone(&incrementer);
            let key = key.clone();
            thread::spawn(move || {
                for value in part {
                    incrementer.update_max(key.clone(), value);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let batch = incrementer.take_increments(None);
    let salted = Bytes::from(distributor.add_salt(&key.row_key));
    let row = batch
        .rows(&key.table)
        .iter()
        .find(|row| row.row_key == salted)
        .unwrap();
    assert_eq!(row.maxima.get(&key.column), Some(&99_999));
}

struct FailingStore;

#[async_trait]
impl StatisticsStore for FailingStore {
    async fn write(&self, _: &TableName, _: &[RowWrite]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("region server down".into()))
    }
}

#[tokio::test]
async fn failed_flush_is_reported_not_requeued() {
    let distributor = distributor();
    let reporter = Arc::new(RecordingReporter::default());
    let link = incrementer(&distributor, Arc::clone(&reporter));
    let avg_max = incrementer(&distributor, Arc::clone(&reporter));
    let writer = BulkWriter::new(
        "out_link",
        TableName::new("A"),
        link,
        avg_max,
        Arc::new(FailingStore),
        reporter.clone(),
        BulkWriterConfig::default(),
    );

    let row = Bytes::from_static(b"row");
    writer.increment(&row, &Bytes::from_static(b"c1"));
    writer.increment(&row, &Bytes::from_static(b"c2"));

    let outcome = writer.flush_link().await;
    assert_eq!(outcome.failed_rows, 1);
    assert_eq!(outcome.failed_columns, 2);
    assert_eq!(reporter.failed_columns.load(Ordering::Relaxed), 2);
    assert_eq!(
        reporter.failures.lock().unwrap().as_slice(),
        &[StoreError::Unavailable("region server down".into())]
    );

    assert!(writer.flush_link().await.is_empty());
    assert_eq!(writer.buffer(FlushCategory::Link).live_cells(), 0);
}
