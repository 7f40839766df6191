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

//! Statistics store contract
//!
//! The pipeline only needs one thing from the column store: "apply these
//! keyed deltas and maxima to this table". Connection pooling, retries and
//! region routing belong to the implementation behind [`StatisticsStore`].

pub mod cache;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use cache::{
    CachedTableStore, Closeable, ResourceCache, ResourceCacheConfig, TableConnector, TableKey,
    TableMutator,
};
pub use memory::{InMemoryMutator, InMemoryStore};

/// Name of a statistics table, optionally qualified by a namespace
/// (`namespace:table`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(Arc<str>);

impl TableName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn with_namespace(namespace: &str, name: &str) -> Self {
        if namespace.is_empty() {
            return Self::new(name);
        }
        Self::new(format!("{namespace}:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// All accumulated columns of one row at the moment of a drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowWrite {
    /// Salted row key.
    pub row_key: Bytes,
    /// Column -> delta, applied as an atomic add.
    pub increments: BTreeMap<Bytes, u64>,
    /// Column -> value, applied as set-if-greater.
    pub maxima: BTreeMap<Bytes, u64>,
}

impl RowWrite {
    pub fn new(row_key: Bytes) -> Self {
        Self {
            row_key,
            ..Default::default()
        }
    }

    pub fn column_count(&self) -> usize {
        self.increments.len() + self.maxima.len()
    }

    pub fn is_empty(&self) -> bool {
        self.increments.is_empty() && self.maxima.is_empty()
    }
}

/// Snapshot drained from a merge buffer: table -> rows, one write per row.
///
/// Owned data; later merges into the buffer never show up here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushBatch {
    tables: BTreeMap<TableName, Vec<RowWrite>>,
}

impl FlushBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table: TableName, row: RowWrite) {
        if !row.is_empty() {
            self.tables.entry(table).or_default().push(row);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = (&TableName, &[RowWrite])> {
        self.tables.iter().map(|(table, rows)| (table, rows.as_slice()))
    }

    pub fn rows(&self, table: &TableName) -> &[RowWrite] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn column_count(&self) -> usize {
        self.tables
            .values()
            .flat_map(|rows| rows.iter())
            .map(RowWrite::column_count)
            .sum()
    }

    pub fn into_tables(self) -> BTreeMap<TableName, Vec<RowWrite>> {
        self.tables
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Write side of the column store.
///
/// Implementations apply `increments` as atomic adds and `maxima` as atomic
/// set-if-greater, keyed by the salted row key.
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    async fn write(&self, table: &TableName, rows: &[RowWrite]) -> Result<(), StoreError>;
}
