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

//! Bulk incrementers
//!
//! Producers merge statistics into an in-memory buffer keyed by
//! `(table, row key, column)`; a flusher periodically drains the buffer and
//! writes one operation per row.
//!
//! ```text
//! record_edge ──► SizeLimitedBulkIncrementer ──► MergeBuffer (DashMap shards)
//!                        │ pressure                     │ take_increments
//!                        ▼                              ▼
//!                  FlushScheduler ──────────────► BulkWriter ──► StatisticsStore
//! ```

pub mod buffer;
pub mod merge;
pub mod size_limited;
pub mod writer;

use crate::store::{FlushBatch, TableName};
use bytes::Bytes;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

pub use buffer::MergeBuffer;
pub use merge::RowKeyMerge;
pub use size_limited::SizeLimitedBulkIncrementer;
pub use writer::{BulkWriter, BulkWriterConfig, FlushOutcome};

/// Address of one accumulated statistic. The row key is unsalted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub table: TableName,
    pub row_key: Bytes,
    pub column: Bytes,
}

impl CellKey {
    pub fn new(table: TableName, row_key: Bytes, column: Bytes) -> Self {
        Self {
            table,
            row_key,
            column,
        }
    }
}

/// How repeated values for the same cell combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeOp {
    Sum,
    Max,
}

/// Independently scheduled flush streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlushCategory {
    /// Per-edge histogram counters, flushed every few seconds.
    Link,
    /// Sum and max aggregates, flushed on a longer period.
    AvgMax,
}

impl FlushCategory {
    pub const ALL: [FlushCategory; 2] = [FlushCategory::Link, FlushCategory::AvgMax];

    pub const fn as_str(self) -> &'static str {
        match self {
            FlushCategory::Link => "link",
            FlushCategory::AvgMax => "avg_max",
        }
    }
}

impl fmt::Display for FlushCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One drained cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedCell {
    pub key: CellKey,
    pub op: MergeOp,
    pub value: u64,
}

/// `(table, unsalted row key)`: the unit of snapshot exclusion.
pub type RowRef = (TableName, Bytes);

/// Concurrent merge buffer.
///
/// `increment` and `update_max` never block on I/O and may be called from any
/// number of threads. `take_increments` removes what it returns: every merge
/// lands either in the returned batch or in the live buffer, never both.
pub trait BulkIncrementer: Send + Sync {
    /// Add `delta` to the cell. Returns `true` if the call created the cell.
    fn increment(&self, key: CellKey, delta: u64) -> bool;

    /// Raise the cell to `value` if it is greater. Returns `true` if the call
    /// created the cell.
    fn update_max(&self, key: CellKey, value: u64) -> bool;

    /// Drain every cell except those in rows listed in `exclude`, which stay
    /// live until a later drain.
    fn take_increments(&self, exclude: Option<&HashSet<RowRef>>) -> FlushBatch;

    /// Number of live cells; may be approximate.
    fn live_cells(&self) -> usize;

    /// Signalled when the buffer wants an early flush.
    fn pressure(&self) -> Option<Arc<Notify>> {
        None
    }
}
