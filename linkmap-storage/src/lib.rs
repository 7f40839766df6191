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

//! Linkmap Storage
//!
//! Everything between a recorded statistic and the column store:
//!
//! - [`keys`]: byte-exact row and column keys, fuzzy bytes and salting
//! - [`bulk`]: concurrent merge buffers, the size limit and the bulk writer
//! - [`store`]: the store contract, an in-memory store and pooled table handles
//! - [`reporter`]: flush and overflow reporting

pub mod bulk;
pub mod keys;
pub mod reporter;
pub mod store;

pub use bulk::{
    BulkIncrementer, BulkWriter, BulkWriterConfig, CellKey, FlushCategory, FlushOutcome,
    MergeBuffer, MergeOp, RowKeyMerge, RowRef, SizeLimitedBulkIncrementer,
};
pub use keys::{
    ColumnKind, ColumnName, KeyDecodeError, LinkColumnName, LinkRowKey, RowKey,
    RowKeyDistributor, RowKeyDistributorByHashPrefix, OneByteSimpleHash, SaltKey,
};
pub use reporter::{BulkOperationMetrics, BulkOperationReporter, NoopReporter};
pub use store::{
    CachedTableStore, Closeable, FlushBatch, InMemoryStore, ResourceCache, ResourceCacheConfig,
    RowWrite, StatisticsStore, StoreError, TableConnector, TableKey, TableMutator, TableName,
};
