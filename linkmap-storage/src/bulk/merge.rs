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

//! Groups drained cells into one write per row and salts the row keys.

use super::{MergeOp, MergedCell};
use crate::keys::RowKeyDistributor;
use crate::store::{FlushBatch, RowWrite, TableName};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct RowKeyMerge {
    distributor: Arc<dyn RowKeyDistributor>,
}

impl RowKeyMerge {
    pub fn new(distributor: Arc<dyn RowKeyDistributor>) -> Self {
        Self { distributor }
    }

    pub fn distributor(&self) -> &Arc<dyn RowKeyDistributor> {
        &self.distributor
    }

    pub fn merge(&self, cells: Vec<MergedCell>) -> FlushBatch {
        let mut grouped: BTreeMap<TableName, BTreeMap<Bytes, RowWrite>> = BTreeMap::new();

        for cell in cells {
            let rows = grouped.entry(cell.key.table).or_default();
            let row = rows
                .entry(cell.key.row_key)
                .or_insert_with_key(|raw| {
                    RowWrite::new(Bytes::from(self.distributor.add_salt(raw)))
                });
            match cell.op {
                MergeOp::Sum => {
                    let total = row.increments.entry(cell.key.column).or_insert(0);
                    *total = total.saturating_add(cell.value);
                }
                MergeOp::Max => {
                    let max = row.maxima.entry(cell.key.column).or_insert(0);
                    *max = (*max).max(cell.value);
                }
            }
        }

        let mut batch = FlushBatch::new();
        for (table, rows) in grouped {
            let mut rows: Vec<RowWrite> = rows.into_values().collect();
            rows.sort_by(|a, b| a.row_key.cmp(&b.row_key));
            for row in rows {
                batch.push(table.clone(), row);
            }
        }
        batch
    }
}
