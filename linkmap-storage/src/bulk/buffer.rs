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

//! Sharded merge buffer
//!
//! Cells live in `DashMap`s of atomics, one map for sums and one for maxima.
//! Merging into an existing cell takes only the shard's read lock and an
//! atomic add (or CAS loop for max); creating a cell takes the shard's write
//! lock. A drain walks the shards with `retain`, holding each shard's write
//! lock while it copies and removes that shard's cells, so a merge on the
//! same shard happens either entirely before (and is drained) or entirely
//! after (and creates a fresh cell for the next drain).

use super::{BulkIncrementer, CellKey, MergeOp, MergedCell, RowKeyMerge, RowRef};
use crate::store::FlushBatch;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct MergeBuffer {
    sums: DashMap<CellKey, AtomicU64>,
    maxima: DashMap<CellKey, AtomicU64>,
    merge: RowKeyMerge,
}

impl MergeBuffer {
    pub fn new(merge: RowKeyMerge) -> Self {
        Self {
            sums: DashMap::new(),
            maxima: DashMap::new(),
            merge,
        }
    }

    fn drain(
        cells: &DashMap<CellKey, AtomicU64>,
        op: MergeOp,
        exclude: Option<&HashSet<RowRef>>,
        out: &mut Vec<MergedCell>,
    ) {
        cells.retain(|key, value| {
            if let Some(exclude) = exclude {
                // both halves are refcounted clones
                if exclude.contains(&(key.table.clone(), key.row_key.clone())) {
                    return true;
                }
            }
            out.push(MergedCell {
                key: key.clone(),
                op,
                value: value.load(Ordering::Acquire),
            });
            false
        });
    }
}

/// CAS loop: only ever raises the stored value.
#[inline]
fn raise(cell: &AtomicU64, value: u64) {
    let mut current = cell.load(Ordering::Relaxed);
    while value > current {
        match cell.compare_exchange_weak(current, value, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => break,
            Err(c) => current = c,
        }
    }
}

impl BulkIncrementer for MergeBuffer {
    fn increment(&self, key: CellKey, delta: u64) -> bool {
        if let Some(cell) = self.sums.get(&key) {
            cell.fetch_add(delta, Ordering::AcqRel);
            return false;
        }
        match self.sums.entry(key) {
            Entry::Occupied(cell) => {
                cell.get().fetch_add(delta, Ordering::AcqRel);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(AtomicU64::new(delta));
                true
            }
        }
    }

    fn update_max(&self, key: CellKey, value: u64) -> bool {
        if let Some(cell) = self.maxima.get(&key) {
            raise(&cell, value);
            return false;
        }
        match self.maxima.entry(key) {
            Entry::Occupied(cell) => {
                raise(cell.get(), value);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(AtomicU64::new(value));
                true
            }
        }
    }

    fn take_increments(&self, exclude: Option<&HashSet<RowRef>>) -> FlushBatch {
        let mut cells = Vec::new();
        Self::drain(&self.sums, MergeOp::Sum, exclude, &mut cells);
        Self::drain(&self.maxima, MergeOp::Max, exclude, &mut cells);
        self.merge.merge(cells)
    }

    fn live_cells(&self) -> usize {
        self.sums.len() + self.maxima.len()
    }
}
