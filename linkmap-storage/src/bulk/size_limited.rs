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

//! Size-limited bulk incrementer
//!
//! Tracks an approximate live cell count in front of another incrementer.
//! Crossing the limit never rejects or delays a merge: the overflow is
//! reported, logged once per drain cycle, and the pressure signal asks the
//! flush scheduler for an early drain. The count can overshoot the limit by
//! roughly the number of concurrent producers.

use super::{BulkIncrementer, CellKey, MergeBuffer, RowRef};
use crate::reporter::BulkOperationReporter;
use crate::store::FlushBatch;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

pub struct SizeLimitedBulkIncrementer<B = MergeBuffer> {
    name: String,
    inner: B,
    limit: usize,
    live: AtomicIsize,
    overflowing: AtomicBool,
    reporter: Arc<dyn BulkOperationReporter>,
    pressure: Arc<Notify>,
}

impl<B: BulkIncrementer> SizeLimitedBulkIncrementer<B> {
    pub fn new(
        name: impl Into<String>,
        inner: B,
        limit: usize,
        reporter: Arc<dyn BulkOperationReporter>,
    ) -> Self {
        Self {
            name: name.into(),
            inner,
            limit,
            live: AtomicIsize::new(0),
            overflowing: AtomicBool::new(false),
            reporter,
            pressure: Arc::new(Notify::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_overflowing(&self) -> bool {
        self.overflowing.load(Ordering::Relaxed)
    }

    fn on_created(&self) {
        let live = self.live.fetch_add(1, Ordering::Relaxed) + 1;
        if live <= self.limit as isize {
            return;
        }
        self.reporter.report_overflow(&self.name, live as usize, self.limit);
        if !self.overflowing.swap(true, Ordering::AcqRel) {
            warn!(
                buffer = %self.name,
                live_cells = live,
                limit = self.limit,
                "bulk buffer over limit, requesting early flush"
            );
            self.pressure.notify_one();
        }
    }
}

impl<B: BulkIncrementer> BulkIncrementer for SizeLimitedBulkIncrementer<B> {
    fn increment(&self, key: CellKey, delta: u64) -> bool {
        let created = self.inner.increment(key, delta);
        if created {
            self.on_created();
        }
        created
    }

    fn update_max(&self, key: CellKey, value: u64) -> bool {
        let created = self.inner.update_max(key, value);
        if created {
            self.on_created();
        }
        created
    }

    fn take_increments(&self, exclude: Option<&HashSet<RowRef>>) -> FlushBatch {
        let batch = self.inner.take_increments(exclude);
        let drained = batch.column_count() as isize;
        let live = self.live.fetch_sub(drained, Ordering::Relaxed) - drained;
        // re-arm: the next cell created over the limit signals again
        let was_overflowing = self.overflowing.swap(false, Ordering::AcqRel);
        if was_overflowing && live <= self.limit as isize {
            debug!(buffer = %self.name, live_cells = live.max(0), "bulk buffer back under limit");
        }
        batch
    }

    fn live_cells(&self) -> usize {
        self.live.load(Ordering::Relaxed).max(0) as usize
    }

    fn pressure(&self) -> Option<Arc<Notify>> {
        Some(Arc::clone(&self.pressure))
    }
}
