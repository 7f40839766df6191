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

//! Flush scheduling
//!
//! One task per writer and flush category. Each task flushes on its own
//! interval, flushes early when its buffer signals pressure, and performs a
//! final flush when the pipeline is cancelled.

use linkmap_storage::bulk::{BulkWriter, FlushCategory, FlushOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushIntervals {
    pub link: Duration,
    pub avg_max: Duration,
}

impl FlushIntervals {
    pub fn of(&self, category: FlushCategory) -> Duration {
        match category {
            FlushCategory::Link => self.link,
            FlushCategory::AvgMax => self.avg_max,
        }
    }
}

pub struct FlushScheduler {
    writers: Vec<Arc<BulkWriter>>,
    intervals: FlushIntervals,
}

impl FlushScheduler {
    pub fn new(writers: Vec<Arc<BulkWriter>>, intervals: FlushIntervals) -> Self {
        Self { writers, intervals }
    }

    /// Spawn the flush tasks on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> FlushHandle {
        let mut tasks = Vec::with_capacity(self.writers.len() * FlushCategory::ALL.len());
        for writer in &self.writers {
            for category in FlushCategory::ALL {
                tasks.push(tokio::spawn(flush_loop(
                    Arc::clone(writer),
                    category,
                    self.intervals.of(category),
                    cancel.clone(),
                )));
            }
        }
        FlushHandle { tasks }
    }
}

pub struct FlushHandle {
    tasks: Vec<JoinHandle<FlushOutcome>>,
}

impl FlushHandle {
    /// Wait for every task to finish its final flush. Returns the total of
    /// everything the tasks flushed.
    pub async fn join(self) -> FlushOutcome {
        let mut total = FlushOutcome::default();
        for task in self.tasks {
            match task.await {
                Ok(outcome) => total += outcome,
                Err(e) => tracing::error!("flush task failed: {}", e),
            }
        }
        total
    }
}

async fn pressure_signal(pressure: Option<&Notify>) {
    match pressure {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}

async fn flush_loop(
    writer: Arc<BulkWriter>,
    category: FlushCategory,
    period: Duration,
    cancel: CancellationToken,
) -> FlushOutcome {
    let pressure = writer.buffer(category).pressure();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    debug!(writer = writer.name(), %category, ?period, "flush task started");
    let mut total = FlushOutcome::default();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            _ = pressure_signal(pressure.as_deref()) => {
                debug!(writer = writer.name(), %category, "early flush on buffer pressure");
                ticker.reset();
            }
        }
        total += writer.flush(category).await;
    }

    let last = writer.flush(category).await;
    info!(
        writer = writer.name(),
        %category,
        rows = last.written_rows,
        failed_rows = last.failed_rows,
        "final flush"
    );
    total += last;
    total
}
