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

//! Replays JSON lines of call observations through a pipeline.

use crate::pipeline::LinkPipeline;
use crate::scheduler::{FlushIntervals, FlushScheduler};
use anyhow::Result;
use linkmap_core::CallObservation;
use linkmap_storage::FlushOutcome;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub recorded: u64,
    /// Lines that were not a call observation
    pub malformed: u64,
    /// Observations refused by the recorders
    pub rejected: u64,
}

/// Record every line of `reader`. Bad lines are logged and counted, never
/// fatal; only I/O errors end the replay early.
pub async fn replay<R>(pipeline: &LinkPipeline, reader: R) -> Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut lines = reader.lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let obs: CallObservation = match serde_json::from_str(line) {
            Ok(obs) => obs,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed observation");
                stats.malformed += 1;
                continue;
            }
        };
        match pipeline.record(&obs) {
            Ok(()) => stats.recorded += 1,
            Err(e) => {
                warn!(line = line_no, error = %e, "observation rejected");
                stats.rejected += 1;
            }
        }
    }
    Ok(stats)
}

/// Replay `reader` with the flush scheduler running, then cancel the
/// scheduler and wait for its final flush. The flush outcome is returned even
/// when reading fails part-way, so nothing recorded before the failure is left
/// in the buffers.
pub async fn replay_with_flush<R>(
    pipeline: &LinkPipeline,
    reader: R,
    intervals: FlushIntervals,
) -> (Result<ReplayStats>, FlushOutcome)
where
    R: AsyncBufRead + Unpin,
{
    let cancel = CancellationToken::new();
    let flusher = FlushScheduler::new(pipeline.writers().to_vec(), intervals).spawn(cancel.clone());
    let replayed = replay(pipeline, reader).await;
    cancel.cancel();
    (replayed, flusher.join().await)
}
