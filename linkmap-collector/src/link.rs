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

//! Link recorders
//!
//! Turn one call observation into statistics in the row of one end of the
//! edge:
//!
//! - out-link: the caller's row, one column group per callee
//! - in-link: the callee's row, one column group per caller
//!
//! Recording only merges into in-memory buffers; it never waits on storage.

use crate::metric::MetricTable;
use linkmap_core::{CallObservation, Result, TimeSlot, Vertex};
use linkmap_storage::bulk::BulkWriter;
use linkmap_storage::keys::{ColumnKind, LinkColumnName, LinkRowKey};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkDirection {
    OutLink,
    InLink,
}

impl LinkDirection {
    /// `(row vertex, other vertex)` of an observation.
    fn ends(self, obs: &CallObservation) -> (&Vertex, &Vertex) {
        match self {
            LinkDirection::OutLink => (&obs.caller, &obs.callee),
            LinkDirection::InLink => (&obs.callee, &obs.caller),
        }
    }
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDirection::OutLink => f.write_str("OutLink"),
            LinkDirection::InLink => f.write_str("InLink"),
        }
    }
}

pub struct LinkRecorder {
    direction: LinkDirection,
    time_slot: TimeSlot,
    metrics: MetricTable,
    writer: Arc<BulkWriter>,
}

impl LinkRecorder {
    pub fn new(
        direction: LinkDirection,
        time_slot: TimeSlot,
        metrics: MetricTable,
        writer: Arc<BulkWriter>,
    ) -> Self {
        Self {
            direction,
            time_slot,
            metrics,
            writer,
        }
    }

    pub fn direction(&self) -> LinkDirection {
        self.direction
    }

    pub fn writer(&self) -> &Arc<BulkWriter> {
        &self.writer
    }

    /// Merge the histogram (and the enabled sum/max) of one edge.
    pub fn record_edge(&self, obs: &CallObservation) -> Result<()> {
        obs.validate()?;

        let (row_vertex, other) = self.direction.ends(obs);
        let agent_id = obs.caller_agent_id.as_str();
        let host = obs.callee_host();

        debug!(
            "[{}] {}/{} -> {}/{}",
            self.direction, obs.caller, agent_id, obs.callee, host
        );

        let row = LinkRowKey::of(row_vertex, self.time_slot.time_slot(obs.request_time));
        let elapsed = obs.elapsed_ms();

        for (_, spec) in self.metrics.enabled() {
            let (column, value) = match spec.column {
                ColumnKind::Histogram => (
                    LinkColumnName::histogram(agent_id, other, host, obs.histogram_slot()),
                    1,
                ),
                ColumnKind::Sum => (
                    LinkColumnName::sum(agent_id, other, host, row_vertex.service_type),
                    elapsed,
                ),
                ColumnKind::Max => (
                    LinkColumnName::max(agent_id, other, host, row_vertex.service_type),
                    elapsed,
                ),
            };
            self.writer.merge(spec.category, spec.op, &row, &column, value);
        }
        Ok(())
    }
}
