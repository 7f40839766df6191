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

use crate::error::{LinkmapError, Result};
use crate::histogram::HistogramSlot;
use crate::vertex::Vertex;
use serde::{Deserialize, Serialize};

/// One reported caller -> callee call.
///
/// Produced once per traced call by the ingestion layer and folded into the
/// statistics buffers; it is not retained afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallObservation {
    /// Request start, milliseconds since the Unix epoch.
    pub request_time: i64,
    pub caller: Vertex,
    #[serde(default)]
    pub caller_agent_id: String,
    pub callee: Vertex,
    /// Absent when the endpoint could not be resolved (e.g. outbound HTTP).
    #[serde(default)]
    pub callee_host: Option<String>,
    /// Milliseconds.
    pub elapsed: i64,
    #[serde(default)]
    pub error: bool,
}

impl CallObservation {
    pub fn validate(&self) -> Result<()> {
        if self.request_time < 0 {
            return Err(LinkmapError::InvalidObservation(format!(
                "negative request time {}",
                self.request_time
            )));
        }
        self.caller.validate("caller")?;
        self.callee.validate("callee")
    }

    /// Callee host with the missing case mapped to an empty string.
    pub fn callee_host(&self) -> &str {
        self.callee_host.as_deref().unwrap_or("")
    }

    /// Elapsed time with negative values clamped to zero.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.max(0) as u64
    }

    /// Histogram slot of this call, bucketed with the callee's schema.
    pub fn histogram_slot(&self) -> HistogramSlot {
        self.callee
            .service_type
            .schema
            .find_slot(self.elapsed, self.error)
    }
}
