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

/// One minute, the window width statistics rows are bucketed by.
pub const DEFAULT_TIME_SLOT_INTERVAL_MS: i64 = 60_000;

/// Fixed-width bucketing of request timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    interval_ms: i64,
}

impl TimeSlot {
    pub fn new(interval_ms: i64) -> Result<Self> {
        if interval_ms <= 0 {
            return Err(LinkmapError::InvalidConfig(format!(
                "time slot interval must be positive, got {interval_ms}"
            )));
        }
        Ok(Self { interval_ms })
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Floor `timestamp_ms` to the start of its window.
    #[inline]
    pub fn time_slot(&self, timestamp_ms: i64) -> i64 {
        let timestamp = timestamp_ms.max(0);
        timestamp - timestamp % self.interval_ms
    }
}

impl Default for TimeSlot {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_TIME_SLOT_INTERVAL_MS,
        }
    }
}
