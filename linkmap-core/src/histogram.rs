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

//! Response-time histogram schema
//!
//! Every call edge is counted in exactly one histogram slot. The slot combines
//! the latency range the call fell into with its outcome, so that a single
//! column per slot is enough to rebuild both the latency distribution and the
//! error rate of an edge.
//!
//! ```text
//!            fast      normal     slow     very slow
//! FAST     0..=100   ..=300     ..=500    > 500      (ms)
//! NORMAL   0..=1000  ..=3000    ..=5000   > 5000     (ms)
//! ```

use serde::{Deserialize, Serialize};

/// Latency boundaries used to bucket calls of a service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramSchema {
    /// Sub-second services: databases, caches, outbound clients.
    Fast,
    /// Request-serving application nodes.
    Normal,
}

impl HistogramSchema {
    /// Upper bounds (inclusive, milliseconds) of the fast, normal and slow slots.
    pub const fn bounds(self) -> [i64; 3] {
        match self {
            HistogramSchema::Fast => [100, 300, 500],
            HistogramSchema::Normal => [1000, 3000, 5000],
        }
    }

    /// Find the slot for a call that took `elapsed_ms` and ended with `is_error`.
    ///
    /// Negative elapsed times are treated as zero.
    pub fn find_slot(self, elapsed_ms: i64, is_error: bool) -> HistogramSlot {
        let [fast, normal, slow] = self.bounds();
        let elapsed = elapsed_ms.max(0);
        let slot = if elapsed <= fast {
            HistogramSlot::Fast
        } else if elapsed <= normal {
            HistogramSlot::Normal
        } else if elapsed <= slow {
            HistogramSlot::Slow
        } else {
            HistogramSlot::VerySlow
        };
        if is_error {
            slot.as_error()
        } else {
            slot
        }
    }
}

/// One histogram bucket of a call edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HistogramSlot {
    Fast,
    Normal,
    Slow,
    VerySlow,
    FastError,
    NormalError,
    SlowError,
    VerySlowError,
}

const ERROR_FLAG: u8 = 0x80;

impl HistogramSlot {
    pub const ALL: [HistogramSlot; 8] = [
        HistogramSlot::Fast,
        HistogramSlot::Normal,
        HistogramSlot::Slow,
        HistogramSlot::VerySlow,
        HistogramSlot::FastError,
        HistogramSlot::NormalError,
        HistogramSlot::SlowError,
        HistogramSlot::VerySlowError,
    ];

    /// One-byte code written as the trailing byte of a histogram column.
    ///
    /// Success slots are `0x01..=0x04` in latency order; error slots carry the
    /// high bit on top of the same latency ordinal.
    pub const fn code(self) -> u8 {
        match self {
            HistogramSlot::Fast => 0x01,
            HistogramSlot::Normal => 0x02,
            HistogramSlot::Slow => 0x03,
            HistogramSlot::VerySlow => 0x04,
            HistogramSlot::FastError => ERROR_FLAG | 0x01,
            HistogramSlot::NormalError => ERROR_FLAG | 0x02,
            HistogramSlot::SlowError => ERROR_FLAG | 0x03,
            HistogramSlot::VerySlowError => ERROR_FLAG | 0x04,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.code() == code)
    }

    pub const fn is_error(self) -> bool {
        self.code() & ERROR_FLAG != 0
    }

    /// The error counterpart of a success slot. Error slots map to themselves.
    pub const fn as_error(self) -> Self {
        match self {
            HistogramSlot::Fast => HistogramSlot::FastError,
            HistogramSlot::Normal => HistogramSlot::NormalError,
            HistogramSlot::Slow => HistogramSlot::SlowError,
            HistogramSlot::VerySlow => HistogramSlot::VerySlowError,
            other => other,
        }
    }

    /// Signed slot time as shown to readers: the slot's upper bound in
    /// milliseconds, `0` for the unbounded slot, negated for error slots.
    pub fn slot_time(self, schema: HistogramSchema) -> i16 {
        let [fast, normal, slow] = schema.bounds();
        let time = match self {
            HistogramSlot::Fast | HistogramSlot::FastError => fast,
            HistogramSlot::Normal | HistogramSlot::NormalError => normal,
            HistogramSlot::Slow | HistogramSlot::SlowError => slow,
            HistogramSlot::VerySlow | HistogramSlot::VerySlowError => 0,
        } as i16;
        if self.is_error() {
            -time
        } else {
            time
        }
    }
}
