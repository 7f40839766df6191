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

//! Linkmap Core
//!
//! Fundamental data structures for call-edge statistics: the vertices of the
//! service dependency graph, the observations reported for each traced call,
//! and the histogram schema used to bucket call latencies.

pub mod error;
pub mod histogram;
pub mod observation;
pub mod service_type;
pub mod time_slot;
pub mod vertex;

pub use error::{LinkmapError, Result};
pub use histogram::{HistogramSchema, HistogramSlot};
pub use observation::CallObservation;
pub use service_type::ServiceType;
pub use time_slot::{TimeSlot, DEFAULT_TIME_SLOT_INTERVAL_MS};
pub use vertex::Vertex;
