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

//! Linkmap Collector
//!
//! Ingestion side of the call-edge statistics pipeline: link recorders turn
//! call observations into merged statistics, and the flush scheduler drains
//! them into the statistics store.
//!
//! ```text
//! CallObservation ─► LinkPipeline ─┬─► OutLink recorder ─► BulkWriter(out link table)
//!                                  └─► InLink recorder  ─► BulkWriter(in link table)
//!                                                            ▲
//!                               FlushScheduler (link, avg/max)┘
//! ```

pub mod config;
pub mod link;
pub mod metric;
pub mod pipeline;
pub mod replay;
pub mod scheduler;
pub mod telemetry;

pub use config::CollectorConfig;
pub use link::{LinkDirection, LinkRecorder};
pub use metric::{MetricKind, MetricSpec, MetricTable};
pub use pipeline::LinkPipeline;
pub use replay::{replay, replay_with_flush, ReplayStats};
pub use scheduler::{FlushHandle, FlushIntervals, FlushScheduler};
