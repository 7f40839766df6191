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

//! Pipeline assembly
//!
//! Wires the distributor, the size-limited buffers, one bulk writer per
//! table and the link recorders from configuration. The store and the
//! reporter are passed in by whoever runs the pipeline.

use crate::config::CollectorConfig;
use crate::link::{LinkDirection, LinkRecorder};
use crate::metric::MetricTable;
use linkmap_core::{CallObservation, Result, TimeSlot};
use linkmap_storage::bulk::{
    BulkIncrementer, BulkWriter, FlushCategory, FlushOutcome, MergeBuffer, RowKeyMerge,
    SizeLimitedBulkIncrementer,
};
use linkmap_storage::keys::{OneByteSimpleHash, RowKeyDistributor, RowKeyDistributorByHashPrefix};
use linkmap_storage::reporter::BulkOperationReporter;
use linkmap_storage::store::{StatisticsStore, TableName};
use std::sync::Arc;
use tracing::info;

pub struct LinkPipeline {
    distributor: Arc<dyn RowKeyDistributor>,
    out_link: LinkRecorder,
    in_link: Option<LinkRecorder>,
    writers: Vec<Arc<BulkWriter>>,
}

impl LinkPipeline {
    pub fn new(
        config: &CollectorConfig,
        store: Arc<dyn StatisticsStore>,
        reporter: Arc<dyn BulkOperationReporter>,
    ) -> Result<Self> {
        let hasher = OneByteSimpleHash::new(config.distributor.salt_buckets)?;
        let distributor: Arc<dyn RowKeyDistributor> =
            Arc::new(RowKeyDistributorByHashPrefix::new(hasher));
        let time_slot = TimeSlot::new(config.map_link.time_slot_interval_ms)?;
        let metrics = MetricTable::from_config(&config.map_link);

        let writer = |name: &str, table: TableName| {
            Arc::new(BulkWriter::new(
                name,
                table,
                limited_buffer(name, FlushCategory::Link, config, &distributor, &reporter),
                limited_buffer(name, FlushCategory::AvgMax, config, &distributor, &reporter),
                Arc::clone(&store),
                Arc::clone(&reporter),
                config.bulk.writer_config(),
            ))
        };

        let out_writer = writer("out_link", config.tables.out_link_table());
        let mut writers = vec![Arc::clone(&out_writer)];
        let out_link = LinkRecorder::new(
            LinkDirection::OutLink,
            time_slot,
            metrics.clone(),
            out_writer,
        );

        let in_link = if config.map_link.enable_in_link {
            let in_writer = writer("in_link", config.tables.in_link_table());
            writers.push(Arc::clone(&in_writer));
            Some(LinkRecorder::new(LinkDirection::InLink, time_slot, metrics, in_writer))
        } else {
            None
        };

        info!(
            salt_buckets = config.distributor.salt_buckets,
            limit_size = config.bulk.limit_size,
            enable_avg = config.map_link.enable_avg,
            enable_max = config.map_link.enable_max,
            in_link = in_link.is_some(),
            "link pipeline assembled"
        );

        Ok(Self {
            distributor,
            out_link,
            in_link,
            writers,
        })
    }

    /// Record one edge in every enabled direction.
    pub fn record(&self, obs: &CallObservation) -> Result<()> {
        self.out_link.record_edge(obs)?;
        if let Some(in_link) = &self.in_link {
            in_link.record_edge(obs)?;
        }
        Ok(())
    }

    pub fn writers(&self) -> &[Arc<BulkWriter>] {
        &self.writers
    }

    pub fn distributor(&self) -> &Arc<dyn RowKeyDistributor> {
        &self.distributor
    }

    /// Flush both categories of every writer.
    pub async fn flush_all(&self) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();
        for writer in &self.writers {
            for category in FlushCategory::ALL {
                outcome += writer.flush(category).await;
            }
        }
        outcome
    }
}

fn limited_buffer(
    writer: &str,
    category: FlushCategory,
    config: &CollectorConfig,
    distributor: &Arc<dyn RowKeyDistributor>,
    reporter: &Arc<dyn BulkOperationReporter>,
) -> Arc<dyn BulkIncrementer> {
    let buffer = MergeBuffer::new(RowKeyMerge::new(Arc::clone(distributor)));
    Arc::new(SizeLimitedBulkIncrementer::new(
        format!("{writer}/{category}"),
        buffer,
        config.bulk.limit_size,
        Arc::clone(reporter),
    ))
}
