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

use anyhow::{Context, Result};
use clap::Parser;
use linkmap_collector::{
    replay_with_flush, telemetry, CollectorConfig, FlushIntervals, LinkPipeline,
};
use linkmap_storage::{BulkOperationMetrics, CachedTableStore, InMemoryStore};
use prometheus::{Encoder, Registry, TextEncoder};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON lines of call observations, `-` for stdin
    #[arg(short, long, default_value = "-", env = "LINKMAP_INPUT")]
    input: String,

    /// Link flush interval in milliseconds (overrides config file)
    #[arg(long, env = "LINKMAP_FLUSH_INTERVAL_MS")]
    flush_interval_ms: Option<u64>,

    /// Dump the bulk operation metrics after the replay
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_tracing()?;

    let mut config = CollectorConfig::load(args.config)?;
    if let Some(ms) = args.flush_interval_ms {
        config.bulk.link_flush_interval_ms = ms;
        config.validate()?;
    }

    let backend = InMemoryStore::new();
    let store = Arc::new(CachedTableStore::new(
        backend.clone(),
        config.cache.pool.clone(),
        &config.cache.resource_cache_config(),
    ));
    let registry = Registry::new();
    let reporter = Arc::new(BulkOperationMetrics::register(&registry)?);
    let pipeline = LinkPipeline::new(&config, store, reporter)?;

    let reader = open_input(&args.input).await?;
    let intervals = FlushIntervals {
        link: config.link_flush_interval(),
        avg_max: config.avg_max_flush_interval(),
    };
    let (replayed, outcome) = replay_with_flush(&pipeline, reader, intervals).await;
    let stats = match replayed {
        Ok(stats) => stats,
        Err(e) => {
            error!(
                written_rows = outcome.written_rows,
                failed_rows = outcome.failed_rows,
                error = %e,
                "replay aborted"
            );
            return Err(e);
        }
    };
    info!(
        recorded = stats.recorded,
        malformed = stats.malformed,
        rejected = stats.rejected,
        written_rows = outcome.written_rows,
        failed_rows = outcome.failed_rows,
        "replay finished"
    );

    println!("{:<40} {:>8} {:>10} {:>14}", "TABLE", "ROWS", "COLUMNS", "TOTAL");
    for table in backend.tables() {
        println!(
            "{:<40} {:>8} {:>10} {:>14}",
            table.as_str(),
            backend.row_count(&table),
            backend.column_count(&table),
            backend.total(&table)
        );
    }

    if args.metrics {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf)?;
        println!("\n{}", String::from_utf8_lossy(&buf));
    }
    Ok(())
}

async fn open_input(input: &str) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("failed to open input {input}"))?;
    Ok(Box::new(BufReader::new(file)))
}
