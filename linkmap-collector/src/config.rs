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

use anyhow::{bail, Result};
use linkmap_storage::bulk::BulkWriterConfig;
use linkmap_storage::store::{ResourceCacheConfig, TableName};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Linkmap Collector Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CollectorConfig {
    #[serde(default)]
    pub map_link: MapLinkConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
    #[serde(default)]
    pub distributor: DistributorConfig,
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapLinkConfig {
    /// Record the elapsed-time sum of each edge
    #[serde(default = "default_true")]
    pub enable_avg: bool,

    /// Record the maximum elapsed time of each edge
    #[serde(default = "default_true")]
    pub enable_max: bool,

    /// Also record every edge in the callee's row
    #[serde(default = "default_true")]
    pub enable_in_link: bool,

    /// Width of a statistics row in milliseconds
    #[serde(default = "default_time_slot_interval_ms")]
    pub time_slot_interval_ms: i64,
}

impl Default for MapLinkConfig {
    fn default() -> Self {
        Self {
            enable_avg: true,
            enable_max: true,
            enable_in_link: true,
            time_slot_interval_ms: default_time_slot_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkConfig {
    /// Approximate number of live cells per buffer before an early flush
    #[serde(default = "default_limit_size")]
    pub limit_size: usize,

    #[serde(default = "default_link_flush_interval_ms")]
    pub link_flush_interval_ms: u64,

    #[serde(default = "default_avg_max_flush_interval_ms")]
    pub avg_max_flush_interval_ms: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_max_rows_per_write")]
    pub max_rows_per_write: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            limit_size: default_limit_size(),
            link_flush_interval_ms: default_link_flush_interval_ms(),
            avg_max_flush_interval_ms: default_avg_max_flush_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            max_rows_per_write: default_max_rows_per_write(),
        }
    }
}

impl BulkConfig {
    pub fn writer_config(&self) -> BulkWriterConfig {
        BulkWriterConfig {
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            max_rows_per_write: self.max_rows_per_write,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DistributorConfig {
    /// Number of salt buckets (1..=256)
    #[serde(default = "default_salt_buckets")]
    pub salt_buckets: usize,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            salt_buckets: default_salt_buckets(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TablesConfig {
    #[serde(default)]
    pub namespace: String,

    #[serde(default = "default_out_link_table")]
    pub out_link: String,

    #[serde(default = "default_in_link_table")]
    pub in_link: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            out_link: default_out_link_table(),
            in_link: default_in_link_table(),
        }
    }
}

impl TablesConfig {
    pub fn out_link_table(&self) -> TableName {
        TableName::with_namespace(&self.namespace, &self.out_link)
    }

    pub fn in_link_table(&self) -> TableName {
        TableName::with_namespace(&self.namespace, &self.in_link)
    }
}

/// Pool of per-table store handles
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_capacity")]
    pub max_capacity: u64,

    #[serde(default = "default_cache_initial_capacity")]
    pub initial_capacity: usize,

    /// Handles are closed this long after they were opened
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Name of the worker pool writes are issued on
    #[serde(default)]
    pub pool: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_cache_max_capacity(),
            initial_capacity: default_cache_initial_capacity(),
            ttl_secs: default_cache_ttl_secs(),
            pool: None,
        }
    }
}

impl CacheConfig {
    pub fn resource_cache_config(&self) -> ResourceCacheConfig {
        ResourceCacheConfig {
            max_capacity: self.max_capacity,
            initial_capacity: self.initial_capacity,
            time_to_live: Duration::from_secs(self.ttl_secs),
        }
    }
}

// Default values
fn default_true() -> bool {
    true
}

fn default_time_slot_interval_ms() -> i64 {
    linkmap_core::DEFAULT_TIME_SLOT_INTERVAL_MS
}

fn default_limit_size() -> usize {
    100_000
}

fn default_link_flush_interval_ms() -> u64 {
    1_000
}

fn default_avg_max_flush_interval_ms() -> u64 {
    5_000
}

fn default_write_timeout_ms() -> u64 {
    3_000
}

fn default_max_rows_per_write() -> usize {
    1_000
}

fn default_salt_buckets() -> usize {
    32
}

fn default_out_link_table() -> String {
    "ApplicationMapOutLink".to_string()
}

fn default_in_link_table() -> String {
    "ApplicationMapInLink".to_string()
}

fn default_cache_max_capacity() -> u64 {
    1_000
}

fn default_cache_initial_capacity() -> usize {
    200
}

fn default_cache_ttl_secs() -> u64 {
    10
}

/// Parse an environment variable, ignoring (and logging) values that do not parse.
fn env_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

impl CollectorConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - LINKMAP_ENABLE_AVG / LINKMAP_ENABLE_MAX / LINKMAP_ENABLE_IN_LINK
    /// - LINKMAP_TIME_SLOT_INTERVAL_MS
    /// - LINKMAP_BULK_LIMIT_SIZE
    /// - LINKMAP_LINK_FLUSH_INTERVAL_MS / LINKMAP_AVG_MAX_FLUSH_INTERVAL_MS
    /// - LINKMAP_WRITE_TIMEOUT_MS
    /// - LINKMAP_SALT_BUCKETS
    /// - LINKMAP_TABLE_NAMESPACE
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override fields whose environment variable is set
    fn apply_env(&mut self) {
        if let Some(v) = env_var("LINKMAP_ENABLE_AVG") {
            self.map_link.enable_avg = v;
        }
        if let Some(v) = env_var("LINKMAP_ENABLE_MAX") {
            self.map_link.enable_max = v;
        }
        if let Some(v) = env_var("LINKMAP_ENABLE_IN_LINK") {
            self.map_link.enable_in_link = v;
        }
        if let Some(v) = env_var("LINKMAP_TIME_SLOT_INTERVAL_MS") {
            self.map_link.time_slot_interval_ms = v;
        }
        if let Some(v) = env_var("LINKMAP_BULK_LIMIT_SIZE") {
            self.bulk.limit_size = v;
        }
        if let Some(v) = env_var("LINKMAP_LINK_FLUSH_INTERVAL_MS") {
            self.bulk.link_flush_interval_ms = v;
        }
        if let Some(v) = env_var("LINKMAP_AVG_MAX_FLUSH_INTERVAL_MS") {
            self.bulk.avg_max_flush_interval_ms = v;
        }
        if let Some(v) = env_var("LINKMAP_WRITE_TIMEOUT_MS") {
            self.bulk.write_timeout_ms = v;
        }
        if let Some(v) = env_var("LINKMAP_SALT_BUCKETS") {
            self.distributor.salt_buckets = v;
        }
        if let Ok(namespace) = std::env::var("LINKMAP_TABLE_NAMESPACE") {
            self.tables.namespace = namespace;
        }
    }

    pub fn link_flush_interval(&self) -> Duration {
        Duration::from_millis(self.bulk.link_flush_interval_ms)
    }

    pub fn avg_max_flush_interval(&self) -> Duration {
        Duration::from_millis(self.bulk.avg_max_flush_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.map_link.time_slot_interval_ms <= 0 {
            bail!(
                "map_link.time_slot_interval_ms must be positive, got {}",
                self.map_link.time_slot_interval_ms
            );
        }
        if !(1..=256).contains(&self.distributor.salt_buckets) {
            bail!(
                "distributor.salt_buckets must be in 1..=256, got {}",
                self.distributor.salt_buckets
            );
        }
        if self.bulk.limit_size == 0 {
            bail!("bulk.limit_size must be at least 1");
        }
        if self.bulk.link_flush_interval_ms == 0 || self.bulk.avg_max_flush_interval_ms == 0 {
            bail!("bulk flush intervals must be at least 1ms");
        }
        if self.bulk.write_timeout_ms == 0 {
            bail!("bulk.write_timeout_ms must be at least 1ms");
        }
        if self.tables.out_link.is_empty() || self.tables.in_link.is_empty() {
            bail!("table names must not be empty");
        }
        if self.map_link.enable_in_link
            && self.tables.out_link_table() == self.tables.in_link_table()
        {
            bail!("out-link and in-link tables must differ");
        }
        Ok(())
    }
}
