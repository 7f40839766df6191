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

//! Application trace index keys
//!
//! ```text
//! salt[0|1] | application name[24] | i64::MAX - timestamp [8] | fuzzy(elapsed)[1]
//! ```
//!
//! The timestamp is reversed so that an index scan returns the newest traces
//! first; the trailing fuzzy byte lets a scan skip fast calls on the storage
//! side.

use super::distributor::{RowKeyDistributor, SaltKey};
use super::fuzzy::{FuzzyRowKeyFactory, OneByteFuzzyRowKeyFactory};
use super::{put_fixed_str, KeyDecodeError, KeyReader, APPLICATION_NAME_MAX_LEN, TIMESTAMP_LEN};
use bytes::Bytes;
use std::sync::Arc;

/// Decoded application index row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationIndexRowKey {
    pub application_name: String,
    pub timestamp: i64,
    pub fuzzy: u8,
}

pub struct ApplicationIndexRowKeyEncoder<F = OneByteFuzzyRowKeyFactory> {
    distributor: Arc<dyn RowKeyDistributor>,
    fuzzy: F,
}

impl ApplicationIndexRowKeyEncoder<OneByteFuzzyRowKeyFactory> {
    pub fn new(distributor: Arc<dyn RowKeyDistributor>) -> Self {
        Self::with_fuzzy(distributor, OneByteFuzzyRowKeyFactory)
    }
}

impl<F: FuzzyRowKeyFactory<u8>> ApplicationIndexRowKeyEncoder<F> {
    pub const RAW_LEN: usize = APPLICATION_NAME_MAX_LEN + TIMESTAMP_LEN + 1;

    pub fn with_fuzzy(distributor: Arc<dyn RowKeyDistributor>, fuzzy: F) -> Self {
        Self { distributor, fuzzy }
    }

    /// Encode with `salt_key.size()` leading bytes reserved for the salt; a
    /// reserved prefix is filled in by the distributor.
    pub fn encode_row_key(
        &self,
        salt_key: SaltKey,
        application_name: &str,
        elapsed: i64,
        timestamp: i64,
    ) -> Bytes {
        let salt_size = salt_key.size();
        let mut buf = Vec::with_capacity(salt_size + Self::RAW_LEN);
        buf.resize(salt_size, 0);
        put_fixed_str(&mut buf, application_name, APPLICATION_NAME_MAX_LEN);
        buf.extend_from_slice(&reverse_timestamp(timestamp).to_be_bytes());
        buf.push(self.fuzzy.key(elapsed));
        if salt_size > 0 {
            self.distributor.write_salt(&mut buf);
        }
        Bytes::from(buf)
    }

    pub fn decode_row_key(
        &self,
        salt_key: SaltKey,
        key: &[u8],
    ) -> Result<ApplicationIndexRowKey, KeyDecodeError> {
        let raw = key.get(salt_key.size()..).ok_or_else(|| KeyDecodeError::Truncated {
            offset: 0,
            needed: salt_key.size() - key.len(),
        })?;
        let mut reader = KeyReader::new(raw);
        let application_name = reader.fixed_str(APPLICATION_NAME_MAX_LEN)?;
        let timestamp = reverse_timestamp(reader.u64()? as i64);
        let fuzzy = reader.u8()?;
        reader.finish()?;
        Ok(ApplicationIndexRowKey {
            application_name,
            timestamp,
            fuzzy,
        })
    }
}

#[inline]
fn reverse_timestamp(timestamp: i64) -> i64 {
    i64::MAX - timestamp.max(0)
}
