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

//! Row Key Distributor
//!
//! Sequential row keys (same vertex, increasing time slot) would all land on
//! one storage partition. The distributor prefixes every key with a one-byte
//! salt derived from a hash of the unsalted key, spreading rows across up to
//! 256 buckets while keeping every row of the same logical key in the same
//! bucket.
//!
//! Readers that do not know the bucket of a row fan out over all buckets with
//! [`RowKeyDistributor::all_distributed_keys`] / [`RowKeyDistributor::scan_ranges`].

use linkmap_core::{LinkmapError, Result};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Size of the salt prefix reserved in front of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaltKey {
    None,
    Salt,
}

impl SaltKey {
    pub const fn size(self) -> usize {
        match self {
            SaltKey::None => 0,
            SaltKey::Salt => 1,
        }
    }
}

/// Stable hash of raw key bytes onto a bucket.
pub trait ByteHasher: Send + Sync {
    fn hash(&self, raw: &[u8]) -> u8;

    fn max_buckets(&self) -> usize;
}

/// xxHash64 (seed 0) of the key modulo the bucket count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneByteSimpleHash {
    max_buckets: usize,
}

impl OneByteSimpleHash {
    pub fn new(max_buckets: usize) -> Result<Self> {
        if !(1..=256).contains(&max_buckets) {
            return Err(LinkmapError::InvalidConfig(format!(
                "salt bucket count must be in 1..=256, got {max_buckets}"
            )));
        }
        Ok(Self { max_buckets })
    }
}

impl ByteHasher for OneByteSimpleHash {
    #[inline]
    fn hash(&self, raw: &[u8]) -> u8 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(raw);
        (hasher.finish() % self.max_buckets as u64) as u8
    }

    fn max_buckets(&self) -> usize {
        self.max_buckets
    }
}

pub trait RowKeyDistributor: Send + Sync {
    fn salt_key(&self) -> SaltKey;

    /// Prefix `raw` with its salt.
    fn add_salt(&self, raw: &[u8]) -> Vec<u8>;

    /// Strip the salt prefix. Keys shorter than the prefix come back empty.
    fn remove_salt<'a>(&self, salted: &'a [u8]) -> &'a [u8] {
        salted.get(self.salt_key().size()..).unwrap_or_default()
    }

    /// Fill a reserved prefix in place; the salt is computed over the bytes
    /// following the prefix.
    fn write_salt(&self, key: &mut [u8]);

    /// `raw` prefixed with every possible salt, in bucket order.
    fn all_distributed_keys(&self, raw: &[u8]) -> Vec<Vec<u8>>;

    /// One `[start, stop)` pair per bucket for an unsalted range.
    fn scan_ranges(&self, start: &[u8], stop: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.all_distributed_keys(start)
            .into_iter()
            .zip(self.all_distributed_keys(stop))
            .collect()
    }
}

/// Salt = hash of the unsalted key.
#[derive(Debug, Clone)]
pub struct RowKeyDistributorByHashPrefix<H = OneByteSimpleHash> {
    hasher: H,
}

impl<H: ByteHasher> RowKeyDistributorByHashPrefix<H> {
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}

impl<H: ByteHasher> RowKeyDistributor for RowKeyDistributorByHashPrefix<H> {
    fn salt_key(&self) -> SaltKey {
        SaltKey::Salt
    }

    fn add_salt(&self, raw: &[u8]) -> Vec<u8> {
        let mut salted = Vec::with_capacity(raw.len() + 1);
        salted.push(self.hasher.hash(raw));
        salted.extend_from_slice(raw);
        salted
    }

    fn write_salt(&self, key: &mut [u8]) {
        if let Some((salt, raw)) = key.split_first_mut() {
            *salt = self.hasher.hash(raw);
        }
    }

    fn all_distributed_keys(&self, raw: &[u8]) -> Vec<Vec<u8>> {
        (0..self.hasher.max_buckets())
            .map(|bucket| {
                let mut salted = Vec::with_capacity(raw.len() + 1);
                salted.push(bucket as u8);
                salted.extend_from_slice(raw);
                salted
            })
            .collect()
    }
}

/// Pass-through distributor for tables that are not salted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSaltDistributor;

impl RowKeyDistributor for NoSaltDistributor {
    fn salt_key(&self) -> SaltKey {
        SaltKey::None
    }

    fn add_salt(&self, raw: &[u8]) -> Vec<u8> {
        raw.to_vec()
    }

    fn write_salt(&self, _key: &mut [u8]) {}

    fn all_distributed_keys(&self, raw: &[u8]) -> Vec<Vec<u8>> {
        vec![raw.to_vec()]
    }
}
