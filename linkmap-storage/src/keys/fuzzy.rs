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

//! Fuzzy key bytes
//!
//! A fuzzy byte is a lossy, monotonic bucket of a numeric value (usually an
//! elapsed time) appended to a key. Scans use it as a coarse storage-side
//! filter: a row whose trailing byte is outside the requested bucket range
//! can be skipped without decoding it. The filter admits false positives
//! (right bucket, wrong exact value) and never false negatives.
//!
//! ## Bucketing
//!
//! Log-linear, like an HDR histogram with two sub-bucket bits:
//!
//! ```text
//! value   0..8      -> bucket = value
//! value   >= 8      -> bucket = 8 + 4 * (msb - 3) + next two bits
//! ```
//!
//! The full `u64` range maps onto buckets `0..=251`.

/// Maps a value onto a fuzzy key.
pub trait FuzzyRowKeyFactory<K> {
    fn key(&self, value: i64) -> K;
}

/// One-byte log-linear fuzzy keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneByteFuzzyRowKeyFactory;

const LINEAR_LIMIT: u64 = 8;
const SUB_BUCKET_BITS: u32 = 2;
const SUB_BUCKETS: u8 = 1 << SUB_BUCKET_BITS;

impl OneByteFuzzyRowKeyFactory {
    /// Highest bucket the factory ever produces.
    pub const MAX_BUCKET: u8 = Self::bucket(u64::MAX);

    pub const fn bucket(value: u64) -> u8 {
        if value < LINEAR_LIMIT {
            return value as u8;
        }
        let msb = 63 - value.leading_zeros();
        let sub = (value >> (msb - SUB_BUCKET_BITS)) as u8 & (SUB_BUCKETS - 1);
        LINEAR_LIMIT as u8 + (msb as u8 - 3) * SUB_BUCKETS + sub
    }

    /// Smallest value that lands in `bucket`, or `None` past the last bucket.
    pub const fn lower_bound(bucket: u8) -> Option<u64> {
        if (bucket as u64) < LINEAR_LIMIT {
            return Some(bucket as u64);
        }
        if bucket > Self::MAX_BUCKET {
            return None;
        }
        let offset = bucket - LINEAR_LIMIT as u8;
        let msb = (offset / SUB_BUCKETS) as u32 + 3;
        let sub = (offset % SUB_BUCKETS) as u64;
        Some((1u64 << msb) | (sub << (msb - SUB_BUCKET_BITS)))
    }
}

impl FuzzyRowKeyFactory<u8> for OneByteFuzzyRowKeyFactory {
    /// Negative values clamp to the first bucket.
    fn key(&self, value: i64) -> u8 {
        Self::bucket(value.max(0) as u64)
    }
}

/// Inclusive range of fuzzy bytes accepted by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyRange {
    pub min: u8,
    pub max: u8,
}

impl FuzzyRange {
    /// Accept every value `>= threshold`.
    pub fn at_least(threshold: i64) -> Self {
        Self {
            min: OneByteFuzzyRowKeyFactory.key(threshold),
            max: OneByteFuzzyRowKeyFactory::MAX_BUCKET,
        }
    }

    /// Accept every value in `low..=high`.
    pub fn between(low: i64, high: i64) -> Self {
        let factory = OneByteFuzzyRowKeyFactory;
        Self {
            min: factory.key(low),
            max: factory.key(high.max(low)),
        }
    }

    #[inline]
    pub fn contains(&self, fuzzy: u8) -> bool {
        (self.min..=self.max).contains(&fuzzy)
    }

    /// Test the trailing byte of a key. Empty keys never match.
    #[inline]
    pub fn matches(&self, key: &[u8]) -> bool {
        key.last().is_some_and(|b| self.contains(*b))
    }
}
