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

//! Keys of the caller/callee link statistics tables.

use super::{
    put_qualifier, put_vertex, ColumnKind, ColumnName, KeyDecodeError, KeyReader, RowKey,
    TIMESTAMP_LEN, VERTEX_KEY_LEN,
};
use bytes::Bytes;
use linkmap_core::{HistogramSlot, ServiceType, Vertex};

/// Row of one vertex in one time slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkRowKey {
    pub vertex: Vertex,
    pub time_slot: i64,
}

impl LinkRowKey {
    pub const ENCODED_LEN: usize = VERTEX_KEY_LEN + TIMESTAMP_LEN;

    pub fn of(vertex: &Vertex, time_slot: i64) -> Self {
        Self {
            vertex: vertex.clone(),
            time_slot,
        }
    }

    /// Unsalted encoding. The time slot is written forward so that later
    /// slots of the same vertex sort after earlier ones.
    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::with_capacity(Self::ENCODED_LEN);
        put_vertex(&mut buf, &self.vertex);
        buf.extend_from_slice(&(self.time_slot.max(0) as u64).to_be_bytes());
        Bytes::from(buf)
    }

    /// Decode an unsalted row key. Strip the salt with the distributor first.
    pub fn decode(raw: &[u8]) -> Result<Self, KeyDecodeError> {
        let mut reader = KeyReader::new(raw);
        let vertex = reader.vertex()?;
        let time_slot = reader.u64()? as i64;
        reader.finish()?;
        Ok(Self { vertex, time_slot })
    }

    /// Half-open unsalted scan range `[from, to)` over the slots of `vertex`.
    pub fn scan_range(vertex: &Vertex, from_slot: i64, to_slot: i64) -> (Bytes, Bytes) {
        (
            Self::of(vertex, from_slot).encode(),
            Self::of(vertex, to_slot).encode(),
        )
    }
}

impl RowKey for LinkRowKey {
    fn row_key(&self) -> Bytes {
        self.encode()
    }
}

/// Trailing field of a link column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnTail {
    /// Histogram columns end with the slot code.
    Slot(HistogramSlot),
    /// Sum and max columns end with the service type of the row's own vertex.
    ServiceType(i16),
}

/// One statistic of an edge, stored in the row of the other end of the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkColumnName {
    pub kind: ColumnKind,
    pub other: Vertex,
    pub host: String,
    pub agent_id: String,
    pub tail: ColumnTail,
}

impl LinkColumnName {
    pub fn histogram(agent_id: &str, other: &Vertex, host: &str, slot: HistogramSlot) -> Self {
        Self {
            kind: ColumnKind::Histogram,
            other: other.clone(),
            host: host.to_string(),
            agent_id: agent_id.to_string(),
            tail: ColumnTail::Slot(slot),
        }
    }

    pub fn sum(agent_id: &str, other: &Vertex, host: &str, self_type: ServiceType) -> Self {
        Self::stat(ColumnKind::Sum, agent_id, other, host, self_type)
    }

    pub fn max(agent_id: &str, other: &Vertex, host: &str, self_type: ServiceType) -> Self {
        Self::stat(ColumnKind::Max, agent_id, other, host, self_type)
    }

    fn stat(
        kind: ColumnKind,
        agent_id: &str,
        other: &Vertex,
        host: &str,
        self_type: ServiceType,
    ) -> Self {
        Self {
            kind,
            other: other.clone(),
            host: host.to_string(),
            agent_id: agent_id.to_string(),
            tail: ColumnTail::ServiceType(self_type.code),
        }
    }

    pub fn encode(&self) -> Bytes {
        let capacity = 1 + VERTEX_KEY_LEN + 2 + self.host.len() + self.agent_id.len() + 2;
        let mut buf = Vec::with_capacity(capacity);
        buf.push(self.kind.as_byte());
        put_vertex(&mut buf, &self.other);
        put_qualifier(&mut buf, &self.host);
        put_qualifier(&mut buf, &self.agent_id);
        match self.tail {
            ColumnTail::Slot(slot) => buf.push(slot.code()),
            ColumnTail::ServiceType(code) => buf.extend_from_slice(&code.to_be_bytes()),
        }
        Bytes::from(buf)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, KeyDecodeError> {
        let mut reader = KeyReader::new(raw);
        let kind = ColumnKind::from_byte(reader.u8()?)?;
        let other = reader.vertex()?;
        let host = reader.qualifier()?;
        let agent_id = reader.qualifier()?;
        let tail = match kind {
            ColumnKind::Histogram => {
                let code = reader.u8()?;
                let slot =
                    HistogramSlot::from_code(code).ok_or(KeyDecodeError::UnknownSlot(code))?;
                ColumnTail::Slot(slot)
            }
            ColumnKind::Sum | ColumnKind::Max => ColumnTail::ServiceType(reader.i16()?),
        };
        reader.finish()?;
        Ok(Self {
            kind,
            other,
            host,
            agent_id,
            tail,
        })
    }
}

impl ColumnName for LinkColumnName {
    fn column_name(&self) -> Bytes {
        self.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn api() -> Vertex {
        Vertex::new("api", ServiceType::TOMCAT)
    }

    fn db() -> Vertex {
        Vertex::new("orders-db", ServiceType::MYSQL)
    }

    #[test]
    fn test_row_key_is_fixed_width() {
        let short = LinkRowKey::of(&Vertex::new("a", ServiceType::TOMCAT), 0).encode();
        let long_name = Vertex::new("a".repeat(100), ServiceType::TOMCAT);
        let long = LinkRowKey::of(&long_name, 60_000).encode();
        assert_eq!(short.len(), LinkRowKey::ENCODED_LEN);
        assert_eq!(long.len(), LinkRowKey::ENCODED_LEN);
    }

    #[test]
    fn test_row_key_decode() {
        let key = LinkRowKey::of(&api(), 1_700_000_040_000);
        assert_eq!(LinkRowKey::decode(&key.encode()).unwrap(), key);
    }

    #[test]
    fn test_truncated_name_decodes_to_prefix() {
        let vertex = Vertex::new("a-very-long-application-name-indeed", ServiceType::TOMCAT);
        let decoded = LinkRowKey::decode(&LinkRowKey::of(&vertex, 0).encode()).unwrap();
        assert_eq!(decoded.vertex.application_name, "a-very-long-application-");
    }

    #[test]
    fn test_histogram_column_round_trip() {
        let column =
            LinkColumnName::histogram("api-1", &db(), "10.0.0.7:3306", HistogramSlot::SlowError);
        let encoded = column.encode();
        assert_eq!(encoded[0], ColumnKind::Histogram.as_byte());
        assert_eq!(*encoded.last().unwrap(), HistogramSlot::SlowError.code());
        assert_eq!(LinkColumnName::decode(&encoded).unwrap(), column);
    }

    #[test]
    fn test_sum_and_max_columns_differ() {
        let sum = LinkColumnName::sum("api-1", &db(), "", ServiceType::TOMCAT).encode();
        let max = LinkColumnName::max("api-1", &db(), "", ServiceType::TOMCAT).encode();
        assert_ne!(sum, max);
        assert_eq!(&sum[1..], &max[1..]);
        assert_eq!(
            LinkColumnName::decode(&sum).unwrap().tail,
            ColumnTail::ServiceType(ServiceType::TOMCAT.code)
        );
    }

    #[test]
    fn test_same_statistic_same_column() {
        let a = LinkColumnName::histogram("api-1", &db(), "", HistogramSlot::Fast).encode();
        let b = LinkColumnName::histogram("api-1", &db(), "", HistogramSlot::Fast).encode();
        assert_eq!(a, b);
    }

    #[test]
    fn test_qualifiers_do_not_alias() {
        // "ab" + "c" must not collide with "a" + "bc"
        let a = LinkColumnName::histogram("c", &db(), "ab", HistogramSlot::Fast).encode();
        let b = LinkColumnName::histogram("bc", &db(), "a", HistogramSlot::Fast).encode();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_rejects_unknown_slot() {
        let mut raw = LinkColumnName::histogram("", &db(), "", HistogramSlot::Fast)
            .encode()
            .to_vec();
        *raw.last_mut().unwrap() = 0x42;
        assert_eq!(LinkColumnName::decode(&raw), Err(KeyDecodeError::UnknownSlot(0x42)));
    }

    proptest! {
        #[test]
        fn prop_row_key_orders_by_time(a in 0i64..i64::MAX / 2, b in 0i64..i64::MAX / 2) {
            let vertex = api();
            let ka = LinkRowKey::of(&vertex, a).encode();
            let kb = LinkRowKey::of(&vertex, b).encode();
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }
    }
}
