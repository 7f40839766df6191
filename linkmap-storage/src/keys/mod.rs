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

//! Row and column key encoding
//!
//! All keys are built from fixed-width fields so that keys of the same kind
//! have the same length and compare field by field. Multi-byte integers are
//! big-endian, which keeps lexicographic order equal to numeric order.
//!
//! # Layouts
//!
//! ```text
//! vertex      = name[24, zero padded] | service type[2]
//! link row    = salt[0|1] | vertex(self) | time slot[8]
//! hist column = 0x01 | vertex(other) | len|host | len|agent | slot[1]
//! sum column  = 0x02 | vertex(other) | len|host | len|agent | service type(self)[2]
//! max column  = 0x03 | vertex(other) | len|host | len|agent | service type(self)[2]
//! app index   = salt[0|1] | name[24] | reversed timestamp[8] | fuzzy[1]
//! ```

pub mod application_index;
pub mod distributor;
pub mod fuzzy;
pub mod link;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use linkmap_core::{ServiceType, Vertex};
use thiserror::Error;

pub use application_index::{ApplicationIndexRowKey, ApplicationIndexRowKeyEncoder};
pub use distributor::{
    ByteHasher, NoSaltDistributor, OneByteSimpleHash, RowKeyDistributor,
    RowKeyDistributorByHashPrefix, SaltKey,
};
pub use fuzzy::{FuzzyRange, FuzzyRowKeyFactory, OneByteFuzzyRowKeyFactory};
pub use link::{ColumnTail, LinkColumnName, LinkRowKey};

/// Width of the application name field.
pub const APPLICATION_NAME_MAX_LEN: usize = 24;
pub const SERVICE_TYPE_LEN: usize = 2;
pub const VERTEX_KEY_LEN: usize = APPLICATION_NAME_MAX_LEN + SERVICE_TYPE_LEN;
pub const TIMESTAMP_LEN: usize = 8;
/// Longest host or agent id kept in a column qualifier.
pub const QUALIFIER_MAX_LEN: usize = u8::MAX as usize;

/// Something that encodes to an unsalted row key.
pub trait RowKey {
    fn row_key(&self) -> Bytes;
}

/// Something that encodes to a column name.
pub trait ColumnName {
    fn column_name(&self) -> Bytes;
}

impl RowKey for Bytes {
    fn row_key(&self) -> Bytes {
        self.clone()
    }
}

impl ColumnName for Bytes {
    fn column_name(&self) -> Bytes {
        self.clone()
    }
}

/// Leading discriminator byte of a statistics column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ColumnKind {
    Histogram = 0x01,
    Sum = 0x02,
    Max = 0x03,
}

impl ColumnKind {
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, KeyDecodeError> {
        match byte {
            0x01 => Ok(ColumnKind::Histogram),
            0x02 => Ok(ColumnKind::Sum),
            0x03 => Ok(ColumnKind::Max),
            other => Err(KeyDecodeError::UnknownColumnKind(other)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("key truncated: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown column kind: {0:#04x}")]
    UnknownColumnKind(u8),

    #[error("unknown histogram slot: {0:#04x}")]
    UnknownSlot(u8),

    #[error("field is not valid UTF-8")]
    InvalidUtf8,

    #[error("{0} trailing bytes after key")]
    TrailingBytes(usize),
}

/// Longest prefix of `value` that fits in `max` bytes without splitting a
/// character.
pub(crate) fn truncate_utf8(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub(crate) fn put_fixed_str(buf: &mut Vec<u8>, value: &str, width: usize) {
    let value = truncate_utf8(value, width);
    buf.extend_from_slice(value.as_bytes());
    buf.resize(buf.len() + (width - value.len()), 0);
}

pub(crate) fn put_qualifier(buf: &mut Vec<u8>, value: &str) {
    let value = truncate_utf8(value, QUALIFIER_MAX_LEN);
    buf.push(value.len() as u8);
    buf.extend_from_slice(value.as_bytes());
}

pub(crate) fn put_vertex(buf: &mut Vec<u8>, vertex: &Vertex) {
    put_fixed_str(buf, &vertex.application_name, APPLICATION_NAME_MAX_LEN);
    buf.extend_from_slice(&vertex.service_type.code.to_be_bytes());
}

/// Cursor over an encoded key.
pub(crate) struct KeyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> KeyReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], KeyDecodeError> {
        let remaining = self.buf.len() - self.pos;
        if remaining < len {
            return Err(KeyDecodeError::Truncated {
                offset: self.pos,
                needed: len - remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, KeyDecodeError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn i16(&mut self) -> Result<i16, KeyDecodeError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, KeyDecodeError> {
        Ok(BigEndian::read_u64(self.take(TIMESTAMP_LEN)?))
    }

    pub(crate) fn fixed_str(&mut self, width: usize) -> Result<String, KeyDecodeError> {
        let raw = self.take(width)?;
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        String::from_utf8(raw[..end].to_vec()).map_err(|_| KeyDecodeError::InvalidUtf8)
    }

    pub(crate) fn qualifier(&mut self) -> Result<String, KeyDecodeError> {
        let len = self.u8()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| KeyDecodeError::InvalidUtf8)
    }

    pub(crate) fn vertex(&mut self) -> Result<Vertex, KeyDecodeError> {
        let name = self.fixed_str(APPLICATION_NAME_MAX_LEN)?;
        let code = self.i16()?;
        Ok(Vertex::new(name, ServiceType::from_code(code)))
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn finish(self) -> Result<(), KeyDecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(KeyDecodeError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8_keeps_char_boundary() {
        assert_eq!(truncate_utf8("abc", 10), "abc");
        assert_eq!(truncate_utf8("abcdef", 4), "abcd");
        // 'é' is two bytes; cutting in the middle backs off
        assert_eq!(truncate_utf8("aé", 2), "a");
    }

    #[test]
    fn test_fixed_str_is_padded() {
        let mut buf = Vec::new();
        put_fixed_str(&mut buf, "api", APPLICATION_NAME_MAX_LEN);
        assert_eq!(buf.len(), APPLICATION_NAME_MAX_LEN);
        assert_eq!(&buf[..3], b"api");
        assert!(buf[3..].iter().all(|b| *b == 0));

        let mut reader = KeyReader::new(&buf);
        assert_eq!(reader.fixed_str(APPLICATION_NAME_MAX_LEN).unwrap(), "api");
        reader.finish().unwrap();
    }

    #[test]
    fn test_long_name_is_truncated() {
        let long = "x".repeat(APPLICATION_NAME_MAX_LEN + 10);
        let mut buf = Vec::new();
        put_fixed_str(&mut buf, &long, APPLICATION_NAME_MAX_LEN);
        assert_eq!(buf.len(), APPLICATION_NAME_MAX_LEN);
    }

    #[test]
    fn test_reader_reports_truncation() {
        let mut reader = KeyReader::new(&[0x01]);
        assert_eq!(
            reader.i16(),
            Err(KeyDecodeError::Truncated { offset: 0, needed: 1 })
        );
    }

    #[test]
    fn test_column_kind_bytes() {
        for kind in [ColumnKind::Histogram, ColumnKind::Sum, ColumnKind::Max] {
            assert_eq!(ColumnKind::from_byte(kind.as_byte()), Ok(kind));
        }
        assert_eq!(
            ColumnKind::from_byte(0x7f),
            Err(KeyDecodeError::UnknownColumnKind(0x7f))
        );
    }
}
