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

use crate::histogram::HistogramSchema;
use serde::{Deserialize, Serialize};

/// Kind of a node in the call graph, identified by a numeric code.
///
/// The code is what gets persisted; the schema decides how latencies of calls
/// *into* a node of this type are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceType {
    pub code: i16,
    pub schema: HistogramSchema,
}

impl ServiceType {
    pub const UNKNOWN: ServiceType = ServiceType::new(-1, HistogramSchema::Normal);
    pub const USER: ServiceType = ServiceType::new(2, HistogramSchema::Normal);
    pub const STAND_ALONE: ServiceType = ServiceType::new(1000, HistogramSchema::Normal);
    pub const TOMCAT: ServiceType = ServiceType::new(1010, HistogramSchema::Normal);
    pub const SPRING_BOOT: ServiceType = ServiceType::new(1210, HistogramSchema::Normal);
    pub const MYSQL: ServiceType = ServiceType::new(2100, HistogramSchema::Fast);
    pub const REDIS: ServiceType = ServiceType::new(8200, HistogramSchema::Fast);
    pub const KAFKA_CLIENT: ServiceType = ServiceType::new(8660, HistogramSchema::Fast);
    pub const HTTP_CLIENT: ServiceType = ServiceType::new(9050, HistogramSchema::Fast);

    pub const fn new(code: i16, schema: HistogramSchema) -> Self {
        Self { code, schema }
    }

    /// Resolve one of the well-known codes, falling back to the normal schema.
    pub fn from_code(code: i16) -> Self {
        [
            Self::UNKNOWN,
            Self::USER,
            Self::STAND_ALONE,
            Self::TOMCAT,
            Self::SPRING_BOOT,
            Self::MYSQL,
            Self::REDIS,
            Self::KAFKA_CLIENT,
            Self::HTTP_CLIENT,
        ]
        .into_iter()
        .find(|known| known.code == code)
        .unwrap_or(Self::new(code, HistogramSchema::Normal))
    }
}

impl Default for ServiceType {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_known() {
        assert_eq!(ServiceType::from_code(2100), ServiceType::MYSQL);
        assert_eq!(ServiceType::from_code(2100).schema, HistogramSchema::Fast);
    }

    #[test]
    fn test_from_code_unknown_uses_normal_schema() {
        let custom = ServiceType::from_code(7777);
        assert_eq!(custom.code, 7777);
        assert_eq!(custom.schema, HistogramSchema::Normal);
    }
}
