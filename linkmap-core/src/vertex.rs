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

use crate::error::{LinkmapError, Result};
use crate::service_type::ServiceType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node of the service dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    pub application_name: String,
    pub service_type: ServiceType,
}

impl Vertex {
    pub fn new(application_name: impl Into<String>, service_type: ServiceType) -> Self {
        Self {
            application_name: application_name.into(),
            service_type,
        }
    }

    /// Check that the vertex carries an identity. `role` names the vertex in
    /// the error ("caller", "callee").
    pub fn validate(&self, role: &'static str) -> Result<()> {
        if self.application_name.trim().is_empty() {
            return Err(LinkmapError::InvalidVertex {
                role,
                reason: "application name is blank".to_string(),
            });
        }
        // NUL is the key padding byte
        if self.application_name.contains('\0') {
            return Err(LinkmapError::InvalidVertex {
                role,
                reason: "application name contains NUL".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.application_name, self.service_type.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Vertex::new("api", ServiceType::TOMCAT).validate("caller").is_ok());

        let err = Vertex::new("  ", ServiceType::TOMCAT)
            .validate("callee")
            .unwrap_err();
        assert!(matches!(err, LinkmapError::InvalidVertex { role: "callee", .. }));
    }

    #[test]
    fn test_validate_rejects_nul() {
        for name in ["api\0", "a\0pi", "\0"] {
            let err = Vertex::new(name, ServiceType::TOMCAT)
                .validate("caller")
                .unwrap_err();
            assert!(matches!(err, LinkmapError::InvalidVertex { role: "caller", .. }));
        }
    }

    #[test]
    fn test_structural_equality() {
        let a = Vertex::new("api", ServiceType::TOMCAT);
        let b = Vertex::new(String::from("api"), ServiceType::from_code(1010));
        assert_eq!(a, b);
        assert_ne!(a, Vertex::new("api", ServiceType::SPRING_BOOT));
    }
}
