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

use thiserror::Error;

/// Errors raised at the boundaries of the statistics pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkmapError {
    /// A required vertex is missing its identity.
    #[error("invalid {role} vertex: {reason}")]
    InvalidVertex { role: &'static str, reason: String },

    /// A call observation failed a precondition.
    #[error("invalid call observation: {0}")]
    InvalidObservation(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, LinkmapError>;
