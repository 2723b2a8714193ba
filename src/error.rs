// Copyright 2024 Saptak Santra
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

//! Error types

use std::fmt;

use crate::entity::GameObjectId;

/// Runtime error type
///
/// Only the `ref_*` accessors and configuration loading produce errors. The
/// `get_*`/`has_*` family reports absence through `Option`, `bool` or an
/// expired weak reference instead.
#[derive(Debug, Clone, PartialEq)]
pub enum EmberError {
    /// No live game object with this id in the scene
    GameObjectNotFound(GameObjectId),

    /// The game object has no behaviour of the requested exact type
    BehaviourNotFound {
        object: GameObjectId,
        type_name: &'static str,
    },

    /// No system of the requested type is attached to the scene
    SystemNotFound(&'static str),

    /// The collision engine holds no spatial partition of the requested type
    SpatialPartitionNotFound(&'static str),

    /// The behaviour is currently borrowed (its own callback is running)
    BehaviourBusy(&'static str),

    /// Configuration values out of range
    InvalidConfig(String),

    /// Configuration could not be parsed
    ConfigParse(String),

    /// A config or inspector snapshot could not be written as JSON
    Serialization(String),
}

impl EmberError {
    /// True for the lookup failures raised by `ref_*` accessors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EmberError::GameObjectNotFound(_)
                | EmberError::BehaviourNotFound { .. }
                | EmberError::SystemNotFound(_)
                | EmberError::SpatialPartitionNotFound(_)
        )
    }

    /// Wrap a failure to write JSON. Parse failures convert through `From`.
    pub(crate) fn serialization(err: serde_json::Error) -> Self {
        EmberError::Serialization(err.to_string())
    }
}

impl fmt::Display for EmberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmberError::GameObjectNotFound(id) => write!(f, "Game object not found: {id}"),
            EmberError::BehaviourNotFound { object, type_name } => {
                write!(f, "Behaviour {type_name} not found on game object {object}")
            }
            EmberError::SystemNotFound(name) => write!(f, "System not found: {name}"),
            EmberError::SpatialPartitionNotFound(name) => {
                write!(f, "Spatial partition not found: {name}")
            }
            EmberError::BehaviourBusy(name) => write!(f, "Behaviour already borrowed: {name}"),
            EmberError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            EmberError::ConfigParse(msg) => write!(f, "Configuration parse error: {msg}"),
            EmberError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for EmberError {}

impl From<serde_json::Error> for EmberError {
    fn from(err: serde_json::Error) -> Self {
        EmberError::ConfigParse(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EmberError>;
