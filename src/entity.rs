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

//! Game object and behaviour identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scene-unique game object identifier.
///
/// Allocated monotonically by the owning scene and never reused within it,
/// so ordering by id is ordering by insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameObjectId(pub u64);

impl fmt::Display for GameObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable behaviour identity: owner id plus attach order on that owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BehaviourId {
    pub object: GameObjectId,
    pub index: u32,
}

impl BehaviourId {
    pub fn new(object: GameObjectId, index: u32) -> Self {
        Self { object, index }
    }

    /// Order-independent key for an unordered pair of behaviours.
    pub fn canonical_pair(a: BehaviourId, b: BehaviourId) -> (BehaviourId, BehaviourId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl fmt::Display for BehaviourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object, self.index)
    }
}
