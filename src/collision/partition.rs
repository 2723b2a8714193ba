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

//! Pluggable broad phase
//!
//! A partition narrows the set of colliders each movable collider is tested
//! against. Without one, the collision engine tests every movable collider
//! against every other registered collider.

use crate::collision::collider::{ColliderHandle, WeakCollider};
use crate::reflection::AsAny;

/// Broad-phase strategy owned by a [`CollisionEngine`](super::CollisionEngine).
pub trait SpatialPartition: AsAny {
    /// A collider entered the engine
    fn partition(&mut self, collider: &ColliderHandle);

    /// A collider left the engine. It may already be expired.
    fn remove(&mut self, collider: &WeakCollider);

    /// Called once per frame for every movable collider, before the pass
    fn update(&mut self, collider: &ColliderHandle);

    /// Candidates to narrow-phase test against. Must not contain `collider`
    /// itself.
    fn shortlist_for(&self, collider: &ColliderHandle) -> Vec<WeakCollider>;

    /// Number of colliders currently tracked
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
