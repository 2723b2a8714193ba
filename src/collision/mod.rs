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

//! Collision detection
//!
//! Attach a [`CollisionEngine`] to the scene and give game objects behaviours
//! that register as colliders. Colliding objects then receive
//! [`Collision<C>`] events, where `C` is their own collider type.

pub mod collider;
pub mod engine;
pub mod grid;
pub mod partition;
pub mod shapes;

pub use collider::{Collider, ColliderHandle, Collision, WeakCollider};
pub use engine::{CollisionEngine, CollisionStats};
pub use grid::UniformGrid;
pub use partition::SpatialPartition;
pub use shapes::{Aabb, BoxCollider, CircleCollider};
