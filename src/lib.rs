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

//! Ember - game object runtime with collision detection
//!
//! Game objects carry behaviours, systems process filtered views of the
//! objects, and a [`Scene`] drives both through a fixed frame protocol:
//! start (once), pre-update, update, post-update, collision, post-collision.

pub mod behaviour;
pub mod capability;
pub mod collision;
pub mod config;
pub mod debug;
pub mod entity;
pub mod error;
pub mod event;
pub mod filter;
pub mod game_object;
pub mod prelude;
pub mod profiling;
pub mod reflection;
pub mod scene;
pub mod system;


pub use behaviour::Behaviour;
pub use capability::{Capabilities, Capability, CapabilitySet, WeakCapability};
pub use collision::{
    Aabb, BoxCollider, CircleCollider, Collider, ColliderHandle, Collision, CollisionEngine,
    CollisionStats, SpatialPartition, UniformGrid, WeakCollider,
};
pub use config::SceneConfig;
pub use debug::{Diagnostics, GameObjectInfo, SceneInspector, SystemInfo};
pub use entity::{BehaviourId, GameObjectId};
pub use error::{EmberError, Result};
pub use event::ListensTo;
pub use filter::Filter;
pub use game_object::{GameObject, WeakGameObject};
pub use reflection::{short_type_name, AsAny, TypeRegistry};
pub use scene::{Phase, Scene};
pub use system::{ManagedView, System};
