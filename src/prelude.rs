//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use ember::prelude::*;
//! ```

pub use crate::behaviour::Behaviour;
pub use crate::capability::{Capabilities, Capability, WeakCapability};
pub use crate::collision::{
    Aabb, BoxCollider, CircleCollider, Collider, ColliderHandle, Collision, CollisionEngine,
    SpatialPartition, UniformGrid, WeakCollider,
};
pub use crate::config::SceneConfig;
pub use crate::debug::{Diagnostics, SceneInspector};
pub use crate::entity::{BehaviourId, GameObjectId};
pub use crate::error::{EmberError, Result};
pub use crate::event::ListensTo;
pub use crate::filter::Filter;
pub use crate::game_object::{GameObject, WeakGameObject};
pub use crate::scene::{Phase, Scene};
pub use crate::system::{ManagedView, System};
pub use glam::Vec2;
