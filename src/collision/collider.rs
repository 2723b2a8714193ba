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

//! Collider capability, collider handles and the collision event.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::behaviour::{Behaviour, BehaviourSlot};
use crate::capability::{Capabilities, Capability, WeakCapability};
use crate::collision::shapes::Aabb;
use crate::entity::BehaviourId;
use crate::error::Result;
use crate::game_object::{GameObject, WeakGameObject};

/// A behaviour taking part in collision detection.
///
/// Register it with [`Capabilities::collider`]:
///
/// ```ignore
/// impl Behaviour for Hitbox {
///     fn capabilities(caps: &mut Capabilities<Self>) {
///         caps.collider();
///     }
/// }
/// ```
pub trait Collider: Behaviour {
    /// Static colliders are only ever tested against movable ones. Read once
    /// when the collision engine registers the collider.
    fn is_static(&self) -> bool;

    /// Narrow-phase test against another collider
    fn collides_with(&self, other: &ColliderHandle) -> bool;

    /// World-space bounds used by bounds-based spatial partitions. Colliders
    /// without bounds are shortlisted against everything.
    fn bounds(&self) -> Option<Aabb> {
        None
    }
}

/// Casts a `Collision<B>` on the owner of a `B` collider.
#[derive(Clone, Copy)]
struct ColliderDispatch(fn(&GameObject, WeakCollider));

impl<B: Collider> Capabilities<B> {
    /// Register `B` as a collider. Its owner then receives
    /// `Collision<B>` events.
    pub fn collider(&mut self) -> &mut Self {
        self.implements::<dyn Collider>(as_collider::<B>, as_collider_mut::<B>)
            .extend(ColliderDispatch(dispatch_collision::<B>))
    }
}

fn as_collider<B: Collider>(b: &B) -> &(dyn Collider + 'static) {
    b
}

fn as_collider_mut<B: Collider>(b: &mut B) -> &mut (dyn Collider + 'static) {
    b
}

fn dispatch_collision<B: Collider>(owner: &GameObject, other: WeakCollider) {
    owner.cast_event(&Collision::<B>::new(other));
}

/// Live reference to a registered collider and its owner.
#[derive(Clone)]
pub struct ColliderHandle {
    is_static: bool,
    owner: GameObject,
    slot: Rc<BehaviourSlot>,
    collider: Capability<dyn Collider>,
    dispatch: ColliderDispatch,
}

impl ColliderHandle {
    /// `Ok(None)` for slots that are not colliders. Fails with
    /// `BehaviourBusy` while the collider itself is borrowed.
    pub(crate) fn from_slot(owner: &GameObject, slot: &Rc<BehaviourSlot>) -> Result<Option<Self>> {
        let Some(collider) = slot.capability::<dyn Collider>() else {
            return Ok(None);
        };
        let Some(dispatch) = slot.capabilities().extension::<ColliderDispatch>().copied() else {
            return Ok(None);
        };
        let is_static = collider.try_borrow()?.is_static();
        Ok(Some(Self {
            is_static,
            owner: owner.clone(),
            slot: slot.clone(),
            collider,
            dispatch,
        }))
    }

    /// Every collider attached to `object`, in attach order. Busy colliders
    /// are left out.
    pub fn all_of(object: &GameObject) -> Vec<ColliderHandle> {
        object
            .slots()
            .iter()
            .filter_map(|slot| Self::from_slot(object, slot).ok().flatten())
            .collect()
    }

    pub fn id(&self) -> BehaviourId {
        self.collider.id()
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn owner(&self) -> &GameObject {
        &self.owner
    }

    /// Short type name of the concrete collider
    pub fn type_name(&self) -> &'static str {
        self.collider.type_name()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, dyn Collider>> {
        self.collider.try_borrow()
    }

    /// Shared borrow as concrete type `C`; `None` for other collider types.
    pub fn downcast_ref<C: Collider>(&self) -> Option<Ref<'_, C>> {
        self.collider.downcast_ref::<C>()
    }

    /// The concrete collider, if it is a `C`
    pub fn downcast<C: Collider>(&self) -> Option<Rc<RefCell<C>>> {
        self.collider.downcast::<C>()
    }

    /// Current bounds, `None` if the collider has none or is busy
    pub fn bounds(&self) -> Option<Aabb> {
        self.collider.try_borrow().ok().and_then(|c| c.bounds())
    }

    pub fn downgrade(&self) -> WeakCollider {
        WeakCollider {
            id: self.id(),
            is_static: self.is_static,
            owner: self.owner.downgrade(),
            slot: Rc::downgrade(&self.slot),
            collider: self.collider.downgrade(),
            dispatch: self.dispatch,
        }
    }

    /// Cast `Collision<Self's type>` on this collider's owner, pointing at
    /// `other`.
    pub(crate) fn notify_collision_with(&self, other: &ColliderHandle) {
        (self.dispatch.0)(&self.owner, other.downgrade());
    }
}

impl fmt::Debug for ColliderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColliderHandle")
            .field("id", &self.id())
            .field("type", &self.type_name())
            .field("static", &self.is_static)
            .finish()
    }
}

/// Non-owning collider reference. Expires once the collider's owner is
/// torn down; an expired reference means "not colliding".
#[derive(Clone)]
pub struct WeakCollider {
    id: BehaviourId,
    is_static: bool,
    owner: WeakGameObject,
    slot: Weak<BehaviourSlot>,
    collider: WeakCapability<dyn Collider>,
    dispatch: ColliderDispatch,
}

impl WeakCollider {
    pub fn id(&self) -> BehaviourId {
        self.id
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn upgrade(&self) -> Option<ColliderHandle> {
        let slot = self.slot.upgrade()?;
        if slot.is_detached() {
            return None;
        }
        let owner = self.owner.upgrade()?;
        let collider = self.collider.upgrade()?;
        Some(ColliderHandle {
            is_static: self.is_static,
            owner,
            slot,
            collider,
            dispatch: self.dispatch,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.upgrade().is_none()
    }
}

impl fmt::Debug for WeakCollider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCollider")
            .field("id", &self.id)
            .field("static", &self.is_static)
            .field("expired", &self.is_expired())
            .finish()
    }
}

/// Event cast on the owner of a `C` collider when it collides with another
/// collider. Each colliding pair produces one event per side per frame.
pub struct Collision<C> {
    other: WeakCollider,
    _marker: PhantomData<fn() -> C>,
}

impl<C> Clone for Collision<C> {
    fn clone(&self) -> Self {
        Self {
            other: self.other.clone(),
            _marker: PhantomData,
        }
    }
}

impl<C: Collider> Collision<C> {
    pub fn new(other: WeakCollider) -> Self {
        Self {
            other,
            _marker: PhantomData,
        }
    }

    /// The other collider; `None` once it has been destroyed.
    pub fn collided_with(&self) -> Option<ColliderHandle> {
        self.other.upgrade()
    }

    /// The other collider if it is an `O` and still alive.
    pub fn collided_with_as<O: Collider>(&self) -> Option<Rc<RefCell<O>>> {
        self.collided_with()?.downcast::<O>()
    }

    pub fn other_id(&self) -> BehaviourId {
        self.other.id()
    }
}

impl<C> fmt::Debug for Collision<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collision")
            .field("collider", &crate::reflection::short_type_name::<C>())
            .field("other", &self.other)
            .finish()
    }
}
