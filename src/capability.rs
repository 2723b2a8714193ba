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

//! Capability tables
//!
//! A behaviour type opts into cross-cutting roles (event listener, collider,
//! any user trait) by registering a cast per role in
//! [`Behaviour::capabilities`]. Polymorphic lookups then go through the
//! table instead of trial downcasts:
//!
//! ```ignore
//! impl Behaviour for Ship {
//!     fn capabilities(caps: &mut Capabilities<Self>) {
//!         caps.listens_to::<Damage>()
//!             .implements::<dyn Steerable>(|s| s, |s| s);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::behaviour::Behaviour;
use crate::entity::BehaviourId;
use crate::error::{EmberError, Result};
use crate::event::ListensTo;
use crate::reflection::short_type_name;

/// Borrow a type-erased `RefCell<B>` as capability `T`.
pub(crate) trait ErasedCast<T: ?Sized + 'static>: 'static {
    fn try_borrow<'a>(&self, cell: &'a dyn Any) -> Option<Ref<'a, T>>;
    fn try_borrow_mut<'a>(&self, cell: &'a dyn Any) -> Option<RefMut<'a, T>>;
}

struct Cast<B: 'static, T: ?Sized + 'static> {
    by_ref: fn(&B) -> &T,
    by_mut: fn(&mut B) -> &mut T,
}

impl<B: 'static, T: ?Sized + 'static> ErasedCast<T> for Cast<B, T> {
    fn try_borrow<'a>(&self, cell: &'a dyn Any) -> Option<Ref<'a, T>> {
        let cell = cell.downcast_ref::<RefCell<B>>()?;
        let guard = cell.try_borrow().ok()?;
        Some(Ref::map(guard, self.by_ref))
    }

    fn try_borrow_mut<'a>(&self, cell: &'a dyn Any) -> Option<RefMut<'a, T>> {
        let cell = cell.downcast_ref::<RefCell<B>>()?;
        let guard = cell.try_borrow_mut().ok()?;
        Some(RefMut::map(guard, self.by_mut))
    }
}

/// Capabilities of one concrete behaviour type, keyed by capability type.
pub struct CapabilitySet {
    type_name: &'static str,
    casters: AHashMap<TypeId, Box<dyn Any>>,
    names: SmallVec<[&'static str; 4]>,
    extensions: AHashMap<TypeId, Box<dyn Any>>,
}

impl CapabilitySet {
    /// Build the table of `B`: its own exact type plus whatever it registers.
    pub(crate) fn build<B: Behaviour>() -> Self {
        let mut caps = Capabilities::<B> {
            set: CapabilitySet {
                type_name: short_type_name::<B>(),
                casters: AHashMap::new(),
                names: SmallVec::new(),
                extensions: AHashMap::new(),
            },
            _marker: PhantomData,
        };
        caps.implements::<B>(identity, identity_mut);
        B::capabilities(&mut caps);
        caps.set
    }

    /// Short name of the concrete behaviour type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn contains(&self, capability: TypeId) -> bool {
        self.casters.contains_key(&capability)
    }

    /// Check if capability `T` was registered
    pub fn provides<T: ?Sized + 'static>(&self) -> bool {
        self.contains(TypeId::of::<T>())
    }

    /// Names of all registered capabilities, in registration order
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub(crate) fn caster<T: ?Sized + 'static>(&self) -> Option<Rc<dyn ErasedCast<T>>> {
        self.casters
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<Rc<dyn ErasedCast<T>>>())
            .cloned()
    }

    pub(crate) fn extension<X: 'static>(&self) -> Option<&X> {
        self.extensions
            .get(&TypeId::of::<X>())
            .and_then(|boxed| boxed.downcast_ref::<X>())
    }
}

/// Registration builder handed to [`Behaviour::capabilities`].
pub struct Capabilities<B> {
    set: CapabilitySet,
    _marker: PhantomData<fn() -> B>,
}

impl<B: Behaviour> Capabilities<B> {
    /// Register `B` as implementing capability `T` (usually a `dyn Trait`).
    ///
    /// The casts are plain coercions; `|b| b` works for both.
    pub fn implements<T: ?Sized + 'static>(
        &mut self,
        by_ref: fn(&B) -> &T,
        by_mut: fn(&mut B) -> &mut T,
    ) -> &mut Self {
        let cast: Rc<dyn ErasedCast<T>> = Rc::new(Cast { by_ref, by_mut });
        if self
            .set
            .casters
            .insert(TypeId::of::<T>(), Box::new(cast))
            .is_none()
        {
            self.set.names.push(short_type_name::<T>());
        }
        self
    }

    /// Register `B` as a listener of events of type `E`.
    pub fn listens_to<E: 'static>(&mut self) -> &mut Self
    where
        B: ListensTo<E>,
    {
        self.implements::<dyn ListensTo<E>>(listener_ref::<B, E>, listener_mut::<B, E>)
    }

    /// Attach typed side data to the table, e.g. dispatch functions that need
    /// the concrete type.
    pub(crate) fn extend<X: 'static>(&mut self, value: X) -> &mut Self {
        self.set.extensions.insert(TypeId::of::<X>(), Box::new(value));
        self
    }
}

fn identity<B>(b: &B) -> &B {
    b
}

fn identity_mut<B>(b: &mut B) -> &mut B {
    b
}

fn listener_ref<B: ListensTo<E>, E: 'static>(b: &B) -> &(dyn ListensTo<E> + 'static) {
    b
}

fn listener_mut<B: ListensTo<E>, E: 'static>(b: &mut B) -> &mut (dyn ListensTo<E> + 'static) {
    b
}

/// A behaviour viewed through one of its capabilities.
pub struct Capability<T: ?Sized + 'static> {
    id: BehaviourId,
    type_name: &'static str,
    cell: Rc<dyn Any>,
    cast: Rc<dyn ErasedCast<T>>,
}

impl<T: ?Sized + 'static> Clone for Capability<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            type_name: self.type_name,
            cell: self.cell.clone(),
            cast: self.cast.clone(),
        }
    }
}

impl<T: ?Sized + 'static> Capability<T> {
    pub(crate) fn new(
        id: BehaviourId,
        type_name: &'static str,
        cell: Rc<dyn Any>,
        cast: Rc<dyn ErasedCast<T>>,
    ) -> Self {
        Self {
            id,
            type_name,
            cell,
            cast,
        }
    }

    pub fn id(&self) -> BehaviourId {
        self.id
    }

    /// Short name of the concrete behaviour type behind this capability
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Shared borrow; fails while the behaviour is mutably borrowed.
    pub fn try_borrow(&self) -> Result<Ref<'_, T>> {
        self.cast
            .try_borrow(&*self.cell)
            .ok_or(EmberError::BehaviourBusy(self.type_name))
    }

    /// Exclusive borrow; fails while the behaviour is borrowed.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, T>> {
        self.cast
            .try_borrow_mut(&*self.cell)
            .ok_or(EmberError::BehaviourBusy(self.type_name))
    }

    /// Recover the concrete behaviour, if it is a `B`.
    pub fn downcast<B: 'static>(&self) -> Option<Rc<RefCell<B>>> {
        self.cell.clone().downcast::<RefCell<B>>().ok()
    }

    /// Shared borrow of the concrete behaviour, if it is a `B` and not
    /// mutably borrowed.
    pub fn downcast_ref<B: 'static>(&self) -> Option<Ref<'_, B>> {
        (*self.cell)
            .downcast_ref::<RefCell<B>>()?
            .try_borrow()
            .ok()
    }

    pub fn downgrade(&self) -> WeakCapability<T> {
        WeakCapability {
            id: self.id,
            type_name: self.type_name,
            cell: Rc::downgrade(&self.cell),
            cast: self.cast.clone(),
        }
    }
}

/// Non-owning form of [`Capability`]; expires with its behaviour.
pub struct WeakCapability<T: ?Sized + 'static> {
    id: BehaviourId,
    type_name: &'static str,
    cell: Weak<dyn Any>,
    cast: Rc<dyn ErasedCast<T>>,
}

impl<T: ?Sized + 'static> Clone for WeakCapability<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            type_name: self.type_name,
            cell: self.cell.clone(),
            cast: self.cast.clone(),
        }
    }
}

impl<T: ?Sized + 'static> WeakCapability<T> {
    pub fn id(&self) -> BehaviourId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Capability<T>> {
        let cell = self.cell.upgrade()?;
        Some(Capability::new(self.id, self.type_name, cell, self.cast.clone()))
    }

    pub fn is_expired(&self) -> bool {
        self.cell.strong_count() == 0
    }
}
