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

//! Game objects: containers of behaviours, one per concrete type.
//!
//! A [`GameObject`] is a cheap handle. The scene decides liveness: once the
//! object is torn down its behaviour table is emptied, so outstanding handles
//! and weak behaviour references observe it as gone rather than dangling.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::behaviour::{Behaviour, BehaviourSlot, DetachHook};
use crate::capability::{Capability, CapabilitySet, WeakCapability};
use crate::entity::{BehaviourId, GameObjectId};
use crate::error::{EmberError, Result};
use crate::event::ListensTo;
use crate::reflection::short_type_name;
use crate::scene::{Scene, SceneInner};

pub(crate) type SlotSnapshot = SmallVec<[Rc<BehaviourSlot>; 8]>;

/// Attached behaviours in attach order, indexed by exact type.
#[derive(Default)]
struct BehaviourTable {
    slots: SlotSnapshot,
    by_type: AHashMap<TypeId, usize>,
}

impl BehaviourTable {
    fn get(&self, type_id: TypeId) -> Option<&Rc<BehaviourSlot>> {
        self.by_type.get(&type_id).and_then(|&i| self.slots.get(i))
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.by_type.clear();
    }
}

pub(crate) struct ObjectInner {
    id: GameObjectId,
    scene: Weak<SceneInner>,
    table: RefCell<BehaviourTable>,
    next_index: Cell<u32>,
    /// Set by every attach, cleared when the scene re-filters the object
    components_changed: Cell<bool>,
    started: Cell<bool>,
    destroyed: Cell<bool>,
}

/// Handle to a game object owned by a [`Scene`].
#[derive(Clone)]
pub struct GameObject {
    inner: Rc<ObjectInner>,
}

impl GameObject {
    pub(crate) fn new(id: GameObjectId, scene: Weak<SceneInner>) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id,
                scene,
                table: RefCell::new(BehaviourTable::default()),
                next_index: Cell::new(0),
                // new objects have never been filtered
                components_changed: Cell::new(true),
                started: Cell::new(false),
                destroyed: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> GameObjectId {
        self.inner.id
    }

    /// Owning scene, unless it has been dropped
    pub fn scene(&self) -> Option<Scene> {
        self.inner.scene.upgrade().map(Scene::from_inner)
    }

    /// False once the object has been torn down
    pub fn is_alive(&self) -> bool {
        !self.inner.destroyed.get()
    }

    pub fn has_started(&self) -> bool {
        self.inner.started.get()
    }

    pub fn downgrade(&self) -> WeakGameObject {
        WeakGameObject {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Check if two handles refer to the same object
    pub fn ptr_eq(&self, other: &GameObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attach `value` unless a `B` is already attached, in which case `value`
    /// is dropped and the existing instance kept. Chainable.
    pub fn add_component<B: Behaviour>(&self, value: B) -> &Self {
        self.add_component_with(|| value)
    }

    /// Like [`add_component`](Self::add_component), but only constructs the
    /// behaviour when no `B` is attached yet.
    pub fn add_component_with<B: Behaviour>(&self, make: impl FnOnce() -> B) -> &Self {
        if !self.is_alive() {
            warn!(object = %self.id(), type_name = short_type_name::<B>(), "attach to destroyed game object ignored");
            return self;
        }
        if self.has_component::<B>() {
            debug!(object = %self.id(), type_name = short_type_name::<B>(), "behaviour already attached");
            return self;
        }

        let capabilities = self.capabilities_of::<B>();
        let value = make();
        let slot = {
            let mut table = self.inner.table.borrow_mut();
            if table.by_type.contains_key(&TypeId::of::<B>()) {
                return self;
            }
            let index = self.inner.next_index.get();
            self.inner.next_index.set(index + 1);
            let slot = Rc::new(BehaviourSlot::new(
                BehaviourId::new(self.id(), index),
                value,
                capabilities,
            ));
            let position = table.slots.len();
            table.slots.push(slot.clone());
            table.by_type.insert(slot.type_id(), position);
            slot
        };
        self.inner.components_changed.set(true);
        trace!(behaviour = %slot.id(), type_name = slot.type_name(), "behaviour attached");

        if self.has_started() {
            slot.run("on_start", |b| b.on_start(self));
        }
        self
    }

    /// Exact-type presence check
    pub fn has_component<B: Behaviour>(&self) -> bool {
        self.has_component_type(TypeId::of::<B>())
    }

    /// Weak reference to the attached `B`; expired when absent.
    pub fn get_component<B: Behaviour>(&self) -> Weak<RefCell<B>> {
        self.typed_component::<B>()
            .map(|rc| Rc::downgrade(&rc))
            .unwrap_or_default()
    }

    /// The attached `B`, or `BehaviourNotFound`.
    pub fn ref_component<B: Behaviour>(&self) -> Result<Rc<RefCell<B>>> {
        self.typed_component::<B>()
            .ok_or(EmberError::BehaviourNotFound {
                object: self.id(),
                type_name: short_type_name::<B>(),
            })
    }

    /// Identity of the attached `B`
    pub fn behaviour_id<B: Behaviour>(&self) -> Option<BehaviourId> {
        self.inner
            .table
            .borrow()
            .get(TypeId::of::<B>())
            .map(|slot| slot.id())
    }

    /// Every behaviour carrying capability `T`, in attach order.
    ///
    /// Scans all attached behaviours. Meant for cross-cutting lookups, not
    /// per-frame hot paths.
    pub fn get_components_of<T: ?Sized + 'static>(&self) -> Vec<WeakCapability<T>> {
        self.components_of::<T>()
            .iter()
            .map(Capability::downgrade)
            .collect()
    }

    /// Strong form of [`get_components_of`](Self::get_components_of)
    pub fn components_of<T: ?Sized + 'static>(&self) -> Vec<Capability<T>> {
        self.inner
            .table
            .borrow()
            .slots
            .iter()
            .filter_map(|slot| slot.capability::<T>())
            .collect()
    }

    /// Check if any attached behaviour carries capability `T`
    pub fn has_component_of<T: ?Sized + 'static>(&self) -> bool {
        self.has_capability(TypeId::of::<T>())
    }

    pub fn component_count(&self) -> usize {
        self.inner.table.borrow().slots.len()
    }

    /// Short type names of attached behaviours, in attach order
    pub fn component_type_names(&self) -> Vec<&'static str> {
        self.inner
            .table
            .borrow()
            .slots
            .iter()
            .map(|slot| slot.type_name())
            .collect()
    }

    /// Deliver `event` to every `ListensTo<E>` behaviour, in attach order.
    pub fn cast_event<E: 'static>(&self, event: &E) {
        for listener in self.components_of::<dyn ListensTo<E>>() {
            match listener.try_borrow_mut() {
                Ok(mut listener) => listener.handle(self, event),
                Err(_) => warn!(
                    behaviour = %listener.id(),
                    event = short_type_name::<E>(),
                    "listener is already running, event not delivered"
                ),
            }
        }
    }

    /// Remove this object from its scene. Teardown is deferred while a frame
    /// phase is running. Returns false if it was already removed.
    pub fn destroy(&self) -> bool {
        match self.scene() {
            Some(scene) => scene.remove_game_object(self.id()),
            None => false,
        }
    }

    pub(crate) fn has_component_type(&self, type_id: TypeId) -> bool {
        self.inner.table.borrow().by_type.contains_key(&type_id)
    }

    pub(crate) fn has_capability(&self, capability: TypeId) -> bool {
        self.inner
            .table
            .borrow()
            .slots
            .iter()
            .any(|slot| slot.capabilities().contains(capability))
    }

    pub(crate) fn take_components_changed(&self) -> bool {
        self.inner.components_changed.replace(false)
    }

    pub(crate) fn slots(&self) -> SlotSnapshot {
        self.inner.table.borrow().slots.clone()
    }

    pub(crate) fn add_detach_hook(&self, behaviour: BehaviourId, hook: DetachHook) -> bool {
        let table = self.inner.table.borrow();
        match table.slots.iter().find(|slot| slot.id() == behaviour) {
            Some(slot) => {
                slot.add_detach_hook(hook);
                true
            }
            None => false,
        }
    }

    fn typed_component<B: Behaviour>(&self) -> Option<Rc<RefCell<B>>> {
        self.inner
            .table
            .borrow()
            .get(TypeId::of::<B>())
            .and_then(|slot| slot.typed::<B>())
    }

    fn capabilities_of<B: Behaviour>(&self) -> Rc<CapabilitySet> {
        match self.inner.scene.upgrade() {
            Some(scene) => scene.capabilities_of::<B>(),
            None => Rc::new(CapabilitySet::build::<B>()),
        }
    }

    fn fan_out(&self, callback: &'static str, mut f: impl FnMut(&mut dyn Behaviour)) {
        for slot in self.slots() {
            slot.run(callback, |b| f(b));
        }
    }

    pub(crate) fn start(&self) {
        if self.inner.started.replace(true) {
            return;
        }
        self.fan_out("on_start", |b| b.on_start(self));
    }

    pub(crate) fn pre_update(&self) {
        self.fan_out("on_pre_update", |b| b.on_pre_update(self));
    }

    pub(crate) fn update(&self, delta_seconds: f64) {
        self.fan_out("on_update", |b| b.on_update(self, delta_seconds));
    }

    pub(crate) fn post_update(&self) {
        self.fan_out("on_post_update", |b| b.on_post_update(self));
    }

    pub(crate) fn post_collision(&self) {
        self.fan_out("on_post_collision", |b| b.on_post_collision(self));
    }

    /// `on_end` for every behaviour, then detach hooks, then drop the table.
    pub(crate) fn teardown(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        let slots = self.slots();
        for slot in &slots {
            slot.run("on_end", |b| b.on_end(self));
        }
        for slot in &slots {
            slot.detach(self);
        }
        self.inner.table.borrow_mut().clear();
        debug!(object = %self.id(), behaviours = slots.len(), "game object destroyed");
    }
}

impl PartialEq for GameObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for GameObject {}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("GameObject");
        out.field("id", &self.id()).field("alive", &self.is_alive());
        if let Ok(table) = self.inner.table.try_borrow() {
            let names: Vec<_> = table.slots.iter().map(|s| s.type_name()).collect();
            out.field("behaviours", &names);
        }
        out.finish()
    }
}

/// Non-owning game object reference; expires when the object is torn down.
#[derive(Clone)]
pub struct WeakGameObject {
    id: GameObjectId,
    inner: Weak<ObjectInner>,
}

impl WeakGameObject {
    pub fn id(&self) -> GameObjectId {
        self.id
    }

    pub fn upgrade(&self) -> Option<GameObject> {
        let inner = self.inner.upgrade()?;
        if inner.destroyed.get() {
            return None;
        }
        Some(GameObject { inner })
    }

    pub fn is_expired(&self) -> bool {
        self.upgrade().is_none()
    }
}

impl fmt::Debug for WeakGameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakGameObject")
            .field("id", &self.id)
            .field("expired", &self.is_expired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position(i32);
    impl Behaviour for Position {}

    struct Velocity;
    impl Behaviour for Velocity {}

    trait Shape {
        fn area(&self) -> f32;
    }

    struct Square(f32);
    impl Shape for Square {
        fn area(&self) -> f32 {
            self.0 * self.0
        }
    }
    impl Behaviour for Square {
        fn capabilities(caps: &mut crate::capability::Capabilities<Self>) {
            caps.implements::<dyn Shape>(|s| s, |s| s);
        }
    }

    struct Disc(f32);
    impl Shape for Disc {
        fn area(&self) -> f32 {
            3.0 * self.0 * self.0
        }
    }
    impl Behaviour for Disc {
        fn capabilities(caps: &mut crate::capability::Capabilities<Self>) {
            caps.implements::<dyn Shape>(|s| s, |s| s);
        }
    }

    #[test]
    fn test_absent_component_lookups() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        assert!(!object.has_component::<Position>());
        assert!(object.get_component::<Position>().upgrade().is_none());
        let err = object.ref_component::<Position>().unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(object.behaviour_id::<Position>(), None);
    }

    #[test]
    fn test_add_component_is_idempotent() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        object
            .add_component(Position(1))
            .add_component(Position(2))
            .add_component(Velocity);

        assert_eq!(object.component_count(), 2);
        assert_eq!(*object.ref_component::<Position>().unwrap().borrow(), Position(1));
        assert_eq!(object.component_type_names(), vec!["Position", "Velocity"]);

        let mut constructed = false;
        object.add_component_with(|| {
            constructed = true;
            Position(3)
        });
        assert!(!constructed);
    }

    #[test]
    fn test_behaviour_ids_follow_attach_order() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        object
            .add_component(Velocity)
            .add_component(Velocity)
            .add_component(Position(0));

        assert_eq!(object.behaviour_id::<Velocity>(), Some(BehaviourId::new(object.id(), 0)));
        assert_eq!(object.behaviour_id::<Position>(), Some(BehaviourId::new(object.id(), 1)));

        // Exact-type lookups are keyed by each slot's concrete type
        for slot in object.slots().iter() {
            assert!(object.has_component_type(slot.type_id()));
        }
        assert!(object.has_component_type(TypeId::of::<Position>()));
        assert!(!object.has_component_type(TypeId::of::<Square>()));
    }

    #[test]
    fn test_polymorphic_lookup_by_capability() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        object
            .add_component(Square(2.0))
            .add_component(Position(0))
            .add_component(Disc(1.0));

        assert!(object.has_component_of::<dyn Shape>());
        assert!(object.has_component_of::<Position>());
        let areas: Vec<f32> = object
            .components_of::<dyn Shape>()
            .iter()
            .map(|shape| shape.try_borrow().unwrap().area())
            .collect();
        assert_eq!(areas, vec![4.0, 3.0]);

        let weak = object.get_components_of::<Square>();
        assert_eq!(weak.len(), 1);
        assert!(weak[0].upgrade().is_some());
    }

    #[test]
    fn test_teardown_expires_references() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        object.add_component(Position(5));
        let weak_component = object.get_component::<Position>();
        let weak_object = object.downgrade();

        object.teardown();

        assert!(!object.is_alive());
        assert!(weak_object.upgrade().is_none());
        assert!(weak_component.upgrade().is_none());
        assert_eq!(object.component_count(), 0);

        object.add_component(Velocity);
        assert!(!object.has_component::<Velocity>());
    }

    #[test]
    fn test_changed_flag_tracks_attach() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        assert!(object.take_components_changed());
        assert!(!object.take_components_changed());
        object.add_component(Velocity);
        assert!(object.take_components_changed());
        object.add_component(Velocity);
        assert!(!object.take_components_changed());
    }
}
