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

//! Behaviour trait and per-object behaviour slots
//!
//! Behaviours are the state and logic attached to game objects, at most one
//! per concrete type per object. Every callback receives the owning
//! [`GameObject`] so siblings, the scene and the object itself stay reachable
//! without storing a back-pointer.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::capability::{Capabilities, Capability, CapabilitySet};
use crate::entity::BehaviourId;
use crate::game_object::GameObject;

/// Per-object state and logic driven by the scene's frame protocol.
///
/// All callbacks default to no-ops. They run in attach order within an
/// object, objects in id order.
pub trait Behaviour: 'static {
    /// Register capabilities (listeners, collider, custom traits).
    fn capabilities(_caps: &mut Capabilities<Self>)
    where
        Self: Sized,
    {
    }

    /// Scene start, or immediately on attach once the scene has started
    fn on_start(&mut self, _owner: &GameObject) {}

    fn on_pre_update(&mut self, _owner: &GameObject) {}

    fn on_update(&mut self, _owner: &GameObject, _delta_seconds: f64) {}

    fn on_post_update(&mut self, _owner: &GameObject) {}

    fn on_post_collision(&mut self, _owner: &GameObject) {}

    /// Owner is being destroyed; no callback follows this one
    fn on_end(&mut self, _owner: &GameObject) {}
}

/// Runs after `on_end` when a behaviour is detached from its owner.
pub(crate) type DetachHook = Box<dyn FnOnce(&GameObject)>;

/// One attached behaviour: identity, storage and capability table.
pub(crate) struct BehaviourSlot {
    id: BehaviourId,
    type_id: TypeId,
    dynamic: Rc<RefCell<dyn Behaviour>>,
    cell: Rc<dyn Any>,
    capabilities: Rc<CapabilitySet>,
    detach_hooks: RefCell<Vec<DetachHook>>,
    detached: Cell<bool>,
}

impl BehaviourSlot {
    pub(crate) fn new<B: Behaviour>(
        id: BehaviourId,
        value: B,
        capabilities: Rc<CapabilitySet>,
    ) -> Self {
        let typed = Rc::new(RefCell::new(value));
        let dynamic: Rc<RefCell<dyn Behaviour>> = typed.clone();
        let cell: Rc<dyn Any> = typed;
        Self {
            id,
            type_id: TypeId::of::<B>(),
            dynamic,
            cell,
            capabilities,
            detach_hooks: RefCell::new(Vec::new()),
            detached: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> BehaviourId {
        self.id
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.capabilities.type_name()
    }

    pub(crate) fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub(crate) fn typed<B: 'static>(&self) -> Option<Rc<RefCell<B>>> {
        self.cell.clone().downcast::<RefCell<B>>().ok()
    }

    pub(crate) fn capability<T: ?Sized + 'static>(&self) -> Option<Capability<T>> {
        let cast = self.capabilities.caster::<T>()?;
        Some(Capability::new(
            self.id,
            self.type_name(),
            self.cell.clone(),
            cast,
        ))
    }

    /// Run `f` on the behaviour unless it is already borrowed further up the
    /// call stack. Returns whether `f` ran.
    pub(crate) fn run(&self, callback: &'static str, f: impl FnOnce(&mut dyn Behaviour)) -> bool {
        if self.detached.get() {
            return false;
        }
        match self.dynamic.try_borrow_mut() {
            Ok(mut behaviour) => {
                f(&mut *behaviour);
                true
            }
            Err(_) => {
                tracing::warn!(
                    behaviour = %self.id,
                    type_name = self.type_name(),
                    callback,
                    "behaviour is already running, skipping re-entrant callback"
                );
                false
            }
        }
    }

    pub(crate) fn add_detach_hook(&self, hook: DetachHook) {
        self.detach_hooks.borrow_mut().push(hook);
    }

    /// Final teardown step: run hooks, then refuse any further callbacks.
    pub(crate) fn detach(&self, owner: &GameObject) {
        let hooks = std::mem::take(&mut *self.detach_hooks.borrow_mut());
        for hook in hooks {
            hook(owner);
        }
        self.detached.set(true);
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.detached.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::GameObjectId;
    use crate::scene::Scene;

    #[derive(Default)]
    struct Counter {
        updates: u32,
    }

    impl Behaviour for Counter {
        fn on_update(&mut self, _owner: &GameObject, _delta_seconds: f64) {
            self.updates += 1;
        }
    }

    fn slot() -> BehaviourSlot {
        BehaviourSlot::new(
            BehaviourId::new(GameObjectId(1), 0),
            Counter::default(),
            Rc::new(CapabilitySet::build::<Counter>()),
        )
    }

    #[test]
    fn test_slot_exposes_typed_and_capability_views() {
        let slot = slot();
        assert_eq!(slot.type_id(), TypeId::of::<Counter>());
        assert_eq!(slot.type_name(), "Counter");
        assert!(slot.typed::<Counter>().is_some());
        assert!(slot.typed::<u32>().is_none());
        assert!(slot.capability::<Counter>().is_some());
    }

    #[test]
    fn test_run_skips_busy_and_detached() {
        let scene = Scene::new();
        let owner = scene.add_game_object();
        let slot = slot();

        assert!(slot.run("on_update", |b| b.on_update(&owner, 0.1)));
        {
            let _held = slot.dynamic.borrow_mut();
            assert!(!slot.run("on_update", |b| b.on_update(&owner, 0.1)));
        }

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        slot.add_detach_hook(Box::new(move |_| flag.set(true)));
        slot.detach(&owner);
        assert!(fired.get());
        assert!(slot.is_detached());
        assert!(!slot.run("on_update", |b| b.on_update(&owner, 0.1)));
        assert_eq!(slot.typed::<Counter>().unwrap().borrow().updates, 1);
    }
}
