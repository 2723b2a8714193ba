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

//! Scene: owner of game objects and systems, driver of the frame protocol
//!
//! One call to [`Scene::run_update_cycle`] runs
//! `PreUpdate -> Update -> PostUpdate -> Collision -> PostCollision`,
//! preceded by a one-time `Start` on the first call. Each phase snapshots
//! its participants on entry and visits game objects first (id order), then
//! systems (attach order).
//!
//! Removing a game object while a phase runs only takes it out of the
//! scene's map. The object is torn down once the phase completes, so it
//! stays usable, and is still visited if it was already in the snapshot.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::behaviour::Behaviour;
use crate::capability::CapabilitySet;
use crate::config::SceneConfig;
use crate::debug::{Diagnostics, SystemInfo};
use crate::entity::GameObjectId;
use crate::error::{EmberError, Result};
use crate::filter::Filter;
use crate::game_object::GameObject;
use crate::reflection::{short_type_name, TypeRegistry};
use crate::system::System;

/// Frame protocol phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    PreUpdate,
    Update,
    PostUpdate,
    Collision,
    PostCollision,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::PreUpdate => "pre_update",
            Phase::Update => "update",
            Phase::PostUpdate => "post_update",
            Phase::Collision => "collision",
            Phase::PostCollision => "post_collision",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attached system with its filter, evaluated once at attach.
pub(crate) struct SystemSlot {
    name: &'static str,
    filter: Filter,
    dynamic: Rc<RefCell<dyn System>>,
    typed: Rc<dyn Any>,
}

impl SystemSlot {
    fn new<S: System>(system: S) -> Self {
        let name = system.name();
        let filter = system.filter();
        let typed = Rc::new(RefCell::new(system));
        let dynamic: Rc<RefCell<dyn System>> = typed.clone();
        Self {
            name,
            filter,
            dynamic,
            typed,
        }
    }
}

type SystemSnapshot = SmallVec<[Rc<SystemSlot>; 8]>;

#[derive(Default)]
struct SystemTable {
    slots: Vec<Rc<SystemSlot>>,
    by_type: AHashMap<TypeId, usize>,
}

impl SystemTable {
    fn get(&self, type_id: TypeId) -> Option<&Rc<SystemSlot>> {
        self.by_type.get(&type_id).and_then(|&i| self.slots.get(i))
    }
}

pub(crate) struct SceneInner {
    config: SceneConfig,

    /// Next id to hand out; ids are never reused
    next_object_id: Cell<u64>,

    started: Cell<bool>,

    /// Phase currently executing, `None` between phases
    phase: Cell<Option<Phase>>,

    /// Set while the removal queue is being drained
    flushing: Cell<bool>,

    frame: Cell<u64>,

    /// Authoritative object map; id order is insertion order
    objects: RefCell<BTreeMap<GameObjectId, GameObject>>,

    /// Objects removed from the map and awaiting teardown
    pending_removal: RefCell<Vec<GameObject>>,

    systems: RefCell<SystemTable>,

    /// Capability tables per behaviour type
    registry: RefCell<TypeRegistry>,

    diagnostics: RefCell<Diagnostics>,
}

impl SceneInner {
    pub(crate) fn capabilities_of<B: Behaviour>(&self) -> Rc<CapabilitySet> {
        self.registry.borrow_mut().capabilities_of::<B>()
    }
}

impl Drop for SceneInner {
    fn drop(&mut self) {
        let pending = std::mem::take(self.pending_removal.get_mut());
        let objects = std::mem::take(self.objects.get_mut());
        for object in pending.into_iter().chain(objects.into_values()) {
            object.teardown();
        }
        for slot in self.systems.get_mut().slots.drain(..) {
            if let Ok(mut system) = slot.dynamic.try_borrow_mut() {
                system.on_end();
            }
        }
        debug!(scene = %self.config.name, frames = self.frame.get(), "scene dropped");
    }
}

/// Handle to a scene. Clones share the same scene.
#[derive(Clone)]
pub struct Scene {
    inner: Rc<SceneInner>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene with the default configuration.
    pub fn new() -> Self {
        Self::from_valid_config(SceneConfig::default())
    }

    /// Create a scene after validating `config`.
    pub fn with_config(config: SceneConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: SceneConfig) -> Self {
        let diagnostics = Diagnostics::with_window(config.diagnostics_window);
        Self {
            inner: Rc::new(SceneInner {
                config,
                next_object_id: Cell::new(0),
                started: Cell::new(false),
                phase: Cell::new(None),
                flushing: Cell::new(false),
                frame: Cell::new(0),
                objects: RefCell::new(BTreeMap::new()),
                pending_removal: RefCell::new(Vec::new()),
                systems: RefCell::new(SystemTable::default()),
                registry: RefCell::new(TypeRegistry::new()),
                diagnostics: RefCell::new(diagnostics),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<SceneInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.inner.config
    }

    pub fn has_started(&self) -> bool {
        self.inner.started.get()
    }

    /// Phase currently executing
    pub fn current_phase(&self) -> Option<Phase> {
        self.inner.phase.get()
    }

    /// Number of completed update cycles
    pub fn frame_count(&self) -> u64 {
        self.inner.frame.get()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.inner.diagnostics.borrow().clone()
    }

    /// Check if two handles refer to the same scene
    pub fn ptr_eq(&self, other: &Scene) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- game objects ----

    /// Create an empty game object. Started immediately if the scene has
    /// started.
    pub fn add_game_object(&self) -> GameObject {
        let id = GameObjectId(self.inner.next_object_id.get());
        self.inner.next_object_id.set(id.0 + 1);

        let object = GameObject::new(id, Rc::downgrade(&self.inner));
        self.inner.objects.borrow_mut().insert(id, object.clone());
        trace!(scene = %self.inner.config.name, object = %id, "game object added");

        if self.has_started() {
            object.start();
        }
        object
    }

    pub fn has_game_object(&self, id: GameObjectId) -> bool {
        self.inner.objects.borrow().contains_key(&id)
    }

    pub fn get_game_object(&self, id: GameObjectId) -> Option<GameObject> {
        self.inner.objects.borrow().get(&id).cloned()
    }

    /// The game object with this id, or `GameObjectNotFound`.
    pub fn ref_game_object(&self, id: GameObjectId) -> Result<GameObject> {
        self.get_game_object(id)
            .ok_or(EmberError::GameObjectNotFound(id))
    }

    /// Remove a game object from the scene.
    ///
    /// Teardown (`on_end` on every behaviour) runs right away when called
    /// between frames, otherwise at the end of the current phase. Returns
    /// false if no such object is in the scene.
    pub fn remove_game_object(&self, id: GameObjectId) -> bool {
        let removed = self.inner.objects.borrow_mut().remove(&id);
        let Some(object) = removed else {
            return false;
        };
        debug!(scene = %self.inner.config.name, object = %id, "game object removed");
        self.inner.pending_removal.borrow_mut().push(object);

        if self.inner.phase.get().is_none() {
            self.flush_removals();
        }
        true
    }

    pub fn game_object_count(&self) -> usize {
        self.inner.objects.borrow().len()
    }

    pub fn game_object_ids(&self) -> Vec<GameObjectId> {
        self.inner.objects.borrow().keys().copied().collect()
    }

    /// Snapshot of all game objects in id order
    pub fn game_objects(&self) -> Vec<GameObject> {
        self.inner.objects.borrow().values().cloned().collect()
    }

    /// Cast `event` on every game object, in id order.
    pub fn broadcast_event<E: 'static>(&self, event: &E) {
        for object in self.game_objects() {
            object.cast_event(event);
        }
    }

    // ---- systems ----

    /// Attach `system` unless one of the same type is attached already, in
    /// which case `system` is dropped. Returns whether it was attached.
    pub fn attach_system<S: System>(&self, system: S) -> bool {
        self.attach_system_with(|| system)
    }

    /// Like [`attach_system`](Self::attach_system), but only constructs the
    /// system when none of type `S` is attached yet.
    ///
    /// Every existing game object is filtered into the new system right
    /// away; `on_start` follows if the scene has started.
    pub fn attach_system_with<S: System>(&self, make: impl FnOnce() -> S) -> bool {
        if self.has_system::<S>() {
            debug!(system = short_type_name::<S>(), "system already attached");
            return false;
        }

        let slot = Rc::new(SystemSlot::new(make()));
        {
            let mut systems = self.inner.systems.borrow_mut();
            if systems.by_type.contains_key(&TypeId::of::<S>()) {
                return false;
            }
            let position = systems.slots.len();
            systems.slots.push(slot.clone());
            systems.by_type.insert(TypeId::of::<S>(), position);
        }
        debug!(scene = %self.inner.config.name, system = slot.name, filter = ?slot.filter, "system attached");

        for object in self.game_objects() {
            self.filter_into(&slot, &object);
        }
        if self.has_started() {
            Self::run_on_system(&slot, Phase::Start, |system| system.on_start(self));
        }
        true
    }

    pub fn has_system<S: System>(&self) -> bool {
        self.inner
            .systems
            .borrow()
            .by_type
            .contains_key(&TypeId::of::<S>())
    }

    /// Weak reference to the attached `S`; expired when absent.
    pub fn get_system<S: System>(&self) -> Weak<RefCell<S>> {
        self.typed_system::<S>()
            .map(|rc| Rc::downgrade(&rc))
            .unwrap_or_default()
    }

    /// The attached `S`, or `SystemNotFound`.
    pub fn ref_system<S: System>(&self) -> Result<Rc<RefCell<S>>> {
        self.typed_system::<S>()
            .ok_or(EmberError::SystemNotFound(short_type_name::<S>()))
    }

    pub fn system_count(&self) -> usize {
        self.inner.systems.borrow().slots.len()
    }

    /// System names in attach order
    pub fn system_names(&self) -> Vec<&'static str> {
        self.system_snapshot().iter().map(|slot| slot.name).collect()
    }

    pub(crate) fn system_infos(&self) -> Vec<SystemInfo> {
        self.system_snapshot()
            .iter()
            .map(|slot| SystemInfo {
                name: slot.name,
                managed_count: slot.dynamic.try_borrow().ok().map(|s| s.view().len()),
            })
            .collect()
    }

    fn typed_system<S: System>(&self) -> Option<Rc<RefCell<S>>> {
        self.inner
            .systems
            .borrow()
            .get(TypeId::of::<S>())
            .and_then(|slot| slot.typed.clone().downcast::<RefCell<S>>().ok())
    }

    fn system_snapshot(&self) -> SystemSnapshot {
        self.inner.systems.borrow().slots.iter().cloned().collect()
    }

    fn run_on_system(slot: &SystemSlot, phase: Phase, f: impl FnOnce(&mut dyn System)) {
        match slot.dynamic.try_borrow_mut() {
            Ok(mut system) => f(&mut *system),
            Err(_) => warn!(
                system = slot.name,
                %phase,
                "system is already running, skipping re-entrant call"
            ),
        }
    }

    /// Sync one object's membership in one system's view.
    fn filter_into(&self, slot: &SystemSlot, object: &GameObject) {
        let matches = object.is_alive() && slot.filter.matches(object);
        let phase = self.current_phase().unwrap_or(Phase::PreUpdate);
        Self::run_on_system(slot, phase, |system| {
            let managed = system.view().contains(object.id());
            match (matches, managed) {
                (true, false) => {
                    trace!(system = slot.name, object = %object.id(), "object entered view");
                    system.on_game_object_added(self, object);
                }
                (false, true) => {
                    trace!(system = slot.name, object = %object.id(), "object left view");
                    system.on_game_object_removed(self, object);
                }
                (true, true) => system.on_game_object_changed(self, object),
                (false, false) => {}
            }
        });
    }

    /// Re-filter every object whose behaviour set changed since it was last
    /// filtered, then clear its flag.
    fn refilter_changed_objects(&self) {
        let changed: Vec<GameObject> = self
            .inner
            .objects
            .borrow()
            .values()
            .filter(|object| object.take_components_changed())
            .cloned()
            .collect();
        if changed.is_empty() {
            return;
        }

        let systems = self.system_snapshot();
        for object in &changed {
            for slot in &systems {
                self.filter_into(slot, object);
            }
        }
    }

    // ---- frame protocol ----

    /// Run one frame. The first call also runs the start phase.
    ///
    /// `delta_seconds` is clamped by [`SceneConfig::max_delta_seconds`].
    /// Calls made from inside a running frame are ignored.
    pub fn run_update_cycle(&self, delta_seconds: f64) {
        if let Some(phase) = self.current_phase() {
            warn!(%phase, "run_update_cycle called from inside a frame, ignored");
            return;
        }
        let delta_seconds = self.inner.config.clamp_delta(delta_seconds);
        let frame_start = Instant::now();

        #[cfg(feature = "profiling")]
        let span = info_span!("frame", scene = %self.inner.config.name, frame = self.frame_count());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        if !self.has_started() {
            self.inner.started.set(true);
            self.run_phase(Phase::Start, |object| object.start(), |system| {
                system.on_start(self)
            });
        }

        self.run_phase(Phase::PreUpdate, GameObject::pre_update, |system| {
            system.on_pre_update(self)
        });
        self.run_phase(
            Phase::Update,
            |object| object.update(delta_seconds),
            |system| system.on_update(self, delta_seconds),
        );
        self.run_phase(Phase::PostUpdate, GameObject::post_update, |system| {
            system.on_post_update(self)
        });
        self.run_phase(Phase::Collision, |_| {}, |system| system.on_collision(self));
        self.run_phase(Phase::PostCollision, GameObject::post_collision, |system| {
            system.on_post_collision(self)
        });

        self.inner.frame.set(self.inner.frame.get() + 1);
        let elapsed_ms = frame_start.elapsed().as_secs_f32() * 1000.0;
        self.inner
            .diagnostics
            .borrow_mut()
            .record_frame_time(elapsed_ms);
    }

    fn run_phase(
        &self,
        phase: Phase,
        on_object: impl Fn(&GameObject),
        mut on_system: impl FnMut(&mut dyn System),
    ) {
        #[cfg(feature = "profiling")]
        let span = info_span!("phase", phase = phase.as_str());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        self.inner.phase.set(Some(phase));
        let objects = self.game_objects();
        let systems = self.system_snapshot();

        for object in &objects {
            on_object(object);
        }
        if phase == Phase::PreUpdate {
            self.refilter_changed_objects();
        }
        for slot in &systems {
            Self::run_on_system(slot, phase, |system| on_system(system));
        }

        self.inner.phase.set(None);
        self.flush_removals();
    }

    /// Tear down every queued object. Teardown may queue more removals;
    /// those are drained in the same call.
    fn flush_removals(&self) {
        if self.inner.flushing.replace(true) {
            return;
        }
        loop {
            let pending = std::mem::take(&mut *self.inner.pending_removal.borrow_mut());
            if pending.is_empty() {
                break;
            }
            for object in pending {
                object.teardown();
            }
        }
        self.inner.flushing.set(false);
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.inner.config.name)
            .field("started", &self.has_started())
            .field("frame", &self.frame_count())
            .field("game_objects", &self.game_object_count())
            .field("systems", &self.system_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::ManagedView;

    #[derive(Default)]
    struct Log(Rc<RefCell<Vec<String>>>);

    struct Tracer {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Behaviour for Tracer {
        fn on_start(&mut self, _owner: &GameObject) {
            self.log.borrow_mut().push(format!("{}:start", self.label));
        }
        fn on_update(&mut self, _owner: &GameObject, _delta_seconds: f64) {
            self.log.borrow_mut().push(format!("{}:update", self.label));
        }
        fn on_end(&mut self, _owner: &GameObject) {
            self.log.borrow_mut().push(format!("{}:end", self.label));
        }
    }

    struct Watcher {
        view: ManagedView,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl System for Watcher {
        fn filter(&self) -> Filter {
            Filter::new().requires::<Tracer>()
        }
        fn view(&self) -> &ManagedView {
            &self.view
        }
        fn view_mut(&mut self) -> &mut ManagedView {
            &mut self.view
        }
        fn on_start(&mut self, _scene: &Scene) {
            self.log.borrow_mut().push("watcher:start".into());
        }
        fn on_update_object(&mut self, _scene: &Scene, _delta_seconds: f64, object: &GameObject) {
            self.log.borrow_mut().push(format!("watcher:update:{}", object.id()));
        }
        fn on_end(&mut self) {
            self.log.borrow_mut().push("watcher:end".into());
        }
    }

    fn tracer(label: &'static str, log: &Log) -> Tracer {
        Tracer {
            label,
            log: log.0.clone(),
        }
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let scene = Scene::new();
        let a = scene.add_game_object().id();
        let b = scene.add_game_object().id();
        assert!(scene.remove_game_object(b));
        let c = scene.add_game_object().id();
        assert!(a < b && b < c);
        assert!(!scene.has_game_object(b));
        assert!(scene.ref_game_object(b).unwrap_err().is_not_found());
    }

    #[test]
    fn test_start_runs_objects_then_systems_once() {
        let log = Log::default();
        let scene = Scene::new();
        scene.add_game_object().add_component(tracer("a", &log));
        scene.add_game_object().add_component(tracer("b", &log));
        scene.attach_system(Watcher {
            view: ManagedView::new(),
            log: log.0.clone(),
        });

        scene.run_update_cycle(0.016);
        scene.run_update_cycle(0.016);

        let entries = log.0.borrow();
        assert_eq!(
            entries[..3],
            ["a:start".to_string(), "b:start".into(), "watcher:start".into()]
        );
        assert_eq!(entries.iter().filter(|e| e.ends_with(":start")).count(), 3);
        assert_eq!(scene.frame_count(), 2);
    }

    #[test]
    fn test_late_additions_start_immediately() {
        let log = Log::default();
        let scene = Scene::new();
        scene.run_update_cycle(0.0);

        let object = scene.add_game_object();
        assert!(object.has_started());
        object.add_component(tracer("late", &log));
        assert_eq!(*log.0.borrow(), vec!["late:start".to_string()]);

        assert!(scene.attach_system(Watcher {
            view: ManagedView::new(),
            log: log.0.clone(),
        }));
        assert_eq!(log.0.borrow().last().unwrap(), "watcher:start");
        assert!(scene.ref_system::<Watcher>().unwrap().borrow().view().contains(object.id()));
    }

    #[test]
    fn test_duplicate_system_is_ignored() {
        let log = Log::default();
        let scene = Scene::new();
        let make = || Watcher {
            view: ManagedView::new(),
            log: log.0.clone(),
        };
        assert!(scene.attach_system(make()));
        assert!(!scene.attach_system(make()));
        let mut built = false;
        scene.attach_system_with(|| {
            built = true;
            make()
        });
        assert!(!built);
        assert_eq!(scene.system_count(), 1);
    }

    #[test]
    fn test_missing_system_is_not_found() {
        let scene = Scene::new();
        assert!(!scene.has_system::<Watcher>());
        assert!(scene.get_system::<Watcher>().upgrade().is_none());
        assert_eq!(
            scene.ref_system::<Watcher>().err().unwrap(),
            EmberError::SystemNotFound("Watcher")
        );
    }

    #[test]
    fn test_remove_between_frames_tears_down_immediately() {
        let log = Log::default();
        let scene = Scene::new();
        let object = scene.add_game_object();
        object.add_component(tracer("gone", &log));

        assert!(object.destroy());
        assert!(!object.is_alive());
        assert_eq!(*log.0.borrow(), vec!["gone:end".to_string()]);
        assert!(!object.destroy());
    }

    #[test]
    fn test_drop_ends_objects_and_systems() {
        let log = Log::default();
        {
            let scene = Scene::new();
            scene.add_game_object().add_component(tracer("a", &log));
            scene.attach_system(Watcher {
                view: ManagedView::new(),
                log: log.0.clone(),
            });
        }
        assert_eq!(*log.0.borrow(), vec!["a:end".to_string(), "watcher:end".into()]);
    }

    #[test]
    fn test_delta_is_clamped() {
        struct Accumulate(Rc<Cell<f64>>);
        impl Behaviour for Accumulate {
            fn on_update(&mut self, _owner: &GameObject, delta_seconds: f64) {
                self.0.set(self.0.get() + delta_seconds);
            }
        }

        let total = Rc::new(Cell::new(0.0));
        let scene = Scene::with_config(SceneConfig::default().with_max_delta_seconds(0.5)).unwrap();
        scene.add_game_object().add_component(Accumulate(total.clone()));
        scene.run_update_cycle(2.0);
        scene.run_update_cycle(0.25);
        assert_eq!(total.get(), 0.75);
        assert_eq!(scene.diagnostics().sample_count(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SceneConfig {
            diagnostics_window: 0,
            ..SceneConfig::default()
        };
        assert!(matches!(
            Scene::with_config(config),
            Err(EmberError::InvalidConfig(_))
        ));
    }
}
