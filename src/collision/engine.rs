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

//! Collision engine system
//!
//! Tracks every collider of the objects it manages, split into static and
//! movable lists. Once per frame, in the collision phase, each movable
//! collider is narrow-phase tested against its shortlist and every colliding
//! pair is reported exactly once to each side.

use ahash::AHashSet;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, trace, warn};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::collision::collider::{Collider, ColliderHandle, WeakCollider};
use crate::collision::partition::SpatialPartition;
use crate::entity::{BehaviourId, GameObjectId};
use crate::error::{EmberError, Result};
use crate::filter::Filter;
use crate::game_object::{GameObject, WeakGameObject};
use crate::reflection::short_type_name;
use crate::scene::Scene;
use crate::system::{ManagedView, System};

/// Counters from the most recent collision pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollisionStats {
    /// Narrow-phase tests performed
    pub narrow_phase_tests: usize,
    /// Distinct colliding pairs
    pub collisions: usize,
    /// Expired colliders dropped at the start of the pass
    pub pruned: usize,
}

/// Broad and narrow phase collision detection over every collider in the
/// scene.
#[derive(Default)]
pub struct CollisionEngine {
    view: ManagedView,
    static_colliders: Vec<WeakCollider>,
    movable_colliders: Vec<WeakCollider>,
    registered: AHashSet<BehaviourId>,
    /// Objects with a collider that was borrowed when registration was
    /// attempted. Retried at the start of each pass.
    pending: Vec<WeakGameObject>,
    partition: Option<Box<dyn SpatialPartition>>,
    stats: CollisionStats,
}

impl CollisionEngine {
    /// Engine with no spatial partition (exhaustive broad phase)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spatial_partition<P: SpatialPartition>(mut self, partition: P) -> Self {
        self.set_spatial_partition(partition);
        self
    }

    /// Replace the current partition, dropping the old one. Every registered
    /// collider is fed into the new partition.
    pub fn set_spatial_partition<P: SpatialPartition>(&mut self, partition: P) {
        let mut partition: Box<dyn SpatialPartition> = Box::new(partition);
        for collider in self.live_colliders() {
            partition.partition(&collider);
        }
        debug!(
            partition = short_type_name::<P>(),
            colliders = partition.len(),
            "spatial partition attached"
        );
        self.partition = Some(partition);
    }

    /// Detach the partition; the engine falls back to exhaustive testing.
    pub fn take_spatial_partition(&mut self) -> Option<Box<dyn SpatialPartition>> {
        self.partition.take()
    }

    pub fn has_spatial_partition(&self) -> bool {
        self.partition.is_some()
    }

    pub fn has_spatial_partition_of_type<P: SpatialPartition>(&self) -> bool {
        self.partition
            .as_deref()
            .is_some_and(|partition| partition.as_any().is::<P>())
    }

    /// The attached partition as a `P`, or `SpatialPartitionNotFound`.
    pub fn ref_spatial_partition<P: SpatialPartition>(&self) -> Result<&P> {
        self.partition
            .as_deref()
            .and_then(|partition| partition.as_any().downcast_ref::<P>())
            .ok_or(EmberError::SpatialPartitionNotFound(short_type_name::<P>()))
    }

    pub fn ref_spatial_partition_mut<P: SpatialPartition>(&mut self) -> Result<&mut P> {
        self.partition
            .as_deref_mut()
            .and_then(|partition| partition.as_any_mut().downcast_mut::<P>())
            .ok_or(EmberError::SpatialPartitionNotFound(short_type_name::<P>()))
    }

    pub fn static_collider_count(&self) -> usize {
        self.static_colliders.len()
    }

    pub fn movable_collider_count(&self) -> usize {
        self.movable_colliders.len()
    }

    pub fn is_registered(&self, collider: BehaviourId) -> bool {
        self.registered.contains(&collider)
    }

    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    fn live_colliders(&self) -> Vec<ColliderHandle> {
        self.static_colliders
            .iter()
            .chain(self.movable_colliders.iter())
            .filter_map(WeakCollider::upgrade)
            .collect()
    }

    /// Objects still waiting on a busy collider
    pub fn pending_registration_count(&self) -> usize {
        self.pending.len()
    }

    fn register_colliders_of(&mut self, object: &GameObject) {
        let mut busy = false;
        for slot in object.slots().iter() {
            match ColliderHandle::from_slot(object, slot) {
                Ok(Some(collider)) => self.register(object, collider),
                Ok(None) => {}
                Err(_) => busy = true,
            }
        }
        if busy && !self.pending.iter().any(|entry| entry.id() == object.id()) {
            debug!(object = %object.id(), "collider busy, registration deferred");
            self.pending.push(object.downgrade());
        }
    }

    fn retry_pending(&mut self) {
        for entry in std::mem::take(&mut self.pending) {
            if let Some(object) = entry.upgrade() {
                self.register_colliders_of(&object);
            }
        }
    }

    fn register(&mut self, object: &GameObject, collider: ColliderHandle) {
        let id = collider.id();
        if !self.registered.insert(id) {
            return;
        }
        let weak = collider.downgrade();
        if collider.is_static() {
            self.static_colliders.push(weak.clone());
        } else {
            self.movable_colliders.push(weak.clone());
        }
        if let Some(partition) = self.partition.as_mut() {
            partition.partition(&collider);
        }

        object.add_detach_hook(id, Box::new(move |owner: &GameObject| {
            unregister_on_detach(owner, &weak)
        }));
        trace!(
            collider = %id,
            type_name = collider.type_name(),
            is_static = collider.is_static(),
            "collider registered"
        );
    }

    fn unregister(&mut self, collider: &WeakCollider) {
        let id = collider.id();
        if !self.registered.remove(&id) {
            return;
        }
        self.static_colliders.retain(|entry| entry.id() != id);
        self.movable_colliders.retain(|entry| entry.id() != id);
        if let Some(partition) = self.partition.as_mut() {
            partition.remove(collider);
        }
        trace!(collider = %id, "collider unregistered");
    }

    fn unregister_owner(&mut self, object: GameObjectId) {
        let owned: Vec<WeakCollider> = self
            .static_colliders
            .iter()
            .chain(self.movable_colliders.iter())
            .filter(|entry| entry.id().object == object)
            .cloned()
            .collect();
        for collider in &owned {
            self.unregister(collider);
        }
    }

    /// Drop colliders whose owner has been torn down. Returns how many.
    fn prune_expired(&mut self) -> usize {
        let expired: Vec<WeakCollider> = self
            .static_colliders
            .iter()
            .chain(self.movable_colliders.iter())
            .filter(|entry| entry.is_expired())
            .cloned()
            .collect();
        for collider in &expired {
            self.unregister(collider);
        }
        expired.len()
    }

    fn shortlist_for(&self, collider: &ColliderHandle) -> Vec<WeakCollider> {
        match self.partition.as_deref() {
            Some(partition) => partition.shortlist_for(collider),
            None => {
                let id = collider.id();
                self.static_colliders
                    .iter()
                    .chain(self.movable_colliders.iter())
                    .filter(|entry| entry.id() != id)
                    .cloned()
                    .collect()
            }
        }
    }

    /// Test every movable collider against its shortlist and dispatch
    /// `Collision` events for each new colliding pair.
    pub fn run_collision_pass(&mut self) {
        #[cfg(feature = "profiling")]
        let span = info_span!("collision_pass");
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        self.retry_pending();
        let mut stats = CollisionStats {
            pruned: self.prune_expired(),
            ..CollisionStats::default()
        };

        let movers: Vec<ColliderHandle> = self
            .movable_colliders
            .iter()
            .filter_map(WeakCollider::upgrade)
            .collect();
        if let Some(partition) = self.partition.as_mut() {
            for mover in &movers {
                partition.update(mover);
            }
        }

        let mut pairs: FxHashSet<(BehaviourId, BehaviourId)> = FxHashSet::default();
        for mover in &movers {
            for candidate in self.shortlist_for(mover) {
                if candidate.id() == mover.id() {
                    continue;
                }
                let pair = BehaviourId::canonical_pair(mover.id(), candidate.id());
                if pairs.contains(&pair) {
                    continue;
                }
                let Some(other) = candidate.upgrade() else {
                    continue;
                };

                stats.narrow_phase_tests += 1;
                let colliding = match mover.try_borrow() {
                    Ok(collider) => collider.collides_with(&other),
                    Err(_) => {
                        warn!(collider = %mover.id(), "collider is busy, skipping narrow phase");
                        false
                    }
                };
                if !colliding {
                    continue;
                }

                pairs.insert(pair);
                stats.collisions += 1;
                trace!(a = %mover.id(), b = %other.id(), "collision");
                mover.notify_collision_with(&other);
                other.notify_collision_with(mover);
            }
        }

        self.stats = stats;
    }
}

fn unregister_on_detach(owner: &GameObject, collider: &WeakCollider) {
    let Some(scene) = owner.scene() else {
        return;
    };
    let Some(engine) = scene.get_system::<CollisionEngine>().upgrade() else {
        return;
    };
    match engine.try_borrow_mut() {
        Ok(mut engine) => engine.unregister(collider),
        // Pruned as expired on the next pass
        Err(_) => trace!(collider = %collider.id(), "collision engine busy, deferring unregister"),
    };
}

impl System for CollisionEngine {
    fn filter(&self) -> Filter {
        Filter::new().requires_polymorphic::<dyn Collider>()
    }

    fn view(&self) -> &ManagedView {
        &self.view
    }

    fn view_mut(&mut self) -> &mut ManagedView {
        &mut self.view
    }

    fn on_pre_update(&mut self, _scene: &Scene) {}

    fn on_update(&mut self, _scene: &Scene, _delta_seconds: f64) {}

    fn on_post_update(&mut self, _scene: &Scene) {}

    fn on_collision(&mut self, _scene: &Scene) {
        self.run_collision_pass();
    }

    fn on_end(&mut self) {
        self.static_colliders.clear();
        self.movable_colliders.clear();
        self.registered.clear();
        self.pending.clear();
        self.partition = None;
    }

    fn on_game_object_added(&mut self, _scene: &Scene, object: &GameObject) {
        self.view.insert(object);
        self.register_colliders_of(object);
    }

    fn on_game_object_removed(&mut self, _scene: &Scene, object: &GameObject) {
        self.view.remove(object.id());
        self.pending.retain(|entry| entry.id() != object.id());
        self.unregister_owner(object.id());
    }

    fn on_game_object_changed(&mut self, _scene: &Scene, object: &GameObject) {
        self.register_colliders_of(object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::Behaviour;
    use crate::capability::Capabilities;
    use crate::collision::collider::Collision;
    use crate::collision::grid::UniformGrid;
    use crate::collision::shapes::CircleCollider;
    use crate::event::ListensTo;
    use glam::Vec2;

    #[derive(Default)]
    struct Hits {
        others: Vec<BehaviourId>,
    }

    impl Behaviour for Hits {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.listens_to::<Collision<CircleCollider>>();
        }
    }

    impl ListensTo<Collision<CircleCollider>> for Hits {
        fn handle(&mut self, _owner: &GameObject, event: &Collision<CircleCollider>) {
            self.others.push(event.other_id());
        }
    }

    fn ball(scene: &Scene, x: f32, is_static: bool) -> GameObject {
        let object = scene.add_game_object();
        let collider = if is_static {
            CircleCollider::new_static(Vec2::new(x, 0.0), 1.0)
        } else {
            CircleCollider::new(Vec2::new(x, 0.0), 1.0)
        };
        object.add_component(collider).add_component(Hits::default());
        object
    }

    fn hits(object: &GameObject) -> Vec<BehaviourId> {
        object.ref_component::<Hits>().unwrap().borrow().others.clone()
    }

    #[test]
    fn test_colliders_are_split_by_kind() {
        let scene = Scene::new();
        ball(&scene, 0.0, false);
        ball(&scene, 10.0, true);
        scene.attach_system(CollisionEngine::new());

        let engine = scene.ref_system::<CollisionEngine>().unwrap();
        assert_eq!(engine.borrow().movable_collider_count(), 1);
        assert_eq!(engine.borrow().static_collider_count(), 1);
        assert_eq!(engine.borrow().view().len(), 2);
    }

    #[test]
    fn test_static_pairs_are_never_tested() {
        let scene = Scene::new();
        let a = ball(&scene, 0.0, true);
        let b = ball(&scene, 0.5, true);
        scene.attach_system(CollisionEngine::new());
        scene.run_update_cycle(0.016);

        assert!(hits(&a).is_empty());
        assert!(hits(&b).is_empty());
        let stats = scene.ref_system::<CollisionEngine>().unwrap().borrow().stats();
        assert_eq!(stats.narrow_phase_tests, 0);
    }

    #[test]
    fn test_movable_pair_dispatches_once_per_side() {
        let scene = Scene::new();
        let a = ball(&scene, 0.0, false);
        let b = ball(&scene, 1.0, false);
        scene.attach_system(CollisionEngine::new());
        scene.run_update_cycle(0.016);

        let a_id = a.behaviour_id::<CircleCollider>().unwrap();
        let b_id = b.behaviour_id::<CircleCollider>().unwrap();
        assert_eq!(hits(&a), vec![b_id]);
        assert_eq!(hits(&b), vec![a_id]);
        let stats = scene.ref_system::<CollisionEngine>().unwrap().borrow().stats();
        assert_eq!(stats.collisions, 1);
    }

    #[test]
    fn test_destroyed_collider_is_unregistered() {
        let scene = Scene::new();
        let a = ball(&scene, 0.0, false);
        let b = ball(&scene, 1.0, false);
        scene.attach_system(CollisionEngine::new());
        let b_id = b.behaviour_id::<CircleCollider>().unwrap();

        assert!(b.destroy());
        let engine = scene.ref_system::<CollisionEngine>().unwrap();
        assert!(!engine.borrow().is_registered(b_id));
        assert_eq!(engine.borrow().movable_collider_count(), 1);

        scene.run_update_cycle(0.016);
        assert!(hits(&a).is_empty());
    }

    #[test]
    fn test_collider_added_later_is_registered() {
        let scene = Scene::new();
        scene.attach_system(CollisionEngine::new());
        let a = ball(&scene, 0.0, false);
        scene.run_update_cycle(0.016);

        a.add_component(crate::collision::shapes::BoxCollider::new(
            crate::collision::shapes::Aabb::new(Vec2::splat(5.0), Vec2::splat(6.0)),
        ));
        scene.run_update_cycle(0.016);

        let engine = scene.ref_system::<CollisionEngine>().unwrap();
        assert_eq!(engine.borrow().movable_collider_count(), 2);
    }

    /// Box collider that attaches the engine from its own update.
    struct Beacon {
        bounds: crate::collision::shapes::Aabb,
    }

    impl Behaviour for Beacon {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.collider();
        }

        fn on_update(&mut self, owner: &GameObject, _delta_seconds: f64) {
            if let Some(scene) = owner.scene() {
                scene.attach_system(CollisionEngine::new());
            }
        }
    }

    impl Collider for Beacon {
        fn is_static(&self) -> bool {
            false
        }

        fn collides_with(&self, other: &ColliderHandle) -> bool {
            other
                .bounds()
                .is_some_and(|bounds| bounds.intersects(&self.bounds))
        }

        fn bounds(&self) -> Option<crate::collision::shapes::Aabb> {
            Some(self.bounds)
        }
    }

    #[test]
    fn test_busy_collider_is_registered_on_next_pass() {
        let scene = Scene::new();
        let a = ball(&scene, 0.0, false);
        let beacon = scene.add_game_object();
        beacon.add_component(Beacon {
            bounds: crate::collision::shapes::Aabb::new(Vec2::splat(-0.5), Vec2::splat(0.5)),
        });
        let beacon_id = beacon.behaviour_id::<Beacon>().unwrap();

        scene.run_update_cycle(0.016);
        scene.run_update_cycle(0.016);

        let engine = scene.ref_system::<CollisionEngine>().unwrap();
        assert_eq!(engine.borrow().view().len(), 2);
        assert_eq!(engine.borrow().movable_collider_count(), 2);
        assert_eq!(engine.borrow().pending_registration_count(), 0);
        assert!(engine.borrow().is_registered(beacon_id));
        assert!(hits(&a).contains(&beacon_id));
    }

    #[test]
    fn test_partition_replacement_refeeds_colliders() {
        let scene = Scene::new();
        ball(&scene, 0.0, false);
        ball(&scene, 30.0, true);
        scene.attach_system(CollisionEngine::new());

        let engine = scene.ref_system::<CollisionEngine>().unwrap();
        let mut engine = engine.borrow_mut();
        assert!(!engine.has_spatial_partition());
        assert_eq!(
            engine.ref_spatial_partition::<UniformGrid>().err(),
            Some(EmberError::SpatialPartitionNotFound("UniformGrid"))
        );

        engine.set_spatial_partition(UniformGrid::new(4.0));
        assert!(engine.has_spatial_partition_of_type::<UniformGrid>());
        assert_eq!(engine.ref_spatial_partition::<UniformGrid>().unwrap().len(), 2);

        engine.set_spatial_partition(UniformGrid::new(8.0));
        let grid = engine.ref_spatial_partition_mut::<UniformGrid>().unwrap();
        assert_eq!(grid.cell_size(), 8.0);
        assert_eq!(grid.len(), 2);

        assert!(engine.take_spatial_partition().is_some());
        assert!(!engine.has_spatial_partition());
    }
}
