//! System trait and managed views

use std::collections::BTreeMap;

use crate::entity::GameObjectId;
use crate::filter::Filter;
use crate::game_object::{GameObject, WeakGameObject};
use crate::scene::Scene;

/// Non-owning set of the game objects a system currently matches, keyed by
/// id so iteration follows insertion order.
#[derive(Debug, Default)]
pub struct ManagedView {
    objects: BTreeMap<GameObjectId, WeakGameObject>,
}

impl ManagedView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the object was already present
    pub fn insert(&mut self, object: &GameObject) -> bool {
        self.objects
            .insert(object.id(), object.downgrade())
            .is_none()
    }

    pub fn remove(&mut self, id: GameObjectId) -> bool {
        self.objects.remove(&id).is_some()
    }

    pub fn contains(&self, id: GameObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Entry count, including entries not yet pruned
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = GameObjectId> + '_ {
        self.objects.keys().copied()
    }

    /// Snapshot of live objects in id order. Expired entries are pruned.
    pub fn live_objects(&mut self) -> Vec<GameObject> {
        let mut live = Vec::with_capacity(self.objects.len());
        self.objects.retain(|_, weak| match weak.upgrade() {
            Some(object) => {
                live.push(object);
                true
            }
            None => false,
        });
        live
    }
}

/// Processing unit over a filtered view of the scene's game objects.
///
/// Implementors provide the filter and storage for their [`ManagedView`];
/// the scene keeps the view in sync. Every phase hook has a default: the
/// whole-view hooks iterate the view and call the per-object hooks, which do
/// nothing. Override a whole-view hook to batch-process instead.
pub trait System: 'static {
    /// Evaluated once when the system is attached
    fn filter(&self) -> Filter;

    fn view(&self) -> &ManagedView;

    fn view_mut(&mut self) -> &mut ManagedView;

    /// System name for logs
    fn name(&self) -> &'static str {
        crate::reflection::short_type_name::<Self>()
    }

    fn on_start(&mut self, _scene: &Scene) {}

    /// Scene is being dropped
    fn on_end(&mut self) {}

    fn on_pre_update_object(&mut self, _scene: &Scene, _object: &GameObject) {}

    fn on_update_object(&mut self, _scene: &Scene, _delta_seconds: f64, _object: &GameObject) {}

    fn on_post_update_object(&mut self, _scene: &Scene, _object: &GameObject) {}

    fn on_pre_update(&mut self, scene: &Scene) {
        for object in self.view_mut().live_objects() {
            self.on_pre_update_object(scene, &object);
        }
    }

    fn on_update(&mut self, scene: &Scene, delta_seconds: f64) {
        for object in self.view_mut().live_objects() {
            self.on_update_object(scene, delta_seconds, &object);
        }
    }

    fn on_post_update(&mut self, scene: &Scene) {
        for object in self.view_mut().live_objects() {
            self.on_post_update_object(scene, &object);
        }
    }

    fn on_collision(&mut self, _scene: &Scene) {}

    fn on_post_collision(&mut self, _scene: &Scene) {}

    /// Object started matching the filter
    fn on_game_object_added(&mut self, _scene: &Scene, object: &GameObject) {
        self.view_mut().insert(object);
    }

    /// Object stopped matching the filter
    fn on_game_object_removed(&mut self, _scene: &Scene, object: &GameObject) {
        self.view_mut().remove(object.id());
    }

    /// Object gained behaviours and still matches
    fn on_game_object_changed(&mut self, _scene: &Scene, _object: &GameObject) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::Behaviour;

    struct Marker;
    impl Behaviour for Marker {}

    #[derive(Default)]
    struct Counting {
        view: ManagedView,
        visited: Vec<GameObjectId>,
    }

    impl System for Counting {
        fn filter(&self) -> Filter {
            Filter::new().requires::<Marker>()
        }
        fn view(&self) -> &ManagedView {
            &self.view
        }
        fn view_mut(&mut self) -> &mut ManagedView {
            &mut self.view
        }
        fn on_update_object(&mut self, _scene: &Scene, _delta_seconds: f64, object: &GameObject) {
            self.visited.push(object.id());
        }
    }

    #[test]
    fn test_view_prunes_expired_entries() {
        let scene = Scene::new();
        let a = scene.add_game_object();
        let b = scene.add_game_object();
        let mut view = ManagedView::new();
        assert!(view.insert(&a));
        assert!(!view.insert(&a));
        view.insert(&b);

        b.teardown();
        let live = view.live_objects();
        assert_eq!(live, vec![a.clone()]);
        assert_eq!(view.len(), 1);
        assert!(!view.contains(b.id()));
    }

    #[test]
    fn test_default_update_iterates_view_in_id_order() {
        let scene = Scene::new();
        let a = scene.add_game_object();
        let b = scene.add_game_object();
        let mut system = Counting::default();
        system.on_game_object_added(&scene, &b);
        system.on_game_object_added(&scene, &a);

        system.on_update(&scene, 0.016);
        assert_eq!(system.visited, vec![a.id(), b.id()]);

        system.on_game_object_removed(&scene, &a);
        assert_eq!(system.view().ids().collect::<Vec<_>>(), vec![b.id()]);
        assert_eq!(system.name(), "Counting");
    }
}
