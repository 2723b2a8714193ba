//! Typed events delivered synchronously to listening behaviours.
//!
//! Any `'static` value can be an event. A behaviour receives events of type
//! `E` when it implements [`ListensTo<E>`] and registers it with
//! [`Capabilities::listens_to`](crate::capability::Capabilities::listens_to).
//! Delivery happens through [`GameObject::cast_event`] (one object) or
//! [`Scene::broadcast_event`](crate::scene::Scene::broadcast_event) (every
//! object), in behaviour attach order.

use crate::game_object::GameObject;

/// Listener capability for events of type `E`
pub trait ListensTo<E>: 'static {
    /// Handle one event cast on `owner`
    fn handle(&mut self, owner: &GameObject, event: &E);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::Behaviour;
    use crate::capability::Capabilities;
    use crate::scene::Scene;

    struct Hit(u32);
    struct Heal(u32);

    #[derive(Default)]
    struct Health {
        value: i64,
    }

    impl ListensTo<Hit> for Health {
        fn handle(&mut self, _owner: &GameObject, event: &Hit) {
            self.value -= event.0 as i64;
        }
    }

    impl ListensTo<Heal> for Health {
        fn handle(&mut self, _owner: &GameObject, event: &Heal) {
            self.value += event.0 as i64;
        }
    }

    impl Behaviour for Health {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.listens_to::<Hit>().listens_to::<Heal>();
        }
    }

    #[derive(Default)]
    struct Deaf;
    impl Behaviour for Deaf {}

    #[test]
    fn test_cast_event_reaches_registered_listeners() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        object
            .add_component(Health { value: 10 })
            .add_component(Deaf);

        object.cast_event(&Hit(4));
        object.cast_event(&Heal(1));
        object.cast_event(&"unrelated");

        let health = object.ref_component::<Health>().unwrap();
        assert_eq!(health.borrow().value, 7);
    }

    #[test]
    fn test_unregistered_impl_is_not_a_listener() {
        struct Silent {
            hits: u32,
        }
        impl ListensTo<Hit> for Silent {
            fn handle(&mut self, _owner: &GameObject, _event: &Hit) {
                self.hits += 1;
            }
        }
        impl Behaviour for Silent {}

        let scene = Scene::new();
        let object = scene.add_game_object();
        object.add_component(Silent { hits: 0 });
        object.cast_event(&Hit(1));
        assert_eq!(object.ref_component::<Silent>().unwrap().borrow().hits, 0);
    }
}
