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

//! System filters
//!
//! A [`Filter`] is a pure predicate over a game object's behaviour set,
//! built as an AND of clauses evaluated in declaration order:
//!
//! ```ignore
//! let filter = Filter::new()
//!     .requires_polymorphic::<dyn Steerable>()
//!     .excludes::<Frozen>();
//! ```
//!
//! Exact clauses match the concrete behaviour type. Polymorphic clauses match
//! any behaviour carrying the capability (a behaviour always carries its own
//! type as a capability).

use std::any::TypeId;
use std::fmt;

use smallvec::SmallVec;

use crate::game_object::GameObject;
use crate::reflection::short_type_name;

#[derive(Clone, Copy)]
struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name::<T>(),
        }
    }
}

#[derive(Clone)]
enum Clause {
    RequiresExact(TypeKey),
    RequiresPolymorphic(TypeKey),
    ExcludesExact(TypeKey),
    ExcludesPolymorphic(TypeKey),
    AllOf(Vec<Filter>),
    Predicate(fn(&GameObject) -> bool),
}

impl Clause {
    fn matches(&self, object: &GameObject) -> bool {
        match self {
            Clause::RequiresExact(key) => object.has_component_type(key.id),
            Clause::RequiresPolymorphic(key) => object.has_capability(key.id),
            Clause::ExcludesExact(key) => !object.has_component_type(key.id),
            Clause::ExcludesPolymorphic(key) => !object.has_capability(key.id),
            Clause::AllOf(filters) => filters.iter().all(|f| f.matches(object)),
            Clause::Predicate(predicate) => predicate(object),
        }
    }
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::RequiresExact(key) => write!(f, "Requires<{}>", key.name),
            Clause::RequiresPolymorphic(key) => write!(f, "RequiresPolymorphic<{}>", key.name),
            Clause::ExcludesExact(key) => write!(f, "Excludes<{}>", key.name),
            Clause::ExcludesPolymorphic(key) => write!(f, "ExcludesPolymorphic<{}>", key.name),
            Clause::AllOf(filters) => f.debug_list().entries(filters).finish(),
            Clause::Predicate(_) => write!(f, "Predicate"),
        }
    }
}

/// Conjunction of clauses over a game object's behaviour set.
///
/// The empty filter matches every object.
#[derive(Clone, Default)]
pub struct Filter {
    clauses: SmallVec<[Clause; 4]>,
}

impl Filter {
    /// Filter matching every game object
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a behaviour whose exact type is `T`
    pub fn requires<T: 'static>(mut self) -> Self {
        self.clauses.push(Clause::RequiresExact(TypeKey::of::<T>()));
        self
    }

    /// Require a behaviour carrying capability `T`
    pub fn requires_polymorphic<T: ?Sized + 'static>(mut self) -> Self {
        self.clauses
            .push(Clause::RequiresPolymorphic(TypeKey::of::<T>()));
        self
    }

    /// Reject objects with a behaviour whose exact type is `T`
    pub fn excludes<T: 'static>(mut self) -> Self {
        self.clauses.push(Clause::ExcludesExact(TypeKey::of::<T>()));
        self
    }

    /// Reject objects with any behaviour carrying capability `T`
    pub fn excludes_polymorphic<T: ?Sized + 'static>(mut self) -> Self {
        self.clauses
            .push(Clause::ExcludesPolymorphic(TypeKey::of::<T>()));
        self
    }

    /// Custom clause. Must depend only on the object's behaviour set, since
    /// objects are re-filtered only when that set changes.
    pub fn matching(mut self, predicate: fn(&GameObject) -> bool) -> Self {
        self.clauses.push(Clause::Predicate(predicate));
        self
    }

    /// Append `other` as a single nested clause
    pub fn and(mut self, other: Filter) -> Self {
        self.clauses.push(Clause::AllOf(vec![other]));
        self
    }

    /// Composite filter: all of `filters`, short-circuiting in order
    pub fn all_of(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filter = Self::new();
        filter.clauses.push(Clause::AllOf(filters.into_iter().collect()));
        filter
    }

    pub fn matches(&self, object: &GameObject) -> bool {
        self.clauses.iter().all(|clause| clause.matches(object))
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Filter").field(&self.clauses.as_slice()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::Behaviour;
    use crate::capability::Capabilities;
    use crate::scene::Scene;

    trait Foo {}

    struct FooBase;
    impl Foo for FooBase {}
    impl Behaviour for FooBase {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.implements::<dyn Foo>(|b| b, |b| b);
        }
    }

    struct FooDerived;
    impl Foo for FooDerived {}
    impl Behaviour for FooDerived {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.implements::<dyn Foo>(|b| b, |b| b);
        }
    }

    struct Bar;
    impl Behaviour for Bar {}

    struct Baz;
    impl Behaviour for Baz {}

    #[test]
    fn test_empty_filter_matches_everything() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        assert!(Filter::new().matches(&object));
    }

    #[test]
    fn test_exact_vs_polymorphic() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        object.add_component(FooDerived);

        assert!(!Filter::new().requires::<FooBase>().matches(&object));
        assert!(Filter::new().requires::<FooDerived>().matches(&object));
        assert!(Filter::new().requires_polymorphic::<dyn Foo>().matches(&object));
        assert!(!Filter::new().excludes_polymorphic::<dyn Foo>().matches(&object));
        assert!(Filter::new().excludes::<FooBase>().matches(&object));
    }

    #[test]
    fn test_composite_is_conjunction() {
        let scene = Scene::new();
        let object = scene.add_game_object();
        object.add_component(FooBase).add_component(Bar);

        let filter = Filter::all_of([
            Filter::new().requires_polymorphic::<dyn Foo>(),
            Filter::new().excludes::<Baz>(),
        ]);
        assert!(filter.matches(&object));

        object.add_component(Baz);
        assert!(!filter.matches(&object));
        assert!(!filter.clone().and(Filter::new()).matches(&object));
    }

    #[test]
    fn test_predicate_clause() {
        fn two_or_more(object: &GameObject) -> bool {
            object.component_count() >= 2
        }

        let scene = Scene::new();
        let object = scene.add_game_object();
        let filter = Filter::new().requires::<Bar>().matching(two_or_more);
        object.add_component(Bar);
        assert!(!filter.matches(&object));
        object.add_component(Baz);
        assert!(filter.matches(&object));
        assert_eq!(filter.clause_count(), 2);
    }

    #[test]
    fn test_debug_lists_clauses() {
        let filter = Filter::new().requires::<Bar>().excludes_polymorphic::<dyn Foo>();
        assert_eq!(
            format!("{filter:?}"),
            "Filter([Requires<Bar>, ExcludesPolymorphic<Foo>])"
        );
    }
}
