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

//! Runtime type helpers: `Any` access for trait objects and the per-type
//! capability registry.

use std::any::{Any, TypeId};
use std::rc::Rc;

use ahash::AHashMap;

use crate::behaviour::Behaviour;
use crate::capability::CapabilitySet;

/// Downcast support for trait objects.
///
/// Blanket-implemented for every `'static` type, so traits only need to
/// list it as a supertrait.
pub trait AsAny: Any {
    /// Downcast to Any
    fn as_any(&self) -> &dyn Any;

    /// Downcast to mutable Any
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Type name without its module path, for logs and summaries.
///
/// Generic arguments are kept: `ember::collision::Collision<game::Ball>`
/// becomes `Collision<game::Ball>`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head_end = full.find('<').unwrap_or(full.len());
    match full[..head_end].rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// Registry of capability tables, one per concrete behaviour type.
///
/// Tables are built the first time a type is attached anywhere in the scene
/// and shared by every later instance of that type.
#[derive(Default)]
pub struct TypeRegistry {
    registrations: AHashMap<TypeId, Rc<CapabilitySet>>,
}

impl TypeRegistry {
    /// Create new registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Capability table of `B`, building and caching it on first use.
    pub fn capabilities_of<B: Behaviour>(&mut self) -> Rc<CapabilitySet> {
        self.registrations
            .entry(TypeId::of::<B>())
            .or_insert_with(|| Rc::new(CapabilitySet::build::<B>()))
            .clone()
    }

    /// Check if a behaviour type has been registered
    pub fn is_registered<B: Behaviour>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<B>())
    }

    /// Number of registered behaviour types
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
