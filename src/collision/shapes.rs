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

//! Built-in 2D colliders
//!
//! Touching shapes do not collide; overlap must be strictly positive.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::behaviour::Behaviour;
use crate::capability::Capabilities;
use crate::collision::collider::{Collider, ColliderHandle};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    /// Corners are reordered so `min <= max` on both axes.
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        let half = half_extents.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Point of the box nearest to `point`
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        point.clamp(self.min, self.max)
    }

    pub fn translate(&mut self, offset: Vec2) {
        self.min += offset;
        self.max += offset;
    }
}

fn circle_overlaps_box(center: Vec2, radius: f32, bounds: &Aabb) -> bool {
    bounds.closest_point(center).distance_squared(center) < radius * radius
}

/// Circle collider
#[derive(Debug, Clone, PartialEq)]
pub struct CircleCollider {
    pub center: Vec2,
    pub radius: f32,
    is_static: bool,
}

impl CircleCollider {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self {
            center,
            radius: radius.abs(),
            is_static: false,
        }
    }

    pub fn new_static(center: Vec2, radius: f32) -> Self {
        Self {
            is_static: true,
            ..Self::new(center, radius)
        }
    }
}

impl Behaviour for CircleCollider {
    fn capabilities(caps: &mut Capabilities<Self>) {
        caps.collider();
    }
}

impl Collider for CircleCollider {
    fn is_static(&self) -> bool {
        self.is_static
    }

    fn collides_with(&self, other: &ColliderHandle) -> bool {
        if let Some(circle) = other.downcast_ref::<CircleCollider>() {
            let reach = self.radius + circle.radius;
            return self.center.distance_squared(circle.center) < reach * reach;
        }
        if let Some(other_box) = other.downcast_ref::<BoxCollider>() {
            return circle_overlaps_box(self.center, self.radius, &other_box.bounds);
        }
        match other.bounds() {
            Some(bounds) => circle_overlaps_box(self.center, self.radius, &bounds),
            None => false,
        }
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(Aabb::from_center(self.center, Vec2::splat(self.radius)))
    }
}

/// Axis-aligned box collider
#[derive(Debug, Clone, PartialEq)]
pub struct BoxCollider {
    pub bounds: Aabb,
    is_static: bool,
}

impl BoxCollider {
    pub fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            is_static: false,
        }
    }

    pub fn new_static(bounds: Aabb) -> Self {
        Self {
            bounds,
            is_static: true,
        }
    }
}

impl Behaviour for BoxCollider {
    fn capabilities(caps: &mut Capabilities<Self>) {
        caps.collider();
    }
}

impl Collider for BoxCollider {
    fn is_static(&self) -> bool {
        self.is_static
    }

    fn collides_with(&self, other: &ColliderHandle) -> bool {
        if let Some(circle) = other.downcast_ref::<CircleCollider>() {
            return circle_overlaps_box(circle.center, circle.radius, &self.bounds);
        }
        match other.bounds() {
            Some(bounds) => self.bounds.intersects(&bounds),
            None => false,
        }
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    fn handle_for<C: Collider>(scene: &Scene, collider: C) -> ColliderHandle {
        let object = scene.add_game_object();
        object.add_component(collider);
        ColliderHandle::all_of(&object).remove(0)
    }

    #[test]
    fn test_aabb_intersection_is_strict() {
        let a = Aabb::new(Vec2::ZERO, Vec2::splat(2.0));
        let b = Aabb::from_center(Vec2::splat(2.5), Vec2::splat(1.0));
        let touching = Aabb::new(Vec2::new(2.0, 0.0), Vec2::new(4.0, 2.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&touching));
        assert_eq!(b.center(), Vec2::splat(2.5));
        assert_eq!(b.half_extents(), Vec2::ONE);
    }

    #[test]
    fn test_aabb_new_orders_corners() {
        let mut aabb = Aabb::new(Vec2::new(3.0, -1.0), Vec2::new(1.0, 2.0));
        assert_eq!(aabb.min, Vec2::new(1.0, -1.0));
        assert_eq!(aabb.max, Vec2::new(3.0, 2.0));
        aabb.translate(Vec2::ONE);
        assert_eq!(aabb.min, Vec2::new(2.0, 0.0));
        assert_eq!(aabb.closest_point(Vec2::new(10.0, 1.0)), Vec2::new(4.0, 1.0));
    }

    #[test]
    fn test_circle_pairs() {
        let scene = Scene::new();
        let near = handle_for(&scene, CircleCollider::new(Vec2::new(1.5, 0.0), 1.0));
        let far = handle_for(&scene, CircleCollider::new(Vec2::new(5.0, 0.0), 1.0));

        let probe = CircleCollider::new(Vec2::ZERO, 1.0);
        assert!(probe.collides_with(&near));
        assert!(!probe.collides_with(&far));
    }

    #[test]
    fn test_circle_against_box_both_ways() {
        let scene = Scene::new();
        let wall = BoxCollider::new_static(Aabb::new(Vec2::new(1.0, -5.0), Vec2::new(2.0, 5.0)));
        let wall_handle = handle_for(&scene, wall.clone());
        let ball_handle = handle_for(&scene, CircleCollider::new(Vec2::new(0.5, 0.0), 0.75));

        let ball = CircleCollider::new(Vec2::new(0.5, 0.0), 0.75);
        assert!(ball.collides_with(&wall_handle));
        assert!(wall.collides_with(&ball_handle));
        assert!(wall_handle.is_static());
        assert!(!ball_handle.is_static());
    }

    #[test]
    fn test_box_pairs_use_bounds() {
        let scene = Scene::new();
        let other = handle_for(&scene, BoxCollider::new(Aabb::new(Vec2::ONE, Vec2::splat(3.0))));
        let hit = BoxCollider::new(Aabb::new(Vec2::ZERO, Vec2::splat(2.0)));
        let miss = BoxCollider::new(Aabb::new(Vec2::splat(-3.0), Vec2::splat(-1.0)));
        assert!(hit.collides_with(&other));
        assert!(!miss.collides_with(&other));
        assert_eq!(other.bounds(), Some(Aabb::new(Vec2::ONE, Vec2::splat(3.0))));
    }
}
