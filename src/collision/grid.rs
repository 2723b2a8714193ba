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

//! Uniform grid broad phase

use ahash::AHashMap;
use glam::Vec2;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::collision::collider::{ColliderHandle, WeakCollider};
use crate::collision::partition::SpatialPartition;
use crate::collision::shapes::Aabb;
use crate::entity::BehaviourId;

/// Colliders spanning more cells than this are kept in the unbounded list.
const MAX_CELLS_PER_COLLIDER: i64 = 4096;

type Cell = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min: Cell,
    max: Cell,
}

impl CellRange {
    fn cells(self) -> impl Iterator<Item = Cell> {
        (self.min.0..=self.max.0).flat_map(move |x| (self.min.1..=self.max.1).map(move |y| (x, y)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Cells(CellRange),
    /// No bounds, or too large to bucket
    Unbounded,
}

/// Buckets colliders by the grid cells their [`bounds`](super::Collider::bounds)
/// overlap. Colliders without bounds are shortlisted against everything.
pub struct UniformGrid {
    cell_size: f32,
    cells: AHashMap<Cell, SmallVec<[WeakCollider; 4]>>,
    placements: AHashMap<BehaviourId, (WeakCollider, Placement)>,
    unbounded: Vec<WeakCollider>,
}

impl UniformGrid {
    /// Non-positive or non-finite sizes fall back to 1.0.
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: AHashMap::new(),
            placements: AHashMap::new(),
            unbounded: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of non-empty cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell_of(&self, point: Vec2) -> Cell {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    fn placement_for(&self, bounds: Option<Aabb>) -> Placement {
        let Some(bounds) = bounds else {
            return Placement::Unbounded;
        };
        if !(bounds.min.is_finite() && bounds.max.is_finite()) {
            return Placement::Unbounded;
        }
        let range = CellRange {
            min: self.cell_of(bounds.min),
            max: self.cell_of(bounds.max),
        };
        let width = range.max.0 as i64 - range.min.0 as i64 + 1;
        let height = range.max.1 as i64 - range.min.1 as i64 + 1;
        if width.saturating_mul(height) > MAX_CELLS_PER_COLLIDER {
            Placement::Unbounded
        } else {
            Placement::Cells(range)
        }
    }

    fn place(&mut self, collider: &WeakCollider, placement: Placement) {
        match placement {
            Placement::Cells(range) => {
                for cell in range.cells() {
                    self.cells.entry(cell).or_default().push(collider.clone());
                }
            }
            Placement::Unbounded => self.unbounded.push(collider.clone()),
        }
    }

    fn unplace(&mut self, id: BehaviourId, placement: Placement) {
        match placement {
            Placement::Cells(range) => {
                for cell in range.cells() {
                    if let Some(bucket) = self.cells.get_mut(&cell) {
                        bucket.retain(|entry| entry.id() != id);
                        if bucket.is_empty() {
                            self.cells.remove(&cell);
                        }
                    }
                }
            }
            Placement::Unbounded => self.unbounded.retain(|entry| entry.id() != id),
        }
    }
}

impl Default for UniformGrid {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SpatialPartition for UniformGrid {
    fn partition(&mut self, collider: &ColliderHandle) {
        let id = collider.id();
        if let Some((_, old)) = self.placements.remove(&id) {
            self.unplace(id, old);
        }
        let weak = collider.downgrade();
        let placement = self.placement_for(collider.bounds());
        self.place(&weak, placement);
        self.placements.insert(id, (weak, placement));
    }

    fn remove(&mut self, collider: &WeakCollider) {
        let id = collider.id();
        if let Some((_, placement)) = self.placements.remove(&id) {
            self.unplace(id, placement);
        }
    }

    fn update(&mut self, collider: &ColliderHandle) {
        let id = collider.id();
        let placement = self.placement_for(collider.bounds());
        match self.placements.get(&id) {
            Some((_, current)) if *current == placement => {}
            Some(_) => {
                if let Some((weak, old)) = self.placements.remove(&id) {
                    self.unplace(id, old);
                    self.place(&weak, placement);
                    self.placements.insert(id, (weak, placement));
                }
            }
            None => self.partition(collider),
        }
    }

    fn shortlist_for(&self, collider: &ColliderHandle) -> Vec<WeakCollider> {
        let id = collider.id();
        let mut seen = FxHashSet::default();
        seen.insert(id);

        let placement = match self.placements.get(&id) {
            Some((_, placement)) => *placement,
            None => self.placement_for(collider.bounds()),
        };

        let mut shortlist = Vec::new();
        match placement {
            Placement::Cells(range) => {
                for cell in range.cells() {
                    if let Some(bucket) = self.cells.get(&cell) {
                        for entry in bucket {
                            if seen.insert(entry.id()) {
                                shortlist.push(entry.clone());
                            }
                        }
                    }
                }
                for entry in &self.unbounded {
                    if seen.insert(entry.id()) {
                        shortlist.push(entry.clone());
                    }
                }
            }
            Placement::Unbounded => {
                let mut all: Vec<&WeakCollider> =
                    self.placements.values().map(|(weak, _)| weak).collect();
                all.sort_by_key(|weak| weak.id());
                for entry in all {
                    if seen.insert(entry.id()) {
                        shortlist.push(entry.clone());
                    }
                }
            }
        }
        shortlist
    }

    fn len(&self) -> usize {
        self.placements.len()
    }
}
