use serde::Serialize;
use tracing::info;

use crate::entity::GameObjectId;
use crate::error::EmberError;
use crate::scene::Scene;

/// Scene inspector for debugging
pub struct SceneInspector;

impl SceneInspector {
    /// Get live game object count
    pub fn game_object_count(scene: &Scene) -> usize {
        scene.game_object_count()
    }

    /// Per-object behaviour summary, in id order
    pub fn game_object_summary(scene: &Scene) -> Vec<GameObjectInfo> {
        scene
            .game_objects()
            .iter()
            .map(|object| GameObjectInfo {
                id: object.id(),
                behaviours: object.component_type_names(),
            })
            .collect()
    }

    /// Per-system summary, in attach order
    pub fn system_summary(scene: &Scene) -> Vec<SystemInfo> {
        scene.system_infos()
    }

    /// Log scene summary through `tracing`
    pub fn log_summary(scene: &Scene) {
        info!(
            scene = %scene.config().name,
            game_objects = Self::game_object_count(scene),
            systems = scene.system_count(),
            frame = scene.frame_count(),
            "scene summary"
        );
        for object in Self::game_object_summary(scene) {
            info!(object = %object.id, behaviours = ?object.behaviours, "game object");
        }
        for system in Self::system_summary(scene) {
            info!(system = system.name, managed = system.managed_count, "system");
        }
    }

    /// JSON snapshot of the object and system summaries
    pub fn to_json(scene: &Scene) -> crate::error::Result<String> {
        #[derive(Serialize)]
        struct Snapshot {
            frame: u64,
            game_objects: Vec<GameObjectInfo>,
            systems: Vec<SystemInfo>,
        }

        let snapshot = Snapshot {
            frame: scene.frame_count(),
            game_objects: Self::game_object_summary(scene),
            systems: Self::system_summary(scene),
        };
        serde_json::to_string(&snapshot).map_err(EmberError::serialization)
    }
}

/// Game object information for debugging
#[derive(Clone, Debug, Serialize)]
pub struct GameObjectInfo {
    pub id: GameObjectId,
    pub behaviours: Vec<&'static str>,
}

/// System information for debugging
#[derive(Clone, Debug, Serialize)]
pub struct SystemInfo {
    pub name: &'static str,
    /// `None` while the system is running and cannot be inspected
    pub managed_count: Option<usize>,
}

use std::collections::VecDeque;

const PREALLOCATED_SAMPLES: usize = 240;

/// Performance diagnostics
#[derive(Clone, Debug)]
pub struct Diagnostics {
    frame_times: VecDeque<f32>,
    max_samples: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Create new diagnostics tracker
    pub fn new() -> Self {
        Self::with_window(60)
    }

    pub fn with_window(max_samples: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_samples.min(PREALLOCATED_SAMPLES)),
            max_samples: max_samples.max(1),
        }
    }

    /// Record a frame time in milliseconds
    pub fn record_frame_time(&mut self, time_ms: f32) {
        self.frame_times.push_back(time_ms);
        if self.frame_times.len() > self.max_samples {
            self.frame_times.pop_front();
        }
    }

    pub fn sample_count(&self) -> usize {
        self.frame_times.len()
    }

    /// Get average FPS
    pub fn fps(&self) -> f32 {
        let avg_ms = self.avg_frame_time();
        if avg_ms > 0.0 {
            1000.0 / avg_ms
        } else {
            0.0
        }
    }

    /// Get average frame time in milliseconds
    pub fn avg_frame_time(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32
    }

    /// Get min frame time
    pub fn min_frame_time(&self) -> f32 {
        self.frame_times
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min)
    }

    /// Get max frame time
    pub fn max_frame_time(&self) -> f32 {
        self.frame_times
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Log diagnostics
    pub fn log(&self) {
        info!(
            fps = self.fps(),
            avg_ms = self.avg_frame_time(),
            min_ms = self.min_frame_time(),
            max_ms = self.max_frame_time(),
            "frame diagnostics"
        );
    }
}
