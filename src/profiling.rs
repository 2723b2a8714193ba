//! # Profiling Guide
//!
//! Ember logs lifecycle events through `tracing` at all times. With the
//! `profiling` feature it also opens spans around every frame, every phase
//! and the collision pass, and exposes subscriber helpers.
//!
//! ## Basic Usage
//!
//! Enable the `profiling` feature in your Cargo.toml:
//!
//! ```toml
//! [dependencies]
//! ember = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! Then install a subscriber before running the scene:
//!
//! ```ignore
//! use ember::prelude::*;
//!
//! ember::profiling::install_fmt_subscriber(tracing::Level::DEBUG);
//!
//! let scene = Scene::new();
//! scene.attach_system(CollisionEngine::new());
//! scene.run_update_cycle(1.0 / 60.0);
//! ```
//!
//! ## Span layout
//!
//! ```text
//! frame{scene, frame}
//!   phase{phase = "pre_update"}
//!   ...
//!   phase{phase = "collision"}
//!     collision_pass
//! ```
//!
//! Profile your own behaviours the same way:
//!
//! ```ignore
//! fn on_update(&mut self, owner: &GameObject, delta_seconds: f64) {
//!     #[cfg(feature = "profiling")]
//!     let span = tracing::info_span!("steering", object = %owner.id());
//!     #[cfg(feature = "profiling")]
//!     let _span_guard = span.enter();
//!
//!     // Behaviour logic here
//! }
//! ```
//!
//! ## Performance Tips
//!
//! 1. Profile in release mode for accurate metrics
//! 2. `Level::TRACE` reports every collider registration and collision,
//!    which is noisy with many colliders
//! 3. Frame times are always available through `Scene::diagnostics`

#[cfg(feature = "profiling")]
use tracing::Level;

/// Install a human-readable global subscriber at `level`. Returns false if a
/// global subscriber was already set.
#[cfg(feature = "profiling")]
pub fn install_fmt_subscriber(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Install a JSON global subscriber at `level`, one event per line. Returns
/// false if a global subscriber was already set.
#[cfg(feature = "profiling")]
pub fn install_json_subscriber(level: Level) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_max_level(level)
        .try_init()
        .is_ok()
}
