//! Standalone race simulation module
//!
//! All the core race logic lives here and runs without any rendering layer.
//! The whole race can be driven and inspected from a console or a test.

mod bot;
mod car;
mod collision;
mod config;
mod lane;
mod longitudinal;
mod track;
mod types;
mod world;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use bot::{gaussian, BotController};
#[allow(unused_imports)]
pub use car::Car;
#[allow(unused_imports)]
pub use collision::CollisionController;
#[allow(unused_imports)]
pub use config::RaceConfig;
#[allow(unused_imports)]
pub use lane::{ease_in_out_cubic, LaneController};
#[allow(unused_imports)]
pub use longitudinal::{
    apply_penalty, estimate_curvature, queue_reward, reset_pending_rewards, LongitudinalController,
};
#[allow(unused_imports)]
pub use track::{wrap_signed, CircularTrack, TrackGeometry};
#[allow(unused_imports)]
pub use types::{
    BotProfile, CarId, CarKind, CollisionKind, CollisionRecord, EffectiveLanes, LaneState,
    RaceStats, Vec2,
};
pub use world::RaceWorld;
