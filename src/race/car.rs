//! Per-car vehicle state
//!
//! One `Car` per racer, owned by the shared `RaceWorld` container. The motion
//! model is dual-state: an abstract reward-driven progress pair and a
//! physically-constrained pair that trails it around the loop.

use super::config::RaceConfig;
use super::types::{CarId, CarKind, LaneState};

/// State for a single car
#[derive(Debug, Clone)]
pub struct Car {
    pub id: CarId,
    pub kind: CarKind,

    /// Progress position along the track, always in `[0, length)`
    pub s_prog: f32,
    /// Progress velocity, driven by question-answering rewards
    pub v_prog: f32,
    /// Smoothed reward accumulator (first-order low-pass)
    pub reward: f32,
    /// Rewards queued since the last tick; consumed at most once per tick
    pub pending_reward: f32,

    /// Physical (rendered/collidable) position, always in `[0, length)`
    pub s_phys: f32,
    /// Physical velocity, never negative
    pub v_phys: f32,
    /// Lateral offset from the track centerline (world units)
    pub lateral: f32,

    /// Traction loss in `[0, 1]`; degrades friction and overlays a wobble
    pub slip_factor: f32,
    /// Derived oscillatory wobble angle while slipping (radians)
    pub slip_wobble: f32,

    /// Current lane index
    pub lane_index: usize,
    /// Lane-change interpolation state
    pub lane_state: LaneState,
    /// Net signed lane-change requests not yet absorbed into `lane_index`
    pub pending_lane_changes: i32,

    /// Completed laps
    pub laps: u32,
    /// Guard so a single finish-line crossing is counted once
    pub crossed_finish: bool,

    /// Body length, used for overlap thresholds and momentum scaling
    pub length: f32,
    /// Body width
    pub width: f32,

    /// Remaining fuel (abstract units)
    pub fuel: f32,
    /// Tire wear in `[0, 1]`
    pub tire_wear: f32,
    /// Latched when fuel or tires cross their thresholds; the longitudinal
    /// controller clamps speed while it is set
    pub pit_required: bool,
}

impl Car {
    pub fn new(id: CarId, kind: CarKind, s: f32, lane: usize, config: &RaceConfig) -> Self {
        Self {
            id,
            kind,
            s_prog: s,
            v_prog: config.v_min,
            reward: 0.0,
            pending_reward: 0.0,
            s_phys: s,
            v_phys: config.v_min,
            lateral: 0.0,
            slip_factor: 0.0,
            slip_wobble: 0.0,
            lane_index: lane,
            lane_state: LaneState::Stable,
            pending_lane_changes: 0,
            laps: 0,
            crossed_finish: false,
            length: config.car_length,
            width: config.car_width,
            fuel: config.fuel_capacity,
            tire_wear: 0.0,
            pit_required: false,
        }
    }

    /// A car is changing lanes exactly when a target lane is set
    pub fn is_changing_lanes(&self) -> bool {
        matches!(self.lane_state, LaneState::Transitioning { .. })
    }

    pub fn is_bot(&self) -> bool {
        self.kind.is_bot()
    }

    /// Raise the slip factor, capped at full traction loss
    pub fn add_slip(&mut self, amount: f32) {
        self.slip_factor = (self.slip_factor + amount).min(1.0);
    }
}
