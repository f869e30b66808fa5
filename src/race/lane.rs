//! Lane-change state machine
//!
//! Lateral motion between lane centerlines uses an eased cubic interpolation
//! whose start point captures whatever offset and lateral velocity the car
//! already had, so starting, re-targeting and cancelling a transition never
//! produce a positional or velocity discontinuity.

use log::debug;

use super::car::Car;
use super::config::RaceConfig;
use super::track::TrackGeometry;
use super::types::{EffectiveLanes, LaneState};

/// Cubic ease-in-out: `4p³` below the midpoint, mirrored cubic above it
pub fn ease_in_out_cubic(p: f32) -> f32 {
    if p < 0.5 {
        4.0 * p * p * p
    } else {
        let q = -2.0 * p + 2.0;
        1.0 - q * q * q / 2.0
    }
}

/// Derivative of the ease with respect to `p`
fn ease_in_out_cubic_deriv(p: f32) -> f32 {
    if p < 0.5 {
        12.0 * p * p
    } else {
        let q = -2.0 * p + 2.0;
        3.0 * q * q
    }
}

/// Runs lateral interpolation and lane bookkeeping for the whole field
pub struct LaneController {
    cfg: RaceConfig,
}

impl LaneController {
    pub fn new(cfg: &RaceConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    fn progress(&self, start_time: f32, t: f32) -> f32 {
        ((t - start_time) / self.cfg.lane_change_duration).clamp(0.0, 1.0)
    }

    /// Current interpolated lateral offset of a car
    pub fn lateral_offset(&self, car: &Car, track: &dyn TrackGeometry, t: f32) -> f32 {
        match car.lane_state {
            LaneState::Stable => track.lane_offset(car.lane_index),
            LaneState::Transitioning {
                target_lane,
                start_time,
                start_offset,
                ..
            } => {
                let f = ease_in_out_cubic(self.progress(start_time, t));
                let target = track.lane_offset(target_lane);
                start_offset + (target - start_offset) * f
            }
        }
    }

    /// Current lateral velocity: the chain-ruled ease derivative blended with
    /// the residual start velocity, which fades out as the ease completes
    pub fn lane_change_velocity(&self, car: &Car, track: &dyn TrackGeometry, t: f32) -> f32 {
        match car.lane_state {
            LaneState::Stable => 0.0,
            LaneState::Transitioning {
                target_lane,
                start_time,
                start_offset,
                start_velocity,
            } => {
                let p = self.progress(start_time, t);
                let f = ease_in_out_cubic(p);
                let df = ease_in_out_cubic_deriv(p) / self.cfg.lane_change_duration;
                let target = track.lane_offset(target_lane);
                (target - start_offset) * df + start_velocity * (1.0 - f)
            }
        }
    }

    /// Request a one-lane change in `direction` (-1 or +1)
    ///
    /// Requests accumulate in the signed pending counter, so pressing the
    /// same direction twice queues a two-lane change and opposite presses
    /// cancel out. Out-of-range targets revert the counter, penalize the car
    /// and return false. On acceptance the current interpolated offset and
    /// velocity become the new interpolation start, which is what makes
    /// mid-transition re-targeting seamless.
    pub fn switch_lane(
        &self,
        car: &mut Car,
        track: &dyn TrackGeometry,
        direction: i32,
        t: f32,
    ) -> bool {
        car.pending_lane_changes += direction;
        let candidate = car.lane_index as i32 + car.pending_lane_changes;
        if candidate < 0 || candidate >= track.num_lanes() as i32 {
            car.pending_lane_changes -= direction;
            car.add_slip(self.cfg.lane_reject_slip);
            debug!("car {:?} lane change rejected: lane {} out of range", car.id, candidate);
            return false;
        }

        let start_offset = self.lateral_offset(car, track, t);
        let start_velocity = self.lane_change_velocity(car, track, t);
        car.lane_state = LaneState::Transitioning {
            target_lane: candidate as usize,
            start_time: t,
            start_offset,
            start_velocity,
        };
        true
    }

    /// Abort an active transition and return to the source lane
    ///
    /// The return trip rides the back half of a symmetric ease: the clock
    /// starts half a duration in the past, and the start offset is
    /// back-projected so the ease's midpoint lands exactly on the current
    /// offset. The car comes back promptly without a lateral snap.
    pub fn cancel_lane_change(&self, car: &mut Car, track: &dyn TrackGeometry, t: f32) {
        if !car.is_changing_lanes() {
            return;
        }
        let current_offset = self.lateral_offset(car, track, t);
        let current_velocity = self.lane_change_velocity(car, track, t);
        let source = car.lane_index;
        let source_offset = track.lane_offset(source);

        // offset(p=0.5) = (start + source)/2, so this start pins the
        // midpoint to the current offset
        let start_offset = 2.0 * current_offset - source_offset;

        car.lane_state = LaneState::Transitioning {
            target_lane: source,
            start_time: t - self.cfg.lane_change_duration * 0.5,
            start_offset,
            start_velocity: current_velocity,
        };
        car.pending_lane_changes = 0;
        debug!("car {:?} lane change cancelled, returning to lane {}", car.id, source);
    }

    /// Per-tick update: refresh every car's lateral offset and finalize
    /// completed transitions
    pub fn update_lane_changes(&self, cars: &mut [Car], track: &dyn TrackGeometry, t: f32) {
        for car in cars.iter_mut() {
            match car.lane_state {
                LaneState::Stable => {
                    car.lateral = track.lane_offset(car.lane_index);
                }
                LaneState::Transitioning {
                    target_lane,
                    start_time,
                    ..
                } => {
                    car.lateral = self.lateral_offset(car, track, t);
                    if self.progress(start_time, t) >= 1.0 {
                        car.lane_index = target_lane;
                        car.lane_state = LaneState::Stable;
                        car.lateral = track.lane_offset(target_lane);
                        car.pending_lane_changes = 0;
                    }
                }
            }
        }
    }

    /// The pair of lanes a car instantaneously occupies
    ///
    /// Stable cars occupy one lane; a one-lane transition occupies source
    /// and target. A multi-lane transition occupies only the two-lane
    /// segment matching the car's interpolation progress: a car crossing
    /// three lanes is between exactly one adjacent pair at any instant,
    /// never astride all four touched lanes.
    pub fn effective_lanes(&self, car: &Car, t: f32) -> EffectiveLanes {
        match car.lane_state {
            LaneState::Stable => EffectiveLanes::single(car.lane_index),
            LaneState::Transitioning {
                target_lane,
                start_time,
                ..
            } => {
                let source = car.lane_index as i32;
                let target = target_lane as i32;
                let span = (target - source).abs();
                if span <= 1 {
                    return EffectiveLanes::pair(car.lane_index, target_lane);
                }
                let f = ease_in_out_cubic(self.progress(start_time, t));
                let segment = ((f * span as f32).floor() as i32).clamp(0, span - 1);
                let dir = if target > source { 1 } else { -1 };
                let near = source + dir * segment;
                let far = near + dir;
                EffectiveLanes::pair(near as usize, far as usize)
            }
        }
    }
}
