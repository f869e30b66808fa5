//! Longitudinal controller
//!
//! Advances every car's two velocity/position pairs one fixed timestep. The
//! progress layer integrates the smoothed reward signal ("how well the racer
//! is answering"); the physical layer is a lagging tracker of it, capped by
//! the curvature-and-friction speed limit of the road under the car. Keeping
//! the two decoupled lets the reward mechanic feel immediate while the
//! rendered car still respects track geometry.

use log::debug;

use super::car::Car;
use super::config::RaceConfig;
use super::track::{wrap_signed, TrackGeometry};
use super::types::Vec2;

/// Gravity constant (world units/s²)
const GRAVITY: f32 = 9.81;

/// Slip degrades effective grip by up to this fraction
const SLIP_GRIP_LOSS: f32 = 0.6;

/// Fraction of the lap treated as "mid-track", where the finish guard resets
const FINISH_GUARD_BAND: f32 = 0.1;

/// Queue a reward for consumption on the car's next integration step
///
/// Multiple rewards queued before a tick sum; the whole accumulator is
/// applied atomically and cleared exactly once per tick.
pub fn queue_reward(car: &mut Car, magnitude: f32) {
    car.pending_reward += magnitude;
}

/// Penalize a car with a slip increase (traction loss)
pub fn apply_penalty(car: &mut Car, slip_magnitude: f32) {
    car.add_slip(slip_magnitude);
}

/// Drop any rewards queued but not yet consumed
pub fn reset_pending_rewards(car: &mut Car) {
    car.pending_reward = 0.0;
}

/// Estimate local curvature from the signed angle between the track tangents
/// at `s ± eps`
pub fn estimate_curvature(track: &dyn TrackGeometry, s: f32, eps: f32) -> f32 {
    let behind = track.tangent_at(track.wrap_s(s - eps));
    let ahead = track.tangent_at(track.wrap_s(s + eps));
    behind.signed_angle_to(&ahead) / (2.0 * eps)
}

/// Integrates progress and physical state for the whole field each tick
pub struct LongitudinalController {
    cfg: RaceConfig,
}

impl LongitudinalController {
    pub fn new(cfg: &RaceConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    /// Advance every car one timestep `dt`
    pub fn step(&self, cars: &mut [Car], track: &dyn TrackGeometry, dt: f32) {
        for car in cars.iter_mut() {
            self.step_progress(car, track, dt);
            self.step_physical(car, track, dt);
            self.step_slip(car, dt);
        }
    }

    /// Progress layer: reward decay, queued reward consumption, velocity
    /// decay/slip terms, clipped integration with the anti-tunnelling clamp
    fn step_progress(&self, car: &mut Car, track: &dyn TrackGeometry, dt: f32) {
        let cfg = &self.cfg;

        car.reward *= (-dt / cfg.reward_tau).exp();
        car.reward += car.pending_reward;
        car.pending_reward = 0.0;

        let a_decay = if car.v_prog > cfg.v_min {
            -cfg.decay_beta
        } else {
            0.0
        };
        let a_slip = if car.slip_factor > 0.0 {
            -cfg.slip_pull * (car.v_prog - cfg.v_min)
        } else {
            0.0
        };
        car.v_prog += (cfg.base_accel + car.reward + a_decay + a_slip) * dt;

        // The stored velocity may transiently exceed the bounds; only the
        // step distance is clipped.
        let mut v_step = car.v_prog.clamp(cfg.v_min, cfg.v_max);
        if car.pit_required {
            v_step = v_step.min(cfg.v_max * cfg.pit_speed_fraction);
        }
        let step = (v_step * dt).min(cfg.max_step_distance);
        car.s_prog = track.wrap_s(car.s_prog + step);

        self.burn_consumables(car, step, dt);
    }

    /// Physical layer: curvature speed cap, proportional position tracker,
    /// first-order velocity relaxation, wrapped advance, lap accounting
    fn step_physical(&self, car: &mut Car, track: &dyn TrackGeometry, dt: f32) {
        let cfg = &self.cfg;
        let l = track.length();

        let kappa = estimate_curvature(track, car.s_phys, cfg.curvature_eps);
        let mu_eff = cfg.mu_base * (1.0 - SLIP_GRIP_LOSS * car.slip_factor);
        let v_kappa =
            cfg.corner_speed_scale * (mu_eff * GRAVITY / (kappa.abs() + cfg.curvature_floor)).sqrt();

        let e_s = wrap_signed(car.s_prog - car.s_phys, l);
        let mut v_des = (cfg.v_min + cfg.track_gain * e_s).clamp(0.0, v_kappa + cfg.v_bonus);
        if car.pit_required {
            v_des = v_des.min(cfg.v_max * cfg.pit_speed_fraction);
        }

        car.v_phys += cfg.velocity_gain * (v_des - car.v_phys) * dt;
        car.v_phys = car.v_phys.max(0.0);

        let before = car.s_phys;
        let advanced = car.s_phys + car.v_phys * dt;
        car.s_phys = track.wrap_s(advanced);

        self.count_lap(car, before, advanced, l);
    }

    /// Count a finish-line crossing exactly once per lap
    ///
    /// The guard latches on the crossing tick and releases only once the car
    /// is back in the middle of the lap, so jitter around s=0 cannot
    /// double-count.
    fn count_lap(&self, car: &mut Car, before: f32, advanced_unwrapped: f32, l: f32) {
        if advanced_unwrapped >= l {
            if !car.crossed_finish {
                car.laps += 1;
                car.crossed_finish = true;
                debug!("car {:?} completed lap {}", car.id, car.laps);
            }
        } else if before > l * FINISH_GUARD_BAND && before < l * (1.0 - FINISH_GUARD_BAND) {
            car.crossed_finish = false;
        }
    }

    /// Slip decays linearly; while slipping, a wobble angle is derived from
    /// position and slip magnitude for rendering and skid-mark geometry
    fn step_slip(&self, car: &mut Car, dt: f32) {
        let cfg = &self.cfg;
        car.slip_factor = (car.slip_factor - cfg.slip_decay_rate * dt).max(0.0);
        car.slip_wobble = if car.slip_factor > 0.0 {
            (car.s_phys * cfg.slip_wobble_freq).sin() * cfg.slip_wobble_amp * car.slip_factor
        } else {
            0.0
        };
    }

    /// Burn fuel with progress and wear tires with distance and slip; latch
    /// the pit-required flag once either crosses its threshold
    fn burn_consumables(&self, car: &mut Car, step: f32, _dt: f32) {
        let cfg = &self.cfg;
        car.fuel = (car.fuel - cfg.fuel_burn_rate * step).max(0.0);
        car.tire_wear =
            (car.tire_wear + cfg.tire_wear_rate * step * (1.0 + car.slip_factor)).min(1.0);

        if !car.pit_required
            && (car.fuel <= cfg.fuel_capacity * cfg.pit_fuel_fraction
                || car.tire_wear >= cfg.pit_wear_threshold)
        {
            car.pit_required = true;
            debug!("car {:?} needs a pit stop", car.id);
        }
    }

    /// World-space skid-mark points at the car's rear corners, when slipping
    ///
    /// Pure side effect for the rendering layer; nothing feeds back into the
    /// physics beyond the friction derating above.
    pub fn skid_points(&self, car: &Car, track: &dyn TrackGeometry) -> Option<[Vec2; 2]> {
        if car.slip_factor <= 0.0 {
            return None;
        }
        let center = track.pos_at(car.s_phys);
        let tangent = track.tangent_at(car.s_phys);
        let normal = track.normal_at(car.s_phys);

        let half_len = car.length * 0.5;
        let half_wid = car.width * 0.5;
        let (sin_w, cos_w) = car.slip_wobble.sin_cos();

        // Rear axle midpoint, offset laterally into the car's lane
        let rear = Vec2::new(
            center.x + normal.x * car.lateral - tangent.x * half_len * cos_w,
            center.y + normal.y * car.lateral - tangent.y * half_len * cos_w,
        );
        let side = Vec2::new(
            normal.x * cos_w - tangent.x * sin_w,
            normal.y * cos_w - tangent.y * sin_w,
        );
        Some([
            Vec2::new(rear.x - side.x * half_wid, rear.y - side.y * half_wid),
            Vec2::new(rear.x + side.x * half_wid, rear.y + side.y * half_wid),
        ])
    }
}
