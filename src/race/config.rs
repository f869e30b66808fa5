//! Race configuration
//!
//! All tuning coefficients live in one flat record injected into every
//! controller, so races can be tuned without touching controller code.

use anyhow::{bail, Result};

/// Flat record of named numeric coefficients for one race
#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Floor for progress/physical velocity (world units per second)
    pub v_min: f32,
    /// Ceiling for progress velocity
    pub v_max: f32,
    /// Constant baseline acceleration on the progress layer
    pub base_accel: f32,
    /// Time constant of the reward low-pass filter (seconds)
    pub reward_tau: f32,
    /// Coasting deceleration applied while above `v_min`
    pub decay_beta: f32,
    /// Gain pulling progress velocity toward `v_min` while slipping
    pub slip_pull: f32,
    /// Maximum progress advance per tick, preventing tunnelling through
    /// collision checks at high velocity or low frame rate
    pub max_step_distance: f32,

    /// Half-width of the finite difference used for curvature estimation
    pub curvature_eps: f32,
    /// Small floor added to |curvature| to keep the corner speed cap finite
    pub curvature_floor: f32,
    /// Scale on the curvature-limited speed cap
    pub corner_speed_scale: f32,
    /// Base friction coefficient; slip degrades it by up to 60%
    pub mu_base: f32,
    /// Proportional gain pulling physical position toward progress position
    pub track_gain: f32,
    /// First-order gain relaxing physical velocity toward its target
    pub velocity_gain: f32,
    /// Headroom above the corner speed cap granted to the tracker
    pub v_bonus: f32,

    /// Linear slip decay per second
    pub slip_decay_rate: f32,
    /// Amplitude of the slip wobble angle (radians at full slip)
    pub slip_wobble_amp: f32,
    /// Spatial frequency of the slip wobble (cycles per world unit)
    pub slip_wobble_freq: f32,

    /// Fraction of rear-car momentum transferred to the front car in a
    /// regular collision
    pub momentum_transfer: f32,
    /// Forward nudge applied to the front car during positional correction
    pub collision_nudge: f32,
    /// Slip added to the rear car in a regular collision
    pub collision_slip: f32,
    /// Slip added to a merging car whose target lane was contested
    pub merge_slip_major: f32,
    /// Slip added for incidental merge contact
    pub merge_slip_minor: f32,
    /// Slip added when a lane-change request is rejected as out of bounds
    pub lane_reject_slip: f32,

    /// Duration of one lane-change interpolation (seconds)
    pub lane_change_duration: f32,
    /// Default time-to-collision threshold handed to bot profiles (seconds)
    pub safety_time_threshold: f32,
    /// Scale on the speed-dependent part of the lane-entry clearance
    pub dynamic_safety_scale: f32,
    /// Look-ahead horizon of the bot pre-commit collision check (seconds)
    pub precommit_horizon: f32,

    /// Reward queued for a correct answer
    pub answer_reward: f32,
    /// Slip applied for an incorrect answer
    pub answer_penalty_slip: f32,
    /// Mean of the gaussian inter-answer interval (seconds)
    pub answer_speed_mean: f32,
    /// Standard deviation of the inter-answer interval
    pub answer_speed_std_dev: f32,
    /// Floor on the interval, keeping it strictly positive
    pub min_answer_interval: f32,

    /// Fuel tank capacity (abstract units)
    pub fuel_capacity: f32,
    /// Fuel burned per world unit of progress
    pub fuel_burn_rate: f32,
    /// Tire wear per world unit travelled, scaled up while slipping
    pub tire_wear_rate: f32,
    /// Fuel fraction below which the pit-required flag latches
    pub pit_fuel_fraction: f32,
    /// Tire wear above which the pit-required flag latches
    pub pit_wear_threshold: f32,
    /// Fraction of `v_max` a pit-required car is limited to
    pub pit_speed_fraction: f32,

    /// Default car body length
    pub car_length: f32,
    /// Default car body width
    pub car_width: f32,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            v_min: 8.0,
            v_max: 60.0,
            base_accel: 0.5,
            reward_tau: 0.5,
            decay_beta: 4.0,
            slip_pull: 1.5,
            max_step_distance: 8.0,

            curvature_eps: 1.0,
            curvature_floor: 1.0e-4,
            corner_speed_scale: 1.0,
            mu_base: 1.2,
            track_gain: 1.5,
            velocity_gain: 2.5,
            v_bonus: 4.0,

            slip_decay_rate: 0.35,
            slip_wobble_amp: 0.25,
            slip_wobble_freq: 0.8,

            momentum_transfer: 0.5,
            collision_nudge: 0.25,
            collision_slip: 0.5,
            merge_slip_major: 0.4,
            merge_slip_minor: 0.15,
            lane_reject_slip: 0.1,

            lane_change_duration: 1.2,
            safety_time_threshold: 3.0,
            dynamic_safety_scale: 0.6,
            precommit_horizon: 0.5,

            answer_reward: 150.0,
            answer_penalty_slip: 0.2,
            answer_speed_mean: 2.5,
            answer_speed_std_dev: 0.8,
            min_answer_interval: 0.1,

            fuel_capacity: 100.0,
            fuel_burn_rate: 0.02,
            tire_wear_rate: 0.0008,
            pit_fuel_fraction: 0.1,
            pit_wear_threshold: 0.85,
            pit_speed_fraction: 0.4,

            car_length: 4.5,
            car_width: 2.0,
        }
    }
}

impl RaceConfig {
    /// Validate the configuration, failing fast with the offending field name
    ///
    /// Runs once at race construction, before the per-tick pipeline starts,
    /// so the controllers never see a malformed coefficient.
    pub fn validate(&self) -> Result<()> {
        let finite_fields = [
            ("v_min", self.v_min),
            ("v_max", self.v_max),
            ("base_accel", self.base_accel),
            ("reward_tau", self.reward_tau),
            ("decay_beta", self.decay_beta),
            ("slip_pull", self.slip_pull),
            ("max_step_distance", self.max_step_distance),
            ("curvature_eps", self.curvature_eps),
            ("curvature_floor", self.curvature_floor),
            ("corner_speed_scale", self.corner_speed_scale),
            ("mu_base", self.mu_base),
            ("track_gain", self.track_gain),
            ("velocity_gain", self.velocity_gain),
            ("v_bonus", self.v_bonus),
            ("slip_decay_rate", self.slip_decay_rate),
            ("slip_wobble_amp", self.slip_wobble_amp),
            ("slip_wobble_freq", self.slip_wobble_freq),
            ("momentum_transfer", self.momentum_transfer),
            ("collision_nudge", self.collision_nudge),
            ("collision_slip", self.collision_slip),
            ("merge_slip_major", self.merge_slip_major),
            ("merge_slip_minor", self.merge_slip_minor),
            ("lane_reject_slip", self.lane_reject_slip),
            ("lane_change_duration", self.lane_change_duration),
            ("safety_time_threshold", self.safety_time_threshold),
            ("dynamic_safety_scale", self.dynamic_safety_scale),
            ("precommit_horizon", self.precommit_horizon),
            ("answer_reward", self.answer_reward),
            ("answer_penalty_slip", self.answer_penalty_slip),
            ("answer_speed_mean", self.answer_speed_mean),
            ("answer_speed_std_dev", self.answer_speed_std_dev),
            ("min_answer_interval", self.min_answer_interval),
            ("fuel_capacity", self.fuel_capacity),
            ("fuel_burn_rate", self.fuel_burn_rate),
            ("tire_wear_rate", self.tire_wear_rate),
            ("pit_fuel_fraction", self.pit_fuel_fraction),
            ("pit_wear_threshold", self.pit_wear_threshold),
            ("pit_speed_fraction", self.pit_speed_fraction),
            ("car_length", self.car_length),
            ("car_width", self.car_width),
        ];
        for (name, value) in finite_fields {
            if !value.is_finite() {
                bail!("configuration field `{}` is not a finite number", name);
            }
        }

        let positive_fields = [
            ("v_min", self.v_min),
            ("v_max", self.v_max),
            ("reward_tau", self.reward_tau),
            ("max_step_distance", self.max_step_distance),
            ("curvature_eps", self.curvature_eps),
            ("curvature_floor", self.curvature_floor),
            ("mu_base", self.mu_base),
            ("lane_change_duration", self.lane_change_duration),
            ("min_answer_interval", self.min_answer_interval),
            ("fuel_capacity", self.fuel_capacity),
            ("car_length", self.car_length),
            ("car_width", self.car_width),
        ];
        for (name, value) in positive_fields {
            if value <= 0.0 {
                bail!("configuration field `{}` must be positive, got {}", name, value);
            }
        }

        if self.v_max <= self.v_min {
            bail!(
                "configuration field `v_max` ({}) must exceed `v_min` ({})",
                self.v_max,
                self.v_min
            );
        }
        Ok(())
    }
}
