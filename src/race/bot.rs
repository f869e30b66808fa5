//! Bot drivers
//!
//! Bots participate through the same two inputs a human has: answering
//! questions (on a gaussian timer, hitting or missing per their accuracy)
//! and requesting lane changes. The lane-change policy is defensive: a bot
//! only looks for a new lane when its time-to-collision in the current lane
//! drops below its comfort threshold, and only commits when the target lane
//! is measurably safer and a short look-ahead finds no conflict.
//!
//! Decisions are computed against an immutable snapshot of the field and
//! applied afterwards, so the outcome never depends on car iteration order.

use log::debug;
use ordered_float::OrderedFloat;
use rand::Rng;

use super::car::Car;
use super::config::RaceConfig;
use super::lane::LaneController;
use super::longitudinal::{apply_penalty, queue_reward};
use super::track::{wrap_signed, TrackGeometry};
use super::types::{CarKind, RaceStats};

/// Sample a gaussian via the Box-Muller transform
///
/// A non-positive standard deviation degenerates to the mean, which keeps
/// fixed-timer bot profiles deterministic.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f32, std_dev: f32) -> f32 {
    if std_dev <= 0.0 {
        return mean;
    }
    let u1 = rng.random::<f32>().max(1.0e-7);
    let u2 = rng.random::<f32>();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
    mean + std_dev * z
}

/// Drives every bot's answer timer and lane-change policy each tick
pub struct BotController {
    cfg: RaceConfig,
}

impl BotController {
    pub fn new(cfg: &RaceConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    /// Run both bot phases for one tick: answers first, then lane decisions
    pub fn update_bots<R: Rng + ?Sized>(
        &self,
        cars: &mut [Car],
        lanes: &LaneController,
        track: &dyn TrackGeometry,
        rng: &mut R,
        t: f32,
        stats: &mut RaceStats,
    ) {
        self.answer_questions(cars, rng, t, stats);

        let mut decisions = Vec::new();
        for (i, car) in cars.iter().enumerate() {
            if !car.is_bot() || car.is_changing_lanes() {
                continue;
            }
            let dir = self.should_lane_change(car, cars, lanes, track, t);
            if dir == 0 {
                continue;
            }
            let target = (car.lane_index as i32 + dir) as usize;
            if self.precommit_allows(car, target, cars, lanes, track, t) {
                decisions.push((i, dir));
            } else {
                debug!("car {:?} pre-commit check rejected lane {}", car.id, target);
            }
        }
        for (i, dir) in decisions {
            if lanes.switch_lane(&mut cars[i], track, dir, t) {
                stats.lane_changes_started += 1;
            } else {
                stats.lane_changes_rejected += 1;
            }
        }
    }

    /// Fire every due answer timer: queue a reward on a hit, slip on a miss,
    /// then reschedule from the bot's gaussian profile
    fn answer_questions<R: Rng + ?Sized>(
        &self,
        cars: &mut [Car],
        rng: &mut R,
        t: f32,
        stats: &mut RaceStats,
    ) {
        for car in cars.iter_mut() {
            let due = match &car.kind {
                CarKind::Bot(p) if p.next_answer_time <= t => {
                    Some((p.accuracy, p.answer_speed_mean, p.answer_speed_std_dev))
                }
                _ => None,
            };
            let Some((accuracy, mean, std_dev)) = due else {
                continue;
            };

            if rng.random::<f32>() < accuracy {
                queue_reward(car, self.cfg.answer_reward);
                stats.questions_correct += 1;
            } else {
                apply_penalty(car, self.cfg.answer_penalty_slip);
                stats.questions_incorrect += 1;
            }

            let interval = gaussian(rng, mean, std_dev).max(self.cfg.min_answer_interval);
            if let CarKind::Bot(p) = &mut car.kind {
                p.next_answer_time = t + interval;
            }
        }
    }

    /// Decide whether a bot wants to move left (-1), right (+1) or stay (0)
    ///
    /// Only triggers when the current lane's minimum time-to-collision falls
    /// below the bot's threshold, and only picks a lane that is clear to
    /// enter, strictly safer than staying put, and itself clears the
    /// threshold. A lane that is merely less bad is not worth the merge.
    fn should_lane_change(
        &self,
        me: &Car,
        cars: &[Car],
        lanes: &LaneController,
        track: &dyn TrackGeometry,
        t: f32,
    ) -> i32 {
        let threshold = match &me.kind {
            CarKind::Bot(p) => p.safety_time_threshold,
            CarKind::Player => self.cfg.safety_time_threshold,
        };
        let current = self.lane_safety(me, me.lane_index, cars, lanes, track, t);
        if current >= threshold {
            return 0;
        }

        let mut candidates = Vec::new();
        for dir in [-1i32, 1] {
            let lane = me.lane_index as i32 + dir;
            if lane < 0 || lane >= track.num_lanes() as i32 {
                continue;
            }
            let lane = lane as usize;
            if !self.is_lane_safe_to_change_into(me, lane, cars, track) {
                continue;
            }
            let safety = self.lane_safety(me, lane, cars, lanes, track, t);
            if safety > current && safety >= threshold {
                candidates.push((dir, safety));
            }
        }
        candidates
            .into_iter()
            .max_by_key(|&(_, safety)| OrderedFloat(safety))
            .map(|(dir, _)| dir)
            .unwrap_or(0)
    }

    /// Minimum time-to-collision against every car occupying `lane`
    ///
    /// Occupancy comes from the interpolated effective-lane pair, so a car
    /// mid-transition threatens the segment it is physically between, not
    /// the lane it left. Pairs that are not closing contribute infinity, so
    /// an empty or receding lane reads as perfectly safe.
    fn lane_safety(
        &self,
        me: &Car,
        lane: usize,
        cars: &[Car],
        lanes: &LaneController,
        track: &dyn TrackGeometry,
        t: f32,
    ) -> f32 {
        let l = track.length();
        let mut min_ttc = f32::INFINITY;
        for other in cars {
            if other.id == me.id || !lanes.effective_lanes(other, t).contains(lane) {
                continue;
            }
            let d = wrap_signed(other.s_phys - me.s_phys, l);
            let closing = if d >= 0.0 {
                me.v_phys - other.v_phys
            } else {
                other.v_phys - me.v_phys
            };
            if closing > 0.0 {
                min_ttc = min_ttc.min(d.abs() / closing);
            }
        }
        min_ttc
    }

    /// Gap check for entering a lane: a fixed two-car-length buffer plus a
    /// speed-dependent margin
    ///
    /// When the occupant is closing from behind the margin scales with the
    /// faster car's speed outright, since a tailgater's closing rate can
    /// spike after the merge; otherwise the relative speed is enough.
    fn is_lane_safe_to_change_into(
        &self,
        me: &Car,
        lane: usize,
        cars: &[Car],
        track: &dyn TrackGeometry,
    ) -> bool {
        let l = track.length();
        for other in cars {
            if other.id == me.id || !occupies_lane(other, lane) {
                continue;
            }
            let d = wrap_signed(other.s_phys - me.s_phys, l);
            let approaching_from_behind = d < 0.0 && other.v_phys > me.v_phys;
            let margin = if approaching_from_behind {
                other.v_phys.abs().max(me.v_phys.abs())
            } else {
                (other.v_phys - me.v_phys).abs()
            };
            if d.abs() < 2.0 * me.length + self.cfg.dynamic_safety_scale * margin {
                return false;
            }
        }
        true
    }

    /// Final look-ahead before committing: during the transition the car
    /// straddles both source and target lane, so any car whose effective
    /// lanes touch either one and that overlaps now or collides within the
    /// horizon vetoes the change
    ///
    /// Purely predictive; nothing is mutated on rejection.
    fn precommit_allows(
        &self,
        me: &Car,
        target_lane: usize,
        cars: &[Car],
        lanes: &LaneController,
        track: &dyn TrackGeometry,
        t: f32,
    ) -> bool {
        let l = track.length();
        for other in cars {
            if other.id == me.id {
                continue;
            }
            let occupied = lanes.effective_lanes(other, t);
            if !occupied.contains(me.lane_index) && !occupied.contains(target_lane) {
                continue;
            }
            let d = wrap_signed(other.s_phys - me.s_phys, l);
            let half_sep = (me.length + other.length) * 0.5;
            if d.abs() < half_sep {
                return false;
            }
            let closing = if d >= 0.0 {
                me.v_phys - other.v_phys
            } else {
                other.v_phys - me.v_phys
            };
            if closing > 0.0 && d.abs() / closing < self.cfg.precommit_horizon {
                return false;
            }
        }
        true
    }
}

/// Entry-gap occupancy: a car counts as in its settled lane and, when
/// mid-transition, as merging into its target lane
fn occupies_lane(car: &Car, lane: usize) -> bool {
    car.lane_index == lane || car.lane_state.target_lane() == Some(lane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::track::CircularTrack;
    use super::super::types::{BotProfile, CarId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_setup() -> (RaceConfig, CircularTrack, LaneController, BotController) {
        let config = RaceConfig::default();
        let track = CircularTrack::with_length(1000.0, 6, 3.5);
        let lanes = LaneController::new(&config);
        let bots = BotController::new(&config);
        (config, track, lanes, bots)
    }

    fn bot_car(config: &RaceConfig, id: usize, s: f32, lane: usize, v: f32, accuracy: f32) -> Car {
        let profile = BotProfile {
            accuracy,
            answer_speed_mean: config.answer_speed_mean,
            answer_speed_std_dev: config.answer_speed_std_dev,
            safety_time_threshold: config.safety_time_threshold,
            next_answer_time: 0.0,
        };
        let mut car = Car::new(CarId(id), CarKind::Bot(profile), s, lane, config);
        car.v_phys = v;
        car
    }

    fn plain_car(config: &RaceConfig, id: usize, s: f32, lane: usize, v: f32) -> Car {
        let mut car = Car::new(CarId(id), CarKind::Player, s, lane, config);
        car.v_phys = v;
        car
    }

    #[test]
    fn gaussian_zero_deviation_is_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(gaussian(&mut rng, 2.0, 0.0), 2.0);
        assert_eq!(gaussian(&mut rng, -3.5, 0.0), -3.5);
    }

    #[test]
    fn gaussian_sample_mean_is_close() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 4000;
        let sum: f32 = (0..n).map(|_| gaussian(&mut rng, 2.5, 0.8)).sum();
        let mean = sum / n as f32;
        assert!((mean - 2.5).abs() < 0.1, "sample mean = {}", mean);
    }

    #[test]
    fn lone_bot_never_changes_lanes() {
        let (config, track, lanes, bots) = test_setup();
        let cars = vec![bot_car(&config, 0, 100.0, 2, 40.0, 0.9)];
        assert_eq!(bots.should_lane_change(&cars[0], &cars, &lanes, &track, 0.0), 0);
    }

    #[test]
    fn accurate_bot_queues_reward_and_reschedules() {
        let (config, track, lanes, bots) = test_setup();
        let mut rng = StdRng::seed_from_u64(1);
        let mut stats = RaceStats::default();
        let mut cars = vec![bot_car(&config, 0, 0.0, 0, 20.0, 1.0)];

        bots.update_bots(&mut cars, &lanes, &track, &mut rng, 0.0, &mut stats);
        assert_eq!(cars[0].pending_reward, config.answer_reward);
        assert_eq!(stats.questions_correct, 1);
        assert_eq!(stats.questions_incorrect, 0);
        match &cars[0].kind {
            CarKind::Bot(p) => assert!(p.next_answer_time >= config.min_answer_interval),
            CarKind::Player => panic!("car lost its bot profile"),
        }
    }

    #[test]
    fn inaccurate_bot_slips_instead() {
        let (config, track, lanes, bots) = test_setup();
        let mut rng = StdRng::seed_from_u64(1);
        let mut stats = RaceStats::default();
        let mut cars = vec![bot_car(&config, 0, 0.0, 0, 20.0, 0.0)];

        bots.update_bots(&mut cars, &lanes, &track, &mut rng, 0.0, &mut stats);
        assert_eq!(cars[0].pending_reward, 0.0);
        assert_eq!(cars[0].slip_factor, config.answer_penalty_slip);
        assert_eq!(stats.questions_incorrect, 1);
    }

    #[test]
    fn threatened_bot_moves_to_an_open_lane() {
        let (config, track, lanes, bots) = test_setup();
        let mut rng = StdRng::seed_from_u64(3);
        let mut stats = RaceStats::default();
        // Slow car 40 units ahead in the same lane; adjacent lanes open
        let mut cars = vec![
            bot_car(&config, 0, 100.0, 1, 40.0, 1.0),
            plain_car(&config, 1, 140.0, 1, 10.0),
        ];

        bots.update_bots(&mut cars, &lanes, &track, &mut rng, 0.0, &mut stats);
        assert!(cars[0].is_changing_lanes());
        assert_eq!(stats.lane_changes_started, 1);
    }

    #[test]
    fn boxed_in_bot_stays_put() {
        let (config, track, lanes, bots) = test_setup();
        let mut rng = StdRng::seed_from_u64(3);
        let mut stats = RaceStats::default();
        // Threat ahead, but both adjacent lanes blocked alongside
        let mut cars = vec![
            bot_car(&config, 0, 100.0, 1, 40.0, 1.0),
            plain_car(&config, 1, 140.0, 1, 10.0),
            plain_car(&config, 2, 100.0, 0, 40.0),
            plain_car(&config, 3, 100.0, 2, 40.0),
        ];

        bots.update_bots(&mut cars, &lanes, &track, &mut rng, 0.0, &mut stats);
        assert!(!cars[0].is_changing_lanes());
        assert_eq!(stats.lane_changes_started, 0);
    }

    #[test]
    fn precommit_vetoes_imminent_collision() {
        let (config, track, lanes, bots) = test_setup();
        // Threat close enough that the straddle window still contains it
        let cars = vec![
            bot_car(&config, 0, 100.0, 1, 40.0, 1.0),
            plain_car(&config, 1, 110.0, 1, 10.0),
        ];
        let dir = bots.should_lane_change(&cars[0], &cars, &lanes, &track, 0.0);
        assert_ne!(dir, 0);
        let target = (cars[0].lane_index as i32 + dir) as usize;
        assert!(!bots.precommit_allows(&cars[0], target, &cars, &lanes, &track, 0.0));
    }

    #[test]
    fn better_but_still_unsafe_lane_is_not_taken() {
        let (config, track, lanes, bots) = test_setup();
        let mut rng = StdRng::seed_from_u64(3);
        let mut stats = RaceStats::default();
        // Current lane threat at 1.5s TTC; lane 2's best TTC is 2.5s, an
        // improvement but still under the 3s comfort threshold; lane 0 is
        // blocked alongside
        let mut cars = vec![
            bot_car(&config, 0, 100.0, 1, 40.0, 1.0),
            plain_car(&config, 1, 115.0, 1, 30.0),
            plain_car(&config, 2, 125.0, 2, 30.0),
            plain_car(&config, 3, 100.0, 0, 40.0),
        ];

        bots.update_bots(&mut cars, &lanes, &track, &mut rng, 0.0, &mut stats);
        assert!(!cars[0].is_changing_lanes());
        assert_eq!(stats.lane_changes_started, 0);
    }

    #[test]
    fn threat_leaving_the_lane_is_ignored() {
        let (config, track, lanes, bots) = test_setup();
        let mut rng = StdRng::seed_from_u64(3);
        let mut stats = RaceStats::default();
        // A faster car closes from behind in lane 1 but is deep into a
        // two-lane change toward lane 3, physically between lanes 2 and 3
        let mut cars = vec![
            bot_car(&config, 0, 100.0, 1, 40.0, 1.0),
            plain_car(&config, 1, 80.0, 1, 60.0),
        ];
        assert!(lanes.switch_lane(&mut cars[1], &track, 1, 0.0));
        assert!(lanes.switch_lane(&mut cars[1], &track, 1, 0.0));

        let t = config.lane_change_duration * 0.9;
        bots.update_bots(&mut cars, &lanes, &track, &mut rng, t, &mut stats);
        assert!(!cars[0].is_changing_lanes());
        assert_eq!(stats.lane_changes_started, 0);
    }

    #[test]
    fn precommit_sees_a_car_crossing_the_target_lane() {
        let (config, track, lanes, bots) = test_setup();
        let mut rng = StdRng::seed_from_u64(3);
        let mut stats = RaceStats::default();
        // Threat ahead pushes the bot out of lane 1. Alongside it a car is
        // halfway through a three-lane sweep from lane 0 toward lane 3,
        // physically between lanes 1 and 2, so both escape lanes are taken
        let mut cars = vec![
            bot_car(&config, 0, 100.0, 1, 40.0, 1.0),
            plain_car(&config, 1, 140.0, 1, 10.0),
            plain_car(&config, 2, 100.0, 0, 40.0),
        ];
        for _ in 0..3 {
            assert!(lanes.switch_lane(&mut cars[2], &track, 1, 0.0));
        }
        assert_eq!(cars[2].lane_state.target_lane(), Some(3));

        let t = config.lane_change_duration * 0.5;
        bots.update_bots(&mut cars, &lanes, &track, &mut rng, t, &mut stats);
        assert!(!cars[0].is_changing_lanes());
        assert_eq!(stats.lane_changes_started, 0);
    }
}
