//! Collision detection and resolution
//!
//! An all-pairs scan each tick (car counts are small) over wrapped track
//! coordinates. Pairs that share a lane are classified as tiebreaker, merge
//! or regular contacts and resolved in place: velocity and reward effects,
//! slip increases, lane-change cancellations and a hard positional
//! correction that prevents sustained overlap.
//!
//! Rear/front designation always comes from the shortest signed wrapped
//! difference, so the s=0 boundary and array order never affect the outcome.

use log::debug;

use super::car::Car;
use super::config::RaceConfig;
use super::lane::LaneController;
use super::longitudinal::reset_pending_rewards;
use super::track::{wrap_signed, TrackGeometry};
use super::types::{CollisionKind, CollisionRecord, LaneState};

/// Front car's post-collision speed is capped at this multiple of `v_max`
const MOMENTUM_CAP_FACTOR: f32 = 1.5;

/// Borrow two distinct cars mutably out of the shared collection
fn pair_mut(cars: &mut [Car], a: usize, b: usize) -> (&mut Car, &mut Car) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = cars.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = cars.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

/// Detects and resolves collisions for the whole field each tick
pub struct CollisionController {
    cfg: RaceConfig,
}

impl CollisionController {
    pub fn new(cfg: &RaceConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    /// Scan all pairs and classify every colliding one
    ///
    /// Records are ephemeral: recomputed from scratch each tick, never
    /// persisted. Classification is order-independent for a given pair.
    pub fn detect_all_collisions(
        &self,
        cars: &[Car],
        lanes: &LaneController,
        track: &dyn TrackGeometry,
        t: f32,
    ) -> Vec<CollisionRecord> {
        let l = track.length();
        let mut records = Vec::new();

        for i in 0..cars.len() {
            for j in (i + 1)..cars.len() {
                let lanes_i = lanes.effective_lanes(&cars[i], t);
                let lanes_j = lanes.effective_lanes(&cars[j], t);
                if !lanes_i.intersects(&lanes_j) {
                    continue;
                }

                let d = wrap_signed(cars[j].s_phys - cars[i].s_phys, l);
                // Exact positional ties break on car id, keeping the
                // designation independent of array order
                let (rear, front) = if d > 0.0 || (d == 0.0 && cars[i].id.0 < cars[j].id.0) {
                    (i, j)
                } else {
                    (j, i)
                };
                let distance = d.abs();
                let separation = (cars[i].length + cars[j].length) * 0.5;

                let kind = self.classify(&cars[i], &cars[j], distance, separation);
                if let Some(kind) = kind {
                    records.push(CollisionRecord {
                        rear,
                        front,
                        kind,
                        distance,
                    });
                }
            }
        }
        records
    }

    fn classify(
        &self,
        a: &Car,
        b: &Car,
        distance: f32,
        separation: f32,
    ) -> Option<CollisionKind> {
        let overlapping = distance <= separation;

        // Tiebreaker: both merging into the same lane from different lanes,
        // before any longitudinal overlap exists. A yielding rule, not a
        // crash.
        if let (Some(ta), Some(tb)) = (a.lane_state.target_lane(), b.lane_state.target_lane()) {
            if ta == tb && a.lane_index != b.lane_index && !overlapping {
                return Some(CollisionKind::Tiebreaker);
            }
        }

        if !overlapping {
            return None;
        }
        if a.is_changing_lanes() || b.is_changing_lanes() {
            Some(CollisionKind::Merge)
        } else {
            Some(CollisionKind::Regular)
        }
    }

    /// Detect, then resolve, returning the records for statistics
    pub fn handle_all_collisions(
        &self,
        cars: &mut [Car],
        lanes: &LaneController,
        track: &dyn TrackGeometry,
        t: f32,
    ) -> Vec<CollisionRecord> {
        let records = self.detect_all_collisions(cars, lanes, track, t);
        for record in &records {
            match record.kind {
                CollisionKind::Tiebreaker => self.resolve_tiebreaker(cars, lanes, track, record, t),
                CollisionKind::Merge => self.resolve_merge(cars, lanes, track, record, t),
                CollisionKind::Regular => self.resolve_regular(cars, track, record),
            }
        }
        records
    }

    /// The slower of two cars contesting the same target lane yields; no
    /// penalty is applied to either
    fn resolve_tiebreaker(
        &self,
        cars: &mut [Car],
        lanes: &LaneController,
        track: &dyn TrackGeometry,
        record: &CollisionRecord,
        t: f32,
    ) {
        let (a, b) = (record.rear, record.front);
        let slower = if cars[a].v_phys <= cars[b].v_phys { a } else { b };
        debug!(
            "tiebreaker: car {:?} yields its lane change",
            cars[slower].id
        );
        lanes.cancel_lane_change(&mut cars[slower], track, t);
    }

    /// Overlapping contact involving at least one mid-lane-change car
    ///
    /// The merge is only aborted when the contested lane is actually the
    /// merging car's target; contact in an incidental intermediate lane
    /// penalizes but lets the merge complete. With two merging cars, only
    /// whichever car's target lane is contested gets cancelled.
    fn resolve_merge(
        &self,
        cars: &mut [Car],
        lanes: &LaneController,
        track: &dyn TrackGeometry,
        record: &CollisionRecord,
        t: f32,
    ) {
        let pair = [record.rear, record.front];
        for &idx in &pair {
            let other = pair[0] + pair[1] - idx;
            let target = match cars[idx].lane_state {
                LaneState::Transitioning { target_lane, .. } => target_lane,
                LaneState::Stable => continue,
            };
            let contested = lanes.effective_lanes(&cars[other], t).contains(target);
            if contested {
                debug!(
                    "merge contact: car {:?} loses contested lane {}",
                    cars[idx].id, target
                );
                lanes.cancel_lane_change(&mut cars[idx], track, t);
                let (merger, stationary) = pair_mut(cars, idx, other);
                merger.add_slip(self.cfg.merge_slip_major);
                merger.reward = 0.0;
                reset_pending_rewards(merger);
                stationary.add_slip(self.cfg.merge_slip_minor);
            } else {
                let (merger, stationary) = pair_mut(cars, idx, other);
                merger.add_slip(self.cfg.merge_slip_minor);
                stationary.add_slip(self.cfg.merge_slip_minor);
            }
        }
    }

    /// Rear-end contact between two lane-stable cars
    ///
    /// The rear car is dropped to the velocity floor with its rewards wiped
    /// and slip raised; the front car absorbs a momentum-scaled boost. Both
    /// are repositioned so the pair sits exactly at separation distance,
    /// which stops the overlap from re-triggering every tick.
    fn resolve_regular(&self, cars: &mut [Car], track: &dyn TrackGeometry, record: &CollisionRecord) {
        let cfg = &self.cfg;
        let (rear, front) = pair_mut(cars, record.rear, record.front);
        let separation = (rear.length + front.length) * 0.5;

        let original_rear_v = rear.v_phys;
        rear.v_phys = cfg.v_min;
        rear.v_prog = cfg.v_min;
        rear.reward = 0.0;
        reset_pending_rewards(rear);
        rear.add_slip(cfg.collision_slip);

        let boost = original_rear_v * rear.length * cfg.momentum_transfer / front.length;
        front.v_phys = (front.v_phys + boost).min(MOMENTUM_CAP_FACTOR * cfg.v_max);

        front.s_phys = track.wrap_s(front.s_phys + cfg.collision_nudge);
        rear.s_phys = track.wrap_s(front.s_phys - separation);
        debug!(
            "regular collision: car {:?} rear-ended car {:?} (boost {:.1})",
            rear.id, front.id, boost
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::track::CircularTrack;
    use super::super::types::{CarId, CarKind};

    fn test_setup() -> (RaceConfig, CircularTrack, LaneController, CollisionController) {
        let config = RaceConfig::default();
        let track = CircularTrack::with_length(1000.0, 6, 3.5);
        let lanes = LaneController::new(&config);
        let collisions = CollisionController::new(&config);
        (config, track, lanes, collisions)
    }

    fn car_at(config: &RaceConfig, id: usize, s: f32, lane: usize, v: f32) -> Car {
        let mut car = Car::new(CarId(id), CarKind::Player, s, lane, config);
        car.v_phys = v;
        car.v_prog = v;
        car
    }

    #[test]
    fn no_collision_across_lanes() {
        let (config, track, lanes, collisions) = test_setup();
        let cars = vec![
            car_at(&config, 0, 100.0, 0, 20.0),
            car_at(&config, 1, 101.0, 2, 20.0),
        ];
        let records = collisions.detect_all_collisions(&cars, &lanes, &track, 0.0);
        assert!(records.is_empty());
    }

    #[test]
    fn regular_collision_detected_across_wrap_boundary() {
        let (config, track, lanes, collisions) = test_setup();
        // Rear car just before s=0, front car just after: raw subtraction
        // would see a ~998-unit gap
        let cars = vec![
            car_at(&config, 0, 999.0, 1, 30.0),
            car_at(&config, 1, 1.0, 1, 10.0),
        ];
        let records = collisions.detect_all_collisions(&cars, &lanes, &track, 0.0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, CollisionKind::Regular);
        assert_eq!(records[0].rear, 0);
        assert_eq!(records[0].front, 1);
        assert!((records[0].distance - 2.0).abs() < 1.0e-4);
    }

    #[test]
    fn classification_independent_of_array_order() {
        let (config, track, lanes, collisions) = test_setup();
        let a = car_at(&config, 0, 100.0, 1, 30.0);
        let b = car_at(&config, 1, 103.0, 1, 10.0);

        let forward = collisions.detect_all_collisions(
            &[a.clone(), b.clone()],
            &lanes,
            &track,
            0.0,
        );
        let reversed = collisions.detect_all_collisions(&[b, a], &lanes, &track, 0.0);

        assert_eq!(forward.len(), 1);
        assert_eq!(reversed.len(), 1);
        assert_eq!(forward[0].kind, reversed[0].kind);
        // Index 0 holds the rear car in the first layout, the front in the
        // second; the designated cars must match
        assert_eq!(forward[0].rear, 0);
        assert_eq!(reversed[0].rear, 1);
        assert!((forward[0].distance - reversed[0].distance).abs() < 1.0e-4);
    }

    #[test]
    fn coincident_cars_get_order_independent_designation() {
        let (config, track, lanes, collisions) = test_setup();
        let a = car_at(&config, 0, 100.0, 1, 30.0);
        let b = car_at(&config, 1, 100.0, 1, 10.0);

        let fwd_cars = vec![a.clone(), b.clone()];
        let rev_cars = vec![b, a];
        let forward = collisions.detect_all_collisions(&fwd_cars, &lanes, &track, 0.0);
        let reversed = collisions.detect_all_collisions(&rev_cars, &lanes, &track, 0.0);

        assert_eq!(forward.len(), 1);
        assert_eq!(reversed.len(), 1);
        assert_eq!(fwd_cars[forward[0].rear].id, rev_cars[reversed[0].rear].id);
        assert_eq!(fwd_cars[forward[0].front].id, rev_cars[reversed[0].front].id);
    }

    #[test]
    fn regular_resolution_transfers_momentum() {
        let mut config = RaceConfig::default();
        config.car_length = 45.0;
        let track = CircularTrack::with_length(1000.0, 6, 3.5);
        let lanes = LaneController::new(&config);
        let collisions = CollisionController::new(&config);

        let mut cars = vec![
            car_at(&config, 0, 100.0, 1, 50.0),
            car_at(&config, 1, 105.0, 1, 5.0),
        ];
        cars[0].pending_reward = 80.0;
        cars[0].reward = 40.0;

        let records = collisions.handle_all_collisions(&mut cars, &lanes, &track, 0.0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, CollisionKind::Regular);

        // Rear car clamped to the floor, rewards wiped, slip raised
        assert_eq!(cars[0].v_phys, config.v_min);
        assert_eq!(cars[0].reward, 0.0);
        assert_eq!(cars[0].pending_reward, 0.0);
        assert!(cars[0].slip_factor > 0.0);

        // Front car gains a bounded momentum boost
        assert!(cars[1].v_phys > 5.0);
        assert!(cars[1].v_phys <= 1.5 * config.v_max);

        // Positional correction: rear sits exactly at separation distance
        let gap = wrap_signed(cars[1].s_phys - cars[0].s_phys, track.length());
        assert!((gap - 45.0).abs() < 1.0e-3);
    }

    #[test]
    fn merge_into_contested_target_lane_is_cancelled() {
        let (config, track, lanes, collisions) = test_setup();
        let mut cars = vec![
            car_at(&config, 0, 100.0, 1, 25.0),
            car_at(&config, 1, 102.0, 2, 20.0),
        ];
        // Car 0 merges into lane 2, where car 1 sits
        assert!(lanes.switch_lane(&mut cars[0], &track, 1, 0.0));

        let t = config.lane_change_duration * 0.5;
        let records = collisions.handle_all_collisions(&mut cars, &lanes, &track, t);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, CollisionKind::Merge);

        // The merge was aborted back toward lane 1, with the heavier
        // penalty on the merging car
        assert_eq!(cars[0].lane_state.target_lane(), Some(1));
        assert!(cars[0].slip_factor >= config.merge_slip_major);
        assert!(cars[1].slip_factor > 0.0);
        assert!(cars[1].slip_factor < cars[0].slip_factor);
    }

    #[test]
    fn incidental_merge_contact_completes() {
        let (config, track, lanes, collisions) = test_setup();
        let mut cars = vec![
            car_at(&config, 0, 100.0, 1, 25.0),
            car_at(&config, 1, 102.0, 1, 20.0),
        ];
        // Car 0 leaves lane 1 for lane 0; contact with car 1 happens in the
        // lane being vacated, not in the target lane
        assert!(lanes.switch_lane(&mut cars[0], &track, -1, 0.0));

        let t = config.lane_change_duration * 0.25;
        let records = collisions.handle_all_collisions(&mut cars, &lanes, &track, t);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, CollisionKind::Merge);

        // Merge continues toward lane 0; both took the light penalty
        assert_eq!(cars[0].lane_state.target_lane(), Some(0));
        assert_eq!(cars[0].slip_factor, config.merge_slip_minor);
        assert_eq!(cars[1].slip_factor, config.merge_slip_minor);
    }

    #[test]
    fn tiebreaker_cancels_only_the_slower_car() {
        let (config, track, lanes, collisions) = test_setup();
        let mut cars = vec![
            car_at(&config, 0, 100.0, 0, 30.0),
            car_at(&config, 1, 400.0, 4, 10.0),
        ];
        // Both queue multi-lane changes converging on lane 2
        assert!(lanes.switch_lane(&mut cars[0], &track, 1, 0.0));
        assert!(lanes.switch_lane(&mut cars[0], &track, 1, 0.0));
        assert!(lanes.switch_lane(&mut cars[1], &track, -1, 0.0));
        assert!(lanes.switch_lane(&mut cars[1], &track, -1, 0.0));
        assert_eq!(cars[0].lane_state.target_lane(), Some(2));
        assert_eq!(cars[1].lane_state.target_lane(), Some(2));

        // Late in the transition both cars occupy a segment touching lane 2
        let t = config.lane_change_duration * 0.9;
        let records = collisions.handle_all_collisions(&mut cars, &lanes, &track, t);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, CollisionKind::Tiebreaker);

        // The slower car yields; the faster keeps its claim; no penalties
        assert_eq!(cars[1].lane_state.target_lane(), Some(4));
        assert_eq!(cars[0].lane_state.target_lane(), Some(2));
        assert_eq!(cars[0].slip_factor, 0.0);
        assert_eq!(cars[1].slip_factor, 0.0);
    }
}
