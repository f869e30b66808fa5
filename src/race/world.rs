//! The race world
//!
//! Owns the car collection, the track, and the four controllers, and runs
//! the fixed-order tick pipeline. All mutation flows through `tick` and the
//! player-input methods; the controllers themselves are stateless beyond
//! their configuration.
//!
//! Seeded construction threads a deterministic RNG through the bot layer,
//! the only source of randomness, so two worlds built with the same seed
//! and stepped identically produce bit-identical races.

use anyhow::{ensure, Context, Result};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::bot::BotController;
use super::car::Car;
use super::collision::CollisionController;
use super::config::RaceConfig;
use super::lane::LaneController;
use super::longitudinal::{self, LongitudinalController};
use super::track::{CircularTrack, TrackGeometry};
use super::types::{BotProfile, CarId, CarKind, CollisionKind, RaceStats, Vec2};

pub struct RaceWorld {
    pub cars: Vec<Car>,
    pub track: Box<dyn TrackGeometry>,
    pub config: RaceConfig,
    pub time: f32,
    pub stats: RaceStats,
    longitudinal: LongitudinalController,
    lanes: LaneController,
    collisions: CollisionController,
    bots: BotController,
    rng: Option<StdRng>,
    next_car_id: usize,
}

impl RaceWorld {
    /// Build a world with OS-seeded bot randomness
    pub fn new(track: Box<dyn TrackGeometry>, config: RaceConfig) -> Result<Self> {
        Self::build(track, config, None)
    }

    /// Build a fully deterministic world from a seed
    pub fn new_with_seed(
        track: Box<dyn TrackGeometry>,
        config: RaceConfig,
        seed: u64,
    ) -> Result<Self> {
        Self::build(track, config, Some(StdRng::seed_from_u64(seed)))
    }

    fn build(
        track: Box<dyn TrackGeometry>,
        config: RaceConfig,
        rng: Option<StdRng>,
    ) -> Result<Self> {
        config.validate().context("invalid race configuration")?;
        ensure!(track.num_lanes() > 0, "track must have at least one lane");
        Ok(Self {
            cars: Vec::new(),
            longitudinal: LongitudinalController::new(&config),
            lanes: LaneController::new(&config),
            collisions: CollisionController::new(&config),
            bots: BotController::new(&config),
            config,
            track,
            time: 0.0,
            stats: RaceStats::default(),
            rng,
            next_car_id: 0,
        })
    }

    /// Convenience constructor for tests and the headless runner: a circular
    /// track filled with bots spread evenly around the loop
    pub fn create_test_race(
        num_bots: usize,
        num_lanes: usize,
        track_length: f32,
        seed: u64,
    ) -> Result<Self> {
        let track = CircularTrack::with_length(track_length, num_lanes, 3.5);
        let mut world = Self::new_with_seed(Box::new(track), RaceConfig::default(), seed)?;
        for i in 0..num_bots {
            let s = track_length * i as f32 / num_bots.max(1) as f32;
            world.spawn_bot(s, i % num_lanes, 0.85)?;
        }
        Ok(world)
    }

    pub fn spawn_player(&mut self, s: f32, lane: usize) -> Result<CarId> {
        self.spawn(CarKind::Player, s, lane)
    }

    pub fn spawn_bot(&mut self, s: f32, lane: usize, accuracy: f32) -> Result<CarId> {
        let profile = BotProfile {
            accuracy,
            answer_speed_mean: self.config.answer_speed_mean,
            answer_speed_std_dev: self.config.answer_speed_std_dev,
            safety_time_threshold: self.config.safety_time_threshold,
            next_answer_time: self.time,
        };
        self.spawn(CarKind::Bot(profile), s, lane)
    }

    fn spawn(&mut self, kind: CarKind, s: f32, lane: usize) -> Result<CarId> {
        ensure!(
            lane < self.track.num_lanes(),
            "spawn lane {} out of range (track has {} lanes)",
            lane,
            self.track.num_lanes()
        );
        let id = CarId(self.next_car_id);
        self.next_car_id += 1;
        let s = self.track.wrap_s(s);
        let mut car = Car::new(id, kind, s, lane, &self.config);
        car.lateral = self.track.lane_offset(lane);
        self.cars.push(car);
        Ok(id)
    }

    /// Advance the whole world one fixed timestep
    ///
    /// Pipeline order is load-bearing: bot decisions, then lateral
    /// interpolation, then longitudinal integration, then collision
    /// resolution against the freshly integrated positions.
    pub fn tick(&mut self, dt: f32) {
        match self.rng.as_mut() {
            Some(rng) => self.bots.update_bots(
                &mut self.cars,
                &self.lanes,
                self.track.as_ref(),
                rng,
                self.time,
                &mut self.stats,
            ),
            None => {
                let mut rng = rand::rng();
                self.bots.update_bots(
                    &mut self.cars,
                    &self.lanes,
                    self.track.as_ref(),
                    &mut rng,
                    self.time,
                    &mut self.stats,
                );
            }
        }

        self.lanes
            .update_lane_changes(&mut self.cars, self.track.as_ref(), self.time);
        self.longitudinal
            .step(&mut self.cars, self.track.as_ref(), dt);

        let records = self.collisions.handle_all_collisions(
            &mut self.cars,
            &self.lanes,
            self.track.as_ref(),
            self.time,
        );
        for record in &records {
            match record.kind {
                CollisionKind::Regular => self.stats.regular_collisions += 1,
                CollisionKind::Merge => self.stats.merge_collisions += 1,
                CollisionKind::Tiebreaker => {
                    self.stats.tiebreakers += 1;
                    self.stats.lane_changes_cancelled += 1;
                }
            }
        }

        self.time += dt;
    }

    /// Player input: request a one-lane change in `direction` (-1 or +1)
    pub fn switch_lane(&mut self, id: CarId, direction: i32) -> Result<bool> {
        let time = self.time;
        let lanes = &self.lanes;
        let track = self.track.as_ref();
        let car = self
            .cars
            .iter_mut()
            .find(|c| c.id == id)
            .with_context(|| format!("no car with id {:?}", id))?;
        let started = lanes.switch_lane(car, track, direction, time);
        if started {
            self.stats.lane_changes_started += 1;
        } else {
            self.stats.lane_changes_rejected += 1;
        }
        Ok(started)
    }

    /// Queue an arbitrary reward for a car's next integration step
    pub fn queue_reward(&mut self, id: CarId, magnitude: f32) -> Result<()> {
        let car = self.car_mut(id)?;
        longitudinal::queue_reward(car, magnitude);
        Ok(())
    }

    /// Apply a slip penalty to a car
    pub fn apply_penalty(&mut self, id: CarId, slip_magnitude: f32) -> Result<()> {
        let car = self.car_mut(id)?;
        longitudinal::apply_penalty(car, slip_magnitude);
        Ok(())
    }

    /// Drop a car's queued-but-unconsumed rewards
    pub fn reset_pending_rewards(&mut self, id: CarId) -> Result<()> {
        let car = self.car_mut(id)?;
        longitudinal::reset_pending_rewards(car);
        Ok(())
    }

    /// Player input: a correctly answered question
    pub fn answer_correct(&mut self, id: CarId) -> Result<()> {
        let reward = self.config.answer_reward;
        let car = self.car_mut(id)?;
        longitudinal::queue_reward(car, reward);
        self.stats.questions_correct += 1;
        Ok(())
    }

    /// Player input: an incorrectly answered question
    pub fn answer_incorrect(&mut self, id: CarId) -> Result<()> {
        let slip = self.config.answer_penalty_slip;
        let car = self.car_mut(id)?;
        longitudinal::apply_penalty(car, slip);
        self.stats.questions_incorrect += 1;
        Ok(())
    }

    pub fn car(&self, id: CarId) -> Option<&Car> {
        self.cars.iter().find(|c| c.id == id)
    }

    fn car_mut(&mut self, id: CarId) -> Result<&mut Car> {
        self.cars
            .iter_mut()
            .find(|c| c.id == id)
            .with_context(|| format!("no car with id {:?}", id))
    }

    /// World-space position of a car, including its lateral offset
    pub fn world_position(&self, car: &Car) -> Vec2 {
        let center = self.track.pos_at(car.s_phys);
        let normal = self.track.normal_at(car.s_phys);
        Vec2::new(
            center.x + normal.x * car.lateral,
            center.y + normal.y * car.lateral,
        )
    }

    /// Cars ordered by race position: laps first, then distance into the lap
    pub fn standings(&self) -> Vec<&Car> {
        let mut order: Vec<&Car> = self.cars.iter().collect();
        order.sort_by_key(|c| std::cmp::Reverse((c.laps, OrderedFloat(c.s_phys))));
        order
    }

    /// Print a one-line-per-car standings summary plus the accumulated
    /// counters
    pub fn print_summary(&self) {
        println!("t={:.1}s, {} cars", self.time, self.cars.len());
        for (place, car) in self.standings().iter().enumerate() {
            println!(
                "  P{} car {:?}: lap {} s={:.1} lane {} v={:.1} slip={:.2}{}",
                place + 1,
                car.id,
                car.laps,
                car.s_phys,
                car.lane_index,
                car.v_phys,
                car.slip_factor,
                if car.pit_required { " [pit]" } else { "" }
            );
        }
        println!(
            "  collisions: {} regular, {} merge, {} tiebreaker; lane changes: {} started, {} rejected, {} cancelled; answers: {} correct, {} incorrect",
            self.stats.regular_collisions,
            self.stats.merge_collisions,
            self.stats.tiebreakers,
            self.stats.lane_changes_started,
            self.stats.lane_changes_rejected,
            self.stats.lane_changes_cancelled,
            self.stats.questions_correct,
            self.stats.questions_incorrect,
        );
    }
}
