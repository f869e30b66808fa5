//! Core types for the race simulation
//!
//! Standalone types shared across the controllers.

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CarId(pub usize);

/// A 2D point/vector in world units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Signed angle from this vector to another, in radians
    pub fn signed_angle_to(&self, other: &Vec2) -> f32 {
        let cross = self.x * other.y - self.y * other.x;
        let dot = self.x * other.x + self.y * other.y;
        cross.atan2(dot)
    }
}

/// Parameters for a bot driver, held in the `CarKind::Bot` variant
///
/// The answer timer fields drive the stochastic question-answering loop;
/// the safety threshold gates lane-change decisions.
#[derive(Debug, Clone)]
pub struct BotProfile {
    /// Probability of answering a question correctly (0.0-1.0)
    pub accuracy: f32,
    /// Mean of the gaussian inter-answer interval in seconds
    pub answer_speed_mean: f32,
    /// Standard deviation of the inter-answer interval
    pub answer_speed_std_dev: f32,
    /// Minimum time-to-collision the bot tolerates before seeking a lane change
    pub safety_time_threshold: f32,
    /// Game time at which the bot answers its next question
    pub next_answer_time: f32,
}

/// Distinguishes the player's car from bot cars
///
/// Bot-only state lives in the variant payload instead of a parallel table,
/// so "is this car a bot" dispatch stays a simple match.
#[derive(Debug, Clone)]
pub enum CarKind {
    Player,
    Bot(BotProfile),
}

impl CarKind {
    pub fn is_bot(&self) -> bool {
        matches!(self, CarKind::Bot(_))
    }
}

/// Lane-change state for a car
///
/// Reified as a tagged union so illegal combinations (a target lane with no
/// start time, for example) are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneState {
    /// Sitting on a lane centerline, not transitioning
    Stable,
    /// Interpolating toward `target_lane`
    Transitioning {
        target_lane: usize,
        /// Game time the interpolation started
        start_time: f32,
        /// Lateral offset captured at the start (world units)
        start_offset: f32,
        /// Lateral velocity captured at the start, blended out over the ease
        start_velocity: f32,
    },
}

impl LaneState {
    pub fn target_lane(&self) -> Option<usize> {
        match self {
            LaneState::Stable => None,
            LaneState::Transitioning { target_lane, .. } => Some(*target_lane),
        }
    }
}

/// The pair of lane indices a car instantaneously occupies
///
/// Derived fresh from lane-change progress every query; never stored, since
/// it changes continuously during a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveLanes {
    pub first: usize,
    pub second: Option<usize>,
}

impl EffectiveLanes {
    pub fn single(lane: usize) -> Self {
        Self {
            first: lane,
            second: None,
        }
    }

    pub fn pair(a: usize, b: usize) -> Self {
        Self {
            first: a,
            second: Some(b),
        }
    }

    pub fn contains(&self, lane: usize) -> bool {
        self.first == lane || self.second == Some(lane)
    }

    pub fn intersects(&self, other: &EffectiveLanes) -> bool {
        other.contains(self.first) || self.second.is_some_and(|l| other.contains(l))
    }
}

/// Classification of a detected collision pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    /// Two cars merging into the same target lane from different lanes,
    /// not yet overlapping; resolved by yielding, not as a crash
    Tiebreaker,
    /// Longitudinal overlap with at least one car mid-lane-change
    Merge,
    /// Longitudinal overlap with neither car lane-changing
    Regular,
}

/// An ephemeral record for one colliding pair, recomputed every tick
#[derive(Debug, Clone, Copy)]
pub struct CollisionRecord {
    /// Index of the rear car in the shared car collection
    pub rear: usize,
    /// Index of the front car
    pub front: usize,
    pub kind: CollisionKind,
    /// Wrapped longitudinal distance between the two cars
    pub distance: f32,
}

/// Counters accumulated over a race for the summary output
#[derive(Debug, Clone, Default)]
pub struct RaceStats {
    pub regular_collisions: usize,
    pub merge_collisions: usize,
    pub tiebreakers: usize,
    pub lane_changes_started: usize,
    pub lane_changes_rejected: usize,
    pub lane_changes_cancelled: usize,
    pub questions_correct: usize,
    pub questions_incorrect: usize,
}
