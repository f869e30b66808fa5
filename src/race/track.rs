//! Track geometry interface
//!
//! The simulation consumes an arc-length-parameterized closed curve; it never
//! builds one. `TrackGeometry` is the seam a real track service (smoothed,
//! resampled centerline) plugs into, and `CircularTrack` is the simple
//! implementation the headless runner and tests use.

use std::f32::consts::TAU;

use super::types::Vec2;

/// An arc-length-parameterized closed-loop track with parallel lanes
pub trait TrackGeometry {
    /// Total arc length of the loop
    fn length(&self) -> f32;

    /// Wrap an arc-length coordinate into `[0, length)`
    fn wrap_s(&self, s: f32) -> f32 {
        s.rem_euclid(self.length())
    }

    /// World position of the centerline at `s`
    fn pos_at(&self, s: f32) -> Vec2;

    /// Unit tangent of the centerline at `s`
    fn tangent_at(&self, s: f32) -> Vec2;

    /// Unit normal of the centerline at `s` (90° left of the tangent)
    fn normal_at(&self, s: f32) -> Vec2;

    /// Signed curvature of the centerline at `s`
    fn curvature_at(&self, s: f32) -> f32;

    /// Number of parallel lanes
    fn num_lanes(&self) -> usize;

    /// Lateral offset of a lane centerline from the track centerline
    fn lane_offset(&self, lane: usize) -> f32;
}

/// Shortest signed distance from `b` to `a` on a loop of length `l`
///
/// Result lies in `(-l/2, l/2]`; never use raw subtraction for longitudinal
/// comparisons or the s=0 boundary misorders cars.
pub fn wrap_signed(delta: f32, l: f32) -> f32 {
    let d = delta.rem_euclid(l);
    if d > l * 0.5 {
        d - l
    } else {
        d
    }
}

/// A circular track: constant curvature, evenly spaced lanes
#[derive(Debug, Clone)]
pub struct CircularTrack {
    radius: f32,
    num_lanes: usize,
    lane_width: f32,
}

impl CircularTrack {
    pub fn new(radius: f32, num_lanes: usize, lane_width: f32) -> Self {
        Self {
            radius,
            num_lanes,
            lane_width,
        }
    }

    /// Build a circle whose centerline has the given arc length
    pub fn with_length(length: f32, num_lanes: usize, lane_width: f32) -> Self {
        Self::new(length / TAU, num_lanes, lane_width)
    }

    fn angle_at(&self, s: f32) -> f32 {
        self.wrap_s(s) / self.radius
    }
}

impl TrackGeometry for CircularTrack {
    fn length(&self) -> f32 {
        TAU * self.radius
    }

    fn pos_at(&self, s: f32) -> Vec2 {
        let a = self.angle_at(s);
        Vec2::new(self.radius * a.cos(), self.radius * a.sin())
    }

    fn tangent_at(&self, s: f32) -> Vec2 {
        let a = self.angle_at(s);
        Vec2::new(-a.sin(), a.cos())
    }

    fn normal_at(&self, s: f32) -> Vec2 {
        let a = self.angle_at(s);
        Vec2::new(-a.cos(), -a.sin())
    }

    fn curvature_at(&self, _s: f32) -> f32 {
        1.0 / self.radius
    }

    fn num_lanes(&self) -> usize {
        self.num_lanes
    }

    fn lane_offset(&self, lane: usize) -> f32 {
        let center = (self.num_lanes as f32 - 1.0) * 0.5;
        (lane as f32 - center) * self.lane_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_s_stays_in_range() {
        let track = CircularTrack::with_length(1000.0, 4, 3.5);
        for s in [-1.0, 0.0, 999.9, 1000.0, 2500.0, -4321.0] {
            let w = track.wrap_s(s);
            assert!((0.0..track.length()).contains(&w), "wrap_s({}) = {}", s, w);
        }
    }

    #[test]
    fn wrap_signed_shortest_path() {
        let l = 1000.0;
        assert_eq!(wrap_signed(10.0, l), 10.0);
        assert_eq!(wrap_signed(-10.0, l), -10.0);
        // Crossing the s=0 boundary picks the short way around
        assert_eq!(wrap_signed(990.0, l), -10.0);
        assert_eq!(wrap_signed(-990.0, l), 10.0);
        assert_eq!(wrap_signed(500.0, l), 500.0);
    }

    #[test]
    fn circular_track_tangent_is_unit() {
        let track = CircularTrack::new(150.0, 4, 3.5);
        for s in [0.0, 100.0, 400.0, 900.0] {
            let t = track.tangent_at(s);
            assert!((t.length() - 1.0).abs() < 1.0e-5);
        }
    }

    #[test]
    fn lane_offsets_are_centered() {
        let track = CircularTrack::new(150.0, 4, 3.5);
        let sum: f32 = (0..4).map(|l| track.lane_offset(l)).sum();
        assert!(sum.abs() < 1.0e-5);
        assert!(track.lane_offset(0) < track.lane_offset(3));
    }
}
