//! Firefly particles drifting inside a 10 unit cube around the origin.

use glam::Vec3;
use rand::Rng;

use crate::draw2d::Color;

/// Half the edge length of the cube the fireflies live in.
pub const BOUNDS: f32 = 5.0;

/// Fraction of the random step applied per frame.
const SMOOTHING: f32 = 0.1;

/// Wrap a coordinate into `[-BOUNDS, BOUNDS)`.
///
/// A value leaving one face re-enters through the opposite one, whichever
/// direction it left in.
pub fn wrap_coordinate(v: f32) -> f32 {
    let span = 2.0 * BOUNDS;
    let mut r = (v + BOUNDS).rem_euclid(span);
    // rem_euclid can round up to exactly `span` for tiny negative inputs
    if r >= span {
        r = 0.0;
    }
    r - BOUNDS
}

/// Fixed-size set of fireflies.
///
/// Positions change every frame; speeds and colors are fixed at creation.
#[derive(Clone, Debug)]
pub struct FireflySwarm {
    positions: Vec<Vec3>,
    speeds: Vec<f32>,
    colors: Vec<Color>,
    dirty: bool,
}

impl FireflySwarm {
    /// Scatter `count` fireflies: x in [-5, 5), y and z in [-2.5, 2.5).
    pub fn new(count: usize, rng: &mut impl Rng) -> Self {
        let mut positions = Vec::with_capacity(count);
        let mut speeds = Vec::with_capacity(count);
        let mut colors = Vec::with_capacity(count);

        for _ in 0..count {
            positions.push(Vec3::new(
                rng.gen_range(-BOUNDS..BOUNDS),
                rng.gen_range(-BOUNDS / 2.0..BOUNDS / 2.0),
                rng.gen_range(-BOUNDS / 2.0..BOUNDS / 2.0),
            ));
            speeds.push(0.01 + rng.gen_range(0.0..0.04));
            colors.push(Color::rgb(
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
            ));
        }

        Self {
            positions,
            speeds,
            colors,
            dirty: true,
        }
    }

    /// Nudge every firefly by a random step and wrap it back into bounds.
    pub fn update(&mut self, rng: &mut impl Rng) {
        for (position, &speed) in self.positions.iter_mut().zip(&self.speeds) {
            let step = Vec3::new(
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
            );
            let moved = position.lerp(*position + step * speed, SMOOTHING);
            *position = Vec3::new(
                wrap_coordinate(moved.x),
                wrap_coordinate(moved.y),
                wrap_coordinate(moved.z),
            );
        }
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn speeds(&self) -> &[f32] {
        &self.speeds
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Whether positions changed since the renderer last uploaded them.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning its previous value.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn wrap_is_identity_inside_bounds() {
        for v in [-5.0, -2.5, 0.0, 3.3, 4.999] {
            assert_eq!(wrap_coordinate(v), v);
        }
    }

    #[test]
    fn wrap_reenters_from_opposite_face() {
        assert!((wrap_coordinate(5.2) - -4.8).abs() < 1e-5);
        assert!((wrap_coordinate(-5.2) - 4.8).abs() < 1e-5);
        assert_eq!(wrap_coordinate(5.0), -5.0);
        assert!(wrap_coordinate(-1e-9 - 5.0) < 5.0);
    }

    #[test]
    fn initial_layout_respects_ranges() {
        let mut rng = StdRng::seed_from_u64(1);
        let swarm = FireflySwarm::new(500, &mut rng);
        assert_eq!(swarm.len(), 500);
        for (p, s) in swarm.positions().iter().zip(swarm.speeds()) {
            assert!((-5.0..5.0).contains(&p.x));
            assert!((-2.5..2.5).contains(&p.y));
            assert!((-2.5..2.5).contains(&p.z));
            assert!((0.01..0.05).contains(s));
        }
    }

    #[test]
    fn update_keeps_speeds_and_colors() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut swarm = FireflySwarm::new(10, &mut rng);
        let speeds = swarm.speeds().to_vec();
        let colors = swarm.colors().to_vec();
        for _ in 0..50 {
            swarm.update(&mut rng);
        }
        assert_eq!(swarm.speeds(), speeds.as_slice());
        assert_eq!(swarm.colors(), colors.as_slice());
    }

    #[test]
    fn update_marks_dirty() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut swarm = FireflySwarm::new(3, &mut rng);
        assert!(swarm.take_dirty());
        assert!(!swarm.is_dirty());
        swarm.update(&mut rng);
        assert!(swarm.take_dirty());
    }

    #[test]
    fn empty_swarm_updates() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut swarm = FireflySwarm::new(0, &mut rng);
        swarm.update(&mut rng);
        assert!(swarm.is_empty());
    }
}
