//! Straight paths through a detector model.
//!
//! A path is split at every surface crossing into segments that each lie in
//! a single sector, so column depths reduce to closed-form density integrals.

use super::{DetectorModel, Sector, Surface};
use crate::dataclasses::ParticleType;
use crate::types::Vec3;

/// Part of a ray lying in one sector, as ray parameters [start, end]
#[derive(Debug, Clone, Copy)]
struct Segment<'a> {
    start: f64,
    end: f64,
    sector: &'a Sector,
}

/// Split the ray `origin + t·dir`, t ∈ [0, max_distance], at surface crossings
fn segments<'a>(detector: &'a DetectorModel, origin: &Vec3, dir: &Vec3, max_distance: f64) -> Vec<Segment<'a>> {
    let mut ts: Vec<f64> = detector
        .surfaces()
        .iter()
        .flat_map(|s| s.crossings(origin, dir))
        .filter(|&t| t > 0.0 && t < max_distance)
        .collect();
    ts.push(0.0);
    ts.push(max_distance);
    ts.sort_by(|a, b| a.total_cmp(b));
    ts.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    ts.windows(2)
        .filter(|w| w[1] - w[0] > 1e-12)
        .filter_map(|w| {
            let mid = *origin + *dir * (0.5 * (w[0] + w[1]));
            detector.find_sector(&mid).map(|sector| Segment {
                start: w[0],
                end: w[1],
                sector,
            })
        })
        .collect()
}

/// Weighted column depth ∫ w(sector)·ρ dt along the ray
fn depth_along<F>(detector: &DetectorModel, origin: &Vec3, dir: &Vec3, max_distance: f64, weight: F) -> f64
where
    F: Fn(&Sector) -> f64,
{
    segments(detector, origin, dir, max_distance)
        .iter()
        .map(|seg| {
            let start = *origin + *dir * seg.start;
            weight(seg.sector) * seg.sector.density.integral(&start, dir, seg.end - seg.start)
        })
        .sum()
}

/// Distance along the ray at which the weighted depth reaches `depth`,
/// capped at `max_distance`
fn distance_for_depth<F>(
    detector: &DetectorModel,
    origin: &Vec3,
    dir: &Vec3,
    max_distance: f64,
    depth: f64,
    weight: F,
) -> f64
where
    F: Fn(&Sector) -> f64,
{
    let mut remaining = depth;
    for seg in segments(detector, origin, dir, max_distance) {
        let w = weight(seg.sector);
        if w <= 0.0 {
            continue;
        }
        let start = *origin + *dir * seg.start;
        let length = seg.end - seg.start;
        let seg_depth = w * seg.sector.density.integral(&start, dir, length);
        if remaining <= seg_depth {
            let dt = seg.sector.density.inverse_integral(&start, dir, remaining / w);
            return seg.start + dt.min(length);
        }
        remaining -= seg_depth;
    }
    max_distance
}

/// Ray parameter interval inside the world sphere
fn world_interval(detector: &DetectorModel, origin: &Vec3, dir: &Vec3) -> Option<(f64, f64)> {
    let world = Surface::Sphere {
        center: detector.world_center,
        radius: detector.world_radius,
    };
    match world.crossings(origin, dir).as_slice() {
        [t0, t1] => Some((t0.min(*t1), t0.max(*t1))),
        _ => None,
    }
}

/// Segment of a straight line through a detector model
#[derive(Debug, Clone)]
pub struct Path<'a> {
    detector: &'a DetectorModel,
    first_point: Vec3,
    direction: Vec3,
    distance: f64,
}

impl<'a> Path<'a> {
    pub fn new(detector: &'a DetectorModel, first_point: Vec3, direction: Vec3, distance: f64) -> Self {
        Self {
            detector,
            first_point,
            direction: direction.normalize(),
            distance: distance.max(0.0),
        }
    }

    /// Path from `a` to `b`
    pub fn between(detector: &'a DetectorModel, a: Vec3, b: Vec3) -> Self {
        Self::new(detector, a, b - a, a.distance(&b))
    }

    pub fn first_point(&self) -> Vec3 {
        self.first_point
    }

    pub fn last_point(&self) -> Vec3 {
        self.first_point + self.direction * self.distance
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Point at distance `t` from the start
    pub fn point_at(&self, t: f64) -> Vec3 {
        self.first_point + self.direction * t
    }

    /// Total column depth (kg/m²)
    pub fn column_depth(&self) -> f64 {
        depth_along(self.detector, &self.first_point, &self.direction, self.distance, |_| 1.0)
    }

    /// Column depth from the start up to distance `t`
    pub fn column_depth_to(&self, t: f64) -> f64 {
        depth_along(self.detector, &self.first_point, &self.direction, t.clamp(0.0, self.distance), |_| 1.0)
    }

    /// Expected number of interactions Σ_t σ_t ∫ n_t dl (dimensionless)
    pub fn interaction_depth(&self, targets: &[ParticleType], cross_sections: &[f64]) -> f64 {
        let detector = self.detector;
        depth_along(detector, &self.first_point, &self.direction, self.distance, |sector| {
            detector.mass_attenuation(sector, targets, cross_sections)
        })
    }

    /// Distance from the start at which the column depth reaches `depth`
    pub fn distance_for_column_depth(&self, depth: f64) -> f64 {
        distance_for_depth(self.detector, &self.first_point, &self.direction, self.distance, depth, |_| 1.0)
    }

    /// Distance from the start at which the interaction depth reaches `depth`
    pub fn distance_for_interaction_depth(&self, depth: f64, targets: &[ParticleType], cross_sections: &[f64]) -> f64 {
        let detector = self.detector;
        distance_for_depth(detector, &self.first_point, &self.direction, self.distance, depth, |sector| {
            detector.mass_attenuation(sector, targets, cross_sections)
        })
    }

    /// Move the start backward until `depth` of matter has been added, or
    /// the world boundary is reached
    pub fn extend_from_start_by_column_depth(&mut self, depth: f64) {
        let back = -self.direction;
        let limit = match world_interval(self.detector, &self.first_point, &back) {
            Some((_, t_exit)) => t_exit.max(0.0),
            None => 0.0,
        };
        let d = distance_for_depth(self.detector, &self.first_point, &back, limit, depth, |_| 1.0);
        self.first_point = self.first_point + back * d;
        self.distance += d;
    }

    /// Move the end forward until `depth` of matter has been added, or the
    /// world boundary is reached
    pub fn extend_from_end_by_column_depth(&mut self, depth: f64) {
        let end = self.last_point();
        let limit = match world_interval(self.detector, &end, &self.direction) {
            Some((_, t_exit)) => t_exit.max(0.0),
            None => 0.0,
        };
        let d = distance_for_depth(self.detector, &end, &self.direction, limit, depth, |_| 1.0);
        self.distance += d;
    }

    /// Restrict the path to the part inside the world sphere
    pub fn clip_to_outer_bounds(&mut self) {
        match world_interval(self.detector, &self.first_point, &self.direction) {
            Some((t0, t1)) => {
                let start = t0.max(0.0);
                let end = t1.min(self.distance);
                if end > start {
                    self.first_point = self.point_at(start);
                    self.distance = end - start;
                } else {
                    self.distance = 0.0;
                }
            }
            None => self.distance = 0.0,
        }
    }

    /// Signed distance of the projection of `point` from the start
    pub fn distance_from_start(&self, point: &Vec3) -> f64 {
        (*point - self.first_point).dot(&self.direction)
    }

    /// Whether `point` lies on the path between its ends
    pub fn is_within_bounds(&self, point: &Vec3) -> bool {
        let t = self.distance_from_start(point);
        let tol = 1e-9 * self.distance.max(1.0);
        if t < -tol || t > self.distance + tol {
            return false;
        }
        point.distance(&self.point_at(t)) <= 1e-6 * self.distance.max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn rel(a: f64, b: f64) -> f64 {
        (a - b).abs() / b.abs().max(1e-300)
    }

    #[test]
    fn test_column_depth_through_detector() {
        let model = DetectorModel::dune_fd();
        // Along x through the cavern: 2 m of air either side of 14.5 m of argon
        let path = Path::between(&model, Vec3::new(-10.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0));

        let expected = 14.5 * 1395.0 + 5.5 * 1.205;
        assert!(rel(path.column_depth(), expected) < 1e-9, "got {}", path.column_depth());
    }

    #[test]
    fn test_distance_for_column_depth_inverts() {
        let model = DetectorModel::dune_fd();
        let path = Path::between(&model, Vec3::new(-200.0, 0.0, 0.0), Vec3::new(200.0, 0.0, 0.0));

        for &t in &[5.0, 50.0, 195.0, 200.0, 380.0] {
            let depth = path.column_depth_to(t);
            let back = path.distance_for_column_depth(depth);
            assert!((back - t).abs() < 1e-6, "t {} back {}", t, back);
        }
    }

    #[test]
    fn test_interaction_depth_scales_with_cross_section() {
        let model = DetectorModel::dune_fd();
        let path = Path::between(&model, Vec3::new(0.0, 0.0, -20.0), Vec3::new(0.0, 0.0, 20.0));

        let targets = [ParticleType::Nucleon];
        let d1 = path.interaction_depth(&targets, &[1e-38]);
        let d2 = path.interaction_depth(&targets, &[2e-38]);
        assert!(d1 > 0.0);
        assert!(rel(d2, 2.0 * d1) < 1e-12);

        // 40 m of argon
        let expected = 1e-38 * 40.0 * 1395.0 / AMU_KG;
        assert!(rel(d1, expected) < 1e-9);

        let half = path.distance_for_interaction_depth(0.5 * d1, &targets, &[1e-38]);
        assert!((half - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_extend_from_start() {
        let model = DetectorModel::dune_fd();
        let mut path = Path::new(&model, Vec3::new(0.0, 0.0, -100.0), Vec3::unit_z(), 10.0);

        // 100 m of rock below the start point
        path.extend_from_start_by_column_depth(100.0 * 2650.0);
        assert!((path.first_point().z + 200.0).abs() < 1e-6);
        assert!((path.distance() - 110.0).abs() < 1e-6);

        // More matter than exists stops at the world boundary
        path.extend_from_start_by_column_depth(1e12);
        assert!((path.first_point().mag() - model.world_radius).abs() < 1e-6);
    }

    #[test]
    fn test_clip_to_outer_bounds() {
        let model = DetectorModel::dune_fd();
        let mut path = Path::new(&model, Vec3::new(-20_000.0, 0.0, 0.0), Vec3::unit_x(), 40_000.0);
        path.clip_to_outer_bounds();

        assert!((path.first_point().x + model.world_radius).abs() < 1e-6);
        assert!((path.distance() - 2.0 * model.world_radius).abs() < 1e-6);

        let mut outside = Path::new(&model, Vec3::new(0.0, 20_000.0, 0.0), Vec3::unit_x(), 100.0);
        outside.clip_to_outer_bounds();
        assert_eq!(outside.distance(), 0.0);
    }

    #[test]
    fn test_within_bounds() {
        let model = DetectorModel::dune_fd();
        let path = Path::new(&model, Vec3::zero(), Vec3::unit_x(), 10.0);

        assert!(path.is_within_bounds(&Vec3::new(5.0, 0.0, 0.0)));
        assert!(!path.is_within_bounds(&Vec3::new(11.0, 0.0, 0.0)));
        assert!(!path.is_within_bounds(&Vec3::new(5.0, 1.0, 0.0)));
        assert_eq!(path.distance_from_start(&Vec3::new(3.0, 7.0, 0.0)), 3.0);
    }
}
