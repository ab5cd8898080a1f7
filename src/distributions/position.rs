//! Interaction vertex distributions.
//!
//! The forced-interaction samplers (column depth, point source) choose a
//! vertex along the primary's line of flight with probability proportional
//! to the local interaction density attenuated by the interactions already
//! traversed. They report the probability that the primary interacts at all
//! along the sampled path, which enters the event weight.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::SamplingContext;
use crate::constants::*;
use crate::dataclasses::{InteractionRecord, ParticleType};
use crate::detector::{Path, Surface};
use crate::error::{InjectorError, InjectorResult};
use crate::stochastic::RandomGenerator;
use crate::types::Vec3;

// ============================================================================
// DEPTH FUNCTIONS
// ============================================================================

/// Column depth (kg/m²) of matter to add in front of the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DepthFunction {
    /// Range of the charged lepton the primary produces
    LeptonDepth,
    ConstantDepth { depth: f64 },
}

impl DepthFunction {
    pub fn depth(&self, primary: ParticleType, energy: f64) -> f64 {
        match self {
            DepthFunction::LeptonDepth => {
                // Muon range from continuous and stochastic losses, in m.w.e.
                let mut range = (1.0 + energy * MU_RANGE_BETA / MU_RANGE_ALPHA).ln() / MU_RANGE_BETA;
                if primary.is_tau_flavored() {
                    // Boosted tau decay length, counted as water
                    range += energy / M_TAU * TAU_DECAY_LENGTH;
                }
                range.min(MAX_LEPTON_DEPTH_MWE) * MWE_TO_KG_M2
            }
            DepthFunction::ConstantDepth { depth } => *depth,
        }
    }
}

// ============================================================================
// POSITION DISTRIBUTIONS
// ============================================================================

/// Outcome of a vertex draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    /// Start of the injection path
    pub initial_position: Vec3,
    pub vertex: Vec3,
    /// Probability that the primary interacts anywhere along the path
    pub interaction_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum PositionDistribution {
    /// Forced interaction along a line crossing a disk around the detector
    /// origin, extended upstream by the depth function
    ColumnDepth {
        radius: f64,
        endcap_length: f64,
        depth_function: DepthFunction,
        #[serde(default)]
        target_types: Vec<ParticleType>,
    },
    /// Uniform in a z-aligned cylinder
    Cylinder { radius: f64, height: f64, center: Vec3 },
    /// Forced interaction along the ray leaving `origin`
    PointSource {
        origin: Vec3,
        max_distance: f64,
        #[serde(default)]
        target_types: Vec<ParticleType>,
    },
}

impl PositionDistribution {
    pub fn validate(&self) -> InjectorResult<()> {
        let positive = |name: &str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(InjectorError::configuration(format!("{} must be positive, got {}", name, v)))
            }
        };
        match self {
            PositionDistribution::ColumnDepth { radius, endcap_length, depth_function, .. } => {
                positive("radius", *radius)?;
                positive("endcap_length", *endcap_length)?;
                if let DepthFunction::ConstantDepth { depth } = depth_function {
                    if !(*depth >= 0.0) {
                        return Err(InjectorError::configuration("constant depth must be non-negative"));
                    }
                }
                Ok(())
            }
            PositionDistribution::Cylinder { radius, height, .. } => {
                positive("radius", *radius)?;
                positive("height", *height)
            }
            PositionDistribution::PointSource { max_distance, .. } => positive("max_distance", *max_distance),
        }
    }

    /// Targets the sampler forces interactions on (empty for uniform volumes)
    pub fn target_types(&self) -> &[ParticleType] {
        match self {
            PositionDistribution::ColumnDepth { target_types, .. }
            | PositionDistribution::PointSource { target_types, .. } => target_types,
            PositionDistribution::Cylinder { .. } => &[],
        }
    }

    /// Fill empty target sets with `targets`
    pub fn with_default_targets(mut self, targets: &[ParticleType]) -> Self {
        match &mut self {
            PositionDistribution::ColumnDepth { target_types, .. }
            | PositionDistribution::PointSource { target_types, .. } => {
                if target_types.is_empty() {
                    *target_types = targets.to_vec();
                }
            }
            PositionDistribution::Cylinder { .. } => {}
        }
        self
    }

    /// The path a forced-interaction sampler uses for this record
    fn injection_path<'a>(&self, ctx: &SamplingContext<'a>, record: &InteractionRecord, through: Option<Vec3>) -> Option<Path<'a>> {
        let dir = record.primary_direction();
        match self {
            PositionDistribution::ColumnDepth { radius, endcap_length, depth_function, .. } => {
                let pca = match through {
                    // Closest approach to the detector origin of the line through the vertex
                    Some(v) => v - dir * v.dot(&dir),
                    None => return None,
                };
                if pca.mag() > *radius {
                    return None;
                }
                let mut path = Self::column_depth_path(ctx, pca, dir, *endcap_length);
                path.extend_from_start_by_column_depth(
                    depth_function.depth(record.signature.primary_type, record.primary_energy()),
                );
                path.clip_to_outer_bounds();
                Some(path)
            }
            PositionDistribution::PointSource { origin, max_distance, .. } => {
                let mut path = Path::new(ctx.detector, *origin, dir, *max_distance);
                path.clip_to_outer_bounds();
                Some(path)
            }
            PositionDistribution::Cylinder { .. } => None,
        }
    }

    fn column_depth_path<'a>(ctx: &SamplingContext<'a>, pca: Vec3, dir: Vec3, endcap_length: f64) -> Path<'a> {
        let start = pca - dir * endcap_length;
        Path::new(ctx.detector, start, dir, 2.0 * endcap_length)
    }

    /// Usable targets and their cross sections at the primary energy
    fn targets_and_cross_sections(&self, ctx: &SamplingContext<'_>, energy: f64) -> (Vec<ParticleType>, Vec<f64>) {
        let targets: Vec<ParticleType> = self
            .target_types()
            .iter()
            .copied()
            .filter(|t| ctx.interactions.has_target(*t))
            .collect();
        let cross_sections = ctx.interactions.total_cross_sections(energy, &targets);
        (targets, cross_sections)
    }

    /// Σ σ_t n_t at a point (1/m)
    fn interaction_density(ctx: &SamplingContext<'_>, p: &Vec3, targets: &[ParticleType], cross_sections: &[f64]) -> f64 {
        targets
            .iter()
            .zip(cross_sections)
            .map(|(t, sigma)| sigma * ctx.detector.target_number_density(p, *t))
            .sum()
    }

    /// Draw a vertex along `path` from the truncated exponential in interaction depth
    fn sample_along(path: &Path<'_>, targets: &[ParticleType], cross_sections: &[f64], rng: &mut RandomGenerator) -> InjectorResult<PositionSample> {
        let total_depth = path.interaction_depth(targets, cross_sections);
        if !(total_depth > 0.0) {
            return Err(InjectorError::injection_failure(
                "no interaction depth along the injection path",
            ));
        }

        let u = rng.uniform();
        let traversed = -(u * (-total_depth).exp_m1()).ln_1p();
        let dist = path.distance_for_interaction_depth(traversed, targets, cross_sections);

        Ok(PositionSample {
            initial_position: path.first_point(),
            vertex: path.point_at(dist),
            interaction_probability: -(-total_depth).exp_m1(),
        })
    }

    /// Density along the path of the vertex (1/m)
    fn density_along(ctx: &SamplingContext<'_>, path: &Path<'_>, vertex: &Vec3, targets: &[ParticleType], cross_sections: &[f64]) -> f64 {
        if path.distance() <= 0.0 || !path.is_within_bounds(vertex) {
            return 0.0;
        }
        let total_depth = path.interaction_depth(targets, cross_sections);
        if !(total_depth > 0.0) {
            return 0.0;
        }
        let upstream = Path::new(ctx.detector, path.first_point(), path.direction(), path.distance_from_start(vertex));
        let traversed = upstream.interaction_depth(targets, cross_sections);
        let local = Self::interaction_density(ctx, vertex, targets, cross_sections);

        local * (-traversed).exp() / -(-total_depth).exp_m1()
    }

    /// Sample the vertex for a record whose energy and direction are set
    pub fn sample(&self, ctx: &SamplingContext<'_>, record: &InteractionRecord, rng: &mut RandomGenerator) -> InjectorResult<PositionSample> {
        match self {
            PositionDistribution::ColumnDepth { radius, .. } => {
                let (e1, e2) = record.primary_direction().orthonormal_basis();
                let (r, phi) = rng.disk_point(*radius);
                let pca = e1 * (r * phi.cos()) + e2 * (r * phi.sin());

                let path = self
                    .injection_path(ctx, record, Some(pca))
                    .ok_or_else(|| InjectorError::injection_failure("closest approach outside the injection disk"))?;
                let (targets, cross_sections) = self.targets_and_cross_sections(ctx, record.primary_energy());
                Self::sample_along(&path, &targets, &cross_sections, rng)
            }
            PositionDistribution::Cylinder { radius, height, center } => {
                let (r, phi) = rng.disk_point(*radius);
                let z = rng.uniform_range(-0.5 * height, 0.5 * height);
                let vertex = *center + Vec3::new(r * phi.cos(), r * phi.sin(), z);
                let initial_position = self
                    .injection_bounds(ctx, record, &vertex)
                    .map_or(vertex, |(entry, _)| entry);
                Ok(PositionSample {
                    initial_position,
                    vertex,
                    interaction_probability: 1.0,
                })
            }
            PositionDistribution::PointSource { .. } => {
                let path = self
                    .injection_path(ctx, record, None)
                    .ok_or_else(|| InjectorError::injection_failure("point source path is empty"))?;
                let (targets, cross_sections) = self.targets_and_cross_sections(ctx, record.primary_energy());
                Self::sample_along(&path, &targets, &cross_sections, rng)
            }
        }
    }

    /// Generation density of the record's vertex (1/m³ for volume samplers,
    /// 1/m along the ray for a point source)
    pub fn density(&self, ctx: &SamplingContext<'_>, record: &InteractionRecord) -> f64 {
        let vertex = record.interaction_vertex;
        match self {
            PositionDistribution::ColumnDepth { radius, .. } => {
                let Some(path) = self.injection_path(ctx, record, Some(vertex)) else {
                    return 0.0;
                };
                let (targets, cross_sections) = self.targets_and_cross_sections(ctx, record.primary_energy());
                Self::density_along(ctx, &path, &vertex, &targets, &cross_sections) / (PI * radius * radius)
            }
            PositionDistribution::Cylinder { radius, height, center } => {
                let q = vertex - *center;
                if q.x * q.x + q.y * q.y <= radius * radius && q.z.abs() <= 0.5 * height {
                    1.0 / (PI * radius * radius * height)
                } else {
                    0.0
                }
            }
            PositionDistribution::PointSource { .. } => {
                let Some(path) = self.injection_path(ctx, record, None) else {
                    return 0.0;
                };
                let (targets, cross_sections) = self.targets_and_cross_sections(ctx, record.primary_energy());
                Self::density_along(ctx, &path, &vertex, &targets, &cross_sections)
            }
        }
    }

    /// Ends of the segment of the primary's line through `vertex` over which
    /// this distribution can place a vertex
    pub fn injection_bounds(&self, ctx: &SamplingContext<'_>, record: &InteractionRecord, vertex: &Vec3) -> Option<(Vec3, Vec3)> {
        match self {
            PositionDistribution::Cylinder { radius, height, center } => {
                let dir = record.primary_direction();
                let side = Surface::CylinderZ { center: (center.x, center.y), radius: *radius };
                let caps = Surface::Box {
                    center: *center,
                    half_extents: Vec3::new(f64::INFINITY, f64::INFINITY, 0.5 * height),
                };
                let interval = |s: &Surface| match s.crossings(vertex, &dir).as_slice() {
                    [a, b] => Some((a.min(*b), a.max(*b))),
                    _ => None,
                };
                let side_t = if dir.x.abs() + dir.y.abs() < 1e-15 {
                    (f64::NEG_INFINITY, f64::INFINITY)
                } else {
                    interval(&side)?
                };
                let cap_t = interval(&caps)?;
                let (t0, t1) = (side_t.0.max(cap_t.0), side_t.1.min(cap_t.1));
                if t0 > t1 {
                    return None;
                }
                Some((*vertex + dir * t0, *vertex + dir * t1))
            }
            _ => self
                .injection_path(ctx, record, Some(*vertex))
                .filter(|p| p.distance() > 0.0)
                .map(|p| (p.first_point(), p.last_point())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorModel;
    use crate::interactions::tests::FlatCrossSection;
    use crate::interactions::{CrossSection, InteractionCollection};
    use std::sync::Arc;

    fn collection() -> InteractionCollection {
        let xs: Arc<dyn CrossSection> = Arc::new(FlatCrossSection {
            primaries: vec![ParticleType::NuMu],
            targets: vec![ParticleType::Nucleon],
            sigma: 1e-38,
        });
        InteractionCollection::new(ParticleType::NuMu, vec![xs]).unwrap()
    }

    fn record(energy: f64, dir: Vec3) -> InteractionRecord {
        let mut record = InteractionRecord::new(ParticleType::NuMu);
        record.set_primary_kinematics(energy, dir);
        record
    }

    #[test]
    fn test_lepton_depth() {
        let f = DepthFunction::LeptonDepth;
        let low = f.depth(ParticleType::NuMu, 1e3);
        let high = f.depth(ParticleType::NuMu, 1e6);
        assert!(low > 0.0 && high > low);

        // ln(1 + 1e3 b/a) / b ≈ 3.7 km.w.e. for a TeV muon
        let expected = (1.0 + 1e3 * MU_RANGE_BETA / MU_RANGE_ALPHA).ln() / MU_RANGE_BETA;
        assert!((low / MWE_TO_KG_M2 - expected).abs() < 1e-9 * expected);
        assert!(low / MWE_TO_KG_M2 > 3700.0 && low / MWE_TO_KG_M2 < 3800.0);
        assert!(f.depth(ParticleType::NuTau, 1e6) > high);
        assert_eq!(DepthFunction::ConstantDepth { depth: 5.0 }.depth(ParticleType::NuE, 1e9), 5.0);
    }

    #[test]
    fn test_column_depth_vertices_on_path() {
        let detector = DetectorModel::dune_fd();
        let interactions = collection();
        let ctx = SamplingContext { detector: &detector, interactions: &interactions };
        let dist = PositionDistribution::ColumnDepth {
            radius: 600.0,
            endcap_length: 600.0,
            depth_function: DepthFunction::LeptonDepth,
            target_types: vec![ParticleType::Nucleon],
        };
        let mut rng = RandomGenerator::new(8);

        for _ in 0..200 {
            let mut rec = record(1e4, rng.isotropic_direction());
            let sample = dist.sample(&ctx, &rec, &mut rng).unwrap();
            rec.interaction_vertex = sample.vertex;
            rec.primary_initial_position = sample.initial_position;

            assert!(sample.interaction_probability > 0.0 && sample.interaction_probability < 1.0);
            assert!(detector.in_world(&sample.vertex) || sample.vertex.mag() <= detector.world_radius + 1e-6);

            let pca = sample.vertex - rec.primary_direction() * sample.vertex.dot(&rec.primary_direction());
            assert!(pca.mag() <= 600.0 + 1e-6);
            assert!(dist.density(&ctx, &rec) > 0.0);

            let (entry, exit) = dist.injection_bounds(&ctx, &rec, &sample.vertex).unwrap();
            assert!((entry - sample.initial_position).mag() < 1e-3);
            assert!(exit.distance(&Vec3::zero()) > 0.0);
        }
    }

    #[test]
    fn test_column_depth_density_outside_disk() {
        let detector = DetectorModel::dune_fd();
        let interactions = collection();
        let ctx = SamplingContext { detector: &detector, interactions: &interactions };
        let dist = PositionDistribution::ColumnDepth {
            radius: 10.0,
            endcap_length: 10.0,
            depth_function: DepthFunction::ConstantDepth { depth: 0.0 },
            target_types: vec![ParticleType::Nucleon],
        };

        let mut rec = record(1e3, Vec3::unit_z());
        rec.interaction_vertex = Vec3::new(50.0, 0.0, 0.0);
        assert_eq!(dist.density(&ctx, &rec), 0.0);

        // Inside both the disk and the argon
        rec.interaction_vertex = Vec3::new(1.0, 1.0, 0.0);
        assert!(dist.density(&ctx, &rec) > 0.0);
    }

    #[test]
    fn test_point_source_density_normalized() {
        let detector = DetectorModel::dune_fd();
        let interactions = collection();
        let ctx = SamplingContext { detector: &detector, interactions: &interactions };
        let dist = PositionDistribution::PointSource {
            origin: Vec3::new(0.0, 0.0, -30.0),
            max_distance: 60.0,
            target_types: vec![ParticleType::Nucleon],
        };

        // Integrate the line density over the argon part of the path
        let mut rec = record(1e5, Vec3::unit_z());
        let n = 2000;
        let h = 60.0 / n as f64;
        let mut integral = 0.0;
        for i in 0..n {
            rec.interaction_vertex = Vec3::new(0.0, 0.0, -30.0 + (i as f64 + 0.5) * h);
            integral += dist.density(&ctx, &rec) * h;
        }
        assert!((integral - 1.0).abs() < 1e-3, "integral {}", integral);
    }

    #[test]
    fn test_cylinder_uniform() {
        let detector = DetectorModel::dune_fd();
        let interactions = collection();
        let ctx = SamplingContext { detector: &detector, interactions: &interactions };
        let dist = PositionDistribution::Cylinder {
            radius: 5.0,
            height: 10.0,
            center: Vec3::zero(),
        };
        let mut rng = RandomGenerator::new(4);
        let mut rec = record(1e3, Vec3::unit_x());

        for _ in 0..500 {
            let sample = dist.sample(&ctx, &rec, &mut rng).unwrap();
            rec.interaction_vertex = sample.vertex;
            assert_eq!(sample.interaction_probability, 1.0);
            assert!((dist.density(&ctx, &rec) * PI * 250.0 - 1.0).abs() < 1e-12);

            let (entry, exit) = dist.injection_bounds(&ctx, &rec, &sample.vertex).unwrap();
            assert!(entry.x <= sample.vertex.x && exit.x >= sample.vertex.x);
            assert!((entry.x * entry.x + entry.y * entry.y - 25.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_no_targets_is_injection_failure() {
        let detector = DetectorModel::dune_fd();
        let interactions = collection();
        let ctx = SamplingContext { detector: &detector, interactions: &interactions };
        let dist = PositionDistribution::PointSource {
            origin: Vec3::zero(),
            max_distance: 10.0,
            target_types: vec![ParticleType::EMinus],
        };
        let rec = record(1e3, Vec3::unit_x());

        let err = dist.sample(&ctx, &rec, &mut RandomGenerator::new(1)).unwrap_err();
        assert!(err.is_retryable());
    }
}
