//! # Detector Model
//!
//! Geometry and composition of the volume around an experiment.
//!
//! ## Geometry
//!
//! Sectors are CSG regions built from quadric surfaces. Lookup is first-match
//! in declaration order, so an inner volume is declared before the volume
//! that encloses it. Everything outside the world sphere is vacuum.
//!
//! ## Composition
//!
//! Each sector names a material (mass fractions of nuclides) and a density
//! profile. Target number densities follow from the local mass density and
//! the per-kilogram target counts of the material.

pub mod path;

pub use path::Path;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path as FsPath;
use tracing::{debug, info};

use crate::constants::*;
use crate::dataclasses::ParticleType;
use crate::error::{InjectorError, InjectorResult};
use crate::resources::ResourceRoot;
use crate::types::Vec3;

/// Experiments with a built-in detector description
pub const BUILTIN_DETECTORS: &[&str] = &["DUNEFD"];

// ============================================================================
// SURFACES AND REGIONS (CSG)
// ============================================================================

/// Surface primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Plane: n·p = d
    Plane { normal: Vec3, d: f64 },
    /// Sphere: |p - c|² = R²
    Sphere { center: Vec3, radius: f64 },
    /// Cylinder along Z: (x-x0)² + (y-y0)² = R²
    CylinderZ { center: (f64, f64), radius: f64 },
    /// Axis-aligned box
    Box { center: Vec3, half_extents: Vec3 },
}

impl Surface {
    /// Evaluate surface equation (negative = inside, positive = outside)
    pub fn sense(&self, p: &Vec3) -> f64 {
        match self {
            Surface::Plane { normal, d } => normal.dot(p) - d,
            Surface::Sphere { center, radius } => {
                (*p - *center).mag_squared() - radius * radius
            }
            Surface::CylinderZ { center, radius } => {
                let dx = p.x - center.0;
                let dy = p.y - center.1;
                dx * dx + dy * dy - radius * radius
            }
            Surface::Box { center, half_extents } => {
                let q = *p - *center;
                (0..3)
                    .map(|i| q.axis(i).abs() - half_extents.axis(i))
                    .fold(f64::NEG_INFINITY, f64::max)
            }
        }
    }

    /// Every ray parameter t (either sign) at which `pos + t·dir` meets the surface
    pub fn crossings(&self, pos: &Vec3, dir: &Vec3) -> Vec<f64> {
        match self {
            Surface::Plane { normal, d } => {
                let denom = normal.dot(dir);
                if denom.abs() < 1e-12 {
                    return Vec::new();
                }
                vec![(d - normal.dot(pos)) / denom]
            }
            Surface::Sphere { center, radius } => {
                let oc = *pos - *center;
                Self::quadratic_roots(dir.mag_squared(), 2.0 * oc.dot(dir), oc.mag_squared() - radius * radius)
            }
            Surface::CylinderZ { center, radius } => {
                let ox = pos.x - center.0;
                let oy = pos.y - center.1;
                let a = dir.x * dir.x + dir.y * dir.y;
                let b = 2.0 * (ox * dir.x + oy * dir.y);
                let c = ox * ox + oy * oy - radius * radius;
                Self::quadratic_roots(a, b, c)
            }
            Surface::Box { center, half_extents } => {
                // Slab method
                let mut t_enter = f64::NEG_INFINITY;
                let mut t_exit = f64::INFINITY;
                for i in 0..3 {
                    let o = pos.axis(i) - center.axis(i);
                    let h = half_extents.axis(i);
                    let d = dir.axis(i);
                    if d.abs() < 1e-15 {
                        if o.abs() > h {
                            return Vec::new();
                        }
                        continue;
                    }
                    let t1 = (-h - o) / d;
                    let t2 = (h - o) / d;
                    t_enter = t_enter.max(t1.min(t2));
                    t_exit = t_exit.min(t1.max(t2));
                }
                if t_enter <= t_exit {
                    vec![t_enter, t_exit]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
        if a.abs() < 1e-12 {
            // Linear
            if b.abs() < 1e-12 {
                return Vec::new();
            }
            return vec![-c / b];
        }

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return Vec::new();
        }

        let sqrt_d = discriminant.sqrt();
        vec![(-b - sqrt_d) / (2.0 * a), (-b + sqrt_d) / (2.0 * a)]
    }
}

/// Region definition (CSG)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Inside a surface (negative sense)
    Inside(Surface),
    /// Outside a surface (positive sense)
    Outside(Surface),
    /// Intersection (AND)
    Intersection(Vec<Region>),
    /// Union (OR)
    Union(Vec<Region>),
    /// Complement (NOT)
    Complement(Box<Region>),
}

impl Region {
    /// Check if point is inside region
    pub fn contains(&self, p: &Vec3) -> bool {
        match self {
            Region::Inside(s) => s.sense(p) < 0.0,
            Region::Outside(s) => s.sense(p) > 0.0,
            Region::Intersection(regions) => regions.iter().all(|r| r.contains(p)),
            Region::Union(regions) => regions.iter().any(|r| r.contains(p)),
            Region::Complement(r) => !r.contains(p),
        }
    }

    /// All surfaces bounding this region
    pub fn surfaces(&self) -> Vec<&Surface> {
        match self {
            Region::Inside(s) | Region::Outside(s) => vec![s],
            Region::Intersection(regions) | Region::Union(regions) => {
                regions.iter().flat_map(|r| r.surfaces()).collect()
            }
            Region::Complement(r) => r.surfaces(),
        }
    }
}

// ============================================================================
// DENSITY PROFILES
// ============================================================================

/// Mass density as a function of position (kg/m³)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DensityDistribution {
    Constant { density: f64 },
    /// ρ(p) = ρ0 · exp(-((p - origin)·axis) / scale)
    ExponentialAxis {
        axis: Vec3,
        origin: Vec3,
        rho0: f64,
        scale: f64,
    },
}

impl DensityDistribution {
    pub fn evaluate(&self, p: &Vec3) -> f64 {
        match self {
            DensityDistribution::Constant { density } => *density,
            DensityDistribution::ExponentialAxis { axis, origin, rho0, scale } => {
                let u = (*p - *origin).dot(&axis.normalize());
                rho0 * (-u / scale).exp()
            }
        }
    }

    /// Column depth ∫ρ dt from `start` over `distance` along `dir` (kg/m²)
    pub fn integral(&self, start: &Vec3, dir: &Vec3, distance: f64) -> f64 {
        match self {
            DensityDistribution::Constant { density } => density * distance,
            DensityDistribution::ExponentialAxis { axis, origin, rho0, scale } => {
                let axis = axis.normalize();
                let u0 = (*start - *origin).dot(&axis);
                let a = dir.dot(&axis);
                let base = rho0 * (-u0 / scale).exp();
                if a.abs() < 1e-12 {
                    base * distance
                } else {
                    -base * scale / a * (-a * distance / scale).exp_m1()
                }
            }
        }
    }

    /// Distance from `start` along `dir` at which the column depth reaches
    /// `depth`; infinite when the profile never accumulates that much
    pub fn inverse_integral(&self, start: &Vec3, dir: &Vec3, depth: f64) -> f64 {
        if depth <= 0.0 {
            return 0.0;
        }
        match self {
            DensityDistribution::Constant { density } => {
                if *density > 0.0 {
                    depth / density
                } else {
                    f64::INFINITY
                }
            }
            DensityDistribution::ExponentialAxis { axis, origin, rho0, scale } => {
                let axis = axis.normalize();
                let u0 = (*start - *origin).dot(&axis);
                let a = dir.dot(&axis);
                let base = rho0 * (-u0 / scale).exp();
                if base <= 0.0 {
                    return f64::INFINITY;
                }
                if a.abs() < 1e-12 {
                    return depth / base;
                }
                let arg = depth * a / (base * scale);
                if arg >= 1.0 {
                    f64::INFINITY
                } else {
                    -(scale / a) * (-arg).ln_1p()
                }
            }
        }
    }
}

// ============================================================================
// MATERIALS
// ============================================================================

/// One nuclide of a material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialComponent {
    pub z: u32,
    pub a: u32,
    pub mass_fraction: f64,
}

/// Mixture of nuclides by mass fraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub components: Vec<MaterialComponent>,
}

impl Material {
    pub fn new(name: &str, components: &[(u32, u32, f64)]) -> Self {
        Self {
            name: name.to_string(),
            components: components
                .iter()
                .map(|&(z, a, mass_fraction)| MaterialComponent { z, a, mass_fraction })
                .collect(),
        }
    }

    /// Number of `target` particles per kilogram of material
    pub fn targets_per_kg(&self, target: ParticleType) -> f64 {
        let per_kg = |c: &MaterialComponent| c.mass_fraction / (c.a as f64 * AMU_KG);
        match target {
            ParticleType::Nucleon => self.components.iter().map(|c| per_kg(c) * c.a as f64).sum(),
            ParticleType::PPlus | ParticleType::EMinus => {
                self.components.iter().map(|c| per_kg(c) * c.z as f64).sum()
            }
            ParticleType::Neutron => self
                .components
                .iter()
                .map(|c| per_kg(c) * (c.a - c.z.min(c.a)) as f64)
                .sum(),
            _ => match target.nucleus_za() {
                Some((z, a)) => self
                    .components
                    .iter()
                    .filter(|c| c.z == z && c.a == a)
                    .map(per_kg)
                    .sum(),
                None => 0.0,
            },
        }
    }

    /// Nuclei present in the material
    pub fn nuclei(&self) -> Vec<ParticleType> {
        self.components
            .iter()
            .filter_map(|c| ParticleType::nucleus(c.z, c.a))
            .collect()
    }
}

// ============================================================================
// DETECTOR MODEL
// ============================================================================

/// A volume of uniform material with its density profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub name: String,
    pub region: Region,
    pub material: String,
    pub density: DensityDistribution,
}

/// Ordered sectors, materials and world bounds of one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorModel {
    pub name: String,
    pub world_center: Vec3,
    pub world_radius: f64,
    pub sectors: Vec<Sector>,
    pub materials: BTreeMap<String, Material>,
}

impl DetectorModel {
    /// Load the description of `experiment` from the resource tree, falling
    /// back to the built-in registry
    pub fn load(resources: &ResourceRoot, experiment: &str) -> InjectorResult<Self> {
        let file = resources.detector_file(experiment);
        if file.is_file() {
            let model = Self::from_file(&file)?;
            info!(experiment, path = %file.display(), sectors = model.sectors.len(), "Loaded detector model");
            return Ok(model);
        }

        match Self::builtin(experiment) {
            Some(model) => {
                debug!(experiment, "Using built-in detector model");
                Ok(model)
            }
            None => Err(InjectorError::resource(
                file,
                format!(
                    "no detector description for experiment '{}' (built-in: {})",
                    experiment,
                    BUILTIN_DETECTORS.join(", ")
                ),
            )),
        }
    }

    pub fn builtin(experiment: &str) -> Option<Self> {
        match experiment {
            "DUNEFD" => Some(Self::dune_fd()),
            _ => None,
        }
    }

    /// Read a JSON description and check it
    pub fn from_file(path: &FsPath) -> InjectorResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| InjectorError::resource(path, e.to_string()))?;
        let model: Self = serde_json::from_str(&text)
            .map_err(|e| InjectorError::resource(path, e.to_string()))?;
        model
            .validate()
            .map_err(|e| InjectorError::resource(path, e.to_string()))?;
        Ok(model)
    }

    /// Write as pretty JSON
    pub fn write_to_file(&self, path: &FsPath) -> InjectorResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Every sector must reference a known material
    pub fn validate(&self) -> InjectorResult<()> {
        if self.world_radius <= 0.0 {
            return Err(InjectorError::configuration("world radius must be positive"));
        }
        for sector in &self.sectors {
            if !self.materials.contains_key(&sector.material) {
                return Err(InjectorError::configuration(format!(
                    "sector '{}' references unknown material '{}'",
                    sector.name, sector.material
                )));
            }
        }
        Ok(())
    }

    pub fn in_world(&self, p: &Vec3) -> bool {
        p.distance(&self.world_center) < self.world_radius
    }

    /// First sector containing the point
    pub fn find_sector(&self, p: &Vec3) -> Option<&Sector> {
        if !self.in_world(p) {
            return None;
        }
        self.sectors.iter().find(|s| s.region.contains(p))
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Mass density at a point (kg/m³)
    pub fn density(&self, p: &Vec3) -> f64 {
        self.find_sector(p).map_or(0.0, |s| s.density.evaluate(p))
    }

    /// Σ σ_t · (targets of type t per kg) in a sector (m²/kg)
    pub fn mass_attenuation(&self, sector: &Sector, targets: &[ParticleType], cross_sections: &[f64]) -> f64 {
        match self.material(&sector.material) {
            Some(material) => targets
                .iter()
                .zip(cross_sections)
                .map(|(t, sigma)| sigma * material.targets_per_kg(*t))
                .sum(),
            None => 0.0,
        }
    }

    /// Number density of `target` at a point (1/m³)
    pub fn target_number_density(&self, p: &Vec3, target: ParticleType) -> f64 {
        match self.find_sector(p) {
            Some(sector) => {
                let per_kg = self
                    .material(&sector.material)
                    .map_or(0.0, |m| m.targets_per_kg(target));
                sector.density.evaluate(p) * per_kg
            }
            None => 0.0,
        }
    }

    /// Interaction targets available anywhere in the model
    pub fn targets(&self) -> Vec<ParticleType> {
        let mut set: BTreeSet<ParticleType> = [
            ParticleType::EMinus,
            ParticleType::PPlus,
            ParticleType::Neutron,
            ParticleType::Nucleon,
        ]
        .into_iter()
        .collect();
        for material in self.materials.values() {
            set.extend(material.nuclei());
        }
        set.into_iter().collect()
    }

    /// Surfaces of every sector plus the world sphere
    pub fn surfaces(&self) -> Vec<Surface> {
        let mut surfaces = vec![Surface::Sphere {
            center: self.world_center,
            radius: self.world_radius,
        }];
        for sector in &self.sectors {
            surfaces.extend(sector.region.surfaces().into_iter().cloned());
        }
        surfaces
    }

    /// DUNE far detector: one liquid-argon module in its cavern, 1480 m
    /// below the surface.
    ///
    /// Coordinates are centered on the module with z pointing up.
    pub fn dune_fd() -> Self {
        let surface_z = 1480.0;
        let world_radius = 15_000.0;
        let world = Surface::Sphere {
            center: Vec3::zero(),
            radius: world_radius,
        };
        let ground = Surface::Plane {
            normal: Vec3::unit_z(),
            d: surface_z,
        };

        let mut materials = BTreeMap::new();
        for m in [
            Material::new("LAr", &[(18, 40, 1.0)]),
            Material::new("Air", &[(7, 14, 0.755), (8, 16, 0.232), (18, 40, 0.013)]),
            Material::new(
                "StandardRock",
                &[
                    (8, 16, 0.46),
                    (14, 28, 0.28),
                    (13, 27, 0.08),
                    (26, 56, 0.05),
                    (20, 40, 0.04),
                    (11, 23, 0.03),
                    (19, 39, 0.03),
                    (12, 24, 0.03),
                ],
            ),
        ] {
            materials.insert(m.name.clone(), m);
        }

        let sectors = vec![
            Sector {
                name: "detector".into(),
                region: Region::Inside(Surface::Box {
                    center: Vec3::zero(),
                    half_extents: Vec3::new(7.25, 7.0, 31.0),
                }),
                material: "LAr".into(),
                density: DensityDistribution::Constant { density: 1.395 * G_CM3_TO_KG_M3 },
            },
            Sector {
                name: "cavern".into(),
                region: Region::Inside(Surface::Box {
                    center: Vec3::zero(),
                    half_extents: Vec3::new(10.0, 14.0, 72.0),
                }),
                material: "Air".into(),
                density: DensityDistribution::Constant { density: 1.205 },
            },
            Sector {
                name: "rock".into(),
                region: Region::Intersection(vec![
                    Region::Inside(world.clone()),
                    Region::Inside(ground.clone()),
                ]),
                material: "StandardRock".into(),
                density: DensityDistribution::Constant { density: 2.65 * G_CM3_TO_KG_M3 },
            },
            Sector {
                name: "atmosphere".into(),
                region: Region::Intersection(vec![Region::Inside(world), Region::Outside(ground)]),
                material: "Air".into(),
                density: DensityDistribution::ExponentialAxis {
                    axis: Vec3::unit_z(),
                    origin: Vec3::new(0.0, 0.0, surface_z),
                    rho0: 1.205,
                    scale: 8400.0,
                },
            },
        ];

        Self {
            name: "DUNEFD".into(),
            world_center: Vec3::zero(),
            world_radius,
            sectors,
            materials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_box_sense_and_crossings() {
        let b = Surface::Box {
            center: Vec3::zero(),
            half_extents: Vec3::new(1.0, 2.0, 3.0),
        };
        assert!(b.sense(&Vec3::new(0.5, 1.5, -2.5)) < 0.0);
        assert!(b.sense(&Vec3::new(1.5, 0.0, 0.0)) > 0.0);

        let t = b.crossings(&Vec3::new(-5.0, 0.0, 0.0), &Vec3::unit_x());
        assert_eq!(t.len(), 2);
        assert!((t[0] - 4.0).abs() < 1e-12);
        assert!((t[1] - 6.0).abs() < 1e-12);

        assert!(b.crossings(&Vec3::new(-5.0, 5.0, 0.0), &Vec3::unit_x()).is_empty());
    }

    #[test]
    fn test_sphere_and_plane_crossings() {
        let s = Surface::Sphere { center: Vec3::zero(), radius: 2.0 };
        let t = s.crossings(&Vec3::zero(), &Vec3::unit_z());
        assert_eq!(t, vec![-2.0, 2.0]);

        let p = Surface::Plane { normal: Vec3::unit_z(), d: 3.0 };
        assert_eq!(p.crossings(&Vec3::zero(), &Vec3::unit_z()), vec![3.0]);
        assert!(p.crossings(&Vec3::zero(), &Vec3::unit_x()).is_empty());
    }

    #[test]
    fn test_constant_density_integral() {
        let d = DensityDistribution::Constant { density: 2.0 };
        assert_eq!(d.integral(&Vec3::zero(), &Vec3::unit_x(), 5.0), 10.0);
        assert_eq!(d.inverse_integral(&Vec3::zero(), &Vec3::unit_x(), 10.0), 5.0);
    }

    #[test]
    fn test_exponential_density_inverse() {
        let d = DensityDistribution::ExponentialAxis {
            axis: Vec3::unit_z(),
            origin: Vec3::zero(),
            rho0: 1.2,
            scale: 8400.0,
        };
        let start = Vec3::new(0.0, 0.0, 100.0);

        for dir in [Vec3::unit_z(), -Vec3::unit_z(), Vec3::new(1.0, 0.0, 1.0).normalize()] {
            let depth = d.integral(&start, &dir, 2500.0);
            let back = d.inverse_integral(&start, &dir, depth);
            assert!((back - 2500.0).abs() < 1e-6, "dir {} gave {}", dir, back);
        }

        // Upward the column is bounded by ρ0·H·exp(-u0/H)
        let bound = 1.2 * 8400.0 * (-100.0f64 / 8400.0).exp();
        assert!(d.inverse_integral(&start, &Vec3::unit_z(), bound * 1.01).is_infinite());
    }

    #[test]
    fn test_targets_per_kg() {
        let lar = Material::new("LAr", &[(18, 40, 1.0)]);
        let nucleons = lar.targets_per_kg(ParticleType::Nucleon);
        assert!((nucleons - 1.0 / AMU_KG).abs() / nucleons < 1e-12);

        let protons = lar.targets_per_kg(ParticleType::PPlus);
        let neutrons = lar.targets_per_kg(ParticleType::Neutron);
        assert!((protons + neutrons - nucleons).abs() / nucleons < 1e-12);
        assert_eq!(lar.targets_per_kg(ParticleType::O16Nucleus), 0.0);
        assert!(lar.targets_per_kg(ParticleType::Ar40Nucleus) > 0.0);
    }

    #[test]
    fn test_dune_fd_sectors() {
        let model = DetectorModel::dune_fd();
        assert!(model.validate().is_ok());

        let name = |p: Vec3| model.find_sector(&p).map(|s| s.name.clone());
        assert_eq!(name(Vec3::zero()).as_deref(), Some("detector"));
        assert_eq!(name(Vec3::new(9.0, 0.0, 0.0)).as_deref(), Some("cavern"));
        assert_eq!(name(Vec3::new(0.0, 0.0, -500.0)).as_deref(), Some("rock"));
        assert_eq!(name(Vec3::new(0.0, 0.0, 2000.0)).as_deref(), Some("atmosphere"));
        assert_eq!(name(Vec3::new(0.0, 0.0, 20_000.0)), None);

        assert!((model.density(&Vec3::zero()) - 1395.0).abs() < 1e-9);
        let targets = model.targets();
        assert!(targets.contains(&ParticleType::Nucleon));
        assert!(targets.contains(&ParticleType::Ar40Nucleus));
        assert!(targets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_load_builtin_and_file() {
        let dir = TempDir::new().unwrap();
        let resources = ResourceRoot::new(dir.path());

        let builtin = DetectorModel::load(&resources, "DUNEFD").unwrap();
        assert_eq!(builtin.name, "DUNEFD");
        assert!(matches!(
            DetectorModel::load(&resources, "NoSuchDetector"),
            Err(InjectorError::Resource { .. })
        ));

        let mut custom = DetectorModel::dune_fd();
        custom.name = "Custom".into();
        std::fs::create_dir_all(dir.path().join("Detectors")).unwrap();
        custom.write_to_file(&resources.detector_file("Custom")).unwrap();

        let loaded = DetectorModel::load(&resources, "Custom").unwrap();
        assert_eq!(loaded, custom);
    }

    #[test]
    fn test_invalid_file_is_resource_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(DetectorModel::from_file(&path), Err(InjectorError::Resource { .. })));

        let mut model = DetectorModel::dune_fd();
        model.sectors[0].material = "Unobtainium".into();
        model.write_to_file(&path).unwrap();
        assert!(matches!(DetectorModel::from_file(&path), Err(InjectorError::Resource { .. })));
    }
}
