//! Primary direction distributions.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::constants::FOUR_PI;
use crate::dataclasses::InteractionRecord;
use crate::error::{InjectorError, InjectorResult};
use crate::stochastic::RandomGenerator;
use crate::types::Vec3;

/// Tolerance on 1 - cos θ when matching a fixed direction
const FIXED_DIRECTION_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum DirectionDistribution {
    Isotropic,
    Fixed { direction: Vec3 },
    /// Uniform on the spherical cap within `opening_angle` (rad) of `axis`
    Cone { axis: Vec3, opening_angle: f64 },
}

impl DirectionDistribution {
    pub fn validate(&self) -> InjectorResult<()> {
        match self {
            DirectionDistribution::Isotropic => Ok(()),
            DirectionDistribution::Fixed { direction } => {
                if direction.mag() < 1e-12 {
                    Err(InjectorError::configuration("fixed direction must be non-zero"))
                } else {
                    Ok(())
                }
            }
            DirectionDistribution::Cone { axis, opening_angle } => {
                if axis.mag() < 1e-12 {
                    return Err(InjectorError::configuration("cone axis must be non-zero"));
                }
                if !(*opening_angle > 0.0 && *opening_angle <= PI) {
                    return Err(InjectorError::configuration(format!(
                        "cone opening angle must be in (0, π], got {}",
                        opening_angle
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn sample_direction(&self, rng: &mut RandomGenerator) -> Vec3 {
        match self {
            DirectionDistribution::Isotropic => rng.isotropic_direction(),
            DirectionDistribution::Fixed { direction } => direction.normalize(),
            DirectionDistribution::Cone { axis, opening_angle } => {
                let cos_max = opening_angle.cos();
                let mu = 1.0 - rng.uniform() * (1.0 - cos_max);
                let phi = 2.0 * PI * rng.uniform();
                axis.normalize().deflect(mu, phi)
            }
        }
    }

    /// Density per steradian; a fixed direction counts as 1
    pub fn density_at(&self, dir: &Vec3) -> f64 {
        match self {
            DirectionDistribution::Isotropic => 1.0 / FOUR_PI,
            DirectionDistribution::Fixed { direction } => {
                let cos = direction.normalize().dot(&dir.normalize());
                if cos >= 1.0 - FIXED_DIRECTION_TOLERANCE {
                    1.0
                } else {
                    0.0
                }
            }
            DirectionDistribution::Cone { axis, opening_angle } => {
                let cos_max = opening_angle.cos();
                if axis.normalize().dot(&dir.normalize()) >= cos_max {
                    1.0 / (2.0 * PI * (1.0 - cos_max))
                } else {
                    0.0
                }
            }
        }
    }

    /// Point the primary momentum along a sampled direction, keeping its energy
    pub fn sample(&self, record: &mut InteractionRecord, rng: &mut RandomGenerator) {
        let dir = self.sample_direction(rng);
        let energy = record.primary_energy();
        record.set_primary_kinematics(energy, dir);
    }

    pub fn density(&self, record: &InteractionRecord) -> f64 {
        self.density_at(&record.primary_direction())
    }
}
