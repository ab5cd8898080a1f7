//! Primary energy distributions.

use serde::{Deserialize, Serialize};

use crate::dataclasses::InteractionRecord;
use crate::error::{InjectorError, InjectorResult};
use crate::stochastic::RandomGenerator;

/// Energy spectrum of the primary (GeV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum EnergyDistribution {
    /// dN/dE ∝ E^-index on [min, max]
    PowerLaw { index: f64, min: f64, max: f64 },
    Monoenergetic { energy: f64 },
}

impl EnergyDistribution {
    pub fn power_law(index: f64, min: f64, max: f64) -> Self {
        EnergyDistribution::PowerLaw { index, min, max }
    }

    pub fn validate(&self) -> InjectorResult<()> {
        match *self {
            EnergyDistribution::PowerLaw { index, min, max } => {
                if !index.is_finite() || !(min > 0.0) || !(max > min) || !max.is_finite() {
                    return Err(InjectorError::configuration(format!(
                        "power law needs finite index and 0 < min < max, got index={} min={} max={}",
                        index, min, max
                    )));
                }
            }
            EnergyDistribution::Monoenergetic { energy } => {
                if !(energy > 0.0) || !energy.is_finite() {
                    return Err(InjectorError::configuration(format!(
                        "monoenergetic energy must be positive, got {}",
                        energy
                    )));
                }
            }
        }
        Ok(())
    }

    /// Energy interval covered
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            EnergyDistribution::PowerLaw { min, max, .. } => (min, max),
            EnergyDistribution::Monoenergetic { energy } => (energy, energy),
        }
    }

    /// Draw an energy by inverting the cumulative distribution
    pub fn sample_energy(&self, rng: &mut RandomGenerator) -> f64 {
        match *self {
            EnergyDistribution::PowerLaw { index, min, max } => {
                let u = rng.uniform();
                let e = if (index - 1.0).abs() < 1e-9 {
                    min * (max / min).powf(u)
                } else {
                    let g = 1.0 - index;
                    let lo = min.powf(g);
                    let hi = max.powf(g);
                    (lo + u * (hi - lo)).powf(1.0 / g)
                };
                e.clamp(min, max)
            }
            EnergyDistribution::Monoenergetic { energy } => energy,
        }
    }

    /// Normalized density at `energy` (1/GeV); the monoenergetic line counts as 1
    pub fn density_at(&self, energy: f64) -> f64 {
        match *self {
            EnergyDistribution::PowerLaw { index, min, max } => {
                if energy < min || energy > max {
                    return 0.0;
                }
                let norm = if (index - 1.0).abs() < 1e-9 {
                    (max / min).ln()
                } else {
                    let g = 1.0 - index;
                    (max.powf(g) - min.powf(g)) / g
                };
                energy.powf(-index) / norm
            }
            EnergyDistribution::Monoenergetic { energy: e0 } => {
                if (energy - e0).abs() <= 1e-9 * e0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Set the primary energy of the record
    pub fn sample(&self, record: &mut InteractionRecord, rng: &mut RandomGenerator) {
        let energy = self.sample_energy(rng);
        record.primary_momentum[0] = energy;
    }

    pub fn density(&self, record: &InteractionRecord) -> f64 {
        self.density_at(record.primary_energy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_power_law_validation() {
        assert!(EnergyDistribution::power_law(2.0, 1e3, 1e6).validate().is_ok());
        assert!(EnergyDistribution::power_law(2.0, 1e6, 1e3).validate().is_err());
        assert!(EnergyDistribution::power_law(2.0, 0.0, 1e3).validate().is_err());
        assert!(EnergyDistribution::Monoenergetic { energy: -1.0 }.validate().is_err());
    }

    #[test]
    fn test_power_law_density_normalized() {
        for index in [1.0, 2.0, 2.7] {
            let dist = EnergyDistribution::power_law(index, 1e3, 1e6);
            // Midpoint rule in log E: ∫ p(E) E dlnE. The nodes stay inside
            // [min, max], where exp(ln max) may round past the upper bound.
            let n = 4000;
            let (a, b) = (1e3f64.ln(), 1e6f64.ln());
            let h = (b - a) / n as f64;
            let integral: f64 = (0..n)
                .map(|i| {
                    let e = (a + (i as f64 + 0.5) * h).exp();
                    dist.density_at(e) * e * h
                })
                .sum();
            assert!((integral - 1.0).abs() < 1e-4, "index {} integral {}", index, integral);
        }
    }

    #[test]
    fn test_power_law_median() {
        // For index 2 on [a, b] the median is 2ab / (a + b)
        let dist = EnergyDistribution::power_law(2.0, 1e3, 1e6);
        let mut rng = RandomGenerator::new(3);
        let median = 2.0 * 1e3 * 1e6 / (1e3 + 1e6);

        let below = (0..20000).filter(|_| dist.sample_energy(&mut rng) < median).count();
        let frac = below as f64 / 20000.0;
        assert!((frac - 0.5).abs() < 0.015, "fraction below median {}", frac);
    }

    #[test]
    fn test_density_outside_bounds() {
        let dist = EnergyDistribution::power_law(2.0, 1e3, 1e6);
        assert_eq!(dist.density_at(10.0), 0.0);
        assert_eq!(dist.density_at(2e6), 0.0);
        assert!(dist.density_at(5e3) > 0.0);
    }

    proptest! {
        #[test]
        fn prop_power_law_samples_within_bounds(
            index in 0.0f64..4.0,
            log_min in 0.0f64..4.0,
            decades in 0.1f64..4.0,
            seed in any::<u64>(),
        ) {
            let min = 10f64.powf(log_min);
            let max = min * 10f64.powf(decades);
            let dist = EnergyDistribution::power_law(index, min, max);
            let mut rng = RandomGenerator::new(seed);

            for _ in 0..64 {
                let e = dist.sample_energy(&mut rng);
                prop_assert!(e >= min && e <= max);
                prop_assert!(dist.density_at(e) > 0.0);
            }
        }
    }
}
