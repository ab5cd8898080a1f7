//! # Physical Constants
//!
//! Units used throughout the injector:
//! - energy and mass in GeV (c = 1)
//! - length in meters
//! - mass density in kg/m³, column depth in kg/m²
//! - cross sections in m²

use std::f64::consts::PI;

// ============================================================================
// UNIT CONVERSIONS
// ============================================================================

/// 1 cm² in m²
pub const CM2_TO_M2: f64 = 1e-4;

/// 1 g/cm³ in kg/m³
pub const G_CM3_TO_KG_M3: f64 = 1e3;

/// 1 meter water equivalent as a column depth (kg/m²)
pub const MWE_TO_KG_M2: f64 = 1e3;

/// Atomic mass unit (kg)
pub const AMU_KG: f64 = 1.660_539_040e-27;

/// Atomic mass unit (GeV)
pub const AMU_GEV: f64 = 0.931_494_095_4;

/// Speed of light (m/s)
pub const C: f64 = 299_792_458.0;

/// Full solid angle (sr)
pub const FOUR_PI: f64 = 4.0 * PI;

// ============================================================================
// PARTICLE MASSES (GeV)
// ============================================================================

/// Electron mass
pub const M_ELECTRON: f64 = 0.000_510_998_946;

/// Muon mass
pub const M_MUON: f64 = 0.105_658_374_5;

/// Tau mass
pub const M_TAU: f64 = 1.776_86;

/// Proton mass
pub const M_PROTON: f64 = 0.938_272_081;

/// Neutron mass
pub const M_NEUTRON: f64 = 0.939_565_413;

/// Isoscalar nucleon mass (average of proton and neutron)
pub const M_NUCLEON: f64 = 0.5 * (M_PROTON + M_NEUTRON);

// ============================================================================
// LIFETIMES
// ============================================================================

/// Tau proper decay length cτ (m)
pub const TAU_DECAY_LENGTH: f64 = 87.03e-6;

// ============================================================================
// LEPTON RANGE PARAMETRIZATION
// ============================================================================
// Range R = ln(1 + E b/a) / b in m.w.e., with a = 0.212/1.2 GeV per m.w.e.
// and b = 0.251e-3/1.2 per m.w.e. as used by LeptonInjector (Comput. Phys.
// Commun. 266 (2021) 108018). A 1 TeV muon gets about 3.7 km.w.e.

/// Continuous muon energy loss a (GeV per m.w.e.)
pub const MU_RANGE_ALPHA: f64 = 0.212 / 1.2;

/// Stochastic muon energy loss b (1 per m.w.e.)
pub const MU_RANGE_BETA: f64 = 0.251e-3 / 1.2;

/// Upper cap on the lepton range (m.w.e.)
pub const MAX_LEPTON_DEPTH_MWE: f64 = 3e7;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nucleon_mass_between_proton_and_neutron() {
        assert!(M_NUCLEON > M_PROTON);
        assert!(M_NUCLEON < M_NEUTRON);
    }

    #[test]
    fn test_amu_consistency() {
        // 1 amu in GeV from kg via E = mc²
        let gev = AMU_KG * C * C / 1.602_176_634e-10;
        assert!((gev - AMU_GEV).abs() < 1e-6);
    }
}
