//! # Dataclasses
//!
//! Particle species and the per-event interaction record.
//!
//! Particle types carry their PDG Monte Carlo code; nuclei use the
//! `100ZZZAAA0` convention.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::error::InjectorError;
use crate::types::Vec3;

// ============================================================================
// PARTICLE TYPES
// ============================================================================

/// Particle species known to the injector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParticleType {
    #[default]
    Unknown,
    Gamma,
    EMinus,
    EPlus,
    MuMinus,
    MuPlus,
    TauMinus,
    TauPlus,
    NuE,
    NuEBar,
    NuMu,
    NuMuBar,
    NuTau,
    NuTauBar,
    PPlus,
    PMinus,
    Neutron,
    /// Isoscalar nucleon target
    Nucleon,
    /// Generic hadronic final state
    Hadrons,
    HNucleus,
    He4Nucleus,
    C12Nucleus,
    N14Nucleus,
    O16Nucleus,
    Na23Nucleus,
    Mg24Nucleus,
    Al27Nucleus,
    Si28Nucleus,
    Ar40Nucleus,
    K39Nucleus,
    Ca40Nucleus,
    Fe56Nucleus,
    Pb208Nucleus,
}

/// (type, name, PDG code)
const PARTICLE_TABLE: &[(ParticleType, &str, i32)] = &[
    (ParticleType::Unknown, "Unknown", 0),
    (ParticleType::Gamma, "Gamma", 22),
    (ParticleType::EMinus, "EMinus", 11),
    (ParticleType::EPlus, "EPlus", -11),
    (ParticleType::MuMinus, "MuMinus", 13),
    (ParticleType::MuPlus, "MuPlus", -13),
    (ParticleType::TauMinus, "TauMinus", 15),
    (ParticleType::TauPlus, "TauPlus", -15),
    (ParticleType::NuE, "NuE", 12),
    (ParticleType::NuEBar, "NuEBar", -12),
    (ParticleType::NuMu, "NuMu", 14),
    (ParticleType::NuMuBar, "NuMuBar", -14),
    (ParticleType::NuTau, "NuTau", 16),
    (ParticleType::NuTauBar, "NuTauBar", -16),
    (ParticleType::PPlus, "PPlus", 2212),
    (ParticleType::PMinus, "PMinus", -2212),
    (ParticleType::Neutron, "Neutron", 2112),
    (ParticleType::Nucleon, "Nucleon", 2_000_000_002),
    (ParticleType::Hadrons, "Hadrons", -2_000_001_006),
    (ParticleType::HNucleus, "HNucleus", 1_000_010_010),
    (ParticleType::He4Nucleus, "He4Nucleus", 1_000_020_040),
    (ParticleType::C12Nucleus, "C12Nucleus", 1_000_060_120),
    (ParticleType::N14Nucleus, "N14Nucleus", 1_000_070_140),
    (ParticleType::O16Nucleus, "O16Nucleus", 1_000_080_160),
    (ParticleType::Na23Nucleus, "Na23Nucleus", 1_000_110_230),
    (ParticleType::Mg24Nucleus, "Mg24Nucleus", 1_000_120_240),
    (ParticleType::Al27Nucleus, "Al27Nucleus", 1_000_130_270),
    (ParticleType::Si28Nucleus, "Si28Nucleus", 1_000_140_280),
    (ParticleType::Ar40Nucleus, "Ar40Nucleus", 1_000_180_400),
    (ParticleType::K39Nucleus, "K39Nucleus", 1_000_190_390),
    (ParticleType::Ca40Nucleus, "Ca40Nucleus", 1_000_200_400),
    (ParticleType::Fe56Nucleus, "Fe56Nucleus", 1_000_260_560),
    (ParticleType::Pb208Nucleus, "Pb208Nucleus", 1_000_822_080),
];

impl ParticleType {
    /// Canonical name
    pub fn name(&self) -> &'static str {
        PARTICLE_TABLE
            .iter()
            .find(|(p, _, _)| p == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("Unknown")
    }

    /// PDG Monte Carlo code
    pub fn pdg_code(&self) -> i32 {
        PARTICLE_TABLE
            .iter()
            .find(|(p, _, _)| p == self)
            .map(|(_, _, code)| *code)
            .unwrap_or(0)
    }

    /// Lookup by PDG code
    pub fn from_pdg_code(code: i32) -> Option<Self> {
        PARTICLE_TABLE
            .iter()
            .find(|(_, _, c)| *c == code)
            .map(|(p, _, _)| *p)
    }

    /// Nucleus with the given charge and mass numbers, if tabulated
    pub fn nucleus(z: u32, a: u32) -> Option<Self> {
        let code = 1_000_000_000i64 + 10_000 * z as i64 + 10 * a as i64;
        i32::try_from(code).ok().and_then(Self::from_pdg_code)
    }

    /// (Z, A) for nuclei
    pub fn nucleus_za(&self) -> Option<(u32, u32)> {
        let code = self.pdg_code();
        if (1_000_000_000..2_000_000_000).contains(&code) {
            let za = (code - 1_000_000_000) / 10;
            Some(((za / 1000) as u32, (za % 1000) as u32))
        } else {
            None
        }
    }

    /// Rest mass (GeV)
    pub fn mass(&self) -> f64 {
        match self {
            ParticleType::EMinus | ParticleType::EPlus => M_ELECTRON,
            ParticleType::MuMinus | ParticleType::MuPlus => M_MUON,
            ParticleType::TauMinus | ParticleType::TauPlus => M_TAU,
            ParticleType::PPlus | ParticleType::PMinus => M_PROTON,
            ParticleType::Neutron => M_NEUTRON,
            ParticleType::Nucleon => M_NUCLEON,
            ParticleType::HNucleus => M_PROTON,
            _ => match self.nucleus_za() {
                Some((_, a)) => a as f64 * AMU_GEV,
                None => 0.0,
            },
        }
    }

    pub fn is_neutrino(&self) -> bool {
        matches!(
            self,
            ParticleType::NuE
                | ParticleType::NuEBar
                | ParticleType::NuMu
                | ParticleType::NuMuBar
                | ParticleType::NuTau
                | ParticleType::NuTauBar
        )
    }

    pub fn is_charged_lepton(&self) -> bool {
        matches!(
            self,
            ParticleType::EMinus
                | ParticleType::EPlus
                | ParticleType::MuMinus
                | ParticleType::MuPlus
                | ParticleType::TauMinus
                | ParticleType::TauPlus
        )
    }

    pub fn is_nucleus(&self) -> bool {
        self.nucleus_za().is_some()
    }

    /// Antiparticles carry a negative PDG code
    pub fn is_antiparticle(&self) -> bool {
        self.pdg_code() < 0 && *self != ParticleType::Hadrons
    }

    pub fn is_tau_flavored(&self) -> bool {
        matches!(
            self,
            ParticleType::NuTau | ParticleType::NuTauBar | ParticleType::TauMinus | ParticleType::TauPlus
        )
    }

    /// Charged lepton produced by a charged-current interaction of this neutrino
    pub fn charged_lepton_partner(&self) -> Option<Self> {
        match self {
            ParticleType::NuE => Some(ParticleType::EMinus),
            ParticleType::NuEBar => Some(ParticleType::EPlus),
            ParticleType::NuMu => Some(ParticleType::MuMinus),
            ParticleType::NuMuBar => Some(ParticleType::MuPlus),
            ParticleType::NuTau => Some(ParticleType::TauMinus),
            ParticleType::NuTauBar => Some(ParticleType::TauPlus),
            _ => None,
        }
    }
}

impl fmt::Display for ParticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParticleType {
    type Err = InjectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((p, _, _)) = PARTICLE_TABLE.iter().find(|(_, name, _)| *name == s) {
            return Ok(*p);
        }
        s.parse::<i32>()
            .ok()
            .and_then(Self::from_pdg_code)
            .ok_or_else(|| InjectorError::UnknownParticle(s.to_string()))
    }
}

// ============================================================================
// INTERACTION SIGNATURE / RECORD
// ============================================================================

/// Which particles enter and leave an interaction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct InteractionSignature {
    pub primary_type: ParticleType,
    pub target_type: ParticleType,
    pub secondary_types: Vec<ParticleType>,
}

/// Full kinematic record of one sampled interaction
///
/// Four-momenta are `[E, px, py, pz]` in GeV.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub signature: InteractionSignature,
    pub primary_mass: f64,
    pub primary_momentum: [f64; 4],
    pub primary_helicity: f64,
    /// Where the primary enters the injection volume
    pub primary_initial_position: Vec3,
    pub target_mass: f64,
    pub target_momentum: [f64; 4],
    pub target_helicity: f64,
    pub interaction_vertex: Vec3,
    pub secondary_masses: Vec<f64>,
    pub secondary_momenta: Vec<[f64; 4]>,
    pub secondary_helicities: Vec<f64>,
    pub interaction_parameters: BTreeMap<String, f64>,
}

impl InteractionRecord {
    /// Record for a primary of the given type, mass taken from the type
    pub fn new(primary_type: ParticleType) -> Self {
        Self {
            signature: InteractionSignature {
                primary_type,
                ..Default::default()
            },
            primary_mass: primary_type.mass(),
            ..Default::default()
        }
    }

    pub fn primary_energy(&self) -> f64 {
        self.primary_momentum[0]
    }

    /// Unit direction of the primary
    pub fn primary_direction(&self) -> Vec3 {
        Vec3::new(
            self.primary_momentum[1],
            self.primary_momentum[2],
            self.primary_momentum[3],
        )
        .normalize()
    }

    /// Set energy and direction; the momentum magnitude follows from the mass
    pub fn set_primary_kinematics(&mut self, energy: f64, direction: Vec3) {
        let p = (energy * energy - self.primary_mass * self.primary_mass).max(0.0).sqrt();
        let d = direction.normalize();
        self.primary_momentum = [energy, p * d.x, p * d.y, p * d.z];
    }

    /// Place the target at rest
    pub fn set_target(&mut self, target_type: ParticleType) {
        self.signature.target_type = target_type;
        self.target_mass = target_type.mass();
        self.target_momentum = [self.target_mass, 0.0, 0.0, 0.0];
    }
}
