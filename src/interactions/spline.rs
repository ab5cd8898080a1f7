//! Deep-inelastic scattering from tabulated cross sections.
//!
//! Two JSON tables describe one interaction channel:
//!
//! - total: log10 σ against log10 E, interpolated linearly in log-log
//! - differential: cell weights over (log10 E, log10 x, log10 y)
//!
//! Bjorken x and y are drawn cell by cell, log-uniform inside a cell, and
//! rejected below the minimum Q² of the table.

use rand::distributions::{Distribution, WeightedIndex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use super::CrossSection;
use crate::constants::*;
use crate::dataclasses::{InteractionRecord, InteractionSignature, ParticleType};
use crate::error::{InjectorError, InjectorResult};
use crate::stochastic::RandomGenerator;
use crate::types::Vec3;

/// Rejection budget for (x, y) draws below the minimum Q²
const MAX_KINEMATIC_TRIALS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    ChargedCurrent,
    NeutralCurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossSectionUnit {
    #[serde(rename = "cm2")]
    Cm2,
    #[serde(rename = "m2")]
    M2,
}

impl CrossSectionUnit {
    /// Factor converting to m²
    pub fn to_m2(&self) -> f64 {
        match self {
            CrossSectionUnit::Cm2 => CM2_TO_M2,
            CrossSectionUnit::M2 => 1.0,
        }
    }
}

fn check_ascending(name: &str, v: &[f64]) -> Result<(), String> {
    if v.len() < 2 {
        return Err(format!("{} needs at least two nodes", name));
    }
    if v.windows(2).any(|w| w[1] <= w[0]) {
        return Err(format!("{} must be strictly ascending", name));
    }
    Ok(())
}

/// Locate `v` among ascending nodes: (lower index, fraction to the next),
/// clamped to the table range
fn bracket(nodes: &[f64], v: f64) -> (usize, f64) {
    let last = nodes.len() - 1;
    if v <= nodes[0] {
        return (0, 0.0);
    }
    if v >= nodes[last] {
        return (last - 1, 1.0);
    }

    // Binary search
    let mut i_low = 0;
    let mut i_high = last;
    while i_high - i_low > 1 {
        let mid = (i_low + i_high) / 2;
        if v < nodes[mid] {
            i_high = mid;
        } else {
            i_low = mid;
        }
    }
    let f = (v - nodes[i_low]) / (nodes[i_high] - nodes[i_low]);
    (i_low, f)
}

// ============================================================================
// TOTAL CROSS SECTION
// ============================================================================

/// σ(E) tabulated in log-log space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalCrossSectionTable {
    pub interaction: InteractionKind,
    pub unit: CrossSectionUnit,
    /// log10(E / GeV)
    pub log10_energy: Vec<f64>,
    /// log10(σ / unit)
    pub log10_sigma: Vec<f64>,
}

impl TotalCrossSectionTable {
    pub fn validate(&self) -> Result<(), String> {
        check_ascending("log10_energy", &self.log10_energy)?;
        if self.log10_sigma.len() != self.log10_energy.len() {
            return Err(format!(
                "log10_sigma has {} entries for {} energies",
                self.log10_sigma.len(),
                self.log10_energy.len()
            ));
        }
        Ok(())
    }

    /// Energy range covered (GeV)
    pub fn energy_range(&self) -> (f64, f64) {
        let first = self.log10_energy.first().copied().unwrap_or(0.0);
        let last = self.log10_energy.last().copied().unwrap_or(0.0);
        (10f64.powf(first), 10f64.powf(last))
    }

    /// Interpolate σ at energy (m²), clamped to the table ends
    pub fn evaluate(&self, energy: f64) -> f64 {
        if energy <= 0.0 || self.log10_energy.len() < 2 || self.log10_sigma.len() != self.log10_energy.len() {
            return 0.0;
        }
        let (i, f) = bracket(&self.log10_energy, energy.log10());
        let log_sigma = self.log10_sigma[i] + f * (self.log10_sigma[i + 1] - self.log10_sigma[i]);
        10f64.powf(log_sigma) * self.unit.to_m2()
    }
}

// ============================================================================
// DIFFERENTIAL CROSS SECTION
// ============================================================================

/// Relative weights of (x, y) cells at each energy node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialCrossSectionTable {
    pub interaction: InteractionKind,
    /// Target mass used for Q² = 2·M·E·x·y (GeV)
    pub target_mass: f64,
    /// Minimum Q² (GeV²)
    pub minimum_q2: f64,
    pub log10_energy: Vec<f64>,
    pub log10_x_edges: Vec<f64>,
    pub log10_y_edges: Vec<f64>,
    /// values[energy][x cell][y cell]
    pub values: Vec<Vec<Vec<f64>>>,
}

impl DifferentialCrossSectionTable {
    pub fn validate(&self) -> Result<(), String> {
        check_ascending("log10_energy", &self.log10_energy)?;
        check_ascending("log10_x_edges", &self.log10_x_edges)?;
        check_ascending("log10_y_edges", &self.log10_y_edges)?;
        if self.log10_x_edges.last().is_some_and(|&x| x > 0.0)
            || self.log10_y_edges.last().is_some_and(|&y| y > 0.0)
        {
            return Err("x and y edges must not exceed 1".into());
        }
        if self.target_mass <= 0.0 {
            return Err("target_mass must be positive".into());
        }

        let nx = self.log10_x_edges.len() - 1;
        let ny = self.log10_y_edges.len() - 1;
        if self.values.len() != self.log10_energy.len() {
            return Err("values must have one grid per energy node".into());
        }
        for (k, grid) in self.values.iter().enumerate() {
            if grid.len() != nx || grid.iter().any(|row| row.len() != ny) {
                return Err(format!("grid {} must be {} x {}", k, nx, ny));
            }
            if grid.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(format!("grid {} has negative or non-finite weights", k));
            }
            if grid.iter().flatten().all(|v| *v == 0.0) {
                return Err(format!("grid {} has no weight", k));
            }
        }
        Ok(())
    }

    /// Draw (x, y) at energy E with Q² above the table minimum
    pub fn sample_xy(&self, energy: f64, rng: &mut RandomGenerator) -> InjectorResult<(f64, f64)> {
        if self.log10_energy.len() < 2
            || self.values.len() != self.log10_energy.len()
            || self.log10_x_edges.len() < 2
            || self.log10_y_edges.len() < 2
        {
            return Err(InjectorError::configuration("differential table is malformed"));
        }
        let (i, f) = bracket(&self.log10_energy, energy.log10());
        // Pick the neighbouring energy node with probability given by the distance
        let node = if rng.uniform() < f { i + 1 } else { i };
        let grid = &self.values[node];
        let ny = self.log10_y_edges.len() - 1;

        let cells = WeightedIndex::new(grid.iter().flatten().copied())
            .map_err(|e| InjectorError::Generation(format!("differential table: {}", e)))?;

        for _ in 0..MAX_KINEMATIC_TRIALS {
            let cell = cells.sample(rng);
            let (ix, iy) = (cell / ny, cell % ny);
            let log_x = rng.uniform_range(self.log10_x_edges[ix], self.log10_x_edges[ix + 1]);
            let log_y = rng.uniform_range(self.log10_y_edges[iy], self.log10_y_edges[iy + 1]);
            let (x, y) = (10f64.powf(log_x), 10f64.powf(log_y));

            let q2 = 2.0 * self.target_mass * energy * x * y;
            if q2 >= self.minimum_q2 {
                return Ok((x, y));
            }
        }

        Err(InjectorError::injection_failure(format!(
            "no (x, y) above Q² = {} GeV² at E = {:.3e} GeV",
            self.minimum_q2, energy
        )))
    }
}

// ============================================================================
// DIS MODEL
// ============================================================================

fn read_table<T: DeserializeOwned>(path: &Path) -> InjectorResult<T> {
    let text = fs::read_to_string(path).map_err(|e| InjectorError::resource(path, e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| InjectorError::resource(path, e.to_string()))
}

/// Neutrino DIS on a set of targets from a (differential, total) table pair
#[derive(Debug, Clone)]
pub struct DisFromSpline {
    differential: DifferentialCrossSectionTable,
    total: TotalCrossSectionTable,
    primaries: BTreeSet<ParticleType>,
    targets: BTreeSet<ParticleType>,
}

impl DisFromSpline {
    /// Load the table pair and restrict the model to the given types
    pub fn from_files(
        differential_path: impl AsRef<Path>,
        total_path: impl AsRef<Path>,
        primaries: &[ParticleType],
        targets: &[ParticleType],
    ) -> InjectorResult<Self> {
        let differential_path = differential_path.as_ref();
        let total_path = total_path.as_ref();

        let differential: DifferentialCrossSectionTable = read_table(differential_path)?;
        differential
            .validate()
            .map_err(|reason| InjectorError::resource(differential_path, reason))?;
        let total: TotalCrossSectionTable = read_table(total_path)?;
        total
            .validate()
            .map_err(|reason| InjectorError::resource(total_path, reason))?;

        debug!(
            differential = %differential_path.display(),
            total = %total_path.display(),
            "Loaded DIS tables"
        );
        Self::from_tables(differential, total, primaries, targets)
    }

    pub fn from_tables(
        differential: DifferentialCrossSectionTable,
        total: TotalCrossSectionTable,
        primaries: &[ParticleType],
        targets: &[ParticleType],
    ) -> InjectorResult<Self> {
        differential
            .validate()
            .map_err(|reason| InjectorError::configuration(format!("differential table: {}", reason)))?;
        total
            .validate()
            .map_err(|reason| InjectorError::configuration(format!("total table: {}", reason)))?;
        if differential.interaction != total.interaction {
            return Err(InjectorError::configuration(format!(
                "differential table is {:?} but total table is {:?}",
                differential.interaction, total.interaction
            )));
        }
        if primaries.is_empty() || targets.is_empty() {
            return Err(InjectorError::configuration("DIS model needs primaries and targets"));
        }
        if let Some(p) = primaries.iter().find(|p| !p.is_neutrino()) {
            return Err(InjectorError::configuration(format!("DIS primary {} is not a neutrino", p)));
        }

        Ok(Self {
            differential,
            total,
            primaries: primaries.iter().copied().collect(),
            targets: targets.iter().copied().collect(),
        })
    }

    pub fn interaction(&self) -> InteractionKind {
        self.total.interaction
    }

    /// Outgoing lepton for a primary
    fn outgoing_lepton(&self, primary: ParticleType) -> Option<ParticleType> {
        match self.interaction() {
            InteractionKind::ChargedCurrent => primary.charged_lepton_partner(),
            InteractionKind::NeutralCurrent => Some(primary),
        }
    }
}

impl CrossSection for DisFromSpline {
    fn name(&self) -> &str {
        match self.interaction() {
            InteractionKind::ChargedCurrent => "DIS CC",
            InteractionKind::NeutralCurrent => "DIS NC",
        }
    }

    fn total_cross_section(&self, primary: ParticleType, energy: f64, target: ParticleType) -> f64 {
        if !self.primaries.contains(&primary) || !self.targets.contains(&target) {
            return 0.0;
        }
        self.total.evaluate(energy)
    }

    fn sample_final_state(&self, record: &mut InteractionRecord, rng: &mut RandomGenerator) -> InjectorResult<()> {
        let primary = record.signature.primary_type;
        let lepton = self
            .outgoing_lepton(primary)
            .ok_or_else(|| InjectorError::configuration(format!("no outgoing lepton for {}", primary)))?;

        let energy = record.primary_energy();
        let (x, y) = self.differential.sample_xy(energy, rng)?;

        let m_l = lepton.mass();
        let e_l = energy * (1.0 - y);
        if e_l <= m_l {
            return Err(InjectorError::injection_failure(format!(
                "lepton energy {:.3e} GeV below its mass",
                e_l
            )));
        }
        let p_l = (e_l * e_l - m_l * m_l).sqrt();
        let q2 = 2.0 * self.differential.target_mass * energy * x * y;

        let cos_theta = (2.0 * energy * e_l - m_l * m_l - q2) / (2.0 * energy * p_l);
        if cos_theta.abs() > 1.0 {
            return Err(InjectorError::injection_failure(format!(
                "kinematically forbidden: cos θ = {:.4}",
                cos_theta
            )));
        }

        let phi = 2.0 * std::f64::consts::PI * rng.uniform();
        let dir = record.primary_direction().deflect(cos_theta, phi);
        let lepton_p = [e_l, p_l * dir.x, p_l * dir.y, p_l * dir.z];

        // Hadronic system takes the remaining four-momentum
        let mut hadron_p = [0.0; 4];
        for k in 0..4 {
            hadron_p[k] = record.primary_momentum[k] + record.target_momentum[k] - lepton_p[k];
        }
        let hadron_p3 = Vec3::new(hadron_p[1], hadron_p[2], hadron_p[3]);
        let hadron_mass = (hadron_p[0] * hadron_p[0] - hadron_p3.mag_squared()).max(0.0).sqrt();

        record.signature.secondary_types = vec![lepton, ParticleType::Hadrons];
        record.secondary_masses = vec![m_l, hadron_mass];
        record.secondary_momenta = vec![lepton_p, hadron_p];
        record.secondary_helicities = vec![record.primary_helicity, 0.0];

        record.interaction_parameters.insert("energy".into(), energy);
        record.interaction_parameters.insert("bjorken_x".into(), x);
        record.interaction_parameters.insert("bjorken_y".into(), y);
        record.interaction_parameters.insert("q2".into(), q2);
        Ok(())
    }

    fn possible_primaries(&self) -> Vec<ParticleType> {
        self.primaries.iter().copied().collect()
    }

    fn possible_targets(&self) -> Vec<ParticleType> {
        self.targets.iter().copied().collect()
    }

    fn signatures(&self, primary: ParticleType) -> Vec<InteractionSignature> {
        if !self.primaries.contains(&primary) {
            return Vec::new();
        }
        let Some(lepton) = self.outgoing_lepton(primary) else {
            return Vec::new();
        };
        self.targets
            .iter()
            .map(|&target_type| InteractionSignature {
                primary_type: primary,
                target_type,
                secondary_types: vec![lepton, ParticleType::Hadrons],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceRoot;
    use tempfile::TempDir;

    fn total_table() -> TotalCrossSectionTable {
        TotalCrossSectionTable {
            interaction: InteractionKind::ChargedCurrent,
            unit: CrossSectionUnit::Cm2,
            log10_energy: vec![2.0, 3.0, 4.0],
            log10_sigma: vec![-36.0, -35.0, -34.5],
        }
    }

    fn differential_table() -> DifferentialCrossSectionTable {
        let grid = vec![vec![0.1, 0.9], vec![0.5, 0.5]];
        DifferentialCrossSectionTable {
            interaction: InteractionKind::ChargedCurrent,
            target_mass: M_NUCLEON,
            minimum_q2: 1.0,
            log10_energy: vec![2.0, 4.0],
            log10_x_edges: vec![-2.0, -1.0, 0.0],
            log10_y_edges: vec![-2.0, -1.0, 0.0],
            values: vec![grid.clone(), grid],
        }
    }

    fn model() -> DisFromSpline {
        DisFromSpline::from_tables(
            differential_table(),
            total_table(),
            &[ParticleType::NuMu],
            &[ParticleType::Nucleon],
        )
        .unwrap()
    }

    #[test]
    fn test_total_interpolation() {
        let table = total_table();
        assert!(table.validate().is_ok());

        let at_node = table.evaluate(1e3);
        assert!((at_node / 1e-39 - 1.0).abs() < 1e-9);

        // Halfway in log E is halfway in log σ
        let mid = table.evaluate(10f64.powf(2.5));
        assert!((mid.log10() + 39.5).abs() < 1e-9);

        // Clamped outside the table
        assert_eq!(table.evaluate(1.0), table.evaluate(1e2));
        assert_eq!(table.evaluate(1e9), table.evaluate(1e4));
    }

    #[test]
    fn test_table_validation() {
        let mut table = total_table();
        table.log10_sigma.pop();
        assert!(table.validate().is_err());

        let mut diff = differential_table();
        diff.values[1][0].push(1.0);
        assert!(diff.validate().is_err());

        let mut diff = differential_table();
        diff.log10_x_edges = vec![-1.0, 0.0, 1.0];
        assert!(diff.validate().is_err());
    }

    #[test]
    fn test_from_tables_rejects_malformed() {
        let mut total = total_table();
        total.log10_sigma = vec![-36.0];
        let result = DisFromSpline::from_tables(
            differential_table(),
            total,
            &[ParticleType::NuMu],
            &[ParticleType::Nucleon],
        );
        assert!(matches!(result, Err(InjectorError::Configuration(_))));

        let mut diff = differential_table();
        diff.log10_energy = vec![3.0];
        diff.values.pop();
        let result = DisFromSpline::from_tables(
            diff,
            total_table(),
            &[ParticleType::NuMu],
            &[ParticleType::Nucleon],
        );
        assert!(matches!(result, Err(InjectorError::Configuration(_))));
    }

    #[test]
    fn test_short_tables_do_not_panic() {
        let mut total = total_table();
        total.log10_sigma = vec![-36.0];
        assert_eq!(total.evaluate(500.0), 0.0);

        let mut diff = differential_table();
        diff.log10_energy = vec![3.0];
        diff.values.pop();
        let mut rng = RandomGenerator::new(1);
        assert!(matches!(diff.sample_xy(1e3, &mut rng), Err(InjectorError::Configuration(_))));
    }

    #[test]
    fn test_model_restricts_types() {
        let dis = model();
        assert!(dis.total_cross_section(ParticleType::NuMu, 1e3, ParticleType::Nucleon) > 0.0);
        assert_eq!(dis.total_cross_section(ParticleType::NuE, 1e3, ParticleType::Nucleon), 0.0);
        assert_eq!(dis.total_cross_section(ParticleType::NuMu, 1e3, ParticleType::EMinus), 0.0);

        let sigs = dis.signatures(ParticleType::NuMu);
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].secondary_types, vec![ParticleType::MuMinus, ParticleType::Hadrons]);

        let bad = DisFromSpline::from_tables(
            differential_table(),
            total_table(),
            &[ParticleType::MuMinus],
            &[ParticleType::Nucleon],
        );
        assert!(matches!(bad, Err(InjectorError::Configuration(_))));
    }

    #[test]
    fn test_final_state_conserves_momentum() {
        let dis = model();
        let mut rng = RandomGenerator::new(17);

        for _ in 0..200 {
            let mut record = InteractionRecord::new(ParticleType::NuMu);
            record.set_primary_kinematics(5e3, Vec3::new(0.3, -0.2, 0.9));
            record.set_target(ParticleType::Nucleon);

            match dis.sample_final_state(&mut record, &mut rng) {
                Ok(()) => {}
                Err(e) => {
                    assert!(e.is_retryable());
                    continue;
                }
            }

            for k in 0..4 {
                let before = record.primary_momentum[k] + record.target_momentum[k];
                let after: f64 = record.secondary_momenta.iter().map(|p| p[k]).sum();
                assert!((before - after).abs() < 1e-6 * before.abs().max(1.0));
            }
            let q2 = record.interaction_parameters["q2"];
            assert!(q2 >= 1.0);
            assert_eq!(record.signature.secondary_types[0], ParticleType::MuMinus);
        }
    }

    #[test]
    fn test_load_bundled_tables() {
        let dir = ResourceRoot::bundled().cross_section_dir("CSMSDISSplines");
        let dis = DisFromSpline::from_files(
            dir.join("dsdxdy_nu_CC_iso.json"),
            dir.join("sigma_nu_CC_iso.json"),
            &[ParticleType::NuMu],
            &[ParticleType::Nucleon],
        )
        .unwrap();

        let s3 = dis.total_cross_section(ParticleType::NuMu, 1e3, ParticleType::Nucleon);
        let s6 = dis.total_cross_section(ParticleType::NuMu, 1e6, ParticleType::Nucleon);
        assert!(s3 > 1e-40 && s3 < 1e-38, "σ(1 TeV) = {}", s3);
        assert!(s6 > s3);
    }

    #[test]
    fn test_missing_table_is_resource_error() {
        let dir = TempDir::new().unwrap();
        let result = DisFromSpline::from_files(
            dir.path().join("dsdxdy.json"),
            dir.path().join("sigma.json"),
            &[ParticleType::NuMu],
            &[ParticleType::Nucleon],
        );
        assert!(matches!(result, Err(InjectorError::Resource { .. })));
    }
}
