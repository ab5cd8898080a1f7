//! # Events
//!
//! Generated events and their on-disk forms.
//!
//! ## Output Files
//!
//! ```text
//! <prefix>.json   # full EventSet, loadable with EventSet::load
//! <prefix>.csv    # one row per event, flat summary
//! ```
//!
//! Both files are written to temporary siblings first. Only when both are
//! complete are they renamed into place, so a failed save leaves the
//! previous pair untouched.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dataclasses::{InteractionRecord, ParticleType};
use crate::error::{InjectorError, InjectorResult};

/// One weighted interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub index: usize,
    pub record: InteractionRecord,
    pub weight: f64,
    /// Probability that the primary interacted along its injection path
    pub interaction_probability: f64,
    /// Sampling attempts spent on this event (1 when the first succeeded)
    pub attempts: usize,
}

/// The result of one generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSet {
    pub experiment: String,
    pub primary_type: ParticleType,
    pub seed: u64,
    pub events_to_inject: usize,
    /// Attempts rejected with an injection failure
    pub failed_attempts: usize,
    pub events: Vec<Event>,
}

/// One line of `<prefix>.csv`
#[derive(Debug, Clone, Serialize)]
struct CsvRow {
    index: usize,
    primary_type: ParticleType,
    target_type: ParticleType,
    energy: f64,
    dir_x: f64,
    dir_y: f64,
    dir_z: f64,
    vertex_x: f64,
    vertex_y: f64,
    vertex_z: f64,
    initial_x: f64,
    initial_y: f64,
    initial_z: f64,
    bjorken_x: f64,
    bjorken_y: f64,
    q2: f64,
    lepton_type: Option<ParticleType>,
    lepton_energy: f64,
    hadron_energy: f64,
    interaction_probability: f64,
    weight: f64,
    attempts: usize,
}

impl From<&Event> for CsvRow {
    fn from(event: &Event) -> Self {
        let r = &event.record;
        let dir = r.primary_direction();
        let param = |name: &str| r.interaction_parameters.get(name).copied().unwrap_or(f64::NAN);
        let secondary_energy = |i: usize| r.secondary_momenta.get(i).map_or(f64::NAN, |p| p[0]);

        Self {
            index: event.index,
            primary_type: r.signature.primary_type,
            target_type: r.signature.target_type,
            energy: r.primary_energy(),
            dir_x: dir.x,
            dir_y: dir.y,
            dir_z: dir.z,
            vertex_x: r.interaction_vertex.x,
            vertex_y: r.interaction_vertex.y,
            vertex_z: r.interaction_vertex.z,
            initial_x: r.primary_initial_position.x,
            initial_y: r.primary_initial_position.y,
            initial_z: r.primary_initial_position.z,
            bjorken_x: param("bjorken_x"),
            bjorken_y: param("bjorken_y"),
            q2: param("q2"),
            lepton_type: r.signature.secondary_types.first().copied(),
            lepton_energy: secondary_energy(0),
            hadron_energy: secondary_energy(1),
            interaction_probability: event.interaction_probability,
            weight: event.weight,
            attempts: event.attempts,
        }
    }
}

/// Column names of [`CsvRow`], written even when there are no events
const CSV_COLUMNS: [&str; 22] = [
    "index",
    "primary_type",
    "target_type",
    "energy",
    "dir_x",
    "dir_y",
    "dir_z",
    "vertex_x",
    "vertex_y",
    "vertex_z",
    "initial_x",
    "initial_y",
    "initial_z",
    "bjorken_x",
    "bjorken_y",
    "q2",
    "lepton_type",
    "lepton_energy",
    "hadron_energy",
    "interaction_probability",
    "weight",
    "attempts",
];

impl EventSet {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Σ weights
    pub fn total_weight(&self) -> f64 {
        self.events.iter().map(|e| e.weight).sum()
    }

    /// Paths written by [`save`](Self::save) for a prefix
    pub fn output_paths(prefix: impl AsRef<Path>) -> (PathBuf, PathBuf) {
        let prefix = prefix.as_ref();
        (with_suffix(prefix, "json"), with_suffix(prefix, "csv"))
    }

    /// Write `<prefix>.json` and `<prefix>.csv`, creating parent directories
    pub fn save(&self, prefix: impl AsRef<Path>) -> InjectorResult<(PathBuf, PathBuf)> {
        let (json_path, csv_path) = Self::output_paths(prefix);
        if let Some(parent) = json_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json_tmp = with_suffix(&json_path, "tmp");
        let csv_tmp = with_suffix(&csv_path, "tmp");
        let staged = self
            .stage(&json_tmp, &csv_tmp)
            .and_then(|()| fs::rename(&json_tmp, &json_path).map_err(InjectorError::from))
            .and_then(|()| fs::rename(&csv_tmp, &csv_path).map_err(InjectorError::from));
        if let Err(e) = staged {
            let _ = fs::remove_file(&json_tmp);
            let _ = fs::remove_file(&csv_tmp);
            return Err(e);
        }

        info!(
            events = self.events.len(),
            json = %json_path.display(),
            csv = %csv_path.display(),
            "Saved events"
        );
        Ok((json_path, csv_path))
    }

    /// Write both temporary files in full
    fn stage(&self, json_tmp: &Path, csv_tmp: &Path) -> InjectorResult<()> {
        let json = serde_json::to_vec(self)?;
        debug!(bytes = json.len(), "Event set serialized");
        fs::write(json_tmp, &json)?;

        let file = fs::File::create(csv_tmp)?;
        self.write_csv(io::BufWriter::new(file))
    }

    /// Read an event set written by [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>) -> InjectorResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| InjectorError::resource(path, e.to_string()))?;
        let set: Self = serde_json::from_slice(&bytes)?;
        debug!(path = %path.display(), events = set.events.len(), "Loaded events");
        Ok(set)
    }

    /// Flat table, one row per event, after a header line
    pub fn write_csv<W: Write>(&self, writer: W) -> InjectorResult<()> {
        let mut out = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        out.write_record(CSV_COLUMNS)?;
        for event in &self.events {
            out.serialize(CsvRow::from(event))?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> InjectorResult<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| InjectorError::Generation(e.to_string()))
    }
}

/// Read an event set saved under a prefix or a `.json` path
pub fn load_events(path: impl AsRef<Path>) -> InjectorResult<EventSet> {
    let path = path.as_ref();
    if path.extension().is_some_and(|e| e == "json") {
        EventSet::load(path)
    } else {
        EventSet::load(with_suffix(path, "json"))
    }
}

/// `prefix` with `.ext` appended (not replacing any existing extension)
fn with_suffix(prefix: &Path, ext: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;
    use tempfile::TempDir;

    fn sample_set() -> EventSet {
        let events = (0..3)
            .map(|i| {
                let mut record = InteractionRecord::new(ParticleType::NuMu);
                record.set_primary_kinematics(1e3 * (i + 1) as f64, Vec3::new(0.1, 0.2, 0.7));
                record.set_target(ParticleType::Nucleon);
                record.interaction_vertex = Vec3::new(1.0 / 3.0, -2.5, 1e-7 * i as f64);
                record.signature.secondary_types = vec![ParticleType::MuMinus, ParticleType::Hadrons];
                record.secondary_momenta = vec![[600.0, 0.0, 0.0, 600.0], [400.0 + 0.1, 0.0, 0.0, 399.0]];
                record.interaction_parameters.insert("bjorken_x".into(), 0.123456789);
                Event {
                    index: i,
                    record,
                    weight: 0.1 + i as f64,
                    interaction_probability: 1e-5 / 3.0,
                    attempts: 1,
                }
            })
            .collect();

        EventSet {
            experiment: "DUNEFD".into(),
            primary_type: ParticleType::NuMu,
            seed: 7,
            events_to_inject: 3,
            failed_attempts: 0,
            events,
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("output").join("DUNE_DIS");
        let set = sample_set();

        let (json, csv) = set.save(&prefix).unwrap();
        assert_eq!(json, dir.path().join("output/DUNE_DIS.json"));
        assert!(csv.is_file());
        assert!(!with_suffix(&json, "tmp").exists());

        let loaded = EventSet::load(&json).unwrap();
        assert_eq!(loaded, set);
        assert_eq!(load_events(&prefix).unwrap(), set);
    }

    #[test]
    fn test_csv_rows() {
        let set = sample_set();
        let csv_text = set.to_csv().unwrap();
        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), CSV_COLUMNS.len());
        assert_eq!(headers.get(0), Some("index"));
        assert_eq!(headers.get(21), Some("attempts"));

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].iter().take(3).collect::<Vec<_>>(), vec!["0", "NuMu", "Nucleon"]);
        assert_eq!(&rows[0][16], "MuMinus");
        assert_eq!(rows[2][20].parse::<f64>().unwrap(), set.events[2].weight);
        // bjorken_y is absent from the records
        assert_eq!(&rows[1][14], "NaN");
    }

    #[test]
    fn test_csv_header_without_events() {
        let mut set = sample_set();
        set.events.clear();
        let csv = set.to_csv().unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert_eq!(csv.trim_end().split(',').count(), CSV_COLUMNS.len());
    }

    #[test]
    fn test_failed_save_keeps_previous_pair() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("DUNE_DIS");
        let first = sample_set();
        let (json, csv) = first.save(&prefix).unwrap();
        let first_csv = fs::read_to_string(&csv).unwrap();

        // A directory where the csv staging file goes makes the second save fail
        fs::create_dir(with_suffix(&csv, "tmp")).unwrap();
        let mut second = sample_set();
        second.seed = 8;
        second.events.truncate(1);
        assert!(second.save(&prefix).is_err());

        assert_eq!(EventSet::load(&json).unwrap(), first);
        assert_eq!(fs::read_to_string(&csv).unwrap(), first_csv);
        assert!(!with_suffix(&json, "tmp").exists());
    }

    #[test]
    fn test_prefix_keeps_dots() {
        let (json, csv) = EventSet::output_paths("runs/v1.2/events");
        assert_eq!(json, PathBuf::from("runs/v1.2/events.json"));
        assert_eq!(csv, PathBuf::from("runs/v1.2/events.csv"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = EventSet::load(dir.path().join("nothing.json"));
        assert!(matches!(result, Err(InjectorError::Resource { .. })));
    }
}
