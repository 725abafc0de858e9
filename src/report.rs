//! Run output: the run report, per-tick location export and the text data
//! streams.
//!
//! Everything here sits outside the simulation core and only ever reads
//! snapshots.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::agent::AgentSnapshot;
use crate::config::Config;
use crate::geometry::Coord;
use crate::log::{DataLogger, ROBOT_DATA, STRUCTURE_DATA};
use crate::structure::BeamSnapshot;
use crate::swarm::{SwarmSnapshot, TickReport};

/// File name of the run report inside a run directory.
pub const RUN_REPORT_FILE: &str = "run_data.json";
/// File name of the per-tick location export.
pub const LOCATIONS_FILE: &str = "locations.jsonl";

/// Directory for a run started at `started`: `<output_dir>/<YYYYmmdd-HHMMSS>`.
pub fn run_dir(output_dir: &Path, started: &DateTime<Local>) -> PathBuf {
    output_dir.join(started.format("%Y%m%d-%H%M%S").to_string())
}

/// Metadata written once a run finishes.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started: String,
    pub finished: Option<String>,
    pub ticks_run: usize,
    pub interrupted: bool,
    pub beams: usize,
    pub max_height: f64,
    pub agents: usize,
    pub config: Config,
}

impl RunReport {
    pub fn new(config: &Config, started: &DateTime<Local>) -> Self {
        Self {
            started: started.to_rfc3339(),
            finished: None,
            ticks_run: 0,
            interrupted: false,
            beams: 0,
            max_height: 0.0,
            agents: config.agents_count + config.agents_walkers,
            config: config.clone(),
        }
    }

    /// Record the final state of a run.
    pub fn finish(&mut self, ticks_run: usize, interrupted: bool, last: Option<&TickReport>) {
        self.finished = Some(Local::now().to_rfc3339());
        self.ticks_run = ticks_run;
        self.interrupted = interrupted;
        if let Some(last) = last {
            self.beams = last.beams;
            self.max_height = last.height;
        }
    }

    /// Write the report as pretty JSON into `dir`.
    pub fn write(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(RUN_REPORT_FILE);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(path)
    }
}

#[derive(Serialize)]
struct LocationRecord<'a> {
    tick: usize,
    locations: BTreeMap<&'a str, Coord>,
}

/// Everything written for one run directory.
pub struct RunRecorder {
    dir: PathBuf,
    every: usize,
    robots: DataLogger,
    structure: DataLogger,
}

impl RunRecorder {
    /// Open the output streams inside `dir`, recording every `every` ticks.
    pub fn create(dir: &Path, every: usize, run: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let robots = DataLogger::new(dir, ROBOT_DATA, "robots");
        let structure = DataLogger::new(dir, STRUCTURE_DATA, "structure");
        robots.log_session_start(run)?;
        structure.log_session_start(run)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            every: every.max(1),
            robots,
            structure,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record a tick if it falls on the reporting interval.
    ///
    /// Returns whether anything was written.
    pub fn record(&self, snapshot: &SwarmSnapshot) -> io::Result<bool> {
        if snapshot.tick % self.every != 0 {
            return Ok(false);
        }
        for agent in &snapshot.agents {
            self.robots.log(&agent_line(snapshot.tick, agent))?;
        }
        for beam in &snapshot.beams {
            self.structure.log(&beam_line(snapshot.tick, beam))?;
        }
        self.append_locations(snapshot)?;
        Ok(true)
    }

    fn append_locations(&self, snapshot: &SwarmSnapshot) -> io::Result<()> {
        let record = LocationRecord {
            tick: snapshot.tick,
            locations: snapshot
                .agents
                .iter()
                .map(|agent| (agent.name.as_str(), agent.location))
                .collect(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(LOCATIONS_FILE))?;
        serde_json::to_writer(&mut file, &record)?;
        file.write_all(b"\n")
    }
}

fn fmt_coord(p: &Coord) -> String {
    format!("[{:.3}, {:.3}, {:.3}]", p.x, p.y, p.z)
}

/// One robot data line.
pub fn agent_line(tick: usize, agent: &AgentSnapshot) -> String {
    let beam = agent
        .current_beam
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "tick={} name={} location={} beams={} weight={:.3} state={:?} beam={} constructed={} broken={}",
        tick,
        agent.name,
        fmt_coord(&agent.location),
        agent.carried_beam_count,
        agent.weight,
        agent.state,
        beam,
        agent.memory.constructed,
        agent.memory.broken_members.len()
    )
}

/// One structure data line.
pub fn beam_line(tick: usize, beam: &BeamSnapshot) -> String {
    format!(
        "tick={} beam={} i={} j={} joints={}",
        tick,
        beam.id,
        fmt_coord(&beam.endpoints.i),
        fmt_coord(&beam.endpoints.j),
        beam.joints.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::BeamId;
    use crate::geometry::coord;
    use crate::swarm::Swarm;
    use crate::testutil::small_config;
    use tempfile::TempDir;

    #[test]
    fn test_run_dir_uses_start_time() {
        let started = Local::now();
        let dir = run_dir(Path::new("runs"), &started);
        assert!(dir.starts_with("runs"));
        assert_eq!(dir.file_name().unwrap().len(), "20260101-000000".len());
    }

    #[test]
    fn test_report_written_as_json() {
        let temp = TempDir::new().unwrap();
        let config = small_config();
        let mut report = RunReport::new(&config, &Local::now());
        let last = TickReport {
            tick: 4,
            beams: 3,
            height: 2.5,
            ..TickReport::default()
        };
        report.finish(4, true, Some(&last));
        let path = report.write(temp.path()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["ticks_run"], 4);
        assert_eq!(value["interrupted"], true);
        assert_eq!(value["beams"], 3);
        assert_eq!(value["agents"], 3);
        assert!(value["finished"].is_string());
        assert_eq!(value["config"]["beam_length"], 1.0);
    }

    #[test]
    fn test_recorder_writes_every_stream() {
        let temp = TempDir::new().unwrap();
        let mut swarm = Swarm::new(small_config());
        swarm
            .structure_mut()
            .add_beam(coord(5.0, 5.0, 0.0), coord(5.0, 5.0, 1.0), BeamId(0));
        swarm.tick().unwrap();

        let recorder = RunRecorder::create(temp.path(), 1, "test").unwrap();
        assert!(recorder.record(&swarm.snapshot()).unwrap());

        let robots = fs::read_to_string(temp.path().join("robot_data.log")).unwrap();
        assert!(robots.contains("name=Aaron"));
        let structure = fs::read_to_string(temp.path().join("structure.log")).unwrap();
        assert!(structure.contains("beam=B0"));

        let locations = fs::read_to_string(temp.path().join(LOCATIONS_FILE)).unwrap();
        let first: serde_json::Value = serde_json::from_str(locations.lines().next().unwrap()).unwrap();
        assert_eq!(first["tick"], 1);
        assert_eq!(first["locations"]["Aaron"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_recorder_skips_off_interval_ticks() {
        let temp = TempDir::new().unwrap();
        let mut swarm = Swarm::new(small_config());
        swarm.tick().unwrap();

        let recorder = RunRecorder::create(temp.path(), 2, "test").unwrap();
        assert!(!recorder.record(&swarm.snapshot()).unwrap());
        assert!(!temp.path().join(LOCATIONS_FILE).exists());

        swarm.tick().unwrap();
        assert!(recorder.record(&swarm.snapshot()).unwrap());
    }

    #[test]
    fn test_beam_line_format() {
        let config = small_config();
        let structure =
            crate::testutil::structure_with(&config, &[(coord(1.0, 1.0, 0.0), coord(1.0, 1.0, 1.0))]);
        let line = beam_line(3, &structure.snapshot()[0]);
        assert_eq!(line, "tick=3 beam=B0 i=[1.000, 1.000, 0.000] j=[1.000, 1.000, 1.000] joints=0");
    }
}
