//! Statistics collection and export for the simulator.
//!
//! This module provides run statistics and multiple export formats (JSON,
//! CSV, plain-text summary) for simulation analysis.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::propagator::PropagatorStats;
use crate::types::SimTime;

/// Aggregate statistics for a simulation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Simulation metadata
    pub metadata: SimulationMetadata,

    /// Engine-level statistics
    pub engine: EngineStats,

    /// Timing statistics
    pub timing: TimingStats,
}

/// Metadata about the simulation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetadata {
    /// Name of the root circuit
    pub name: String,

    /// Start time (wall clock)
    pub start_time: Option<String>,

    /// End time (wall clock)
    pub end_time: Option<String>,

    /// Crate version
    pub version: String,
}

/// Counters of the root propagator plus topology figures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Final logical time
    pub final_time: SimTime,

    /// Completed drains
    pub drains: u64,

    /// Propagation steps
    pub steps: u64,

    /// Events applied to ports
    pub events_applied: u64,

    /// Component propagations
    pub evaluations: u64,

    /// Drains that ended oscillating
    pub oscillations: u64,

    /// Driver conflicts observed
    pub conflicts: u64,

    /// Clock ticks delivered
    pub ticks: u64,

    /// Largest pending queue depth
    pub peak_queue_depth: usize,

    /// Components in the root circuit
    pub component_count: usize,

    /// Nets in the root circuit
    pub net_count: usize,
}

impl EngineStats {
    /// Copies the propagator counters over.
    pub fn record_propagator(&mut self, stats: &PropagatorStats) {
        self.drains = stats.drains;
        self.steps = stats.steps;
        self.events_applied = stats.events_applied;
        self.evaluations = stats.evaluations;
        self.oscillations = stats.oscillations;
        self.conflicts = stats.conflicts;
    }
}

/// Timing/performance statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    /// Total wall-clock time in milliseconds
    pub total_wall_time_ms: f64,

    /// Propagation steps per wall-clock second
    pub steps_per_second: f64,

    /// Events applied per second
    pub events_per_second: f64,

    /// Ticks per second
    pub ticks_per_second: f64,
}

impl SimulationStats {
    /// Creates a new empty statistics container.
    pub fn new() -> Self {
        Self {
            metadata: SimulationMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..SimulationMetadata::default()
            },
            ..Self::default()
        }
    }

    /// Sets the simulation name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    /// Records the end time.
    pub fn record_end(&mut self) {
        self.metadata.end_time = Some(timestamp());
    }

    /// Updates timing statistics based on wall clock time.
    pub fn compute_timing(&mut self, wall_time_ms: f64) {
        self.timing.total_wall_time_ms = wall_time_ms;

        if wall_time_ms > 0.0 {
            let seconds = wall_time_ms / 1000.0;
            self.timing.steps_per_second = self.engine.steps as f64 / seconds;
            self.timing.events_per_second = self.engine.events_applied as f64 / seconds;
            self.timing.ticks_per_second = self.engine.ticks as f64 / seconds;
        }
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        })?;
        std::fs::write(path, json)
    }

    /// Exports summary statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("metric,value\n");

        csv.push_str(&format!("final_time,{}\n", self.engine.final_time));
        csv.push_str(&format!("drains,{}\n", self.engine.drains));
        csv.push_str(&format!("steps,{}\n", self.engine.steps));
        csv.push_str(&format!("events_applied,{}\n", self.engine.events_applied));
        csv.push_str(&format!("evaluations,{}\n", self.engine.evaluations));
        csv.push_str(&format!("oscillations,{}\n", self.engine.oscillations));
        csv.push_str(&format!("conflicts,{}\n", self.engine.conflicts));
        csv.push_str(&format!("ticks,{}\n", self.engine.ticks));
        csv.push_str(&format!("peak_queue_depth,{}\n", self.engine.peak_queue_depth));
        csv.push_str(&format!("component_count,{}\n", self.engine.component_count));
        csv.push_str(&format!("net_count,{}\n", self.engine.net_count));

        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.timing.total_wall_time_ms));
        csv.push_str(&format!("steps_per_second,{:.2}\n", self.timing.steps_per_second));
        csv.push_str(&format!("events_per_second,{:.2}\n", self.timing.events_per_second));

        csv
    }

    /// Exports summary statistics to CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Simulation Statistics ===")?;
        writeln!(w)?;

        if !self.metadata.name.is_empty() {
            writeln!(w, "Circuit: {}", self.metadata.name)?;
        }
        if let Some(ref start) = self.metadata.start_time {
            writeln!(w, "Started: {}", start)?;
        }
        if let Some(ref end) = self.metadata.end_time {
            writeln!(w, "Ended: {}", end)?;
        }
        writeln!(w)?;

        writeln!(w, "--- Engine ---")?;
        writeln!(w, "Final logical time: {}", self.engine.final_time)?;
        writeln!(w, "Drains: {}", self.engine.drains)?;
        writeln!(w, "Propagation steps: {}", self.engine.steps)?;
        writeln!(w, "Events applied: {}", self.engine.events_applied)?;
        writeln!(w, "Evaluations: {}", self.engine.evaluations)?;
        writeln!(w, "Oscillations: {}", self.engine.oscillations)?;
        writeln!(w, "Driver conflicts: {}", self.engine.conflicts)?;
        writeln!(w, "Ticks: {}", self.engine.ticks)?;
        writeln!(w, "Peak queue depth: {}", self.engine.peak_queue_depth)?;
        writeln!(w, "Components: {}, Nets: {}", self.engine.component_count, self.engine.net_count)?;
        writeln!(w)?;

        writeln!(w, "--- Timing ---")?;
        writeln!(w, "Wall time: {:.2} ms", self.timing.total_wall_time_ms)?;
        writeln!(w, "Steps/sec: {:.2}", self.timing.steps_per_second)?;
        writeln!(w, "Events/sec: {:.2}", self.timing.events_per_second)?;

        Ok(())
    }

    /// Returns a summary string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        if self.write_summary(&mut buf).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// A simple timer for measuring wall-clock time.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

/// Wall-clock bookkeeping a simulator keeps when `collect_stats` is on.
///
/// Only time spent inside drains is counted, so rates reflect simulation
/// work and not host idle time between stimuli.
#[derive(Clone, Debug)]
pub struct StatsCollector {
    started_at: String,
    busy_ms: f64,
    timed_drains: u64,
}

impl StatsCollector {
    /// Starts collecting; the start timestamp is taken now.
    pub fn new() -> Self {
        Self {
            started_at: timestamp(),
            busy_ms: 0.0,
            timed_drains: 0,
        }
    }

    /// Adds the wall time of one drain.
    pub fn record_drain(&mut self, timer: &Timer) {
        self.busy_ms += timer.elapsed_ms();
        self.timed_drains += 1;
    }

    /// Milliseconds spent draining so far.
    pub fn busy_ms(&self) -> f64 {
        self.busy_ms
    }

    /// Drains timed so far.
    pub fn timed_drains(&self) -> u64 {
        self.timed_drains
    }

    /// Fills in metadata timestamps and timing rates. The engine counters
    /// must already be recorded.
    pub fn finish(&self, stats: &mut SimulationStats) {
        stats.metadata.start_time = Some(self.started_at.clone());
        stats.record_end();
        stats.compute_timing(self.busy_ms);
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds since the Unix epoch, as a string.
fn timestamp() -> String {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    format!("{}s", duration.as_secs())
}
