//! The simulator facade.
//!
//! A `Simulator` owns the root circuit, its state tree and the root
//! propagator, and is the single serialized entry point for everything a
//! host does: injecting stimuli, draining, single-stepping, ticking clocks,
//! editing topology and observing values.
//!
//! # State machine
//!
//! ```text
//!            stimulus / tick             fixed point
//!   Idle ───────────────────▶ Draining ───────────────▶ Idle
//!                                │
//!                                │ step limit hit
//!                                ▼
//!                           Oscillating ── reset ──▶ Idle
//!
//!   any ── stop ──▶ Stopped ── reset ──▶ Idle
//! ```
//!
//! Topology edits are only accepted while idle. An oscillating simulator
//! keeps its last, unsettled values and pending events until it is reset;
//! further stimuli resume draining where the step limit cut it off. An
//! oscillation inside a sub-circuit instance ends the root drain as
//! oscillating too.
//!
//! Each tick advances logical time by one before the clocks fire.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::components::wiring::Pin;
use crate::config::SimConfig;
use crate::diagnostics::Diagnostic;
use crate::error::{SimError, SimResult};
use crate::geometry::Location;
use crate::propagator::{DrainOutcome, DrainReport, Propagator, StepReport};
use crate::state::CircuitState;
use crate::stats::{SimulationStats, StatsCollector, Timer};
use crate::types::{ComponentId, NetId, PortRef, SimTime};
use crate::value::Value;

/// Lifecycle state of a simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimState {
    /// Settled; topology edits allowed
    Idle,
    /// Events pending, e.g. between manual steps
    Draining,
    /// The last drain hit the step limit
    Oscillating,
    /// Halted by the host until reset
    Stopped,
}

/// Callback fired after every completed drain.
pub type DrainListener = Box<dyn FnMut(&DrainReport) + Send>;

/// The simulation kernel for one root circuit.
///
/// # Example
///
/// ```rust
/// use kairo::{Circuit, Location, Simulator, Value};
/// use kairo::components::{NotGate, Pin};
///
/// let mut circuit = Circuit::new("inverter");
/// let a = circuit.add(Location::new(0, 0), Pin::input(1));
/// let not = circuit.add(Location::new(60, 0), NotGate::new(1, 1));
/// let y = circuit.add(Location::new(100, 0), Pin::output(1));
/// circuit.connect((a, 0), (not, 0)).unwrap();
/// circuit.connect((not, 1), (y, 0)).unwrap();
///
/// let mut sim = Simulator::new(circuit);
/// sim.propagate_once().unwrap();
/// assert_eq!(sim.pin_value(y), Some(Value::TRUE));
///
/// sim.set_pin_value(a, Value::TRUE).unwrap();
/// assert_eq!(sim.pin_value(y), Some(Value::FALSE));
/// ```
pub struct Simulator {
    circuit: Circuit,
    state: CircuitState,
    propagator: Propagator,
    status: SimState,
    ticks: u64,
    config: SimConfig,
    listeners: Vec<DrainListener>,
    diagnostics: Vec<Diagnostic>,
    collector: Option<StatsCollector>,
}

impl Simulator {
    /// Creates a simulator with default configuration.
    pub fn new(circuit: Circuit) -> Self {
        Self::with_config(circuit, SimConfig::default())
    }

    /// Creates a simulator with the given configuration.
    pub fn with_config(circuit: Circuit, config: SimConfig) -> Self {
        tracing::debug!(
            circuit = circuit.name(),
            step_limit = config.simulation.step_limit,
            auto_propagate = config.simulation.auto_propagate,
            collect_stats = config.simulation.collect_stats,
            "creating simulator"
        );
        let collector = config.simulation.collect_stats.then(StatsCollector::new);
        Self {
            circuit,
            state: CircuitState::root(),
            propagator: Propagator::new(config.simulation.step_limit),
            status: SimState::Idle,
            ticks: 0,
            config,
            listeners: Vec::new(),
            diagnostics: Vec::new(),
            collector,
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SimState {
        self.status
    }

    /// Current logical time.
    pub fn time(&self) -> SimTime {
        self.propagator.time()
    }

    /// Ticks delivered since the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The active configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Number of pending events in the root queue.
    pub fn pending_events(&self) -> usize {
        self.propagator.pending()
    }

    fn ensure_running(&self) -> SimResult<()> {
        if self.status == SimState::Stopped {
            return Err(SimError::Stopped);
        }
        Ok(())
    }

    fn absorb(&mut self, diagnostics: Vec<Diagnostic>) {
        for diagnostic in diagnostics {
            diagnostic.log();
            self.diagnostics.push(diagnostic);
        }
    }

    /// Sets an input pin and, with `auto_propagate`, drains immediately.
    ///
    /// Returns the drain report when a drain ran.
    pub fn set_pin_value(&mut self, pin: ComponentId, value: Value) -> SimResult<Option<DrainReport>> {
        self.inject_pin_value(pin, value)?;
        if self.config.simulation.auto_propagate {
            return self.propagate_once().map(Some);
        }
        Ok(None)
    }

    /// Queues an input pin change without draining.
    pub fn inject_pin_value(&mut self, pin: ComponentId, value: Value) -> SimResult<()> {
        self.ensure_running()?;
        self.propagator.set_pin(&self.circuit, &mut self.state, pin, value)?;
        tracing::trace!(pin, %value, "stimulus queued");
        if self.status == SimState::Idle {
            self.status = SimState::Draining;
        }
        Ok(())
    }

    /// Drains all pending work to a fixed point or until the step limit.
    ///
    /// Calling this on a settled circuit with no new stimulus changes
    /// nothing. A contract violation by a component discards the pending
    /// events, returns the simulator to idle and is returned as the error.
    pub fn propagate_once(&mut self) -> SimResult<DrainReport> {
        self.ensure_running()?;
        self.status = SimState::Draining;
        let timer = self.collector.is_some().then(Timer::start);
        let mut diagnostics = Vec::new();
        let result = self.propagator.drain(&self.circuit, &mut self.state, &mut diagnostics);
        if let (Some(collector), Some(timer)) = (self.collector.as_mut(), timer.as_ref()) {
            collector.record_drain(timer);
        }
        self.absorb(diagnostics);

        let report = match result {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(error = %err, "drain aborted");
                self.propagator.clear();
                self.status = SimState::Idle;
                return Err(err);
            }
        };

        self.status = match report.outcome {
            DrainOutcome::Settled => SimState::Idle,
            DrainOutcome::Oscillating => SimState::Oscillating,
        };
        tracing::debug!(
            time = report.time,
            steps = report.steps,
            outcome = ?report.outcome,
            changed = report.changed_nets.len(),
            "drain complete"
        );
        for listener in &mut self.listeners {
            listener(&report);
        }
        Ok(report)
    }

    /// Runs a single propagation step: one time slot of the queue.
    ///
    /// Returns `None` if nothing was pending.
    pub fn step(&mut self) -> SimResult<Option<StepReport>> {
        self.ensure_running()?;
        let mut diagnostics = Vec::new();
        let result = self.propagator.step(&self.circuit, &mut self.state, &mut diagnostics);
        self.absorb(diagnostics);

        let report = match result {
            Ok(report) => report,
            Err(err) => {
                self.propagator.clear();
                self.status = SimState::Idle;
                return Err(err);
            }
        };
        self.status = if self.propagator.is_unsettled() {
            SimState::Oscillating
        } else if self.propagator.is_quiescent(&self.state) {
            SimState::Idle
        } else {
            SimState::Draining
        };
        Ok(report)
    }

    /// Advances logical time by one, flips every clock in the instance
    /// tree and drains.
    pub fn tick(&mut self) -> SimResult<DrainReport> {
        self.ensure_running()?;
        self.ticks += 1;
        self.propagator.advance(1);
        let mut diagnostics = Vec::new();
        let result = self
            .propagator
            .tick_clocks(&self.circuit, &mut self.state, self.ticks, &mut diagnostics);
        self.absorb(diagnostics);
        if let Err(err) = result {
            self.propagator.clear();
            self.status = SimState::Idle;
            return Err(err);
        }
        tracing::trace!(tick = self.ticks, "tick");
        self.propagate_once()
    }

    /// Runs up to `n` ticks, stopping early if one ends oscillating.
    pub fn run_ticks(&mut self, n: u64) -> SimResult<Vec<DrainReport>> {
        let mut reports = Vec::new();
        for _ in 0..n {
            let report = self.tick()?;
            let settled = report.is_settled();
            reports.push(report);
            if !settled {
                break;
            }
        }
        Ok(reports)
    }

    /// Clears every net to `X`, drops pending events and component data,
    /// and returns to idle. Also leaves the stopped state.
    pub fn reset(&mut self) {
        self.state.reset();
        self.propagator.reset();
        self.ticks = 0;
        self.status = SimState::Idle;
        tracing::debug!(circuit = self.circuit.name(), "simulator reset");
    }

    /// Halts the simulator and discards pending events. Stimuli, drains
    /// and ticks fail until reset.
    pub fn stop(&mut self) {
        self.propagator.clear();
        self.status = SimState::Stopped;
        tracing::debug!(circuit = self.circuit.name(), "simulator stopped");
    }

    /// The root circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    fn ensure_idle(&self) -> SimResult<()> {
        if self.status != SimState::Idle {
            return Err(SimError::NotIdle(self.status));
        }
        Ok(())
    }

    /// Mutable access to the root circuit for topology edits.
    ///
    /// Nets are rebuilt lazily on the next drain.
    pub fn circuit_mut(&mut self) -> SimResult<&mut Circuit> {
        self.ensure_idle()?;
        Ok(&mut self.circuit)
    }

    /// Applies a topology edit and, with `auto_propagate`, re-settles.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Circuit) -> R) -> SimResult<R> {
        self.ensure_idle()?;
        let result = f(&mut self.circuit);
        if self.config.simulation.auto_propagate {
            self.propagate_once()?;
        }
        Ok(result)
    }

    /// The root circuit state.
    pub fn state(&self) -> &CircuitState {
        &self.state
    }

    /// Nested circuit state reached by an instantiation path.
    pub fn state_at(&self, path: &[ComponentId]) -> Option<&CircuitState> {
        self.state.descendant(path)
    }

    /// Resolved value of a root net.
    pub fn net_value(&self, net: NetId) -> Option<Value> {
        self.state.net_value(net)
    }

    /// Value visible at a port of a root component.
    pub fn port_value(&self, component: ComponentId, port: usize) -> Option<Value> {
        let width = self.circuit.component(component)?.component.ports().get(port)?.width;
        Some(self.state.port_value(PortRef::new(component, port), width))
    }

    /// Value of the root net passing through a location.
    pub fn value_at(&self, location: Location) -> Option<Value> {
        self.state.net_value(self.state.netlist().net_at(location)?)
    }

    /// Value on a root pin's net.
    pub fn pin_value(&self, pin: ComponentId) -> Option<Value> {
        self.circuit
            .component(pin)?
            .component
            .as_any()
            .downcast_ref::<Pin>()?;
        self.port_value(pin, 0)
    }

    /// Private data of the component at the end of `path`, e.g.
    /// `[sub, flip_flop]` for a flip-flop inside sub-circuit `sub`.
    pub fn component_data(&self, path: &[ComponentId]) -> Option<&(dyn Any + Send)> {
        let (component, parents) = path.split_last()?;
        self.state.descendant(parents)?.data(*component)
    }

    /// Registers a callback fired after every completed drain.
    pub fn add_listener(&mut self, listener: impl FnMut(&DrainReport) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Diagnostics raised since the last call to
    /// [`take_diagnostics`](Self::take_diagnostics).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Removes and returns the collected diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Statistics of the root propagator. Timing figures are only filled
    /// in with `collect_stats`.
    pub fn stats(&self) -> SimulationStats {
        let mut stats = SimulationStats::new().with_name(self.circuit.name());
        stats.engine.record_propagator(self.propagator.stats());
        stats.engine.final_time = self.propagator.time();
        stats.engine.ticks = self.ticks;
        stats.engine.peak_queue_depth = self.propagator.peak_pending();
        stats.engine.component_count = self.circuit.component_count();
        stats.engine.net_count = self.state.netlist().len();
        if let Some(collector) = &self.collector {
            collector.finish(&mut stats);
        }
        stats
    }

    /// Exports statistics as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        let stats = self.propagator.stats();
        serde_json::json!({
            "engine": {
                "circuit": self.circuit.name(),
                "status": format!("{:?}", self.status),
                "current_time": self.propagator.time(),
                "ticks": self.ticks,
                "drains": stats.drains,
                "steps": stats.steps,
                "events_applied": stats.events_applied,
                "evaluations": stats.evaluations,
                "oscillations": stats.oscillations,
                "conflicts": stats.conflicts,
                "pending_events": self.propagator.pending(),
                "peak_queue_depth": self.propagator.peak_pending(),
                "component_count": self.circuit.component_count(),
                "net_count": self.state.netlist().len(),
                "wall_time_ms": self.collector.as_ref().map(StatsCollector::busy_ms),
            },
        })
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("circuit", &self.circuit.name())
            .field("status", &self.status)
            .field("time", &self.propagator.time())
            .field("ticks", &self.ticks)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
