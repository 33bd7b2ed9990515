//! The event-driven propagation engine.
//!
//! A `Propagator` owns the pending event queue and the logical time of one
//! circuit state. Each step takes every event due at the earliest pending
//! time, applies the writes, re-resolves the touched nets and propagates
//! every component that sees a changed input. A drain repeats steps until
//! nothing is pending (fixed point) or the step limit is hit (oscillation).
//!
//! Sub-circuit instances own a propagator of their own and drain it from
//! inside their `propagate`, so the same algorithm runs at every level of
//! the instance tree.
//!
//! Within one step, events due at the same time apply in the order they
//! were scheduled, and the components they wake run in that order too.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::component::{Component, PropagateContext};
use crate::components::wiring::{Pin, PinState};
use crate::diagnostics::Diagnostic;
use crate::error::{SimError, SimResult};
use crate::event::EventQueue;
use crate::types::{ComponentId, NetId, PortRef, SimTime};
use crate::value::Value;

/// Default bound on propagation steps per drain.
pub const DEFAULT_STEP_LIMIT: u32 = 1000;

/// How a drain ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainOutcome {
    /// Nothing left pending; all values are consistent
    Settled,
    /// The step limit was reached with work still pending, here or in a
    /// nested sub-circuit state
    Oscillating,
}

/// Summary of one completed drain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Logical time when the drain stopped
    pub time: SimTime,
    /// Propagation steps taken
    pub steps: u32,
    /// How the drain ended
    pub outcome: DrainOutcome,
    /// Nets whose value changed, in order of first change
    pub changed_nets: Vec<NetId>,
}

impl DrainReport {
    /// True if the drain reached a fixed point.
    pub fn is_settled(&self) -> bool {
        self.outcome == DrainOutcome::Settled
    }
}

/// Summary of one propagation step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Logical time of the step
    pub time: SimTime,
    /// Events applied
    pub events: usize,
    /// Components propagated
    pub evaluated: usize,
    /// Nets whose value changed
    pub changed_nets: Vec<NetId>,
}

/// Counters accumulated by a propagator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagatorStats {
    /// Completed drains
    pub drains: u64,
    /// Propagation steps
    pub steps: u64,
    /// Events applied
    pub events_applied: u64,
    /// Component propagations
    pub evaluations: u64,
    /// Drains that hit the step limit
    pub oscillations: u64,
    /// Driver conflicts observed
    pub conflicts: u64,
}

/// Event queue plus logical clock for one circuit state.
#[derive(Debug)]
pub struct Propagator {
    queue: EventQueue,
    time: SimTime,
    step_limit: u32,
    stats: PropagatorStats,
    unsettled: bool,
}

impl Default for Propagator {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_LIMIT)
    }
}

impl Propagator {
    /// Creates a propagator that gives up after `step_limit` steps per
    /// drain. A limit of zero is raised to one.
    pub fn new(step_limit: u32) -> Self {
        Self {
            queue: EventQueue::new(),
            time: 0,
            step_limit: step_limit.max(1),
            stats: PropagatorStats::default(),
            unsettled: false,
        }
    }

    /// Current logical time.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Step limit per drain.
    pub fn step_limit(&self) -> u32 {
        self.step_limit
    }

    /// Number of pending events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Largest queue depth seen.
    pub fn peak_pending(&self) -> usize {
        self.queue.peak_len()
    }

    /// Accumulated counters.
    pub fn stats(&self) -> &PropagatorStats {
        &self.stats
    }

    /// True if the last step or tick left a nested circuit state short of
    /// its fixed point.
    pub fn is_unsettled(&self) -> bool {
        self.unsettled
    }

    /// True if neither events nor dirty components are pending.
    pub fn is_quiescent(&self, state: &crate::state::CircuitState) -> bool {
        self.queue.is_empty() && !state.has_dirty()
    }

    /// Schedules a write `delay` ticks from now.
    pub fn schedule(&mut self, target: PortRef, value: Value, delay: SimTime, cause: Option<ComponentId>) {
        self.queue.push(self.time.saturating_add(delay), target, value, cause);
    }

    /// Moves logical time forward by `ticks` without applying anything.
    pub fn advance(&mut self, ticks: SimTime) {
        self.time = self.time.saturating_add(ticks);
    }

    /// Discards pending events; time is kept.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Discards pending events and rewinds time to zero.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.time = 0;
        self.unsettled = false;
    }

    /// Sets an input pin's value and schedules it as a stimulus event at
    /// the current time.
    pub fn set_pin(
        &mut self,
        circuit: &Circuit,
        state: &mut crate::state::CircuitState,
        id: ComponentId,
        value: Value,
    ) -> SimResult<()> {
        let placed = circuit.component(id).ok_or(SimError::UnknownComponent(id))?;
        let pin = placed
            .component
            .as_any()
            .downcast_ref::<Pin>()
            .filter(|pin| !pin.is_output())
            .ok_or(SimError::NotAnInputPin(id))?;
        if pin.width() != value.width() {
            return Err(SimError::WidthMismatch { left: pin.width(), right: value.width() });
        }
        state.set_data(id, Box::new(PinState { value }));
        self.schedule(PortRef::new(id, 0), value, 0, None);
        Ok(())
    }

    /// Runs steps until a fixed point or the step limit.
    ///
    /// A nested state that fails to settle ends the drain as oscillating
    /// right after the step that ran it; its own diagnostic already names
    /// the offending instance. A contract violation by a component aborts
    /// the drain with the error; conflicts and oscillation are reported
    /// through `diagnostics`.
    pub fn drain(
        &mut self,
        circuit: &Circuit,
        state: &mut crate::state::CircuitState,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> SimResult<DrainReport> {
        state.sync(circuit, diagnostics);
        let mut steps = 0u32;
        let mut changed: Vec<NetId> = Vec::new();
        let mut seen: HashSet<NetId> = HashSet::new();

        let outcome = loop {
            if self.is_quiescent(state) {
                break DrainOutcome::Settled;
            }
            if steps >= self.step_limit {
                self.stats.oscillations += 1;
                diagnostics.push(Diagnostic::Oscillation {
                    path: state.path().to_vec(),
                    time: self.time,
                    steps,
                });
                break DrainOutcome::Oscillating;
            }
            if let Some(report) = self.step(circuit, state, diagnostics)? {
                steps += 1;
                for net in report.changed_nets {
                    if seen.insert(net) {
                        changed.push(net);
                    }
                }
            }
            if self.unsettled {
                self.stats.oscillations += 1;
                break DrainOutcome::Oscillating;
            }
        };

        self.stats.drains += 1;
        tracing::trace!(path = ?state.path(), time = self.time, steps, ?outcome, "drain finished");
        Ok(DrainReport {
            time: self.time,
            steps,
            outcome,
            changed_nets: changed,
        })
    }

    /// Performs one propagation step. Returns `None` if nothing was
    /// pending.
    pub fn step(
        &mut self,
        circuit: &Circuit,
        state: &mut crate::state::CircuitState,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> SimResult<Option<StepReport>> {
        state.sync(circuit, diagnostics);
        self.unsettled = false;

        let mut to_run = state.take_dirty();
        let mut scheduled: HashSet<ComponentId> = to_run.iter().copied().collect();
        if to_run.is_empty() && self.queue.is_empty() {
            return Ok(None);
        }

        let mut report = StepReport { time: self.time, ..StepReport::default() };
        if to_run.is_empty() || self.queue.next_time().is_some_and(|t| t <= self.time) {
            let due = self.queue.pop_earliest();
            if let Some(first) = due.first() {
                self.time = self.time.max(first.time);
            }
            report.time = self.time;
            report.events = due.len();

            let mut touched: Vec<NetId> = Vec::new();
            for event in &due {
                if let Some(net) = state.apply_drive(event.target, event.value) {
                    if !touched.contains(&net) {
                        touched.push(net);
                    }
                }
            }
            for net in touched {
                let Some(resolution) = state.recompute(net) else {
                    continue;
                };
                report.changed_nets.push(net);
                if resolution.conflict {
                    self.stats.conflicts += 1;
                    diagnostics.push(Diagnostic::DriverConflict {
                        path: state.path().to_vec(),
                        net,
                        time: self.time,
                    });
                }
                if let Some(info) = state.netlist().net(net) {
                    for reader in &info.readers {
                        if scheduled.insert(*reader) {
                            to_run.push(*reader);
                        }
                    }
                }
            }
            self.stats.events_applied += due.len() as u64;
        }

        for id in to_run {
            let Some(placed) = circuit.component(id) else {
                continue;
            };
            self.evaluate(placed.component.as_ref(), id, state, diagnostics, |component, ctx| {
                component.propagate(ctx)
            })?;
            report.evaluated += 1;
        }

        self.stats.steps += 1;
        self.stats.evaluations += report.evaluated as u64;
        Ok(Some(report))
    }

    /// Advances every clock in this state by one tick. Returns true if any
    /// clock scheduled a change.
    pub fn tick_clocks(
        &mut self,
        circuit: &Circuit,
        state: &mut crate::state::CircuitState,
        tick: u64,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> SimResult<bool> {
        state.sync(circuit, diagnostics);
        self.unsettled = false;
        let mut any = false;
        for placed in circuit.components() {
            if placed.component.config_error().is_some() {
                continue;
            }
            let changed = self.evaluate(placed.component.as_ref(), placed.id, state, diagnostics, |component, ctx| {
                component.clock_tick(ctx, tick)
            })?;
            any |= changed.unwrap_or(false);
        }
        Ok(any)
    }

    /// Lends a component its context, then schedules whatever it wrote.
    ///
    /// Misconfigured components are not called; they drive `E` on every
    /// driving port instead.
    fn evaluate<R>(
        &mut self,
        component: &dyn Component,
        id: ComponentId,
        state: &mut crate::state::CircuitState,
        diagnostics: &mut Vec<Diagnostic>,
        f: impl FnOnce(&dyn Component, &mut PropagateContext<'_>) -> SimResult<R>,
    ) -> SimResult<Option<R>> {
        let ports = component.ports();

        if component.config_error().is_some() {
            for (index, desc) in ports.iter().enumerate() {
                if desc.direction.can_drive() {
                    self.schedule(PortRef::new(id, index), Value::error(desc.width), 0, Some(id));
                }
            }
            return Ok(None);
        }

        let inputs: Vec<Value> = ports
            .iter()
            .enumerate()
            .map(|(index, desc)| state.port_value(PortRef::new(id, index), desc.width))
            .collect();
        let path = state.path().to_vec();
        let mut data = state.take_data(id);

        let mut ctx = PropagateContext::new(id, &path, self.time, ports, &inputs, &mut data, diagnostics)
            .with_step_limit(self.step_limit);
        let result = f(component, &mut ctx);
        let unsettled = ctx.is_unsettled();
        let writes = ctx.into_writes();
        state.restore_data(id, data);
        if unsettled {
            // run again next step so the nested state resumes
            state.mark_dirty(id);
            self.unsettled = true;
        }

        let value = result?;
        for write in writes {
            self.schedule(PortRef::new(id, write.port), write.value, write.delay, Some(id));
        }
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::PortDesc;
    use crate::components::gates::{Gate, GateOp, NotGate};
    use crate::geometry::Location;
    use crate::state::CircuitState;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn inverter() -> (Circuit, ComponentId, ComponentId) {
        let mut circuit = Circuit::new("main");
        let input = circuit.add(Location::new(0, 0), Pin::input(1));
        let not = circuit.add(Location::new(60, 0), NotGate::new(1, 1));
        let output = circuit.add(Location::new(100, 0), Pin::output(1));
        circuit.connect((input, 0), (not, 0)).unwrap();
        circuit.connect((not, 1), (output, 0)).unwrap();
        (circuit, input, output)
    }

    #[test]
    fn test_drain_settles() {
        let (circuit, input, output) = inverter();
        let mut state = CircuitState::root();
        let mut prop = Propagator::default();
        let mut diags = Vec::new();

        let report = prop.drain(&circuit, &mut state, &mut diags).unwrap();
        assert!(report.is_settled());
        assert_eq!(state.port_value(PortRef::new(output, 0), 1), Value::TRUE);

        prop.set_pin(&circuit, &mut state, input, Value::TRUE).unwrap();
        let report = prop.drain(&circuit, &mut state, &mut diags).unwrap();
        assert!(report.is_settled());
        assert_eq!(state.port_value(PortRef::new(output, 0), 1), Value::FALSE);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_step_applies_one_time_slot() {
        let (circuit, input, output) = inverter();
        let mut state = CircuitState::root();
        let mut prop = Propagator::default();
        let mut diags = Vec::new();
        prop.drain(&circuit, &mut state, &mut diags).unwrap();
        let settled_at = prop.time();

        prop.set_pin(&circuit, &mut state, input, Value::TRUE).unwrap();
        let first = prop.step(&circuit, &mut state, &mut diags).unwrap().unwrap();
        assert_eq!(first.time, settled_at);
        assert_eq!(first.events, 1);
        assert_eq!(state.port_value(PortRef::new(output, 0), 1), Value::TRUE);

        let second = prop.step(&circuit, &mut state, &mut diags).unwrap().unwrap();
        assert_eq!(second.time, settled_at + 1);
        assert_eq!(state.port_value(PortRef::new(output, 0), 1), Value::FALSE);
        assert!(prop.step(&circuit, &mut state, &mut diags).unwrap().is_none());
    }

    #[test]
    fn test_set_pin_rejects_non_pins() {
        let (circuit, _, output) = inverter();
        let mut state = CircuitState::root();
        let mut prop = Propagator::default();
        assert_eq!(
            prop.set_pin(&circuit, &mut state, output, Value::TRUE),
            Err(SimError::NotAnInputPin(output))
        );
        assert_eq!(
            prop.set_pin(&circuit, &mut state, 42, Value::TRUE),
            Err(SimError::UnknownComponent(42))
        );
    }

    #[test]
    fn test_zero_delay_ring_oscillates() {
        let mut circuit = Circuit::new("ring");
        let enable = circuit.add(Location::new(0, 0), Pin::input(1));
        let nand = circuit.add(Location::new(100, 0), Gate::new(GateOp::Nand, 1, 2, 0));
        circuit.connect((enable, 0), (nand, 0)).unwrap();
        circuit.connect((nand, 2), (nand, 1)).unwrap();

        let mut state = CircuitState::root();
        let mut prop = Propagator::new(50);
        let mut diags = Vec::new();
        assert!(prop.drain(&circuit, &mut state, &mut diags).unwrap().is_settled());

        prop.set_pin(&circuit, &mut state, enable, Value::TRUE).unwrap();
        let report = prop.drain(&circuit, &mut state, &mut diags).unwrap();

        assert_eq!(report.outcome, DrainOutcome::Oscillating);
        assert_eq!(report.steps, 50);
        assert_eq!(report.time, 0);
        assert!(diags.iter().any(Diagnostic::is_oscillation));
        assert_eq!(prop.stats().oscillations, 1);
        assert!(prop.pending() > 0);
    }

    /// Logs the id of every propagation into a shared list.
    #[derive(Debug)]
    struct Recorder {
        ports: Vec<PortDesc>,
        log: Arc<Mutex<Vec<ComponentId>>>,
    }

    impl Recorder {
        fn new(log: &Arc<Mutex<Vec<ComponentId>>>) -> Self {
            Self {
                ports: vec![PortDesc::input("in", 0, 0, 1)],
                log: Arc::clone(log),
            }
        }
    }

    impl Component for Recorder {
        fn name(&self) -> &str {
            "Recorder"
        }
        fn ports(&self) -> &[PortDesc] {
            &self.ports
        }
        fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
            self.log.lock().push(ctx.component());
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_readers_wake_in_event_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut circuit = Circuit::new("order");
        let low = circuit.add(Location::new(100, 0), Recorder::new(&log));
        let high = circuit.add(Location::new(100, 100), Recorder::new(&log));
        let feeds_high = circuit.add(Location::new(0, 100), Pin::input(1));
        let feeds_low = circuit.add(Location::new(0, 0), Pin::input(1));
        circuit.connect((feeds_high, 0), (high, 0)).unwrap();
        circuit.connect((feeds_low, 0), (low, 0)).unwrap();

        let mut state = CircuitState::root();
        let mut prop = Propagator::default();
        let mut diags = Vec::new();
        prop.drain(&circuit, &mut state, &mut diags).unwrap();
        log.lock().clear();

        // same fire time: the earlier event wakes its reader first
        prop.set_pin(&circuit, &mut state, feeds_high, Value::TRUE).unwrap();
        prop.set_pin(&circuit, &mut state, feeds_low, Value::TRUE).unwrap();
        prop.drain(&circuit, &mut state, &mut diags).unwrap();
        assert!(low < high);
        assert_eq!(*log.lock(), vec![high, low]);
    }

    #[test]
    fn test_advance_moves_schedule_base() {
        let mut prop = Propagator::default();
        prop.advance(5);
        assert_eq!(prop.time(), 5);
        prop.schedule(PortRef::new(1, 0), Value::TRUE, 2, None);
        prop.schedule(PortRef::new(1, 0), Value::TRUE, SimTime::MAX, None);
        assert_eq!(prop.pending(), 2);
        prop.advance(SimTime::MAX);
        assert_eq!(prop.time(), SimTime::MAX);
        prop.reset();
        assert_eq!(prop.time(), 0);
        assert_eq!(prop.pending(), 0);
    }

    #[test]
    fn test_misconfigured_component_drives_error() {
        let mut circuit = Circuit::new("main");
        let gate = circuit.add(Location::new(50, 0), Gate::new(GateOp::And, 1, 1, 1));
        let out = circuit.add(Location::new(100, 0), Pin::output(1));
        // laid out with the minimum two inputs, so the output is port 2
        circuit.connect((gate, 2), (out, 0)).unwrap();

        let mut state = CircuitState::root();
        let mut prop = Propagator::default();
        let mut diags = Vec::new();
        prop.drain(&circuit, &mut state, &mut diags).unwrap();

        assert_eq!(state.port_value(PortRef::new(out, 0), 1), Value::ERROR);
        let configs = diags
            .iter()
            .filter(|d| matches!(d, Diagnostic::ConfigurationError { .. }))
            .count();
        assert_eq!(configs, 1);

        prop.drain(&circuit, &mut state, &mut diags).unwrap();
        let configs = diags
            .iter()
            .filter(|d| matches!(d, Diagnostic::ConfigurationError { .. }))
            .count();
        assert_eq!(configs, 1);
    }
}
