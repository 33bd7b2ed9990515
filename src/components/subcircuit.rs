//! Sub-circuit instances.
//!
//! A `Subcircuit` places another circuit definition as a single component.
//! The definition's input pins, in id order, become the instance's input
//! ports and its output pins become the output ports. Every placement keeps
//! its own nested [`CircuitState`] and [`Propagator`] in its private data
//! slot, so two instances of one definition never share values.
//!
//! When an input changes the instance copies the new values onto its
//! internal pins, drains its own propagator to a fixed point and schedules
//! the resulting output pin values after its declared delay. If the nested
//! drain hits the step limit the outputs are still scheduled, but the
//! instance marks itself unsettled so the enclosing drain ends oscillating
//! and resumes the nested one next time.

use std::any::Any;
use std::sync::Arc;

use crate::circuit::Circuit;
use crate::component::{Component, PortDesc, PropagateContext};
use crate::error::SimResult;
use crate::propagator::{DrainReport, Propagator};
use crate::state::CircuitState;
use crate::types::{ComponentId, PortRef, SimTime};
use crate::value::Value;

use super::wiring::PinState;

/// Private data of one sub-circuit instance.
#[derive(Debug)]
pub struct SubcircuitData {
    /// The instance's own circuit state
    pub state: CircuitState,
    /// Queue and clock of the nested state
    pub propagator: Propagator,
}

impl SubcircuitData {
    /// Fresh state for instance `component` living in the state at
    /// `parent`.
    pub fn new(parent: &[ComponentId], component: ComponentId, step_limit: u32) -> Self {
        Self {
            state: CircuitState::nested(parent, component),
            propagator: Propagator::new(step_limit),
        }
    }
}

/// An instance of a circuit definition.
#[derive(Debug, Clone)]
pub struct Subcircuit {
    circuit: Arc<Circuit>,
    delay: SimTime,
    inputs: Vec<ComponentId>,
    outputs: Vec<(ComponentId, u8)>,
    ports: Vec<PortDesc>,
}

impl Subcircuit {
    /// Instantiates `circuit` with no extra delay at its boundary.
    pub fn new(circuit: Arc<Circuit>) -> Self {
        Self::with_delay(circuit, 0)
    }

    /// Instantiates `circuit`, delaying every output by `delay` ticks.
    pub fn with_delay(circuit: Arc<Circuit>, delay: SimTime) -> Self {
        let mut ports = Vec::new();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();

        for (i, (id, pin)) in circuit.input_pins().into_iter().enumerate() {
            let name = pin.label().map_or_else(|| format!("in{i}"), str::to_string);
            ports.push(PortDesc::input(name, -40, i as i32 * 20, pin.width()));
            inputs.push(id);
        }
        for (i, (id, pin)) in circuit.output_pins().into_iter().enumerate() {
            let name = pin.label().map_or_else(|| format!("out{i}"), str::to_string);
            ports.push(PortDesc::output(name, 0, i as i32 * 20, pin.width()));
            outputs.push((id, pin.width()));
        }

        Self {
            circuit,
            delay,
            inputs,
            outputs,
            ports,
        }
    }

    /// The instantiated definition.
    pub fn circuit(&self) -> &Arc<Circuit> {
        &self.circuit
    }

    pub fn delay(&self) -> SimTime {
        self.delay
    }

    /// Copies inputs in, drains the nested state and schedules outputs.
    ///
    /// With `tick` set, clocks inside the instance are advanced first and
    /// nothing is done unless one of them changed.
    fn settle(&self, ctx: &mut PropagateContext<'_>, tick: Option<u64>) -> SimResult<bool> {
        let values = (0..self.inputs.len())
            .map(|i| ctx.input(i))
            .collect::<SimResult<Vec<_>>>()?;
        let parent = ctx.path().to_vec();
        let id = ctx.component();
        let step_limit = ctx.step_limit();

        let mut diagnostics = Vec::new();
        let data = ctx.data_or_insert_with(|| SubcircuitData::new(&parent, id, step_limit));
        let SubcircuitData { state, propagator } = data;

        for (&pin, value) in self.inputs.iter().zip(values) {
            let current = state
                .data(pin)
                .and_then(|d| d.downcast_ref::<PinState>())
                .map(|s| s.value);
            if current != Some(value) {
                propagator.set_pin(&self.circuit, state, pin, value)?;
            }
        }

        let ticked = match tick {
            Some(tick) => {
                propagator.advance(1);
                propagator.tick_clocks(&self.circuit, state, tick, &mut diagnostics)?
            }
            None => false,
        };
        if tick.is_some() && !ticked {
            return Ok(false);
        }

        let report: DrainReport = propagator.drain(&self.circuit, state, &mut diagnostics)?;
        tracing::trace!(
            path = ?state.path(),
            steps = report.steps,
            settled = report.is_settled(),
            "sub-circuit drained"
        );
        let settled = report.is_settled();
        let outputs: Vec<Value> = self
            .outputs
            .iter()
            .map(|&(pin, width)| state.port_value(PortRef::new(pin, 0), width))
            .collect();

        for diagnostic in diagnostics {
            ctx.report(diagnostic);
        }
        if !settled {
            ctx.mark_unsettled();
        }
        let first_output = self.inputs.len();
        for (j, value) in outputs.into_iter().enumerate() {
            ctx.set_output(first_output + j, value, self.delay)?;
        }
        Ok(true)
    }
}

impl Component for Subcircuit {
    fn name(&self) -> &str {
        self.circuit.name()
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        self.settle(ctx, None).map(|_| ())
    }

    fn clock_tick(&self, ctx: &mut PropagateContext<'_>, tick: u64) -> SimResult<bool> {
        self.settle(ctx, Some(tick))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
