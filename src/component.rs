//! The component contract and the context components propagate through.
//!
//! Components are the fundamental logic elements of a circuit. A component
//! is immutable configuration (ports, delays, widths); everything that
//! changes during simulation lives in the owning
//! [`CircuitState`](crate::state::CircuitState), either as net values or as
//! the component's private data slot.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;
use crate::error::{SimError, SimResult};
use crate::geometry::{Bounds, Location};
use crate::types::{ComponentId, SimTime};
use crate::value::Value;

/// Private per-instance data a component keeps in its circuit state.
pub type ComponentData = Box<dyn Any + Send>;

/// Direction class of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Reads its net, never drives it
    Input,
    /// Drives its net
    Output,
    /// May drive or float depending on runtime state
    InOut,
}

impl Direction {
    /// True if a port of this direction may drive its net.
    pub fn can_drive(self) -> bool {
        matches!(self, Direction::Output | Direction::InOut)
    }

    /// True if a change on the net should wake the component.
    pub fn is_sensitive(self) -> bool {
        matches!(self, Direction::Input | Direction::InOut)
    }
}

/// How strongly a driving port asserts its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strength {
    /// Ordinary driver; folded with `combine`
    #[default]
    Strong,
    /// Only fills bits that every strong driver leaves floating
    Weak,
}

/// Static description of one port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDesc {
    /// Human-readable label (e.g. "a", "q", "clk")
    pub name: String,
    /// Position relative to the component's anchor
    pub offset: Location,
    /// Bit width of the port
    pub width: u8,
    /// Direction class
    pub direction: Direction,
    /// Drive strength, only relevant for driving ports
    pub strength: Strength,
}

impl PortDesc {
    /// Creates a port with strong drive.
    pub fn new(name: impl Into<String>, offset: Location, width: u8, direction: Direction) -> Self {
        Self {
            name: name.into(),
            offset,
            width,
            direction,
            strength: Strength::Strong,
        }
    }

    /// Shorthand for an input port.
    pub fn input(name: impl Into<String>, x: i32, y: i32, width: u8) -> Self {
        Self::new(name, Location::new(x, y), width, Direction::Input)
    }

    /// Shorthand for an output port.
    pub fn output(name: impl Into<String>, x: i32, y: i32, width: u8) -> Self {
        Self::new(name, Location::new(x, y), width, Direction::Output)
    }

    /// Marks the port as a weak driver.
    pub fn weak(mut self) -> Self {
        self.strength = Strength::Weak;
        self
    }
}

/// The trait every logic element implements.
///
/// The engine calls [`propagate`](Component::propagate) whenever a net
/// attached to one of the component's sensitive ports changes value, and
/// once after every reset or topology change. Writes requested through the
/// context are scheduled events: they only become visible after their
/// delay elapses, never within the same call.
///
/// New component kinds are added by implementing this trait and
/// registering a factory in a [`ComponentRegistry`](crate::registry::ComponentRegistry).
pub trait Component: Send + Sync + std::fmt::Debug {
    /// Type name, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// The port layout. Must not change for the lifetime of the instance.
    fn ports(&self) -> &[PortDesc];

    /// Placement bounds relative to the anchor location.
    ///
    /// Defaults to the box spanned by the port offsets.
    fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::default();
        for port in self.ports() {
            bounds = bounds.union(&Bounds::new(port.offset.x, port.offset.y, 0, 0));
        }
        bounds
    }

    /// Describes why the attribute combination is invalid, if it is.
    ///
    /// A misconfigured component is reported once and then drives `E` on
    /// all of its driving ports instead of being propagated.
    fn config_error(&self) -> Option<&str> {
        None
    }

    /// Reads inputs and schedules new output values.
    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()>;

    /// Advances clock sources by one tick.
    ///
    /// Returns true if the component scheduled anything. Only clocks and
    /// containers of clocks override this.
    fn clock_tick(&self, _ctx: &mut PropagateContext<'_>, _tick: u64) -> SimResult<bool> {
        Ok(false)
    }

    /// Upcast for downcasting to a concrete component type.
    fn as_any(&self) -> &dyn Any;
}

/// A write requested by a component during `propagate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortWrite {
    /// Port index on the writing component
    pub port: usize,
    /// Value to drive
    pub value: Value,
    /// Delay relative to the current time
    pub delay: SimTime,
}

/// Everything a component may touch while it propagates.
pub struct PropagateContext<'a> {
    component: ComponentId,
    path: &'a [ComponentId],
    time: SimTime,
    step_limit: u32,
    ports: &'a [PortDesc],
    inputs: &'a [Value],
    data: &'a mut Option<ComponentData>,
    diagnostics: &'a mut Vec<Diagnostic>,
    writes: Vec<PortWrite>,
    unsettled: bool,
}

impl<'a> PropagateContext<'a> {
    /// Creates a context. `inputs` holds the value currently visible at
    /// every port, in port order.
    pub fn new(
        component: ComponentId,
        path: &'a [ComponentId],
        time: SimTime,
        ports: &'a [PortDesc],
        inputs: &'a [Value],
        data: &'a mut Option<ComponentData>,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            component,
            path,
            time,
            step_limit: crate::propagator::DEFAULT_STEP_LIMIT,
            ports,
            inputs,
            data,
            diagnostics,
            writes: Vec::new(),
            unsettled: false,
        }
    }

    /// Sets the step limit nested propagators should use.
    pub fn with_step_limit(mut self, step_limit: u32) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Step limit of the propagator driving this call.
    pub fn step_limit(&self) -> u32 {
        self.step_limit
    }

    /// The component being propagated.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// Instantiation path of the circuit state the component lives in.
    pub fn path(&self) -> &[ComponentId] {
        self.path
    }

    /// Current logical time.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Value currently visible at `port`.
    pub fn input(&self, port: usize) -> SimResult<Value> {
        self.inputs.get(port).copied().ok_or(SimError::UndeclaredPort {
            component: self.component,
            port,
        })
    }

    /// Schedules `value` on `port` after `delay` ticks.
    ///
    /// Fails if the port is undeclared, cannot drive, or has a different
    /// width than `value`.
    pub fn set_output(&mut self, port: usize, value: Value, delay: SimTime) -> SimResult<()> {
        let desc = self.ports.get(port).ok_or(SimError::UndeclaredPort {
            component: self.component,
            port,
        })?;
        if !desc.direction.can_drive() {
            return Err(SimError::DrivesInput { component: self.component, port });
        }
        if desc.width != value.width() {
            return Err(SimError::WidthMismatch { left: desc.width, right: value.width() });
        }
        self.writes.push(PortWrite { port, value, delay });
        Ok(())
    }

    /// Private data of type `T`, created with `T::default()` on first use.
    pub fn data<T: Any + Send + Default>(&mut self) -> &mut T {
        self.data_or_insert_with(T::default)
    }

    /// Private data of type `T`, created with `init` on first use.
    ///
    /// Data of a different type left in the slot is replaced.
    pub fn data_or_insert_with<T: Any + Send>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        let current = match self.data.take() {
            Some(existing) if existing.is::<T>() => existing,
            _ => Box::new(init()) as ComponentData,
        };
        let slot = self.data.insert(current);
        match slot.downcast_mut::<T>() {
            Some(data) => data,
            None => unreachable!("data slot was just filled with the requested type"),
        }
    }

    /// Private data of type `T`, if present.
    pub fn existing_data<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.data.as_mut().and_then(|d| d.downcast_mut::<T>())
    }

    /// Forwards a diagnostic raised while propagating (e.g. by a nested
    /// circuit state).
    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Flags that work inside the component did not reach a fixed point
    /// within the step limit.
    ///
    /// The propagator ends the current drain as oscillating and runs the
    /// component again on the next drain so it can resume.
    pub fn mark_unsettled(&mut self) {
        self.unsettled = true;
    }

    /// True if [`mark_unsettled`](Self::mark_unsettled) was called.
    pub fn is_unsettled(&self) -> bool {
        self.unsettled
    }

    /// Consumes the context, returning the requested writes in order.
    pub fn into_writes(self) -> Vec<PortWrite> {
        self.writes
    }
}
