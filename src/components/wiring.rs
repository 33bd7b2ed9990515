//! Pins, constants, pull resistors and probes.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::component::{Component, PortDesc, PropagateContext};
use crate::error::SimResult;
use crate::value::{Bit, Value};

use super::port_width;

/// Private data of a pin: the value set by the host for input pins, the
/// last value seen for output pins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinState {
    pub value: Value,
}

/// A circuit input or output.
///
/// An input pin drives the value the host last set on it (all zeros
/// until then). An output pin only reads its net. Inside a sub-circuit the
/// pins form the instance's external interface.
///
/// # Example
///
/// ```rust
/// use kairo::components::Pin;
///
/// let a = Pin::input(4).with_label("a");
/// assert!(!a.is_output());
/// assert_eq!(a.width(), 4);
/// assert_eq!(a.label(), Some("a"));
/// ```
#[derive(Debug, Clone)]
pub struct Pin {
    output: bool,
    width: u8,
    label: Option<String>,
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl Pin {
    fn new(output: bool, width: u8) -> Self {
        let (width, config_error) = port_width(width as u32);
        let port = if output {
            PortDesc::input("in", 0, 0, width)
        } else {
            PortDesc::output("out", 0, 0, width)
        };
        Self {
            output,
            width,
            label: None,
            ports: vec![port],
            config_error,
        }
    }

    /// An input pin of the given width.
    pub fn input(width: u8) -> Self {
        Self::new(false, width)
    }

    /// An output pin of the given width.
    pub fn output(width: u8) -> Self {
        Self::new(true, width)
    }

    /// Attaches a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_output(&self) -> bool {
        self.output
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Component for Pin {
    fn name(&self) -> &str {
        "Pin"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        if self.output {
            let seen = ctx.input(0)?;
            ctx.data_or_insert_with(|| PinState { value: seen }).value = seen;
            return Ok(());
        }
        let value = ctx
            .existing_data::<PinState>()
            .map(|state| state.value)
            .filter(|value| value.width() == self.width)
            .unwrap_or_else(|| Value::zero(self.width));
        ctx.set_output(0, value, 0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Drives a fixed value.
#[derive(Debug, Clone)]
pub struct Constant {
    value: Value,
    ports: Vec<PortDesc>,
}

impl Constant {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            ports: vec![PortDesc::output("out", 0, 0, value.width())],
        }
    }

    pub fn value(&self) -> Value {
        self.value
    }
}

impl Component for Constant {
    fn name(&self) -> &str {
        "Constant"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        ctx.set_output(0, self.value, 0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Weakly pulls floating bits of a net toward `0`, `1` or `X`.
///
/// Strong drivers always win; only bits every strong driver leaves at `X`
/// take the pull value.
#[derive(Debug, Clone)]
pub struct PullResistor {
    pull: Bit,
    width: u8,
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl PullResistor {
    pub fn new(pull: Bit, width: u8) -> Self {
        let (width, mut config_error) = port_width(width as u32);
        if pull == Bit::Error {
            config_error = Some("a pull resistor cannot pull toward E".to_string());
        }
        Self {
            pull,
            width,
            ports: vec![PortDesc::output("out", 0, 0, width).weak()],
            config_error,
        }
    }

    pub fn pull(&self) -> Bit {
        self.pull
    }
}

impl Component for PullResistor {
    fn name(&self) -> &str {
        "Pull Resistor"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        ctx.set_output(0, Value::repeat(self.pull, self.width), 0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Private data of a probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProbeState {
    /// Value seen on the last propagation
    pub last: Option<Value>,
    /// Number of times the seen value changed
    pub changes: u64,
}

/// Records the value on its net.
#[derive(Debug, Clone)]
pub struct Probe {
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl Probe {
    pub fn new(width: u8) -> Self {
        let (width, config_error) = port_width(width as u32);
        Self {
            ports: vec![PortDesc::input("in", 0, 0, width)],
            config_error,
        }
    }
}

impl Component for Probe {
    fn name(&self) -> &str {
        "Probe"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        let seen = ctx.input(0)?;
        let state = ctx.data::<ProbeState>();
        if state.last != Some(seen) {
            state.last = Some(seen);
            state.changes += 1;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
