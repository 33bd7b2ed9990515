//! Combinational gates.
//!
//! Every gate here is stateless: it reads its inputs, computes one output
//! value and schedules it after its configured delay. A delay of zero is
//! allowed and makes the gate purely combinational wiring.

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::component::{Component, PortDesc, PropagateContext};
use crate::error::{SimError, SimResult};
use crate::types::SimTime;
use crate::value::{Bit, Value};

use super::port_width;

/// Smallest number of inputs a multi-input gate accepts.
pub const MIN_INPUTS: usize = 2;
/// Largest number of inputs a multi-input gate accepts.
pub const MAX_INPUTS: usize = 32;

/// The boolean function a [`Gate`] computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateOp {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
}

impl GateOp {
    pub const ALL: [GateOp; 6] = [
        GateOp::And,
        GateOp::Or,
        GateOp::Xor,
        GateOp::Nand,
        GateOp::Nor,
        GateOp::Xnor,
    ];

    /// Display name, e.g. `"AND Gate"`.
    pub fn name(self) -> &'static str {
        match self {
            GateOp::And => "AND Gate",
            GateOp::Or => "OR Gate",
            GateOp::Xor => "XOR Gate",
            GateOp::Nand => "NAND Gate",
            GateOp::Nor => "NOR Gate",
            GateOp::Xnor => "XNOR Gate",
        }
    }

    fn is_negated(self) -> bool {
        matches!(self, GateOp::Nand | GateOp::Nor | GateOp::Xnor)
    }

    /// Folds the inputs positionally. Multi-input XOR is odd parity.
    pub fn apply(self, inputs: &[Value]) -> SimResult<Value> {
        let Some((first, rest)) = inputs.split_first() else {
            return Ok(Value::UNKNOWN);
        };
        let mut acc = *first;
        for input in rest {
            acc = match self {
                GateOp::And | GateOp::Nand => acc.and(input)?,
                GateOp::Or | GateOp::Nor => acc.or(input)?,
                GateOp::Xor | GateOp::Xnor => acc.xor(input)?,
            };
        }
        Ok(if self.is_negated() { acc.not() } else { acc })
    }
}

impl fmt::Display for GateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateOp::And => "and",
            GateOp::Or => "or",
            GateOp::Xor => "xor",
            GateOp::Nand => "nand",
            GateOp::Nor => "nor",
            GateOp::Xnor => "xnor",
        };
        f.write_str(s)
    }
}

impl FromStr for GateOp {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GateOp::ALL
            .into_iter()
            .find(|op| op.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SimError::UnknownType(s.to_string()))
    }
}

/// A multi-input gate.
///
/// Ports `0..inputs` are the inputs, stacked vertically 20 units apart to
/// the left of the anchor; port `inputs` is the output at the anchor. An
/// input count outside `MIN_INPUTS..=MAX_INPUTS` is a configuration error
/// and the gate is laid out with `MIN_INPUTS` inputs instead.
///
/// # Example
///
/// ```rust
/// use kairo::components::{Gate, GateOp};
/// use kairo::component::Component;
///
/// let and = Gate::new(GateOp::And, 1, 3, 1);
/// assert_eq!(and.ports().len(), 4);
/// assert!(and.config_error().is_none());
/// assert!(Gate::new(GateOp::Or, 1, 1, 1).config_error().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Gate {
    op: GateOp,
    width: u8,
    delay: SimTime,
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl Gate {
    pub fn new(op: GateOp, width: u8, inputs: usize, delay: SimTime) -> Self {
        let (width, mut config_error) = port_width(width as u32);
        let mut laid_out = inputs;
        if !(MIN_INPUTS..=MAX_INPUTS).contains(&inputs) {
            config_error = Some(format!(
                "{} needs {MIN_INPUTS}..={MAX_INPUTS} inputs, got {inputs}",
                op.name()
            ));
            laid_out = MIN_INPUTS;
        }
        let n = laid_out as i32;
        let mut ports: Vec<PortDesc> = (0..n)
            .map(|i| PortDesc::input(format!("in{i}"), -50, (2 * i - (n - 1)) * 10, width))
            .collect();
        ports.push(PortDesc::output("out", 0, 0, width));
        Self {
            op,
            width,
            delay,
            ports,
            config_error,
        }
    }

    pub fn op(&self) -> GateOp {
        self.op
    }

    pub fn inputs(&self) -> usize {
        self.ports.len() - 1
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn delay(&self) -> SimTime {
        self.delay
    }
}

impl Component for Gate {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        let n = self.inputs();
        let inputs = (0..n).map(|i| ctx.input(i)).collect::<SimResult<Vec<_>>>()?;
        let out = self.op.apply(&inputs)?;
        ctx.set_output(n, out, self.delay)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Layout shared by the single-input gates: input 30 units left of the
/// anchor, output at the anchor.
fn unary_ports(width: u8) -> Vec<PortDesc> {
    vec![PortDesc::input("in", -30, 0, width), PortDesc::output("out", 0, 0, width)]
}

/// Inverter.
#[derive(Debug, Clone)]
pub struct NotGate {
    delay: SimTime,
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl NotGate {
    pub fn new(width: u8, delay: SimTime) -> Self {
        let (width, config_error) = port_width(width as u32);
        Self {
            delay,
            ports: unary_ports(width),
            config_error,
        }
    }
}

impl Component for NotGate {
    fn name(&self) -> &str {
        "NOT Gate"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        let input = ctx.input(0)?;
        ctx.set_output(1, !input, self.delay)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Non-inverting buffer.
#[derive(Debug, Clone)]
pub struct Buffer {
    delay: SimTime,
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl Buffer {
    pub fn new(width: u8, delay: SimTime) -> Self {
        let (width, config_error) = port_width(width as u32);
        Self {
            delay,
            ports: unary_ports(width),
            config_error,
        }
    }
}

impl Component for Buffer {
    fn name(&self) -> &str {
        "Buffer"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        let input = ctx.input(0)?;
        ctx.set_output(1, input, self.delay)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Tri-state buffer.
///
/// Ports: `0` data in, `1` one-bit control, `2` out. With control `1` the
/// input is passed through; with control `0` the output floats (drives all
/// `X`, the identity of net resolution). An unknown control gives `X`, an
/// erroneous one `E`.
#[derive(Debug, Clone)]
pub struct ControlledBuffer {
    width: u8,
    delay: SimTime,
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl ControlledBuffer {
    pub fn new(width: u8, delay: SimTime) -> Self {
        let (width, config_error) = port_width(width as u32);
        Self {
            width,
            delay,
            ports: vec![
                PortDesc::input("in", -20, 0, width),
                PortDesc::input("enable", -10, 10, 1),
                PortDesc::output("out", 0, 0, width),
            ],
            config_error,
        }
    }
}

impl Component for ControlledBuffer {
    fn name(&self) -> &str {
        "Controlled Buffer"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        let input = ctx.input(0)?;
        let out = match ctx.input(1)?.get(0) {
            Bit::One => input,
            Bit::Zero | Bit::Unknown => Value::unknown(self.width),
            Bit::Error => Value::error(self.width),
        };
        ctx.set_output(2, out, self.delay)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
