//! Edge-triggered memory.

use std::any::Any;

use crate::component::{Component, PortDesc, PropagateContext};
use crate::error::SimResult;
use crate::types::SimTime;
use crate::value::{Bit, Value};

use super::port_width;

/// Private data of a flip-flop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlipFlopState {
    /// Stored bits
    pub stored: Value,
    /// Clock level seen on the previous propagation
    pub last_clock: Bit,
}

/// Rising-edge D flip-flop.
///
/// Ports: `0` D, `1` clock, `2` Q, `3` inverted Q. The stored value starts
/// at all zeros and is only replaced on a clean `0 -> 1` clock transition.
#[derive(Debug, Clone)]
pub struct DFlipFlop {
    width: u8,
    delay: SimTime,
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl DFlipFlop {
    pub fn new(width: u8, delay: SimTime) -> Self {
        let (width, config_error) = port_width(width as u32);
        Self {
            width,
            delay,
            ports: vec![
                PortDesc::input("d", -40, -10, width),
                PortDesc::input("clk", -40, 10, 1),
                PortDesc::output("q", 0, -10, width),
                PortDesc::output("nq", 0, 10, width),
            ],
            config_error,
        }
    }
}

impl Component for DFlipFlop {
    fn name(&self) -> &str {
        "D Flip-Flop"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        let d = ctx.input(0)?;
        let clock = ctx.input(1)?.get(0);
        let width = self.width;
        let state = ctx.data_or_insert_with(|| FlipFlopState {
            stored: Value::zero(width),
            last_clock: Bit::Unknown,
        });
        if state.last_clock == Bit::Zero && clock == Bit::One {
            state.stored = d;
        }
        state.last_clock = clock;
        let stored = state.stored;

        ctx.set_output(2, stored, self.delay)?;
        ctx.set_output(3, !stored, self.delay)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
