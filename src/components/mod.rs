//! Built-in component implementations.
//!
//! The kernel treats every component through the
//! [`Component`](crate::component::Component) trait; this module provides a
//! small catalog that covers the common cases and serves as a reference for
//! implementing new kinds.
//!
//! # Available Components
//!
//! ## Wiring
//! - [`Pin`] - Circuit input or output, also a sub-circuit's interface
//! - [`Constant`] - Drives a fixed value
//! - [`PullResistor`] - Weakly pulls floating bits to 0, 1 or X
//! - [`Probe`] - Records the last value it saw
//!
//! ## Gates
//! - [`Gate`] - AND, OR, XOR, NAND, NOR, XNOR with 2 to 32 inputs
//! - [`NotGate`], [`Buffer`] - Single-input gates
//! - [`ControlledBuffer`] - Tri-state buffer
//!
//! ## Sequential
//! - [`Clock`] - Tick-driven clock source
//! - [`DFlipFlop`] - Rising-edge D flip-flop
//!
//! ## Integrated circuits
//! - [`TtlQuadGate`] - 7408, 7432 and 7486 quad gate packages
//!
//! ## Hierarchy
//! - [`Subcircuit`] - Instance of another circuit definition

pub mod clock;
pub mod gates;
pub mod memory;
pub mod subcircuit;
pub mod ttl;
pub mod wiring;

pub use clock::{Clock, ClockState};
pub use gates::{Buffer, ControlledBuffer, Gate, GateOp, NotGate};
pub use memory::{DFlipFlop, FlipFlopState};
pub use subcircuit::{Subcircuit, SubcircuitData};
pub use ttl::{TtlKind, TtlQuadGate};
pub use wiring::{Constant, Pin, PinState, Probe, ProbeState, PullResistor};

use crate::value::check_width;

/// Narrows a configured width to a usable port width.
///
/// Invalid widths fall back to one bit so the port layout stays well
/// formed; the component reports the problem through `config_error`.
pub(crate) fn port_width(width: u32) -> (u8, Option<String>) {
    match check_width(width) {
        Ok(width) => (width, None),
        Err(err) => (1, Some(err.to_string())),
    }
}
