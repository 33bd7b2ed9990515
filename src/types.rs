//! Core type definitions for the simulation kernel.
//!
//! This module defines the identifiers shared by every other module.

use serde::{Deserialize, Serialize};

/// Logical simulation time, measured in ticks.
///
/// Component delays, event fire times and the clock driver all use the
/// same `SimTime` representation.
pub type SimTime = u64;

/// Stable identifier of a component placed in a circuit.
///
/// Ids are unique within one circuit definition and never reused while the
/// circuit lives.
pub type ComponentId = u64;

/// Identifier of a net within one resolved netlist.
///
/// Net ids are dense indexes and are only meaningful for the netlist
/// version that produced them.
pub type NetId = usize;

/// Path of component ids from the root circuit down to a nested
/// sub-circuit instance. The root state has an empty path.
pub type InstancePath = Vec<ComponentId>;

/// One port of one placed component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    /// The component owning the port
    pub component: ComponentId,
    /// Index into the component's port list
    pub port: usize,
}

impl PortRef {
    /// Creates a new port reference.
    pub fn new(component: ComponentId, port: usize) -> Self {
        Self { component, port }
    }
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.component, self.port)
    }
}
