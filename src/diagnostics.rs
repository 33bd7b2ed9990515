//! Structured diagnostics raised while simulating.
//!
//! These are the non-fatal conditions a running simulation passes through:
//! oscillation, misconfigured components, conflicting drivers and width
//! conflicts on a net. They are collected by the simulator and logged, and
//! never abort a drain.

use serde::{Deserialize, Serialize};

use crate::types::{ComponentId, InstancePath, NetId, SimTime};

/// A non-fatal simulation condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// A drain exceeded the step limit without settling.
    Oscillation {
        /// Circuit state that failed to settle
        path: InstancePath,
        /// Logical time when the drain stopped
        time: SimTime,
        /// Steps taken before giving up
        steps: u32,
    },

    /// A component's attributes are invalid.
    ConfigurationError {
        /// Circuit state containing the component
        path: InstancePath,
        /// The misconfigured component
        component: ComponentId,
        /// Explanation from the component
        message: String,
    },

    /// Two or more drivers disagree on a net.
    DriverConflict {
        /// Circuit state containing the net
        path: InstancePath,
        /// The conflicting net
        net: NetId,
        /// Logical time of the conflict
        time: SimTime,
    },

    /// Ports of different widths are connected to the same net.
    WidthConflict {
        /// Circuit state containing the net
        path: InstancePath,
        /// The offending net
        net: NetId,
        /// The distinct widths seen on the net
        widths: Vec<u8>,
    },
}

impl Diagnostic {
    /// Instantiation path the diagnostic refers to.
    pub fn path(&self) -> &[ComponentId] {
        match self {
            Diagnostic::Oscillation { path, .. }
            | Diagnostic::ConfigurationError { path, .. }
            | Diagnostic::DriverConflict { path, .. }
            | Diagnostic::WidthConflict { path, .. } => path,
        }
    }

    /// True for oscillation reports.
    pub fn is_oscillation(&self) -> bool {
        matches!(self, Diagnostic::Oscillation { .. })
    }

    /// Emits the diagnostic as a `warn` event.
    pub(crate) fn log(&self) {
        match self {
            Diagnostic::Oscillation { path, time, steps } => {
                tracing::warn!(?path, time, steps, "oscillation apparent, circuit did not settle");
            }
            Diagnostic::ConfigurationError { path, component, message } => {
                tracing::warn!(?path, component, %message, "component configuration error");
            }
            Diagnostic::DriverConflict { path, net, time } => {
                tracing::warn!(?path, net, time, "conflicting drivers on net");
            }
            Diagnostic::WidthConflict { path, net, widths } => {
                tracing::warn!(?path, net, ?widths, "incompatible widths on net");
            }
        }
    }
}
