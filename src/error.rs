//! Error types for contract violations inside the kernel.
//!
//! Driver conflicts, oscillation and component misconfiguration are normal
//! operating conditions and never show up here; they travel in-band as
//! `E` values or as [`Diagnostic`](crate::diagnostics::Diagnostic) records.

use thiserror::Error;

use crate::engine::SimState;
use crate::types::ComponentId;
use crate::value::MAX_WIDTH;

/// Errors returned when a caller or a component breaks the kernel contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("invalid bit width {0} (expected 1..={MAX_WIDTH})")]
    InvalidWidth(u32),

    #[error("width mismatch: {left} vs {right}")]
    WidthMismatch { left: u8, right: u8 },

    #[error("invalid value literal: {0:?}")]
    ParseValue(String),

    #[error("component {component} has no port {port}")]
    UndeclaredPort { component: ComponentId, port: usize },

    #[error("component {component} cannot drive input port {port}")]
    DrivesInput { component: ComponentId, port: usize },

    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),

    #[error("component {0} is not an input pin")]
    NotAnInputPin(ComponentId),

    #[error("topology edits require an idle simulator (currently {0:?})")]
    NotIdle(SimState),

    #[error("simulator has been stopped")]
    Stopped,

    #[error("unknown component type: {0}")]
    UnknownType(String),
}

/// Result type for kernel operations.
pub type SimResult<T> = Result<T, SimError>;
