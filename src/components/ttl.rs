//! 74xx quad two-input gate packages.
//!
//! Each package holds four independent gates. Ports come in groups of
//! three (`a`, `b`, `y`), so port `3 * g + 2` is the output of gate `g`.
//! Power pins are not modelled.

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::component::{Component, PortDesc, PropagateContext};
use crate::error::{SimError, SimResult};
use crate::types::SimTime;

use super::gates::GateOp;

/// Propagation delay of every TTL gate.
pub const TTL_DELAY: SimTime = 1;

/// Supported packages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TtlKind {
    /// Quad AND
    Ttl7408,
    /// Quad OR
    Ttl7432,
    /// Quad XOR
    Ttl7486,
}

impl TtlKind {
    pub fn op(self) -> GateOp {
        match self {
            TtlKind::Ttl7408 => GateOp::And,
            TtlKind::Ttl7432 => GateOp::Or,
            TtlKind::Ttl7486 => GateOp::Xor,
        }
    }

    pub fn part_number(self) -> &'static str {
        match self {
            TtlKind::Ttl7408 => "7408",
            TtlKind::Ttl7432 => "7432",
            TtlKind::Ttl7486 => "7486",
        }
    }
}

impl fmt::Display for TtlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.part_number())
    }
}

impl FromStr for TtlKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7408" => Ok(TtlKind::Ttl7408),
            "7432" => Ok(TtlKind::Ttl7432),
            "7486" => Ok(TtlKind::Ttl7486),
            other => Err(SimError::UnknownType(other.to_string())),
        }
    }
}

/// A quad gate package.
#[derive(Debug, Clone)]
pub struct TtlQuadGate {
    kind: TtlKind,
    name: String,
    ports: Vec<PortDesc>,
}

impl TtlQuadGate {
    pub fn new(kind: TtlKind) -> Self {
        let mut ports = Vec::with_capacity(12);
        for gate in 0..4 {
            let x = gate * 30;
            ports.push(PortDesc::input(format!("{}a", gate + 1), x, 30, 1));
            ports.push(PortDesc::input(format!("{}b", gate + 1), x + 10, 30, 1));
            ports.push(PortDesc::output(format!("{}y", gate + 1), x + 20, 30, 1));
        }
        Self {
            kind,
            name: format!("{kind}"),
            ports,
        }
    }

    pub fn kind(&self) -> TtlKind {
        self.kind
    }
}

impl Component for TtlQuadGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        let op = self.kind.op();
        for out in (2..12).step_by(3) {
            let inputs = [ctx.input(out - 2)?, ctx.input(out - 1)?];
            ctx.set_output(out, op.apply(&inputs)?, TTL_DELAY)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
