//! # Kairo Logic Simulation Kernel
//!
//! A discrete-event simulation kernel for digital logic circuits built
//! from multi-valued signals.
//!
//! ## Design Principles
//!
//! - **Four-valued logic**: every bit is `0`, `1`, `X` (unknown/floating)
//!   or `E` (error/conflict). Conflicts are values, not exceptions.
//! - **Nets by union-find**: wires join port locations into nets; a net's
//!   value is the combination of every driver touching it.
//! - **Deterministic events**: writes are scheduled events ordered by fire
//!   time and then by insertion order, so runs are reproducible.
//! - **Per-instance state**: every sub-circuit placement owns its own
//!   nested state; instances never share values.
//! - **Bounded drains**: each stimulus is drained to a fixed point or
//!   reported as oscillating once a step limit is reached.
//! - **Versioned topology**: edits bump a version counter and nets are
//!   rebuilt lazily before the next propagation.
//!
//! ## Quick Start
//!
//! ```rust
//! use kairo::{Circuit, Location, Simulator, Value};
//! use kairo::components::{Gate, GateOp, Pin};
//!
//! let mut circuit = Circuit::new("and");
//! let a = circuit.add(Location::new(0, -10), Pin::input(1));
//! let b = circuit.add(Location::new(0, 10), Pin::input(1));
//! let and = circuit.add(Location::new(100, 0), Gate::new(GateOp::And, 1, 2, 1));
//! let y = circuit.add(Location::new(140, 0), Pin::output(1));
//! circuit.connect((a, 0), (and, 0)).unwrap();
//! circuit.connect((b, 0), (and, 1)).unwrap();
//! circuit.connect((and, 2), (y, 0)).unwrap();
//!
//! let mut sim = Simulator::new(circuit);
//! sim.set_pin_value(a, Value::TRUE).unwrap();
//! sim.set_pin_value(b, Value::TRUE).unwrap();
//! assert_eq!(sim.pin_value(y), Some(Value::TRUE));
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use kairo::config::SimConfig;
//!
//! let config = SimConfig::from_yaml_file("simulation.yaml")?;
//! config.init_logging();
//! let sim = kairo::Simulator::with_config(circuit, config);
//! ```

pub mod attrs;
pub mod circuit;
pub mod component;
pub mod components;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod engine;
pub mod error;
pub mod event;
pub mod geometry;
pub mod net;
pub mod propagator;
pub mod registry;
pub mod state;
pub mod stats;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use types::{ComponentId, InstancePath, NetId, PortRef, SimTime};
pub use value::{Bit, Value, MAX_WIDTH};
pub use error::{SimError, SimResult};
pub use geometry::{Bounds, Location};
pub use attrs::AttributeSet;
pub use component::{Component, ComponentData, Direction, PortDesc, PropagateContext, Strength};
pub use circuit::{Circuit, Placed, Wire};
pub use net::{Net, Netlist, Resolution, UnionFind};
pub use state::CircuitState;
pub use event::{Event, EventQueue};
pub use diagnostics::Diagnostic;
pub use propagator::{DrainOutcome, DrainReport, Propagator, StepReport, DEFAULT_STEP_LIMIT};
pub use engine::{SimState, Simulator};
pub use driver::{DriverExit, TickDriver};
pub use config::{ConfigError, SimConfig, SimConfigBuilder};
pub use registry::{create_default_registry, ComponentRegistry};
pub use stats::{SimulationStats, StatsCollector, Timer};

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `level`. Calling this more than once
/// keeps the first subscriber.
///
/// # Example
///
/// ```rust,ignore
/// kairo::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
