//! Half adder example.
//!
//! Builds a half adder (XOR for the sum, AND for the carry) from the
//! default component registry, wraps it as a sub-circuit, and chains two
//! instances into a two-bit incrementer. Every input combination is
//! applied and the settled outputs are printed together with the time the
//! outputs took to settle.

use std::sync::Arc;

use kairo::attrs::AttributeSet;
use kairo::components::Subcircuit;
use kairo::{create_default_registry, Circuit, ComponentId, Location, SimConfigBuilder, Simulator, Value};

const GATE_DELAY: u64 = 2;

// -----------------------------------------------------------------------------
// Circuit construction
// -----------------------------------------------------------------------------

fn half_adder() -> Result<Circuit, Box<dyn std::error::Error>> {
    let registry = create_default_registry();
    let gate = AttributeSet::new().with("delay", GATE_DELAY);

    let mut circuit = Circuit::new("half adder");
    let a = circuit.add_shared(
        Location::new(0, 0),
        registry.create("Pin", &AttributeSet::new().with("label", "a"))?,
    );
    let b = circuit.add_shared(
        Location::new(0, 40),
        registry.create("Pin", &AttributeSet::new().with("label", "b"))?,
    );
    let xor = circuit.add_shared(Location::new(100, 0), registry.create("XOR Gate", &gate)?);
    let and = circuit.add_shared(Location::new(100, 80), registry.create("AND Gate", &gate)?);
    let sum = circuit.add_shared(
        Location::new(160, 0),
        registry.create("Pin", &AttributeSet::new().with("output", true).with("label", "sum"))?,
    );
    let carry = circuit.add_shared(
        Location::new(160, 80),
        registry.create("Pin", &AttributeSet::new().with("output", true).with("label", "carry"))?,
    );

    circuit.connect((a, 0), (xor, 0))?;
    circuit.connect((b, 0), (xor, 1))?;
    circuit.connect((a, 0), (and, 0))?;
    circuit.connect((b, 0), (and, 1))?;
    circuit.connect((xor, 2), (sum, 0))?;
    circuit.connect((and, 2), (carry, 0))?;
    Ok(circuit)
}

struct Incrementer {
    circuit: Circuit,
    x0: ComponentId,
    x1: ComponentId,
    y0: ComponentId,
    y1: ComponentId,
    overflow: ComponentId,
}

/// `y = x + 1` on two bits, from two half adder instances.
fn incrementer(adder: Arc<Circuit>) -> Result<Incrementer, Box<dyn std::error::Error>> {
    let registry = create_default_registry();
    let input = |label: &str| registry.create("Pin", &AttributeSet::new().with("label", label));
    let output = |label: &str| {
        registry.create("Pin", &AttributeSet::new().with("output", true).with("label", label))
    };

    let mut circuit = Circuit::new("incrementer");
    let x0 = circuit.add_shared(Location::new(0, 0), input("x0")?);
    let x1 = circuit.add_shared(Location::new(0, 100), input("x1")?);
    let one = circuit.add_shared(
        Location::new(0, 40),
        registry.create("Constant", &AttributeSet::new().with("value", "1"))?,
    );

    // ports: a (-40, 0), b (-40, 20), sum (0, 0), carry (0, 20)
    let low = circuit.add(Location::new(100, 0), Subcircuit::new(Arc::clone(&adder)));
    let high = circuit.add(Location::new(200, 100), Subcircuit::new(adder));
    let y0 = circuit.add_shared(Location::new(300, 0), output("y0")?);
    let y1 = circuit.add_shared(Location::new(300, 100), output("y1")?);
    let overflow = circuit.add_shared(Location::new(300, 200), output("overflow")?);

    circuit.connect((x0, 0), (low, 0))?;
    circuit.connect((one, 0), (low, 1))?;
    circuit.connect((low, 2), (y0, 0))?;
    circuit.connect((x1, 0), (high, 0))?;
    circuit.connect((low, 3), (high, 1))?;
    circuit.connect((high, 2), (y1, 0))?;
    circuit.connect((high, 3), (overflow, 0))?;

    Ok(Incrementer { circuit, x0, x1, y0, y1, overflow })
}

fn bit(value: Option<Value>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

// -----------------------------------------------------------------------------
// Main simulation
// -----------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SimConfigBuilder::new().log_level("warn").collect_stats(true).build()?;
    config.init_logging();

    println!("==== Half adder example ====");
    println!("Two half adder instances form a two-bit incrementer.\n");

    let adder = Arc::new(half_adder()?);
    let Incrementer { circuit, x0, x1, y0, y1, overflow } = incrementer(adder)?;

    let mut sim = Simulator::with_config(circuit, config);
    sim.propagate_once()?;

    for x in 0u64..4 {
        let start = sim.time();
        sim.set_pin_value(x0, Value::known(1, x & 1))?;
        let report = sim.set_pin_value(x1, Value::known(1, x >> 1))?;
        let settled = report.map_or(start, |r| r.time);

        println!(
            "x = {}{}  =>  overflow {}  y = {}{}   (settled after {} time units)",
            x >> 1,
            x & 1,
            bit(sim.pin_value(overflow)),
            bit(sim.pin_value(y1)),
            bit(sim.pin_value(y0)),
            settled - start,
        );
    }

    let stats = sim.export_stats();
    println!("\nSimulation advanced to time {}", stats["engine"]["current_time"]);
    println!("Events applied: {}", stats["engine"]["events_applied"].as_u64().unwrap_or(0));
    println!("Diagnostics: {}", sim.diagnostics().len());
    println!("Wall time in drains: {:.3} ms", sim.stats().timing.total_wall_time_ms);
    Ok(())
}
