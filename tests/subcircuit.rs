//! Integration tests for sub-circuit instances.
//!
//! These tests verify that every placement of a definition keeps its own
//! state, that nested states are reachable by instantiation path, and that
//! clock ticks reach clocks inside instances.

use std::sync::Arc;

use kairo::components::{
    Clock, DFlipFlop, FlipFlopState, Gate, GateOp, NotGate, Pin, PinState, Subcircuit,
};
use kairo::config::SimConfigBuilder;
use kairo::{Circuit, ComponentId, Diagnostic, DrainOutcome, Location, SimState, Simulator, Value};

// ============================================================================
// Definitions
// ============================================================================

/// `y = !a`, returning the definition and the ids of its pins.
fn inverter() -> (Arc<Circuit>, ComponentId, ComponentId) {
    let mut circuit = Circuit::new("inverter");
    let a = circuit.add(Location::new(0, 0), Pin::input(1).with_label("a"));
    let not = circuit.add(Location::new(60, 0), NotGate::new(1, 1));
    let y = circuit.add(Location::new(100, 0), Pin::output(1).with_label("y"));
    circuit.connect((a, 0), (not, 0)).unwrap();
    circuit.connect((not, 1), (y, 0)).unwrap();
    (Arc::new(circuit), a, y)
}

/// Places an instance with its input pin and output pin at `(0, y)`.
fn place(
    circuit: &mut Circuit,
    definition: &Arc<Circuit>,
    y: i32,
) -> (ComponentId, ComponentId, ComponentId) {
    let input = circuit.add(Location::new(0, y), Pin::input(1));
    let sub = circuit.add(Location::new(100, y), Subcircuit::new(Arc::clone(definition)));
    let output = circuit.add(Location::new(150, y), Pin::output(1));
    circuit.connect((input, 0), (sub, 0)).unwrap();
    circuit.connect((sub, 1), (output, 0)).unwrap();
    (input, sub, output)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_instances_do_not_share_state() {
    let (definition, _, inner_y) = inverter();
    let mut circuit = Circuit::new("main");
    let (in1, sub1, out1) = place(&mut circuit, &definition, 0);
    let (in2, sub2, out2) = place(&mut circuit, &definition, 100);

    let mut sim = Simulator::new(circuit);
    sim.set_pin_value(in1, Value::FALSE).unwrap();
    sim.set_pin_value(in2, Value::TRUE).unwrap();

    assert_eq!(sim.pin_value(out1), Some(Value::TRUE));
    assert_eq!(sim.pin_value(out2), Some(Value::FALSE));

    let first = sim.state_at(&[sub1]).unwrap();
    let second = sim.state_at(&[sub2]).unwrap();
    assert_eq!(first.path(), &[sub1]);
    assert_eq!(second.path(), &[sub2]);
    assert_eq!(sim.state().children(), vec![sub1, sub2]);

    let seen = |sub: ComponentId| {
        sim.component_data(&[sub, inner_y])
            .and_then(|d| d.downcast_ref::<PinState>())
            .map(|s| s.value)
    };
    assert_eq!(seen(sub1), Some(Value::TRUE));
    assert_eq!(seen(sub2), Some(Value::FALSE));

    sim.set_pin_value(in1, Value::TRUE).unwrap();
    assert_eq!(sim.pin_value(out1), Some(Value::FALSE));
    assert_eq!(sim.pin_value(out2), Some(Value::FALSE));
}

#[test]
fn test_nested_instances() {
    let (definition, _, _) = inverter();

    // two inverters in series make a buffer
    let mut middle = Circuit::new("double");
    let a = middle.add(Location::new(0, 0), Pin::input(1));
    let first = middle.add(Location::new(100, 0), Subcircuit::new(Arc::clone(&definition)));
    let second = middle.add(Location::new(200, 0), Subcircuit::new(Arc::clone(&definition)));
    let y = middle.add(Location::new(250, 0), Pin::output(1));
    middle.connect((a, 0), (first, 0)).unwrap();
    middle.connect((first, 1), (second, 0)).unwrap();
    middle.connect((second, 1), (y, 0)).unwrap();
    let middle = Arc::new(middle);

    let mut top = Circuit::new("top");
    let (input, outer, output) = place(&mut top, &middle, 0);

    let mut sim = Simulator::new(top);
    sim.set_pin_value(input, Value::TRUE).unwrap();
    assert_eq!(sim.pin_value(output), Some(Value::TRUE));
    sim.set_pin_value(input, Value::FALSE).unwrap();
    assert_eq!(sim.pin_value(output), Some(Value::FALSE));

    let deepest = sim.state_at(&[outer, second]).unwrap();
    assert_eq!(deepest.path(), &[outer, second]);
    assert!(sim.state_at(&[outer, y]).is_none());
}

#[test]
fn test_instance_delay_applies_at_boundary() {
    let (definition, _, _) = inverter();
    let mut circuit = Circuit::new("slow");
    let input = circuit.add(Location::new(0, 0), Pin::input(1));
    let sub = circuit.add(Location::new(100, 0), Subcircuit::with_delay(definition, 4));
    let output = circuit.add(Location::new(150, 0), Pin::output(1));
    circuit.connect((input, 0), (sub, 0)).unwrap();
    circuit.connect((sub, 1), (output, 0)).unwrap();

    let mut sim = Simulator::new(circuit);
    sim.propagate_once().unwrap();
    let start = sim.time();

    let report = sim.set_pin_value(input, Value::TRUE).unwrap().unwrap();
    assert_eq!(sim.pin_value(output), Some(Value::FALSE));
    assert_eq!(report.time, start + 4);
}

#[test]
fn test_ticks_reach_clocks_inside_instances() {
    let mut inner = Circuit::new("ticker");
    let clock = inner.add(Location::new(0, 0), Clock::default());
    let q = inner.add(Location::new(40, 0), Pin::output(1));
    inner.connect((clock, 0), (q, 0)).unwrap();

    let mut circuit = Circuit::new("main");
    let sub = circuit.add(Location::new(0, 0), Subcircuit::new(Arc::new(inner)));
    let out = circuit.add(Location::new(50, 0), Pin::output(1));
    circuit.connect((sub, 0), (out, 0)).unwrap();

    let mut sim = Simulator::new(circuit);
    sim.propagate_once().unwrap();
    assert_eq!(sim.pin_value(out), Some(Value::FALSE));

    let mut levels = Vec::new();
    for _ in 0..4 {
        assert!(sim.tick().unwrap().is_settled());
        levels.push(sim.pin_value(out));
    }
    let t = Some(Value::TRUE);
    let f = Some(Value::FALSE);
    assert_eq!(levels, vec![t, f, t, f]);

    let reports = sim.run_ticks(3).unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(sim.ticks(), 7);
    assert_eq!(sim.pin_value(out), t);
}

#[test]
fn test_flip_flop_state_per_instance() {
    // a toggle: D fed from !Q, clocked by the instance's own clock
    let mut inner = Circuit::new("toggle");
    let clock = inner.add(Location::new(0, 10), Clock::default());
    let ff = inner.add(Location::new(40, 0), DFlipFlop::new(1, 1));
    let not = inner.add(Location::new(100, -60), NotGate::new(1, 1));
    let q = inner.add(Location::new(120, -10), Pin::output(1));
    inner.connect((clock, 0), (ff, 1)).unwrap();
    inner.connect((ff, 2), (not, 0)).unwrap();
    inner.connect((not, 1), (ff, 0)).unwrap();
    inner.connect((ff, 2), (q, 0)).unwrap();
    let inner = Arc::new(inner);

    let mut circuit = Circuit::new("main");
    let sub = circuit.add(Location::new(0, 0), Subcircuit::new(Arc::clone(&inner)));
    let out = circuit.add(Location::new(50, 0), Pin::output(1));
    circuit.connect((sub, 0), (out, 0)).unwrap();

    let mut sim = Simulator::new(circuit);
    sim.propagate_once().unwrap();
    assert_eq!(sim.pin_value(out), Some(Value::FALSE));

    let mut outputs = Vec::new();
    for _ in 0..4 {
        sim.tick().unwrap();
        outputs.push(sim.pin_value(out));
    }
    let t = Some(Value::TRUE);
    let f = Some(Value::FALSE);
    assert_eq!(outputs, vec![t, t, f, f]);

    let stored = sim
        .component_data(&[sub, ff])
        .and_then(|d| d.downcast_ref::<FlipFlopState>())
        .map(|s| s.stored);
    assert_eq!(stored, Some(Value::FALSE));
    assert!(sim.diagnostics().iter().all(|d| !matches!(d, Diagnostic::Oscillation { .. })));
}

#[test]
fn test_oscillation_inside_instance_reaches_root() {
    // a NAND fed back onto itself without delay, enabled from outside
    let mut ring = Circuit::new("ring");
    let a = ring.add(Location::new(0, 0), Pin::input(1));
    let nand = ring.add(Location::new(100, 0), Gate::new(GateOp::Nand, 1, 2, 0));
    let y = ring.add(Location::new(150, 0), Pin::output(1));
    ring.connect((a, 0), (nand, 0)).unwrap();
    ring.connect((nand, 2), (nand, 1)).unwrap();
    ring.connect((nand, 2), (y, 0)).unwrap();
    let ring = Arc::new(ring);

    let mut circuit = Circuit::new("main");
    let (input, sub, _) = place(&mut circuit, &ring, 0);
    let config = SimConfigBuilder::new().step_limit(25).build().unwrap();
    let mut sim = Simulator::with_config(circuit, config);
    assert!(sim.propagate_once().unwrap().is_settled());

    let report = sim.set_pin_value(input, Value::TRUE).unwrap().unwrap();
    assert_eq!(report.outcome, DrainOutcome::Oscillating);
    assert_eq!(sim.status(), SimState::Oscillating);
    assert!(sim
        .diagnostics()
        .iter()
        .any(|d| d.is_oscillation() && d.path() == [sub]));
    assert!(sim.circuit_mut().is_err());

    // the instance picks its nested drain up again
    let again = sim.propagate_once().unwrap();
    assert_eq!(again.outcome, DrainOutcome::Oscillating);
    assert!(again.steps > 0);
    assert_eq!(sim.status(), SimState::Oscillating);

    sim.reset();
    assert_eq!(sim.status(), SimState::Idle);
    assert!(sim.propagate_once().unwrap().is_settled());
    assert!(sim.state_at(&[sub]).is_some());
}
