//! Integration tests for propagation through the Simulator.
//!
//! These tests verify end-to-end drain behaviour including:
//! - Gate delays and single-stepping
//! - Fixed points and idempotent drains
//! - Oscillation detection and reset
//! - Driver conflicts and multi-reader fan-out

use kairo::components::{Constant, ControlledBuffer, Gate, GateOp, NotGate, Pin};
use kairo::config::SimConfigBuilder;
use kairo::{Circuit, ComponentId, Diagnostic, DrainOutcome, Location, SimState, Simulator, Value};

// ============================================================================
// Helpers
// ============================================================================

fn manual() -> kairo::SimConfig {
    SimConfigBuilder::new().auto_propagate(false).build().unwrap()
}

/// Two input pins into a two-input gate at (100, 0), output pin on its
/// output. Returns `(circuit, a, b, gate, y)`.
fn two_input(op: GateOp, delay: u64) -> (Circuit, ComponentId, ComponentId, ComponentId, ComponentId) {
    let mut circuit = Circuit::new(op.to_string());
    let a = circuit.add(Location::new(20, -10), Pin::input(1));
    let b = circuit.add(Location::new(20, 10), Pin::input(1));
    let gate = circuit.add(Location::new(100, 0), Gate::new(op, 1, 2, delay));
    let y = circuit.add(Location::new(140, 0), Pin::output(1));
    circuit.connect((a, 0), (gate, 0)).unwrap();
    circuit.connect((b, 0), (gate, 1)).unwrap();
    circuit.connect((gate, 2), (y, 0)).unwrap();
    (circuit, a, b, gate, y)
}

// ============================================================================
// Delays and stepping
// ============================================================================

#[test]
fn test_unknown_input_reaches_gate_output() {
    let mut circuit = Circuit::new("floating");
    let a = circuit.add(Location::new(20, -10), Pin::input(1));
    let and = circuit.add(Location::new(100, 0), Gate::new(GateOp::And, 1, 2, 1));
    let or = circuit.add(Location::new(100, 100), Gate::new(GateOp::Or, 1, 2, 1));
    circuit.connect((a, 0), (and, 0)).unwrap();
    circuit.connect((a, 0), (or, 0)).unwrap();

    let mut sim = Simulator::with_config(circuit, manual());
    sim.inject_pin_value(a, Value::TRUE).unwrap();
    assert_eq!(sim.status(), SimState::Draining);
    assert_eq!(sim.port_value(and, 2), Some(Value::UNKNOWN));

    let report = sim.propagate_once().unwrap();
    assert!(report.is_settled());
    assert_eq!(sim.port_value(and, 1), Some(Value::UNKNOWN));
    assert_eq!(sim.port_value(and, 2), Some(Value::UNKNOWN));
    assert_eq!(sim.port_value(or, 2), Some(Value::TRUE));
}

#[test]
fn test_gate_delay_is_respected() {
    let (circuit, a, b, _, y) = two_input(GateOp::And, 3);
    let mut sim = Simulator::with_config(circuit, manual());
    sim.inject_pin_value(a, Value::TRUE).unwrap();
    sim.inject_pin_value(b, Value::TRUE).unwrap();

    let mut times = Vec::new();
    while let Some(report) = sim.step().unwrap() {
        if report.time < 3 {
            assert_eq!(sim.pin_value(y), Some(Value::UNKNOWN));
        }
        times.push(report.time);
    }

    assert_eq!(times.last(), Some(&3));
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(sim.time(), 3);
    assert_eq!(sim.pin_value(y), Some(Value::TRUE));
    assert_eq!(sim.status(), SimState::Idle);
}

#[test]
fn test_settled_drain_is_idempotent() {
    let (circuit, a, b, _, _) = two_input(GateOp::Xor, 1);
    let mut sim = Simulator::new(circuit);
    sim.set_pin_value(a, Value::TRUE).unwrap();
    sim.set_pin_value(b, Value::FALSE).unwrap();

    let before = sim.state().net_values().to_vec();
    let time = sim.time();
    let report = sim.propagate_once().unwrap();

    assert_eq!(report.steps, 0);
    assert!(report.changed_nets.is_empty());
    assert_eq!(report.outcome, DrainOutcome::Settled);
    assert_eq!(sim.state().net_values(), before.as_slice());
    assert_eq!(sim.time(), time);
}

#[test]
fn test_truth_table() {
    let cases = [
        (GateOp::And, [(0, 0, 0), (0, 1, 0), (1, 0, 0), (1, 1, 1)]),
        (GateOp::Or, [(0, 0, 0), (0, 1, 1), (1, 0, 1), (1, 1, 1)]),
        (GateOp::Nand, [(0, 0, 1), (0, 1, 1), (1, 0, 1), (1, 1, 0)]),
        (GateOp::Xnor, [(0, 0, 1), (0, 1, 0), (1, 0, 0), (1, 1, 1)]),
    ];

    for (op, rows) in cases {
        let (circuit, a, b, _, y) = two_input(op, 1);
        let mut sim = Simulator::new(circuit);
        for (x0, x1, expected) in rows {
            sim.set_pin_value(a, Value::known(1, x0)).unwrap();
            sim.set_pin_value(b, Value::known(1, x1)).unwrap();
            assert_eq!(sim.pin_value(y), Some(Value::known(1, expected)), "{op} {x0} {x1}");
        }
    }
}

// ============================================================================
// Oscillation
// ============================================================================

/// NAND whose output feeds its own second input, with no delay.
fn ring() -> (Circuit, ComponentId) {
    let mut circuit = Circuit::new("ring");
    let enable = circuit.add(Location::new(20, -10), Pin::input(1));
    let nand = circuit.add(Location::new(100, 0), Gate::new(GateOp::Nand, 1, 2, 0));
    circuit.connect((enable, 0), (nand, 0)).unwrap();
    circuit.connect((nand, 2), (nand, 1)).unwrap();
    (circuit, enable)
}

#[test]
fn test_ring_oscillates_and_recovers_on_reset() {
    let (circuit, enable) = ring();
    let config = SimConfigBuilder::new().step_limit(40).build().unwrap();
    let mut sim = Simulator::with_config(circuit, config);

    let settled = sim.propagate_once().unwrap();
    assert!(settled.is_settled());

    let report = sim.set_pin_value(enable, Value::TRUE).unwrap().unwrap();
    assert_eq!(report.outcome, DrainOutcome::Oscillating);
    assert_eq!(report.steps, 40);
    assert_eq!(sim.status(), SimState::Oscillating);
    assert!(sim.pending_events() > 0);
    assert!(sim.diagnostics().iter().any(Diagnostic::is_oscillation));

    // edits are refused until the simulator is reset
    assert!(sim.circuit_mut().is_err());

    sim.reset();
    assert_eq!(sim.status(), SimState::Idle);
    assert_eq!(sim.pending_events(), 0);
    assert_eq!(sim.time(), 0);
    assert!(sim.propagate_once().unwrap().is_settled());
}

#[test]
fn test_three_stage_ring_oscillates() {
    // NAND followed by two inverters, all without delay
    let mut circuit = Circuit::new("three stage ring");
    let enable = circuit.add(Location::new(20, -10), Pin::input(1));
    let nand = circuit.add(Location::new(100, 0), Gate::new(GateOp::Nand, 1, 2, 0));
    let first = circuit.add(Location::new(200, 0), NotGate::new(1, 0));
    let second = circuit.add(Location::new(300, 0), NotGate::new(1, 0));
    circuit.connect((enable, 0), (nand, 0)).unwrap();
    circuit.connect((nand, 2), (first, 0)).unwrap();
    circuit.connect((first, 1), (second, 0)).unwrap();
    circuit.connect((second, 1), (nand, 1)).unwrap();

    let config = SimConfigBuilder::new().step_limit(60).build().unwrap();
    let mut sim = Simulator::with_config(circuit, config);
    assert!(sim.propagate_once().unwrap().is_settled());
    assert_eq!(sim.port_value(second, 1), Some(Value::TRUE));

    let report = sim.set_pin_value(enable, Value::TRUE).unwrap().unwrap();
    assert_eq!(report.outcome, DrainOutcome::Oscillating);
    assert_eq!(report.steps, 60);
    assert_eq!(sim.status(), SimState::Oscillating);
    assert!(sim
        .diagnostics()
        .iter()
        .any(|d| d.is_oscillation() && d.path().is_empty()));

    sim.reset();
    assert!(sim.propagate_once().unwrap().is_settled());
}

// ============================================================================
// Driver resolution
// ============================================================================

#[test]
fn test_conflicting_drivers_produce_error() {
    let mut circuit = Circuit::new("conflict");
    let one = circuit.add(Location::new(0, 0), Constant::new(Value::TRUE));
    let zero = circuit.add(Location::new(0, 40), Constant::new(Value::FALSE));
    let y = circuit.add(Location::new(60, 20), Pin::output(1));
    circuit.connect((one, 0), (y, 0)).unwrap();
    circuit.connect((zero, 0), (y, 0)).unwrap();

    let mut sim = Simulator::new(circuit);
    let report = sim.propagate_once().unwrap();
    assert!(report.is_settled());
    assert_eq!(sim.pin_value(y), Some(Value::ERROR));
    assert!(sim
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::DriverConflict { path, .. } if path.is_empty())));
    assert_eq!(sim.stats().engine.conflicts, 1);
}

#[test]
fn test_floating_driver_defers_to_defined_one() {
    let mut circuit = Circuit::new("tristate");
    let data = circuit.add(Location::new(0, 0), Constant::new(Value::FALSE));
    let enable = circuit.add(Location::new(10, 10), Pin::input(1));
    let buffer = circuit.add(Location::new(20, 0), ControlledBuffer::new(1, 1));
    let one = circuit.add(Location::new(20, 60), Constant::new(Value::TRUE));
    let y = circuit.add(Location::new(80, 0), Pin::output(1));
    circuit.connect((data, 0), (buffer, 0)).unwrap();
    circuit.connect((enable, 0), (buffer, 1)).unwrap();
    circuit.connect((buffer, 2), (y, 0)).unwrap();
    circuit.connect((one, 0), (y, 0)).unwrap();

    let mut sim = Simulator::new(circuit);
    sim.propagate_once().unwrap();
    assert_eq!(sim.pin_value(y), Some(Value::TRUE));
    assert!(sim.diagnostics().is_empty());

    sim.set_pin_value(enable, Value::TRUE).unwrap();
    assert_eq!(sim.pin_value(y), Some(Value::ERROR));
}

#[test]
fn test_single_driver_many_readers() {
    let mut circuit = Circuit::new("fanout");
    let a = circuit.add(Location::new(0, 0), Pin::input(1));
    let mut outputs = Vec::new();
    for i in 0..8 {
        let not = circuit.add(Location::new(100, i * 40), NotGate::new(1, 1 + i as u64));
        let y = circuit.add(Location::new(140, i * 40), Pin::output(1));
        circuit.connect((a, 0), (not, 0)).unwrap();
        circuit.connect((not, 1), (y, 0)).unwrap();
        outputs.push(y);
    }

    let mut sim = Simulator::new(circuit);
    sim.set_pin_value(a, Value::FALSE).unwrap();
    assert!(outputs.iter().all(|y| sim.pin_value(*y) == Some(Value::TRUE)));

    let start = sim.time();
    let report = sim.set_pin_value(a, Value::TRUE).unwrap().unwrap();
    assert!(report.is_settled());
    assert!(outputs.iter().all(|y| sim.pin_value(*y) == Some(Value::FALSE)));
    assert_eq!(report.time, start + 8);
}

#[test]
fn test_wide_values_propagate() {
    let mut circuit = Circuit::new("bus");
    let a = circuit.add(Location::new(0, 0), Pin::input(8));
    let not = circuit.add(Location::new(60, 0), NotGate::new(8, 1));
    let y = circuit.add(Location::new(100, 0), Pin::output(8));
    circuit.connect((a, 0), (not, 0)).unwrap();
    circuit.connect((not, 1), (y, 0)).unwrap();

    let mut sim = Simulator::new(circuit);
    sim.set_pin_value(a, Value::known(8, 0b1010_0101)).unwrap();
    assert_eq!(sim.pin_value(y), Some(Value::known(8, 0b0101_1010)));

    let err = sim.set_pin_value(a, Value::TRUE).unwrap_err();
    assert!(matches!(err, kairo::SimError::WidthMismatch { .. }));
}
