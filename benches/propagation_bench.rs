//! Performance benchmarks for the Kairo simulation kernel.
//!
//! Run with: `cargo bench`
//! Or for specific bench: `cargo bench --bench propagation_bench`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use kairo::components::{Clock, DFlipFlop, NotGate, Pin, Subcircuit};
use kairo::{Circuit, ComponentId, EventQueue, Location, PortRef, SimConfigBuilder, Simulator, Value};

/// Long chains need more steps than the default limit allows.
fn simulator(circuit: Circuit) -> Simulator {
    let config = SimConfigBuilder::new().step_limit(100_000).build().unwrap();
    Simulator::with_config(circuit, config)
}

// ============================================================================
// Benchmark Circuits
// ============================================================================

/// An input pin followed by `length` inverters in series.
fn inverter_chain(length: usize) -> (Circuit, ComponentId, ComponentId) {
    let mut circuit = Circuit::new("chain");
    let input = circuit.add(Location::new(0, 0), Pin::input(1));
    let mut prev = (input, 0);
    for i in 0..length {
        let x = 60 * (i as i32 + 1);
        let not = circuit.add(Location::new(x, 0), NotGate::new(1, 1));
        circuit.connect(prev, (not, 0)).unwrap();
        prev = (not, 1);
    }
    let output = circuit.add(Location::new(60 * (length as i32 + 1), 40), Pin::output(1));
    circuit.connect(prev, (output, 0)).unwrap();
    (circuit, input, output)
}

/// A ripple counter of `bits` toggle flip-flops driven by one clock.
fn ripple_counter(bits: usize) -> Circuit {
    let mut circuit = Circuit::new("counter");
    let clock = circuit.add(Location::new(0, 10), Clock::default());
    let mut clk = (clock, 0);
    for i in 0..bits {
        let y = 100 * i as i32;
        let ff = circuit.add(Location::new(40, y), DFlipFlop::new(1, 1));
        circuit.connect(clk, (ff, 1)).unwrap();
        // nq feeds d, so every rising edge toggles the stage
        circuit.connect((ff, 3), (ff, 0)).unwrap();
        clk = (ff, 3);
    }
    circuit
}

// ============================================================================
// Propagation Benchmarks
// ============================================================================

fn bench_inverter_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("inverter_chain");

    for length in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*length as u64));
        group.bench_with_input(BenchmarkId::new("gates", length), length, |b, &length| {
            let (circuit, input, _) = inverter_chain(length);
            let mut sim = simulator(circuit);
            sim.propagate_once().unwrap();
            let mut level = false;

            b.iter(|| {
                level = !level;
                black_box(sim.set_pin_value(input, Value::from(level)).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_subcircuit_instances(c: &mut Criterion) {
    let mut group = c.benchmark_group("subcircuit_instances");
    let (inner, _, _) = inverter_chain(8);
    let inner = Arc::new(inner);

    for count in [1, 10, 50].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("instances", count), count, |b, &count| {
            let mut circuit = Circuit::new("many");
            let input = circuit.add(Location::new(0, 0), Pin::input(1));
            for i in 0..count {
                let sub = circuit.add(
                    Location::new(100, 50 * i as i32),
                    Subcircuit::new(Arc::clone(&inner)),
                );
                circuit.connect((input, 0), (sub, 0)).unwrap();
            }
            let mut sim = simulator(circuit);
            sim.propagate_once().unwrap();
            let mut level = false;

            b.iter(|| {
                level = !level;
                black_box(sim.set_pin_value(input, Value::from(level)).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_clock_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_ticks");

    for bits in [4, 16, 32].iter() {
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::new("counter_bits", bits), bits, |b, &bits| {
            let mut sim = simulator(ripple_counter(bits));
            sim.propagate_once().unwrap();

            b.iter(|| {
                black_box(sim.run_ticks(100).unwrap());
            });
        });
    }

    group.finish();
}

// ============================================================================
// Event Queue Benchmarks
// ============================================================================

fn bench_event_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_queue");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("push_pop", size), size, |b, &size| {
            b.iter_batched(
                || {
                    let mut queue = EventQueue::new();
                    for i in 0..size as u64 {
                        // Spread across 16 time slots in reverse order
                        queue.push(16 - i % 16, PortRef::new(i, 0), Value::TRUE, None);
                    }
                    queue
                },
                |mut queue| {
                    while !queue.pop_earliest().is_empty() {}
                    black_box(queue.len());
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Groups
// ============================================================================

criterion_group!(
    benches,
    bench_inverter_chain,
    bench_subcircuit_instances,
    bench_clock_ticks,
    bench_event_queue,
);

criterion_main!(benches);
