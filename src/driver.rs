//! Continuous ticking on a worker thread.
//!
//! The simulator stays single-threaded: the driver shares it behind a
//! `parking_lot::Mutex` and holds the lock for exactly one tick (clock
//! advance plus full drain) at a time. The host may lock the same mutex
//! between ticks to inject stimuli or read values. Stopping takes effect
//! between ticks, never in the middle of a drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::engine::Simulator;
use crate::error::SimError;

/// Longest single sleep, so a stop request is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Why a driver's worker thread finished.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverExit {
    /// Stopped by the host
    Stopped,
    /// A tick ended oscillating; the simulator is left for the host to reset
    Oscillated { tick: u64 },
    /// A tick failed with a contract violation
    Failed(SimError),
    /// The worker panicked
    Panicked,
}

/// Runs ticks continuously at a fixed rate.
pub struct TickDriver {
    simulator: Arc<Mutex<Simulator>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<DriverExit>>,
}

impl TickDriver {
    /// Starts ticking at the simulator's configured `tick_rate_hz`.
    pub fn start(simulator: Arc<Mutex<Simulator>>) -> Self {
        let rate = simulator.lock().config().simulation.tick_rate_hz;
        Self::start_with_rate(simulator, rate)
    }

    /// Starts ticking at `rate_hz` ticks per second. Non-positive or
    /// non-finite rates fall back to one tick per second.
    pub fn start_with_rate(simulator: Arc<Mutex<Simulator>>, rate_hz: f64) -> Self {
        let rate_hz = if rate_hz.is_finite() && rate_hz > 0.0 { rate_hz } else { 1.0 };
        let period = Duration::from_secs_f64(1.0 / rate_hz);
        let running = Arc::new(AtomicBool::new(true));

        let worker_sim = Arc::clone(&simulator);
        let worker_flag = Arc::clone(&running);
        let handle = std::thread::spawn(move || run(worker_sim, worker_flag, period));
        tracing::info!(rate_hz, "tick driver started");

        Self {
            simulator,
            running,
            handle: Some(handle),
        }
    }

    /// The shared simulator.
    pub fn simulator(&self) -> &Arc<Mutex<Simulator>> {
        &self.simulator
    }

    /// True while the worker is still ticking.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Requests a stop and waits for the current tick to finish.
    pub fn stop(mut self) -> DriverExit {
        self.shutdown()
    }

    fn shutdown(&mut self) -> DriverExit {
        self.running.store(false, Ordering::Release);
        let exit = match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(DriverExit::Panicked),
            None => DriverExit::Stopped,
        };
        tracing::info!(?exit, "tick driver stopped");
        exit
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for TickDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickDriver")
            .field("running", &self.is_running())
            .finish()
    }
}

fn run(simulator: Arc<Mutex<Simulator>>, running: Arc<AtomicBool>, period: Duration) -> DriverExit {
    let mut next = Instant::now();
    loop {
        if !running.load(Ordering::Acquire) {
            return DriverExit::Stopped;
        }

        let outcome = {
            let mut sim = simulator.lock();
            sim.tick().map(|report| (report.is_settled(), sim.ticks()))
        };
        match outcome {
            Ok((true, _)) => {}
            Ok((false, tick)) => {
                running.store(false, Ordering::Release);
                tracing::warn!(tick, "tick driver halted: circuit oscillating");
                return DriverExit::Oscillated { tick };
            }
            Err(err) => {
                running.store(false, Ordering::Release);
                tracing::error!(error = %err, "tick driver halted");
                return DriverExit::Failed(err);
            }
        }

        next += period;
        loop {
            let now = Instant::now();
            if now >= next || !running.load(Ordering::Acquire) {
                break;
            }
            std::thread::sleep((next - now).min(POLL_INTERVAL));
        }
    }
}
