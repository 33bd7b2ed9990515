//! Tick-driven clock source.

use std::any::Any;

use crate::component::{Component, PortDesc, PropagateContext};
use crate::error::SimResult;
use crate::value::Value;

/// Private data of a clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockState {
    /// Current output level
    pub high: bool,
    /// Last tick number applied
    pub tick: u64,
}

/// A one-bit clock.
///
/// The clock starts low. On tick `n` it is high when
/// `n % (high + low) >= low`, so the default 1/1 clock flips on every tick.
#[derive(Debug, Clone)]
pub struct Clock {
    high_ticks: u64,
    low_ticks: u64,
    ports: Vec<PortDesc>,
    config_error: Option<String>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Clock {
    /// A clock that stays high for `high` ticks and low for `low` ticks.
    pub fn new(high: u64, low: u64) -> Self {
        let config_error = if high == 0 || low == 0 {
            Some(format!("clock durations must be positive (high {high}, low {low})"))
        } else if high.checked_add(low).is_none() {
            Some(format!("clock period overflows (high {high}, low {low})"))
        } else {
            None
        };
        Self {
            high_ticks: high,
            low_ticks: low,
            ports: vec![PortDesc::output("out", 0, 0, 1)],
            config_error,
        }
    }

    pub fn high_ticks(&self) -> u64 {
        self.high_ticks
    }

    pub fn low_ticks(&self) -> u64 {
        self.low_ticks
    }

    /// Level of the clock at tick `tick`.
    pub fn level_at(&self, tick: u64) -> bool {
        match self.high_ticks.checked_add(self.low_ticks) {
            Some(period) if period > 0 => tick % period >= self.low_ticks,
            _ => false,
        }
    }
}

impl Component for Clock {
    fn name(&self) -> &str {
        "Clock"
    }

    fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn propagate(&self, ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        let high = ctx.data::<ClockState>().high;
        ctx.set_output(0, Value::from(high), 0)
    }

    fn clock_tick(&self, ctx: &mut PropagateContext<'_>, tick: u64) -> SimResult<bool> {
        let level = self.level_at(tick);
        let state = ctx.data::<ClockState>();
        state.tick = tick;
        if state.high == level {
            return Ok(false);
        }
        state.high = level;
        ctx.set_output(0, Value::from(level), 0)?;
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentData;

    #[test]
    fn test_default_clock_flips_every_tick() {
        let clock = Clock::default();
        let levels: Vec<_> = (1..=4).map(|t| clock.level_at(t)).collect();
        assert_eq!(levels, vec![true, false, true, false]);
    }

    #[test]
    fn test_duty_cycle() {
        let clock = Clock::new(2, 1);
        let levels: Vec<_> = (1..=6).map(|t| clock.level_at(t)).collect();
        assert_eq!(levels, vec![true, true, false, true, true, false]);
        assert!(Clock::new(0, 1).config_error().is_some());
    }

    #[test]
    fn test_overflowing_period_is_misconfigured() {
        let clock = Clock::new(u64::MAX, u64::MAX);
        assert!(clock.config_error().is_some());
        assert!(!clock.level_at(u64::MAX));
        assert!(Clock::new(u64::MAX - 1, 1).config_error().is_none());
    }

    #[test]
    fn test_clock_tick_schedules_only_on_change() {
        let clock = Clock::new(2, 1);
        let mut data: Option<ComponentData> = None;
        let mut diags = Vec::new();
        let inputs = [Value::UNKNOWN];

        let mut changes = Vec::new();
        for tick in 1..=3 {
            let mut ctx = PropagateContext::new(1, &[], 0, clock.ports(), &inputs, &mut data, &mut diags);
            changes.push(clock.clock_tick(&mut ctx, tick).unwrap());
            assert_eq!(ctx.into_writes().len(), usize::from(changes[changes.len() - 1]));
        }
        assert_eq!(changes, vec![true, false, true]);
    }
}
