//! Step and wall-clock accounting for one strategy call.
//!
//! Shared by the interpreter and by every primitive that walks a nested
//! value, so comparing or rendering a large structure is charged like any
//! other work.

use std::time::{Duration, Instant};

use super::{SandboxLimits, StrategyFault};

/// Steps between wall-clock checks.
const DEADLINE_CHECK_INTERVAL: u64 = 32;

#[derive(Debug)]
pub(super) struct Budget {
    fuel: u64,
    steps: u64,
    deadline: Instant,
    allowed: Duration,
    max_len: usize,
}

impl Budget {
    pub fn new(limits: &SandboxLimits, deadline: Instant) -> Self {
        Self {
            fuel: limits.fuel,
            steps: 0,
            deadline,
            allowed: limits.deadline,
            max_len: limits.max_collection_len,
        }
    }

    /// Charge `cost` steps. Bulk charges always sample the clock.
    pub fn burn(&mut self, cost: u64) -> Result<(), StrategyFault> {
        self.steps = self.steps.saturating_add(cost);
        if self.steps > self.fuel {
            return Err(StrategyFault::FuelExhausted(self.fuel));
        }
        if (cost > 1 || self.steps % DEADLINE_CHECK_INTERVAL == 0) && Instant::now() >= self.deadline {
            return Err(StrategyFault::DeadlineExceeded(self.allowed));
        }
        Ok(())
    }

    /// Largest list or string a strategy may build.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn cap(&self, len: usize) -> Result<(), StrategyFault> {
        if len > self.max_len {
            return Err(StrategyFault::Runtime(format!(
                "collection of {} items exceeds the limit of {}",
                len, self.max_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuel_runs_out() {
        let limits = SandboxLimits {
            fuel: 10,
            deadline: Duration::from_secs(10),
            ..SandboxLimits::default()
        };
        let mut budget = Budget::new(&limits, Instant::now() + limits.deadline);
        assert!(budget.burn(4).is_ok());
        assert!(budget.burn(6).is_ok());
        assert_eq!(budget.burn(1), Err(StrategyFault::FuelExhausted(10)));
    }

    #[test]
    fn test_bulk_charge_checks_the_clock() {
        let limits = SandboxLimits::default();
        let mut budget = Budget::new(&limits, Instant::now());
        assert_eq!(budget.burn(2), Err(StrategyFault::DeadlineExceeded(limits.deadline)));
    }
}
