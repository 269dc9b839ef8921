//! Arena configuration
//!
//! Configuration can be created programmatically using [`ArenaConfig::new()`],
//! read from a JSON file with [`ArenaConfig::from_json_file()`], or taken from
//! environment variables with [`ArenaConfig::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Unset or unparsable values keep the default.
//!
//! - `ARENA_MATCH_SIZE` - participants per match, 2 or 3 (default: `3`)
//! - `ARENA_ROUNDS` - rounds per match (default: `30`)
//! - `ARENA_PROGRESS_EVERY` - rounds between progress events (default: `1` for
//!   three-player matches, `5` for two-player matches)
//! - `ARENA_DEADLINE_MS` - wall-clock budget per strategy call (default: `5`)
//! - `ARENA_FUEL` - evaluation steps per strategy call (default: `100000`)
//! - `ARENA_ROUND_DELAY_MS` - pause after each progress event (default: `0`)
//! - `ARENA_LOG` - fallback log level when `RUST_LOG` is unset (default: `info`)

use std::path::Path;
use std::time::Duration;

use match_logic::{
    MatchConfig, PayoffTable, SandboxLimits, DEFAULT_DEADLINE, DEFAULT_FUEL, MAX_MATCH_SIZE,
    MIN_MATCH_SIZE,
};
use serde::{Deserialize, Serialize};

use crate::error::{require, ArenaError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub match_size: usize,
    pub rounds_per_match: u32,
    /// `None` picks the reference cadence for the match size.
    pub progress_every: Option<u32>,
    pub strategy_deadline_ms: u64,
    pub strategy_fuel: u64,
    pub round_delay_ms: u64,
    pub match_start_delay_ms: u64,
    pub match_end_delay_ms: u64,
    pub pause_poll_ms: u64,
    pub event_capacity: usize,
    pub log_level: String,
    /// `None` uses the reference table for the match size.
    pub payoff: Option<PayoffTable>,
}

impl ArenaConfig {
    /// Three-player matches of 30 rounds, reference payoffs, no observer
    /// pacing.
    pub fn new() -> Self {
        Self {
            match_size: 3,
            rounds_per_match: 30,
            progress_every: None,
            strategy_deadline_ms: DEFAULT_DEADLINE.as_millis() as u64,
            strategy_fuel: DEFAULT_FUEL,
            round_delay_ms: 0,
            match_start_delay_ms: 0,
            match_end_delay_ms: 0,
            pause_poll_ms: 500,
            event_capacity: 1024,
            log_level: "info".to_string(),
            payoff: None,
        }
    }

    /// Defaults overridden by `ARENA_*` environment variables.
    pub fn from_env() -> Self {
        fn get_env<T: std::str::FromStr>(var: &str) -> Option<T> {
            std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
        }

        let mut config = Self::new();
        if let Some(v) = get_env("ARENA_MATCH_SIZE") {
            config.match_size = v;
        }
        if let Some(v) = get_env("ARENA_ROUNDS") {
            config.rounds_per_match = v;
        }
        if let Some(v) = get_env("ARENA_PROGRESS_EVERY") {
            config.progress_every = Some(v);
        }
        if let Some(v) = get_env("ARENA_DEADLINE_MS") {
            config.strategy_deadline_ms = v;
        }
        if let Some(v) = get_env("ARENA_FUEL") {
            config.strategy_fuel = v;
        }
        if let Some(v) = get_env("ARENA_ROUND_DELAY_MS") {
            config.round_delay_ms = v;
        }
        if let Some(v) = get_env::<String>("ARENA_LOG") {
            config.log_level = v;
        }
        config
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ArenaError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ArenaError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_match_size(mut self, value: usize) -> Self {
        self.match_size = value;
        self
    }

    pub fn with_rounds(mut self, value: u32) -> Self {
        self.rounds_per_match = value;
        self
    }

    pub fn with_progress_every(mut self, value: u32) -> Self {
        self.progress_every = Some(value);
        self
    }

    pub fn with_strategy_deadline(mut self, value: Duration) -> Self {
        self.strategy_deadline_ms = value.as_millis() as u64;
        self
    }

    pub fn with_strategy_fuel(mut self, value: u64) -> Self {
        self.strategy_fuel = value;
        self
    }

    /// Observer pacing: delay after each progress event, after each
    /// match_started and after each match_completed.
    pub fn with_delays(mut self, round: Duration, match_start: Duration, match_end: Duration) -> Self {
        self.round_delay_ms = round.as_millis() as u64;
        self.match_start_delay_ms = match_start.as_millis() as u64;
        self.match_end_delay_ms = match_end.as_millis() as u64;
        self
    }

    pub fn with_pause_poll(mut self, value: Duration) -> Self {
        self.pause_poll_ms = value.as_millis() as u64;
        self
    }

    pub fn with_event_capacity(mut self, value: usize) -> Self {
        self.event_capacity = value;
        self
    }

    pub fn with_log_level(mut self, value: impl Into<String>) -> Self {
        self.log_level = value.into();
        self
    }

    pub fn with_payoff(mut self, value: PayoffTable) -> Self {
        self.payoff = Some(value);
        self
    }

    pub fn validate(&self) -> Result<()> {
        require!(
            (MIN_MATCH_SIZE..=MAX_MATCH_SIZE).contains(&self.match_size),
            ArenaError::Config(format!(
                "match_size must be between {} and {}, got {}",
                MIN_MATCH_SIZE, MAX_MATCH_SIZE, self.match_size
            ))
        );
        require!(
            self.rounds_per_match > 0,
            ArenaError::Config("rounds_per_match must be positive".into())
        );
        require!(
            self.progress_every != Some(0),
            ArenaError::Config("progress_every must be positive".into())
        );
        require!(
            self.strategy_deadline_ms > 0,
            ArenaError::Config("strategy_deadline_ms must be positive".into())
        );
        require!(
            self.strategy_fuel > 0,
            ArenaError::Config("strategy_fuel must be positive".into())
        );
        if let Some(payoff) = &self.payoff {
            payoff.check_match_size(self.match_size)?;
        }
        Ok(())
    }

    /// The configured table, or the reference table for the match size.
    pub fn payoff_table(&self) -> Result<PayoffTable> {
        match &self.payoff {
            Some(table) => Ok(table.clone()),
            None => Ok(PayoffTable::default_for(self.match_size)?),
        }
    }

    pub fn match_config(&self) -> MatchConfig {
        let mut config = MatchConfig::for_match_size(self.match_size, self.rounds_per_match);
        if let Some(every) = self.progress_every {
            config.progress_every = every;
        }
        config
    }

    pub fn sandbox_limits(&self) -> SandboxLimits {
        SandboxLimits {
            deadline: Duration::from_millis(self.strategy_deadline_ms),
            fuel: self.strategy_fuel,
            ..SandboxLimits::default()
        }
    }

    pub fn round_delay(&self) -> Duration {
        Duration::from_millis(self.round_delay_ms)
    }

    pub fn match_start_delay(&self) -> Duration {
        Duration::from_millis(self.match_start_delay_ms)
    }

    pub fn match_end_delay(&self) -> Duration {
        Duration::from_millis(self.match_end_delay_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ArenaConfig::default();
        config.validate().unwrap();
        assert_eq!(config.match_config(), MatchConfig { rounds: 30, progress_every: 1 });
        assert_eq!(config.payoff_table().unwrap(), PayoffTable::three_player());
        assert_eq!(config.sandbox_limits().deadline, Duration::from_millis(5));
    }

    #[test]
    fn test_two_player_cadence() {
        let config = ArenaConfig::new().with_match_size(2).with_rounds(100);
        assert_eq!(config.match_config().progress_every, 5);
        assert_eq!(config.with_progress_every(10).match_config().progress_every, 10);
    }

    #[test]
    fn test_validate_rejects() {
        for config in [
            ArenaConfig::new().with_match_size(1),
            ArenaConfig::new().with_match_size(4),
            ArenaConfig::new().with_rounds(0),
            ArenaConfig::new().with_progress_every(0),
            ArenaConfig::new().with_strategy_deadline(Duration::ZERO),
            ArenaConfig::new().with_strategy_fuel(0),
        ] {
            assert!(matches!(config.validate(), Err(ArenaError::Config(_))), "{:?}", config);
        }
    }

    #[test]
    fn test_validate_rejects_mismatched_payoff() {
        let config = ArenaConfig::new().with_payoff(PayoffTable::two_player());
        assert!(matches!(config.validate(), Err(ArenaError::InvalidPayoff(_))));
    }

    #[test]
    fn test_partial_json() {
        let config: ArenaConfig =
            serde_json::from_str(r#"{ "match_size": 2, "rounds_per_match": 100 }"#).unwrap();
        assert_eq!(config.match_size, 2);
        assert_eq!(config.pause_poll_ms, 500);
        assert_eq!(config.payoff_table().unwrap(), PayoffTable::two_player());
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("arena-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "match_size": 2, "round_delay_ms": 10 }"#).unwrap();
        let config = ArenaConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.round_delay(), Duration::from_millis(10));

        assert!(matches!(
            ArenaConfig::from_json_file("/nonexistent/arena.json"),
            Err(ArenaError::Config(_))
        ));
    }
}
