//! AlgoWar Arena - tournament lifecycle around the match engine
//!
//! [`Arena`] owns all tournament state for the life of the process: the
//! roster, the tournament state machine, the match-results log, the
//! leaderboard and the payoff table. Commands mutate it synchronously and
//! return typed errors; a started run is a spawned tokio task that plays the
//! schedule and reports through [`ArenaEvent`]s.
//!
//! Queries never see live mutable state: each one takes a short read lock and
//! returns a cloned snapshot, so they are safe to issue while a run is in
//! progress.

use std::sync::Arc;

use match_logic::{sample_strategies, ParticipantId, PayoffTable, PayoffUpdate, Sandbox, SampleStrategy};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

pub mod config;
pub mod error;
pub mod events;
mod instructions;
pub mod leaderboard;
pub mod logging;
pub mod registry;
pub mod state;

pub use config::ArenaConfig;
pub use error::{ArenaError, Result};
pub use events::{ArenaEvent, BroadcastSink, EventSink};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use registry::{Participant, ParticipantStats, Registry};
pub use state::{CurrentMatch, MatchRecord, MatchSeat, RunKind, TournamentState, TournamentStatus};

/// Everything guarded by the arena lock.
#[derive(Debug)]
pub(crate) struct Shared {
    pub registry: Registry,
    pub state: TournamentState,
    pub results: Vec<MatchRecord>,
    pub leaderboard: Leaderboard,
    pub payoff: PayoffTable,
    /// Bumped on every start, stop and reset. A run task only writes while
    /// the generation it was started with is current.
    pub generation: u64,
}

impl Shared {
    pub fn refresh_leaderboard(&mut self) {
        self.leaderboard = Leaderboard::compute(&self.registry);
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            tournament: self.state.clone(),
            participant_count: self.registry.len(),
            leaderboard: self.leaderboard.clone(),
        }
    }
}

pub(crate) struct ArenaInner {
    pub config: ArenaConfig,
    pub sandbox: Sandbox,
    pub shared: RwLock<Shared>,
    pub status_tx: watch::Sender<TournamentStatus>,
    pub task: Mutex<Option<JoinHandle<()>>>,
    events: BroadcastSink,
    tap: Option<Arc<dyn EventSink>>,
}

impl ArenaInner {
    pub fn publish(&self, event: ArenaEvent) {
        if let Some(tap) = &self.tap {
            tap.publish(event.clone());
        }
        self.events.publish(event);
    }

    /// Set the status and wake anything waiting on it. Caller holds the
    /// write lock.
    pub fn set_status(&self, shared: &mut Shared, status: TournamentStatus) {
        shared.state.status = status;
        self.status_tx.send_replace(status);
    }

    pub fn abort_task(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

/// What a newly connected observer needs to render the arena.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub tournament: TournamentState,
    pub participant_count: usize,
    pub leaderboard: Leaderboard,
}

/// Handle to one arena. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Arena {
    inner: Arc<ArenaInner>,
}

impl Arena {
    pub fn new(config: ArenaConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Like [`Arena::new`], additionally publishing every event to `sink`.
    pub fn with_sink(config: ArenaConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        Self::build(config, Some(sink))
    }

    fn build(config: ArenaConfig, tap: Option<Arc<dyn EventSink>>) -> Result<Self> {
        config.validate()?;
        let payoff = config.payoff_table()?;
        let sandbox = Sandbox::new(config.sandbox_limits());
        let (status_tx, _) = watch::channel(TournamentStatus::Idle);
        let events = BroadcastSink::new(config.event_capacity);

        Ok(Self {
            inner: Arc::new(ArenaInner {
                config,
                sandbox,
                shared: RwLock::new(Shared {
                    registry: Registry::new(),
                    state: TournamentState::default(),
                    results: Vec::new(),
                    leaderboard: Leaderboard::default(),
                    payoff,
                    generation: 0,
                }),
                status_tx,
                task: Mutex::new(None),
                events,
                tap,
            }),
        })
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.inner.config
    }

    // Roster

    /// Register a participant after validating its strategy.
    pub fn register(&self, name: &str, strategy: &str) -> Result<ParticipantId> {
        instructions::player::register(&self.inner, name, strategy)
    }

    pub fn rename(&self, id: ParticipantId, name: &str) -> Result<()> {
        instructions::player::rename(&self.inner, id, name)
    }

    pub fn update_strategy(&self, id: ParticipantId, strategy: &str) -> Result<()> {
        instructions::player::update_strategy(&self.inner, id, strategy)
    }

    pub fn remove(&self, id: ParticipantId) -> Result<Participant> {
        instructions::player::remove(&self.inner, id)
    }

    /// Check a strategy without registering it.
    pub fn validate_strategy(&self, strategy: &str) -> Result<()> {
        instructions::player::validate_strategy(&self.inner, strategy)
    }

    // Tournament lifecycle

    /// Start a round-robin over the whole roster. Returns the number of
    /// scheduled matches.
    pub fn start(&self) -> Result<usize> {
        instructions::tournament::start(&self.inner)
    }

    /// Start a round-robin restricted to `ids`, in the order given.
    pub fn start_showdown(&self, ids: &[ParticipantId]) -> Result<usize> {
        instructions::tournament::start_showdown(&self.inner, ids)
    }

    pub fn pause(&self) -> Result<()> {
        instructions::tournament::pause(&self.inner)
    }

    pub fn resume(&self) -> Result<()> {
        instructions::tournament::resume(&self.inner)
    }

    /// Cancel the active run. Results so far are kept.
    pub fn stop(&self) -> Result<()> {
        instructions::tournament::stop(&self.inner)
    }

    /// Cancel any run and clear all stats and results.
    pub fn reset(&self) {
        instructions::admin::reset(&self.inner)
    }

    // Payoff table

    pub fn set_payoff_table(&self, table: PayoffTable) -> Result<PayoffTable> {
        instructions::admin::set_payoff_table(&self.inner, table)
    }

    /// Three-player field update (`c_2coop` ... `d_0coop`).
    pub fn update_payoff(&self, update: PayoffUpdate) -> Result<PayoffTable> {
        instructions::admin::set_payoff_table(&self.inner, update.into())
    }

    pub fn payoff_table(&self) -> PayoffTable {
        self.inner.shared.read().payoff.clone()
    }

    // Queries

    pub fn status(&self) -> StatusSnapshot {
        self.inner.shared.read().snapshot()
    }

    pub fn tournament_state(&self) -> TournamentState {
        self.inner.shared.read().state.clone()
    }

    pub fn leaderboard(&self) -> Leaderboard {
        self.inner.shared.read().leaderboard.clone()
    }

    pub fn match_results(&self) -> Vec<MatchRecord> {
        self.inner.shared.read().results.clone()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.inner.shared.read().registry.iter().cloned().collect()
    }

    pub fn participant(&self, id: ParticipantId) -> Option<Participant> {
        self.inner.shared.read().registry.get(id).cloned()
    }

    /// Ids of the current top `k`, for feeding [`Arena::start_showdown`].
    pub fn top_participants(&self, k: usize) -> Vec<ParticipantId> {
        self.inner.shared.read().leaderboard.top(k)
    }

    pub fn sample_strategies(&self) -> Vec<SampleStrategy> {
        sample_strategies(self.inner.config.match_size)
    }

    /// Current snapshot plus a receiver for every later event.
    pub fn subscribe(&self) -> (StatusSnapshot, broadcast::Receiver<ArenaEvent>) {
        // Subscribe under the lock so no change between the two is missed
        let shared = self.inner.shared.read();
        let rx = self.inner.events.subscribe();
        (shared.snapshot(), rx)
    }

    /// Watch status transitions only.
    pub fn watch_status(&self) -> watch::Receiver<TournamentStatus> {
        self.inner.status_tx.subscribe()
    }
}
