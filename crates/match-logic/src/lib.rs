//! Match Logic for AlgoWar
//!
//! Core game logic for the N-player iterated Prisoner's Dilemma tournament.
//! Everything in this crate is synchronous and deterministic: given the same
//! strategy sources and payoff table, a match always produces the same result.
//!
//! - [`Sandbox`] evaluates participant-supplied strategy snippets under a step
//!   budget and a wall-clock deadline. Every failure becomes [`Move::Defect`].
//! - [`PayoffTable`] scores a move by the number of *other* participants who
//!   cooperated in the same round.
//! - [`Match`] / [`run_match`] play one fixed-length match among 2 or more
//!   participants.
//! - [`generate_all_groups`] enumerates the round-robin schedule.

mod game;
mod pairing;
mod payoff;
mod sandbox;
mod strategy;

pub use game::{
    cooperation_pct, run_match, Contestant, Match, MatchConfig, MatchError, MatchProgress, MatchResult,
    ParticipantTally, ProgressEntry, RoundResult,
};
pub use pairing::{calculate_match_count, generate_all_groups};
pub use payoff::{PayoffError, PayoffTable, PayoffUpdate, MAX_MATCH_SIZE, MAX_PAYOFF, MIN_MATCH_SIZE};
pub use sandbox::{
    Program, Sandbox, SandboxLimits, StrategyFault, DEFAULT_DEADLINE, DEFAULT_FUEL,
    MAX_SOURCE_LEN,
};
pub use strategy::{sample_strategies, Move, ParticipantId, SampleStrategy};
