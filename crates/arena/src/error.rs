//! Error types for arena commands

use match_logic::{MatchError, ParticipantId, PayoffError, StrategyFault};
use thiserror::Error;

use crate::state::TournamentStatus;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ArenaError {
    #[error("need at least {required} participants, found {found}")]
    InsufficientParticipants { required: usize, found: usize },

    #[error("a tournament is already running")]
    AlreadyRunning,

    #[error("cannot {action} while the tournament is {from}")]
    InvalidTransition {
        from: TournamentStatus,
        action: &'static str,
    },

    #[error("cannot {0} while a tournament is in progress")]
    RunActive(&'static str),

    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error("participant name {0:?} is already taken")]
    DuplicateName(String),

    #[error("participant name must not be empty")]
    EmptyName,

    #[error("invalid strategy: {0}")]
    InvalidStrategy(#[from] StrategyFault),

    #[error("invalid payoff table: {0}")]
    InvalidPayoff(#[from] PayoffError),

    #[error("invalid showdown: {0}")]
    InvalidShowdown(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("match could not be played: {0}")]
    Match(#[from] MatchError),

    #[error("cumulative score of participant {0} overflowed")]
    ScoreOverflow(ParticipantId),

    #[error("run aborted: {0}")]
    Internal(String),
}

pub type Result<T, E = ArenaError> = std::result::Result<T, E>;

/// Return early with `$err` unless `$cond` holds.
macro_rules! require {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}

pub(crate) use require;
