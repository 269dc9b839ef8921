//! Tournament state definitions

use core::fmt;

use match_logic::{MatchResult, ParticipantId};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Tournament state machine
///
/// `Idle -> Running <-> Paused -> Finished`, with reset back to `Idle` from
/// anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::Idle => "idle",
            TournamentStatus::Running => "running",
            TournamentStatus::Paused => "paused",
            TournamentStatus::Finished => "finished",
        }
    }

    /// Running or paused: a run task exists and owns the schedule.
    pub fn is_active(self) -> bool {
        matches!(self, TournamentStatus::Running | TournamentStatus::Paused)
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which schedule a run is working through
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Every group of the whole roster
    RoundRobin,
    /// Every group of a fixed subset
    Showdown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSeat {
    pub id: ParticipantId,
    pub name: String,
}

/// Descriptor of the match currently being played
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentMatch {
    /// 1-based position in the schedule
    pub match_number: usize,
    pub participants: Vec<MatchSeat>,
}

/// The single tournament instance
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TournamentState {
    pub status: TournamentStatus,
    pub kind: Option<RunKind>,
    pub current_match: Option<CurrentMatch>,
    pub completed_matches: usize,
    pub total_matches: usize,
    /// 0-based index of the match being played or next to play
    pub current_match_index: usize,
}

impl TournamentState {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Fresh state for a run that has just been scheduled.
    pub(crate) fn started(kind: RunKind, total_matches: usize) -> Self {
        Self {
            status: TournamentStatus::Running,
            kind: Some(kind),
            total_matches,
            ..Self::default()
        }
    }
}

/// One entry in the match-results log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// 1-based, in completion order across the log
    pub id: u64,
    /// RFC 3339, UTC
    pub completed_at: String,
    #[serde(flatten)]
    pub result: MatchResult,
}

impl MatchRecord {
    pub(crate) fn new(id: u64, result: MatchResult) -> Self {
        let now = OffsetDateTime::now_utc();
        let completed_at = now
            .format(&Rfc3339)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        Self {
            id,
            completed_at,
            result,
        }
    }
}
