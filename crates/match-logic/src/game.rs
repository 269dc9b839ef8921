//! Match execution engine
//!
//! One match is a fixed number of rounds among a fixed group of contestants.
//! Every round each contestant's strategy sees the other contestants'
//! histories (in match order, skipping itself) followed by its own, and the
//! round is scored by the payoff table from each move and the number of other
//! cooperators.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::payoff::{PayoffError, PayoffTable};
use crate::sandbox::{Program, Sandbox};
use crate::strategy::{Move, ParticipantId};

/// Reference progress cadence for two-player matches.
const TWO_PLAYER_PROGRESS_EVERY: u32 = 5;

/// A participant as seen by one match: identity plus a snapshot of its source.
#[derive(Clone, Debug)]
pub struct Contestant {
    pub id: ParticipantId,
    pub name: String,
    pub source: Arc<str>,
}

/// Length of a match and how often it reports progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub rounds: u32,
    /// Rounds between progress reports. The final round always reports.
    pub progress_every: u32,
}

impl MatchConfig {
    /// Reference cadence: every round for 3+ players, every 5th for 2.
    pub fn for_match_size(match_size: usize, rounds: u32) -> Self {
        let progress_every = if match_size == 2 {
            TWO_PLAYER_PROGRESS_EVERY
        } else {
            1
        };
        Self {
            rounds,
            progress_every,
        }
    }
}

/// Result of a single round, in match order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// 1-based
    pub round: u32,
    pub moves: Vec<Move>,
    pub scores: Vec<i64>,
    pub cumulative: Vec<i64>,
}

/// Per-contestant totals for one match
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticipantTally {
    pub id: ParticipantId,
    pub name: String,
    pub score: i64,
    pub cooperations: u32,
    pub defections: u32,
    pub cooperation_pct: f64,
}

/// Result of a complete match
///
/// Carries no timestamps, so identical inputs serialize identically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub participants: Vec<ParticipantTally>,
    pub rounds: Vec<RoundResult>,
    pub round_count: u32,
}

/// Running state of one contestant, for progress reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: ParticipantId,
    pub name: String,
    pub score: i64,
    pub last_move: Move,
    pub cooperation_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchProgress {
    pub round: u32,
    pub total_rounds: u32,
    pub participants: Vec<ProgressEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("a match needs at least 2 contestants, got {0}")]
    TooFewContestants(usize),
    #[error("contestant {0} appears twice in the match")]
    DuplicateContestant(ParticipantId),
    #[error(transparent)]
    Payoff(#[from] PayoffError),
    #[error("score of contestant {0} overflowed")]
    ScoreOverflow(ParticipantId),
}

/// Cooperation share in percent, rounded to one decimal. Zero when no moves
/// were made.
pub fn cooperation_pct(cooperations: u64, defections: u64) -> f64 {
    let total = cooperations + defections;
    if total == 0 {
        return 0.0;
    }
    let pct = cooperations as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// A match in progress, advanced one round at a time.
///
/// Owns everything it needs so it can be moved onto a worker thread between
/// rounds.
#[derive(Debug)]
pub struct Match {
    contestants: Vec<Contestant>,
    programs: Vec<Option<Arc<Program>>>,
    faulted: Vec<bool>,
    payoff: PayoffTable,
    sandbox: Sandbox,
    config: MatchConfig,
    histories: Vec<Vec<Move>>,
    totals: Vec<i64>,
    cooperations: Vec<u32>,
    rounds: Vec<RoundResult>,
}

impl Match {
    pub fn new(
        contestants: Vec<Contestant>,
        payoff: PayoffTable,
        sandbox: Sandbox,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        let n = contestants.len();
        if n < 2 {
            return Err(MatchError::TooFewContestants(n));
        }
        payoff.check_match_size(n)?;
        for (i, c) in contestants.iter().enumerate() {
            if contestants[..i].iter().any(|other| other.id == c.id) {
                return Err(MatchError::DuplicateContestant(c.id));
            }
        }

        // A strategy that fails to compile defects every round
        let mut faulted = vec![false; n];
        let programs = contestants
            .iter()
            .zip(faulted.iter_mut())
            .map(|(c, flag)| match sandbox.compile(&c.source) {
                Ok(program) => Some(program),
                Err(fault) => {
                    warn!(participant = %c.id, name = %c.name, %fault, "strategy rejected, defecting every round");
                    *flag = true;
                    None
                }
            })
            .collect();

        Ok(Self {
            contestants,
            programs,
            faulted,
            payoff,
            sandbox,
            config,
            histories: vec![Vec::with_capacity(config.rounds as usize); n],
            totals: vec![0; n],
            cooperations: vec![0; n],
            rounds: Vec::with_capacity(config.rounds as usize),
        })
    }

    pub fn contestants(&self) -> &[Contestant] {
        &self.contestants
    }

    pub fn total_rounds(&self) -> u32 {
        self.config.rounds
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn is_finished(&self) -> bool {
        self.rounds_played() >= self.config.rounds
    }

    fn decide(&mut self, i: usize) -> Move {
        let Some(program) = &self.programs[i] else {
            return Move::Defect;
        };
        let opponents: Vec<&[Move]> = self
            .histories
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, h)| h.as_slice())
            .collect();

        match self.sandbox.try_call(program, &opponents, &self.histories[i]) {
            Ok(m) => m,
            Err(fault) => {
                let c = &self.contestants[i];
                if self.faulted[i] {
                    debug!(participant = %c.id, %fault, "strategy fault, defecting");
                } else {
                    warn!(participant = %c.id, name = %c.name, %fault, "strategy fault, defecting");
                    self.faulted[i] = true;
                }
                Move::Defect
            }
        }
    }

    /// Play the next round. `None` once every round has been played.
    ///
    /// A score overflow leaves the match as it was before the round.
    pub fn play_round(&mut self) -> Result<Option<&RoundResult>, MatchError> {
        if self.is_finished() {
            return Ok(None);
        }

        // Decide on the pre-round histories, then reveal simultaneously
        let moves: Vec<Move> = (0..self.contestants.len()).map(|i| self.decide(i)).collect();
        let scores = self.payoff.score_round(&moves);

        let totals = self
            .totals
            .iter()
            .zip(&scores)
            .zip(&self.contestants)
            .map(|((&total, &s), c)| total.checked_add(s).ok_or(MatchError::ScoreOverflow(c.id)))
            .collect::<Result<Vec<_>, _>>()?;
        self.totals = totals;

        for (i, &m) in moves.iter().enumerate() {
            self.histories[i].push(m);
            if m.is_cooperate() {
                self.cooperations[i] += 1;
            }
        }

        let round = self.rounds_played() + 1;
        self.rounds.push(RoundResult {
            round,
            moves,
            scores,
            cumulative: self.totals.clone(),
        });
        Ok(self.rounds.last())
    }

    /// Play rounds until the next progress report is due or the match ends.
    pub fn play_until_report(&mut self) -> Result<Option<MatchProgress>, MatchError> {
        while self.play_round()?.is_some() {
            if self.should_report() {
                return Ok(Some(self.progress()));
            }
        }
        Ok(None)
    }

    /// Whether the round just played is on the progress cadence.
    pub fn should_report(&self) -> bool {
        let played = self.rounds_played();
        played > 0 && (played % self.config.progress_every.max(1) == 0 || self.is_finished())
    }

    pub fn progress(&self) -> MatchProgress {
        let played = self.rounds_played();
        let participants = self
            .contestants
            .iter()
            .enumerate()
            .map(|(i, c)| ProgressEntry {
                id: c.id,
                name: c.name.clone(),
                score: self.totals[i],
                last_move: self.histories[i].last().copied().unwrap_or(Move::Cooperate),
                cooperation_pct: cooperation_pct(
                    u64::from(self.cooperations[i]),
                    u64::from(played - self.cooperations[i]),
                ),
            })
            .collect();
        MatchProgress {
            round: played,
            total_rounds: self.config.rounds,
            participants,
        }
    }

    pub fn finish(self) -> MatchResult {
        let round_count = self.rounds_played();
        let participants = self
            .contestants
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let cooperations = self.cooperations[i];
                let defections = round_count - cooperations;
                ParticipantTally {
                    id: c.id,
                    name: c.name,
                    score: self.totals[i],
                    cooperations,
                    defections,
                    cooperation_pct: cooperation_pct(u64::from(cooperations), u64::from(defections)),
                }
            })
            .collect();
        MatchResult {
            participants,
            rounds: self.rounds,
            round_count,
        }
    }
}

/// Run a complete match, calling `on_progress` on the progress cadence.
pub fn run_match(
    contestants: Vec<Contestant>,
    payoff: &PayoffTable,
    sandbox: &Sandbox,
    config: MatchConfig,
    mut on_progress: impl FnMut(&MatchProgress),
) -> Result<MatchResult, MatchError> {
    let mut game = Match::new(contestants, payoff.clone(), sandbox.clone(), config)?;
    while let Some(progress) = game.play_until_report()? {
        on_progress(&progress);
    }
    Ok(game.finish())
}
