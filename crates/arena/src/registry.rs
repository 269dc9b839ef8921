//! Participant roster
//!
//! Owns identity, names, stored strategy source and cumulative stats. Order of
//! registration is preserved and drives both the schedule and leaderboard
//! tie-breaking.

use std::sync::Arc;

use match_logic::{cooperation_pct, Contestant, MatchResult, ParticipantId, ParticipantTally};
use serde::{Deserialize, Serialize};

use crate::error::{require, ArenaError, Result};

/// Cumulative results across the current run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParticipantStats {
    pub total_score: i64,
    pub cooperations: u64,
    pub defections: u64,
    pub matches_played: u64,
}

impl ParticipantStats {
    /// Stats with one more match added. `None` on overflow.
    fn plus(&self, tally: &ParticipantTally) -> Option<Self> {
        Some(Self {
            total_score: self.total_score.checked_add(tally.score)?,
            cooperations: self.cooperations.checked_add(u64::from(tally.cooperations))?,
            defections: self.defections.checked_add(u64::from(tally.defections))?,
            matches_played: self.matches_played.checked_add(1)?,
        })
    }

    pub fn cooperation_pct(&self) -> f64 {
        cooperation_pct(self.cooperations, self.defections)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub strategy: String,
    pub stats: ParticipantStats,
}

impl Participant {
    pub fn contestant(&self) -> Contestant {
        Contestant {
            id: self.id,
            name: self.name.clone(),
            source: Arc::from(self.strategy.as_str()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    participants: Vec<Participant>,
    next_id: u64,
}

fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    require!(!name.is_empty(), ArenaError::EmptyName);
    Ok(name.to_string())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participants in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id).collect()
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: ParticipantId) -> Result<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ArenaError::UnknownParticipant(id))
    }

    fn name_taken(&self, name: &str, except: Option<ParticipantId>) -> bool {
        self.participants
            .iter()
            .any(|p| Some(p.id) != except && p.name.to_lowercase() == name.to_lowercase())
    }

    /// Add a participant. The strategy must already have been validated.
    pub fn register(&mut self, name: &str, strategy: &str) -> Result<ParticipantId> {
        let name = normalize_name(name)?;
        require!(!self.name_taken(&name, None), ArenaError::DuplicateName(name));

        self.next_id += 1;
        let id = ParticipantId(self.next_id);
        self.participants.push(Participant {
            id,
            name,
            strategy: strategy.to_string(),
            stats: ParticipantStats::default(),
        });
        Ok(id)
    }

    pub fn rename(&mut self, id: ParticipantId, name: &str) -> Result<()> {
        let name = normalize_name(name)?;
        require!(!self.name_taken(&name, Some(id)), ArenaError::DuplicateName(name));
        self.get_mut(id)?.name = name;
        Ok(())
    }

    pub fn set_strategy(&mut self, id: ParticipantId, strategy: &str) -> Result<()> {
        self.get_mut(id)?.strategy = strategy.to_string();
        Ok(())
    }

    pub fn remove(&mut self, id: ParticipantId) -> Result<Participant> {
        let index = self
            .participants
            .iter()
            .position(|p| p.id == id)
            .ok_or(ArenaError::UnknownParticipant(id))?;
        Ok(self.participants.remove(index))
    }

    /// Look up every id, in the order given.
    pub fn subset(&self, ids: &[ParticipantId]) -> Result<Vec<&Participant>> {
        ids.iter()
            .map(|&id| self.get(id).ok_or(ArenaError::UnknownParticipant(id)))
            .collect()
    }

    /// Match snapshots for the given ids, in the order given.
    pub fn contestants(&self, ids: &[ParticipantId]) -> Result<Vec<Contestant>> {
        Ok(self.subset(ids)?.into_iter().map(Participant::contestant).collect())
    }

    /// Add a finished match's totals to every participant in it.
    ///
    /// Every update is computed before anything is written, so an unknown
    /// id or an overflow leaves every participant untouched.
    pub fn apply_result(&mut self, result: &MatchResult) -> Result<()> {
        let updates = result
            .participants
            .iter()
            .map(|tally| {
                let index = self
                    .participants
                    .iter()
                    .position(|p| p.id == tally.id)
                    .ok_or(ArenaError::UnknownParticipant(tally.id))?;
                let stats = self.participants[index]
                    .stats
                    .plus(tally)
                    .ok_or(ArenaError::ScoreOverflow(tally.id))?;
                Ok((index, stats))
            })
            .collect::<Result<Vec<_>>>()?;

        for (index, stats) in updates {
            self.participants[index].stats = stats;
        }
        Ok(())
    }

    pub fn reset_stats(&mut self) {
        for p in &mut self.participants {
            p.stats = ParticipantStats::default();
        }
    }
}
