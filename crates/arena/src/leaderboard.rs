//! Ranked view of the roster, rebuilt from scratch after every match.

use match_logic::ParticipantId;
use serde::{Deserialize, Serialize};

use crate::registry::Registry;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based
    pub rank: usize,
    pub id: ParticipantId,
    pub name: String,
    pub total_score: i64,
    pub cooperation_pct: f64,
    pub matches_played: u64,
    pub cooperations: u64,
    pub defections: u64,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Rank every participant by total score, highest first.
    ///
    /// Equal scores keep registration order.
    pub fn compute(registry: &Registry) -> Self {
        let mut participants: Vec<_> = registry.iter().collect();
        // sort_by is stable
        participants.sort_by(|a, b| b.stats.total_score.cmp(&a.stats.total_score));

        let entries = participants
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i + 1,
                id: p.id,
                name: p.name.clone(),
                total_score: p.stats.total_score,
                cooperation_pct: p.stats.cooperation_pct(),
                matches_played: p.stats.matches_played,
                cooperations: p.stats.cooperations,
                defections: p.stats.defections,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of the first `k` entries.
    pub fn top(&self, k: usize) -> Vec<ParticipantId> {
        self.entries.iter().take(k).map(|e| e.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_logic::{cooperation_pct, MatchResult, ParticipantTally};
    use proptest::prelude::*;

    const SOURCE: &str = "def strategy(o, m):\n    return 'C'\n";

    fn registry_with_scores(scores: &[i64]) -> Registry {
        let mut reg = Registry::new();
        let ids: Vec<_> = (0..scores.len())
            .map(|i| reg.register(&format!("team-{}", i), SOURCE).unwrap())
            .collect();
        let participants = ids
            .iter()
            .zip(scores)
            .map(|(&id, &score)| ParticipantTally {
                id,
                name: String::new(),
                score,
                cooperations: 1,
                defections: 3,
                cooperation_pct: cooperation_pct(1, 3),
            })
            .collect();
        reg.apply_result(&MatchResult {
            participants,
            rounds: vec![],
            round_count: 4,
        })
        .unwrap();
        reg
    }

    #[test]
    fn test_sorted_by_score_descending() {
        let board = Leaderboard::compute(&registry_with_scores(&[5, 20, 10]));
        let names: Vec<_> = board.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["team-1", "team-2", "team-0"]);
        let ranks: Vec<_> = board.entries().iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(board.entries()[0].cooperation_pct, 25.0);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let board = Leaderboard::compute(&registry_with_scores(&[7, 9, 7, 7]));
        let names: Vec<_> = board.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["team-1", "team-0", "team-2", "team-3"]);
    }

    #[test]
    fn test_fresh_roster_has_zero_cooperation() {
        let mut reg = Registry::new();
        reg.register("Alpha", SOURCE).unwrap();
        let board = Leaderboard::compute(&reg);
        assert_eq!(board.entries()[0].cooperation_pct, 0.0);
        assert_eq!(board.entries()[0].matches_played, 0);
    }

    #[test]
    fn test_top_k() {
        let reg = registry_with_scores(&[1, 3, 2]);
        let board = Leaderboard::compute(&reg);
        let ids = reg.ids();
        assert_eq!(board.top(2), vec![ids[1], ids[2]]);
        assert_eq!(board.top(10).len(), 3);
    }

    #[test]
    fn test_serializes_as_list() {
        let board = Leaderboard::compute(&registry_with_scores(&[1]));
        let json = serde_json::to_value(&board).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["rank"], 1);
    }

    proptest! {
        #[test]
        fn test_ranks_follow_scores(scores in prop::collection::vec(-50i64..500, 0..12)) {
            let reg = registry_with_scores(&scores);
            let board = Leaderboard::compute(&reg);
            prop_assert_eq!(board.len(), scores.len());
            for pair in board.entries().windows(2) {
                prop_assert!(pair[0].rank < pair[1].rank);
                prop_assert!(pair[0].total_score >= pair[1].total_score);
            }
        }

        #[test]
        fn test_recompute_is_stable(scores in prop::collection::vec(0i64..100, 0..12)) {
            let reg = registry_with_scores(&scores);
            prop_assert_eq!(Leaderboard::compute(&reg), Leaderboard::compute(&reg));
        }
    }
}
