//! Payoff rule for N-player rounds
//!
//! A round is scored per participant from two inputs only: the participant's
//! own move and how many *other* participants cooperated. That keeps the table
//! linear in N instead of exponential in the move tuple.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::Move;

/// Smallest supported match size.
pub const MIN_MATCH_SIZE: usize = 2;

/// Largest match size with a reference payoff table.
pub const MAX_MATCH_SIZE: usize = 3;

/// Largest points a single table entry may award.
pub const MAX_PAYOFF: i64 = 1_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PayoffError {
    #[error("payoff rows must have the same length (cooperate: {cooperate}, defect: {defect})")]
    RowLengthMismatch { cooperate: usize, defect: usize },
    #[error("payoff table covers {found}-player matches, expected {expected}")]
    WrongMatchSize { expected: usize, found: usize },
    #[error("no reference payoff table for {0}-player matches")]
    NoDefault(usize),
    #[error("payoff {value} is outside 0..={max}", max = MAX_PAYOFF)]
    OutOfRange { value: i64 },
}

/// Points awarded for (own move, number of other cooperators).
///
/// `cooperate[k]` is what a cooperator earns when `k` others cooperated,
/// `defect[k]` the same for a defector. Both rows have exactly
/// `match_size` entries (k ranges over `0..match_size`), and every entry is
/// in `0..=MAX_PAYOFF` so scores never go down.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoffTable {
    #[serde(rename = "C")]
    cooperate: Vec<i64>,
    #[serde(rename = "D")]
    defect: Vec<i64>,
}

impl PayoffTable {
    /// Build a table from its two rows, indexed by other-cooperator count.
    pub fn new(cooperate: Vec<i64>, defect: Vec<i64>) -> Result<Self, PayoffError> {
        if cooperate.len() != defect.len() {
            return Err(PayoffError::RowLengthMismatch {
                cooperate: cooperate.len(),
                defect: defect.len(),
            });
        }
        if cooperate.len() < MIN_MATCH_SIZE {
            return Err(PayoffError::WrongMatchSize {
                expected: MIN_MATCH_SIZE,
                found: cooperate.len(),
            });
        }
        let table = Self { cooperate, defect };
        table.check_values()?;
        Ok(table)
    }

    /// Classic bimatrix: CC (3,3), CD (0,5), DC (5,0), DD (1,1).
    pub fn two_player() -> Self {
        Self {
            cooperate: vec![0, 3],
            defect: vec![1, 5],
        }
    }

    /// Three-player table: cooperating pays 0/3/5 and defecting 1/4/7 for
    /// 0/1/2 other cooperators.
    pub fn three_player() -> Self {
        Self {
            cooperate: vec![0, 3, 5],
            defect: vec![1, 4, 7],
        }
    }

    /// Reference table for a match size.
    pub fn default_for(match_size: usize) -> Result<Self, PayoffError> {
        match match_size {
            2 => Ok(Self::two_player()),
            3 => Ok(Self::three_player()),
            n => Err(PayoffError::NoDefault(n)),
        }
    }

    /// Number of participants per match this table scores.
    pub fn match_size(&self) -> usize {
        self.cooperate.len()
    }

    /// Also re-checks row lengths and entry ranges, since a deserialized or
    /// converted table never went through [`PayoffTable::new`].
    pub fn check_match_size(&self, expected: usize) -> Result<(), PayoffError> {
        if self.cooperate.len() != self.defect.len() {
            return Err(PayoffError::RowLengthMismatch {
                cooperate: self.cooperate.len(),
                defect: self.defect.len(),
            });
        }
        if self.match_size() != expected {
            return Err(PayoffError::WrongMatchSize {
                expected,
                found: self.match_size(),
            });
        }
        self.check_values()
    }

    fn check_values(&self) -> Result<(), PayoffError> {
        match self
            .cooperate
            .iter()
            .chain(&self.defect)
            .find(|&&v| !(0..=MAX_PAYOFF).contains(&v))
        {
            Some(&value) => Err(PayoffError::OutOfRange { value }),
            None => Ok(()),
        }
    }

    pub fn cooperate_row(&self) -> &[i64] {
        &self.cooperate
    }

    pub fn defect_row(&self) -> &[i64] {
        &self.defect
    }

    /// Points for one participant.
    ///
    /// # Panics
    /// If `others_cooperating >= match_size()`. Callers size-check the table
    /// against the match before scoring.
    pub fn score(&self, own: Move, others_cooperating: usize) -> i64 {
        match own {
            Move::Cooperate => self.cooperate[others_cooperating],
            Move::Defect => self.defect[others_cooperating],
        }
    }

    /// Score a whole round. `moves.len()` must equal `match_size()`.
    pub fn score_round(&self, moves: &[Move]) -> Vec<i64> {
        let cooperators = moves.iter().filter(|m| m.is_cooperate()).count();
        moves
            .iter()
            .map(|&m| {
                let others = cooperators - usize::from(m.is_cooperate());
                self.score(m, others)
            })
            .collect()
    }
}

/// Field-by-field update of the three-player table.
///
/// Omitted fields fall back to the reference values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoffUpdate {
    pub c_2coop: i64,
    pub c_1coop: i64,
    pub c_0coop: i64,
    pub d_2coop: i64,
    pub d_1coop: i64,
    pub d_0coop: i64,
}

impl Default for PayoffUpdate {
    fn default() -> Self {
        Self {
            c_2coop: 5,
            c_1coop: 3,
            c_0coop: 0,
            d_2coop: 7,
            d_1coop: 4,
            d_0coop: 1,
        }
    }
}

impl From<PayoffUpdate> for PayoffTable {
    fn from(u: PayoffUpdate) -> Self {
        Self {
            cooperate: vec![u.c_0coop, u.c_1coop, u.c_2coop],
            defect: vec![u.d_0coop, u.d_1coop, u.d_2coop],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_player_matrix() {
        let t = PayoffTable::two_player();
        assert_eq!(t.score_round(&[Move::Cooperate, Move::Cooperate]), vec![3, 3]);
        assert_eq!(t.score_round(&[Move::Cooperate, Move::Defect]), vec![0, 5]);
        assert_eq!(t.score_round(&[Move::Defect, Move::Cooperate]), vec![5, 0]);
        assert_eq!(t.score_round(&[Move::Defect, Move::Defect]), vec![1, 1]);
    }

    #[test]
    fn test_three_player_matrix() {
        let t = PayoffTable::three_player();
        use Move::{Cooperate as C, Defect as D};
        assert_eq!(t.score_round(&[C, C, C]), vec![5, 5, 5]);
        assert_eq!(t.score_round(&[C, C, D]), vec![3, 3, 7]);
        assert_eq!(t.score_round(&[C, D, D]), vec![0, 4, 4]);
        assert_eq!(t.score_round(&[D, D, D]), vec![1, 1, 1]);
    }

    #[test]
    fn test_default_for() {
        assert_eq!(PayoffTable::default_for(2).unwrap(), PayoffTable::two_player());
        assert_eq!(PayoffTable::default_for(3).unwrap(), PayoffTable::three_player());
        assert_eq!(PayoffTable::default_for(4), Err(PayoffError::NoDefault(4)));
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        assert_eq!(
            PayoffTable::new(vec![0, 3], vec![1, 4, 7]),
            Err(PayoffError::RowLengthMismatch { cooperate: 2, defect: 3 })
        );
        assert!(PayoffTable::new(vec![1], vec![2]).is_err());
        assert!(PayoffTable::new(vec![0, 1, 2, 3], vec![1, 2, 3, 4]).is_ok());
    }

    #[test]
    fn test_check_match_size() {
        let t = PayoffTable::three_player();
        assert!(t.check_match_size(3).is_ok());
        assert_eq!(
            t.check_match_size(2),
            Err(PayoffError::WrongMatchSize { expected: 2, found: 3 })
        );
    }

    #[test]
    fn test_update_defaults_match_reference() {
        assert_eq!(PayoffTable::from(PayoffUpdate::default()), PayoffTable::three_player());
        let partial: PayoffUpdate = serde_json::from_str(r#"{"d_2coop": 9}"#).unwrap();
        let table = PayoffTable::from(partial);
        assert_eq!(table.defect_row(), &[1, 4, 9]);
        assert_eq!(table.cooperate_row(), &[0, 3, 5]);
    }

    #[test]
    fn test_table_json_shape() {
        let json = serde_json::to_value(PayoffTable::three_player()).unwrap();
        assert_eq!(json, serde_json::json!({"C": [0, 3, 5], "D": [1, 4, 7]}));
    }

    #[test]
    fn test_entries_must_be_in_range() {
        assert_eq!(
            PayoffTable::new(vec![-5, -5], vec![-5, -5]),
            Err(PayoffError::OutOfRange { value: -5 })
        );
        assert_eq!(
            PayoffTable::new(vec![i64::MAX, i64::MAX], vec![1, 5]),
            Err(PayoffError::OutOfRange { value: i64::MAX })
        );
        assert!(PayoffTable::new(vec![0, MAX_PAYOFF], vec![MAX_PAYOFF, 0]).is_ok());

        // Tables that skipped `new` are caught by the size check.
        let t: PayoffTable = serde_json::from_str(r#"{"C": [0, 3], "D": [-1, 5]}"#).unwrap();
        assert_eq!(t.check_match_size(2), Err(PayoffError::OutOfRange { value: -1 }));
        let update = PayoffUpdate {
            c_2coop: MAX_PAYOFF + 1,
            ..PayoffUpdate::default()
        };
        assert_eq!(
            PayoffTable::from(update).check_match_size(3),
            Err(PayoffError::OutOfRange { value: MAX_PAYOFF + 1 })
        );
    }

    #[test]
    fn test_deserialized_ragged_table_fails_size_check() {
        let t: PayoffTable = serde_json::from_str(r#"{"C": [0, 3, 5], "D": [1, 4]}"#).unwrap();
        assert_eq!(
            t.check_match_size(3),
            Err(PayoffError::RowLengthMismatch { cooperate: 3, defect: 2 })
        );
    }

    fn any_move() -> impl Strategy<Value = Move> {
        prop_oneof![Just(Move::Cooperate), Just(Move::Defect)]
    }

    proptest! {
        #[test]
        fn prop_round_scoring_is_reproducible(
            moves in proptest::collection::vec(any_move(), 2..=6),
            seed_row in proptest::collection::vec(0i64..20, 12),
        ) {
            let n = moves.len();
            let table = PayoffTable::new(seed_row[..n].to_vec(), seed_row[6..6 + n].to_vec()).unwrap();
            let first = table.score_round(&moves);
            let second = table.score_round(&moves);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), n);
        }

        #[test]
        fn prop_symmetric_moves_score_equally(n in 2usize..=6, coop in any::<bool>()) {
            let table = PayoffTable::new((0..n as i64).collect(), (10..10 + n as i64).collect()).unwrap();
            let m = if coop { Move::Cooperate } else { Move::Defect };
            let scores = table.score_round(&vec![m; n]);
            prop_assert!(scores.windows(2).all(|w| w[0] == w[1]));
        }
    }
}
