//! Moves, participant identity, and the sample strategy catalogue

use core::fmt;

use serde::{Deserialize, Serialize};

/// A move in the Prisoner's Dilemma
///
/// Serialized as the single-letter symbols strategies return (`"C"` / `"D"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    #[serde(rename = "C")]
    Cooperate,
    #[serde(rename = "D")]
    Defect,
}

impl Move {
    /// The symbol a strategy returns for this move.
    pub fn symbol(self) -> &'static str {
        match self {
            Move::Cooperate => "C",
            Move::Defect => "D",
        }
    }

    /// Parse a strategy return value. Anything but `C` or `D` is illegal.
    pub fn from_symbol(symbol: &str) -> Option<Move> {
        match symbol {
            "C" => Some(Move::Cooperate),
            "D" => Some(Move::Defect),
            _ => None,
        }
    }

    pub fn is_cooperate(self) -> bool {
        self == Move::Cooperate
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Opaque participant identity, assigned by the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A ready-made strategy shown to participants as a starting point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SampleStrategy {
    pub name: &'static str,
    pub code: String,
}

/// Parameter list of the `strategy` entry point for a given match size:
/// one history per opponent, then the caller's own history.
fn signature(match_size: usize) -> (String, Vec<String>) {
    let opponents: Vec<String> = (1..match_size)
        .map(|i| format!("opponent{}_history", i))
        .collect();
    let mut params = opponents.clone();
    params.push("my_history".to_string());
    (format!("def strategy({}):", params.join(", ")), opponents)
}

/// Sample strategies written against the `match_size`-player entry point.
///
/// Returns an empty list for match sizes below 2.
pub fn sample_strategies(match_size: usize) -> Vec<SampleStrategy> {
    if match_size < 2 {
        return Vec::new();
    }
    let (header, opponents) = signature(match_size);
    let first = &opponents[0];

    let all_cooperated_last = opponents
        .iter()
        .map(|h| format!("{}[-1] == 'C'", h))
        .collect::<Vec<_>>()
        .join(" and ");
    let anyone_defected = opponents
        .iter()
        .map(|h| format!("'D' in {}", h))
        .collect::<Vec<_>>()
        .join(" or ");
    let last_moves = opponents
        .iter()
        .map(|h| format!("{}[-1]", h))
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        SampleStrategy {
            name: "Always Cooperate",
            code: format!("{}\n    return 'C'", header),
        },
        SampleStrategy {
            name: "Always Defect",
            code: format!("{}\n    return 'D'", header),
        },
        SampleStrategy {
            name: "Tit-for-Tat (All)",
            code: format!(
                "{}\n    if len({}) == 0:\n        return 'C'\n    # Cooperate only if every opponent cooperated last round\n    if {}:\n        return 'C'\n    return 'D'",
                header, first, all_cooperated_last
            ),
        },
        SampleStrategy {
            name: "Grudger",
            code: format!(
                "{}\n    # Defect forever once anyone has defected\n    if {}:\n        return 'D'\n    return 'C'",
                header, anyone_defected
            ),
        },
        SampleStrategy {
            name: "Majority Rules",
            code: format!(
                "{}\n    if len({}) == 0:\n        return 'C'\n    last_moves = [{}]\n    if last_moves.count('C') * 2 >= len(last_moves):\n        return 'C'\n    return 'D'",
                header, first, last_moves
            ),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols() {
        assert_eq!(Move::Cooperate.symbol(), "C");
        assert_eq!(Move::Defect.symbol(), "D");
        assert_eq!(Move::from_symbol("C"), Some(Move::Cooperate));
        assert_eq!(Move::from_symbol("D"), Some(Move::Defect));
        assert_eq!(Move::from_symbol("c"), None);
        assert_eq!(Move::from_symbol("CD"), None);
    }

    #[test]
    fn test_move_serializes_as_symbol() {
        assert_eq!(serde_json::to_string(&Move::Cooperate).unwrap(), "\"C\"");
        let m: Move = serde_json::from_str("\"D\"").unwrap();
        assert_eq!(m, Move::Defect);
        assert!(serde_json::from_str::<Move>("\"X\"").is_err());
    }

    #[test]
    fn test_signature_two_player() {
        let (header, opponents) = signature(2);
        assert_eq!(header, "def strategy(opponent1_history, my_history):");
        assert_eq!(opponents, vec!["opponent1_history".to_string()]);
    }

    #[test]
    fn test_signature_three_player() {
        let (header, _) = signature(3);
        assert_eq!(
            header,
            "def strategy(opponent1_history, opponent2_history, my_history):"
        );
    }

    #[test]
    fn test_sample_catalogue() {
        assert!(sample_strategies(1).is_empty());
        let samples = sample_strategies(3);
        let names: Vec<_> = samples.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["Always Cooperate", "Always Defect", "Tit-for-Tat (All)", "Grudger", "Majority Rules"]
        );
        assert!(samples[3].code.contains("'D' in opponent1_history or 'D' in opponent2_history"));
    }
}
