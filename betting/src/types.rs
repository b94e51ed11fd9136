//! Core types for betting

use serde::{Deserialize, Serialize};
use std::fmt;

/// Match identifier, recorded in the metadata of every settlement transaction
pub type MatchId = u64;

/// Team a bet can be placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Blue team
    Blue,
    /// Red team
    Red,
}

impl Side {
    /// All sides, in display order
    pub const ALL: [Side; 2] = [Side::Blue, Side::Red];

    /// The opposing side
    pub fn other(self) -> Side {
        match self {
            Side::Blue => Side::Red,
            Side::Red => Side::Blue,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Blue => f.write_str("blue"),
            Side::Red => f.write_str("red"),
        }
    }
}

/// Outcome of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    /// Blue won
    Blue,
    /// Red won
    Red,
    /// Nobody won, all bets are returned
    Draw,
}

impl MatchResult {
    /// Winning side, if any
    pub fn winner(self) -> Option<Side> {
        match self {
            MatchResult::Blue => Some(Side::Blue),
            MatchResult::Red => Some(Side::Red),
            MatchResult::Draw => None,
        }
    }
}

impl From<Side> for MatchResult {
    fn from(side: Side) -> Self {
        match side {
            Side::Blue => MatchResult::Blue,
            Side::Red => MatchResult::Red,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner() {
        assert_eq!(MatchResult::Blue.winner(), Some(Side::Blue));
        assert_eq!(MatchResult::Red.winner(), Some(Side::Red));
        assert_eq!(MatchResult::Draw.winner(), None);
        assert_eq!(MatchResult::from(Side::Red).winner().map(Side::other), Some(Side::Blue));
    }
}
