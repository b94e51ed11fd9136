//! Payout computation

use crate::{
    shop::Bets,
    types::{MatchResult, Side},
};
use bank_ledger::AccountId;
use std::collections::BTreeMap;

/// Balance change per bettor for a match result
///
/// Winners get their bet times the winning side's odds, rounded up and at
/// least 1. Losers lose their full bet. A draw lists every bettor with a
/// change of 0.
pub fn compute_payouts(
    bets: &Bets,
    odds: &BTreeMap<Side, f64>,
    result: MatchResult,
) -> BTreeMap<AccountId, i64> {
    let mut changes = BTreeMap::new();

    let Some(winner) = result.winner() else {
        for side_bets in bets.values() {
            for account in side_bets.keys() {
                changes.insert(account.clone(), 0);
            }
        }
        return changes;
    };

    let winner_odds = odds.get(&winner).copied().unwrap_or(0.0);
    if let Some(winning_bets) = bets.get(&winner) {
        for (account, bet) in winning_bets {
            // float to int casts saturate
            let payout = (*bet as f64 * winner_odds).ceil() as i64;
            changes.insert(account.clone(), payout.max(1));
        }
    }
    if let Some(losing_bets) = bets.get(&winner.other()) {
        for (account, bet) in losing_bets {
            changes.insert(account.clone(), -bet);
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bet_book(blue: &[(&str, i64)], red: &[(&str, i64)]) -> Bets {
        let side = |entries: &[(&str, i64)]| {
            entries
                .iter()
                .map(|(id, amount)| (AccountId::new(*id), *amount))
                .collect::<BTreeMap<_, _>>()
        };
        [(Side::Blue, side(blue)), (Side::Red, side(red))].into_iter().collect()
    }

    fn odds(blue: f64, red: f64) -> BTreeMap<Side, f64> {
        [(Side::Blue, blue), (Side::Red, red)].into_iter().collect()
    }

    fn change(changes: &BTreeMap<AccountId, i64>, id: &str) -> i64 {
        changes[&AccountId::new(id)]
    }

    #[test]
    fn test_blue_wins() {
        let bets = bet_book(&[("a", 100)], &[("b", 50)]);
        let changes = compute_payouts(&bets, &odds(0.6, 2.0), MatchResult::Blue);

        assert_eq!(change(&changes, "a"), 60);
        assert_eq!(change(&changes, "b"), -50);
    }

    #[test]
    fn test_draw_lists_everyone_with_zero() {
        let bets = bet_book(&[("a", 100)], &[("b", 50)]);
        let changes = compute_payouts(&bets, &odds(0.6, 2.0), MatchResult::Draw);

        assert_eq!(changes.len(), 2);
        assert!(changes.values().all(|c| *c == 0));
    }

    #[test]
    fn test_both_outcomes() {
        let bets = bet_book(&[("userBlue", 200)], &[("userRed", 250)]);
        let odds = odds(1.25, 0.8);

        let blue = compute_payouts(&bets, &odds, MatchResult::Blue);
        assert_eq!((change(&blue, "userBlue"), change(&blue, "userRed")), (250, -250));

        let red = compute_payouts(&bets, &odds, MatchResult::Red);
        assert_eq!((change(&red, "userBlue"), change(&red, "userRed")), (-200, 200));
    }

    #[test]
    fn test_winner_never_rounded_to_nothing() {
        let bets = bet_book(&[("whale", 1_000_000), ("minnow", 1)], &[("lonely", 1)]);
        let changes = compute_payouts(&bets, &odds(1.0 / 1_000_001.0, 1_000_001.0), MatchResult::Blue);

        assert_eq!(change(&changes, "minnow"), 1);
        assert_eq!(change(&changes, "whale"), 1);
        assert_eq!(change(&changes, "lonely"), -1);
    }

    #[test]
    fn test_fractions_round_up() {
        let bets = bet_book(&[("a", 3)], &[("b", 1)]);
        let changes = compute_payouts(&bets, &odds(1.0 / 3.0, 3.0), MatchResult::Blue);
        assert_eq!(change(&changes, "a"), 1);

        let bets = bet_book(&[("a", 10)], &[("b", 3), ("c", 4)]);
        let changes = compute_payouts(&bets, &odds(0.7, 10.0 / 7.0), MatchResult::Blue);
        assert_eq!(change(&changes, "a"), 7);
    }
}
