//! Leaderboard aggregation over scored rounds

use std::collections::BTreeMap;

use serde::Serialize;

use super::round::{Point, RoundStore};
use super::scoring::{pixel_distance, score};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub player: String,
    pub total: u64,
}

/// A player's result in one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundScore {
    pub score: u32,
    /// Pixel distance to the answer, rounded
    pub distance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRoundScore {
    pub player: String,
    /// None when the player did not guess this round
    pub result: Option<RoundScore>,
}

/// Breakdown for one round that has an answer
#[derive(Debug, Clone, Serialize)]
pub struct RoundRow {
    /// 1-based position in the full round list
    pub index: usize,
    pub round_id: String,
    pub map_filename: String,
    pub answer: Point,
    pub guesses: BTreeMap<String, Point>,
    /// In roster order
    pub scores: Vec<PlayerRoundScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    /// Highest total first; ties keep roster order
    pub ranked: Vec<LeaderboardEntry>,
    pub rounds: Vec<RoundRow>,
    /// Current round, for navigating back from the leaderboard
    pub back_round_id: Option<String>,
}

impl Leaderboard {
    /// Rounds without an answer are skipped entirely. A player who did not
    /// guess in a round contributes nothing for it.
    pub fn compute(players: &[String], rounds: &RoundStore) -> Self {
        let mut totals = vec![0u64; players.len()];
        let mut rows = Vec::new();

        for (idx, round) in rounds.list().iter().enumerate() {
            let Some(answer) = round.answer else {
                continue;
            };

            let scores = players
                .iter()
                .zip(totals.iter_mut())
                .map(|(player, total)| {
                    let result = round.guesses.get(player).map(|&guess| {
                        let points = score(guess, answer, round.map_size);
                        *total += u64::from(points);
                        RoundScore {
                            score: points,
                            distance: pixel_distance(guess, answer).round() as u64,
                        }
                    });
                    PlayerRoundScore {
                        player: player.clone(),
                        result,
                    }
                })
                .collect();

            rows.push(RoundRow {
                index: idx + 1,
                round_id: round.id.clone(),
                map_filename: round.map_filename.clone(),
                answer,
                guesses: round.guesses.clone(),
                scores,
            });
        }

        let mut ranked: Vec<LeaderboardEntry> = players
            .iter()
            .zip(totals)
            .map(|(player, total)| LeaderboardEntry {
                player: player.clone(),
                total,
            })
            .collect();
        // sort_by is stable, so equal totals stay in roster order
        ranked.sort_by(|a, b| b.total.cmp(&a.total));

        Self {
            ranked,
            rounds: rows,
            back_round_id: rounds.current().map(|r| r.id.clone()),
        }
    }
}
