//! Rounds, their answers and per-player guesses

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GameError;

/// Pixel location on a map image. Coordinates are unbounded; guesses
/// outside the image are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions of a map image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    pub width: u32,
    pub height: u32,
}

impl MapSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One round of the game
#[derive(Debug, Clone, Serialize)]
pub struct Round {
    /// Opaque 128-bit hex token
    pub id: String,
    pub map_filename: String,
    pub map_size: MapSize,
    /// Image shown to players alongside the map; never scored
    pub scene_filename: Option<String>,
    pub answer: Option<Point>,
    /// Latest guess per player, keyed by exact player name
    pub guesses: BTreeMap<String, Point>,
    pub created_at: DateTime<Utc>,
}

impl Round {
    pub fn new(map_filename: String, map_size: MapSize, scene_filename: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            map_filename,
            map_size,
            scene_filename,
            answer: None,
            guesses: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_answer(&self) -> bool {
        self.answer.is_some()
    }
}

/// Where a round sits in the ordered round list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundPosition {
    /// 1-based
    pub number: usize,
    pub total_rounds: usize,
    pub prev_round_id: Option<String>,
    pub next_round_id: Option<String>,
}

/// Ordered collection of rounds plus the "current round" pointer
#[derive(Debug, Default)]
pub struct RoundStore {
    rounds: Vec<Round>,
    current_index: usize,
}

impl RoundStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new round and make it current
    pub fn create_round(
        &mut self,
        map_filename: String,
        map_size: MapSize,
        scene_filename: Option<String>,
    ) -> &Round {
        self.rounds
            .push(Round::new(map_filename, map_size, scene_filename));
        self.current_index = self.rounds.len() - 1;
        &self.rounds[self.current_index]
    }

    pub fn get(&self, id: &str) -> Result<&Round, GameError> {
        self.rounds
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| GameError::round_not_found(id))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Round, GameError> {
        self.rounds
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| GameError::round_not_found(id))
    }

    /// Set (or overwrite) the answer for a round
    pub fn set_answer(&mut self, id: &str, answer: Point) -> Result<&Round, GameError> {
        let round = self.get_mut(id)?;
        round.answer = Some(answer);
        Ok(round)
    }

    /// Record a guess, replacing any earlier guess by the same player.
    /// Roster membership is checked by the session before calling this.
    pub(crate) fn record_guess(
        &mut self,
        id: &str,
        player: &str,
        guess: Point,
    ) -> Result<&Round, GameError> {
        let round = self.get_mut(id)?;
        round.guesses.insert(player.to_string(), guess);
        Ok(round)
    }

    /// Drop a player's guess from every round
    pub(crate) fn purge_player(&mut self, player: &str) {
        for round in &mut self.rounds {
            round.guesses.remove(player);
        }
    }

    /// Round at the current index, clamped into range.
    ///
    /// The clamp is deliberately lenient: a stale index maps to the nearest
    /// valid round instead of failing.
    pub fn current(&self) -> Option<&Round> {
        if self.is_empty() {
            return None;
        }
        self.rounds.get(self.current_index.min(self.len() - 1))
    }

    pub fn goto(&mut self, index: usize) -> Result<(), GameError> {
        if index >= self.rounds.len() {
            return Err(GameError::invalid_round_index());
        }
        self.current_index = index;
        Ok(())
    }

    /// Raw pointer value, unclamped
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn position(&self, id: &str) -> Result<RoundPosition, GameError> {
        let idx = self
            .rounds
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| GameError::round_not_found(id))?;

        Ok(RoundPosition {
            number: idx + 1,
            total_rounds: self.rounds.len(),
            prev_round_id: idx
                .checked_sub(1)
                .map(|prev| self.rounds[prev].id.clone()),
            next_round_id: self.rounds.get(idx + 1).map(|next| next.id.clone()),
        })
    }

    pub fn list(&self) -> &[Round] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn clear(&mut self) {
        self.rounds.clear();
        self.current_index = 0;
    }
}
