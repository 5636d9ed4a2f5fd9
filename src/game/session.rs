//! Player roster and session lifecycle

use std::collections::BTreeMap;

use tracing::info;
use unicase::UniCase;

use super::leaderboard::Leaderboard;
use super::round::{MapSize, Point, Round, RoundStore};
use super::GameError;

/// Comparison key for player names: trimmed, Unicode case-folded
fn normalize_name(name: &str) -> UniCase<&str> {
    UniCase::new(name.trim())
}

/// The game: ordered roster of players plus the rounds they play
#[derive(Debug, Default)]
pub struct GameSession {
    players: Vec<String>,
    rounds: RoundStore,
}

impl GameSession {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Roster in insertion order
    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn rounds(&self) -> &RoundStore {
        &self.rounds
    }

    /// True if a player with this name exists, ignoring case
    pub fn player_exists(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.players.iter().any(|p| normalize_name(p) == key)
    }

    /// Register a player. Returns the stored (trimmed) name.
    pub fn add_player(&mut self, name: &str) -> Result<String, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::Validation(
                "Player name cannot be empty.".to_string(),
            ));
        }
        if self.player_exists(name) {
            return Err(GameError::Validation(
                "That player name already exists.".to_string(),
            ));
        }

        let name = name.to_string();
        self.players.push(name.clone());
        info!(player = %name, players = self.players.len(), "Player added");
        Ok(name)
    }

    /// Remove a player (exact match) and their guesses. Returns whether
    /// anyone was removed.
    pub fn remove_player(&mut self, name: &str) -> bool {
        let Some(pos) = self.players.iter().position(|p| p == name) else {
            return false;
        };
        self.players.remove(pos);
        self.rounds.purge_player(name);
        info!(player = %name, "Player removed");
        true
    }

    /// Clear players, rounds and the current round pointer
    pub fn reset(&mut self) {
        self.players.clear();
        self.rounds.clear();
        info!("Game reset");
    }

    pub fn create_round(
        &mut self,
        map_filename: String,
        map_size: MapSize,
        scene_filename: Option<String>,
    ) -> &Round {
        let round = self
            .rounds
            .create_round(map_filename, map_size, scene_filename);
        info!(
            round_id = %round.id,
            map = %round.map_filename,
            width = round.map_size.width,
            height = round.map_size.height,
            "Round created"
        );
        round
    }

    pub fn get_round(&self, id: &str) -> Result<&Round, GameError> {
        self.rounds.get(id)
    }

    pub fn set_answer(&mut self, id: &str, answer: Point) -> Result<&Round, GameError> {
        let round = self.rounds.set_answer(id, answer)?;
        info!(round_id = %id, x = answer.x, y = answer.y, "Answer set");
        Ok(round)
    }

    /// Submit a guess for a registered player. The round is resolved first,
    /// so an unknown round wins over an unknown player.
    pub fn submit_guess(
        &mut self,
        id: &str,
        player: &str,
        guess: Point,
    ) -> Result<&BTreeMap<String, Point>, GameError> {
        self.rounds.get(id)?;
        if !self.players.iter().any(|p| p == player) {
            return Err(GameError::Validation("Invalid player.".to_string()));
        }

        let round = self.rounds.record_guess(id, player, guess)?;
        info!(round_id = %id, player = %player, x = guess.x, y = guess.y, "Guess submitted");
        Ok(&round.guesses)
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.current()
    }

    pub fn goto_round(&mut self, index: usize) -> Result<(), GameError> {
        self.rounds.goto(index)?;
        info!(index, "Current round changed");
        Ok(())
    }

    pub fn leaderboard(&self) -> Leaderboard {
        Leaderboard::compute(&self.players, &self.rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_round() -> (GameSession, String) {
        let mut session = GameSession::new();
        let id = session
            .create_round("map.png".into(), MapSize::new(1000, 1000), None)
            .id
            .clone();
        (session, id)
    }

    #[test]
    fn add_player_trims_and_preserves_order() {
        let mut session = GameSession::new();
        assert_eq!(session.add_player("  Alice ").unwrap(), "Alice");
        session.add_player("Bob").unwrap();
        session.add_player("carol").unwrap();
        assert_eq!(session.players(), ["Alice", "Bob", "carol"]);
    }

    #[test]
    fn add_player_rejects_empty_and_duplicates() {
        let mut session = GameSession::new();
        assert!(matches!(session.add_player("   "), Err(GameError::Validation(_))));

        session.add_player("Bob").unwrap();
        assert!(session.player_exists("bob"));
        assert!(session.player_exists(" BOB "));

        let err = session.add_player("bob").unwrap_err();
        assert_eq!(err.to_string(), "That player name already exists.");
        assert_eq!(session.players().len(), 1);
    }

    #[test]
    fn duplicate_check_uses_full_case_folding() {
        let mut session = GameSession::new();
        session.add_player("Straße").unwrap();
        assert!(session.player_exists("STRASSE"));
        assert!(matches!(session.add_player("STRASSE"), Err(GameError::Validation(_))));

        session.add_player("Ärger").unwrap();
        assert!(session.add_player("ärger").is_err());
        assert_eq!(session.players(), ["Straße", "Ärger"]);
    }

    #[test]
    fn remove_player_purges_guesses_everywhere() {
        let (mut session, first) = session_with_round();
        let second = session
            .create_round("other.png".into(), MapSize::new(10, 10), None)
            .id
            .clone();
        session.add_player("A").unwrap();
        session.add_player("B").unwrap();

        for id in [&first, &second] {
            session.submit_guess(id, "A", Point::new(1, 1)).unwrap();
            session.submit_guess(id, "B", Point::new(2, 2)).unwrap();
        }

        assert!(session.remove_player("A"));
        assert_eq!(session.players(), ["B"]);
        for round in session.rounds().list() {
            assert!(!round.guesses.contains_key("A"));
            assert!(round.guesses.contains_key("B"));
        }
    }

    #[test]
    fn remove_missing_player_is_noop() {
        let mut session = GameSession::new();
        session.add_player("Bob").unwrap();
        assert!(!session.remove_player("bob"));
        assert!(!session.remove_player("Nobody"));
        assert_eq!(session.players(), ["Bob"]);
    }

    #[test]
    fn guess_requires_registered_player() {
        let (mut session, id) = session_with_round();
        session.add_player("Bob").unwrap();

        let err = session
            .submit_guess(&id, "bob", Point::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));

        let err = session
            .submit_guess("missing", "Bob", Point::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));

        let guesses = session.submit_guess(&id, "Bob", Point::new(4, 2)).unwrap();
        assert_eq!(guesses.get("Bob"), Some(&Point::new(4, 2)));
    }

    #[test]
    fn goto_round_at_len_fails() {
        let (mut session, _) = session_with_round();
        session.create_round("b.png".into(), MapSize::new(5, 5), None);
        let len = session.rounds().len();
        assert!(matches!(session.goto_round(len), Err(GameError::Validation(_))));
        session.goto_round(len - 1).unwrap();
        session.goto_round(0).unwrap();
        assert_eq!(session.current_round().unwrap().map_filename, "map.png");
    }

    #[test]
    fn reset_clears_everything() {
        let (mut session, id) = session_with_round();
        session.add_player("A").unwrap();
        session.set_answer(&id, Point::new(1, 1)).unwrap();
        session.reset();

        assert!(session.players().is_empty());
        assert!(session.rounds().is_empty());
        assert_eq!(session.rounds().current_index(), 0);
        assert!(session.current_round().is_none());
        assert!(session.get_round(&id).is_err());
    }
}
