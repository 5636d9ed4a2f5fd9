//! Game state: scoring, rounds, roster and leaderboard

pub mod leaderboard;
pub mod round;
pub mod scoring;
pub mod session;

pub use leaderboard::Leaderboard;
pub use round::{MapSize, Point, Round, RoundPosition};
pub use session::GameSession;

use parking_lot::{Mutex, MutexGuard};

use crate::store::ImageError;

/// Errors surfaced by game and upload operations
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Bad, missing or duplicate input
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Image file missing, unreadable or not decodable
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Failed to persist an upload
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl GameError {
    pub(crate) fn round_not_found(id: &str) -> Self {
        GameError::NotFound(format!("Round {} not found.", id))
    }

    pub(crate) fn invalid_round_index() -> Self {
        GameError::Validation("Invalid round index.".to_string())
    }
}

/// The single game session, serialized behind one coarse lock.
///
/// Every mutation takes the lock for its whole duration. Never hold the
/// guard across an `.await`.
#[derive(Debug, Default)]
pub struct SharedGame {
    session: Mutex<GameSession>,
}

impl SharedGame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, GameSession> {
        self.session.lock()
    }
}
