use async_trait::async_trait;
use tracing::warn;

use super::models::Board;
use crate::errors::BoardError;

/// Result of reading a user's board document.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(Board),
    /// No record, no board field, or a document that is not a valid board.
    Absent,
    Failed(String),
}

impl LoadOutcome {
    /// The board to start the session with: the loaded one, or the seed.
    pub fn into_board(self) -> Board {
        match self {
            LoadOutcome::Loaded(board) => board,
            LoadOutcome::Absent | LoadOutcome::Failed(_) => Board::seed(),
        }
    }
}

/// Per-user board persistence.
///
/// `save` writes the whole board as one document; it either lands entirely
/// or reports failure.
#[async_trait]
pub trait BoardGateway: Send + Sync {
    async fn load(&self, user_id: &str) -> LoadOutcome;

    async fn save(&self, user_id: &str, board: &Board) -> Result<(), BoardError>;
}

/// Decode a stored board document. Anything malformed is `Absent`.
pub fn decode_board(user_id: &str, document: &str) -> LoadOutcome {
    let board: Board = match serde_json::from_str(document) {
        Ok(board) => board,
        Err(e) => {
            warn!(user_id, "stored board is malformed: {}", e);
            return LoadOutcome::Absent;
        }
    };
    if let Err(e) = board.validate() {
        warn!(user_id, "stored board fails validation: {}", e);
        return LoadOutcome::Absent;
    }
    if !board.has_seed_layout() {
        warn!(user_id, "stored board has an unexpected column layout");
        return LoadOutcome::Absent;
    }
    LoadOutcome::Loaded(board)
}
