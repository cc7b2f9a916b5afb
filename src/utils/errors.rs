use thiserror::Error;

/// Why the game store refused a command. The state is left untouched whenever one of these is
/// returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("command not allowed while the match is `{0}`")]
    WrongPhase(String),
    #[error("it is not `{0}`'s turn")]
    NotPlayerTurn(String),
    #[error("card `{0}` is not in the current player's hand")]
    CardNotInHand(String),
    #[error("no card selected")]
    NoCardSelected,
    #[error("cell ({0}, {1}) is already occupied")]
    CellOccupied(usize, usize),
    #[error("cell ({0}, {1}) is outside the board")]
    OutOfBounds(usize, usize),
    #[error("invalid setup: {0}")]
    InvalidSetup(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Unexpected response status {0}: {1}")]
    UnexpectedStatus(u16, String),
    #[error("Invalid response body for `{0}`")]
    InvalidResponseBody(String),
    #[error("Row `{0}` was not found")]
    RowNotFound(String),
    #[error("Transient store failure: {0}")]
    Transient(String),
}

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Channel `{0}` is closed")]
    ChannelClosed(String),
    #[error("Presence payload could not be encoded: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Deck for player `{player_id}` has {usable} usable cards, 5 required")]
    InvalidDeck { player_id: String, usable: usize },
    #[error("Gave up on `{what}` after {attempts} attempts")]
    RetriesExhausted { what: String, attempts: u32 },
    #[error("Match `{0}` was not found")]
    MatchNotFound(String),
    #[error("Match `{0}` was cancelled")]
    MatchCancelled(String),
    #[error("Game setup rejected: {0}")]
    Setup(#[from] Rejection),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

#[derive(Debug, Error)]
pub enum MatchmakingError {
    #[error("Deck for player `{player_id}` has {usable} usable cards, 5 required")]
    InvalidDeck { player_id: String, usable: usize },
    #[error("Matchmaking was cancelled")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

impl From<SyncError> for MatchmakingError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::InvalidDeck { player_id, usable } => {
                MatchmakingError::InvalidDeck { player_id, usable }
            }
            SyncError::Store(error) => MatchmakingError::Store(error),
            SyncError::Realtime(error) => MatchmakingError::Realtime(error),
            other => MatchmakingError::Store(StoreError::Transient(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum GauntletError {
    #[error("Ladder state could not be read or written: {0}")]
    Io(#[from] std::io::Error),
    #[error("Ladder state is malformed: {0}")]
    Format(#[from] serde_json::Error),
    #[error("A run needs exactly 5 cards, got {0}")]
    InvalidDeck(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
}
