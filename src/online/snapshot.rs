use serde::{Deserialize, Serialize};

use crate::game::game_state::{GameState, LastMove, Phase, Player, TOTAL_CARDS};
use crate::game::mechanics::Mechanic;
use crate::game::rules::Winner;
use crate::models::board::{BoardState, Seat};
use crate::utils::checksum::Checksum;

/// The part of a [`GameState`] that is replicated through the shared match record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub board: BoardState,
    pub player1: Player,
    pub player2: Player,
    pub current_player: Seat,
    pub phase: Phase,
    pub winner: Option<Winner>,
    pub last_move: Option<LastMove>,
    pub move_sequence: u64,
    #[serde(default)]
    pub mechanic: Mechanic,
}

impl StateSnapshot {
    pub fn capture(state: &GameState) -> Self {
        Self {
            board: state.board.clone(),
            player1: state.player1.clone(),
            player2: state.player2.clone(),
            current_player: state.current_player,
            phase: state.phase,
            winner: state.winner(),
            last_move: state.last_move.clone(),
            move_sequence: state.move_sequence,
            mechanic: state.mechanic,
        }
    }

    /// Checksum of the snapshot's canonical encoding.
    pub fn checksum(&self) -> Checksum {
        // Encoding plain data structures into a Vec cannot fail; fall back to a value no real
        // snapshot produces so a broken encoder shows up as "always different".
        Checksum::of(self).unwrap_or(Checksum(0))
    }

    /// Turns a replicated snapshot back into a full state, checking the invariants a remote
    /// writer could have broken.
    pub fn into_state(self, room_id: &str) -> Result<GameState, String> {
        if self.winner.is_some() != (self.phase == Phase::GameOver) {
            return Err(format!(
                "winner {:?} does not match phase `{}`",
                self.winner, self.phase
            ));
        }
        if matches!(self.phase, Phase::Playing | Phase::GameOver) {
            let total = self.player1.hand.len() + self.player2.hand.len() + self.board.occupied();
            if total != TOTAL_CARDS {
                return Err(format!("{total} cards in play"));
            }
        }

        Ok(GameState {
            room_id: room_id.to_string(),
            board: self.board,
            player1: self.player1,
            player2: self.player2,
            current_player: self.current_player,
            phase: self.phase,
            winner: self.winner,
            last_move: self.last_move,
            mechanic: self.mechanic,
            move_sequence: self.move_sequence,
            selected_card: None,
        })
    }
}
