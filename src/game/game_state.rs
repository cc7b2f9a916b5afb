use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mechanics::Mechanic;
use super::rules::{create_empty_board, Winner};
use crate::models::board::{BoardState, Seat};
use crate::models::card::Card;

pub const HAND_SIZE: usize = 5;
pub const TOTAL_CARDS: usize = HAND_SIZE * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    /// Online match accepted, waiting for the host to seed the shared record.
    Preparing,
    /// Reserved.
    Waiting,
    /// Reserved.
    DecidingTurn,
    Playing,
    GameOver,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Lobby => "lobby",
            Phase::Preparing => "preparing",
            Phase::Waiting => "waiting",
            Phase::DecidingTurn => "deciding_turn",
            Phase::Playing => "playing",
            Phase::GameOver => "game_over",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub hand: Vec<Card>,
    pub captured_count: usize,
    pub total_flips: usize,
    pub color: String,
    pub is_computer: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hand: Vec::new(),
            captured_count: 0,
            total_flips: 0,
            color: color.into(),
            is_computer: false,
        }
    }

    pub fn computer(mut self) -> Self {
        self.is_computer = true;
        self
    }

    pub fn with_hand(mut self, hand: Vec<Card>) -> Self {
        self.hand = hand;
        self
    }

    pub fn holds(&self, card_id: &str) -> bool {
        self.hand.iter().any(|card| card.id == card_id)
    }
}

/// Where the last card went. Only used to trigger effects on the rendering side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMove {
    pub row: usize,
    pub col: usize,
    pub player_id: String,
    pub at: DateTime<Utc>,
}

/// One match. Only [`GameStore`](super::store::GameStore) mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub room_id: String,
    pub board: BoardState,
    pub player1: Player,
    pub player2: Player,
    pub current_player: Seat,
    pub phase: Phase,
    pub(crate) winner: Option<Winner>,
    pub last_move: Option<LastMove>,
    pub mechanic: Mechanic,
    pub move_sequence: u64,
    pub(crate) selected_card: Option<String>,
}

impl GameState {
    pub fn lobby() -> Self {
        Self {
            room_id: String::new(),
            board: create_empty_board(),
            player1: Player::new("player1", "Player 1", "blue"),
            player2: Player::new("player2", "Player 2", "red"),
            current_player: Seat::Player1,
            phase: Phase::Lobby,
            winner: None,
            last_move: None,
            mechanic: Mechanic::plain(),
            move_sequence: 0,
            selected_card: None,
        }
    }

    /// Set only in `GameOver`.
    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn selected_card(&self) -> Option<&str> {
        self.selected_card.as_deref()
    }

    pub fn player(&self, seat: Seat) -> &Player {
        match seat {
            Seat::Player1 => &self.player1,
            Seat::Player2 => &self.player2,
        }
    }

    pub(crate) fn player_mut(&mut self, seat: Seat) -> &mut Player {
        match seat {
            Seat::Player1 => &mut self.player1,
            Seat::Player2 => &mut self.player2,
        }
    }

    pub fn current(&self) -> &Player {
        self.player(self.current_player)
    }

    /// No match has been dealt yet: still in the lobby or waiting for an online seed.
    pub fn awaiting_start(&self) -> bool {
        matches!(self.phase, Phase::Lobby | Phase::Preparing)
    }

    pub fn winner_id(&self) -> Option<&str> {
        self.winner
            .and_then(Winner::seat)
            .map(|seat| self.player(seat).id.as_str())
    }

    /// Cards in both hands plus cards on the board. Always 10 once a match started.
    pub fn cards_in_play(&self) -> usize {
        self.player1.hand.len() + self.player2.hand.len() + self.board.occupied()
    }

    pub fn is_turn_of(&self, player_id: &str) -> bool {
        self.phase == Phase::Playing && self.current().id == player_id
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::lobby()
    }
}
