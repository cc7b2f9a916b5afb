//! Capture rules. Pure functions over a [`BoardState`], no I/O and no randomness.

use serde::{Deserialize, Serialize};

use crate::models::board::{BoardState, Cell, Seat, BOARD_SIZE};
use crate::models::card::{Card, CardStats};

/// Final result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "player1")]
    Player1,
    #[serde(rename = "player2")]
    Player2,
    #[serde(rename = "draw")]
    Draw,
}

impl Winner {
    pub fn seat(self) -> Option<Seat> {
        match self {
            Winner::Player1 => Some(Seat::Player1),
            Winner::Player2 => Some(Seat::Player2),
            Winner::Draw => None,
        }
    }
}

impl From<Seat> for Winner {
    fn from(seat: Seat) -> Self {
        match seat {
            Seat::Player1 => Winner::Player1,
            Seat::Player2 => Winner::Player2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flip {
    pub row: usize,
    pub col: usize,
    pub new_owner: Seat,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Right => (0, 1),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
        }
    }

    /// (placed card's facing stat, neighbour's opposing stat)
    fn facing(self, placed: &CardStats, neighbour: &CardStats) -> (u8, u8) {
        match self {
            Direction::Up => (placed.top, neighbour.bottom),
            Direction::Right => (placed.right, neighbour.left),
            Direction::Down => (placed.bottom, neighbour.top),
            Direction::Left => (placed.left, neighbour.right),
        }
    }
}

/// Builds a 3x3 board with every cell empty and element-neutral.
///
/// # Returns
/// A fresh `BoardState`; board mechanics assign cell elements afterwards.
pub fn create_empty_board() -> BoardState {
    BoardState(std::array::from_fn(|row| {
        std::array::from_fn(|col| Cell::empty(row, col))
    }))
}

/// Neighbours captured by placing `placed` at (`row`, `col`) for `owner`.
///
/// Only the four orthogonal neighbours are looked at. A neighbour flips when it belongs to the
/// opponent and the placed card's facing stat is strictly greater than the neighbour's opposing
/// stat. Every comparison uses the placed card as it was put down; there are no chains.
///
/// # Arguments
/// * `board` - The board before the card is put down.
/// * `row`, `col` - Target cell of the placement.
/// * `placed` - The card being placed, with any mechanic bonus already applied.
/// * `owner` - The seat placing the card.
///
/// # Returns
/// One `Flip` per captured neighbour, in up, right, down, left order.
pub fn calculate_flips(
    board: &BoardState,
    row: usize,
    col: usize,
    placed: &Card,
    owner: Seat,
) -> Vec<Flip> {
    let mut flips = Vec::new();
    for direction in Direction::ALL {
        let (dr, dc) = direction.offset();
        let (Some(n_row), Some(n_col)) = (row.checked_add_signed(dr), col.checked_add_signed(dc))
        else {
            continue;
        };
        if n_row >= BOARD_SIZE || n_col >= BOARD_SIZE {
            continue;
        }

        let Some(neighbour) = board.cell(n_row, n_col).and_then(|cell| cell.placed.as_ref()) else {
            continue;
        };
        if neighbour.owner == owner {
            continue;
        }

        let (attack, defence) = direction.facing(&placed.stats, &neighbour.card.stats);
        if attack > defence {
            flips.push(Flip {
                row: n_row,
                col: n_col,
                new_owner: owner,
            });
        }
    }
    flips
}

/// Checks whether all nine cells hold a card.
///
/// # Arguments
/// * `board` - The board to inspect.
///
/// # Returns
/// `true` once no empty cell is left, which ends the match.
pub fn is_board_full(board: &BoardState) -> bool {
    board.cells().all(|cell| !cell.is_empty())
}

/// Owned cells plus cards still in hand decide the match; equal totals are a draw.
pub fn determine_winner(board: &BoardState, player1_hand: usize, player2_hand: usize) -> Winner {
    let player1 = board.owned_by(Seat::Player1) + player1_hand;
    let player2 = board.owned_by(Seat::Player2) + player2_hand;

    match player1.cmp(&player2) {
        std::cmp::Ordering::Greater => Winner::Player1,
        std::cmp::Ordering::Less => Winner::Player2,
        std::cmp::Ordering::Equal => Winner::Draw,
    }
}
