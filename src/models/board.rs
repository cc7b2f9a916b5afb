use serde::{Deserialize, Serialize};

use super::card::{Card, Element};

pub const BOARD_SIZE: usize = 3;
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// One of the two seats at the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    #[serde(rename = "player1")]
    Player1,
    #[serde(rename = "player2")]
    Player2,
}

impl Seat {
    pub fn opponent(self) -> Seat {
        match self {
            Seat::Player1 => Seat::Player2,
            Seat::Player2 => Seat::Player1,
        }
    }
}

impl std::fmt::Display for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Seat::Player1 => write!(f, "player1"),
            Seat::Player2 => write!(f, "player2"),
        }
    }
}

/// A card on the board together with the seat that currently owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placed {
    pub card: Card,
    pub owner: Seat,
}

/// A board cell. Card and owner live in one `Option` so one can never be set without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CellFields", into = "CellFields")]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub placed: Option<Placed>,
    pub element: Element,
}

impl Cell {
    pub fn empty(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            placed: None,
            element: Element::None,
        }
    }

    pub fn card(&self) -> Option<&Card> {
        self.placed.as_ref().map(|placed| &placed.card)
    }

    pub fn owner(&self) -> Option<Seat> {
        self.placed.as_ref().map(|placed| placed.owner)
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_none()
    }
}

/// Wire shape of a cell: `card` and `owner` side by side, both `null` when empty.
#[derive(Serialize, Deserialize)]
struct CellFields {
    row: usize,
    col: usize,
    card: Option<Card>,
    owner: Option<Seat>,
    #[serde(default)]
    element: Element,
}

impl From<Cell> for CellFields {
    fn from(cell: Cell) -> Self {
        let (card, owner) = match cell.placed {
            Some(placed) => (Some(placed.card), Some(placed.owner)),
            None => (None, None),
        };
        CellFields {
            row: cell.row,
            col: cell.col,
            card,
            owner,
            element: cell.element,
        }
    }
}

impl TryFrom<CellFields> for Cell {
    type Error = String;

    fn try_from(fields: CellFields) -> Result<Self, Self::Error> {
        let placed = match (fields.card, fields.owner) {
            (Some(card), Some(owner)) => Some(Placed { card, owner }),
            (None, None) => None,
            _ => return Err("cell card and owner must be set together".to_string()),
        };
        Ok(Cell {
            row: fields.row,
            col: fields.col,
            placed,
            element: fields.element,
        })
    }
}

/// The fixed 3x3 board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardState(pub [[Cell; BOARD_SIZE]; BOARD_SIZE]);

impl BoardState {
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.0.get(row).and_then(|cells| cells.get(col))
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        self.0.get_mut(row).and_then(|cells| cells.get_mut(col))
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.0.iter().flat_map(|row| row.iter())
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.0.iter_mut().flat_map(|row| row.iter_mut())
    }

    pub fn occupied(&self) -> usize {
        self.cells().filter(|cell| !cell.is_empty()).count()
    }

    pub fn owned_by(&self, seat: Seat) -> usize {
        self.cells().filter(|cell| cell.owner() == Some(seat)).count()
    }

    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        self.cells()
            .filter(|cell| cell.is_empty())
            .map(|cell| (cell.row, cell.col))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::card::CardStats;

    #[test]
    fn test_cell_json_shape() {
        let mut cell = Cell::empty(0, 2);
        let json = serde_json::to_value(&cell).unwrap();
        assert!(json["card"].is_null());
        assert!(json["owner"].is_null());
        assert_eq!(json["element"], "none");

        cell.placed = Some(Placed {
            card: Card::new("c1", "Scout", CardStats::new(1, 1, 1, 1), Element::Fire),
            owner: Seat::Player2,
        });
        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(json["owner"], "player2");
        assert_eq!(json["card"]["id"], "c1");

        let back: Cell = serde_json::from_value(json).unwrap();
        assert_eq!(back, cell);
    }

    #[test]
    fn test_unowned_card_is_rejected() {
        let json = serde_json::json!({
            "row": 0,
            "col": 0,
            "card": Card::new("c1", "Scout", CardStats::new(1, 1, 1, 1), Element::Fire),
            "owner": null,
            "element": "none",
        });
        assert!(serde_json::from_value::<Cell>(json).is_err());
    }
}
