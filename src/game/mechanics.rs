use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::board::{BoardState, Seat};
use crate::models::card::{Card, Element};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MechanicType {
    #[default]
    None,
    RandomElemental,
    Joker,
    Chaos,
}

impl MechanicType {
    pub const ALL: [MechanicType; 4] = [
        MechanicType::None,
        MechanicType::RandomElemental,
        MechanicType::Joker,
        MechanicType::Chaos,
    ];
}

/// Per-seat stat modifier for the joker mechanic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JokerModifier {
    pub player1: i8,
    pub player2: i8,
}

impl JokerModifier {
    pub fn for_seat(&self, seat: Seat) -> i8 {
        match seat {
            Seat::Player1 => self.player1,
            Seat::Player2 => self.player2,
        }
    }
}

/// The board-wide modifier active for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mechanic {
    #[serde(rename = "type")]
    pub kind: MechanicType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_element: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joker: Option<JokerModifier>,
}

const JOKER_VALUES: [i8; 3] = [-1, 1, 2];
const CHAOS_RANGE: std::ops::RangeInclusive<i8> = -2..=2;

impl Mechanic {
    pub fn plain() -> Self {
        Self::default()
    }

    /// Picks the active element for elemental boards when one was not given.
    pub fn of_kind<R: Rng + ?Sized>(kind: MechanicType, rng: &mut R) -> Self {
        let active_element = match kind {
            MechanicType::RandomElemental => Element::NATURES.choose(rng).copied(),
            _ => None,
        };
        Self {
            kind,
            active_element,
            joker: None,
        }
    }

    /// Rolls whatever the mechanic needs at the start of a match: tagged cells for elemental
    /// boards, per-seat modifiers for joker.
    pub fn prepare<R: Rng + ?Sized>(&mut self, board: &mut BoardState, rng: &mut R) {
        for cell in board.cells_mut() {
            cell.element = Element::None;
        }

        match self.kind {
            MechanicType::RandomElemental => {
                let element = *self
                    .active_element
                    .get_or_insert_with(|| Element::NATURES.choose(rng).copied().unwrap_or(Element::Fire));
                let tagged = rng.gen_range(1..=3);
                let mut positions: Vec<(usize, usize)> = board.empty_cells();
                positions.shuffle(rng);
                for (row, col) in positions.into_iter().take(tagged) {
                    if let Some(cell) = board.cell_mut(row, col) {
                        cell.element = element;
                    }
                }
            }
            MechanicType::Joker => {
                if self.joker.is_none() {
                    self.joker = Some(JokerModifier {
                        player1: *JOKER_VALUES.choose(rng).unwrap_or(&1),
                        player2: *JOKER_VALUES.choose(rng).unwrap_or(&1),
                    });
                }
            }
            MechanicType::None | MechanicType::Chaos => {}
        }
    }

    /// Recomputes a card's current stats for a placement, always starting from its base stats.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        card: &mut Card,
        cell_element: Element,
        mover: Seat,
        rng: &mut R,
    ) {
        let delta = match self.kind {
            MechanicType::None => 0,
            MechanicType::RandomElemental => match cell_element {
                Element::None => 0,
                element if element == card.element => 1,
                _ => -1,
            },
            MechanicType::Joker => self.joker.map(|joker| joker.for_seat(mover)).unwrap_or(0),
            MechanicType::Chaos => rng.gen_range(CHAOS_RANGE),
        };
        card.stats = card.base_stats.shifted(delta);
    }
}
