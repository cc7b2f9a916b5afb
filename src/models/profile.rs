use serde::{Deserialize, Serialize};

use super::card::Card;
use crate::game::gauntlet::Rank;
use crate::game::mechanics::MechanicType;

/// A row of the `profiles` collection.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub username: String,
    /// Card ids of the player's active deck.
    #[serde(default)]
    pub selected_deck: Vec<String>,
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub rank_points: i64,
}

/// A row of the admin-configured `boss_decks` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BossDeckRow {
    pub rank: Rank,
    pub name: String,
    pub cards: Vec<Card>,
    #[serde(default)]
    pub mechanic: MechanicType,
}
