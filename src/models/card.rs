use serde::{Deserialize, Serialize};

pub const MIN_STAT: u8 = 1;
pub const MAX_STAT: u8 = 10;

/// Chakra nature of a card or of a board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Fire,
    Water,
    Earth,
    Wind,
    Lightning,
    #[default]
    None,
}

impl Element {
    /// The five real natures, `None` excluded.
    pub const NATURES: [Element; 5] = [
        Element::Fire,
        Element::Water,
        Element::Earth,
        Element::Wind,
        Element::Lightning,
    ];

    pub const ALL: [Element; 6] = [
        Element::Fire,
        Element::Water,
        Element::Earth,
        Element::Wind,
        Element::Lightning,
        Element::None,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// The four facing values of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStats {
    pub top: u8,
    pub right: u8,
    pub bottom: u8,
    pub left: u8,
}

impl CardStats {
    pub fn new(top: u8, right: u8, bottom: u8, left: u8) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn total(&self) -> u32 {
        self.top as u32 + self.right as u32 + self.bottom as u32 + self.left as u32
    }

    /// Returns a copy with `delta` added to every side, clamped to the legal stat range.
    pub fn shifted(&self, delta: i8) -> Self {
        let shift = |value: u8| -> u8 {
            (value as i16 + delta as i16).clamp(MIN_STAT as i16, MAX_STAT as i16) as u8
        };
        Self {
            top: shift(self.top),
            right: shift(self.right),
            bottom: shift(self.bottom),
            left: shift(self.left),
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|stat| (MIN_STAT..=MAX_STAT).contains(stat))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    pub stats: CardStats,
    pub base_stats: CardStats,
    #[serde(default)]
    pub element: Element,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_init: Option<bool>,
}

impl Card {
    /// Builds a freshly dealt card: current stats and the base snapshot start out equal.
    pub fn new(id: impl Into<String>, name: impl Into<String>, stats: CardStats, element: Element) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stats,
            base_stats: stats,
            element,
            rarity: None,
            cp: Some(stats.total()),
            is_init: None,
        }
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = Some(rarity);
        self
    }

    pub fn starter(mut self) -> Self {
        self.is_init = Some(true);
        self
    }

    /// Power budget, falling back to the stat total for catalog rows without one.
    pub fn power(&self) -> u32 {
        self.cp.unwrap_or_else(|| self.base_stats.total())
    }

    /// A copy ready to be dealt into a hand, with modifiers from a previous match dropped.
    pub fn dealt(&self) -> Self {
        let mut card = self.clone();
        card.stats = card.base_stats;
        card
    }

    /// Current minus base value per side, used to show buffs and debuffs.
    pub fn stat_delta(&self) -> [i8; 4] {
        [
            self.stats.top as i8 - self.base_stats.top as i8,
            self.stats.right as i8 - self.base_stats.right as i8,
            self.stats.bottom as i8 - self.base_stats.bottom as i8,
            self.stats.left as i8 - self.base_stats.left as i8,
        ]
    }

    /// A card can be played when it has an id and all of its sides are in range.
    pub fn is_usable(&self) -> bool {
        !self.id.is_empty() && self.base_stats.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shifted_clamps() {
        let stats = CardStats::new(1, 10, 5, 2);
        assert_eq!(stats.shifted(2), CardStats::new(3, 10, 7, 4));
        assert_eq!(stats.shifted(-2), CardStats::new(1, 8, 3, 1));
    }

    #[test]
    fn test_stat_delta_tracks_modifiers() {
        let mut card = Card::new("c1", "Scout", CardStats::new(3, 3, 3, 3), Element::Fire);
        card.stats = card.base_stats.shifted(1);
        assert_eq!(card.stat_delta(), [1, 1, 1, 1]);
        assert_eq!(card.dealt().stat_delta(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_usable_cards() {
        let card = Card::new("c1", "Scout", CardStats::new(3, 3, 3, 3), Element::None);
        assert!(card.is_usable());

        let broken = Card::new("c2", "Ghost", CardStats::new(0, 3, 3, 3), Element::None);
        assert!(!broken.is_usable());

        let anonymous = Card::new("", "Nobody", CardStats::new(3, 3, 3, 3), Element::None);
        assert!(!anonymous.is_usable());
    }

    #[test]
    fn test_card_json_shape() {
        let card = Card::new("c1", "Scout", CardStats::new(1, 2, 3, 4), Element::Lightning);
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["baseStats"]["left"], 4);
        assert_eq!(json["element"], "lightning");
        assert_eq!(json["cp"], 10);
    }
}
