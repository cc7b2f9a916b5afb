//! Built-in card catalog, used when the remote `cards` collection is not reachable and as the
//! starter pool for new players.

use rand::seq::SliceRandom;
use rand::Rng;

use super::game_state::HAND_SIZE;
use crate::models::card::{Card, CardStats, Element, Rarity};

struct Entry {
    id: &'static str,
    name: &'static str,
    stats: [u8; 4],
    element: Element,
    rarity: Rarity,
    starter: bool,
}

const fn entry(
    id: &'static str,
    name: &'static str,
    stats: [u8; 4],
    element: Element,
    rarity: Rarity,
    starter: bool,
) -> Entry {
    Entry {
        id,
        name,
        stats,
        element,
        rarity,
        starter,
    }
}

#[rustfmt::skip]
const ENTRIES: &[Entry] = &[
    entry("academy-student", "Academy Student", [2, 1, 3, 2], Element::None, Rarity::Common, true),
    entry("shuriken-adept", "Shuriken Adept", [3, 2, 1, 3], Element::Wind, Rarity::Common, true),
    entry("ember-pupil", "Ember Pupil", [1, 3, 3, 2], Element::Fire, Rarity::Common, true),
    entry("river-scout", "River Scout", [3, 3, 1, 2], Element::Water, Rarity::Common, true),
    entry("stone-guard", "Stone Guard", [2, 2, 4, 2], Element::Earth, Rarity::Common, true),
    entry("spark-runner", "Spark Runner", [4, 2, 2, 1], Element::Lightning, Rarity::Common, true),
    entry("leaf-sentry", "Leaf Sentry", [3, 3, 3, 2], Element::Wind, Rarity::Common, true),
    entry("mist-tracker", "Mist Tracker", [2, 4, 2, 3], Element::Water, Rarity::Common, true),
    entry("clay-sculptor", "Clay Sculptor", [4, 3, 2, 3], Element::Earth, Rarity::Common, false),
    entry("flame-dancer", "Flame Dancer", [3, 5, 2, 3], Element::Fire, Rarity::Common, false),
    entry("puppet-novice", "Puppet Novice", [5, 2, 4, 2], Element::None, Rarity::Common, false),
    entry("thunder-cadet", "Thunder Cadet", [2, 3, 5, 4], Element::Lightning, Rarity::Common, false),
    entry("bug-tamer", "Bug Tamer", [4, 4, 3, 4], Element::Earth, Rarity::Rare, false),
    entry("wave-breaker", "Wave Breaker", [5, 3, 4, 4], Element::Water, Rarity::Rare, false),
    entry("gale-blade", "Gale Blade", [4, 5, 4, 3], Element::Wind, Rarity::Rare, false),
    entry("ash-monk", "Ash Monk", [6, 3, 4, 4], Element::Fire, Rarity::Rare, false),
    entry("iron-fist", "Iron Fist", [5, 5, 4, 5], Element::None, Rarity::Rare, false),
    entry("storm-caller", "Storm Caller", [6, 4, 5, 4], Element::Lightning, Rarity::Rare, false),
    entry("masked-hunter", "Masked Hunter", [5, 6, 5, 5], Element::Water, Rarity::Epic, false),
    entry("crimson-eye", "Crimson Eye", [7, 5, 4, 6], Element::Fire, Rarity::Epic, false),
    entry("sand-coffin", "Sand Coffin", [6, 5, 7, 5], Element::Earth, Rarity::Epic, false),
    entry("silent-blade", "Silent Blade", [7, 6, 5, 6], Element::Wind, Rarity::Epic, false),
    entry("chidori-master", "Lightning Cutter", [8, 6, 6, 6], Element::Lightning, Rarity::Epic, false),
    entry("toad-sage", "Toad Sage", [7, 7, 6, 7], Element::Earth, Rarity::Legendary, false),
    entry("shadow-lord", "Shadow Lord", [8, 7, 7, 6], Element::None, Rarity::Legendary, false),
    entry("white-flash", "White Flash", [9, 7, 6, 8], Element::Lightning, Rarity::Legendary, false),
    entry("nine-tails", "Nine-Tailed Fox", [9, 8, 8, 7], Element::Fire, Rarity::Legendary, false),
    entry("sage-of-paths", "Sage of Six Paths", [10, 8, 9, 9], Element::None, Rarity::Legendary, false),
];

pub fn starter_catalog() -> Vec<Card> {
    ENTRIES
        .iter()
        .map(|entry| {
            let [top, right, bottom, left] = entry.stats;
            let card = Card::new(entry.id, entry.name, CardStats::new(top, right, bottom, left), entry.element)
                .with_rarity(entry.rarity);
            if entry.starter {
                card.starter()
            } else {
                card
            }
        })
        .collect()
}

/// Five distinct cards drawn from the starter-eligible part of `pool`.
pub fn starter_pack<R: Rng + ?Sized>(pool: &[Card], rng: &mut R) -> Vec<Card> {
    let starters: Vec<&Card> = pool
        .iter()
        .filter(|card| card.is_init == Some(true))
        .collect();
    starters
        .choose_multiple(rng, HAND_SIZE)
        .map(|card| card.dealt())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_is_well_formed() {
        let catalog = starter_catalog();
        let ids: HashSet<&str> = catalog.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.len());
        assert!(catalog.iter().all(Card::is_usable));
        assert!(catalog.iter().all(|c| c.cp == Some(c.base_stats.total())));
    }

    #[test]
    fn test_starter_pack_draws_distinct_starters() {
        let catalog = starter_catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let pack = starter_pack(&catalog, &mut rng);
        assert_eq!(pack.len(), HAND_SIZE);
        let ids: HashSet<&str> = pack.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), HAND_SIZE);
        assert!(pack.iter().all(|c| c.is_init == Some(true)));
    }
}
