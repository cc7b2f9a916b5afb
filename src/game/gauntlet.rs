//! Gauntlet: a single-player ladder of matches against generated opponents with rank-gated
//! board mechanics and a boss fight guarding every promotion.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::game_state::{Player, HAND_SIZE};
use super::mechanics::{Mechanic, MechanicType};
use super::rules::Winner;
use super::store::GameSetup;
use crate::logger;
use crate::models::board::Seat;
use crate::models::card::{Card, CardStats, Element, MIN_STAT};
use crate::models::profile::BossDeckRow;
use crate::online::backend::MatchStore;
use crate::utils::errors::GauntletError;

pub const WIN_BASE_POINTS: i64 = 100;
pub const BOARD_CARD_BONUS: i64 = 10;
pub const BOSS_LOSS_MULTIPLIER: f64 = 0.5;
pub const REWARD_EVERY_WINS: u32 = 3;
pub const REWARD_OPTIONS: usize = 3;
pub const COINS_PER_SCORE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Genin,
    Chunin,
    Jounin,
    Anbu,
    Kage,
    Rikudo,
}

impl Rank {
    pub const ALL: [Rank; 6] = [
        Rank::Genin,
        Rank::Chunin,
        Rank::Jounin,
        Rank::Anbu,
        Rank::Kage,
        Rank::Rikudo,
    ];

    /// Score needed to be promoted into this rank.
    pub fn threshold(self) -> i64 {
        match self {
            Rank::Genin => 0,
            Rank::Chunin => 300,
            Rank::Jounin => 800,
            Rank::Anbu => 1500,
            Rank::Kage => 2500,
            Rank::Rikudo => 4000,
        }
    }

    /// Flat score penalty for losing a normal match at this rank.
    pub fn loss_penalty(self) -> i64 {
        match self {
            Rank::Genin => 25,
            Rank::Chunin => 50,
            Rank::Jounin => 100,
            Rank::Anbu => 150,
            Rank::Kage => 250,
            Rank::Rikudo => 400,
        }
    }

    /// Inclusive power budget of generated opponent cards.
    pub fn cp_band(self) -> (u32, u32) {
        match self {
            Rank::Genin => (6, 12),
            Rank::Chunin => (10, 16),
            Rank::Jounin => (14, 20),
            Rank::Anbu => (18, 24),
            Rank::Kage => (22, 30),
            Rank::Rikudo => (28, 40),
        }
    }

    /// Highest stat a synthetic opponent card may roll.
    pub fn max_stat(self) -> u8 {
        match self {
            Rank::Genin => 4,
            Rank::Chunin => 5,
            Rank::Jounin => 6,
            Rank::Anbu => 7,
            Rank::Kage => 8,
            Rank::Rikudo => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rank::Genin => "Genin",
            Rank::Chunin => "Chunin",
            Rank::Jounin => "Jounin",
            Rank::Anbu => "Anbu",
            Rank::Kage => "Kage",
            Rank::Rikudo => "Rikudo",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Match result from the ladder player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

impl MatchOutcome {
    pub fn for_seat(winner: Winner, seat: Seat) -> Self {
        match winner.seat() {
            None => MatchOutcome::Draw,
            Some(won) if won == seat => MatchOutcome::Win,
            Some(_) => MatchOutcome::Loss,
        }
    }
}

/// What a processed result did to the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Run goes on at the same rank.
    Continued { score: i64 },
    /// Score crossed a threshold; the next match is the boss fight.
    BossArmed { pending_rank: Rank, boss: String },
    /// Boss beaten, promotion committed.
    RankedUp { rank: Rank },
    RunEnded { final_score: i64 },
    /// No active run.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GauntletState {
    pub is_active: bool,
    pub rank: Rank,
    pub score: i64,
    pub round: u32,
    pub wins: u32,
    #[serde(default)]
    pub total_flips: u32,
    pub deck: Vec<Card>,
    pub is_boss_battle: bool,
    pub pending_rank: Option<Rank>,
    pub pending_reward: bool,
    #[serde(default)]
    pub last_boss: Option<String>,
    #[serde(default)]
    pub opponent_name: String,
    #[serde(default)]
    pub settled: bool,
}

impl Default for GauntletState {
    fn default() -> Self {
        Self {
            is_active: false,
            rank: Rank::Genin,
            score: 0,
            round: 0,
            wins: 0,
            total_flips: 0,
            deck: Vec::new(),
            is_boss_battle: false,
            pending_rank: None,
            pending_reward: false,
            last_boss: None,
            opponent_name: String::new(),
            settled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Boss {
    pub rank: Rank,
    pub name: String,
    pub deck: Vec<Card>,
    pub mechanic: Mechanic,
}

/// Deck and board for the next gauntlet match.
#[derive(Debug, Clone, PartialEq)]
pub struct OpponentConfig {
    pub name: String,
    pub deck: Vec<Card>,
    pub mechanic: Mechanic,
    pub is_boss: bool,
}

const OPPONENT_NAMES: &[&str] = &[
    "Wandering Ronin",
    "Rain Village Spy",
    "Sound Village Genin",
    "Cloud Mercenary",
    "Missing-nin",
    "Grass Village Scout",
    "Waterfall Sentinel",
    "Stone Village Tracker",
    "Hidden Mist Chaser",
    "Masked Bandit",
];

fn boss_card(rank: Rank, index: usize, stats: [u8; 4], element: Element) -> Card {
    let [top, right, bottom, left] = stats;
    Card::new(
        format!("boss-{}-{}", rank.name().to_lowercase(), index + 1),
        format!("{} Elite {}", rank.name(), index + 1),
        CardStats::new(top, right, bottom, left),
        element,
    )
}

/// Built-in boss for every rank. The boss of a rank guards promotion out of it.
pub fn default_bosses() -> Vec<Boss> {
    let roster: [(Rank, &str, Element, MechanicType, [[u8; 4]; 5]); 6] = [
        (Rank::Genin, "Bridge Mercenary", Element::Water, MechanicType::None,
            [[4, 3, 2, 3], [3, 4, 3, 2], [2, 3, 4, 3], [3, 2, 3, 4], [4, 4, 2, 2]]),
        (Rank::Chunin, "Sand Gourd Jailer", Element::Earth, MechanicType::None,
            [[5, 4, 3, 4], [4, 5, 4, 3], [3, 4, 5, 4], [4, 3, 4, 5], [5, 5, 3, 3]]),
        (Rank::Jounin, "Mist Swordsman", Element::Water, MechanicType::RandomElemental,
            [[6, 5, 4, 5], [5, 6, 5, 4], [4, 5, 6, 5], [5, 4, 5, 6], [6, 6, 4, 4]]),
        (Rank::Anbu, "Root Commander", Element::Wind, MechanicType::Joker,
            [[7, 6, 5, 6], [6, 7, 6, 5], [5, 6, 7, 6], [6, 5, 6, 7], [7, 7, 5, 5]]),
        (Rank::Kage, "Cloaked Shadow", Element::Fire, MechanicType::Chaos,
            [[8, 7, 6, 7], [7, 8, 7, 6], [6, 7, 8, 7], [7, 6, 7, 8], [8, 8, 6, 6]]),
        (Rank::Rikudo, "Six Paths Avatar", Element::Lightning, MechanicType::RandomElemental,
            [[9, 8, 7, 8], [8, 9, 8, 7], [7, 8, 9, 8], [8, 7, 8, 9], [9, 9, 8, 8]]),
    ];

    roster
        .into_iter()
        .map(|(rank, name, element, kind, stats)| Boss {
            rank,
            name: name.to_string(),
            deck: stats
                .into_iter()
                .enumerate()
                .map(|(index, stats)| boss_card(rank, index, stats, element))
                .collect(),
            mechanic: Mechanic {
                kind,
                active_element: (kind == MechanicType::RandomElemental).then_some(element),
                joker: None,
            },
        })
        .collect()
}

pub struct GauntletEngine {
    state: GauntletState,
    bosses: Vec<Boss>,
    rng: ChaCha8Rng,
}

impl GauntletEngine {
    pub fn new() -> Self {
        Self::with_rng(GauntletState::default(), ChaCha8Rng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(GauntletState::default(), ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_rng(state: GauntletState, rng: ChaCha8Rng) -> Self {
        Self {
            state,
            bosses: default_bosses(),
            rng,
        }
    }

    pub fn state(&self) -> &GauntletState {
        &self.state
    }

    pub fn boss(&self, rank: Rank) -> Option<&Boss> {
        self.bosses.iter().find(|boss| boss.rank == rank)
    }

    /// Replaces built-in bosses with admin-configured ones. Rows with an incomplete deck are
    /// skipped so the built-in boss for that rank stays.
    pub fn apply_boss_decks(&mut self, rows: Vec<BossDeckRow>) {
        for row in rows {
            if row.cards.len() != HAND_SIZE || !row.cards.iter().all(Card::is_usable) {
                logger!(WARN, "[GAUNTLET] Ignoring boss deck `{}` for {}", row.name, row.rank);
                continue;
            }
            let boss = Boss {
                rank: row.rank,
                name: row.name,
                deck: row.cards,
                mechanic: Mechanic::of_kind(row.mechanic, &mut self.rng),
            };
            match self.bosses.iter_mut().find(|existing| existing.rank == boss.rank) {
                Some(existing) => *existing = boss,
                None => self.bosses.push(boss),
            }
        }
    }

    /// Loads the `boss_decks` collection. A store failure keeps the current roster.
    pub async fn refresh_bosses<S: MatchStore>(&mut self, store: &S) {
        match store.fetch_boss_decks().await {
            Ok(rows) => self.apply_boss_decks(rows),
            Err(error) => logger!(WARN, "[GAUNTLET] Boss decks unavailable ({error})"),
        }
    }

    fn fresh_opponent_name(&mut self) -> String {
        OPPONENT_NAMES
            .choose(&mut self.rng)
            .map(|name| name.to_string())
            .unwrap_or_default()
    }

    pub fn start_run(&mut self, deck: Vec<Card>) -> Result<(), GauntletError> {
        if deck.len() != HAND_SIZE {
            return Err(GauntletError::InvalidDeck(deck.len()));
        }
        let opponent_name = self.fresh_opponent_name();
        self.state = GauntletState {
            is_active: true,
            deck: deck.iter().map(Card::dealt).collect(),
            opponent_name,
            ..GauntletState::default()
        };
        logger!(INFO, "[GAUNTLET] Run started");
        Ok(())
    }

    pub fn abandon_run(&mut self) {
        self.state.is_active = false;
        self.state.is_boss_battle = false;
        self.state.pending_rank = None;
        logger!(INFO, "[GAUNTLET] Run abandoned at score {}", self.state.score);
    }

    /// Deck and board mechanic for the next match.
    pub fn get_opponent_config(&mut self, pool: &[Card]) -> OpponentConfig {
        let rank = self.state.rank;
        if self.state.is_boss_battle {
            if let Some(boss) = self.boss(rank) {
                return OpponentConfig {
                    name: boss.name.clone(),
                    deck: boss.deck.iter().map(Card::dealt).collect(),
                    mechanic: boss.mechanic,
                    is_boss: true,
                };
            }
            logger!(WARN, "[GAUNTLET] No boss configured for {rank}, generating one");
        }

        let deck = self.generate_deck(rank, pool);
        let kind = match rank {
            Rank::Genin | Rank::Chunin | Rank::Jounin => MechanicType::None,
            Rank::Anbu => MechanicType::RandomElemental,
            Rank::Kage | Rank::Rikudo => *MechanicType::ALL
                .choose(&mut self.rng)
                .unwrap_or(&MechanicType::None),
        };
        let mechanic = Mechanic::of_kind(kind, &mut self.rng);

        let name = if self.state.opponent_name.is_empty() {
            self.fresh_opponent_name()
        } else {
            self.state.opponent_name.clone()
        };

        OpponentConfig {
            name,
            deck,
            mechanic,
            is_boss: self.state.is_boss_battle,
        }
    }

    fn in_band<'a>(rank: Rank, pool: &'a [Card]) -> Vec<&'a Card> {
        let (min, max) = rank.cp_band();
        pool.iter()
            .filter(|card| card.is_usable() && (min..=max).contains(&card.power()))
            .collect()
    }

    fn generate_deck(&mut self, rank: Rank, pool: &[Card]) -> Vec<Card> {
        let eligible = Self::in_band(rank, pool);
        if eligible.len() >= HAND_SIZE {
            return eligible
                .choose_multiple(&mut self.rng, HAND_SIZE)
                .map(|card| card.dealt())
                .collect();
        }

        logger!(
            DEBUG,
            "[GAUNTLET] Only {} pool cards fit {rank}, generating synthetic deck",
            eligible.len()
        );
        let ceiling = rank.max_stat();
        (0..HAND_SIZE)
            .map(|index| {
                let mut roll = || self.rng.gen_range(MIN_STAT..=ceiling);
                let stats = CardStats::new(roll(), roll(), roll(), roll());
                let element = *Element::ALL.choose(&mut self.rng).unwrap_or(&Element::None);
                Card::new(
                    format!("gen-{}", uuid::Uuid::new_v4()),
                    format!("Shadow Clone {}", index + 1),
                    stats,
                    element,
                )
            })
            .collect()
    }

    /// Applies a finished match to the ladder.
    ///
    /// # Arguments
    /// * `outcome` - Result from the ladder player's point of view.
    /// * `flips` - Captures the ladder player made during the match.
    /// * `board_card_count` - Cells the ladder player owned at the end.
    ///
    /// # Returns
    /// What changed: score only, a boss armed, a promotion, the run ending, or nothing when no
    /// run is active.
    pub fn process_match_result(&mut self, outcome: MatchOutcome, flips: u32, board_card_count: u32) -> Progress {
        if !self.state.is_active {
            return Progress::Ignored;
        }
        self.state.total_flips += flips;

        if self.state.is_boss_battle {
            return self.process_boss_result(outcome);
        }

        match outcome {
            MatchOutcome::Draw => {
                self.state.round += 1;
                Progress::Continued {
                    score: self.state.score,
                }
            }
            MatchOutcome::Loss => {
                let penalty = self.state.rank.loss_penalty();
                self.state.score = (self.state.score - penalty).max(0);
                self.end_run()
            }
            MatchOutcome::Win => {
                self.state.score += WIN_BASE_POINTS + board_card_count as i64 * BOARD_CARD_BONUS;
                self.record_win();

                if let Some(crossed) = self.crossed_rank() {
                    let boss = self
                        .boss(self.state.rank)
                        .map(|boss| boss.name.clone())
                        .unwrap_or_default();
                    self.state.is_boss_battle = true;
                    self.state.pending_rank = Some(crossed);
                    self.state.last_boss = Some(boss.clone());
                    logger!(
                        INFO,
                        "[GAUNTLET] Score {} reached {crossed}, boss `{boss}` awaits",
                        self.state.score
                    );
                    return Progress::BossArmed {
                        pending_rank: crossed,
                        boss,
                    };
                }

                self.state.opponent_name = self.fresh_opponent_name();
                Progress::Continued {
                    score: self.state.score,
                }
            }
        }
    }

    fn process_boss_result(&mut self, outcome: MatchOutcome) -> Progress {
        match outcome {
            MatchOutcome::Win => {
                let rank = self.state.pending_rank.take().unwrap_or(self.state.rank);
                self.state.rank = rank;
                self.state.is_boss_battle = false;
                self.record_win();
                self.state.opponent_name = self.fresh_opponent_name();
                logger!(INFO, "[GAUNTLET] Boss defeated, promoted to {rank}");
                Progress::RankedUp { rank }
            }
            MatchOutcome::Draw => self.end_run(),
            MatchOutcome::Loss => {
                self.state.score = (self.state.score as f64 * BOSS_LOSS_MULTIPLIER).floor() as i64;
                self.end_run()
            }
        }
    }

    fn record_win(&mut self) {
        self.state.round += 1;
        self.state.wins += 1;
        if self.state.wins % REWARD_EVERY_WINS == 0 {
            self.state.pending_reward = true;
        }
    }

    fn end_run(&mut self) -> Progress {
        self.state.is_active = false;
        self.state.is_boss_battle = false;
        self.state.pending_rank = None;
        logger!(INFO, "[GAUNTLET] Run over with score {}", self.state.score);
        Progress::RunEnded {
            final_score: self.state.score,
        }
    }

    /// Highest rank above the current one whose threshold the score has reached.
    fn crossed_rank(&self) -> Option<Rank> {
        Rank::ALL
            .iter()
            .rev()
            .take_while(|rank| **rank > self.state.rank)
            .find(|rank| self.state.score >= rank.threshold())
            .copied()
    }

    /// Cards offered when a reward is pending, drawn from the current rank's band.
    pub fn reward_options(&mut self, pool: &[Card]) -> Vec<Card> {
        if !self.state.pending_reward {
            return Vec::new();
        }
        let owned: Vec<&str> = self.state.deck.iter().map(|card| card.id.as_str()).collect();
        let candidates: Vec<&Card> = Self::in_band(self.state.rank, pool)
            .into_iter()
            .filter(|card| !owned.contains(&card.id.as_str()))
            .collect();
        candidates
            .choose_multiple(&mut self.rng, REWARD_OPTIONS)
            .map(|card| card.dealt())
            .collect()
    }

    /// Clears the pending reward. `Some((card, slot))` swaps `card` into that deck slot.
    pub fn consume_reward(&mut self, choice: Option<(Card, usize)>) -> bool {
        if !self.state.pending_reward {
            return false;
        }
        if let Some((card, slot)) = choice {
            match self.state.deck.get_mut(slot) {
                Some(existing) => *existing = card.dealt(),
                None => return false,
            }
        }
        self.state.pending_reward = false;
        true
    }

    /// Builds the next match: the ladder player in seat 1, the generated opponent in seat 2.
    pub fn match_setup(&mut self, player: Player, config: &OpponentConfig) -> GameSetup {
        let first = if self.rng.gen_bool(0.5) {
            Seat::Player1
        } else {
            Seat::Player2
        };
        GameSetup {
            room_id: format!("gauntlet-{}", self.state.round + 1),
            player1: player.with_hand(self.state.deck.clone()),
            player2: Player::new("gauntlet-opponent", config.name.clone(), "red")
                .computer()
                .with_hand(config.deck.clone()),
            first,
            mechanic: config.mechanic,
        }
    }

    /// Pays out a finished run once: `score / 10` coins and the score as rank points.
    ///
    /// # Returns
    /// * `Ok(i64)` - Coins credited, `0` while the run is active or already settled.
    /// * `Err(GauntletError)` - The balance update failed; the run stays unsettled.
    pub async fn settle_run<S: MatchStore>(&mut self, store: &S, user_id: &str) -> Result<i64, GauntletError> {
        if self.state.is_active || self.state.settled {
            return Ok(0);
        }
        let coins = self.state.score / COINS_PER_SCORE;
        store.adjust_balance(user_id, coins, self.state.score).await?;
        self.state.settled = true;
        logger!(INFO, "[GAUNTLET] `{user_id}` earned {coins} coins");
        Ok(coins)
    }

    pub fn save(&self, path: &Path) -> Result<(), GauntletError> {
        let json = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, GauntletError> {
        let json = std::fs::read_to_string(path)?;
        let state: GauntletState = serde_json::from_str(&json)?;
        Ok(Self::with_rng(state, ChaCha8Rng::from_entropy()))
    }
}

impl Default for GauntletEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::starter_catalog;
    use crate::models::profile::Profile;
    use crate::online::memory::MemoryBackend;

    fn running() -> GauntletEngine {
        let mut engine = GauntletEngine::seeded(12);
        engine.start_run(starter_catalog()[0..5].to_vec()).unwrap();
        engine
    }

    #[test]
    fn test_start_run_needs_five_cards() {
        let mut engine = GauntletEngine::seeded(1);
        assert!(matches!(
            engine.start_run(starter_catalog()[0..4].to_vec()),
            Err(GauntletError::InvalidDeck(4))
        ));
        assert!(!engine.state().is_active);
    }

    #[test]
    fn test_normal_win_adds_base_and_board_bonus() {
        let mut engine = running();
        let progress = engine.process_match_result(MatchOutcome::Win, 3, 6);
        assert_eq!(progress, Progress::Continued { score: 160 });
        assert_eq!(engine.state().wins, 1);
        assert_eq!(engine.state().round, 1);
        assert_eq!(engine.state().total_flips, 3);
    }

    #[test]
    fn test_rank_up_is_deferred_to_boss_win() {
        let mut engine = running();
        engine.process_match_result(MatchOutcome::Win, 0, 5); // 150
        let progress = engine.process_match_result(MatchOutcome::Win, 0, 5); // 300
        assert_eq!(
            progress,
            Progress::BossArmed {
                pending_rank: Rank::Chunin,
                boss: "Bridge Mercenary".to_string()
            }
        );
        let state = engine.state();
        assert_eq!(state.rank, Rank::Genin);
        assert!(state.is_boss_battle);
        assert_eq!(state.pending_rank, Some(Rank::Chunin));
        assert_eq!(state.last_boss.as_deref(), Some("Bridge Mercenary"));

        let config = engine.get_opponent_config(&starter_catalog());
        assert!(config.is_boss);
        assert_eq!(config.name, "Bridge Mercenary");

        let progress = engine.process_match_result(MatchOutcome::Win, 0, 5);
        assert_eq!(progress, Progress::RankedUp { rank: Rank::Chunin });
        assert_eq!(engine.state().rank, Rank::Chunin);
        assert!(!engine.state().is_boss_battle);
        assert!(engine.state().pending_rank.is_none());
        // third win arms the reward
        assert!(engine.state().pending_reward);
    }

    #[test]
    fn test_large_jump_lands_on_highest_tier() {
        let mut engine = running();
        engine.state.score = 2000;
        let progress = engine.process_match_result(MatchOutcome::Win, 0, 9);
        // 2000 + 190 = 2190: Anbu (1500) is the highest reached, not Chunin
        assert!(matches!(progress, Progress::BossArmed { pending_rank: Rank::Anbu, .. }));
    }

    #[test]
    fn test_boss_loss_halves_score_and_ends_run() {
        let mut engine = running();
        engine.state.score = 301;
        engine.state.is_boss_battle = true;
        engine.state.pending_rank = Some(Rank::Chunin);

        let progress = engine.process_match_result(MatchOutcome::Loss, 0, 2);
        assert_eq!(progress, Progress::RunEnded { final_score: 150 });
        assert!(!engine.state().is_active);
        assert_eq!(engine.state().rank, Rank::Genin);
    }

    #[test]
    fn test_boss_draw_ends_run_without_penalty() {
        let mut engine = running();
        engine.state.score = 320;
        engine.state.is_boss_battle = true;
        engine.state.pending_rank = Some(Rank::Chunin);

        let progress = engine.process_match_result(MatchOutcome::Draw, 0, 4);
        assert_eq!(progress, Progress::RunEnded { final_score: 320 });
        assert!(!engine.state().is_active);
    }

    #[test]
    fn test_normal_loss_is_flat_and_floored() {
        let mut engine = running();
        engine.state.score = 10;
        let progress = engine.process_match_result(MatchOutcome::Loss, 0, 3);
        assert_eq!(progress, Progress::RunEnded { final_score: 0 });
        assert!(!engine.state().is_active);

        assert_eq!(engine.process_match_result(MatchOutcome::Win, 0, 9), Progress::Ignored);
    }

    #[test]
    fn test_normal_draw_changes_nothing() {
        let mut engine = running();
        engine.state.score = 120;
        let progress = engine.process_match_result(MatchOutcome::Draw, 1, 4);
        assert_eq!(progress, Progress::Continued { score: 120 });
        assert!(engine.state().is_active);
        assert_eq!(engine.state().wins, 0);
    }

    #[test]
    fn test_opponent_deck_respects_band() {
        let mut engine = running();
        let pool = starter_catalog();
        let config = engine.get_opponent_config(&pool);
        let (min, max) = Rank::Genin.cp_band();
        assert_eq!(config.deck.len(), HAND_SIZE);
        assert!(config.deck.iter().all(|c| (min..=max).contains(&c.power())));
        assert_eq!(config.mechanic.kind, MechanicType::None);
        assert!(!config.is_boss);
    }

    #[test]
    fn test_synthetic_deck_when_pool_is_thin() {
        let mut engine = running();
        engine.state.rank = Rank::Kage;
        let config = engine.get_opponent_config(&[]);
        assert_eq!(config.deck.len(), HAND_SIZE);
        for card in &config.deck {
            assert!(card.id.starts_with("gen-"));
            let stats = card.base_stats;
            assert!([stats.top, stats.right, stats.bottom, stats.left]
                .iter()
                .all(|s| (1..=Rank::Kage.max_stat()).contains(s)));
        }
    }

    #[test]
    fn test_mechanics_are_rank_gated() {
        let mut engine = running();
        engine.state.rank = Rank::Anbu;
        for _ in 0..10 {
            let config = engine.get_opponent_config(&[]);
            assert_eq!(config.mechanic.kind, MechanicType::RandomElemental);
            assert!(config.mechanic.active_element.is_some());
        }

        engine.state.rank = Rank::Rikudo;
        let kinds: std::collections::HashSet<MechanicType> =
            (0..80).map(|_| engine.get_opponent_config(&[]).mechanic.kind).collect();
        assert_eq!(kinds.len(), 4);
    }

    #[test]
    fn test_reward_swap() {
        let mut engine = running();
        let pool = starter_catalog();
        assert!(engine.reward_options(&pool).is_empty());
        assert!(!engine.consume_reward(None));

        engine.state.pending_reward = true;
        let options = engine.reward_options(&pool);
        assert!(!options.is_empty() && options.len() <= REWARD_OPTIONS);
        let owned: Vec<String> = engine.state().deck.iter().map(|c| c.id.clone()).collect();
        assert!(options.iter().all(|c| !owned.contains(&c.id)));

        let pick = options[0].clone();
        assert!(engine.consume_reward(Some((pick.clone(), 2))));
        assert_eq!(engine.state().deck[2].id, pick.id);
        assert!(!engine.state().pending_reward);
    }

    #[test]
    fn test_boss_deck_override() {
        let mut engine = running();
        let cards = starter_catalog()[10..15].to_vec();
        engine.apply_boss_decks(vec![
            BossDeckRow {
                rank: Rank::Genin,
                name: "Custom Boss".to_string(),
                cards: cards.clone(),
                mechanic: MechanicType::Joker,
            },
            BossDeckRow {
                rank: Rank::Chunin,
                name: "Broken Boss".to_string(),
                cards: cards[0..2].to_vec(),
                mechanic: MechanicType::None,
            },
        ]);
        assert_eq!(engine.boss(Rank::Genin).unwrap().name, "Custom Boss");
        assert_eq!(engine.boss(Rank::Chunin).unwrap().name, "Sand Gourd Jailer");
    }

    #[tokio::test]
    async fn test_refresh_bosses_from_store() {
        let backend = MemoryBackend::new();
        backend
            .set_boss_decks(vec![BossDeckRow {
                rank: Rank::Jounin,
                name: "Mist Swordsman".to_string(),
                cards: starter_catalog()[10..15].to_vec(),
                mechanic: MechanicType::Chaos,
            }])
            .await;

        let mut engine = running();
        engine.refresh_bosses(&backend).await;
        assert_eq!(engine.boss(Rank::Jounin).unwrap().name, "Mist Swordsman");
        assert_eq!(engine.boss(Rank::Genin).unwrap().name, "Bridge Mercenary");
    }

    #[test]
    fn test_match_setup_seats_player_first() {
        let mut engine = running();
        let config = engine.get_opponent_config(&starter_catalog());
        let setup = engine.match_setup(Player::new("me", "Me", "blue"), &config);
        assert_eq!(setup.player1.hand, engine.state().deck);
        assert!(setup.player2.is_computer);
        assert_eq!(setup.player2.hand.len(), HAND_SIZE);
    }

    #[test]
    fn test_save_and_load() {
        let engine = running();
        let path = std::env::temp_dir().join(format!("gauntlet-{}.json", uuid::Uuid::new_v4()));
        engine.save(&path).unwrap();
        let loaded = GauntletEngine::load(&path).unwrap();
        assert_eq!(loaded.state(), engine.state());
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_settle_run_pays_once() {
        let backend = MemoryBackend::new();
        backend
            .add_profile(Profile {
                id: "me".to_string(),
                ..Profile::default()
            })
            .await;

        let mut engine = running();
        assert_eq!(engine.settle_run(&backend, "me").await.unwrap(), 0);

        engine.state.score = 455;
        engine.abandon_run();
        assert_eq!(engine.settle_run(&backend, "me").await.unwrap(), 45);
        assert_eq!(engine.settle_run(&backend, "me").await.unwrap(), 0);

        let profile = backend.profile("me").await.unwrap();
        assert_eq!(profile.coins, 45);
        assert_eq!(profile.rank_points, 455);
    }
}
