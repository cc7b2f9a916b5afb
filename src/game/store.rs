use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{watch, RwLock};

use super::game_state::{GameState, LastMove, Phase, Player, HAND_SIZE};
use super::mechanics::Mechanic;
use super::rules::{calculate_flips, create_empty_board, determine_winner, is_board_full, Flip, Winner};
use crate::logger;
use crate::models::board::{Placed, Seat};
use crate::online::snapshot::StateSnapshot;
use crate::utils::errors::Rejection;

/// Everything needed to start a match.
#[derive(Debug, Clone)]
pub struct GameSetup {
    pub room_id: String,
    pub player1: Player,
    pub player2: Player,
    pub first: Seat,
    pub mechanic: Mechanic,
}

/// Every way the game state can change. Human input, the computer opponent and the online
/// session all go through [`GameStore::dispatch`] with one of these.
#[derive(Debug, Clone)]
pub enum GameCommand {
    InitGame(GameSetup),
    SelectCard { card_id: String },
    PlaceCard { row: usize, col: usize },
    ResetGame,
    /// Online match accepted: `lobby` to `preparing` until the seeded state arrives.
    PrepareOnline,
    /// Full overwrite with a replicated snapshot.
    ApplySnapshot(StateSnapshot),
    /// Cosmetic display-name fix-up; `None` keeps the current name.
    PatchNames {
        player1: Option<String>,
        player2: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub row: usize,
    pub col: usize,
    pub mover: Seat,
    pub flips: Vec<Flip>,
    pub finished: Option<Winner>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Initialized,
    Selected,
    Placed(Placement),
    Reset,
    Preparing,
    Synced,
    Renamed,
}

pub struct GameStore {
    state: GameState,
    rng: ChaCha8Rng,
}

impl GameStore {
    pub fn new() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            state: GameState::lobby(),
            rng,
        }
    }

    /// Names the room before any match is initialized, so replicated snapshots land in it.
    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.state.room_id = room_id.into();
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// The only mutation path. A rejected command leaves the state exactly as it was.
    pub fn dispatch(&mut self, command: GameCommand) -> Result<Applied, Rejection> {
        let result = match command {
            GameCommand::InitGame(setup) => self.init_game(setup).map(|_| Applied::Initialized),
            GameCommand::SelectCard { card_id } => {
                self.select_card(card_id).map(|_| Applied::Selected)
            }
            GameCommand::PlaceCard { row, col } => self.place_card(row, col).map(Applied::Placed),
            GameCommand::ResetGame => {
                self.reset_game();
                Ok(Applied::Reset)
            }
            GameCommand::PrepareOnline => self.prepare_online().map(|_| Applied::Preparing),
            GameCommand::ApplySnapshot(snapshot) => {
                self.apply_snapshot(snapshot).map(|_| Applied::Synced)
            }
            GameCommand::PatchNames { player1, player2 } => {
                if let Some(name) = player1 {
                    self.state.player1.name = name;
                }
                if let Some(name) = player2 {
                    self.state.player2.name = name;
                }
                Ok(Applied::Renamed)
            }
        };

        if let Err(rejection) = &result {
            logger!(DEBUG, "[STORE] Ignored command ({rejection})");
        }
        result
    }

    fn init_game(&mut self, setup: GameSetup) -> Result<(), Rejection> {
        for player in [&setup.player1, &setup.player2] {
            if player.hand.len() != HAND_SIZE {
                return Err(Rejection::InvalidSetup(format!(
                    "`{}` holds {} cards",
                    player.id,
                    player.hand.len()
                )));
            }
        }

        let deal = |player: Player| -> Player {
            let hand = player.hand.iter().map(|card| card.dealt()).collect();
            Player {
                hand,
                captured_count: 0,
                total_flips: 0,
                ..player
            }
        };

        let mut board = create_empty_board();
        let mut mechanic = setup.mechanic;
        mechanic.prepare(&mut board, &mut self.rng);

        self.state = GameState {
            room_id: setup.room_id,
            board,
            player1: deal(setup.player1),
            player2: deal(setup.player2),
            current_player: setup.first,
            phase: Phase::Playing,
            winner: None,
            last_move: None,
            mechanic,
            move_sequence: 0,
            selected_card: None,
        };

        logger!(
            INFO,
            "[STORE] Match `{}` started, `{}` moves first",
            self.state.room_id,
            self.state.current().name
        );
        Ok(())
    }

    fn select_card(&mut self, card_id: String) -> Result<(), Rejection> {
        if self.state.phase != Phase::Playing {
            return Err(Rejection::WrongPhase(self.state.phase.to_string()));
        }
        if !self.state.current().holds(&card_id) {
            return Err(Rejection::CardNotInHand(card_id));
        }

        self.state.selected_card = Some(card_id);
        Ok(())
    }

    fn place_card(&mut self, row: usize, col: usize) -> Result<Placement, Rejection> {
        if self.state.phase != Phase::Playing {
            return Err(Rejection::WrongPhase(self.state.phase.to_string()));
        }
        let card_id = self
            .state
            .selected_card
            .clone()
            .ok_or(Rejection::NoCardSelected)?;
        let cell = self
            .state
            .board
            .cell(row, col)
            .ok_or(Rejection::OutOfBounds(row, col))?;
        if !cell.is_empty() {
            return Err(Rejection::CellOccupied(row, col));
        }
        let cell_element = cell.element;

        let mover = self.state.current_player;
        let index = self
            .state
            .player(mover)
            .hand
            .iter()
            .position(|card| card.id == card_id)
            .ok_or_else(|| Rejection::CardNotInHand(card_id.clone()))?;

        // Nothing below can fail.
        let mut card = self.state.player_mut(mover).hand.remove(index);
        self.state
            .mechanic
            .apply(&mut card, cell_element, mover, &mut self.rng);

        let flips = calculate_flips(&self.state.board, row, col, &card, mover);
        if let Some(cell) = self.state.board.cell_mut(row, col) {
            cell.placed = Some(Placed { card, owner: mover });
        }
        for flip in &flips {
            if let Some(placed) = self
                .state
                .board
                .cell_mut(flip.row, flip.col)
                .and_then(|cell| cell.placed.as_mut())
            {
                placed.owner = flip.new_owner;
            }
        }

        self.state.player_mut(mover).total_flips += flips.len();
        for seat in [Seat::Player1, Seat::Player2] {
            let owned = self.state.board.owned_by(seat);
            self.state.player_mut(seat).captured_count = owned;
        }

        self.state.current_player = mover.opponent();
        self.state.last_move = Some(LastMove {
            row,
            col,
            player_id: self.state.player(mover).id.clone(),
            at: Utc::now(),
        });
        self.state.move_sequence += 1;
        self.state.selected_card = None;

        let mut finished = None;
        if is_board_full(&self.state.board) {
            let winner = determine_winner(
                &self.state.board,
                self.state.player1.hand.len(),
                self.state.player2.hand.len(),
            );
            self.state.phase = Phase::GameOver;
            self.state.winner = Some(winner);
            finished = Some(winner);
            logger!(INFO, "[STORE] Match `{}` over: {winner:?}", self.state.room_id);
        }

        Ok(Placement {
            row,
            col,
            mover,
            flips,
            finished,
        })
    }

    fn reset_game(&mut self) {
        self.state.board = create_empty_board();
        self.state.phase = Phase::Lobby;
        self.state.winner = None;
        self.state.last_move = None;
        self.state.selected_card = None;
        self.state.move_sequence = 0;
        self.state.mechanic = Mechanic::plain();
    }

    fn prepare_online(&mut self) -> Result<(), Rejection> {
        if self.state.phase != Phase::Lobby {
            return Err(Rejection::WrongPhase(self.state.phase.to_string()));
        }
        self.state.phase = Phase::Preparing;
        Ok(())
    }

    fn apply_snapshot(&mut self, snapshot: StateSnapshot) -> Result<(), Rejection> {
        let mut state = snapshot
            .into_state(&self.state.room_id)
            .map_err(Rejection::InvalidSetup)?;

        // Local selection survives only if it is still playable.
        state.selected_card = self
            .state
            .selected_card
            .take()
            .filter(|id| state.phase == Phase::Playing && state.current().holds(id));
        self.state = state;
        Ok(())
    }
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared, observable access to one [`GameStore`].
///
/// Every successful command bumps a version number on a `watch` channel so the UI, the
/// computer opponent and the online session can react to changes.
#[derive(Clone)]
pub struct GameHandle {
    store: Arc<RwLock<GameStore>>,
    version: Arc<watch::Sender<u64>>,
}

impl GameHandle {
    pub fn new(store: GameStore) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            store: Arc::new(RwLock::new(store)),
            version: Arc::new(version),
        }
    }

    pub async fn dispatch(&self, command: GameCommand) -> Result<Applied, Rejection> {
        let mut store = self.store.write().await;
        let applied = store.dispatch(command)?;
        drop(store);
        self.version.send_modify(|version| *version += 1);
        Ok(applied)
    }

    pub async fn snapshot(&self) -> GameState {
        self.store.read().await.state().clone()
    }

    /// Runs `read` against the current state without cloning it.
    pub async fn inspect<T>(&self, read: impl FnOnce(&GameState) -> T) -> T {
        read(self.store.read().await.state())
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub async fn init_game(&self, setup: GameSetup) -> Result<Applied, Rejection> {
        self.dispatch(GameCommand::InitGame(setup)).await
    }

    pub async fn select_card(&self, card_id: &str) -> Result<Applied, Rejection> {
        self.dispatch(GameCommand::SelectCard {
            card_id: card_id.to_string(),
        })
        .await
    }

    pub async fn place_card(&self, row: usize, col: usize) -> Result<Applied, Rejection> {
        self.dispatch(GameCommand::PlaceCard { row, col }).await
    }

    pub async fn reset_game(&self) -> Result<Applied, Rejection> {
        self.dispatch(GameCommand::ResetGame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::card::{Card, CardStats, Element};
    use proptest::prelude::*;

    fn hand(prefix: &str, stats: CardStats) -> Vec<Card> {
        (0..HAND_SIZE)
            .map(|i| Card::new(format!("{prefix}{i}"), format!("{prefix}{i}"), stats, Element::None))
            .collect()
    }

    fn setup(first: Seat) -> GameSetup {
        GameSetup {
            room_id: "room".to_string(),
            player1: Player::new("p1", "One", "blue").with_hand(hand("a", CardStats::new(5, 5, 5, 5))),
            player2: Player::new("p2", "Two", "red").with_hand(hand("b", CardStats::new(5, 5, 5, 5))),
            first,
            mechanic: Mechanic::plain(),
        }
    }

    fn started(first: Seat) -> GameStore {
        let mut store = GameStore::seeded(42);
        store.dispatch(GameCommand::InitGame(setup(first))).unwrap();
        store
    }

    fn play(store: &mut GameStore, card_id: &str, row: usize, col: usize) -> Result<Applied, Rejection> {
        store.dispatch(GameCommand::SelectCard {
            card_id: card_id.to_string(),
        })?;
        store.dispatch(GameCommand::PlaceCard { row, col })
    }

    #[test]
    fn test_init_game_starts_playing() {
        let store = started(Seat::Player2);
        let state = store.state();
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.current_player, Seat::Player2);
        assert_eq!(state.cards_in_play(), 10);
        assert!(state.winner().is_none());
    }

    #[test]
    fn test_init_rejects_short_hand() {
        let mut store = GameStore::seeded(1);
        let mut bad = setup(Seat::Player1);
        bad.player2.hand.pop();
        let result = store.dispatch(GameCommand::InitGame(bad));
        assert!(matches!(result, Err(Rejection::InvalidSetup(_))));
        assert_eq!(store.state().phase, Phase::Lobby);
    }

    #[test]
    fn test_prepare_online_only_from_lobby() {
        let mut store = GameStore::seeded(2);
        assert_eq!(store.dispatch(GameCommand::PrepareOnline), Ok(Applied::Preparing));
        assert_eq!(store.state().phase, Phase::Preparing);
        assert!(store.state().awaiting_start());

        let result = store.dispatch(GameCommand::PrepareOnline);
        assert!(matches!(result, Err(Rejection::WrongPhase(_))));

        store.dispatch(GameCommand::InitGame(setup(Seat::Player1))).unwrap();
        assert_eq!(store.state().phase, Phase::Playing);
        assert!(!store.state().awaiting_start());
    }

    #[test]
    fn test_select_only_current_players_card() {
        let mut store = started(Seat::Player1);
        let result = store.dispatch(GameCommand::SelectCard {
            card_id: "b0".to_string(),
        });
        assert_eq!(result, Err(Rejection::CardNotInHand("b0".to_string())));
        assert!(store.state().selected_card().is_none());

        store
            .dispatch(GameCommand::SelectCard {
                card_id: "a0".to_string(),
            })
            .unwrap();
        assert_eq!(store.state().selected_card(), Some("a0"));
    }

    #[test]
    fn test_placement_alternates_turns_and_flips() {
        let mut store = GameStore::seeded(3);
        let mut game = setup(Seat::Player1);
        game.player2.hand[0] = Card::new("strong", "strong", CardStats::new(9, 9, 9, 9), Element::None);
        store.dispatch(GameCommand::InitGame(game)).unwrap();

        play(&mut store, "a0", 1, 1).unwrap();
        assert_eq!(store.state().current_player, Seat::Player2);
        assert_eq!(store.state().move_sequence, 1);
        assert_eq!(store.state().last_move.as_ref().map(|m| (m.row, m.col)), Some((1, 1)));

        let applied = play(&mut store, "strong", 1, 2).unwrap();
        let Applied::Placed(placement) = applied else {
            panic!("expected placement");
        };
        assert_eq!(placement.flips.len(), 1);
        assert_eq!(store.state().board.cell(1, 1).unwrap().owner(), Some(Seat::Player2));
        assert_eq!(store.state().player2.total_flips, 1);
        assert_eq!(store.state().player2.captured_count, 2);
        assert_eq!(store.state().current_player, Seat::Player1);
    }

    #[test]
    fn test_illegal_placements_leave_state_untouched() {
        let mut store = started(Seat::Player1);

        // no selection
        let before = store.state().clone();
        assert_eq!(
            store.dispatch(GameCommand::PlaceCard { row: 0, col: 0 }),
            Err(Rejection::NoCardSelected)
        );
        assert_eq!(store.state(), &before);

        // occupied cell
        play(&mut store, "a0", 0, 0).unwrap();
        store
            .dispatch(GameCommand::SelectCard {
                card_id: "b0".to_string(),
            })
            .unwrap();
        let before = store.state().clone();
        assert_eq!(
            store.dispatch(GameCommand::PlaceCard { row: 0, col: 0 }),
            Err(Rejection::CellOccupied(0, 0))
        );
        assert_eq!(store.state(), &before);

        // out of bounds
        assert_eq!(
            store.dispatch(GameCommand::PlaceCard { row: 3, col: 0 }),
            Err(Rejection::OutOfBounds(3, 0))
        );
        assert_eq!(store.state(), &before);

        // wrong phase
        store.dispatch(GameCommand::ResetGame).unwrap();
        let before = store.state().clone();
        assert!(matches!(
            store.dispatch(GameCommand::PlaceCard { row: 1, col: 1 }),
            Err(Rejection::WrongPhase(_))
        ));
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_full_game_to_draw() {
        // Equal stats never flip, so ownership follows placement: p1 places 5, p2 places 4
        // and keeps one card in hand. 5 vs 4 + 1.
        let mut store = started(Seat::Player1);
        let cells: Vec<(usize, usize)> = (0..9).map(|i| (i / 3, i % 3)).collect();
        let mut a = 0;
        let mut b = 0;
        for (turn, (row, col)) in cells.into_iter().enumerate() {
            if turn % 2 == 0 {
                play(&mut store, &format!("a{a}"), row, col).unwrap();
                a += 1;
            } else {
                play(&mut store, &format!("b{b}"), row, col).unwrap();
                b += 1;
            }
        }

        let state = store.state();
        assert_eq!(state.phase, Phase::GameOver);
        assert_eq!(state.winner(), Some(Winner::Draw));
        assert_eq!(state.player2.hand.len(), 1);
        assert_eq!(state.cards_in_play(), 10);
    }

    #[test]
    fn test_reset_returns_to_lobby() {
        let mut store = started(Seat::Player1);
        play(&mut store, "a0", 0, 0).unwrap();
        store.dispatch(GameCommand::ResetGame).unwrap();
        let state = store.state();
        assert_eq!(state.phase, Phase::Lobby);
        assert_eq!(state.board.occupied(), 0);
        assert!(state.winner().is_none());
    }

    #[test]
    fn test_patch_names() {
        let mut store = started(Seat::Player1);
        store
            .dispatch(GameCommand::PatchNames {
                player1: None,
                player2: Some("Itachi".to_string()),
            })
            .unwrap();
        assert_eq!(store.state().player1.name, "One");
        assert_eq!(store.state().player2.name, "Itachi");
    }

    #[tokio::test]
    async fn test_handle_notifies_on_change_only() {
        let handle = GameHandle::new(GameStore::seeded(9));
        let mut changes = handle.subscribe();

        handle.init_game(setup(Seat::Player1)).await.unwrap();
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        assert!(handle.place_card(0, 0).await.is_err());
        assert!(!changes.has_changed().unwrap());

        handle.select_card("a1").await.unwrap();
        handle.place_card(2, 2).await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert!(handle.inspect(|state| state.is_turn_of("p2")).await);
    }

    proptest! {
        #[test]
        fn prop_cards_are_conserved(moves in proptest::collection::vec((0usize..5, 0usize..3, 0usize..3), 0..40), seed in any::<u64>()) {
            let mut store = GameStore::seeded(seed);
            let mut game = setup(Seat::Player1);
            game.player1.hand = (0..5).map(|i| Card::new(format!("a{i}"), "a", CardStats::new(i as u8 + 1, 5, 10 - i as u8, 3), Element::Fire)).collect();
            game.mechanic = Mechanic { kind: crate::game::mechanics::MechanicType::Chaos, active_element: None, joker: None };
            store.dispatch(GameCommand::InitGame(game)).unwrap();

            for (pick, row, col) in moves {
                let hand = &store.state().current().hand;
                if let Some(card) = hand.get(pick % hand.len().max(1)).map(|c| c.id.clone()) {
                    let _ = play(&mut store, &card, row, col);
                }
                let state = store.state();
                prop_assert_eq!(state.cards_in_play(), 10);
                prop_assert_eq!(state.winner().is_some(), state.phase == Phase::GameOver);
            }
        }
    }
}
