//! Peer-replicated online match.
//!
//! There is no game server. Both clients hold their own [`GameStore`](crate::game::store::GameStore)
//! and meet in one shared match record: after every local move the mover overwrites the
//! record's `state` with a full snapshot, and each client applies any snapshot whose checksum
//! differs from the last one it pushed or applied. Change notifications give latency, polling
//! covers missed notifications, and both feed the same [`OnlineSession::ingest`] path.

use std::sync::Arc;

use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;

use super::backend::{ChannelEvent, MatchStore, Realtime, RowChange};
use super::decks::resolve_seed_deck;
use super::snapshot::StateSnapshot;
use crate::game::game_state::{GameState, Phase, Player};
use crate::game::mechanics::Mechanic;
use crate::game::store::{Applied, GameCommand, GameHandle, GameSetup};
use crate::logger;
use crate::models::board::Seat;
use crate::models::match_record::{MatchHistoryRow, MatchPatch, MatchRecord, MatchStatus};
use crate::models::presence::{match_channel, ReadyPresence};
use crate::models::settings::SyncSettings;
use crate::utils::checksum::Checksum;
use crate::utils::errors::{RealtimeError, Rejection, SyncError};

const PLACEHOLDER_NAMES: [&str; 2] = ["Player 1", "Player 2"];

/// Whichever id sorts first hosts. Both peers reach the same answer on their own.
pub fn elect_host<'a>(a: &'a str, b: &'a str) -> &'a str {
    if a <= b {
        a
    } else {
        b
    }
}

pub fn is_host(local_id: &str, opponent_id: &str) -> bool {
    elect_host(local_id, opponent_id) == local_id
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Live,
    OpponentDisconnected,
    Cancelled,
    Finished,
    Failed(String),
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Connecting | SessionStatus::Live)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedState {
    NotStarted,
    Seeding,
    Seeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    Playing,
    Archiving,
    Archived,
}

type HydratedNames = (Option<String>, Option<String>);

/// Plays a move for `user_id`, refusing it when it is not their turn on this client.
pub async fn play_as(
    game: &GameHandle,
    user_id: &str,
    card_id: &str,
    row: usize,
    col: usize,
) -> Result<Applied, Rejection> {
    if !game.inspect(|state| state.is_turn_of(user_id)).await {
        return Err(Rejection::NotPlayerTurn(user_id.to_string()));
    }
    game.select_card(card_id).await?;
    game.place_card(row, col).await
}

pub struct OnlineSession<S: MatchStore, R: Realtime> {
    match_id: String,
    user_id: String,
    opponent_id: String,
    player1_id: String,
    player2_id: String,
    host: bool,
    store: Arc<S>,
    realtime: Arc<R>,
    game: GameHandle,
    settings: SyncSettings,
    seed: SeedState,
    archive: ArchiveState,
    last_checksum: Option<Checksum>,
    synced_sequence: u64,
    store_failures: u32,
    hydration_started: bool,
    names: Option<HydratedNames>,
    names_tx: mpsc::Sender<HydratedNames>,
    names_rx: Option<mpsc::Receiver<HydratedNames>>,
    status: watch::Sender<SessionStatus>,
    rng: ChaCha8Rng,
}

impl<S: MatchStore, R: Realtime> OnlineSession<S, R> {
    /// Looks up the match row and works out this client's role in it.
    ///
    /// # Arguments
    /// * `game` - The local store the session replicates into; it should still be in the lobby.
    /// * `match_id` - Row id from matchmaking.
    /// * `user_id` - This client's user, which must be one of the two players.
    ///
    /// # Returns
    /// * `Ok(OnlineSession)` - Ready to `start` or `run`.
    /// * `Err(SyncError)` - The row is missing, belongs to other players, or was cancelled.
    pub async fn connect(
        store: Arc<S>,
        realtime: Arc<R>,
        game: GameHandle,
        match_id: &str,
        user_id: &str,
        settings: SyncSettings,
    ) -> Result<Self, SyncError> {
        let record = store
            .fetch_match(match_id)
            .await?
            .filter(|record| record.involves(user_id))
            .ok_or_else(|| SyncError::MatchNotFound(match_id.to_string()))?;
        if record.status == MatchStatus::Cancelled {
            return Err(SyncError::MatchCancelled(match_id.to_string()));
        }

        let host = record.player1_id == user_id;
        logger!(
            INFO,
            "[SYNC] `{user_id}` joins match `{match_id}` as {}",
            if host { "host" } else { "guest" }
        );

        let (names_tx, names_rx) = mpsc::channel(1);
        let (status, _) = watch::channel(SessionStatus::Connecting);
        Ok(Self {
            match_id: match_id.to_string(),
            user_id: user_id.to_string(),
            opponent_id: record.opponent_of(user_id).to_string(),
            player1_id: record.player1_id,
            player2_id: record.player2_id,
            host,
            store,
            realtime,
            game,
            settings,
            seed: SeedState::NotStarted,
            archive: ArchiveState::Playing,
            last_checksum: None,
            synced_sequence: 0,
            store_failures: 0,
            hydration_started: false,
            names: None,
            names_tx,
            names_rx: Some(names_rx),
            status,
            rng: ChaCha8Rng::from_entropy(),
        })
    }

    pub fn with_rng(mut self, rng: ChaCha8Rng) -> Self {
        self.rng = rng;
        self
    }

    pub fn is_host(&self) -> bool {
        self.host
    }

    pub fn seed_state(&self) -> SeedState {
        self.seed
    }

    pub fn archive_state(&self) -> ArchiveState {
        self.archive
    }

    pub fn game(&self) -> &GameHandle {
        &self.game
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Plays a move for this client's user. Moves for the opponent's seat are refused.
    pub async fn play(&self, card_id: &str, row: usize, col: usize) -> Result<Applied, Rejection> {
        play_as(&self.game, &self.user_id, card_id, row, col).await
    }

    async fn awaiting_start(&self) -> bool {
        self.game.inspect(GameState::awaiting_start).await
    }

    fn channel(&self) -> String {
        match_channel(&self.match_id)
    }

    /// Counts a failed store read or write. Once the budget of consecutive failures is spent
    /// the session fails instead of retrying forever.
    fn note_store_failure(&mut self, what: &str, error: impl std::fmt::Display) {
        self.store_failures += 1;
        let budget = self.settings.store_retry.attempts;
        logger!(
            WARN,
            "[SYNC] {what} for `{}` failed ({error}). Retrying... [{}/{budget}]",
            self.match_id,
            self.store_failures
        );
        if self.store_failures >= budget {
            let exhausted = SyncError::RetriesExhausted {
                what: format!("{what} for `{}`", self.match_id),
                attempts: budget,
            };
            logger!(ERROR, "[SYNC] {exhausted}");
            self.set_status(SessionStatus::Failed(exhausted.to_string()));
        }
    }

    fn note_store_success(&mut self) {
        self.store_failures = 0;
    }

    /// Reads the match row, retrying transient failures and a row that is not visible yet.
    async fn fetch_record(&self) -> Result<MatchRecord, SyncError> {
        let store = self.store.as_ref();
        let match_id = self.match_id.as_str();
        let label = format!("match `{match_id}`");
        self.settings
            .store_retry
            .run(&label, move |_| store.fetch_match(match_id))
            .await?
            .ok_or_else(|| SyncError::MatchNotFound(match_id.to_string()))
    }

    fn set_status(&self, status: SessionStatus) {
        self.status.send_if_modified(|current| {
            // terminal statuses stick
            if current.is_terminal() || *current == status {
                return false;
            }
            logger!(INFO, "[SYNC] Match `{}` is now {status:?}", self.match_id);
            *current = status;
            true
        });
    }

    async fn announce_ready(&self) -> Result<(), RealtimeError> {
        let presence = ReadyPresence {
            user_id: self.user_id.clone(),
            ready: true,
        };
        let payload = serde_json::to_value(presence)
            .map_err(|error| RealtimeError::InvalidPayload(error.to_string()))?;
        self.realtime
            .track(&self.channel(), &self.user_id, payload)
            .await
    }

    /// Announces presence, applies whatever the record already holds and, on the host, seeds
    /// the match if nobody did yet.
    ///
    /// # Returns
    /// * `Ok(())` - The session is live, or the host's seed write failed and is left to the
    ///   watchdog.
    /// * `Err(SyncError)` - The record could not be read within the retry budget, is gone, or
    ///   a deck is invalid.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        self.announce_ready().await?;
        if self.game.dispatch(GameCommand::PrepareOnline).await.is_ok() {
            logger!(DEBUG, "[SYNC] `{}` preparing match `{}`", self.user_id, self.match_id);
        }

        let record = self.fetch_record().await?;
        self.ingest(record).await;
        if self.status().is_terminal() {
            return Ok(());
        }

        if self.host && self.awaiting_start().await {
            self.seed_or_defer().await?;
        }
        Ok(())
    }

    /// Seeds, treating a failed store write as retryable by the watchdog. Deck problems stay
    /// terminal.
    async fn seed_or_defer(&mut self) -> Result<(), SyncError> {
        match self.seed_match().await {
            Err(SyncError::Store(error)) => {
                self.note_store_failure("seeding", error);
                Ok(())
            }
            other => other,
        }
    }

    /// Host only: builds the first game state and writes it to the record. A second call is a
    /// no-op.
    pub async fn seed_match(&mut self) -> Result<(), SyncError> {
        if !self.host || self.seed != SeedState::NotStarted {
            return Ok(());
        }
        self.seed = SeedState::Seeding;
        match self.write_initial_state().await {
            Ok(()) => {
                self.seed = SeedState::Seeded;
                self.set_status(SessionStatus::Live);
                Ok(())
            }
            Err(error) => {
                self.seed = SeedState::NotStarted;
                Err(error)
            }
        }
    }

    async fn write_initial_state(&mut self) -> Result<(), SyncError> {
        let record = self.fetch_record().await?;
        let retry = self.settings.deck_fetch;
        let embedded = |id: &str| record.config.decks.get(id).map(Vec::as_slice);

        let deck1 = resolve_seed_deck(
            self.store.as_ref(),
            &record.player1_id,
            embedded(&record.player1_id),
            &retry,
        )
        .await?;
        let deck2 = resolve_seed_deck(
            self.store.as_ref(),
            &record.player2_id,
            embedded(&record.player2_id),
            &retry,
        )
        .await?;

        let first = if self.rng.gen_bool(0.5) {
            Seat::Player1
        } else {
            Seat::Player2
        };
        self.game
            .init_game(GameSetup {
                room_id: self.match_id.clone(),
                player1: Player::new(&record.player1_id, PLACEHOLDER_NAMES[0], "blue").with_hand(deck1),
                player2: Player::new(&record.player2_id, PLACEHOLDER_NAMES[1], "red").with_hand(deck2),
                first,
                mechanic: Mechanic::plain(),
            })
            .await?;

        let snapshot = self.game.inspect(StateSnapshot::capture).await;
        let checksum = snapshot.checksum();
        let sequence = snapshot.move_sequence;
        let written = self
            .store
            .update_match(
                &self.match_id,
                MatchPatch {
                    status: Some(MatchStatus::Active),
                    state: Some(snapshot),
                    winner_id: None,
                },
            )
            .await;
        if let Err(error) = written {
            // back to preparing so the next attempt deals again
            let _ = self.game.reset_game().await;
            let _ = self.game.dispatch(GameCommand::PrepareOnline).await;
            return Err(error.into());
        }
        self.note_store_success();
        self.last_checksum = Some(checksum);
        self.synced_sequence = sequence;
        logger!(INFO, "[SYNC] Seeded match `{}`, {first} moves first", self.match_id);
        Ok(())
    }

    /// Applies a record read from the store or delivered by a change notification.
    pub async fn ingest(&mut self, record: MatchRecord) {
        if record.status == MatchStatus::Cancelled {
            self.set_status(SessionStatus::Cancelled);
            return;
        }
        let Some(snapshot) = record.state else {
            logger!(DEBUG, "[SYNC] Match `{}` not seeded yet", self.match_id);
            return;
        };

        let checksum = snapshot.checksum();
        if self.last_checksum != Some(checksum) {
            let sequence = snapshot.move_sequence;
            match self.game.dispatch(GameCommand::ApplySnapshot(snapshot)).await {
                Ok(_) => {
                    logger!(
                        DEBUG,
                        "[SYNC] Applied remote state #{sequence} ({checksum}) to `{}`",
                        self.match_id
                    );
                    self.last_checksum = Some(checksum);
                    self.synced_sequence = sequence;
                    self.reapply_names().await;
                }
                Err(rejection) => {
                    logger!(WARN, "[SYNC] Ignoring remote state of `{}` ({rejection})", self.match_id);
                    return;
                }
            }
        }

        if self.seed == SeedState::NotStarted {
            self.seed = SeedState::Seeded;
        }
        self.set_status(SessionStatus::Live);
        self.spawn_name_hydration().await;

        if record.status == MatchStatus::Completed && !self.host {
            self.set_status(SessionStatus::Finished);
        }
    }

    /// Reads the record once. A store error counts against the retry budget and is left to the
    /// next tick.
    pub async fn poll_once(&mut self) {
        match self.store.fetch_match(&self.match_id).await {
            Ok(Some(record)) => {
                self.note_store_success();
                self.ingest(record).await
            }
            Ok(None) => {
                self.note_store_success();
                self.record_gone().await
            }
            Err(error) => self.note_store_failure("poll", error),
        }
    }

    async fn record_gone(&mut self) {
        let over = self.game.inspect(|state| state.phase == Phase::GameOver).await;
        if over {
            // expected after the host archived the match
            self.set_status(SessionStatus::Finished);
        } else if self.seed == SeedState::Seeded {
            logger!(WARN, "[SYNC] Match `{}` vanished mid-game", self.match_id);
            self.set_status(SessionStatus::Cancelled);
        }
    }

    /// Pushes the local state when it changed since the last push or ingest.
    ///
    /// The guest only pushes its own moves; the host also pushes cosmetic changes.
    pub async fn push_local_state(&mut self) -> Result<bool, SyncError> {
        if self.host && self.seed != SeedState::Seeded {
            return Ok(false);
        }
        let snapshot = self.game.inspect(StateSnapshot::capture).await;
        if matches!(snapshot.phase, Phase::Lobby | Phase::Preparing) {
            return Ok(false);
        }
        let checksum = snapshot.checksum();
        if self.last_checksum == Some(checksum) {
            return Ok(false);
        }
        if !self.host && snapshot.move_sequence <= self.synced_sequence {
            return Ok(false);
        }

        let sequence = snapshot.move_sequence;
        self.store
            .update_match(&self.match_id, MatchPatch::state(snapshot))
            .await?;
        self.last_checksum = Some(checksum);
        self.synced_sequence = sequence;
        logger!(DEBUG, "[SYNC] Pushed state #{sequence} ({checksum}) to `{}`", self.match_id);
        Ok(true)
    }

    /// Host only: on game over, marks the record completed, appends the history row and
    /// deletes the live record after the grace period.
    pub async fn archive_if_finished(&mut self) -> Result<(), SyncError> {
        if !self.host || self.archive != ArchiveState::Playing {
            return Ok(());
        }
        let state = self.game.snapshot().await;
        if state.phase != Phase::GameOver {
            return Ok(());
        }

        self.archive = ArchiveState::Archiving;
        let winner_id = state.winner_id().map(str::to_string);
        let result = async {
            self.store
                .update_match(
                    &self.match_id,
                    MatchPatch {
                        status: Some(MatchStatus::Completed),
                        state: None,
                        winner_id: winner_id.clone(),
                    },
                )
                .await?;
            self.store
                .insert_history(MatchHistoryRow {
                    match_id: self.match_id.clone(),
                    player1_id: state.player1.id.clone(),
                    player2_id: state.player2.id.clone(),
                    winner_id: winner_id.clone(),
                    player1_cells: state.board.owned_by(Seat::Player1),
                    player2_cells: state.board.owned_by(Seat::Player2),
                    finished_at: Utc::now(),
                })
                .await
        }
        .await;

        if let Err(error) = result {
            self.archive = ArchiveState::Playing;
            return Err(error.into());
        }
        self.archive = ArchiveState::Archived;
        logger!(INFO, "[SYNC] Archived match `{}`, winner {winner_id:?}", self.match_id);

        let store = self.store.clone();
        let match_id = self.match_id.clone();
        let grace = self.settings.archive_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Err(error) = store.delete_match(&match_id).await {
                logger!(WARN, "[SYNC] Could not delete finished match `{match_id}` ({error})");
            }
        });

        self.set_status(SessionStatus::Finished);
        Ok(())
    }

    /// Re-announces missing presence and retries seeding on a host that never managed to.
    pub async fn watchdog_tick(&mut self) -> Result<(), SyncError> {
        let presence = self.realtime.presence(&self.channel()).await;
        if !presence.contains_key(&self.user_id) {
            logger!(DEBUG, "[SYNC] Presence of `{}` missing, tracking again", self.user_id);
            self.announce_ready().await?;
        }

        if self.host && self.seed == SeedState::NotStarted && self.awaiting_start().await {
            logger!(WARN, "[SYNC] Match `{}` still unseeded, seeding again", self.match_id);
            self.seed_or_defer().await?;
        }
        Ok(())
    }

    pub async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::PresenceLeave { key } if key == self.opponent_id => {
                // the opponent may have left right after their final move
                self.poll_once().await;
                if self.status().is_terminal() {
                    return;
                }
                let over = self.game.inspect(|state| state.phase == Phase::GameOver).await;
                if over {
                    return;
                }

                logger!(WARN, "[SYNC] `{key}` left match `{}`", self.match_id);
                self.set_status(SessionStatus::OpponentDisconnected);
                if let Err(error) = self
                    .store
                    .update_match(&self.match_id, MatchPatch::status(MatchStatus::Cancelled))
                    .await
                {
                    logger!(WARN, "[SYNC] Could not cancel `{}` ({error})", self.match_id);
                }
            }
            ChannelEvent::PresenceJoin { key } if key == self.opponent_id => {
                logger!(DEBUG, "[SYNC] `{key}` is present in `{}`", self.match_id);
            }
            _ => {}
        }
    }

    async fn handle_row_change(&mut self, change: RowChange) {
        match change {
            RowChange::MatchInserted(record) | RowChange::MatchUpdated(record) => {
                self.ingest(record).await
            }
            RowChange::MatchDeleted { .. } => self.record_gone().await,
        }
    }

    /// Pushes local state the record does not hold yet, then archives a finished match on the
    /// host. Runs after every local change and on every poll tick, so a failed write is tried
    /// again until it lands or the retry budget is spent.
    pub async fn flush(&mut self) {
        if self.status().is_terminal() {
            return;
        }
        match self.push_local_state().await {
            Ok(true) => self.note_store_success(),
            Ok(false) => {}
            Err(error) => {
                self.note_store_failure("state push", error);
                return;
            }
        }
        self.spawn_name_hydration().await;
        if let Err(error) = self.archive_if_finished().await {
            self.note_store_failure("archive", error);
            return;
        }

        let over = self.game.inspect(|state| state.phase == Phase::GameOver).await;
        if over && !self.host {
            self.set_status(SessionStatus::Finished);
        }
    }

    /// Fetches real display names in the background when the match still shows placeholders.
    async fn spawn_name_hydration(&mut self) {
        if self.hydration_started {
            return;
        }
        let placeholders = self
            .game
            .inspect(|state| {
                !state.awaiting_start()
                    && (state.player1.name == PLACEHOLDER_NAMES[0]
                        || state.player2.name == PLACEHOLDER_NAMES[1])
            })
            .await;
        if !placeholders {
            return;
        }
        self.hydration_started = true;

        let store = self.store.clone();
        let ids = [self.player1_id.clone(), self.player2_id.clone()];
        let names_tx = self.names_tx.clone();
        tokio::spawn(async move {
            let mut names: [Option<String>; 2] = [None, None];
            for (slot, id) in names.iter_mut().zip(ids.iter()) {
                match store.fetch_profile(id).await {
                    Ok(Some(profile)) if !profile.username.is_empty() => *slot = Some(profile.username),
                    Ok(_) => {}
                    Err(error) => logger!(DEBUG, "[SYNC] No display name for `{id}` ({error})"),
                }
            }
            let [player1, player2] = names;
            if player1.is_some() || player2.is_some() {
                let _ = names_tx.send((player1, player2)).await;
            }
        });
    }

    async fn apply_names(&mut self, names: HydratedNames) {
        self.names = Some(names);
        self.reapply_names().await;
    }

    /// Keeps hydrated names across snapshot overwrites that still carry placeholders.
    async fn reapply_names(&mut self) {
        let Some((player1, player2)) = self.names.clone() else {
            return;
        };
        let stale = self
            .game
            .inspect(|state| {
                player1.as_deref().is_some_and(|name| state.player1.name != name)
                    || player2.as_deref().is_some_and(|name| state.player2.name != name)
            })
            .await;
        if stale {
            let _ = self
                .game
                .dispatch(GameCommand::PatchNames { player1, player2 })
                .await;
        }
    }

    async fn teardown(&self) {
        if let Err(error) = self.realtime.untrack(&self.channel(), &self.user_id).await {
            logger!(WARN, "[SYNC] Could not leave `{}` ({error})", self.channel());
        }
    }

    /// Drives the session until it reaches a terminal status or `shutdown` flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<SessionStatus, SyncError> {
        let mut events = self.realtime.subscribe(&self.channel()).await;
        let mut rows = self.realtime.subscribe_matches().await;
        let mut changes = self.game.subscribe();
        let Some(mut names_rx) = self.names_rx.take() else {
            return Err(SyncError::MatchCancelled(self.match_id.clone()));
        };

        if let Err(error) = self.start().await {
            logger!(ERROR, "[SYNC] Match `{}` could not start ({error})", self.match_id);
            self.set_status(SessionStatus::Failed(error.to_string()));
            if self.host {
                let _ = self
                    .store
                    .update_match(&self.match_id, MatchPatch::status(MatchStatus::Cancelled))
                    .await;
            }
            self.teardown().await;
            return Err(error);
        }

        let mut poll = tokio::time::interval(self.settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchdog = tokio::time::interval(self.settings.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.status().is_terminal() {
            tokio::select! {
                _ = shutdown.changed() => {
                    logger!(INFO, "[SYNC] Leaving match `{}`", self.match_id);
                    self.set_status(SessionStatus::Cancelled);
                }
                _ = poll.tick() => {
                    self.poll_once().await;
                    self.flush().await;
                }
                _ = watchdog.tick() => {
                    if let Err(error) = self.watchdog_tick().await {
                        logger!(ERROR, "[SYNC] Match `{}` failed ({error})", self.match_id);
                        self.set_status(SessionStatus::Failed(error.to_string()));
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => self.handle_channel_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => self.poll_once().await,
                    Err(broadcast::error::RecvError::Closed) => {
                        self.set_status(SessionStatus::Failed("realtime channel closed".to_string()));
                    }
                },
                change = rows.recv() => match change {
                    Ok(change) if change.match_id() == self.match_id => self.handle_row_change(change).await,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => self.poll_once().await,
                    Err(broadcast::error::RecvError::Closed) => {
                        self.set_status(SessionStatus::Failed("row feed closed".to_string()));
                    }
                },
                changed = changes.changed() => {
                    if changed.is_err() {
                        self.set_status(SessionStatus::Cancelled);
                    } else {
                        self.flush().await;
                    }
                }
                Some(names) = names_rx.recv() => self.apply_names(names).await,
            }
        }

        self.teardown().await;
        Ok(self.status())
    }
}
