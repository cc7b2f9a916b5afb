//! Presence-based matchmaking.
//!
//! Searching clients advertise themselves on a shared channel. Whenever presence changes,
//! each client picks the freshest compatible searcher and applies the same host election as
//! the online session; the host creates the match record and tells the guest directly, the
//! guest also watches for the record itself.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

use super::backend::{ChannelEvent, MatchStore, Realtime, RowChange};
use super::decks::{resolve_opponent_deck, validate_deck};
use super::sync::is_host;
use crate::logger;
use crate::models::card::Card;
use crate::models::match_record::{MatchConfig, MatchRecord};
use crate::models::presence::{MatchFound, SearchPresence, SearchStatus, MATCHMAKING_CHANNEL, MATCH_FOUND_EVENT};
use crate::models::settings::SyncSettings;
use crate::utils::errors::{MatchmakingError, RealtimeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Guest,
}

/// What the local player is looking for.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub user_id: String,
    pub mode: String,
    pub rank: String,
    pub deck: Vec<Card>,
}

/// The freshest other searcher in the same mode, ignoring entries older than `stale`.
pub fn select_candidate(
    user_id: &str,
    mode: &str,
    presence: &HashMap<String, Value>,
    now: DateTime<Utc>,
    stale: chrono::Duration,
) -> Option<SearchPresence> {
    presence
        .values()
        .filter_map(|payload| serde_json::from_value::<SearchPresence>(payload.clone()).ok())
        .filter(|entry| {
            entry.user_id != user_id
                && entry.mode == mode
                && entry.status == SearchStatus::Searching
                && now - entry.searching_at <= stale
        })
        .max_by(|a, b| {
            a.searching_at
                .cmp(&b.searching_at)
                .then_with(|| b.user_id.cmp(&a.user_id))
        })
}

pub struct Matchmaker<S: MatchStore, R: Realtime> {
    store: Arc<S>,
    realtime: Arc<R>,
    settings: SyncSettings,
    request: SearchRequest,
    searching_at: DateTime<Utc>,
    creating: bool,
}

impl<S: MatchStore, R: Realtime> Matchmaker<S, R> {
    pub fn new(store: Arc<S>, realtime: Arc<R>, request: SearchRequest, settings: SyncSettings) -> Self {
        Self {
            store,
            realtime,
            settings,
            request,
            searching_at: Utc::now(),
            creating: false,
        }
    }

    fn presence(&self) -> SearchPresence {
        SearchPresence {
            user_id: self.request.user_id.clone(),
            mode: self.request.mode.clone(),
            rank: self.request.rank.clone(),
            status: SearchStatus::Searching,
            deck: self.request.deck.clone(),
            searching_at: self.searching_at,
        }
    }

    pub async fn advertise(&self) -> Result<(), MatchmakingError> {
        let payload = serde_json::to_value(self.presence())
            .map_err(|error| RealtimeError::InvalidPayload(error.to_string()))?;
        self.realtime
            .track(MATCHMAKING_CHANNEL, &self.request.user_id, payload)
            .await?;
        logger!(
            INFO,
            "[MATCHMAKING] `{}` searching in `{}` ({})",
            self.request.user_id,
            self.request.mode,
            self.request.rank
        );
        Ok(())
    }

    async fn withdraw(&self) {
        if let Err(error) = self
            .realtime
            .untrack(MATCHMAKING_CHANNEL, &self.request.user_id)
            .await
        {
            logger!(WARN, "[MATCHMAKING] Could not withdraw `{}` ({error})", self.request.user_id);
        }
    }

    /// Re-evaluates the channel. Returns the created match when this client hosted one.
    pub async fn on_presence_sync(&mut self) -> Result<Option<MatchFound>, MatchmakingError> {
        if self.creating {
            return Ok(None);
        }
        let presence = self.realtime.presence(MATCHMAKING_CHANNEL).await;
        let Some(candidate) = select_candidate(
            &self.request.user_id,
            &self.request.mode,
            &presence,
            Utc::now(),
            self.settings.presence_stale,
        ) else {
            return Ok(None);
        };

        if !is_host(&self.request.user_id, &candidate.user_id) {
            logger!(
                DEBUG,
                "[MATCHMAKING] `{}` hosts, waiting for the match",
                candidate.user_id
            );
            return Ok(None);
        }

        self.creating = true;
        match self.create_match(&candidate).await {
            Ok(found) => Ok(Some(found)),
            Err(error) => {
                self.creating = false;
                Err(error)
            }
        }
    }

    async fn create_match(&self, candidate: &SearchPresence) -> Result<MatchFound, MatchmakingError> {
        let own_deck = validate_deck(&self.request.user_id, &self.request.deck)?;
        let opponent_deck = resolve_opponent_deck(
            self.store.as_ref(),
            &candidate.user_id,
            &candidate.deck,
            &self.settings.deck_fetch,
        )
        .await?;

        let config = MatchConfig {
            decks: HashMap::from([
                (self.request.user_id.clone(), own_deck),
                (candidate.user_id.clone(), opponent_deck),
            ]),
        };
        let record = self
            .store
            .insert_match(MatchRecord::new(&self.request.user_id, &candidate.user_id, config))
            .await?;

        let found = MatchFound {
            match_id: record.id,
            host_id: self.request.user_id.clone(),
            guest_id: candidate.user_id.clone(),
        };
        logger!(
            INFO,
            "[MATCHMAKING] Created match `{}` against `{}`",
            found.match_id,
            found.guest_id
        );

        let payload = serde_json::to_value(&found)
            .map_err(|error| RealtimeError::InvalidPayload(error.to_string()))?;
        if let Err(error) = self
            .realtime
            .broadcast(MATCHMAKING_CHANNEL, MATCH_FOUND_EVENT, payload)
            .await
        {
            // the guest also sees the inserted record
            logger!(WARN, "[MATCHMAKING] match_found broadcast failed ({error})");
        }

        let realtime = self.realtime.clone();
        let user_id = self.request.user_id.clone();
        let delay = self.settings.match_found_untrack;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = realtime.untrack(MATCHMAKING_CHANNEL, &user_id).await;
        });

        Ok(found)
    }

    fn found_for_guest(&self, event: &ChannelEvent) -> Option<MatchFound> {
        let ChannelEvent::Broadcast { event, payload } = event else {
            return None;
        };
        if event != MATCH_FOUND_EVENT {
            return None;
        }
        serde_json::from_value::<MatchFound>(payload.clone())
            .ok()
            .filter(|found| found.guest_id == self.request.user_id)
    }

    fn inserted_for_guest(&self, change: &RowChange) -> Option<MatchFound> {
        match change {
            RowChange::MatchInserted(record) if record.player2_id == self.request.user_id => Some(MatchFound {
                match_id: record.id.clone(),
                host_id: record.player1_id.clone(),
                guest_id: record.player2_id.clone(),
            }),
            _ => None,
        }
    }

    /// Searches until a match is made or `cancel` flips.
    ///
    /// # Arguments
    /// * `cancel` - Flipping it to `true` withdraws the search presence and stops.
    ///
    /// # Returns
    /// * `Ok((MatchFound, Role))` - The match and whether this client created it.
    /// * `Err(MatchmakingError)` - Cancelled, an invalid own deck, or a realtime failure.
    pub async fn search(mut self, mut cancel: watch::Receiver<bool>) -> Result<(MatchFound, Role), MatchmakingError> {
        let mut events = self.realtime.subscribe(MATCHMAKING_CHANNEL).await;
        let mut rows = self.realtime.subscribe_matches().await;
        self.advertise().await?;

        let mut rescan = tokio::time::interval(self.settings.poll_interval);
        rescan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let hosted = tokio::select! {
                _ = cancel.changed() => {
                    logger!(INFO, "[MATCHMAKING] `{}` stopped searching", self.request.user_id);
                    self.withdraw().await;
                    return Err(MatchmakingError::Cancelled);
                }
                _ = rescan.tick() => self.on_presence_sync().await,
                event = events.recv() => match event {
                    Ok(ChannelEvent::PresenceSync) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        self.on_presence_sync().await
                    }
                    Ok(event) => {
                        if let Some(found) = self.found_for_guest(&event) {
                            self.withdraw().await;
                            return Ok((found, Role::Guest));
                        }
                        Ok(None)
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RealtimeError::ChannelClosed(MATCHMAKING_CHANNEL.to_string()).into());
                    }
                },
                change = rows.recv() => match change {
                    Ok(change) => {
                        if let Some(found) = self.inserted_for_guest(&change) {
                            self.withdraw().await;
                            return Ok((found, Role::Guest));
                        }
                        Ok(None)
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => Ok(None),
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RealtimeError::ChannelClosed("matches".to_string()).into());
                    }
                },
            };

            match hosted {
                Ok(Some(found)) => return Ok((found, Role::Host)),
                Ok(None) => {}
                Err(MatchmakingError::InvalidDeck { player_id, usable }) if player_id != self.request.user_id => {
                    // the opponent's deck is unusable; keep looking
                    logger!(
                        WARN,
                        "[MATCHMAKING] Skipping `{player_id}`, only {usable} usable cards"
                    );
                }
                Err(error) => {
                    self.withdraw().await;
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::starter_catalog;
    use crate::online::memory::MemoryBackend;
    use chrono::Duration;

    fn entry(user_id: &str, mode: &str, status: SearchStatus, age_secs: i64) -> (String, Value) {
        let presence = SearchPresence {
            user_id: user_id.to_string(),
            mode: mode.to_string(),
            rank: "Genin".to_string(),
            status,
            deck: Vec::new(),
            searching_at: Utc::now() - Duration::seconds(age_secs),
        };
        (user_id.to_string(), serde_json::to_value(presence).unwrap())
    }

    fn request(user_id: &str, deck: Vec<Card>) -> SearchRequest {
        SearchRequest {
            user_id: user_id.to_string(),
            mode: "ranked".to_string(),
            rank: "Genin".to_string(),
            deck,
        }
    }

    #[test]
    fn test_select_candidate_filters_and_prefers_freshest() {
        let presence: HashMap<String, Value> = HashMap::from([
            entry("me", "ranked", SearchStatus::Searching, 0),
            entry("old", "ranked", SearchStatus::Searching, 120),
            entry("casual", "casual", SearchStatus::Searching, 1),
            entry("taken", "ranked", SearchStatus::Matched, 1),
            entry("b2", "ranked", SearchStatus::Searching, 20),
            entry("c3", "ranked", SearchStatus::Searching, 5),
        ]);
        let picked = select_candidate("me", "ranked", &presence, Utc::now(), Duration::seconds(60)).unwrap();
        assert_eq!(picked.user_id, "c3");

        let only_stale = HashMap::from([entry("old", "ranked", SearchStatus::Searching, 120)]);
        assert!(select_candidate("me", "ranked", &only_stale, Utc::now(), Duration::seconds(60)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_searchers_agree_on_one_match() {
        let backend = Arc::new(MemoryBackend::new());
        let catalog = starter_catalog();
        let (_cancel_tx, cancel) = watch::channel(false);

        let guest = Matchmaker::new(
            backend.clone(),
            backend.clone(),
            request("b2", catalog[5..10].to_vec()),
            SyncSettings::default(),
        );
        let host = Matchmaker::new(
            backend.clone(),
            backend.clone(),
            request("a1", catalog[0..5].to_vec()),
            SyncSettings::default(),
        );
        let guest_task = tokio::spawn(guest.search(cancel.clone()));
        tokio::task::yield_now().await;
        let host_task = tokio::spawn(host.search(cancel));

        let (hosted, host_role) = host_task.await.unwrap().unwrap();
        let (joined, guest_role) = guest_task.await.unwrap().unwrap();
        assert_eq!(host_role, Role::Host);
        assert_eq!(guest_role, Role::Guest);
        assert_eq!(hosted.match_id, joined.match_id);
        assert_eq!(hosted.host_id, "a1");

        let record = backend.fetch_match(&hosted.match_id).await.unwrap().unwrap();
        assert_eq!(record.player1_id, "a1");
        assert_eq!(record.player2_id, "b2");
        assert_eq!(record.config.decks["b2"], catalog[5..10].to_vec());
        assert_eq!(backend.match_count().await, 1);

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        assert!(backend.presence(MATCHMAKING_CHANNEL).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_lock_prevents_duplicates() {
        let backend = Arc::new(MemoryBackend::new());
        let catalog = starter_catalog();
        let (key, payload) = entry("b2", "ranked", SearchStatus::Searching, 0);
        let mut advertised: SearchPresence = serde_json::from_value(payload).unwrap();
        advertised.deck = catalog[5..10].to_vec();
        backend
            .track(MATCHMAKING_CHANNEL, &key, serde_json::to_value(advertised).unwrap())
            .await
            .unwrap();

        let mut host = Matchmaker::new(
            backend.clone(),
            backend.clone(),
            request("a1", catalog[0..5].to_vec()),
            SyncSettings::default(),
        );
        assert!(host.on_presence_sync().await.unwrap().is_some());
        assert!(host.on_presence_sync().await.unwrap().is_none());
        assert_eq!(backend.match_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_invalid_deck_releases_lock() {
        let backend = Arc::new(MemoryBackend::new());
        let (key, payload) = entry("b2", "ranked", SearchStatus::Searching, 0);
        backend.track(MATCHMAKING_CHANNEL, &key, payload).await.unwrap();

        let mut host = Matchmaker::new(
            backend.clone(),
            backend.clone(),
            request("a1", starter_catalog()[0..3].to_vec()),
            SyncSettings::default(),
        );
        let result = host.on_presence_sync().await;
        assert!(matches!(result, Err(MatchmakingError::InvalidDeck { usable: 3, .. })));
        assert!(!host.creating);
        assert_eq!(backend.match_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_withdraws_presence() {
        let backend = Arc::new(MemoryBackend::new());
        let (cancel_tx, cancel) = watch::channel(false);
        let searcher = Matchmaker::new(
            backend.clone(),
            backend.clone(),
            request("a1", starter_catalog()[0..5].to_vec()),
            SyncSettings::default(),
        );
        let task = tokio::spawn(searcher.search(cancel));
        tokio::task::yield_now().await;

        cancel_tx.send(true).unwrap();
        assert!(matches!(task.await.unwrap(), Err(MatchmakingError::Cancelled)));
        assert!(backend.presence(MATCHMAKING_CHANNEL).await.is_empty());
    }
}
