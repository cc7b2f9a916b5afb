//! In-process backend implementing both [`MatchStore`] and [`Realtime`].
//!
//! Two clients sharing one `Arc<MemoryBackend>` behave like two browsers talking to the same
//! hosted database and realtime service. Transient failures can be injected to exercise the
//! retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use super::backend::{ChannelEvent, MatchStore, Realtime, RowChange};
use crate::logger;
use crate::models::card::Card;
use crate::models::match_record::{MatchHistoryRow, MatchPatch, MatchRecord};
use crate::models::profile::{BossDeckRow, Profile};
use crate::utils::errors::{RealtimeError, StoreError};

const CHANNEL_CAPACITY: usize = 256;

struct ChannelState {
    presence: HashMap<String, Value>,
    events: broadcast::Sender<ChannelEvent>,
}

impl ChannelState {
    fn new() -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            presence: HashMap::new(),
            events,
        }
    }
}

pub struct MemoryBackend {
    matches: RwLock<HashMap<String, MatchRecord>>,
    history: RwLock<Vec<MatchHistoryRow>>,
    profiles: RwLock<HashMap<String, Profile>>,
    catalog: RwLock<HashMap<String, Card>>,
    boss_decks: RwLock<Vec<BossDeckRow>>,
    channels: RwLock<HashMap<String, ChannelState>>,
    row_changes: broadcast::Sender<RowChange>,
    failing_profile_reads: AtomicU32,
    failing_match_reads: AtomicU32,
    failing_match_writes: AtomicU32,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (row_changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            matches: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            profiles: RwLock::new(HashMap::new()),
            catalog: RwLock::new(HashMap::new()),
            boss_decks: RwLock::new(Vec::new()),
            channels: RwLock::new(HashMap::new()),
            row_changes,
            failing_profile_reads: AtomicU32::new(0),
            failing_match_reads: AtomicU32::new(0),
            failing_match_writes: AtomicU32::new(0),
        }
    }

    pub async fn add_cards(&self, cards: impl IntoIterator<Item = Card>) {
        let mut catalog = self.catalog.write().await;
        for card in cards {
            catalog.insert(card.id.clone(), card);
        }
    }

    pub async fn add_profile(&self, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
    }

    pub async fn set_boss_decks(&self, rows: Vec<BossDeckRow>) {
        *self.boss_decks.write().await = rows;
    }

    pub async fn profile(&self, user_id: &str) -> Option<Profile> {
        self.profiles.read().await.get(user_id).cloned()
    }

    pub async fn history(&self) -> Vec<MatchHistoryRow> {
        self.history.read().await.clone()
    }

    pub async fn match_count(&self) -> usize {
        self.matches.read().await.len()
    }

    /// Makes the next `count` profile reads fail.
    pub fn fail_profile_reads(&self, count: u32) {
        self.failing_profile_reads.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` match reads fail.
    pub fn fail_match_reads(&self, count: u32) {
        self.failing_match_reads.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` match updates fail.
    pub fn fail_match_writes(&self, count: u32) {
        self.failing_match_writes.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn notify(&self, change: RowChange) {
        // No subscribers is fine.
        let _ = self.row_changes.send(change);
    }

    async fn emit(&self, channel: &str, event: ChannelEvent) {
        let mut channels = self.channels.write().await;
        let state = channels
            .entry(channel.to_string())
            .or_insert_with(ChannelState::new);
        let _ = state.events.send(event);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchStore for MemoryBackend {
    async fn fetch_match(&self, match_id: &str) -> Result<Option<MatchRecord>, StoreError> {
        if Self::take_failure(&self.failing_match_reads) {
            return Err(StoreError::Transient(format!("match `{match_id}` read failed")));
        }
        Ok(self.matches.read().await.get(match_id).cloned())
    }

    async fn insert_match(&self, record: MatchRecord) -> Result<MatchRecord, StoreError> {
        self.matches
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        logger!(DEBUG, "[MEMORY] Inserted match `{}`", record.id);
        self.notify(RowChange::MatchInserted(record.clone()));
        Ok(record)
    }

    async fn update_match(&self, match_id: &str, patch: MatchPatch) -> Result<(), StoreError> {
        if Self::take_failure(&self.failing_match_writes) {
            return Err(StoreError::Transient(format!("match `{match_id}` write failed")));
        }
        let mut matches = self.matches.write().await;
        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| StoreError::RowNotFound(match_id.to_string()))?;
        patch.apply_to(record);
        let updated = record.clone();
        drop(matches);
        self.notify(RowChange::MatchUpdated(updated));
        Ok(())
    }

    async fn delete_match(&self, match_id: &str) -> Result<(), StoreError> {
        if self.matches.write().await.remove(match_id).is_some() {
            self.notify(RowChange::MatchDeleted {
                id: match_id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_history(&self, row: MatchHistoryRow) -> Result<(), StoreError> {
        self.history.write().await.push(row);
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        if Self::take_failure(&self.failing_profile_reads) {
            return Err(StoreError::Transient(format!("profile `{user_id}` read failed")));
        }
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn fetch_cards(&self, card_ids: &[String]) -> Result<Vec<Card>, StoreError> {
        let catalog = self.catalog.read().await;
        Ok(card_ids
            .iter()
            .filter_map(|id| catalog.get(id).cloned())
            .collect())
    }

    async fn fetch_catalog(&self) -> Result<Vec<Card>, StoreError> {
        let mut cards: Vec<Card> = self.catalog.read().await.values().cloned().collect();
        cards.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(cards)
    }

    async fn fetch_boss_decks(&self) -> Result<Vec<BossDeckRow>, StoreError> {
        Ok(self.boss_decks.read().await.clone())
    }

    async fn adjust_balance(&self, user_id: &str, coins: i64, rank_points: i64) -> Result<(), StoreError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| StoreError::RowNotFound(user_id.to_string()))?;
        profile.coins += coins;
        profile.rank_points += rank_points;
        Ok(())
    }
}

impl Realtime for MemoryBackend {
    async fn track(&self, channel: &str, key: &str, payload: Value) -> Result<(), RealtimeError> {
        let mut channels = self.channels.write().await;
        let state = channels
            .entry(channel.to_string())
            .or_insert_with(ChannelState::new);
        let joined = state.presence.insert(key.to_string(), payload).is_none();
        if joined {
            let _ = state.events.send(ChannelEvent::PresenceJoin {
                key: key.to_string(),
            });
        }
        let _ = state.events.send(ChannelEvent::PresenceSync);
        Ok(())
    }

    async fn untrack(&self, channel: &str, key: &str) -> Result<(), RealtimeError> {
        let mut channels = self.channels.write().await;
        if let Some(state) = channels.get_mut(channel) {
            if state.presence.remove(key).is_some() {
                let _ = state.events.send(ChannelEvent::PresenceLeave {
                    key: key.to_string(),
                });
                let _ = state.events.send(ChannelEvent::PresenceSync);
            }
        }
        Ok(())
    }

    async fn broadcast(&self, channel: &str, event: &str, payload: Value) -> Result<(), RealtimeError> {
        self.emit(
            channel,
            ChannelEvent::Broadcast {
                event: event.to_string(),
                payload,
            },
        )
        .await;
        Ok(())
    }

    async fn presence(&self, channel: &str) -> HashMap<String, Value> {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|state| state.presence.clone())
            .unwrap_or_default()
    }

    async fn subscribe(&self, channel: &str) -> broadcast::Receiver<ChannelEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(ChannelState::new)
            .events
            .subscribe()
    }

    async fn subscribe_matches(&self) -> broadcast::Receiver<RowChange> {
        self.row_changes.subscribe()
    }
}
