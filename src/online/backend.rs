//! Contracts of the two remote collaborators: the relational store and the realtime layer.

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::models::card::Card;
use crate::models::match_record::{MatchHistoryRow, MatchPatch, MatchRecord};
use crate::models::profile::{BossDeckRow, Profile};
use crate::utils::errors::{RealtimeError, StoreError};

/// Row-oriented access to the remote store.
pub trait MatchStore: Send + Sync + 'static {
    fn fetch_match(
        &self,
        match_id: &str,
    ) -> impl Future<Output = Result<Option<MatchRecord>, StoreError>> + Send;

    fn insert_match(
        &self,
        record: MatchRecord,
    ) -> impl Future<Output = Result<MatchRecord, StoreError>> + Send;

    fn update_match(
        &self,
        match_id: &str,
        patch: MatchPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_match(&self, match_id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_history(
        &self,
        row: MatchHistoryRow,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn fetch_profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Profile>, StoreError>> + Send;

    /// Catalog rows for the given ids. Unknown ids are skipped.
    fn fetch_cards(
        &self,
        card_ids: &[String],
    ) -> impl Future<Output = Result<Vec<Card>, StoreError>> + Send;

    fn fetch_catalog(&self) -> impl Future<Output = Result<Vec<Card>, StoreError>> + Send;

    fn fetch_boss_decks(&self) -> impl Future<Output = Result<Vec<BossDeckRow>, StoreError>> + Send;

    /// Adds `coins` and `rank_points` to a profile's balances.
    fn adjust_balance(
        &self,
        user_id: &str,
        coins: i64,
        rank_points: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    PresenceSync,
    PresenceJoin { key: String },
    PresenceLeave { key: String },
    Broadcast { event: String, payload: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    MatchInserted(MatchRecord),
    MatchUpdated(MatchRecord),
    MatchDeleted { id: String },
}

impl RowChange {
    pub fn match_id(&self) -> &str {
        match self {
            RowChange::MatchInserted(record) | RowChange::MatchUpdated(record) => &record.id,
            RowChange::MatchDeleted { id } => id,
        }
    }
}

/// Named presence/broadcast channels plus row-change notifications.
pub trait Realtime: Send + Sync + 'static {
    fn track(
        &self,
        channel: &str,
        key: &str,
        payload: Value,
    ) -> impl Future<Output = Result<(), RealtimeError>> + Send;

    fn untrack(&self, channel: &str, key: &str) -> impl Future<Output = Result<(), RealtimeError>> + Send;

    fn broadcast(
        &self,
        channel: &str,
        event: &str,
        payload: Value,
    ) -> impl Future<Output = Result<(), RealtimeError>> + Send;

    /// Current presence state of a channel, keyed by presence key.
    fn presence(&self, channel: &str) -> impl Future<Output = HashMap<String, Value>> + Send;

    fn subscribe(&self, channel: &str) -> impl Future<Output = broadcast::Receiver<ChannelEvent>> + Send;

    /// Change feed of the `matches` collection.
    fn subscribe_matches(&self) -> impl Future<Output = broadcast::Receiver<RowChange>> + Send;
}
