use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::Card;

pub const MATCHMAKING_CHANNEL: &str = "matchmaking";
pub const MATCH_FOUND_EVENT: &str = "match_found";

pub fn match_channel(match_id: &str) -> String {
    format!("match:{match_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Searching,
    Matched,
}

/// What a player advertises on the matchmaking channel while looking for an opponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPresence {
    pub user_id: String,
    pub mode: String,
    pub rank: String,
    pub status: SearchStatus,
    #[serde(default)]
    pub deck: Vec<Card>,
    pub searching_at: DateTime<Utc>,
}

/// Presence tracked on a match channel once both players joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyPresence {
    pub user_id: String,
    pub ready: bool,
}

/// Payload of the `match_found` broadcast sent by the host to the guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFound {
    pub match_id: String,
    pub host_id: String,
    pub guest_id: String,
}
