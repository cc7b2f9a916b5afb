use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::Card;
use crate::online::snapshot::StateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created by matchmaking, not seeded yet.
    Waiting,
    Active,
    Completed,
    Cancelled,
}

/// Decks embedded in the match row at creation time, keyed by user id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default)]
    pub decks: HashMap<String, Vec<Card>>,
}

/// A row of the `matches` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub player1_id: String,
    pub player2_id: String,
    pub status: MatchStatus,
    #[serde(default)]
    pub config: MatchConfig,
    #[serde(default)]
    pub state: Option<StateSnapshot>,
    #[serde(default)]
    pub winner_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(player1_id: &str, player2_id: &str, config: MatchConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            player1_id: player1_id.to_string(),
            player2_id: player2_id.to_string(),
            status: MatchStatus::Waiting,
            config,
            state: None,
            winner_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.player1_id == user_id || self.player2_id == user_id
    }

    pub fn opponent_of(&self, user_id: &str) -> &str {
        if self.player1_id == user_id {
            &self.player2_id
        } else {
            &self.player1_id
        }
    }
}

/// Partial update of a match row. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
}

impl MatchPatch {
    pub fn state(snapshot: StateSnapshot) -> Self {
        Self {
            state: Some(snapshot),
            ..Self::default()
        }
    }

    pub fn status(status: MatchStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply_to(self, record: &mut MatchRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(state) = self.state {
            record.state = Some(state);
        }
        if let Some(winner_id) = self.winner_id {
            record.winner_id = Some(winner_id);
        }
    }
}

/// A row of the append-only `match_history` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchHistoryRow {
    pub match_id: String,
    pub player1_id: String,
    pub player2_id: String,
    /// `None` for a draw.
    pub winner_id: Option<String>,
    pub player1_cells: usize,
    pub player2_cells: usize,
    pub finished_at: DateTime<Utc>,
}
