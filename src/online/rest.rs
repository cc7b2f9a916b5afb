use reqwest::{header::AUTHORIZATION, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::backend::MatchStore;
use crate::logger;
use crate::models::card::Card;
use crate::models::match_record::{MatchHistoryRow, MatchPatch, MatchRecord};
use crate::models::profile::{BossDeckRow, Profile};
use crate::models::settings::Settings;
use crate::utils::errors::StoreError;

/// [`MatchStore`] over a PostgREST-style HTTP API (`/rest/v1/<table>`).
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.store_url, &settings.store_api_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, self.table_url(table))
            .query(query)
            .send()
            .await
            .map_err(|error| StoreError::RequestFailed(error.to_string()))?;

        match response.status() {
            StatusCode::OK => response.json::<Vec<T>>().await.map_err(|error| {
                logger!(ERROR, "[REST] Could not parse `{table}` rows: {error}");
                StoreError::InvalidResponseBody(table.to_string())
            }),
            status => {
                let body = response.text().await.unwrap_or("NO MESSAGE".to_string());
                Err(StoreError::UnexpectedStatus(status.as_u16(), body))
            }
        }
    }

    async fn write<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        table: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<reqwest::Response, StoreError> {
        let mut request = self
            .request(method, self.table_url(table))
            .query(query)
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|error| StoreError::RequestFailed(error.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(response),
            StatusCode::NOT_FOUND => Err(StoreError::RowNotFound(table.to_string())),
            status => {
                let body = response.text().await.unwrap_or("NO MESSAGE".to_string());
                Err(StoreError::UnexpectedStatus(status.as_u16(), body))
            }
        }
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

impl MatchStore for RestStore {
    async fn fetch_match(&self, match_id: &str) -> Result<Option<MatchRecord>, StoreError> {
        let rows: Vec<MatchRecord> = self
            .select("matches", &[("id", eq(match_id)), ("select", "*".to_string())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_match(&self, record: MatchRecord) -> Result<MatchRecord, StoreError> {
        let response = self
            .write(reqwest::Method::POST, "matches", &[], Some(&record))
            .await?;
        let mut rows = response
            .json::<Vec<MatchRecord>>()
            .await
            .map_err(|_| StoreError::InvalidResponseBody("matches".to_string()))?;
        Ok(rows.pop().unwrap_or(record))
    }

    async fn update_match(&self, match_id: &str, patch: MatchPatch) -> Result<(), StoreError> {
        self.write(reqwest::Method::PATCH, "matches", &[("id", eq(match_id))], Some(&patch))
            .await?;
        Ok(())
    }

    async fn delete_match(&self, match_id: &str) -> Result<(), StoreError> {
        self.write::<()>(reqwest::Method::DELETE, "matches", &[("id", eq(match_id))], None)
            .await?;
        Ok(())
    }

    async fn insert_history(&self, row: MatchHistoryRow) -> Result<(), StoreError> {
        self.write(reqwest::Method::POST, "match_history", &[], Some(&row))
            .await?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let rows: Vec<Profile> = self
            .select("profiles", &[("id", eq(user_id)), ("select", "*".to_string())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_cards(&self, card_ids: &[String]) -> Result<Vec<Card>, StoreError> {
        if card_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = format!("in.({})", card_ids.join(","));
        self.select("cards", &[("id", filter), ("select", "*".to_string())])
            .await
    }

    async fn fetch_catalog(&self) -> Result<Vec<Card>, StoreError> {
        self.select("cards", &[("select", "*".to_string()), ("order", "id".to_string())])
            .await
    }

    async fn fetch_boss_decks(&self) -> Result<Vec<BossDeckRow>, StoreError> {
        self.select("boss_decks", &[("select", "*".to_string())]).await
    }

    async fn adjust_balance(&self, user_id: &str, coins: i64, rank_points: i64) -> Result<(), StoreError> {
        let profile = self
            .fetch_profile(user_id)
            .await?
            .ok_or_else(|| StoreError::RowNotFound(user_id.to_string()))?;
        let body = serde_json::json!({
            "coins": profile.coins + coins,
            "rank_points": profile.rank_points + rank_points,
        });
        self.write(reqwest::Method::PATCH, "profiles", &[("id", eq(user_id))], Some(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let store = RestStore::new("https://example.test/", "key");
        assert_eq!(store.table_url("matches"), "https://example.test/rest/v1/matches");
        assert_eq!(eq("abc"), "eq.abc");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_failure() {
        let store = RestStore::new("http://127.0.0.1:9", "key");
        let result = store.fetch_match("m1").await;
        assert!(matches!(result, Err(StoreError::RequestFailed(_))));
    }
}
