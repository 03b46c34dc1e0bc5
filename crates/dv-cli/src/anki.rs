//! AnkiConnect HTTP client.
//!
//! Every call is a POST of `{action, version, params}`; the reply is
//! `{result, error}`. Transport failures, non-2xx replies and a non-null
//! `error` all surface as `RpcError`, which the engine treats as "no data".

use std::time::Duration;

use dv_core::error::Result;
use dv_core::{AnkiConfig, CardId, CardStore, RpcError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnkiClient {
    http: reqwest::Client,
    endpoint: String,
    version: u32,
}

impl AnkiClient {
    pub fn new(config: &AnkiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            version: config.version,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request<T: DeserializeOwned>(&self, action: &str, params: Value) -> Result<T> {
        let body = json!({
            "action": action,
            "version": self.version,
            "params": params,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Transport(format!("{action}: HTTP {status}")));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("{action}: {e}")))?;
        if let Some(error) = envelope.error {
            return Err(RpcError::Store(format!("{action}: {error}")));
        }
        envelope
            .result
            .ok_or_else(|| RpcError::Decode(format!("{action}: reply has no result")))
    }

    pub async fn deck_names(&self) -> Result<Vec<String>> {
        let mut decks: Vec<String> = self.request("deckNames", json!({})).await?;
        decks.sort();
        Ok(decks)
    }
}

impl CardStore for AnkiClient {
    async fn find_cards(&self, query: &str) -> Result<Vec<CardId>> {
        tracing::trace!(query, "findCards");
        self.request("findCards", json!({ "query": query })).await
    }

    async fn cards_info(&self, cards: &[CardId]) -> Result<Vec<Value>> {
        tracing::trace!(cards = cards.len(), "cardsInfo");
        self.request("cardsInfo", json!({ "cards": cards })).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> AnkiClient {
        AnkiClient::new(&AnkiConfig {
            endpoint: endpoint.to_string(),
            timeout_secs: 2,
            ..AnkiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_request_envelope() {
        let (endpoint, seen) = fake::spawn().await;
        let ids = client(&endpoint)
            .find_cards("deck:\"Japanese\" (Word:\"猫\")")
            .await
            .unwrap();
        assert_eq!(ids, vec![11, 12]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["action"], "findCards");
        assert_eq!(seen[0]["version"], 6);
        assert_eq!(seen[0]["params"]["query"], "deck:\"Japanese\" (Word:\"猫\")");
    }

    #[tokio::test]
    async fn test_cards_info_and_decks() {
        let (endpoint, seen) = fake::spawn().await;
        let anki = client(&endpoint);

        let records = anki.cards_info(&[11, 12]).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["interval"], 40);
        assert_eq!(seen.lock().unwrap()[0]["params"]["cards"], json!([11, 12]));

        assert_eq!(anki.deck_names().await.unwrap(), vec!["Japanese", "Korean"]);
    }

    #[tokio::test]
    async fn test_store_error_surfaces() {
        let (endpoint, _) = fake::spawn().await;
        let err = client(&endpoint)
            .request::<Value>("modelNames", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Store(msg) if msg.contains("unsupported action")));
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let endpoint = fake::closed_endpoint().await;
        let err = client(&endpoint).deck_names().await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
