use std::sync::Arc;
use std::time::Instant;

use dv_core::{Analysis, ControlMessage, Document, PageStats, Pipeline, ReconcileOutcome};
use dv_store::{Config, SettingsStore};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::anki::AnkiClient;
use crate::source::markdown_document;

#[derive(Clone)]
pub struct DvServer {
    state: Arc<Mutex<ServerState>>,
    anki: AnkiClient,
    tool_router: ToolRouter<Self>,
}

struct ServerState {
    pipeline: Pipeline,
    settings: SettingsStore,
    document: Document,
}

impl DvServer {
    pub fn new(config: Config, settings: SettingsStore) -> std::result::Result<Self, String> {
        let anki = AnkiClient::new(&config.anki).map_err(|e| e.to_string())?;
        let enabled = settings
            .is_enabled()
            .map_err(|e| format!("failed to load settings: {e}"))?;
        let deck = settings
            .selected_deck()
            .map_err(|e| format!("failed to load settings: {e}"))?;

        let mut pipeline = Pipeline::new(config.engine, &config.anki);
        pipeline.set_enabled(enabled, &deck);

        Ok(Self {
            state: Arc::new(Mutex::new(ServerState {
                pipeline,
                settings,
                document: Document::new(),
            })),
            anki,
            tool_router: Self::tool_router(),
        })
    }

    pub async fn checkpoint_wal(&self) {
        let state = self.state.lock().await;
        match state.settings.checkpoint_truncate() {
            Ok(()) => tracing::info!("WAL checkpoint complete"),
            Err(e) => tracing::warn!("WAL checkpoint failed: {e}"),
        }
    }

    /// Run one analysis of the loaded page. The state lock is released while
    /// the vocabulary is fetched; `None` means disabled or superseded.
    async fn analyze(&self, force: bool) -> Option<PageStats> {
        let ticket = {
            let mut state = self.state.lock().await;
            let ServerState {
                pipeline, document, ..
            } = &mut *state;
            let url = pipeline.current_url().to_string();
            match pipeline.begin_analysis(&*document, &url, force) {
                Analysis::Disabled => return None,
                Analysis::Cached(stats) | Analysis::Empty(stats) => return Some(stats),
                Analysis::Fetch(ticket) => ticket,
            }
        };

        let fetched = ticket.fetch(&self.anki).await;

        let mut state = self.state.lock().await;
        let ServerState {
            pipeline, document, ..
        } = &mut *state;
        pipeline.complete_analysis(ticket, fetched, document, Instant::now())
    }

    async fn stats_result(&self, stats: Option<PageStats>) -> CallToolResult {
        let json = match stats {
            Some(stats) => serde_json::to_value(ControlMessage::stats_update(stats))
                .unwrap_or_default(),
            None => {
                let state = self.state.lock().await;
                serde_json::json!({
                    "isEnabled": state.pipeline.is_enabled(),
                    "selectedDeck": state.pipeline.deck(),
                    "url": state.pipeline.current_url(),
                    "stats": null,
                })
            }
        };
        CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&json).unwrap_or_default(),
        )])
    }
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct ToggleRequest {
    /// Turn analysis on or off
    enabled: bool,
    /// Deck to analyze against; defaults to the previously selected deck
    deck: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct OpenRequest {
    /// Page address; a change of address counts as navigation
    url: String,
    /// Page content
    text: String,
    /// Parse `text` as markdown, excluding code and raw HTML
    #[serde(default)]
    markdown: bool,
}

#[tool_router]
impl DvServer {
    #[tool(
        description = "Turn deck analysis on or off. When turned on, the loaded page is analyzed against the selected deck and its stats are returned. When turned off, all highlights are removed. The setting persists across restarts."
    )]
    async fn dv_toggle(
        &self,
        Parameters(req): Parameters<ToggleRequest>,
    ) -> Result<CallToolResult, McpError> {
        {
            let mut state = self.state.lock().await;
            let ServerState {
                pipeline,
                settings,
                document,
            } = &mut *state;

            let deck = match req.deck {
                Some(deck) => deck,
                None => pipeline.deck().to_string(),
            };
            if req.enabled && deck.trim().is_empty() {
                return Err(McpError::invalid_params(
                    "no deck selected; pass `deck`".to_string(),
                    None,
                ));
            }

            pipeline.set_enabled(req.enabled, &deck);
            if let Err(e) = settings.save_toggle(req.enabled, &deck) {
                tracing::error!("failed to persist toggle: {e}");
            }
            if !req.enabled {
                let cleared = pipeline.clear_markers(document);
                tracing::debug!(cleared, "highlights removed");
            }
        }

        let stats = self.analyze(true).await;
        Ok(self.stats_result(stats).await)
    }

    #[tool(
        description = "Load a page: navigate to `url` and replace the document with `text`. If analysis is enabled, the page is tokenized, checked against the deck, highlighted, and its stats are returned."
    )]
    async fn dv_open(
        &self,
        Parameters(req): Parameters<OpenRequest>,
    ) -> Result<CallToolResult, McpError> {
        {
            let mut state = self.state.lock().await;
            let ServerState {
                pipeline, document, ..
            } = &mut *state;
            *document = if req.markdown {
                markdown_document(&req.text)
            } else {
                Document::from_text(&req.text)
            };
            // Fresh page: nothing rendered yet, so the debounce timer restarts.
            pipeline.clear_markers(document);
            // A reload of the same address is still a fresh page.
            if !pipeline.navigate(&req.url) {
                pipeline.invalidate();
            }
        }

        let stats = self.analyze(false).await;
        Ok(self.stats_result(stats).await)
    }

    #[tool(
        description = "Get known/unknown/new counts for the loaded page. Served from cache when the page has not changed."
    )]
    async fn dv_stats(&self) -> Result<CallToolResult, McpError> {
        let stats = self.analyze(false).await;
        Ok(self.stats_result(stats).await)
    }

    #[tool(description = "Re-fetch the deck vocabulary and re-analyze the loaded page.")]
    async fn dv_refresh(&self) -> Result<CallToolResult, McpError> {
        let stats = self.analyze(true).await;
        Ok(self.stats_result(stats).await)
    }

    #[tool(
        description = "Re-apply highlights to the loaded page and return it as HTML. Renders closer together than the debounce window are skipped."
    )]
    async fn dv_render(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let ServerState {
            pipeline, document, ..
        } = &mut *state;

        let rendered = match pipeline.render(document, Instant::now()) {
            None => "disabled",
            Some(ReconcileOutcome::Suppressed) => "suppressed",
            Some(ReconcileOutcome::Rendered(_)) => "rendered",
        };
        let result = serde_json::json!({
            "render": rendered,
            "html": document.render_html(),
        });

        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&result).unwrap_or_default(),
        )]))
    }

    #[tool(
        description = "List the deck names available in the flashcard store. Fails if the store is unreachable."
    )]
    async fn dv_decks(&self) -> Result<CallToolResult, McpError> {
        let decks = self.anki.deck_names().await.map_err(|e| {
            McpError::internal_error(
                format!("flashcard store at {} unavailable: {e}", self.anki.endpoint()),
                None,
            )
        })?;
        let result = serde_json::json!({ "decks": decks });

        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&result).unwrap_or_default(),
        )]))
    }
}

#[tool_handler]
impl ServerHandler for DvServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Highlights page vocabulary by how well it is known in a flashcard deck.\n\n\
                 1. Call dv_decks to see available decks, then dv_toggle with enabled=true and a deck.\n\
                 2. Call dv_open with a page url and its text. Stats come back as a statsUpdate message: \
                    known (mature cards), unknown (young cards), new (not in the deck).\n\
                 3. dv_render returns the page with highlight spans; dv_refresh re-fetches the deck.\n\
                 4. dv_toggle with enabled=false removes all highlights."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
