//! storyd - personalised children's story server
//!
//! Writes a short story for a child with a text generation model, illustrates
//! it with an image generation model, and keeps the result in SQLite.

pub mod anthropic;
pub mod api;
pub mod config;
pub mod db;
pub mod generate;
pub mod leonardo;
pub mod policy;
pub mod stories;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use anthropic::AnthropicClient;
use api::AppState;
use db::Database;
use generate::{
    IllustrationGenerator, ImageBackend, Orchestrator, StoryGenerator, TextBackend, TtlCache,
};
use leonardo::LeonardoClient;
use stories::StoryStore;

pub use config::Settings;

/// The storyd server instance
pub struct Server {
    settings: Settings,
    db: Arc<Database>,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance talking to the configured backends
    pub async fn new(settings: Settings) -> Result<Self> {
        let missing = settings.missing_credentials();
        if !missing.is_empty() {
            warn!(
                "Missing credentials: {}. Requests needing them will fail.",
                missing.join(", ")
            );
        }

        let text = Arc::new(AnthropicClient::new(&settings.anthropic)?);
        let images = Arc::new(LeonardoClient::new(&settings.leonardo)?);
        Self::with_backends(settings, text, images).await
    }

    /// Create a server instance with explicit generation backends
    pub async fn with_backends(
        settings: Settings,
        text: Arc<dyn TextBackend>,
        images: Arc<dyn ImageBackend>,
    ) -> Result<Self> {
        let db = Arc::new(Database::new(settings.database.as_deref()).await?);
        let stories = StoryStore::new(db.pool().clone());

        let generation = &settings.generation;
        let cache = Arc::new(TtlCache::new(generation.cache_ttl()));
        let orchestrator = Orchestrator::new(
            StoryGenerator::new(text, generation.max_retries),
            IllustrationGenerator::new(images, cache)
                .with_polling(generation.poll_interval(), generation.max_polls)
                .with_size(settings.leonardo.width, settings.leonardo.height),
            Arc::new(stories.clone()),
        );

        let state = AppState {
            db: db.clone(),
            stories,
            orchestrator: Arc::new(orchestrator),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            settings,
            db,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the database handle
    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.settings.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("storyd listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("storyd shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.settings.bind_addr
    }
}
