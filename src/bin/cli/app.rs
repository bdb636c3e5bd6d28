use anyhow::{Context, Result};

use regsearch_lib::config::{Config, Credentials};
use regsearch_lib::pipeline::Assistant;
use regsearch_lib::rag::SqliteVectorStore;

/// Shared application state for CLI commands
pub struct App {
    pub config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the full pipeline. Fails on missing API keys before any request
    /// is made.
    pub fn assistant(&self) -> Result<Assistant> {
        let credentials = Credentials::from_env()?;
        Assistant::from_config(&self.config, &credentials)
            .context("Failed to initialize the assistant")
    }

    /// Open the index alone, for commands that never call the hosted APIs.
    pub fn open_store(&self) -> Result<SqliteVectorStore> {
        SqliteVectorStore::open(&self.config.index_dir).with_context(|| {
            format!(
                "Failed to open index at {}",
                self.config.index_dir.display()
            )
        })
    }
}
