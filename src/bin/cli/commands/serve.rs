use anyhow::{Context, Result};

use regsearch_lib::web::{start_server, PAGE_TITLE};

use crate::app::App;

pub fn run(app: &App, index_first: bool) -> Result<()> {
    let mut assistant = app.assistant()?;

    if index_first {
        match assistant.index(false) {
            Ok(report) => log::info!(
                "Startup index: {} indexed, {} unchanged, {} failed",
                report.indexed_count(),
                report.unchanged_count(),
                report.failed_count()
            ),
            // The page still serves whatever is already indexed.
            Err(e) => log::error!("Startup index failed: {}", e),
        }
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let port = app.config.port;

    runtime.block_on(async move {
        let server = start_server(assistant, port)
            .await
            .with_context(|| format!("Failed to listen on port {}", port))?;

        println!("{} running at {}", PAGE_TITLE, server.base_url());
        println!("Press Ctrl+C to stop.");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        server.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })
}
