use anyhow::Result;

use regsearch_lib::rag::VectorStore;

use crate::app::App;

pub fn run(app: &App) -> Result<()> {
    let mut store = app.open_store()?;
    let before = store.stats()?;
    store.clear()?;

    println!(
        "Cleared {} documents ({} chunks) from {}",
        before.document_count,
        before.chunk_count,
        store.db_path().display()
    );
    Ok(())
}
