use anyhow::Result;

use regsearch_lib::rag::VectorStore;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let store = app.open_store()?;
    let stats = store.stats()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Plain => {
            println!("Index:      {}", store.db_path().display());
            println!("Documents:  {}", stats.document_count);
            println!("Chunks:     {}", stats.chunk_count);
            match &stats.model {
                Some(model) => println!("Model:      {} ({} dims)", model, stats.dimensions),
                None => println!("Model:      (not indexed yet)"),
            }
        }
    }

    Ok(())
}
