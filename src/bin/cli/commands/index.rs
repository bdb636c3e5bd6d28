use anyhow::Result;

use regsearch_lib::pipeline::DocumentStatus;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, force: bool, format: &OutputFormat) -> Result<()> {
    let mut assistant = app.assistant()?;
    let report = assistant.index(force)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => {
            if report.outcomes.is_empty() {
                println!(
                    "No .docx files found in {}.",
                    app.config.data_dir.display()
                );
            }

            let id_w = report
                .outcomes
                .iter()
                .map(|o| o.document_id.chars().count())
                .max()
                .unwrap_or(8)
                .clamp(8, 50);

            for outcome in &report.outcomes {
                let status = match &outcome.status {
                    DocumentStatus::Indexed { chunks } => format!("indexed ({} chunks)", chunks),
                    DocumentStatus::Unchanged => "unchanged".to_string(),
                    DocumentStatus::Failed { error } => format!("FAILED: {}", error),
                };
                println!("{:<id_w$} {}", outcome.document_id, status, id_w = id_w);
            }
            for id in &report.removed {
                println!("{:<id_w$} removed", id, id_w = id_w);
            }

            let totals = &report.totals;
            println!();
            println!("Documents:          {}", totals.documents);
            println!("Chunks:             {}", totals.chunks);
            println!("Average chunk size: {:.0} chars", totals.average_chunk_chars);
            println!("Total characters:   {}", totals.total_chars);
            println!(
                "\n{} indexed, {} unchanged, {} failed, {} removed",
                report.indexed_count(),
                report.unchanged_count(),
                report.failed_count(),
                report.removed.len()
            );
        }
    }

    Ok(())
}
