use anyhow::Result;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, question: &str, format: &OutputFormat) -> Result<()> {
    let assistant = app.assistant()?;
    let answer = assistant.ask(question)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
        OutputFormat::Plain => {
            println!("{}", answer.text);

            if !answer.context.is_empty() {
                println!("\n\u{2500}\u{2500} Sources \u{2500}\u{2500}");
                for hit in &answer.context {
                    let preview: String = hit.content.chars().take(80).collect();
                    let ellipsis = if hit.content.chars().count() > 80 { "..." } else { "" };
                    println!(
                        "[{:.2}] {} #{}: {}{}",
                        hit.score,
                        hit.document_id,
                        hit.chunk_index,
                        preview.replace('\n', " "),
                        ellipsis
                    );
                }
            }
        }
    }

    Ok(())
}
