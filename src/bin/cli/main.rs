mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use regsearch_lib::config::Config;

#[derive(Parser)]
#[command(
    name = "regsearch",
    about = "Question answering over regulation documents",
    version
)]
struct Cli {
    /// TOML config file (defaults apply to anything it leaves out)
    #[arg(long, global = true, env = "REGSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of .docx files to index
    #[arg(long, global = true, env = "REGSEARCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory holding the vector index
    #[arg(long, global = true, env = "REGSEARCH_INDEX_DIR")]
    index_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the web UI
    Serve {
        /// Port to listen on
        #[arg(long, env = "REGSEARCH_PORT")]
        port: Option<u16>,
        /// Skip the incremental index run at startup
        #[arg(long)]
        no_index: bool,
    },

    /// Index the data directory
    Index {
        /// Re-embed documents even if unchanged
        #[arg(long)]
        force: bool,
    },

    /// Ask a single question
    Ask {
        /// The question
        question: String,
    },

    /// Show index statistics
    Stats,

    /// Remove everything from the index
    Clear,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.index_dir {
        config.index_dir = dir;
    }
    if let Command::Serve {
        port: Some(port), ..
    } = cli.command
    {
        config.port = port;
    }

    let app = app::App::new(config);

    match cli.command {
        Command::Serve { no_index, .. } => commands::serve::run(&app, !no_index)?,
        Command::Index { force } => commands::index::run(&app, force, &cli.format)?,
        Command::Ask { question } => commands::ask::run(&app, &question, &cli.format)?,
        Command::Stats => commands::stats::run(&app, &cli.format)?,
        Command::Clear => commands::clear::run(&app)?,
    }

    Ok(())
}
