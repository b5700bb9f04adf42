use a11y_edit::{EditJournal, EditorConfig, LiveEditor};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod dispatch;
mod protocol;
mod server;


#[derive(Parser)]
#[command(name = "a11y-edit-server")]
#[command(about = "JSON-lines server applying live accessibility edits per session", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./a11y-edit.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source root construction locations are resolved against
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Use project-local state directory (.a11y-edit) for the edit journal
    #[arg(long)]
    local_state: bool,

    /// Do not record edits in the journal
    #[arg(long)]
    no_journal: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Starting a11y-edit server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = EditorConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(root) = cli.source_root {
        config.source_root = root;
    }

    let mut editor = LiveEditor::new(config.clone());
    if config.journal.enabled && !cli.no_journal {
        let state_dir = config.state_dir(cli.local_state)?;
        info!("Recording edits in {}", state_dir.display());
        editor = editor.with_journal(EditJournal::open(state_dir));
    }

    info!("Resolving sources under {}", config.source_root.display());

    let server = server::Server::new(editor);
    server.run(tokio::io::stdin(), tokio::io::stdout()).await?;

    Ok(())
}
