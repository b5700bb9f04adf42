use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use a11y_edit::{
    engine, AttributeKind, ConstructionLocation, EditJournal, EditReport, EditorConfig, ElementId,
    LiveEditor, RuntimeComponent, Session, SourceFile,
};

#[derive(Parser)]
#[command(name = "a11y-edit")]
#[command(about = "Write accessibility fixes back into Rust UI sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./a11y-edit.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Source root construction locations are resolved against
    #[arg(long, global = true)]
    source_root: Option<PathBuf>,

    /// Use project-local state directory (.a11y-edit) for the edit journal
    #[arg(long, global = true)]
    local_state: bool,

    /// Do not record edits in the journal
    #[arg(long, global = true)]
    no_journal: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct Site {
    /// Fully-qualified type owning the construction site (e.g. "app::views::signup::SignupView")
    #[arg(short, long)]
    type_name: String,

    /// File name of the construction site (e.g. "signup.rs")
    #[arg(short, long)]
    file: String,

    /// 1-based line of the construction site
    #[arg(short, long)]
    line: usize,
}

#[derive(clap::Args)]
struct ComponentEdit {
    #[command(flatten)]
    site: Site,

    /// Component type, used for capability checks (e.g. "TextField")
    #[arg(short, long)]
    component: String,

    /// Value to write
    #[arg(long)]
    text: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the label of a component (idempotent - replaces an earlier generated label)
    SetLabel(ComponentEdit),

    /// Set the aria-label of a component
    SetAriaLabel(ComponentEdit),

    /// Set the title attribute of a component
    SetTitle(ComponentEdit),

    /// Set the alt text of an image
    SetAltText(ComponentEdit),

    /// Set the page title of a view
    SetPageTitle {
        #[command(flatten)]
        site: Site,

        /// Page title
        #[arg(long)]
        text: String,
    },

    /// Give a view the main landmark role
    PromoteMain {
        #[command(flatten)]
        site: Site,
    },

    /// Show what an edit at this site would anchor to
    Locate {
        #[command(flatten)]
        site: Site,
    },

    /// Show recent edits from the journal
    History {
        /// Number of edits to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

const ELEMENT: ElementId = ElementId(1);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EditorConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(root) = &cli.source_root {
        config.source_root = root.clone();
    }
    if cli.no_journal {
        config.journal.enabled = false;
    }

    let state_dir = config.state_dir(cli.local_state)?;
    let mut editor = LiveEditor::new(config.clone());
    if config.journal.enabled {
        editor = editor.with_journal(EditJournal::open(&state_dir));
    }

    match cli.command {
        Commands::SetLabel(edit) => run_attribute(&editor, AttributeKind::Label, edit)?,
        Commands::SetAriaLabel(edit) => run_attribute(&editor, AttributeKind::AriaLabel, edit)?,
        Commands::SetTitle(edit) => run_attribute(&editor, AttributeKind::Title, edit)?,
        Commands::SetAltText(edit) => run_attribute(&editor, AttributeKind::AltText, edit)?,

        Commands::SetPageTitle { site, text } => {
            let mut session = view_session(&editor, &site);
            let report = editor
                .set_page_title(&mut session, &text)
                .context("Failed to set page title")?;
            print_report(&report);
        }

        Commands::PromoteMain { site } => {
            let mut session = view_session(&editor, &site);
            let report = editor
                .promote_to_main_role(&mut session)
                .context("Failed to promote view")?;
            print_report(&report);
        }

        Commands::Locate { site } => {
            let location = location_of(&site);
            let path = SourceFile::resolve(&editor.config().source_root, &location);
            let report = engine::inspect(&path, site.line)
                .with_context(|| format!("Failed to inspect {}", path.display()))?;

            println!("{}:{}", report.path.display(), report.line);
            println!("  anchor:            {}", report.anchor);
            println!("  receiver:          {}", report.receiver.as_deref().unwrap_or("-"));
            println!(
                "  implicit receiver: {}",
                report.implicit_receiver.as_deref().unwrap_or("-")
            );
            if report.markers.is_empty() {
                println!("  markers:           none");
            }
            for (kind, line) in &report.markers {
                println!("  marker:            {} at line {}", kind, line);
            }
        }

        Commands::History { limit } => {
            let journal = EditJournal::open(&state_dir);
            let records = journal.history(limit)?;
            if records.is_empty() {
                println!("No edits found");
                return Ok(());
            }

            println!("Recent edits (showing up to {}):\n", limit);
            for record in records {
                println!(
                    "{}  {}  {:22}  {:+3}  {}:{}",
                    record.id,
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.operation,
                    record.line_delta,
                    record.file.display(),
                    record.line
                );
            }
        }
    }

    Ok(())
}

fn location_of(site: &Site) -> ConstructionLocation {
    ConstructionLocation::new(&site.file, &site.type_name, site.line)
}

/// One-shot session holding a single component built at `site`.
fn component_session(editor: &LiveEditor, site: &Site, component: &str) -> Session {
    let mut session = Session::new("cli", editor.config().source_root.clone());
    let capabilities = editor.config().capabilities_of(component);
    session.register(
        RuntimeComponent::new(ELEMENT, component, capabilities),
        Some(location_of(site)),
    );
    session
}

/// One-shot session whose current view was built at `site`.
fn view_session(editor: &LiveEditor, site: &Site) -> Session {
    let type_name = site.type_name.rsplit("::").next().unwrap_or(&site.type_name);
    let mut session = component_session(editor, site, type_name);
    session.set_current_view(ELEMENT);
    session
}

fn run_attribute(editor: &LiveEditor, kind: AttributeKind, edit: ComponentEdit) -> Result<()> {
    let mut session = component_session(editor, &edit.site, &edit.component);
    let report = editor
        .set_attribute(&mut session, ELEMENT, kind, &edit.text)
        .with_context(|| format!("Failed to set {}", kind))?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &EditReport) {
    if report.changed {
        println!("✓ Modified: {} ({:+} line(s))", report.path.display(), report.line_delta);
    } else {
        println!("✓ No changes needed: {}", report.path.display());
    }
    println!("  {}", report.summary);
}
