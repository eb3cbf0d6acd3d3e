use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

use clipnote::commands;

#[derive(Parser)]
#[command(name = "clipnote")]
#[command(
  about = "ClipNote - Offline note capture\nStores captured text and screen regions locally, with OCR on screenshots"
)]
#[command(version)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Save a quick note
  Add {
    /// Note content
    content: String,
    /// Origin URL to record as provenance
    #[arg(long)]
    url: Option<String>,
  },
  /// Save selected text with its provenance
  Capture {
    /// The selected text
    text: String,
    /// Page the selection came from
    #[arg(long)]
    url: Option<String>,
  },
  /// Capture a region of a viewport screenshot and OCR it
  Shot {
    /// Path to the captured viewport image (PNG)
    image: PathBuf,
    /// Selection rectangle in page coordinates: x,y,w,h
    #[arg(long)]
    rect: String,
    /// Device pixel ratio of the capture
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,
    /// Page the capture came from
    #[arg(long)]
    url: Option<String>,
  },
  /// List notes, newest first
  List {
    /// Maximum number of notes to show
    #[arg(short, long)]
    limit: Option<usize>,
    /// Show provenance and recognized text
    #[arg(short, long)]
    verbose: bool,
  },
  /// Show one note in full
  Show {
    /// Note id
    id: String,
  },
  /// Replace a note's content
  Update {
    /// Note id
    id: String,
    /// New content
    content: String,
  },
  /// Permanently delete a note
  Delete {
    /// Note id
    id: String,
  },
  /// Export all notes as JSON
  Export {
    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Import notes from a previous export
  Import {
    /// Export file to read
    input: PathBuf,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let router = commands::build_router()?;

  match cli.command {
    Commands::Add { content, url } => commands::add_note(&router, &content, url).await,
    Commands::Capture { text, url } => commands::capture_text(&router, &text, url).await,
    Commands::Shot { image, rect, dpr, url } => {
      let rect = commands::parse_rect(&rect)?;
      commands::capture_region(&router, &image, rect, dpr, url).await
    }
    Commands::List { limit, verbose } => commands::list_notes(&router, limit, verbose).await,
    Commands::Show { id } => commands::show_note(&router, &id).await,
    Commands::Update { id, content } => commands::update_note(&router, &id, &content).await,
    Commands::Delete { id } => commands::delete_note(&router, &id).await,
    Commands::Export { output } => commands::export_notes(&router, output.as_deref()).await,
    Commands::Import { input } => commands::import_notes(&router, &input).await,
  }
}
