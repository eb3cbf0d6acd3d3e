use anyhow::{anyhow, Result};
use colored::*;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::crop::{self, RegionRect, ScrollOffset};
use crate::note::{format_relative_time, Note, NoteSource};
use crate::notify::ConsoleNotifier;
use crate::ocr::{OcrExecutor, TesseractEngine};
use crate::queue::{ExecutorRegistry, ProcessingQueue};
use crate::router::{Request, Router, RouterResponse};
use crate::store::{FileStore, NoteStore};

/// Wire up the full pipeline over the on-disk store: file store, OCR executor
/// behind the processing queue, console notices.
pub fn build_router() -> Result<Router> {
  let store: Arc<dyn NoteStore> = Arc::new(FileStore::open_default()?);
  let executor = OcrExecutor::new(store.clone(), Arc::new(TesseractEngine::new()));
  let registry = ExecutorRegistry::new().with_ocr(Arc::new(executor));
  let queue = ProcessingQueue::new(registry);
  Ok(Router::new(store, queue, Arc::new(ConsoleNotifier)))
}

fn note_from_response(response: RouterResponse) -> Result<Note> {
  if !response.success {
    return Err(anyhow!(response.error.unwrap_or_else(|| "request failed".to_string())));
  }
  let data = response.data.ok_or_else(|| anyhow!("response carried no note"))?;
  Ok(serde_json::from_value(data)?)
}

fn expect_success(response: RouterResponse) -> Result<RouterResponse> {
  if !response.success {
    return Err(anyhow!(response.error.unwrap_or_else(|| "request failed".to_string())));
  }
  Ok(response)
}

/// Parse a `x,y,w,h` selection rectangle argument.
pub fn parse_rect(raw: &str) -> Result<RegionRect> {
  let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
  if parts.len() != 4 {
    return Err(anyhow!("rect must be x,y,w,h (got {raw:?})"));
  }
  let mut values = [0f64; 4];
  for (slot, part) in values.iter_mut().zip(&parts) {
    *slot = part.parse().map_err(|_| anyhow!("rect component {part:?} is not a number"))?;
  }
  Ok(RegionRect { x: values[0], y: values[1], w: values[2], h: values[3] })
}

/// Save a quick note typed by the user.
pub async fn add_note(router: &Router, content: &str, url: Option<String>) -> Result<()> {
  let source = url.map(|url| NoteSource { url: Some(url), selection: None });
  let response = router.handle(Request::SaveNote { content: content.to_string(), source }).await;
  let note = note_from_response(response)?;

  println!("{} Saved note {}", "✓".green(), note.id.cyan());
  Ok(())
}

/// Save selected text along with its provenance.
pub async fn capture_text(router: &Router, text: &str, url: Option<String>) -> Result<()> {
  let response =
    router.handle(Request::CaptureText { text: text.to_string(), origin_url: url }).await;
  let note = note_from_response(response)?;

  println!("{} Captured selection into note {}", "✓".green(), note.id.cyan());
  Ok(())
}

/// Capture a region of an already-captured viewport image, then run the
/// post-save queue (OCR) to completion before returning.
pub async fn capture_region(
  router: &Router,
  image_path: &Path,
  rect: RegionRect,
  device_pixel_ratio: f64,
  url: Option<String>,
) -> Result<()> {
  let png = std::fs::read(image_path)
    .map_err(|err| anyhow!("could not read {}: {err}", image_path.display()))?;

  let request = Request::CaptureRegion {
    rect,
    device_pixel_ratio,
    scroll: ScrollOffset::default(),
    origin_url: url,
    image: crop::encode_data_uri(&png),
  };
  let note = note_from_response(router.handle(request).await)?;

  println!("{} Captured region into note {}", "✓".green(), note.id.cyan());

  router.queue().wait_idle().await;

  match router.store().find_by_id(&note.id).await? {
    Some(Note { recognized_text: Some(text), .. }) if !text.is_empty() => {
      println!("  Recognized text:");
      for line in text.lines() {
        println!("    {line}");
      }
    }
    Some(_) => println!("  {}", "No text recognized".yellow()),
    None => {}
  }
  Ok(())
}

/// List notes newest-first.
pub async fn list_notes(router: &Router, limit: Option<usize>, verbose: bool) -> Result<()> {
  let response =
    expect_success(router.handle(Request::ListNotes { limit, offset: None }).await)?;
  let notes: Vec<Note> =
    serde_json::from_value(response.data.ok_or_else(|| anyhow!("response carried no notes"))?)?;

  if notes.is_empty() {
    println!("No notes yet");
    return Ok(());
  }

  let now = Utc::now();
  for note in &notes {
    let age = format_relative_time(note.created_at, now);
    let preview = if note.content.is_empty() {
      note.recognized_text.as_deref().unwrap_or("(pending OCR)")
    } else {
      note.content.as_str()
    };
    let first_line = preview.lines().next().unwrap_or("");

    println!("{} {} [{}] {}", note.id.cyan(), age.dimmed(), note.kind, first_line);

    if verbose {
      if let Some(url) = &note.source.url {
        println!("    source: {url}");
      }
      if let Some(text) = &note.recognized_text {
        println!("    recognized: {text}");
      }
    }
  }
  Ok(())
}

/// Print one note in full.
pub async fn show_note(router: &Router, id: &str) -> Result<()> {
  let note =
    router.store().find_by_id(id).await?.ok_or_else(|| anyhow!("Note {id} not found"))?;

  println!("{} {} [{}]", note.id.cyan(), note.created_at.to_rfc3339().dimmed(), note.kind);
  if !note.content.is_empty() {
    println!("{}", note.content);
  }
  if let Some(url) = &note.source.url {
    println!("source: {url}");
  }
  if let Some(text) = &note.recognized_text {
    println!("recognized: {text}");
  }
  if note.image_data.is_some() {
    println!("{}", "(has embedded screenshot)".dimmed());
  }
  Ok(())
}

/// Replace a note's content.
pub async fn update_note(router: &Router, id: &str, content: &str) -> Result<()> {
  let request = Request::UpdateNoteContent { note_id: id.to_string(), content: content.to_string() };
  let note = note_from_response(router.handle(request).await)?;

  println!("{} Updated note {}", "✓".green(), note.id.cyan());
  Ok(())
}

/// Permanently delete a note.
pub async fn delete_note(router: &Router, id: &str) -> Result<()> {
  expect_success(router.handle(Request::DeleteNote { note_id: id.to_string() }).await)?;

  println!("{} Deleted note {}", "✓".green(), id.cyan());
  Ok(())
}

/// Export every note as pretty-printed JSON, to stdout or a file.
pub async fn export_notes(router: &Router, output: Option<&Path>) -> Result<()> {
  let response = expect_success(router.handle(Request::ExportNotes).await)?;
  let data = response
    .data
    .and_then(|value| value.as_str().map(str::to_string))
    .ok_or_else(|| anyhow!("export produced no data"))?;

  match output {
    Some(path) => {
      std::fs::write(path, &data)?;
      println!("{} Exported notes to {}", "✓".green(), path.display());
    }
    None => println!("{data}"),
  }
  Ok(())
}

/// Import notes from a previous export, skipping ids that already exist.
pub async fn import_notes(router: &Router, input: &Path) -> Result<()> {
  let data = std::fs::read_to_string(input)
    .map_err(|err| anyhow!("could not read {}: {err}", input.display()))?;

  let response = expect_success(router.handle(Request::ImportNotes { data }).await)?;
  let imported = response
    .data
    .as_ref()
    .and_then(|value| value.get("imported"))
    .and_then(|value| value.as_u64())
    .unwrap_or(0);

  println!("{} Imported {} note(s)", "✓".green(), imported);
  Ok(())
}
