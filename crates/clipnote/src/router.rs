//! Message router: the typed request/response contract between front ends
//! (CLI today, a popup or content surface tomorrow) and the core.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::crop::{self, RegionRect, ScrollOffset};
use crate::note::{Note, NotePatch, NoteSource};
use crate::notify::Notifier;
use crate::queue::{ProcessingQueue, QueueItem};
use crate::store::NoteStore;

/// Every request kind the router understands. Tags and field names match the
/// wire contract (`capture-text`, `originUrl`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Request {
  CaptureText {
    text: String,
    #[serde(default)]
    origin_url: Option<String>,
  },
  CaptureRegion {
    rect: RegionRect,
    device_pixel_ratio: f64,
    #[serde(default)]
    scroll: ScrollOffset,
    #[serde(default)]
    origin_url: Option<String>,
    /// The captured viewport image as a PNG data URI.
    image: String,
  },
  SaveNote {
    content: String,
    #[serde(default)]
    source: Option<NoteSource>,
  },
  ListNotes {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
  },
  DeleteNote {
    note_id: String,
  },
  UpdateNoteContent {
    note_id: String,
    content: String,
  },
  ExportNotes,
  ImportNotes {
    data: String,
  },
}

/// Uniform response envelope: a success flag, an optional payload, and a
/// human-readable reason on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterResponse {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl RouterResponse {
  pub fn ok(data: Value) -> Self {
    Self { success: true, data: Some(data), error: None }
  }

  pub fn ok_empty() -> Self {
    Self { success: true, data: None, error: None }
  }

  pub fn fail(reason: impl Into<String>) -> Self {
    Self { success: false, data: None, error: Some(reason.into()) }
  }
}

/// Stateless dispatcher over the note store, the processing queue, and the
/// notifier. Each request kind maps to exactly one operation; nothing that
/// happens in here escapes as a panic or an unhandled error.
pub struct Router {
  store: Arc<dyn NoteStore>,
  queue: ProcessingQueue,
  notifier: Arc<dyn Notifier>,
}

impl Router {
  pub fn new(store: Arc<dyn NoteStore>, queue: ProcessingQueue, notifier: Arc<dyn Notifier>) -> Self {
    Self { store, queue, notifier }
  }

  pub fn store(&self) -> Arc<dyn NoteStore> {
    self.store.clone()
  }

  pub fn queue(&self) -> &ProcessingQueue {
    &self.queue
  }

  /// Entry point for untyped messages. Unknown or malformed request shapes
  /// become a structured failure, never a crash.
  pub async fn dispatch(&self, message: Value) -> RouterResponse {
    let request: Request = match serde_json::from_value(message) {
      Ok(request) => request,
      Err(err) => {
        tracing::debug!(error = %err, "unroutable message");
        return RouterResponse::fail("Unknown request");
      }
    };

    self.handle(request).await
  }

  /// Handle an already-typed request, converting any internal error into a
  /// failure response at this boundary.
  pub async fn handle(&self, request: Request) -> RouterResponse {
    match self.try_handle(request).await {
      Ok(response) => response,
      Err(err) => {
        tracing::error!(error = %err, "request handling failed");
        RouterResponse::fail(err.to_string())
      }
    }
  }

  async fn try_handle(&self, request: Request) -> Result<RouterResponse> {
    match request {
      Request::CaptureText { text, origin_url } => {
        let text = text.trim().to_string();
        if text.is_empty() {
          self.notifier.notify("No text selected");
          return Ok(RouterResponse::fail("No text selected"));
        }

        let source = NoteSource { url: origin_url, selection: Some(text.clone()) };
        let note = Note::text(text, source);
        self.store.insert(note.clone()).await?;
        self.notifier.notify("ClipNote saved");
        Ok(RouterResponse::ok(serde_json::to_value(&note)?))
      }

      Request::CaptureRegion { rect, device_pixel_ratio, scroll: _, origin_url, image } => {
        // The capture is the visible viewport at capture time, so the
        // selection rect is already viewport-relative; scroll offsets are
        // received but not applied.
        let png = crop::decode_data_uri(&image)?;
        let cropped = crop::crop_region(&png, rect, device_pixel_ratio)?;

        let source = NoteSource { url: origin_url, selection: None };
        let note = Note::screenshot(crop::encode_data_uri(&cropped), source);
        self.store.insert(note.clone()).await?;

        // The note is visible immediately; recognized text arrives whenever
        // the queue gets to it.
        self.queue.enqueue(QueueItem::ocr(&note.id));
        self.notifier.notify("ClipNote saved");
        Ok(RouterResponse::ok(serde_json::to_value(&note)?))
      }

      Request::SaveNote { content, source } => {
        if content.trim().is_empty() {
          self.notifier.notify("Nothing to save");
          return Ok(RouterResponse::fail("Note content is empty"));
        }

        let note = Note::text(content, source.unwrap_or_default());
        self.store.insert(note.clone()).await?;
        self.notifier.notify("ClipNote saved");
        Ok(RouterResponse::ok(serde_json::to_value(&note)?))
      }

      Request::ListNotes { limit, offset } => {
        let notes = self.store.list(limit, offset).await?;
        Ok(RouterResponse::ok(serde_json::to_value(&notes)?))
      }

      Request::DeleteNote { note_id } => {
        if self.store.remove(&note_id).await? {
          Ok(RouterResponse::ok_empty())
        } else {
          Ok(RouterResponse::fail("Note not found"))
        }
      }

      Request::UpdateNoteContent { note_id, content } => {
        match self.store.patch(&note_id, NotePatch::content(content)).await? {
          Some(note) => Ok(RouterResponse::ok(serde_json::to_value(&note)?)),
          None => Ok(RouterResponse::fail("Note not found")),
        }
      }

      Request::ExportNotes => {
        let notes = self.store.all().await?;
        Ok(RouterResponse::ok(Value::String(serde_json::to_string_pretty(&notes)?)))
      }

      Request::ImportNotes { data } => {
        let notes: Vec<Note> =
          serde_json::from_str(&data).context("import payload is not a note export")?;

        let mut imported = 0usize;
        for note in notes {
          // Ids are immutable and globally unique; an id we already hold wins.
          if self.store.find_by_id(&note.id).await?.is_none() {
            self.store.insert(note).await?;
            imported += 1;
          }
        }
        Ok(RouterResponse::ok(json!({ "imported": imported })))
      }
    }
  }
}
