use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version of the persisted note layout. Evolution is additive-only: new
/// optional fields may appear, existing fields are never removed or repurposed
/// without bumping this.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
  Text,
  Voice,
  Screenshot,
}

impl std::fmt::Display for NoteKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      NoteKind::Text => write!(f, "text"),
      NoteKind::Voice => write!(f, "voice"),
      NoteKind::Screenshot => write!(f, "screenshot"),
    }
  }
}

/// Provenance of a captured note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteSource {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub selection: Option<String>,
}

/// A persisted unit of captured content.
///
/// Screenshot notes are created with `image_data` set and `recognized_text`
/// absent; OCR fills the latter in asynchronously, so a note is visible and
/// editable before recognition finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
  pub id: String,
  pub kind: NoteKind,
  pub content: String,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub source: NoteSource,
  /// Embedded screenshot payload as a self-contained PNG data URI.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_data: Option<String>,
  /// OCR output, absent until post-processing completes.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recognized_text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub processed_at: Option<DateTime<Utc>>,
}

impl Note {
  fn new(kind: NoteKind, content: String, source: NoteSource) -> Self {
    Self {
      id: generate_id(),
      kind,
      content,
      created_at: Utc::now(),
      source,
      image_data: None,
      recognized_text: None,
      processed_at: None,
    }
  }

  /// Create a text note from captured or typed content.
  pub fn text(content: impl Into<String>, source: NoteSource) -> Self {
    Self::new(NoteKind::Text, content.into(), source)
  }

  /// Create a screenshot note. Content starts empty; OCR may fill
  /// `recognized_text` later.
  pub fn screenshot(image_data: String, source: NoteSource) -> Self {
    let mut note = Self::new(NoteKind::Screenshot, String::new(), source);
    note.image_data = Some(image_data);
    note
  }
}

/// Fields that may change after creation. `None` leaves a field untouched, so
/// concurrent patches of distinct fields never clobber each other.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
  pub content: Option<String>,
  pub recognized_text: Option<String>,
  pub processed_at: Option<DateTime<Utc>>,
}

impl NotePatch {
  /// Patch that replaces the primary content.
  pub fn content(content: impl Into<String>) -> Self {
    Self { content: Some(content.into()), ..Self::default() }
  }

  /// Patch recorded when OCR finishes.
  pub fn recognition(text: impl Into<String>, at: DateTime<Utc>) -> Self {
    Self { recognized_text: Some(text.into()), processed_at: Some(at), ..Self::default() }
  }

  /// Apply the named fields to a note, leaving everything else untouched.
  pub fn apply(&self, note: &mut Note) {
    if let Some(content) = &self.content {
      note.content = content.clone();
    }
    if let Some(text) = &self.recognized_text {
      note.recognized_text = Some(text.clone());
    }
    if let Some(at) = self.processed_at {
      note.processed_at = Some(at);
    }
  }
}

/// Generate a fresh globally unique note id.
pub fn generate_id() -> String {
  Uuid::new_v4().to_string()
}

/// Human-readable age of a timestamp, for list views.
pub fn format_relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let elapsed = now.signed_duration_since(ts);
  let minutes = elapsed.num_minutes();

  if minutes < 1 {
    return "just now".to_string();
  }
  if minutes < 60 {
    return format!("{minutes}m ago");
  }

  let hours = elapsed.num_hours();
  if hours < 24 {
    return format!("{hours}h ago");
  }

  let days = elapsed.num_days();
  if days < 7 {
    return format!("{days}d ago");
  }

  ts.format("%Y-%m-%d").to_string()
}
