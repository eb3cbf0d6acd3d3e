//! OCR boundary: the recognition engine seam and the queue executor that
//! writes recognized text back onto notes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use uuid::Uuid;

use crate::crop;
use crate::note::NotePatch;
use crate::queue::{JobExecutor, QueueItem};
use crate::store::NoteStore;

/// Wall-clock budget for one recognition pass. Expiry surfaces as a failure
/// so the queue's retry policy applies.
pub const OCR_TIMEOUT: Duration = Duration::from_secs(30);

/// Converts an image into recognized text. External collaborator; anything
/// beyond "bytes in, text out" lives behind this seam.
#[async_trait]
pub trait OcrEngine: Send + Sync {
  async fn recognize(&self, png: &[u8]) -> Result<String>;
}

/// Engine backed by a locally installed `tesseract` binary: the image goes to
/// a temp file, recognized text comes back on stdout.
pub struct TesseractEngine {
  binary: String,
}

impl TesseractEngine {
  pub fn new() -> Self {
    Self { binary: "tesseract".to_string() }
  }

  pub fn with_binary(binary: impl Into<String>) -> Self {
    Self { binary: binary.into() }
  }
}

impl Default for TesseractEngine {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
  async fn recognize(&self, png: &[u8]) -> Result<String> {
    let input = std::env::temp_dir().join(format!("clipnote-ocr-{}.png", Uuid::new_v4()));
    tokio::fs::write(&input, png)
      .await
      .with_context(|| format!("writing OCR input {}", input.display()))?;

    let output = Command::new(&self.binary).arg(&input).arg("stdout").output().await;
    let _ = tokio::fs::remove_file(&input).await;

    let output = output.with_context(|| format!("failed to run {}", self.binary))?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(anyhow!("{} exited with {}: {}", self.binary, output.status, stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }
}

/// Queue executor for `JobStep::Ocr`.
///
/// A note that was deleted after enqueue, or that carries no image payload, is
/// a benign no-op success. Recognized text lands in a single atomic patch, so
/// a failed run leaves the note exactly as it was.
pub struct OcrExecutor {
  store: Arc<dyn NoteStore>,
  engine: Arc<dyn OcrEngine>,
  timeout: Duration,
}

impl OcrExecutor {
  pub fn new(store: Arc<dyn NoteStore>, engine: Arc<dyn OcrEngine>) -> Self {
    Self { store, engine, timeout: OCR_TIMEOUT }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

#[async_trait]
impl JobExecutor for OcrExecutor {
  async fn execute(&self, item: &QueueItem) -> Result<()> {
    let Some(note) = self.store.find_by_id(&item.note_id).await? else {
      // Deleted after enqueue. This is the de facto cancellation path.
      tracing::info!(note_id = %item.note_id, "note gone before OCR, skipping");
      return Ok(());
    };

    let Some(image_data) = note.image_data.as_deref() else {
      tracing::info!(note_id = %note.id, "note has no image payload, skipping OCR");
      return Ok(());
    };

    let png = crop::decode_data_uri(image_data)?;

    let recognized = tokio::time::timeout(self.timeout, self.engine.recognize(&png))
      .await
      .map_err(|_| anyhow!("OCR did not finish within {:?}", self.timeout))??;

    tracing::debug!(note_id = %note.id, chars = recognized.len(), "OCR completed");

    // `patch` returning None means the note vanished mid-recognition; nothing
    // left to update, still a success.
    self.store.patch(&note.id, NotePatch::recognition(recognized, Utc::now())).await?;
    Ok(())
  }
}
