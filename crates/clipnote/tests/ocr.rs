use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mockall::mock;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use clipnote::crop;
use clipnote::note::{Note, NoteSource};
use clipnote::ocr::{OcrEngine, OcrExecutor};
use clipnote::queue::{ExecutorRegistry, JobStep, ProcessingQueue, QueueItem};
use clipnote::store::{MemoryStore, NoteStore};

mock! {
  pub Engine {}

  #[async_trait]
  impl OcrEngine for Engine {
    async fn recognize(&self, png: &[u8]) -> Result<String>;
  }
}

/// Engine that sleeps before answering, for timeout and in-flight tests.
struct SlowEngine {
  delay: Duration,
  text: String,
}

#[async_trait]
impl OcrEngine for SlowEngine {
  async fn recognize(&self, _png: &[u8]) -> Result<String> {
    tokio::time::sleep(self.delay).await;
    Ok(self.text.clone())
  }
}

fn tiny_png() -> Vec<u8> {
  let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 255]));
  let mut out = Vec::new();
  image::DynamicImage::ImageRgba8(img)
    .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
    .unwrap();
  out
}

fn screenshot_note() -> Note {
  Note::screenshot(crop::encode_data_uri(&tiny_png()), NoteSource::default())
}

fn queue_over(store: Arc<dyn NoteStore>, engine: Arc<dyn OcrEngine>) -> ProcessingQueue {
  let executor = OcrExecutor::new(store, engine);
  ProcessingQueue::new(ExecutorRegistry::new().with_ocr(Arc::new(executor)))
}

#[cfg(test)]
mod ocr_tests {
  use super::*;

  #[tokio::test]
  async fn recognized_text_lands_on_the_note() -> Result<()> {
    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let note = screenshot_note();
    store.insert(note.clone()).await?;

    let mut engine = MockEngine::new();
    engine.expect_recognize().times(1).returning(|_| Ok("HELLO WORLD".to_string()));

    let queue = queue_over(store.clone(), Arc::new(engine));
    queue.enqueue(QueueItem::ocr(&note.id));
    queue.wait_idle().await;

    let updated = store.find_by_id(&note.id).await?.expect("note still present");
    assert_eq!(updated.recognized_text.as_deref(), Some("HELLO WORLD"));
    assert!(updated.processed_at.is_some());
    // Everything else is untouched.
    assert_eq!(updated.content, "");
    assert_eq!(updated.image_data, note.image_data);
    Ok(())
  }

  #[tokio::test]
  async fn missing_note_is_a_noop_success() -> Result<()> {
    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());

    let mut engine = MockEngine::new();
    engine.expect_recognize().never();

    let queue = queue_over(store.clone(), Arc::new(engine));
    queue.enqueue(QueueItem::ocr("no-such-note"));
    queue.wait_idle().await;

    let stats = queue.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.retried, 0);
    assert_eq!(stats.dropped, 0);
    Ok(())
  }

  #[tokio::test]
  async fn note_without_image_is_a_noop_success() -> Result<()> {
    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let note = Note::text("plain text note", NoteSource::default());
    store.insert(note.clone()).await?;

    let mut engine = MockEngine::new();
    engine.expect_recognize().never();

    let queue = queue_over(store.clone(), Arc::new(engine));
    queue.enqueue(QueueItem::ocr(&note.id));
    queue.wait_idle().await;

    assert_eq!(queue.stats().completed, 1);
    let untouched = store.find_by_id(&note.id).await?.unwrap();
    assert!(untouched.recognized_text.is_none());
    Ok(())
  }

  #[tokio::test]
  async fn engine_failure_exhausts_retries_and_leaves_note_intact() -> Result<()> {
    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let note = screenshot_note();
    store.insert(note.clone()).await?;

    let mut engine = MockEngine::new();
    // retries = 1 means exactly two attempts before the job is dropped.
    engine.expect_recognize().times(2).returning(|_| Err(anyhow!("model unavailable")));

    let queue = queue_over(store.clone(), Arc::new(engine));
    queue.enqueue(QueueItem::new(&note.id, JobStep::Ocr, 1));
    queue.wait_idle().await;

    let stats = queue.stats();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.retried, 1);

    // Last-good state: the screenshot note is still valid and visible, just
    // without recognized text.
    let untouched = store.find_by_id(&note.id).await?.unwrap();
    assert!(untouched.recognized_text.is_none());
    assert!(untouched.processed_at.is_none());
    assert!(untouched.image_data.is_some());
    Ok(())
  }

  #[tokio::test]
  async fn deleting_a_note_with_a_pending_job_is_not_an_error() -> Result<()> {
    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let slow = screenshot_note();
    let doomed = screenshot_note();
    let healthy = screenshot_note();
    store.insert(slow.clone()).await?;
    store.insert(doomed.clone()).await?;
    store.insert(healthy.clone()).await?;

    let engine = SlowEngine { delay: Duration::from_millis(50), text: "SEEN".to_string() };
    let queue = queue_over(store.clone(), Arc::new(engine));

    queue.enqueue(QueueItem::ocr(&slow.id));
    queue.enqueue(QueueItem::ocr(&doomed.id));
    queue.enqueue(QueueItem::ocr(&healthy.id));

    // While the first job is recognizing, the second job's note disappears.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(store.remove(&doomed.id).await?);

    queue.wait_idle().await;

    // All three jobs completed; the deleted one as a no-op, and the queue
    // kept going afterwards.
    let stats = queue.stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.dropped, 0);

    let processed = store.find_by_id(&healthy.id).await?.unwrap();
    assert_eq!(processed.recognized_text.as_deref(), Some("SEEN"));
    Ok(())
  }

  #[tokio::test]
  async fn timeout_counts_as_a_retryable_failure() -> Result<()> {
    let store: Arc<dyn NoteStore> = Arc::new(MemoryStore::new());
    let note = screenshot_note();
    store.insert(note.clone()).await?;

    let engine = SlowEngine { delay: Duration::from_millis(200), text: "TOO LATE".to_string() };
    let executor = OcrExecutor::new(store.clone(), Arc::new(engine))
      .with_timeout(Duration::from_millis(20));
    let queue = ProcessingQueue::new(ExecutorRegistry::new().with_ocr(Arc::new(executor)));

    queue.enqueue(QueueItem::new(&note.id, JobStep::Ocr, 0));
    queue.wait_idle().await;

    assert_eq!(queue.stats().dropped, 1);
    let untouched = store.find_by_id(&note.id).await?.unwrap();
    assert!(untouched.recognized_text.is_none());
    Ok(())
  }
}
