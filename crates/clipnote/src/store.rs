use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dirs::home_dir;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::note::{Note, NotePatch};

/// Narrow repository interface over the durable note collection.
///
/// Mutations are single-record and atomic: `patch` changes only the fields the
/// patch names, in one indivisible operation, so a popup edit of `content` and
/// an in-flight OCR write of `recognizedText` cannot lose each other's update.
#[async_trait]
pub trait NoteStore: Send + Sync {
  /// Persist a new note. Fails if the id already exists.
  async fn insert(&self, note: Note) -> Result<()>;

  async fn find_by_id(&self, id: &str) -> Result<Option<Note>>;

  /// Apply a field patch. Returns the updated note, or `None` if the id is
  /// unknown.
  async fn patch(&self, id: &str, patch: NotePatch) -> Result<Option<Note>>;

  /// Hard delete. Returns whether anything was removed.
  async fn remove(&self, id: &str) -> Result<bool>;

  /// Notes ordered newest-first by creation time.
  async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<Note>>;

  /// Every note, newest-first. Export support.
  async fn all(&self) -> Result<Vec<Note>>;
}

/// Resolve the on-disk notes root: `CLIPNOTE_NOTES_ROOT` if set, otherwise
/// `~/.clipnote/notes`.
pub fn get_notes_root() -> Result<PathBuf> {
  if let Ok(root) = std::env::var("CLIPNOTE_NOTES_ROOT") {
    return Ok(PathBuf::from(root));
  }

  let home = home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
  Ok(home.join(".clipnote").join("notes"))
}

fn sort_newest_first(notes: &mut [Note]) {
  // Tie-break on id so equal timestamps still order deterministically.
  notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

fn page(mut notes: Vec<Note>, limit: Option<usize>, offset: Option<usize>) -> Vec<Note> {
  let offset = offset.unwrap_or(0);
  if offset >= notes.len() {
    return Vec::new();
  }
  notes.drain(..offset);
  if let Some(limit) = limit {
    notes.truncate(limit);
  }
  notes
}

/// File-backed store: one pretty-printed JSON document per note under the
/// notes root. Mutations serialize on an internal lock, which is what makes
/// the read-modify-write in `patch` atomic.
pub struct FileStore {
  root: PathBuf,
  write_lock: Mutex<()>,
}

impl FileStore {
  pub fn open(root: PathBuf) -> Result<Self> {
    fs::create_dir_all(&root)
      .with_context(|| format!("creating notes root {}", root.display()))?;
    Ok(Self { root, write_lock: Mutex::new(()) })
  }

  pub fn open_default() -> Result<Self> {
    Self::open(get_notes_root()?)
  }

  pub fn root(&self) -> &PathBuf {
    &self.root
  }

  fn note_path(&self, id: &str) -> PathBuf {
    self.root.join(format!("{id}.note.json"))
  }

  fn read_note(&self, path: &PathBuf) -> Result<Note> {
    let raw = fs::read_to_string(path)
      .with_context(|| format!("reading note file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing note file {}", path.display()))
  }

  fn write_note(&self, note: &Note) -> Result<()> {
    let path = self.note_path(&note.id);
    let raw = serde_json::to_string_pretty(note)?;
    fs::write(&path, raw).with_context(|| format!("writing note file {}", path.display()))
  }

  fn load_all(&self) -> Result<Vec<Note>> {
    let mut notes = Vec::new();

    for entry in fs::read_dir(&self.root)? {
      let path = entry?.path();
      let is_note = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".note.json"));
      if !is_note {
        continue;
      }
      // A single corrupt or half-written file must not take the whole
      // collection offline with it.
      match self.read_note(&path) {
        Ok(note) => notes.push(note),
        Err(err) => {
          tracing::warn!(path = %path.display(), error = %err, "skipping unreadable note file");
        }
      }
    }

    sort_newest_first(&mut notes);
    Ok(notes)
  }
}

#[async_trait]
impl NoteStore for FileStore {
  async fn insert(&self, note: Note) -> Result<()> {
    let _guard = self.write_lock.lock().await;

    if self.note_path(&note.id).exists() {
      return Err(anyhow!("Note {} already exists", note.id));
    }
    self.write_note(&note)
  }

  async fn find_by_id(&self, id: &str) -> Result<Option<Note>> {
    let path = self.note_path(id);
    if !path.exists() {
      return Ok(None);
    }
    Ok(Some(self.read_note(&path)?))
  }

  async fn patch(&self, id: &str, patch: NotePatch) -> Result<Option<Note>> {
    let _guard = self.write_lock.lock().await;

    let path = self.note_path(id);
    if !path.exists() {
      return Ok(None);
    }

    let mut note = self.read_note(&path)?;
    patch.apply(&mut note);
    self.write_note(&note)?;
    Ok(Some(note))
  }

  async fn remove(&self, id: &str) -> Result<bool> {
    let _guard = self.write_lock.lock().await;

    let path = self.note_path(id);
    if !path.exists() {
      return Ok(false);
    }
    fs::remove_file(&path).with_context(|| format!("deleting note file {}", path.display()))?;
    Ok(true)
  }

  async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<Note>> {
    Ok(page(self.load_all()?, limit, offset))
  }

  async fn all(&self) -> Result<Vec<Note>> {
    self.load_all()
  }
}

/// In-memory store with the same contract. Used in tests and anywhere
/// persistence is not wanted.
#[derive(Default)]
pub struct MemoryStore {
  notes: Mutex<HashMap<String, Note>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl NoteStore for MemoryStore {
  async fn insert(&self, note: Note) -> Result<()> {
    let mut notes = self.notes.lock().await;
    if notes.contains_key(&note.id) {
      return Err(anyhow!("Note {} already exists", note.id));
    }
    notes.insert(note.id.clone(), note);
    Ok(())
  }

  async fn find_by_id(&self, id: &str) -> Result<Option<Note>> {
    Ok(self.notes.lock().await.get(id).cloned())
  }

  async fn patch(&self, id: &str, patch: NotePatch) -> Result<Option<Note>> {
    let mut notes = self.notes.lock().await;
    match notes.get_mut(id) {
      Some(note) => {
        patch.apply(note);
        Ok(Some(note.clone()))
      }
      None => Ok(None),
    }
  }

  async fn remove(&self, id: &str) -> Result<bool> {
    Ok(self.notes.lock().await.remove(id).is_some())
  }

  async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<Note>> {
    let mut notes: Vec<Note> = self.notes.lock().await.values().cloned().collect();
    sort_newest_first(&mut notes);
    Ok(page(notes, limit, offset))
  }

  async fn all(&self) -> Result<Vec<Note>> {
    let mut notes: Vec<Note> = self.notes.lock().await.values().cloned().collect();
    sort_newest_first(&mut notes);
    Ok(notes)
  }
}
