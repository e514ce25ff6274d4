//! In-memory repository adapter.
//!
//! # Responsibility
//! - Provide a process-local durable-store stand-in for tests and embedding.
//! - Inject write failures to exercise partial-failure paths.
//!
//! # Invariants
//! - Stored notes are copies; callers never share memory with the store.
//! - Injected failures affect `save`, `delete`, and `rename` only; reads
//!   always succeed.
//! - `rename` only rewrites a note whose stored path still equals
//!   `old_path`, matching the SQLite adapter.

use super::{now_epoch_ms, NoteInfo, NoteRepository, RepoError, RepoResult};
use crate::model::actor::Actor;
use crate::model::note::{Note, NoteId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
struct StoredNote {
    note: Note,
    last_actor: Actor,
}

#[derive(Debug, Default)]
struct FailurePlan {
    all_writes: bool,
    ids: HashSet<NoteId>,
}

impl FailurePlan {
    fn check(&self, id: NoteId) -> RepoResult<()> {
        if self.all_writes || self.ids.contains(&id) {
            return Err(RepoError::Backend(format!("simulated write error for {id}")));
        }
        Ok(())
    }
}

/// Thread-safe in-memory note repository.
#[derive(Debug, Default)]
pub struct InMemoryNoteRepository {
    notes: RwLock<HashMap<NoteId, StoredNote>>,
    failures: RwLock<FailurePlan>,
}

impl InMemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository already holding `notes`, attributed to the
    /// anonymous actor.
    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let repo = Self::new();
        {
            let mut stored = repo.notes.write();
            for note in notes {
                stored.insert(
                    note.id,
                    StoredNote {
                        note,
                        last_actor: Actor::anonymous(),
                    },
                );
            }
        }
        repo
    }

    /// Makes every subsequent write fail while `enabled` is true.
    pub fn set_fail_all_writes(&self, enabled: bool) {
        self.failures.write().all_writes = enabled;
    }

    /// Makes subsequent writes touching `id` fail.
    pub fn fail_writes_for(&self, id: NoteId) {
        self.failures.write().ids.insert(id);
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        *self.failures.write() = FailurePlan::default();
    }

    /// Returns the stored copy of one note, if present.
    pub fn stored(&self, id: NoteId) -> Option<Note> {
        self.notes.read().get(&id).map(|stored| stored.note.clone())
    }

    /// Returns the actor of the last write touching `id`.
    pub fn last_actor(&self, id: NoteId) -> Option<Actor> {
        self.notes
            .read()
            .get(&id)
            .map(|stored| stored.last_actor.clone())
    }

    pub fn len(&self) -> usize {
        self.notes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.read().is_empty()
    }
}

impl NoteRepository for InMemoryNoteRepository {
    fn load(&self, id: NoteId) -> RepoResult<Note> {
        self.notes
            .read()
            .get(&id)
            .map(|stored| stored.note.clone())
            .ok_or(RepoError::NotFound(id))
    }

    fn save(&self, note: &Note, actor: &Actor) -> RepoResult<i64> {
        self.failures.read().check(note.id)?;
        let updated_at = now_epoch_ms();
        let mut stored = note.clone();
        stored.updated_at = updated_at;
        self.notes.write().insert(
            note.id,
            StoredNote {
                note: stored,
                last_actor: actor.clone(),
            },
        );
        Ok(updated_at)
    }

    fn delete(&self, id: NoteId, _actor: &Actor) -> RepoResult<()> {
        self.failures.read().check(id)?;
        self.notes
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound(id))
    }

    fn list(&self) -> RepoResult<Vec<NoteInfo>> {
        let mut infos: Vec<NoteInfo> = self
            .notes
            .read()
            .values()
            .map(|stored| NoteInfo {
                id: stored.note.id,
                path: stored.note.path.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(infos)
    }

    fn rename(
        &self,
        id: NoteId,
        old_path: &str,
        new_path: &str,
        actor: &Actor,
    ) -> RepoResult<i64> {
        self.failures.read().check(id)?;
        let mut notes = self.notes.write();
        let stored = notes.get_mut(&id).ok_or(RepoError::NotFound(id))?;
        let updated_at = now_epoch_ms();
        if stored.note.path == new_path {
            return Ok(updated_at);
        }
        if stored.note.path != old_path {
            return Err(RepoError::InvalidData(format!(
                "note {id} is stored at `{}`, expected `{old_path}`",
                stored.note.path
            )));
        }
        stored.note.path = new_path.to_string();
        stored.note.updated_at = updated_at;
        stored.last_actor = actor.clone();
        Ok(updated_at)
    }
}
