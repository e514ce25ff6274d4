//! Note lifecycle orchestrator.
//!
//! # Responsibility
//! - Compose the path index, note cache, and repository adapter.
//! - Expose add/save/move/remove at note and folder scope, plus pinned
//!   access to materialized notes.
//!
//! # Invariants
//! - Path collisions and unknown ids are rejected before any repository
//!   call, leaving index and cache untouched.
//! - Single-note mutations persist while the index write lock is held, so
//!   a failed repository call leaves no trace and concurrent mutations are
//!   totally ordered.
//! - Folder operations commit the index first and then persist per note;
//!   repository failures surface as `PartialFolderMove`/`PartialFolderRemove`
//!   and the index is not rolled back.
//! - The index is authoritative for paths. Notes loaded on a cache miss
//!   take their path from the index, never from the stored row.
//! - The index lock is never held while waiting on a note body. Resident
//!   copies are refreshed after the index guard drops, by reading the index
//!   under the body lock, so the last refresh always sees the latest path.
//! - The cache never takes the index lock.

use crate::cache::note_cache::{NoteCache, PinGuard, SharedNote};
use crate::config::{ConfigError, NoteStoreConfig};
use crate::index::path_index::{PathChange, PathIndex, PathIndexError};
use crate::model::actor::Actor;
use crate::model::note::{Note, NoteId};
use crate::model::path::{normalize_folder_path, normalize_note_path, PathError};
use crate::repo::{NoteRepository, RepoError};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by `NoteManager` operations.
pub type NoteManagerResult<T> = Result<T, NoteManagerError>;

/// Errors from note manager operations.
#[derive(Debug)]
pub enum NoteManagerError {
    /// Another note already occupies the path.
    PathAlreadyExists(String),
    /// No note exists for the id.
    NotFound(NoteId),
    /// `add_note` was called with an id that is already registered.
    NoteIdAlreadyExists(NoteId),
    /// Caller-supplied path cannot be normalized.
    InvalidPath(PathError),
    /// Manager configuration was rejected.
    Config(ConfigError),
    /// Repository adapter failure, propagated unmodified.
    Io(RepoError),
    /// Folder rename committed in the index, but some notes were not
    /// persisted.
    PartialFolderMove {
        from: String,
        to: String,
        moved: Vec<PathChange>,
        failed: Vec<(PathChange, RepoError)>,
    },
    /// Folder removal committed in the index and cache, but some notes were
    /// not deleted durably.
    PartialFolderRemove {
        folder: String,
        removed: Vec<NoteId>,
        failed: Vec<(NoteId, RepoError)>,
    },
}

impl Display for NoteManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PathAlreadyExists(path) => write!(f, "note '{path}' already exists"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::NoteIdAlreadyExists(id) => write!(f, "note id already exists: {id}"),
            Self::InvalidPath(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::PartialFolderMove {
                from,
                to,
                moved,
                failed,
            } => write!(
                f,
                "moved folder '{from}' to '{to}' but persisted only {} of {} notes; failed: {}",
                moved.len(),
                moved.len() + failed.len(),
                join_failures(failed.iter().map(|(change, err)| (change.id, err)))
            ),
            Self::PartialFolderRemove {
                folder,
                removed,
                failed,
            } => write!(
                f,
                "removed folder '{folder}' but deleted only {} of {} notes; failed: {}",
                removed.len(),
                removed.len() + failed.len(),
                join_failures(failed.iter().map(|(id, err)| (*id, err)))
            ),
        }
    }
}

impl Error for NoteManagerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPath(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteManagerError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Io(other),
        }
    }
}

impl From<PathIndexError> for NoteManagerError {
    fn from(value: PathIndexError) -> Self {
        match value {
            PathIndexError::PathAlreadyExists(path) => Self::PathAlreadyExists(path),
            PathIndexError::NotFound(id) => Self::NotFound(id),
            PathIndexError::IdAlreadyIndexed(id) => Self::NoteIdAlreadyExists(id),
            PathIndexError::InvalidPath(err) => Self::InvalidPath(err),
        }
    }
}

impl From<PathError> for NoteManagerError {
    fn from(value: PathError) -> Self {
        Self::InvalidPath(value)
    }
}

impl From<ConfigError> for NoteManagerError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

fn join_failures<'a>(failures: impl Iterator<Item = (NoteId, &'a RepoError)>) -> String {
    failures
        .map(|(id, err)| format!("{id} ({err})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bounded note cache over a durable repository, indexed by id and path.
pub struct NoteManager<R: NoteRepository> {
    repo: R,
    index: RwLock<PathIndex>,
    cache: NoteCache,
}

impl<R: NoteRepository> NoteManager<R> {
    /// Creates a manager and seeds the path index from `repo.list()`.
    ///
    /// # Errors
    /// - `Config` when the threshold is invalid.
    /// - `PathAlreadyExists` when the repository lists one path twice.
    /// - `Io` when enumeration fails.
    pub fn new(repo: R, config: NoteStoreConfig) -> NoteManagerResult<Self> {
        config.validate()?;
        let index = load_index(&repo)?;
        info!(
            "event=note_manager_init module=note_manager status=ok notes={} cache_threshold={}",
            index.len(),
            config.note_cache_threshold
        );
        Ok(Self {
            repo,
            index: RwLock::new(index),
            cache: NoteCache::new(config.note_cache_threshold),
        })
    }

    /// Discards every cached note and re-seeds the index from the repository.
    ///
    /// On error the previous index stays active.
    pub fn reload(&self) -> NoteManagerResult<()> {
        let fresh = load_index(&self.repo)?;
        let mut index = self.index.write();
        *index = fresh;
        self.cache.clear();
        info!(
            "event=note_reload module=note_manager status=ok notes={}",
            index.len()
        );
        Ok(())
    }

    /// Registers a new note, persists it, and caches it.
    ///
    /// # Errors
    /// - `PathAlreadyExists` when `note.path` is occupied.
    /// - `NoteIdAlreadyExists` when `note.id` is already registered.
    /// - `Io` when the repository rejects the write; nothing is registered.
    pub fn add_note(&self, mut note: Note, actor: &Actor) -> NoteManagerResult<()> {
        note.path = normalize_note_path(&note.path)?;
        let mut index = self.index.write();
        if index.contains_id(note.id) {
            return Err(NoteManagerError::NoteIdAlreadyExists(note.id));
        }
        self.register(&mut index, note, actor)
    }

    /// Persists `note`, registering it first when its id is unknown.
    ///
    /// A known id saved under a new path is validated like `move_note`.
    pub fn save_note(&self, mut note: Note, actor: &Actor) -> NoteManagerResult<()> {
        note.path = normalize_note_path(&note.path)?;
        let mut index = self.index.write();
        if !index.contains_id(note.id) {
            return self.register(&mut index, note, actor);
        }

        index.check_move(note.id, &note.path)?;
        note.updated_at = self.persist(&note, actor, "note_save")?;
        index.move_note(note.id, &note.path)?;
        info!(
            "event=note_save module=note_manager status=ok note_id={} path={} actor={}",
            note.id, note.path, actor.user
        );
        self.cache.put(note);
        Ok(())
    }

    /// Full `id → path` mapping of every durable note.
    pub fn get_notes_info(&self) -> HashMap<NoteId, String> {
        self.index.read().list()
    }

    /// Runs `f` on the materialized note under its exclusive lock.
    ///
    /// The note is pinned for the whole call, so capacity eviction cannot
    /// drop it mid-access. Changes made by `f` live in the cache only; use
    /// `save_note` to persist them. A concurrent move of the same note
    /// commits immediately and refreshes the cached path once `f` returns;
    /// other notes are unaffected. `f` must not move or save the same note.
    pub fn process_note<T>(
        &self,
        id: NoteId,
        f: impl FnOnce(&mut Note) -> T,
    ) -> NoteManagerResult<T> {
        let _pin = self.cache.pin(id);
        let shared = self.materialize(id)?;
        let mut note = shared.write();
        Ok(f(&mut note))
    }

    /// Runs `f` on the materialized note under its shared lock.
    pub fn read_note<T>(&self, id: NoteId, f: impl FnOnce(&Note) -> T) -> NoteManagerResult<T> {
        let _pin = self.cache.pin(id);
        let shared = self.materialize(id)?;
        let note = shared.read();
        Ok(f(&note))
    }

    /// Exempts `id` from capacity eviction until the guard drops.
    ///
    /// The pin may be taken before the note is resident or even added.
    pub fn pin_note(&self, id: NoteId) -> PinGuard {
        self.cache.pin(id)
    }

    /// Moves one note to `new_path`. A no-op when the path is unchanged.
    ///
    /// # Errors
    /// - `NotFound` when `id` is unknown.
    /// - `PathAlreadyExists` when another note occupies `new_path`.
    /// - `Io` when the repository rejects the rename; nothing changes.
    pub fn move_note(&self, id: NoteId, new_path: &str, actor: &Actor) -> NoteManagerResult<()> {
        let new_path = normalize_note_path(new_path)?;
        let updated_at = {
            let mut index = self.index.write();
            let old_path = index.check_move(id, &new_path)?;
            if old_path == new_path {
                return Ok(());
            }

            let updated_at = self
                .repo
                .rename(id, &old_path, &new_path, actor)
                .map_err(|err| log_repo_error("note_move", id, err))?;
            index.move_note(id, &new_path)?;
            info!(
                "event=note_move module=note_manager status=ok note_id={} from={} to={} actor={}",
                id, old_path, new_path, actor.user
            );
            updated_at
        };

        self.refresh_resident(id, Some(updated_at));
        Ok(())
    }

    /// Moves every note in `old_folder` under `new_folder`.
    ///
    /// The index rewrite is all-or-nothing and validated before any change.
    /// Once committed, each rename is persisted independently; failures are
    /// reported through `PartialFolderMove` and the index keeps the new
    /// paths.
    pub fn move_folder(
        &self,
        old_folder: &str,
        new_folder: &str,
        actor: &Actor,
    ) -> NoteManagerResult<Vec<PathChange>> {
        let old_folder = normalize_folder_path(old_folder)?;
        let new_folder = normalize_folder_path(new_folder)?;

        let changes = self.index.write().move_folder(&old_folder, &new_folder)?;
        for change in &changes {
            self.refresh_resident(change.id, None);
        }

        let mut moved = Vec::with_capacity(changes.len());
        let mut failed = Vec::new();
        for change in changes {
            match self
                .repo
                .rename(change.id, &change.old_path, &change.new_path, actor)
            {
                Ok(updated_at) => {
                    self.refresh_resident(change.id, Some(updated_at));
                    moved.push(change);
                }
                Err(err) => {
                    error!(
                        "event=folder_move module=note_manager status=error note_id={} from={} to={} error={}",
                        change.id, change.old_path, change.new_path, err
                    );
                    failed.push((change, err));
                }
            }
        }

        if !failed.is_empty() {
            return Err(NoteManagerError::PartialFolderMove {
                from: old_folder,
                to: new_folder,
                moved,
                failed,
            });
        }
        info!(
            "event=folder_move module=note_manager status=ok from={} to={} notes={} actor={}",
            old_folder,
            new_folder,
            moved.len(),
            actor.user
        );
        Ok(moved)
    }

    /// Deletes one note durably, then drops it from cache and index.
    ///
    /// Pins do not block removal. A note already missing from the repository
    /// is still unregistered.
    pub fn remove_note(&self, id: NoteId, actor: &Actor) -> NoteManagerResult<()> {
        let mut index = self.index.write();
        let path = index
            .path_of(id)
            .map(str::to_string)
            .ok_or(NoteManagerError::NotFound(id))?;

        match self.repo.delete(id, actor) {
            Ok(()) => {}
            Err(RepoError::NotFound(_)) => {
                warn!(
                    "event=note_remove module=note_manager status=repaired note_id={id} path={path} reason=missing_in_repo"
                );
            }
            Err(err) => return Err(log_repo_error("note_remove", id, err)),
        }

        self.cache.remove(id);
        index.remove(id);
        info!(
            "event=note_remove module=note_manager status=ok note_id={} path={} actor={}",
            id, path, actor.user
        );
        Ok(())
    }

    /// Removes every note in `folder` from index and cache, then deletes each
    /// durably.
    ///
    /// Returns the removed ids in path order. Durable failures are reported
    /// through `PartialFolderRemove`; the index keeps them removed.
    pub fn remove_folder(&self, folder: &str, actor: &Actor) -> NoteManagerResult<Vec<NoteId>> {
        let folder = normalize_folder_path(folder)?;

        let entries = {
            let mut index = self.index.write();
            let entries = index.remove_folder(&folder);
            for (id, _) in &entries {
                self.cache.remove(*id);
            }
            entries
        };

        let mut removed = Vec::with_capacity(entries.len());
        let mut failed = Vec::new();
        for (id, path) in entries {
            match self.repo.delete(id, actor) {
                Ok(()) | Err(RepoError::NotFound(_)) => removed.push(id),
                Err(err) => {
                    error!(
                        "event=folder_remove module=note_manager status=error note_id={id} path={path} error={err}"
                    );
                    failed.push((id, err));
                }
            }
        }

        if !failed.is_empty() {
            return Err(NoteManagerError::PartialFolderRemove {
                folder,
                removed,
                failed,
            });
        }
        info!(
            "event=folder_remove module=note_manager status=ok folder={} notes={} actor={}",
            folder,
            removed.len(),
            actor.user
        );
        Ok(removed)
    }

    /// Returns whether a note exists at `path`. Invalid paths never exist.
    pub fn contains_note(&self, path: &str) -> bool {
        normalize_note_path(path)
            .map(|path| self.index.read().contains_path(&path))
            .unwrap_or(false)
    }

    /// Returns whether at least one note lives in `folder`.
    pub fn contains_folder(&self, folder: &str) -> bool {
        normalize_folder_path(folder)
            .map(|folder| self.index.read().contains_folder(&folder))
            .unwrap_or(false)
    }

    /// Current path of `id`, if registered.
    pub fn note_path(&self, id: NoteId) -> Option<String> {
        self.index.read().path_of(id).map(str::to_string)
    }

    /// Number of resident cache entries, pinned ones included.
    pub fn get_cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Configured capacity `T` of the note cache.
    pub fn cache_threshold(&self) -> usize {
        self.cache.threshold()
    }

    /// Underlying repository adapter.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn register(
        &self,
        index: &mut PathIndex,
        mut note: Note,
        actor: &Actor,
    ) -> NoteManagerResult<()> {
        if index.contains_path(&note.path) {
            return Err(NoteManagerError::PathAlreadyExists(note.path));
        }
        note.updated_at = self.persist(&note, actor, "note_add")?;
        index.add(note.path.clone(), note.id)?;
        info!(
            "event=note_add module=note_manager status=ok note_id={} path={} actor={}",
            note.id, note.path, actor.user
        );
        self.cache.put(note);
        Ok(())
    }

    fn persist(&self, note: &Note, actor: &Actor, event: &str) -> NoteManagerResult<i64> {
        self.repo
            .save(note, actor)
            .map_err(|err| log_repo_error(event, note.id, err))
    }

    /// Resolves `id` through the cache, loading it on a miss.
    ///
    /// Holds the index read lock so a concurrent removal or move cannot
    /// interleave between the path lookup and cache population. A loaded
    /// note takes its path from the index, since the stored row may still
    /// carry the pre-move path while a folder rename is being persisted or
    /// after it partially failed.
    fn materialize(&self, id: NoteId) -> NoteManagerResult<SharedNote> {
        let index = self.index.read();
        let path = index.path_of(id).ok_or(NoteManagerError::NotFound(id))?;
        let shared = self.cache.get_or_load(id, || {
            self.repo.load(id).map(|mut note| {
                if note.path != path {
                    debug!(
                        "event=note_load module=note_manager status=repaired note_id={} stored_path={} path={}",
                        id, note.path, path
                    );
                    note.path = path.to_string();
                }
                note
            })
        })?;
        drop(index);
        Ok(shared)
    }

    /// Copies the indexed path (and `updated_at`, when given) onto the
    /// resident copy of `id`.
    ///
    /// Must be called without the index guard held: it waits on the note
    /// body, which a `process_note` caller may hold for a long time, and
    /// only reads the index once that body lock is acquired.
    fn refresh_resident(&self, id: NoteId, updated_at: Option<i64>) {
        let Some(shared) = self.cache.peek(id) else {
            return;
        };
        let mut note = shared.write();
        if let Some(path) = self.index.read().path_of(id) {
            note.path = path.to_string();
        }
        if let Some(updated_at) = updated_at {
            note.updated_at = updated_at;
        }
    }
}

fn load_index<R: NoteRepository>(repo: &R) -> NoteManagerResult<PathIndex> {
    let infos = repo.list()?;
    let index = PathIndex::from_entries(infos.into_iter().map(|info| (info.id, info.path)))?;
    Ok(index)
}

fn log_repo_error(event: &str, id: NoteId, err: RepoError) -> NoteManagerError {
    error!("event={event} module=note_manager status=error note_id={id} error={err}");
    err.into()
}
