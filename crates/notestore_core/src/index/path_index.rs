//! Bidirectional path index.
//!
//! # Responsibility
//! - Map every durable note path to its id and back, independent of cache
//!   residency.
//! - Validate and apply single and folder-scoped renames and removals.
//!
//! # Invariants
//! - At most one id per path and one path per id.
//! - Every failing operation leaves both directions untouched.
//! - Folder renames are validated against the post-rename path set before
//!   any entry changes.
//!
//! Not synchronized; `NoteManager` wraps it in a `RwLock`.

use crate::model::note::NoteId;
use crate::model::path::{is_in_folder, rebase, PathError, ROOT};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by path index operations.
pub type PathIndexResult<T> = Result<T, PathIndexError>;

/// Errors from path index operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathIndexError {
    /// Another note already occupies the path.
    PathAlreadyExists(String),
    /// The id is not indexed.
    NotFound(NoteId),
    /// The id is already indexed under another path.
    IdAlreadyIndexed(NoteId),
    /// A rewritten path is not a valid note path.
    InvalidPath(PathError),
}

impl Display for PathIndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PathAlreadyExists(path) => write!(f, "note '{path}' already exists"),
            Self::NotFound(id) => write!(f, "note not indexed: {id}"),
            Self::IdAlreadyIndexed(id) => write!(f, "note id already indexed: {id}"),
            Self::InvalidPath(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PathIndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPath(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PathError> for PathIndexError {
    fn from(value: PathError) -> Self {
        Self::InvalidPath(value)
    }
}

/// One path rewrite produced by a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub id: NoteId,
    pub old_path: String,
    pub new_path: String,
}

/// In-memory `path → id` and `id → path` maps.
#[derive(Debug, Default)]
pub struct PathIndex {
    // Ordered so folder members form one contiguous key range.
    by_path: BTreeMap<String, NoteId>,
    by_id: HashMap<NoteId, String>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from `(id, path)` pairs, rejecting duplicates.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (NoteId, String)>,
    ) -> PathIndexResult<Self> {
        let mut index = Self::new();
        for (id, path) in entries {
            index.add(path, id)?;
        }
        Ok(index)
    }

    /// Registers `path → id`.
    pub fn add(&mut self, path: impl Into<String>, id: NoteId) -> PathIndexResult<()> {
        let path = path.into();
        if self.by_path.contains_key(&path) {
            return Err(PathIndexError::PathAlreadyExists(path));
        }
        if self.by_id.contains_key(&id) {
            return Err(PathIndexError::IdAlreadyIndexed(id));
        }
        self.by_path.insert(path.clone(), id);
        self.by_id.insert(id, path);
        Ok(())
    }

    /// Validates a single-note move without applying it.
    ///
    /// Returns the note's current path.
    pub fn check_move(&self, id: NoteId, new_path: &str) -> PathIndexResult<String> {
        let old_path = self.by_id.get(&id).ok_or(PathIndexError::NotFound(id))?;
        match self.by_path.get(new_path) {
            Some(occupant) if *occupant != id => {
                Err(PathIndexError::PathAlreadyExists(new_path.to_string()))
            }
            _ => Ok(old_path.clone()),
        }
    }

    /// Moves one note to `new_path`. A no-op when the path is unchanged.
    pub fn move_note(&mut self, id: NoteId, new_path: &str) -> PathIndexResult<PathChange> {
        let old_path = self.check_move(id, new_path)?;
        if old_path != new_path {
            self.by_path.remove(&old_path);
            self.by_path.insert(new_path.to_string(), id);
            self.by_id.insert(id, new_path.to_string());
        }
        Ok(PathChange {
            id,
            old_path,
            new_path: new_path.to_string(),
        })
    }

    /// Computes every rewrite a folder move would apply, validated against
    /// the post-rename path set.
    pub fn plan_move_folder(
        &self,
        old_folder: &str,
        new_folder: &str,
    ) -> PathIndexResult<Vec<PathChange>> {
        if old_folder == new_folder {
            return Ok(Vec::new());
        }

        let mut changes = Vec::new();
        for (path, id) in self.folder_range(old_folder) {
            changes.push(PathChange {
                id: *id,
                old_path: path.clone(),
                new_path: rebase(path, old_folder, new_folder)?,
            });
        }

        for change in &changes {
            if let Some(occupant_path) = self
                .by_path
                .get(&change.new_path)
                .and_then(|occupant| self.by_id.get(occupant))
            {
                // Occupants inside the moved folder vacate their path.
                if !is_in_folder(occupant_path, old_folder) {
                    return Err(PathIndexError::PathAlreadyExists(change.new_path.clone()));
                }
            }
        }
        Ok(changes)
    }

    /// Rewrites every path in `old_folder` to live under `new_folder`.
    ///
    /// All-or-nothing: on error nothing changes.
    pub fn move_folder(
        &mut self,
        old_folder: &str,
        new_folder: &str,
    ) -> PathIndexResult<Vec<PathChange>> {
        let changes = self.plan_move_folder(old_folder, new_folder)?;
        for change in &changes {
            self.by_path.remove(&change.old_path);
        }
        for change in &changes {
            self.by_path.insert(change.new_path.clone(), change.id);
            self.by_id.insert(change.id, change.new_path.clone());
        }
        Ok(changes)
    }

    /// Removes one note. Returns its former path.
    pub fn remove(&mut self, id: NoteId) -> Option<String> {
        let path = self.by_id.remove(&id)?;
        self.by_path.remove(&path);
        Some(path)
    }

    /// Removes every note in `folder`. Returns the removed `(id, path)` pairs
    /// in path order.
    pub fn remove_folder(&mut self, folder: &str) -> Vec<(NoteId, String)> {
        let removed: Vec<(NoteId, String)> = self
            .folder_range(folder)
            .map(|(path, id)| (*id, path.clone()))
            .collect();
        for (id, path) in &removed {
            self.by_path.remove(path);
            self.by_id.remove(id);
        }
        removed
    }

    /// Full `id → path` mapping.
    pub fn list(&self) -> HashMap<NoteId, String> {
        self.by_id.clone()
    }

    pub fn path_of(&self, id: NoteId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn id_at(&self, path: &str) -> Option<NoteId> {
        self.by_path.get(path).copied()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn contains_id(&self, id: NoteId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Returns whether at least one note lives in `folder`.
    pub fn contains_folder(&self, folder: &str) -> bool {
        self.folder_range(folder).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn folder_range<'a>(
        &'a self,
        folder: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a NoteId)> + 'a {
        // `/` sorts directly before `0`, so `[folder, folder + "0")` holds the
        // folder path itself, its nested paths, and siblings like `folder-x`.
        let upper = if folder == ROOT {
            None
        } else {
            Some(format!("{folder}0"))
        };
        let range = match upper {
            Some(upper) => self.by_path.range(folder.to_string()..upper),
            None => self.by_path.range(String::new()..),
        };
        range.filter(move |(path, _)| is_in_folder(path, folder))
    }
}
