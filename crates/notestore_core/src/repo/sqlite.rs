//! SQLite-backed repository adapter.
//!
//! # Responsibility
//! - Persist notes in the `notes` table created by migration 1.
//! - Keep SQL details inside the repository boundary.
//!
//! # Invariants
//! - The adapter only accepts connections migrated to the latest version.
//! - Read paths reject malformed rows instead of masking them.
//! - `rename` only rewrites a row whose stored path still equals `old_path`.

use super::{now_epoch_ms, NoteInfo, NoteRepository, RepoError, RepoResult};
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::open_db;
use crate::model::actor::Actor;
use crate::model::note::{Note, NoteId};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

/// SQLite-backed note repository owning its connection.
pub struct SqliteNoteRepository {
    conn: Mutex<Connection>,
}

impl SqliteNoteRepository {
    /// Wraps a migrated connection.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        let actual_version = current_user_version(&conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Returns the actor recorded by the last write touching `id`.
    pub fn last_actor(&self, id: NoteId) -> RepoResult<Option<String>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT updated_by FROM notes WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user)
    }
}

impl NoteRepository for SqliteNoteRepository {
    fn load(&self, id: NoteId) -> RepoResult<Note> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, path, content, updated_at FROM notes WHERE id = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return parse_note_row(row);
        }
        Err(RepoError::NotFound(id))
    }

    fn save(&self, note: &Note, actor: &Actor) -> RepoResult<i64> {
        let updated_at = now_epoch_ms();
        self.conn.lock().execute(
            "INSERT INTO notes (id, path, content, updated_at, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                content = excluded.content,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by;",
            params![
                note.id.to_string(),
                note.path.as_str(),
                note.content.as_str(),
                updated_at,
                actor.user.as_str(),
            ],
        )?;
        Ok(updated_at)
    }

    fn delete(&self, id: NoteId, _actor: &Actor) -> RepoResult<()> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM notes WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list(&self) -> RepoResult<Vec<NoteInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, path FROM notes ORDER BY path ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut infos = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            infos.push(NoteInfo {
                id: parse_id(&id_text)?,
                path: row.get("path")?,
            });
        }
        Ok(infos)
    }

    fn rename(
        &self,
        id: NoteId,
        old_path: &str,
        new_path: &str,
        actor: &Actor,
    ) -> RepoResult<i64> {
        let updated_at = now_epoch_ms();
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE notes
             SET path = ?3, updated_at = ?4, updated_by = ?5
             WHERE id = ?1 AND path = ?2;",
            params![
                id.to_string(),
                old_path,
                new_path,
                updated_at,
                actor.user.as_str()
            ],
        )?;
        if changed == 1 {
            return Ok(updated_at);
        }

        let stored_path: Option<String> = conn
            .query_row(
                "SELECT path FROM notes WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match stored_path {
            None => Err(RepoError::NotFound(id)),
            Some(path) if path == new_path => Ok(updated_at),
            Some(path) => Err(RepoError::InvalidData(format!(
                "note {id} is stored at `{path}`, expected `{old_path}`"
            ))),
        }
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id_text: String = row.get("id")?;
    let mut note = Note::with_id(
        parse_id(&id_text)?,
        row.get::<_, String>("path")?,
        row.get::<_, String>("content")?,
    );
    note.updated_at = row.get("updated_at")?;
    Ok(note)
}

fn parse_id(value: &str) -> RepoResult<NoteId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in notes.id")))
}
