use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Input to `save`: an unset id inserts, a set id upsert-merges onto the
/// existing row.
#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub user_id: Option<i64>,
}

/// The mutable fields copied onto an existing note by `update`.
#[derive(Debug, Clone)]
pub struct NoteChanges {
    pub title: String,
    pub content: String,
}

/// Gateway to the notes table. Absence is `Ok(None)` or an empty `Vec`,
/// never an error. Each operation issues a single statement.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn find_all(&self) -> anyhow::Result<Vec<Note>>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Note>>;
    async fn find_by_user(&self, user_id: i64) -> anyhow::Result<Vec<Note>>;
    async fn find_by_title(&self, title: &str) -> anyhow::Result<Vec<Note>>;
    async fn find_by_created_at_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<Vec<Note>>;
    async fn save(&self, draft: NoteDraft) -> anyhow::Result<Note>;
    async fn update(&self, id: i64, changes: NoteChanges) -> anyhow::Result<Option<Note>>;
    async fn delete_by_id(&self, id: i64) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgNoteRepository {
    db: PgPool,
}

impl PgNoteRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const NOTE_COLUMNS: &str = "id, title, content, user_id, created_at, updated_at";

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn find_all(&self) -> anyhow::Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        tracing::info!(count = notes.len(), "loaded all notes");
        Ok(notes)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(note)
    }

    async fn find_by_user(&self, user_id: i64) -> anyhow::Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        tracing::info!(count = notes.len(), %user_id, "loaded notes by user");
        Ok(notes)
    }

    async fn find_by_title(&self, title: &str) -> anyhow::Result<Vec<Note>> {
        // Exact match, no pattern expansion.
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE title = $1 ORDER BY id"
        ))
        .bind(title)
        .fetch_all(&self.db)
        .await?;
        tracing::info!(count = notes.len(), title, "loaded notes by title");
        Ok(notes)
    }

    async fn find_by_created_at_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE created_at BETWEEN $1 AND $2 ORDER BY id"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        tracing::info!(count = notes.len(), %start, %end, "loaded notes by creation range");
        Ok(notes)
    }

    async fn save(&self, draft: NoteDraft) -> anyhow::Result<Note> {
        let note = match draft.id {
            None => {
                sqlx::query_as::<_, Note>(&format!(
                    r#"
                    INSERT INTO notes (title, content, user_id)
                    VALUES ($1, $2, $3)
                    RETURNING {NOTE_COLUMNS}
                    "#
                ))
                .bind(&draft.title)
                .bind(&draft.content)
                .bind(draft.user_id)
                .fetch_one(&self.db)
                .await?
            }
            // Upsert-merge: mutable fields only, created_at is never touched.
            Some(id) => {
                sqlx::query_as::<_, Note>(&format!(
                    r#"
                    INSERT INTO notes (id, title, content, user_id)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO UPDATE
                    SET title = EXCLUDED.title,
                        content = EXCLUDED.content,
                        user_id = EXCLUDED.user_id,
                        updated_at = now()
                    RETURNING {NOTE_COLUMNS}
                    "#
                ))
                .bind(id)
                .bind(&draft.title)
                .bind(&draft.content)
                .bind(draft.user_id)
                .fetch_one(&self.db)
                .await?
            }
        };
        tracing::info!(id = note.id, "note saved");
        Ok(note)
    }

    async fn update(&self, id: i64, changes: NoteChanges) -> anyhow::Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            r#"
            UPDATE notes
            SET title = $2, content = $3, updated_at = now()
            WHERE id = $1
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.content)
        .fetch_optional(&self.db)
        .await?;
        if note.is_none() {
            tracing::warn!(%id, "note not found for update");
        }
        Ok(note)
    }

    async fn delete_by_id(&self, id: i64) -> anyhow::Result<()> {
        let deleted = sqlx::query("DELETE FROM notes WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        if deleted.is_some() {
            tracing::info!(%id, "note deleted");
        } else {
            tracing::warn!(%id, "note not found for delete, nothing removed");
        }
        Ok(())
    }
}
