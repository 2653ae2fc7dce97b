use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::cache::{CacheKey, Cached, EntityCache};
use crate::error::{ApiError, ApiResult};
use crate::notes::repo::{Note, NoteChanges, NoteDraft, NoteRepository};

/// Business rules over the notes gateway: read-through caching and
/// empty-result-as-NotFound signaling.
///
/// Every read treats an empty result as `NotFound`; only non-empty results
/// are cached. Writes touch the cache entry keyed by the entity id and
/// nothing else, so cached lists can go stale until they age out of the
/// region. Cache and store writes are not atomic; concurrent writers to the
/// same key are last-write-wins.
#[derive(Clone)]
pub struct NoteService {
    repo: Arc<dyn NoteRepository>,
    cache: Arc<dyn EntityCache<Note>>,
}

impl NoteService {
    pub fn new(repo: Arc<dyn NoteRepository>, cache: Arc<dyn EntityCache<Note>>) -> Self {
        Self { repo, cache }
    }

    pub async fn find_all(&self) -> ApiResult<Vec<Note>> {
        info!("listing all notes");
        if let Some(Cached::Many(notes)) = self.cache.get(&CacheKey::All) {
            return Ok(notes);
        }
        let notes = self.repo.find_all().await?;
        if notes.is_empty() {
            warn!("no notes found");
            return Err(ApiError::NotFound("no notes found".into()));
        }
        info!(count = notes.len(), "found notes");
        self.cache.put(CacheKey::All, Cached::Many(notes.clone()));
        Ok(notes)
    }

    pub async fn find_by_id(&self, id: i64) -> ApiResult<Note> {
        info!(%id, "looking up note");
        if let Some(Cached::One(note)) = self.cache.get(&CacheKey::Id(id)) {
            return Ok(note);
        }
        let Some(note) = self.repo.find_by_id(id).await? else {
            warn!(%id, "note not found");
            return Err(ApiError::NotFound(format!("note with id {id} not found")));
        };
        self.cache.put(CacheKey::Id(id), Cached::One(note.clone()));
        Ok(note)
    }

    pub async fn find_by_user(&self, user_id: i64) -> ApiResult<Vec<Note>> {
        info!(%user_id, "looking up notes by user");
        let key = CacheKey::Lookup(format!("user:{user_id}"));
        if let Some(Cached::Many(notes)) = self.cache.get(&key) {
            return Ok(notes);
        }
        let notes = self.repo.find_by_user(user_id).await?;
        if notes.is_empty() {
            warn!(%user_id, "no notes found for user");
            return Err(ApiError::NotFound(format!(
                "no notes found for user with id {user_id}"
            )));
        }
        info!(count = notes.len(), %user_id, "found notes for user");
        self.cache.put(key, Cached::Many(notes.clone()));
        Ok(notes)
    }

    pub async fn find_by_title(&self, title: &str) -> ApiResult<Vec<Note>> {
        info!(title, "looking up notes by title");
        let key = CacheKey::Lookup(format!("title:{title}"));
        if let Some(Cached::Many(notes)) = self.cache.get(&key) {
            return Ok(notes);
        }
        let notes = self.repo.find_by_title(title).await?;
        if notes.is_empty() {
            warn!(title, "no notes found with title");
            return Err(ApiError::NotFound(format!(
                "no notes found with title '{title}'"
            )));
        }
        info!(count = notes.len(), title, "found notes with title");
        self.cache.put(key, Cached::Many(notes.clone()));
        Ok(notes)
    }

    pub async fn find_by_created_at_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ApiResult<Vec<Note>> {
        info!(%start, %end, "looking up notes by creation range");
        let key = CacheKey::Lookup(format!("created:{start}..{end}"));
        if let Some(Cached::Many(notes)) = self.cache.get(&key) {
            return Ok(notes);
        }
        let notes = self.repo.find_by_created_at_between(start, end).await?;
        if notes.is_empty() {
            warn!(%start, %end, "no notes found in creation range");
            return Err(ApiError::NotFound(format!(
                "no notes created between {start} and {end}"
            )));
        }
        info!(count = notes.len(), "found notes in creation range");
        self.cache.put(key, Cached::Many(notes.clone()));
        Ok(notes)
    }

    pub async fn save(&self, draft: NoteDraft) -> ApiResult<Note> {
        info!(id = ?draft.id, "saving note");
        let note = self.repo.save(draft).await?;
        // The id entry may hold a pre-write version; drop it. Cached lists
        // are left alone and can serve stale reads until they age out.
        self.cache.evict(&CacheKey::Id(note.id));
        info!(id = note.id, "note saved");
        Ok(note)
    }

    pub async fn update(&self, id: i64, changes: NoteChanges) -> ApiResult<Note> {
        info!(%id, "updating note");
        let Some(note) = self.repo.update(id, changes).await? else {
            warn!(%id, "note not found for update");
            return Err(ApiError::NotFound(format!("note with id {id} not found")));
        };
        self.cache.put(CacheKey::Id(id), Cached::One(note.clone()));
        info!(%id, "note updated");
        Ok(note)
    }

    pub async fn delete_by_id(&self, id: i64) -> ApiResult<()> {
        info!(%id, "deleting note");
        if self.repo.find_by_id(id).await?.is_none() {
            warn!(%id, "note not found, nothing to delete");
            return Err(ApiError::NotFound(format!("note with id {id} not found")));
        }
        self.repo.delete_by_id(id).await?;
        self.cache.evict(&CacheKey::Id(id));
        info!(%id, "note deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruRegion;
    use crate::testing::InMemoryNoteRepository;

    fn service() -> (NoteService, Arc<InMemoryNoteRepository>) {
        let repo = Arc::new(InMemoryNoteRepository::new());
        let cache: Arc<dyn EntityCache<Note>> = Arc::new(LruRegion::new("notes", 64));
        (NoteService::new(repo.clone(), cache), repo)
    }

    fn draft(title: &str, content: &str) -> NoteDraft {
        NoteDraft {
            id: None,
            title: title.into(),
            content: content.into(),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn save_assigns_id_and_created_at() {
        let (svc, _) = service();
        let note = svc.save(draft("Test Note", "Test Content")).await.unwrap();
        assert_eq!(note.id, 1);
        assert_eq!(note.title, "Test Note");
        assert_eq!(note.content, "Test Content");
        assert!(note.updated_at.is_none());
    }

    #[tokio::test]
    async fn find_by_id_round_trip() {
        let (svc, _) = service();
        let saved = svc.save(draft("Test Note", "Test Content")).await.unwrap();
        let found = svc.find_by_id(saved.id).await.unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn find_by_id_absent_is_not_found() {
        let (svc, _) = service();
        let err = svc.find_by_id(99).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let (svc, repo) = service();
        let saved = svc.save(draft("a", "b")).await.unwrap();

        svc.find_by_id(saved.id).await.unwrap();
        let fetches = repo.fetch_count();
        svc.find_by_id(saved.id).await.unwrap();
        assert_eq!(repo.fetch_count(), fetches, "cache hit must not hit the repo");
    }

    #[tokio::test]
    async fn update_rewrites_fields_and_preserves_id_and_created_at() {
        let (svc, _) = service();
        let saved = svc.save(draft("old title", "old content")).await.unwrap();

        let updated = svc
            .update(
                saved.id,
                NoteChanges {
                    title: "new title".into(),
                    content: "new content".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, saved.created_at);
        assert_eq!(updated.title, "new title");
        assert_eq!(updated.content, "new content");
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn update_refreshes_the_cached_entity() {
        let (svc, repo) = service();
        let saved = svc.save(draft("old", "old")).await.unwrap();

        svc.update(
            saved.id,
            NoteChanges {
                title: "new".into(),
                content: "new".into(),
            },
        )
        .await
        .unwrap();

        // The put from update means this read never touches the repo.
        let fetches = repo.fetch_count();
        let found = svc.find_by_id(saved.id).await.unwrap();
        assert_eq!(repo.fetch_count(), fetches);
        assert_eq!(found.title, "new");
    }

    #[tokio::test]
    async fn update_absent_is_not_found() {
        let (svc, _) = service();
        let err = svc
            .update(
                7,
                NoteChanges {
                    title: "t".into(),
                    content: "c".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() {
        let (svc, _) = service();
        let saved = svc.save(draft("t", "c")).await.unwrap();
        // Populate the id entry so the delete has something to evict.
        svc.find_by_id(saved.id).await.unwrap();

        svc.delete_by_id(saved.id).await.unwrap();
        let err = svc.find_by_id(saved.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_delete_reports_not_found() {
        let (svc, _) = service();
        let saved = svc.save(draft("t", "c")).await.unwrap();
        svc.delete_by_id(saved.id).await.unwrap();
        let err = svc.delete_by_id(saved.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_by_title_matches_exactly() {
        let (svc, _) = service();
        svc.save(draft("T", "one")).await.unwrap();
        svc.save(draft("T", "two")).await.unwrap();
        svc.save(draft("T-other", "three")).await.unwrap();

        let notes = svc.find_by_title("T").await.unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.title == "T"));
    }

    #[tokio::test]
    async fn find_by_title_empty_is_not_found() {
        let (svc, _) = service();
        svc.save(draft("something", "c")).await.unwrap();
        let err = svc.find_by_title("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_all_empty_is_not_found() {
        let (svc, _) = service();
        let err = svc.find_all().await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_by_user_returns_only_owned_notes() {
        let (svc, _) = service();
        let mut d = draft("a", "1");
        d.user_id = Some(10);
        svc.save(d).await.unwrap();
        let mut d = draft("b", "2");
        d.user_id = Some(11);
        svc.save(d).await.unwrap();

        let notes = svc.find_by_user(10).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].user_id, Some(10));
    }

    #[tokio::test]
    async fn save_evicts_the_stale_id_entry() {
        let (svc, repo) = service();
        let saved = svc.save(draft("v1", "c")).await.unwrap();
        svc.find_by_id(saved.id).await.unwrap();

        // Upsert-merge under the same id replaces the cached version.
        let mut d = draft("v2", "c");
        d.id = Some(saved.id);
        svc.save(d).await.unwrap();

        let fetches = repo.fetch_count();
        let found = svc.find_by_id(saved.id).await.unwrap();
        assert!(repo.fetch_count() > fetches, "eviction must force a repo read");
        assert_eq!(found.title, "v2");
    }

    #[tokio::test]
    async fn cached_list_is_not_invalidated_by_save() {
        // The all-key is deliberately not evicted on write; stale lists are
        // served until the entry ages out of the region.
        let (svc, _) = service();
        svc.save(draft("first", "c")).await.unwrap();
        let before = svc.find_all().await.unwrap();
        svc.save(draft("second", "c")).await.unwrap();
        let after = svc.find_all().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn find_by_created_at_between_is_inclusive() {
        let (svc, _) = service();
        let saved = svc.save(draft("t", "c")).await.unwrap();

        let notes = svc
            .find_by_created_at_between(saved.created_at, saved.created_at)
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);

        let err = svc
            .find_by_created_at_between(
                saved.created_at + time::Duration::hours(1),
                saved.created_at + time::Duration::hours(2),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
