//! In-memory repository implementations backing the unit and router tests.
//! They track how many read operations reached the store so cache tests can
//! assert that a hit never re-consults the gateway.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::notes::repo::{Note, NoteChanges, NoteDraft, NoteRepository};
use crate::users::repo::{Role, User, UserChanges, UserDraft, UserRepository};

pub struct InMemoryNoteRepository {
    notes: Mutex<Vec<Note>>,
    next_id: AtomicI64,
    fetches: AtomicUsize,
}

impl InMemoryNoteRepository {
    pub fn new() -> Self {
        Self {
            notes: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of read operations that reached this repository.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn count_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NoteRepository for InMemoryNoteRepository {
    async fn find_all(&self) -> anyhow::Result<Vec<Note>> {
        self.count_fetch();
        Ok(self.notes.lock().unwrap().clone())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Note>> {
        self.count_fetch();
        Ok(self.notes.lock().unwrap().iter().find(|n| n.id == id).cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> anyhow::Result<Vec<Note>> {
        self.count_fetch();
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn find_by_title(&self, title: &str) -> anyhow::Result<Vec<Note>> {
        self.count_fetch();
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.title == title)
            .cloned()
            .collect())
    }

    async fn find_by_created_at_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<Vec<Note>> {
        self.count_fetch();
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.created_at >= start && n.created_at <= end)
            .cloned()
            .collect())
    }

    async fn save(&self, draft: NoteDraft) -> anyhow::Result<Note> {
        let mut notes = self.notes.lock().unwrap();
        match draft.id {
            Some(id) => {
                if let Some(existing) = notes.iter_mut().find(|n| n.id == id) {
                    existing.title = draft.title;
                    existing.content = draft.content;
                    existing.user_id = draft.user_id;
                    existing.updated_at = Some(OffsetDateTime::now_utc());
                    return Ok(existing.clone());
                }
                let note = Note {
                    id,
                    title: draft.title,
                    content: draft.content,
                    user_id: draft.user_id,
                    created_at: OffsetDateTime::now_utc(),
                    updated_at: None,
                };
                notes.push(note.clone());
                Ok(note)
            }
            None => {
                let note = Note {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    title: draft.title,
                    content: draft.content,
                    user_id: draft.user_id,
                    created_at: OffsetDateTime::now_utc(),
                    updated_at: None,
                };
                notes.push(note.clone());
                Ok(note)
            }
        }
    }

    async fn update(&self, id: i64, changes: NoteChanges) -> anyhow::Result<Option<Note>> {
        let mut notes = self.notes.lock().unwrap();
        let Some(note) = notes.iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };
        note.title = changes.title;
        note.content = changes.content;
        note.updated_at = Some(OffsetDateTime::now_utc());
        Ok(Some(note.clone()))
    }

    async fn delete_by_id(&self, id: i64) -> anyhow::Result<()> {
        self.notes.lock().unwrap().retain(|n| n.id != id);
        Ok(())
    }
}

pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
    next_id: AtomicI64,
    fetches: AtomicUsize,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn count_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_all(&self) -> anyhow::Result<Vec<User>> {
        self.count_fetch();
        Ok(self.users.lock().unwrap().clone())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        self.count_fetch();
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Vec<User>> {
        self.count_fetch();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.username == username)
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.count_fetch();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        self.count_fetch();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    async fn find_by_created_at_after(&self, date: OffsetDateTime) -> anyhow::Result<Vec<User>> {
        self.count_fetch();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.created_at > date)
            .cloned()
            .collect())
    }

    async fn save(&self, draft: UserDraft) -> anyhow::Result<User> {
        let role = draft.role.unwrap_or(Role::User);
        let mut users = self.users.lock().unwrap();
        match draft.id {
            Some(id) => {
                if let Some(existing) = users.iter_mut().find(|u| u.id == id) {
                    existing.username = draft.username;
                    existing.email = draft.email;
                    existing.password = draft.password;
                    existing.role = role;
                    existing.updated_at = Some(OffsetDateTime::now_utc());
                    return Ok(existing.clone());
                }
                let user = User {
                    id,
                    username: draft.username,
                    email: draft.email,
                    password: draft.password,
                    role,
                    created_at: OffsetDateTime::now_utc(),
                    updated_at: None,
                    last_login: None,
                };
                users.push(user.clone());
                Ok(user)
            }
            None => {
                let user = User {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    username: draft.username,
                    email: draft.email,
                    password: draft.password,
                    role,
                    created_at: OffsetDateTime::now_utc(),
                    updated_at: None,
                    last_login: None,
                };
                users.push(user.clone());
                Ok(user)
            }
        }
    }

    async fn update(&self, id: i64, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.username = changes.username;
        user.email = changes.email;
        user.password = changes.password;
        if let Some(role) = changes.role {
            user.role = role;
        }
        user.updated_at = Some(OffsetDateTime::now_utc());
        Ok(Some(user.clone()))
    }

    async fn delete_by_id(&self, id: i64) -> anyhow::Result<()> {
        self.users.lock().unwrap().retain(|u| u.id != id);
        Ok(())
    }
}
