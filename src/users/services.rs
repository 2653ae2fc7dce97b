use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::cache::{CacheKey, Cached, EntityCache};
use crate::error::{ApiError, ApiResult};
use crate::users::repo::{Role, User, UserChanges, UserDraft, UserRepository};

/// Business rules over the users gateway. Same caching and NotFound policy
/// as [`crate::notes::services::NoteService`].
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    cache: Arc<dyn EntityCache<User>>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, cache: Arc<dyn EntityCache<User>>) -> Self {
        Self { repo, cache }
    }

    pub async fn find_all(&self) -> ApiResult<Vec<User>> {
        info!("listing all users");
        if let Some(Cached::Many(users)) = self.cache.get(&CacheKey::All) {
            return Ok(users);
        }
        let users = self.repo.find_all().await?;
        if users.is_empty() {
            warn!("no users found");
            return Err(ApiError::NotFound("no users found".into()));
        }
        info!(count = users.len(), "found users");
        self.cache.put(CacheKey::All, Cached::Many(users.clone()));
        Ok(users)
    }

    pub async fn find_by_id(&self, id: i64) -> ApiResult<User> {
        info!(%id, "looking up user");
        if let Some(Cached::One(user)) = self.cache.get(&CacheKey::Id(id)) {
            return Ok(user);
        }
        let Some(user) = self.repo.find_by_id(id).await? else {
            warn!(%id, "user not found");
            return Err(ApiError::NotFound(format!("user with id {id} not found")));
        };
        self.cache.put(CacheKey::Id(id), Cached::One(user.clone()));
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> ApiResult<Vec<User>> {
        info!(username, "looking up users by username");
        let key = CacheKey::Lookup(format!("username:{username}"));
        if let Some(Cached::Many(users)) = self.cache.get(&key) {
            return Ok(users);
        }
        let users = self.repo.find_by_username(username).await?;
        if users.is_empty() {
            warn!(username, "no users found with username");
            return Err(ApiError::NotFound(format!(
                "no users found with username '{username}'"
            )));
        }
        info!(count = users.len(), username, "found users with username");
        self.cache.put(key, Cached::Many(users.clone()));
        Ok(users)
    }

    pub async fn find_by_email(&self, email: &str) -> ApiResult<User> {
        info!(email, "looking up user by email");
        let key = CacheKey::Lookup(format!("email:{email}"));
        if let Some(Cached::One(user)) = self.cache.get(&key) {
            return Ok(user);
        }
        let Some(user) = self.repo.find_by_email(email).await? else {
            warn!(email, "user not found by email");
            return Err(ApiError::NotFound(format!(
                "user with email '{email}' not found"
            )));
        };
        self.cache.put(key, Cached::One(user.clone()));
        Ok(user)
    }

    pub async fn find_by_role(&self, role: Role) -> ApiResult<Vec<User>> {
        info!(%role, "looking up users by role");
        let key = CacheKey::Lookup(format!("role:{role}"));
        if let Some(Cached::Many(users)) = self.cache.get(&key) {
            return Ok(users);
        }
        let users = self.repo.find_by_role(role).await?;
        if users.is_empty() {
            warn!(%role, "no users found with role");
            return Err(ApiError::NotFound(format!(
                "no users found with role '{role}'"
            )));
        }
        info!(count = users.len(), %role, "found users with role");
        self.cache.put(key, Cached::Many(users.clone()));
        Ok(users)
    }

    pub async fn find_by_created_at_after(&self, date: OffsetDateTime) -> ApiResult<Vec<User>> {
        info!(%date, "looking up users created after date");
        let key = CacheKey::Lookup(format!("created-after:{date}"));
        if let Some(Cached::Many(users)) = self.cache.get(&key) {
            return Ok(users);
        }
        let users = self.repo.find_by_created_at_after(date).await?;
        if users.is_empty() {
            warn!(%date, "no users created after date");
            return Err(ApiError::NotFound(format!(
                "no users registered after {date}"
            )));
        }
        info!(count = users.len(), "found users created after date");
        self.cache.put(key, Cached::Many(users.clone()));
        Ok(users)
    }

    pub async fn save(&self, draft: UserDraft) -> ApiResult<User> {
        info!(id = ?draft.id, "saving user");
        let user = self.repo.save(draft).await?;
        self.cache.evict(&CacheKey::Id(user.id));
        info!(id = user.id, "user saved");
        Ok(user)
    }

    pub async fn update(&self, id: i64, changes: UserChanges) -> ApiResult<User> {
        info!(%id, "updating user");
        let Some(user) = self.repo.update(id, changes).await? else {
            warn!(%id, "user not found for update");
            return Err(ApiError::NotFound(format!("user with id {id} not found")));
        };
        self.cache.put(CacheKey::Id(id), Cached::One(user.clone()));
        info!(%id, "user updated");
        Ok(user)
    }

    pub async fn delete_by_id(&self, id: i64) -> ApiResult<()> {
        info!(%id, "deleting user");
        if self.repo.find_by_id(id).await?.is_none() {
            warn!(%id, "user not found, nothing to delete");
            return Err(ApiError::NotFound(format!("user with id {id} not found")));
        }
        self.repo.delete_by_id(id).await?;
        self.cache.evict(&CacheKey::Id(id));
        info!(%id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruRegion;
    use crate::testing::InMemoryUserRepository;

    fn service() -> (UserService, Arc<InMemoryUserRepository>) {
        let repo = Arc::new(InMemoryUserRepository::new());
        let cache: Arc<dyn EntityCache<User>> = Arc::new(LruRegion::new("users", 64));
        (UserService::new(repo.clone(), cache), repo)
    }

    fn draft(username: &str, email: &str) -> UserDraft {
        UserDraft {
            id: None,
            username: username.into(),
            email: email.into(),
            password: "secret".into(),
            role: None,
        }
    }

    #[tokio::test]
    async fn save_defaults_role_to_user() {
        let (svc, _) = service();
        let user = svc.save(draft("alice", "alice@example.com")).await.unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.id, 1);
    }

    #[tokio::test]
    async fn find_by_email_returns_single_match() {
        let (svc, _) = service();
        svc.save(draft("alice", "alice@example.com")).await.unwrap();
        svc.save(draft("bob", "bob@example.com")).await.unwrap();

        let user = svc.find_by_email("bob@example.com").await.unwrap();
        assert_eq!(user.username, "bob");
    }

    #[tokio::test]
    async fn find_by_email_absent_is_not_found() {
        let (svc, _) = service();
        let err = svc.find_by_email("nobody@example.com").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_by_role_filters() {
        let (svc, _) = service();
        let mut admin = draft("root", "root@example.com");
        admin.role = Some(Role::Admin);
        svc.save(admin).await.unwrap();
        svc.save(draft("alice", "alice@example.com")).await.unwrap();

        let admins = svc.find_by_role(Role::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "root");
    }

    #[tokio::test]
    async fn update_copies_mutable_fields_and_keeps_role_when_unset() {
        let (svc, _) = service();
        let mut admin = draft("root", "root@example.com");
        admin.role = Some(Role::Admin);
        let saved = svc.save(admin).await.unwrap();

        let updated = svc
            .update(
                saved.id,
                UserChanges {
                    username: "root2".into(),
                    email: "root2@example.com".into(),
                    password: "changed".into(),
                    role: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, saved.created_at);
        assert_eq!(updated.username, "root2");
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn second_lookup_by_email_is_served_from_cache() {
        let (svc, repo) = service();
        svc.save(draft("alice", "alice@example.com")).await.unwrap();

        svc.find_by_email("alice@example.com").await.unwrap();
        let fetches = repo.fetch_count();
        svc.find_by_email("alice@example.com").await.unwrap();
        assert_eq!(repo.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let (svc, _) = service();
        let saved = svc.save(draft("alice", "alice@example.com")).await.unwrap();
        svc.delete_by_id(saved.id).await.unwrap();
        let err = svc.delete_by_id(saved.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_by_created_at_after_is_strict() {
        let (svc, _) = service();
        let saved = svc.save(draft("alice", "alice@example.com")).await.unwrap();

        let users = svc
            .find_by_created_at_after(saved.created_at - time::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(users.len(), 1);

        let err = svc
            .find_by_created_at_after(saved.created_at)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
