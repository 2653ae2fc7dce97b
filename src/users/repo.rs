use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// User role, stored as the Postgres enum `user_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Case-insensitive parse of a path parameter.
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("USER"),
            Role::Admin => f.write_str("ADMIN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    // Stored as given; never sent back in responses.
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
}

/// Input to `save`: an unset id inserts, a set id upsert-merges.
#[derive(Debug, Clone)]
pub struct UserDraft {
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    pub password: String,
    /// Defaults to `Role::User` when unset.
    pub role: Option<Role>,
}

/// The mutable fields copied onto an existing user by `update`.
/// An unset role leaves the stored role unchanged.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

/// Gateway to the users table.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self) -> anyhow::Result<Vec<User>>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Vec<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_role(&self, role: Role) -> anyhow::Result<Vec<User>>;
    async fn find_by_created_at_after(&self, date: OffsetDateTime) -> anyhow::Result<Vec<User>>;
    async fn save(&self, draft: UserDraft) -> anyhow::Result<User>;
    async fn update(&self, id: i64, changes: UserChanges) -> anyhow::Result<Option<User>>;
    async fn delete_by_id(&self, id: i64) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password, role, created_at, updated_at, last_login";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_all(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        tracing::info!(count = users.len(), "loaded all users");
        Ok(users)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 ORDER BY id"
        ))
        .bind(username)
        .fetch_all(&self.db)
        .await?;
        tracing::info!(count = users.len(), username, "loaded users by username");
        Ok(users)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY id"
        ))
        .bind(role)
        .fetch_all(&self.db)
        .await?;
        tracing::info!(count = users.len(), %role, "loaded users by role");
        Ok(users)
    }

    async fn find_by_created_at_after(&self, date: OffsetDateTime) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE created_at > $1 ORDER BY id"
        ))
        .bind(date)
        .fetch_all(&self.db)
        .await?;
        tracing::info!(count = users.len(), %date, "loaded users created after date");
        Ok(users)
    }

    async fn save(&self, draft: UserDraft) -> anyhow::Result<User> {
        let role = draft.role.unwrap_or(Role::User);
        let user = match draft.id {
            None => {
                sqlx::query_as::<_, User>(&format!(
                    r#"
                    INSERT INTO users (username, email, password, role)
                    VALUES ($1, $2, $3, $4)
                    RETURNING {USER_COLUMNS}
                    "#
                ))
                .bind(&draft.username)
                .bind(&draft.email)
                .bind(&draft.password)
                .bind(role)
                .fetch_one(&self.db)
                .await?
            }
            // Upsert-merge: mutable fields only, created_at is never touched.
            Some(id) => {
                sqlx::query_as::<_, User>(&format!(
                    r#"
                    INSERT INTO users (id, username, email, password, role)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO UPDATE
                    SET username = EXCLUDED.username,
                        email = EXCLUDED.email,
                        password = EXCLUDED.password,
                        role = EXCLUDED.role,
                        updated_at = now()
                    RETURNING {USER_COLUMNS}
                    "#
                ))
                .bind(id)
                .bind(&draft.username)
                .bind(&draft.email)
                .bind(&draft.password)
                .bind(role)
                .fetch_one(&self.db)
                .await?
            }
        };
        tracing::info!(id = user.id, "user saved");
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $2,
                email = $3,
                password = $4,
                role = COALESCE($5, role),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.password)
        .bind(changes.role)
        .fetch_optional(&self.db)
        .await?;
        if user.is_none() {
            tracing::warn!(%id, "user not found for update");
        }
        Ok(user)
    }

    async fn delete_by_id(&self, id: i64) -> anyhow::Result<()> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        if deleted.is_some() {
            tracing::info!(%id, "user deleted");
        } else {
            tracing::warn!(%id, "user not found for delete, nothing removed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("uSeR"), Some(Role::User));
    }

    #[test]
    fn role_rejects_unknown_values() {
        assert_eq!(Role::parse("bogus-role"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_displays_as_stored_value() {
        assert_eq!(Role::User.to_string(), "USER");
        assert_eq!(Role::Admin.to_string(), "ADMIN");
    }
}
