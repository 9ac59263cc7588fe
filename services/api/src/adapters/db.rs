//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use chat_auth_core::domain::{NewSession, Owner, Session, Settings, User, UserProfileUpdate};
use chat_auth_core::ports::{DatabaseService, PortError, PortResult};
use chat_auth_core::UserIdentity;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    subject: String,
    username: Option<String>,
    name: String,
    email: Option<String>,
    avatar_url: Option<String>,
    is_admin: bool,
    is_early_access: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            subject: self.subject,
            username: self.username,
            name: self.name,
            email: self.email,
            avatar_url: self.avatar_url,
            is_admin: self.is_admin,
            is_early_access: self.is_early_access,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    token_hash: String,
    // NULL user_id marks an anonymous (pre-login) session.
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    user_agent: Option<String>,
    ip: Option<String>,
    id_token: Option<String>,
    access_token: Option<String>,
}

impl SessionRecord {
    fn to_domain(self) -> Session {
        let owner = match self.user_id {
            Some(user_id) => Owner::User(user_id),
            None => Owner::AnonymousSession(self.id),
        };
        Session {
            id: self.id,
            token_hash: self.token_hash,
            owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
            user_agent: self.user_agent,
            ip: self.ip,
            id_token: self.id_token,
            access_token: self.access_token,
        }
    }
}

const USER_COLUMNS: &str = "id, subject, username, name, email, avatar_url, is_admin, \
                            is_early_access, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, token_hash, user_id, created_at, updated_at, expires_at, \
                               user_agent, ip, id_token, access_token";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_user_by_subject(&self, subject: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE subject = $1"
        ))
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: &UserProfileUpdate,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET username = $1, name = $2, avatar_url = $3, is_admin = $4, \
             is_early_access = $5, updated_at = now() WHERE id = $6",
        )
        .bind(&update.username)
        .bind(&update.name)
        .bind(&update.avatar_url)
        .bind(update.is_admin)
        .bind(update.is_early_access)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn insert_user(&self, identity: &UserIdentity) -> PortResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (id, subject, username, name, email, avatar_url, is_admin, \
             is_early_access, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now()) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&identity.subject)
        .bind(&identity.username)
        .bind(&identity.name)
        .bind(&identity.email)
        .bind(&identity.avatar_url)
        .bind(identity.is_admin)
        .bind(identity.is_early_access)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn find_session_by_hash(&self, token_hash: &str) -> PortResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn find_session_by_id(&self, session_id: Uuid) -> PortResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        // Zero rows affected is fine; deleting an absent session is a no-op.
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn insert_session(&self, session: &NewSession) -> PortResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO sessions (id, token_hash, user_id, created_at, updated_at, expires_at, \
             user_agent, ip, id_token, access_token) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&session.token_hash)
        .bind(session.owner.user_id())
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.expires_at)
        .bind(&session.user_agent)
        .bind(&session.ip)
        .bind(&session.id_token)
        .bind(&session.access_token)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn migrate_settings(&self, anon_session_id: Uuid, user_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE settings SET user_id = $1, anon_session_id = NULL, updated_at = now() \
             WHERE anon_session_id = $2",
        )
        .bind(user_id)
        .bind(anon_session_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn insert_settings(&self, settings: &Settings) -> PortResult<()> {
        let (user_id, anon_session_id) = match settings.owner {
            Owner::User(id) => (Some(id), None),
            Owner::AnonymousSession(id) => (None, Some(id)),
        };
        sqlx::query(
            "INSERT INTO settings (id, user_id, anon_session_id, \
             share_conversations_with_model_authors, active_model, custom_prompts, \
             ethics_modal_accepted_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(anon_session_id)
        .bind(settings.share_conversations_with_model_authors)
        .bind(&settings.active_model)
        .bind(&settings.custom_prompts)
        .bind(settings.ethics_modal_accepted_at)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn migrate_conversations(
        &self,
        anon_session_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE conversations SET user_id = $1, anon_session_id = NULL, updated_at = now() \
             WHERE anon_session_id = $2",
        )
        .bind(user_id)
        .bind(anon_session_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}
