//! 基于托管后端数据表的 Postgres 仓储：
//! `users`、`organizations`、`sessions`、`announcements` 以及
//! `announcement_reads`（`announcement_id, user_id` 唯一）

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    AnnouncementRepository, OrganizationRepository, ReadReceipt, SessionRepository, StoreError,
    StoreResult, UserRepository,
};
use crate::models::{
    Announcement, NewAnnouncement, NewSession, Organization, Session, SessionStatus, User,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    role: String,
    organization_id: Option<Uuid>,
    unsubscribed_from_reminders: bool,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            role: row.role.parse()?,
            organization_id: row.organization_id,
            unsubscribed_from_reminders: row.unsubscribed_from_reminders,
        })
    }
}

#[derive(FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    is_legacy: bool,
    stripe_customer_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Organization {
            id: row.id,
            name: row.name,
            is_legacy: row.is_legacy,
            stripe_customer_id: row.stripe_customer_id,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    external_session_id: String,
    api_token: String,
    api_token_full: String,
    status: String,
    qr_payload: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            organization_id: row.organization_id,
            name: row.name,
            external_session_id: row.external_session_id,
            api_token: row.api_token,
            api_token_full: row.api_token_full,
            status: row.status.parse()?,
            qr_payload: row.qr_payload,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AnnouncementRow {
    id: Uuid,
    title: String,
    message: String,
    severity: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<AnnouncementRow> for Announcement {
    type Error = StoreError;

    fn try_from(row: AnnouncementRow) -> Result<Self, Self::Error> {
        Ok(Announcement {
            id: row.id,
            title: row.title,
            message: row.message,
            severity: row.severity.parse()?,
            is_active: row.is_active,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

const SESSION_COLUMNS: &str = "id, organization_id, name, external_session_id, api_token, \
     api_token_full, status, qr_payload, created_at";

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, role, organization_id, unsubscribed_from_reminders
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn set_unsubscribed(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET unsubscribed_from_reminders = true
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrganizationRepository for PgStore {
    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT id, name, is_legacy, stripe_customer_id, created_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Organization::from))
    }

    async fn create_organization(&self, owner: Uuid, name: &str) -> StoreResult<Organization> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Option<Uuid>,)> =
            sqlx::query_as("SELECT organization_id FROM users WHERE id = $1 FOR UPDATE")
                .bind(owner)
                .fetch_optional(&mut *tx)
                .await?;

        match current {
            None => return Err(StoreError::NotFound { entity: "user" }),
            Some((Some(_),)) => {
                return Err(StoreError::Conflict(
                    "user already belongs to an organization".into(),
                ));
            }
            Some((None,)) => {}
        }

        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            INSERT INTO organizations (id, name, is_legacy)
            VALUES ($1, $2, false)
            RETURNING id, name, is_legacy, stripe_customer_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        // 超级管理员保留原角色
        sqlx::query(
            r#"
            UPDATE users
            SET organization_id = $1,
                role = CASE WHEN role = 'superadmin' THEN role ELSE 'admin' END
            WHERE id = $2
            "#,
        )
        .bind(row.id)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Created organization {} for user {}", row.id, owner);

        Ok(row.into())
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session(&self, new: NewSession) -> StoreResult<Session> {
        let sql = format!(
            r#"
            INSERT INTO sessions
                (id, organization_id, name, external_session_id, api_token, api_token_full, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SESSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.organization_id)
            .bind(&new.name)
            .bind(&new.external_session_id)
            .bind(&new.api_token)
            .bind(&new.api_token_full)
            .bind(SessionStatus::Unknown.as_str())
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn find_session(&self, organization_id: Uuid, id: Uuid) -> StoreResult<Option<Session>> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 AND organization_id = $2");
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(id)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Session::try_from).transpose()
    }

    async fn list_sessions(&self, organization_id: Uuid) -> StoreResult<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE organization_id = $1 ORDER BY created_at"
        );
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Session::try_from)
            .collect()
    }

    async fn list_all_sessions(&self) -> StoreResult<Vec<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at");
        sqlx::query_as::<_, SessionRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Session::try_from)
            .collect()
    }

    async fn update_session_state(
        &self,
        id: Uuid,
        status: SessionStatus,
        qr_payload: Option<&str>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = $1, qr_payload = $2
            WHERE id = $3
            "#,
        )
        .bind(status.as_str())
        .bind(qr_payload)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "session" });
        }
        Ok(())
    }

    async fn delete_session(&self, organization_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AnnouncementRepository for PgStore {
    async fn list_active_announcements(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Announcement>> {
        sqlx::query_as::<_, AnnouncementRow>(
            r#"
            SELECT id, title, message, severity, is_active, created_at, expires_at
            FROM announcements
            WHERE is_active = true
              AND (expires_at IS NULL OR expires_at > $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Announcement::try_from)
        .collect()
    }

    async fn list_read_announcement_ids(&self, user_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT announcement_id FROM announcement_reads WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn mark_announcement_read(
        &self,
        announcement_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<ReadReceipt> {
        let result = sqlx::query(
            r#"
            INSERT INTO announcement_reads (announcement_id, user_id, read_at)
            VALUES ($1, $2, now())
            ON CONFLICT (announcement_id, user_id) DO NOTHING
            "#,
        )
        .bind(announcement_id)
        .bind(user_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(ReadReceipt::AlreadyRead),
            Ok(_) => Ok(ReadReceipt::Recorded),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(StoreError::NotFound {
                    entity: "announcement",
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_announcement(&self, new: NewAnnouncement) -> StoreResult<Announcement> {
        let row = sqlx::query_as::<_, AnnouncementRow>(
            r#"
            INSERT INTO announcements (id, title, message, severity, is_active, expires_at)
            VALUES ($1, $2, $3, $4, true, $5)
            RETURNING id, title, message, severity, is_active, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.severity.as_str())
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}
