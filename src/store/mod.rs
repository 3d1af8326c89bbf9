//! 持久化接口
//!
//! 数据库归托管后端所有，本服务只通过这些仓储读写单行。
//! 每条查询都按组织或用户 id 限定范围，与后端的行级安全策略一致。

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Announcement, NewAnnouncement, NewSession, Organization, Session, SessionStatus,
    UnknownVariant, User,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("corrupt row: {0}")]
    Corrupt(#[from] UnknownVariant),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 已读回执写入结果，重复写入不算错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadReceipt {
    Recorded,
    AlreadyRead,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// 返回 false 表示用户不存在；重复退订仍返回 true
    async fn set_unsubscribed(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>>;

    /// 创建组织，并把 `owner` 设为管理员
    async fn create_organization(&self, owner: Uuid, name: &str) -> StoreResult<Organization>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, new: NewSession) -> StoreResult<Session>;

    async fn find_session(&self, organization_id: Uuid, id: Uuid) -> StoreResult<Option<Session>>;

    /// 某个组织的会话，按创建时间升序
    async fn list_sessions(&self, organization_id: Uuid) -> StoreResult<Vec<Session>>;

    /// 所有租户的会话，供状态轮询使用
    async fn list_all_sessions(&self) -> StoreResult<Vec<Session>>;

    /// 签发后只有状态和二维码可以修改
    async fn update_session_state(
        &self,
        id: Uuid,
        status: SessionStatus,
        qr_payload: Option<&str>,
    ) -> StoreResult<()>;

    async fn delete_session(&self, organization_id: Uuid, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    /// 有效且未过期的公告，最新的在前
    async fn list_active_announcements(&self, now: DateTime<Utc>)
    -> StoreResult<Vec<Announcement>>;

    async fn list_read_announcement_ids(&self, user_id: Uuid) -> StoreResult<HashSet<Uuid>>;

    async fn mark_announcement_read(
        &self,
        announcement_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<ReadReceipt>;

    async fn create_announcement(&self, new: NewAnnouncement) -> StoreResult<Announcement>;
}

pub trait Store:
    UserRepository + OrganizationRepository + SessionRepository + AnnouncementRepository
{
}

impl<T> Store for T where
    T: UserRepository + OrganizationRepository + SessionRepository + AnnouncementRepository
{
}
