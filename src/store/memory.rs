use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AnnouncementRepository, OrganizationRepository, ReadReceipt, SessionRepository, StoreError,
    StoreResult, UserRepository,
};
use crate::models::{
    Announcement, NewAnnouncement, NewSession, Organization, Role, Session, SessionStatus, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    organizations: HashMap<Uuid, Organization>,
    sessions: Vec<Session>,
    announcements: Vec<Announcement>,
    reads: HashSet<(Uuid, Uuid)>,
}

/// 进程内存储，用于测试和没有 Postgres 的本地运行
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn insert_organization(&self, organization: Organization) {
        self.tables
            .write()
            .await
            .organizations
            .insert(organization.id, organization);
    }

    pub async fn insert_announcement(&self, announcement: Announcement) {
        self.tables.write().await.announcements.push(announcement);
    }

    /// 模拟后端不可达
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.check_available()?;
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn set_unsubscribed(&self, id: Uuid) -> StoreResult<bool> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.unsubscribed_from_reminders = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl OrganizationRepository for MemoryStore {
    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        self.check_available()?;
        Ok(self.tables.read().await.organizations.get(&id).cloned())
    }

    async fn create_organization(&self, owner: Uuid, name: &str) -> StoreResult<Organization> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get(&owner)
            .ok_or(StoreError::NotFound { entity: "user" })?;
        if user.organization_id.is_some() {
            return Err(StoreError::Conflict(
                "user already belongs to an organization".into(),
            ));
        }

        let organization = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_legacy: false,
            stripe_customer_id: None,
            created_at: Utc::now(),
        };
        tables
            .organizations
            .insert(organization.id, organization.clone());
        if let Some(user) = tables.users.get_mut(&owner) {
            user.organization_id = Some(organization.id);
            if user.role != Role::Superadmin {
                user.role = Role::Admin;
            }
        }

        Ok(organization)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, new: NewSession) -> StoreResult<Session> {
        self.check_available()?;
        let session = Session {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            name: new.name,
            external_session_id: new.external_session_id,
            api_token: new.api_token,
            api_token_full: new.api_token_full,
            status: SessionStatus::Unknown,
            qr_payload: None,
            created_at: Utc::now(),
        };
        self.tables.write().await.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session(&self, organization_id: Uuid, id: Uuid) -> StoreResult<Option<Session>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .iter()
            .find(|s| s.id == id && s.organization_id == organization_id)
            .cloned())
    }

    async fn list_sessions(&self, organization_id: Uuid) -> StoreResult<Vec<Session>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .iter()
            .filter(|s| s.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn list_all_sessions(&self) -> StoreResult<Vec<Session>> {
        self.check_available()?;
        Ok(self.tables.read().await.sessions.clone())
    }

    async fn update_session_state(
        &self,
        id: Uuid,
        status: SessionStatus,
        qr_payload: Option<&str>,
    ) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound { entity: "session" })?;
        session.status = status;
        session.qr_payload = qr_payload.map(str::to_string);
        Ok(())
    }

    async fn delete_session(&self, organization_id: Uuid, id: Uuid) -> StoreResult<bool> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|s| !(s.id == id && s.organization_id == organization_id));
        Ok(tables.sessions.len() < before)
    }
}

#[async_trait]
impl AnnouncementRepository for MemoryStore {
    async fn list_active_announcements(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Announcement>> {
        self.check_available()?;
        let mut active: Vec<Announcement> = self
            .tables
            .read()
            .await
            .announcements
            .iter()
            .filter(|a| a.is_visible_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn list_read_announcement_ids(&self, user_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .reads
            .iter()
            .filter(|(_, reader)| *reader == user_id)
            .map(|(announcement, _)| *announcement)
            .collect())
    }

    async fn mark_announcement_read(
        &self,
        announcement_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<ReadReceipt> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.announcements.iter().any(|a| a.id == announcement_id) {
            return Err(StoreError::NotFound {
                entity: "announcement",
            });
        }
        if tables.reads.insert((announcement_id, user_id)) {
            Ok(ReadReceipt::Recorded)
        } else {
            Ok(ReadReceipt::AlreadyRead)
        }
    }

    async fn create_announcement(&self, new: NewAnnouncement) -> StoreResult<Announcement> {
        self.check_available()?;
        let announcement = Announcement {
            id: Uuid::new_v4(),
            title: new.title,
            message: new.message,
            severity: new.severity,
            is_active: true,
            created_at: Utc::now(),
            expires_at: new.expires_at,
        };
        self.tables
            .write()
            .await
            .announcements
            .push(announcement.clone());
        Ok(announcement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_read_receipt_is_reported_not_failed() {
        let store = MemoryStore::new();
        let announcement = store
            .create_announcement(NewAnnouncement {
                title: "Novidade".into(),
                message: "Envio de mídia disponível".into(),
                severity: Default::default(),
                expires_at: None,
            })
            .await
            .unwrap();
        let user = Uuid::new_v4();

        let first = store
            .mark_announcement_read(announcement.id, user)
            .await
            .unwrap();
        let second = store
            .mark_announcement_read(announcement.id, user)
            .await
            .unwrap();

        assert_eq!(first, ReadReceipt::Recorded);
        assert_eq!(second, ReadReceipt::AlreadyRead);
    }

    #[tokio::test]
    async fn session_state_update_keeps_token() {
        let store = MemoryStore::new();
        let session = store
            .insert_session(NewSession {
                organization_id: Uuid::new_v4(),
                name: "Atendimento".into(),
                external_session_id: "acme".into(),
                api_token: "tok".into(),
                api_token_full: "acme:tok".into(),
            })
            .await
            .unwrap();

        store
            .update_session_state(session.id, SessionStatus::AwaitingQr, Some("data:image/png"))
            .await
            .unwrap();

        let stored = store
            .find_session(session.organization_id, session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SessionStatus::AwaitingQr);
        assert_eq!(stored.qr_payload.as_deref(), Some("data:image/png"));
        assert_eq!(stored.api_token, "tok");
    }
}
