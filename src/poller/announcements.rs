//! 单个用户的未读公告跟踪

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Announcement;
use crate::store::{ReadReceipt, Store, StoreError};

/// active ∩ ¬read ∩ ¬dismissed, keeping the order of `active`.
pub fn unread_set(
    active: Vec<Announcement>,
    read: &HashSet<Uuid>,
    dismissed: &HashSet<Uuid>,
) -> Vec<Announcement> {
    active
        .into_iter()
        .filter(|a| !read.contains(&a.id) && !dismissed.contains(&a.id))
        .collect()
}

/// 非阻塞提示，由界面层自行展示
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub announcement_id: Option<Uuid>,
    pub message: String,
}

pub struct AnnouncementFeed {
    store: Arc<dyn Store>,
    user_id: Uuid,
    // 乐观隐藏：回执写入确认前就不再展示
    dismissed: Mutex<HashSet<Uuid>>,
    visible: watch::Sender<Vec<Announcement>>,
    notices: broadcast::Sender<Notice>,
}

impl AnnouncementFeed {
    pub fn new(store: Arc<dyn Store>, user_id: Uuid) -> Self {
        let (visible, _) = watch::channel(Vec::new());
        let (notices, _) = broadcast::channel(16);
        Self {
            store,
            user_id,
            dismissed: Mutex::new(HashSet::new()),
            visible,
            notices,
        }
    }

    pub fn visible(&self) -> Vec<Announcement> {
        self.visible.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<Announcement>> {
        self.visible.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// 重新拉取有效公告和已读回执；失败时保留上一次的可见集合
    pub async fn refresh(&self) -> Result<Vec<Announcement>, StoreError> {
        let active = self.store.list_active_announcements(Utc::now()).await?;
        let read = self.store.list_read_announcement_ids(self.user_id).await?;

        let unread = {
            let dismissed = self.dismissed.lock().await;
            unread_set(active, &read, &dismissed)
        };
        self.visible.send_replace(unread.clone());
        Ok(unread)
    }

    /// 先在本地隐藏公告，再写入已读回执。
    /// 回执已存在视为成功；存储连接失败时发出 [`Notice`] 并返回错误
    pub async fn acknowledge(&self, announcement_id: Uuid) -> Result<ReadReceipt, StoreError> {
        self.dismissed.lock().await.insert(announcement_id);
        self.visible
            .send_modify(|items| items.retain(|a| a.id != announcement_id));

        match self
            .store
            .mark_announcement_read(announcement_id, self.user_id)
            .await
        {
            Ok(receipt) => {
                debug!(
                    "Announcement {} acknowledged by {}: {:?}",
                    announcement_id, self.user_id, receipt
                );
                Ok(receipt)
            }
            Err(e @ StoreError::Database(_)) => {
                warn!(
                    "Failed to record read receipt for announcement {}: {}",
                    announcement_id, e
                );
                // 没有订阅者时发送失败无妨
                let _ = self.notices.send(Notice {
                    announcement_id: Some(announcement_id),
                    message: "Could not mark the announcement as read".into(),
                });
                Err(e)
            }
            Err(e) => {
                debug!(
                    "Read receipt for announcement {} rejected: {}",
                    announcement_id, e
                );
                Err(e)
            }
        }
    }

    /// 立即刷新一次，之后每隔 `interval` 刷新，直到收到关闭信号
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!("Failed to refresh announcements for {}: {}", self.user_id, e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::models::Severity;
    use crate::store::MemoryStore;

    fn announcement(title: &str, age_minutes: i64) -> Announcement {
        Announcement {
            id: Uuid::new_v4(),
            title: title.into(),
            message: format!("{title} body"),
            severity: Severity::Info,
            is_active: true,
            created_at: Utc::now() - ChronoDuration::minutes(age_minutes),
            expires_at: None,
        }
    }

    #[test]
    fn unread_set_excludes_read_and_dismissed() {
        let a = announcement("a", 1);
        let b = announcement("b", 2);
        let c = announcement("c", 3);
        let read = HashSet::from([b.id]);
        let dismissed = HashSet::from([c.id]);

        let unread = unread_set(vec![a.clone(), b, c], &read, &dismissed);

        assert_eq!(unread, vec![a]);
    }

    #[tokio::test]
    async fn acknowledged_announcement_stays_hidden_across_feeds() {
        let store = Arc::new(MemoryStore::new());
        let newer = announcement("newer", 1);
        let older = announcement("older", 10);
        store.insert_announcement(older.clone()).await;
        store.insert_announcement(newer.clone()).await;
        let user = Uuid::new_v4();

        let feed = AnnouncementFeed::new(store.clone(), user);
        let visible = feed.refresh().await.unwrap();
        assert_eq!(
            visible.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );

        feed.acknowledge(newer.id).await.unwrap();
        assert_eq!(feed.visible(), vec![older.clone()]);

        // 重新挂载后依然不可见
        let remounted = AnnouncementFeed::new(store.clone(), user);
        assert_eq!(remounted.refresh().await.unwrap(), vec![older]);
    }

    #[tokio::test]
    async fn duplicate_acknowledge_is_silent() {
        let store = Arc::new(MemoryStore::new());
        let item = announcement("dup", 1);
        store.insert_announcement(item.clone()).await;
        let feed = AnnouncementFeed::new(store, Uuid::new_v4());
        let mut notices = feed.notices();

        assert_eq!(feed.acknowledge(item.id).await.unwrap(), ReadReceipt::Recorded);
        assert_eq!(
            feed.acknowledge(item.id).await.unwrap(),
            ReadReceipt::AlreadyRead
        );
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_announcement_fails_without_notice() {
        let store = Arc::new(MemoryStore::new());
        let feed = AnnouncementFeed::new(store, Uuid::new_v4());
        let mut notices = feed.notices();

        let result = feed.acknowledge(Uuid::new_v4()).await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_loop_publishes_new_announcements() {
        let store = Arc::new(MemoryStore::new());
        let feed = Arc::new(AnnouncementFeed::new(store.clone(), Uuid::new_v4()));
        let mut visible = feed.watch();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            feed.clone()
                .run(Duration::from_millis(20), shutdown_rx),
        );

        let item = announcement("live", 0);
        store.insert_announcement(item.clone()).await;

        let seen = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                visible.changed().await.unwrap();
                if visible.borrow().iter().any(|a| a.id == item.id) {
                    break;
                }
            }
        })
        .await;
        assert!(seen.is_ok());

        shutdown_tx.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn transport_failure_publishes_notice_and_keeps_item_hidden() {
        let store = Arc::new(MemoryStore::new());
        let item = announcement("down", 1);
        store.insert_announcement(item.clone()).await;
        let feed = AnnouncementFeed::new(store.clone(), Uuid::new_v4());
        feed.refresh().await.unwrap();
        let mut notices = feed.notices();

        store.set_unavailable(true);
        assert!(feed.acknowledge(item.id).await.is_err());

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.announcement_id, Some(item.id));
        assert!(feed.visible().is_empty());

        // 恢复后刷新：回执未写入，但本地已隐藏
        store.set_unavailable(false);
        assert!(feed.refresh().await.unwrap().is_empty());
    }
}
