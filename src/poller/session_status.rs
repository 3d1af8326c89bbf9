//! 会话连接状态轮询
//!
//! 每一轮对每个会话向网关查询一次，把归类后的状态写回存储。
//! 各会话互不影响：单个会话失败只记日志并跳过。
//! 轮询间隔固定，没有退避和抖动。

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::gateway::{GatewayApi, GatewayError, StatusReply};
use crate::models::{Session, SessionStatus};
use crate::store::{Store, StoreError};

/// 把网关的状态回复映射到会话状态
pub fn classify(reply: &StatusReply) -> SessionStatus {
    let is_qr = |text: &str| text.trim().eq_ignore_ascii_case("QRCODE");

    if reply.message.as_deref().is_some_and(is_qr)
        || reply.status.as_str().is_some_and(is_qr)
        || reply.qr_payload().is_some()
    {
        SessionStatus::AwaitingQr
    } else if reply.status.as_bool() == Some(true) {
        SessionStatus::Online
    } else {
        SessionStatus::Offline
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 查询单个会话，状态有变化时写回存储。
/// 返回写回后的会话以及是否发生了更新
pub async fn reconcile(
    store: &dyn Store,
    gateway: &dyn GatewayApi,
    session: &Session,
) -> Result<(Session, bool), PollError> {
    let reply = gateway
        .check_connection(&session.external_session_id, &session.api_token)
        .await?;
    let status = classify(&reply);
    // 等待扫码但这次没带二维码时保留旧的
    let qr_payload = match status {
        SessionStatus::AwaitingQr => reply
            .qr_payload()
            .map(str::to_string)
            .or_else(|| session.qr_payload.clone()),
        _ => None,
    };

    let mut current = session.clone();
    if current.status == status && current.qr_payload == qr_payload {
        return Ok((current, false));
    }

    store
        .update_session_state(session.id, status, qr_payload.as_deref())
        .await?;
    debug!(
        "Session {} moved from {} to {}",
        session.id, current.status, status
    );
    current.status = status;
    current.qr_payload = qr_payload;
    Ok((current, true))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct SessionStatusPoller {
    store: Arc<dyn Store>,
    gateway: Arc<dyn GatewayApi>,
    interval: Duration,
}

impl SessionStatusPoller {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn GatewayApi>, interval: Duration) -> Self {
        Self {
            store,
            gateway,
            interval,
        }
    }

    /// 对所有会话执行一轮轮询
    pub async fn tick(&self) -> Result<TickReport, StoreError> {
        let sessions = self.store.list_all_sessions().await?;

        let outcomes = join_all(sessions.iter().map(|session| async move {
            let outcome = reconcile(self.store.as_ref(), self.gateway.as_ref(), session).await;
            (session, outcome)
        }))
        .await;

        let mut report = TickReport {
            checked: outcomes.len(),
            ..Default::default()
        };
        for (session, outcome) in outcomes {
            match outcome {
                Ok((_, true)) => report.updated += 1,
                Ok((_, false)) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        "Status check failed for session {} ({}): {}",
                        session.id, session.external_session_id, e
                    );
                }
            }
        }

        Ok(report)
    }

    /// 按固定间隔轮询，直到 `shutdown` 变为 true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Session status poller started, interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) => debug!(?report, "Session status tick finished"),
                        Err(e) => warn!("Failed to list sessions for polling: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Session status poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn reply(status: serde_json::Value, message: Option<&str>, qrcode: Option<&str>) -> StatusReply {
        StatusReply {
            status,
            message: message.map(str::to_string),
            qrcode: qrcode.map(str::to_string),
        }
    }

    #[test]
    fn qrcode_message_in_any_case_awaits_qr() {
        for message in ["QRCODE", "qrcode", "QrCode"] {
            assert_eq!(
                classify(&reply(json!(false), Some(message), None)),
                SessionStatus::AwaitingQr
            );
        }
    }

    #[test]
    fn qr_payload_wins_over_status() {
        let r = reply(json!(true), Some("Connected"), Some("data:image/png;base64,AAA"));
        assert_eq!(classify(&r), SessionStatus::AwaitingQr);
    }

    #[test]
    fn string_qrcode_status_awaits_qr() {
        assert_eq!(
            classify(&reply(json!("QRCODE"), None, None)),
            SessionStatus::AwaitingQr
        );
    }

    #[test]
    fn true_status_is_online() {
        assert_eq!(
            classify(&reply(json!(true), Some("Connected"), None)),
            SessionStatus::Online
        );
    }

    #[test]
    fn everything_else_is_offline() {
        assert_eq!(
            classify(&reply(json!(false), Some("Disconnected"), None)),
            SessionStatus::Offline
        );
        assert_eq!(classify(&reply(json!("CLOSED"), None, None)), SessionStatus::Offline);
        assert_eq!(classify(&StatusReply::default()), SessionStatus::Offline);
    }
}
