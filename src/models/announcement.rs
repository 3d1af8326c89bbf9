use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Success,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "success" => Ok(Severity::Success),
            "error" => Ok(Severity::Error),
            other => Err(UnknownVariant {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Announcement {
    /// 启用且未过期
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires| expires > now)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn announcement(expires_at: Option<DateTime<Utc>>) -> Announcement {
        Announcement {
            id: Uuid::new_v4(),
            title: "Manutenção".into(),
            message: "Gateway em manutenção às 22h".into(),
            severity: Severity::Warning,
            is_active: true,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn expired_announcement_is_hidden() {
        let now = Utc::now();
        assert!(announcement(None).is_visible_at(now));
        assert!(announcement(Some(now + Duration::hours(1))).is_visible_at(now));
        assert!(!announcement(Some(now - Duration::seconds(1))).is_visible_at(now));
    }

    #[test]
    fn inactive_announcement_is_hidden() {
        let mut item = announcement(None);
        item.is_active = false;
        assert!(!item.is_visible_at(Utc::now()));
    }
}
