mod announcement;
mod organization;
mod session;
mod user;

pub use announcement::{Announcement, NewAnnouncement, Severity};
pub use organization::Organization;
pub use session::{NewSession, Session, SessionStatus};
pub use user::{Role, User};

/// 文本列里的枚举值无法识别
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
