//! 后台轮询任务

mod announcements;
mod session_status;

pub use announcements::{AnnouncementFeed, Notice, unread_set};
pub use session_status::{PollError, SessionStatusPoller, TickReport, classify, reconcile};
