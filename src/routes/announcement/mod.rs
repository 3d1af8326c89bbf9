mod handler;
mod model;

pub use handler::{create_announcement, mark_read, unread_announcements};
