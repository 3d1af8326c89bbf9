use serde::Serialize;

use crate::models::Announcement;

#[derive(Debug, Serialize)]
pub struct UnreadAnnouncementsResponse {
    pub announcements: Vec<Announcement>,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub announcement: Announcement,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {}
