mod handler;
mod model;

pub use handler::{
    dashboard_stats, delete_session, get_session, list_sessions, refresh_status, send_message,
    start_session,
};
