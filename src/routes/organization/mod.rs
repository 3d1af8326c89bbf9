mod handler;
mod model;

pub use handler::{create_organization, current_organization};
