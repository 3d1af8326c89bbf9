mod handler;
mod model;

pub use handler::customer_portal;
