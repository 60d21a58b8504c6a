pub mod health_handlers;
pub mod site_handlers;
pub mod streaming;
