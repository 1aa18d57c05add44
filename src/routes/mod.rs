pub mod announcements;
pub mod attachments;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod questions;
