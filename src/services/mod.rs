pub mod access;
pub mod announcements;
pub mod metrics;
pub mod questions;
pub mod sessions;
pub mod uploads;
