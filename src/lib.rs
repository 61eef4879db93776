//! sitewatch - Website availability and latency monitor
//!
//! Polls every configured website on its own interval, keeps rolling
//! statistics over 2 minute, 10 minute and 1 hour windows, and raises an
//! alert when availability over the last 2 minutes drops below a threshold.

pub mod config;
pub mod metrics;
pub mod probe;
pub mod scheduler;
pub mod web;
