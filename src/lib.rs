//! SafeSpace Companion - rule-based support chat with crisis-first classification

pub mod agent;
pub mod commands;
pub mod config;
pub mod error;
pub mod render;
pub mod telemetry;
