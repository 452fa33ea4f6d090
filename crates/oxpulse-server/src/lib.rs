//! oxpulse server: HTTP push + WebSocket fan-out for the real-time
//! metrics engine, plus the broker subscriber and self-health tasks.

pub mod api;
pub mod app;
pub mod broker;
pub mod config;
pub mod health;
pub mod logging;
pub mod seed;
pub mod state;
pub mod ws;
