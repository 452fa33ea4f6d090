//! Shared domain types for the oxpulse real-time metrics engine.
//!
//! Everything that crosses a crate boundary lives here: the
//! [`types::Measurement`] value flowing through the pipeline, alert
//! events, the WebSocket wire envelopes, and the snowflake ID generator.

pub mod id;
pub mod types;
