//! Subscriber fan-out and the ingestion pipeline.
//!
//! [`registry::SubscriptionRegistry`] tracks live subscriber connections
//! and their per-metric interest sets; [`pipeline::MetricPipeline`] is the
//! single entry point sequencing buffer write, alert evaluation, broadcast,
//! and derivation for every measurement regardless of origin.

pub mod error;
pub mod pipeline;
pub mod registry;
