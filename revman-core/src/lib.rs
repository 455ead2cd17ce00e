//! Core library for the multi-provider LLM code-review orchestration engine.
//!
//! Wires together platform clients (GitHub/GitLab/Bitbucket), LLM provider
//! clients, the bounded concurrent executor, dedup/consensus, suppression
//! and incremental review, and the comment poster, behind one orchestrator
//! entry point (`orchestrator::run`). No `async-trait`, no boxed trait
//! objects on any hot path — enum-dispatch throughout, following the
//! teacher's style.

pub mod cache;
pub mod config;
pub mod consensus;
pub mod cost_tracker;
pub mod diff;
pub mod errors;
pub mod executor;
pub mod incremental;
pub mod models;
pub mod orchestrator;
pub mod path_matcher;
pub mod platform;
pub mod poster;
pub mod provider_client;
pub mod rate_limiter;
pub mod static_analysis;
pub mod suppression;
pub mod synthesis;

pub use config::ReviewConfig;
pub use errors::{Error, RevResult};
pub use models::{Finding, PrContext, Review};
pub use orchestrator::{run, OrchestratorContext, ProviderEndpoint};
