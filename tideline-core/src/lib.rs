//! Tideline Core
//!
//! Core library for reconciling declared resources against remote APIs:
//! typed desired state, a rule fingerprint for unordered collections, and a
//! bounded poller for resources that converge asynchronously.

pub mod desired;
pub mod differ;
pub mod effect;
pub mod error;
pub mod fingerprint;
pub mod interpreter;
pub mod plan;
pub mod poller;
pub mod provider;
pub mod resource;
pub mod schema;
