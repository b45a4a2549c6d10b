//! Core domain types
//!
//! These types are shared between the spec loader (which builds them), the
//! platform client (which converts them to and from cluster objects) and the
//! runner (which drives them through their lifecycle).

pub mod pipeline;
pub mod resource;
pub mod workload;
