//! Engine library for hardware-aware service deployment
//!
//! This crate provides the core functionality for:
//! - GPU classification from PCI bus enumeration
//! - The service template catalog and compositor
//! - Security validation of deployment descriptors
//! - Atomic, confined persistence of compose artifacts
//! - Health checks and observability

pub mod catalog;
pub mod compose;
pub mod engine;
pub mod hardware;
pub mod health;
pub mod models;
pub mod observability;
pub mod policy;
pub mod validator;
pub mod writer;

pub use engine::{ComposeEngine, DeployRequest};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use policy::SecurityPolicy;
