//! Core use-case services.
//!
//! # Responsibility
//! - Turn project service calls into operator-level use cases.
//! - Keep the console layer unaware of storage and tree bookkeeping.

pub mod membership_service;
pub mod node_state;
pub mod workspace_service;
