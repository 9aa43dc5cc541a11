//! Shopforge daemon library
//!
//! This module exports the orchestration core: the provider registry, the
//! fan-out engine, the lifecycle supervisor and the event bus, together with
//! the search service, configuration and config-driven provider registration
//! built on top of them.

pub mod bootstrap;
pub mod config;
pub mod events;
pub mod fanout;
pub mod operations;
pub mod registry;
pub mod search;
pub mod supervisor;
