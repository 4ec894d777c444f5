//! Infrastructure layer
//!
//! Concrete implementations of the domain ports: destination adapters and
//! their registry, repositories, the file-index scanner and event sinks.

pub mod adapters;
pub mod events;
pub mod index;
pub mod repositories;
