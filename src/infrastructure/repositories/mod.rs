//! Repository implementations

pub mod memory;

pub use memory::{InMemoryDeployRepository, InMemorySiteRepository};
