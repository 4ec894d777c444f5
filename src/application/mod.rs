//! Application layer
//!
//! Use cases orchestrating domain services, ports and adapters.

pub mod release;
