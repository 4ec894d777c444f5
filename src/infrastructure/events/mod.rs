//! Event sink implementations

pub mod json;

pub use json::JsonEventSink;
