//! Domain layer
//!
//! Pure business types and algorithms. Nothing in this module performs I/O;
//! the ports submodule defines the traits that infrastructure implements.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
