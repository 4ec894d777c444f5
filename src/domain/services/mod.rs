//! Domain Services
//!
//! Pure algorithms over the entities. No I/O.

pub mod overlay;

pub use overlay::{
    validate_patch, DeployLookup, OverlayChain, PatchResolutionError, Resolution,
};
