//! Destination Adapters
//!
//! Built-in implementations of the DestinationAdapter port, plus the
//! registry that holds them and vets externally supplied ones.

pub mod filesystem;
pub mod memory;
pub mod registry;
pub mod remote;

pub use filesystem::FilesystemAdapter;
pub use memory::MemoryAdapter;
pub use registry::{AdapterCandidate, AdapterManifest, AdapterRegistry, DiscoveryError};
pub use remote::RemoteAdapter;

/// Registry pre-populated with the built-in adapters
pub fn builtin_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(std::sync::Arc::new(FilesystemAdapter::new()));
    registry.register_builtin(std::sync::Arc::new(RemoteAdapter::new()));
    registry.register_builtin(std::sync::Arc::new(MemoryAdapter::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::AdapterCatalog;

    #[test]
    fn builtin_registry_holds_expected_adapters() {
        let registry = builtin_registry();
        for name in ["filesystem", "remote", "memory"] {
            assert!(registry.get(name).is_some(), "missing adapter {}", name);
        }
    }

    #[test]
    fn unknown_name_returns_none() {
        let registry = builtin_registry();
        assert!(registry.get("cloud-cdn").is_none());
    }
}
