//! Adapter Registry
//!
//! Name-keyed lookup of destination adapters. Built-ins are registered at
//! startup; externally supplied adapters go through explicit registration
//! with a structural contract check instead of dynamic code loading:
//! a candidate declares its package name and the operations it implements,
//! and registration verifies the declaration is complete and that the
//! adapter's name matches its package name with the discovery prefix
//! stripped. Failed candidates are recorded as discovery errors, never
//! fatal to startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::ports::{AdapterCatalog, DestinationAdapter};

/// Package-name prefix external adapter packages must carry
pub const DISCOVERY_PREFIX: &str = "quay-adapter-";

/// Operations every adapter must implement
pub const REQUIRED_OPERATIONS: [&str; 4] = ["validate_config", "upload", "activate", "rollback"];

/// Self-description an external candidate ships alongside its adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterManifest {
    /// Declared adapter name (registry key)
    pub name: String,
    /// Operations the package claims to implement
    pub operations: Vec<String>,
}

/// An externally supplied adapter awaiting structural validation
pub struct AdapterCandidate {
    /// Name of the package the candidate came from
    pub package_name: String,
    pub manifest: AdapterManifest,
    pub adapter: Arc<dyn DestinationAdapter>,
}

/// Why a candidate was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("package '{package}' does not carry the '{DISCOVERY_PREFIX}' prefix")]
    MissingPrefix { package: String },

    #[error(
        "package '{package}' declares name '{declared}' but its package name implies '{expected}'"
    )]
    NameMismatch {
        package: String,
        declared: String,
        expected: String,
    },

    #[error("package '{package}' does not declare required operation '{operation}'")]
    MissingOperation {
        package: String,
        operation: &'static str,
    },

    #[error("adapter '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("external adapters are disabled; rejected package '{package}'")]
    ExternalDisabled { package: String },
}

/// Name-keyed adapter table
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn DestinationAdapter>>,
    /// Whether external candidates are accepted at all (explicit opt-in)
    allow_external: bool,
    discovery_errors: Vec<DiscoveryError>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt in to external adapter registration
    pub fn with_external_adapters(mut self) -> Self {
        self.allow_external = true;
        self
    }

    /// Register a built-in adapter under its own name
    pub fn register_builtin(&mut self, adapter: Arc<dyn DestinationAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    /// Vet and register one external candidate.
    ///
    /// Rejections are recorded in `discovery_errors` and returned; the
    /// registry itself stays usable either way.
    pub fn register_external(&mut self, candidate: AdapterCandidate) -> Result<(), DiscoveryError> {
        if !self.allow_external {
            // Silent drop would hide misconfiguration; record it.
            let err = DiscoveryError::ExternalDisabled {
                package: candidate.package_name.clone(),
            };
            self.discovery_errors.push(err.clone());
            return Err(err);
        }

        if let Err(err) = Self::vet(&candidate) {
            self.discovery_errors.push(err.clone());
            return Err(err);
        }

        let name = candidate.manifest.name.clone();
        if self.adapters.contains_key(&name) {
            let err = DiscoveryError::DuplicateName { name };
            self.discovery_errors.push(err.clone());
            return Err(err);
        }

        self.adapters.insert(name, candidate.adapter);
        Ok(())
    }

    fn vet(candidate: &AdapterCandidate) -> Result<(), DiscoveryError> {
        let expected = candidate
            .package_name
            .strip_prefix(DISCOVERY_PREFIX)
            .ok_or_else(|| DiscoveryError::MissingPrefix {
                package: candidate.package_name.clone(),
            })?;

        if candidate.manifest.name != expected {
            return Err(DiscoveryError::NameMismatch {
                package: candidate.package_name.clone(),
                declared: candidate.manifest.name.clone(),
                expected: expected.to_string(),
            });
        }

        for operation in REQUIRED_OPERATIONS {
            if !candidate
                .manifest
                .operations
                .iter()
                .any(|op| op == operation)
            {
                return Err(DiscoveryError::MissingOperation {
                    package: candidate.package_name.clone(),
                    operation,
                });
            }
        }

        Ok(())
    }

    /// Errors accumulated while vetting external candidates
    pub fn discovery_errors(&self) -> &[DiscoveryError] {
        &self.discovery_errors
    }

    /// Registered adapter names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl AdapterCatalog for AdapterRegistry {
    fn get(&self, name: &str) -> Option<Arc<dyn DestinationAdapter>> {
        self.adapters.get(name).cloned()
    }
}

impl AdapterCatalog for Arc<AdapterRegistry> {
    fn get(&self, name: &str) -> Option<Arc<dyn DestinationAdapter>> {
        self.as_ref().get(name)
    }
}
