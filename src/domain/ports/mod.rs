//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the domain layer.
//! Infrastructure provides the concrete implementations.

pub mod destination_adapter;
pub mod release_events;
pub mod repository;

pub use destination_adapter::{
    ActivateRequest, AdapterCatalog, AdapterConfig, AdapterContext, AdapterError, CancelFlag,
    CleanupReport, ConfigError, DestinationAdapter, ReleaseInfo, RollbackRequest, SiteSummary,
    UploadReceipt, UploadRequest,
};
pub use release_events::{NoopEventSink, ReleaseEvent, ReleaseEventSink};
pub use repository::{DeployRepository, RepositoryError, SiteRepository};
