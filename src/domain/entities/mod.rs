//! Domain Entities
//!
//! Pure data structures; persistence and destination I/O live behind ports.

pub mod deploy;
pub mod file_index;
pub mod release;
pub mod site;

pub use deploy::{Deploy, DestinationMetadata, PatchManifest, TargetStatus};
pub use file_index::{FileIndex, FileIndexEntry, IndexError};
pub use release::{Release, ReleaseKind, ReleaseOutcome};
pub use site::Site;
