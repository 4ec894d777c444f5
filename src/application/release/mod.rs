//! Release use case - the state machine driving stage/activate/rollback
//! per (site, target), with per-key serialization and bounded
//! per-destination parallelism.

mod engine;
mod locks;

pub use engine::{ReleaseEngine, ReleasePolicy, StageOutcome, StageRequest};
pub use locks::{DestinationGate, TargetLocks};
