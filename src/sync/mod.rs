//! Override model and the DOM synchronization engine

pub mod apply;
pub mod engine;
pub mod overrides;

pub use apply::{ApplyReport, DomRoot, ShapeProps};
pub use engine::{HistoryEntry, SyncConfig, SyncEngine, SyncState, SyncStatus};
pub use overrides::{ElementOverride, OverrideOriginal, Position, Size};
