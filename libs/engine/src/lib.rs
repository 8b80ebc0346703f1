//! Transaction query and live-annotation engine.
//!
//! Builds paginated queries against the external index, formats hits,
//! overlays annotations, tracks per-stream watermarks and fans out
//! `new_data_available` / `transaction_updated` events.

pub mod annotation;
pub mod auth;
pub mod coordinator;
pub mod format;
pub mod notifier;
pub mod query;
pub mod watermark;

pub use annotation::{AnnotationBackend, IndexAnnotationStore, MemoryAnnotationStore};
pub use auth::{PrincipalConfig, Role, StaticAuthorizer};
pub use coordinator::{Caller, Coordinator, Stage};
pub use notifier::{Broadcaster, MpscSubscription, Notifier};
pub use watermark::WatermarkTracker;
