//! Shared vocabulary of the transaction review service.
//!
//! Types flowing between the engine, the storage backends and the API
//! server live here, together with the collaborator traits the engine is
//! written against. The crate has no runtime dependency: async methods are
//! expressed as boxed futures so that every trait stays object-safe.

pub mod auth;
pub mod error;
pub mod event;
pub mod query;
pub mod record;
pub mod store;
pub mod topic;

pub use auth::{Action, Authorizer};
pub use error::{AuthError, ErrorKind, StoreError, TxError};
pub use event::LiveEvent;
pub use query::{MAX_PAGE_SIZE, PageSize, QueryParams, SearchQuery, SortOrder, TermFilter};
pub use record::{
    Annotation, Annotations, FormattedRecord, Hit, Page, SearchResponse, REMARK_FIELD,
    TICKBOX_FIELD, TIMESTAMP_FIELD, UNKNOWN_TIMESTAMP,
};
pub use store::{AnnotationStore, SearchIndex};
pub use topic::{EventPublisher, EventSubscriber, EventSubscription, OverflowPolicy};
