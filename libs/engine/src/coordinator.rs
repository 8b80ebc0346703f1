use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use txwatch_api::{
    Action, Annotation, AnnotationStore, Authorizer, Page, QueryParams, SearchIndex, StoreError,
    TxError,
};

use crate::format::{format_hits, latest_timestamp};
use crate::notifier::Notifier;
use crate::query::{build_query, now_iso};
use crate::watermark::WatermarkTracker;

/// Who is asking, and how long external calls may take on their behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub principal: String,
    pub timeout: Duration,
}

impl Caller {
    pub fn new(principal: impl Into<String>, timeout: Duration) -> Self {
        Self {
            principal: principal.into(),
            timeout,
        }
    }
}

/// Step of a request inside the coordinator.
///
/// Page request: `Received → Queried → Formatted → WatermarkChecked →
/// (Broadcast | Skipped) → Responded`.
/// Write request: `Received → Persisted → Broadcast → Responded`.
/// Any failure ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Queried,
    Formatted,
    WatermarkChecked,
    Broadcast,
    Skipped,
    Persisted,
    Responded,
    Failed,
}

/// Sequences query → format → watermark → broadcast for reads and
/// persist → broadcast for annotation writes.
///
/// Nothing is retried here; every failure is logged and handed back as a
/// `TxError`.
pub struct Coordinator {
    index: Arc<dyn SearchIndex>,
    annotations: Arc<dyn AnnotationStore>,
    authorizer: Arc<dyn Authorizer>,
    watermarks: Arc<WatermarkTracker>,
    notifier: Notifier,
}

impl Coordinator {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        annotations: Arc<dyn AnnotationStore>,
        authorizer: Arc<dyn Authorizer>,
        watermarks: Arc<WatermarkTracker>,
        notifier: Notifier,
    ) -> Self {
        Self {
            index,
            annotations,
            authorizer,
            watermarks,
            notifier,
        }
    }

    pub fn watermarks(&self) -> &WatermarkTracker {
        &self.watermarks
    }

    // ═══════════════════════════════════════════════════════════
    //  Reads
    // ═══════════════════════════════════════════════════════════

    /// Fetch one page of `params.index`, announcing new data when the page
    /// moves the stream watermark forward.
    pub async fn fetch_page(&self, caller: &Caller, params: &QueryParams) -> Result<Page, TxError> {
        let stream = params.index.as_str();
        tracing::debug!(stream, principal = %caller.principal, page = params.page, size = %params.size, stage = ?Stage::Received);

        self.authorize(caller, Action::ViewTransactions).await?;
        let query = build_query(params, &now_iso())?;

        let exists = bounded(caller.timeout, self.index.exists(stream))
            .await
            .map_err(|e| failed(Stage::Queried, stream, query_error(e)))?;
        if !exists {
            return Err(failed(
                Stage::Queried,
                stream,
                TxError::NotFound(format!("index '{stream}' does not exist")),
            ));
        }

        let response = bounded(caller.timeout, self.index.search(stream, &query))
            .await
            .map_err(|e| failed(Stage::Queried, stream, query_error(e)))?;

        let records = format_hits(&response.hits);
        let records = bounded(caller.timeout, self.annotations.overlay(stream, records))
            .await
            .map_err(|e| failed(Stage::Formatted, stream, query_error(e)))?;

        let new_data = match latest_timestamp(&records) {
            Some(latest) => self.watermarks.observe(stream, latest),
            None => false,
        };
        tracing::debug!(stream, new_data, stage = ?Stage::WatermarkChecked);

        let stage = if new_data {
            self.notifier.broadcast_new_data(stream).await;
            Stage::Broadcast
        } else {
            Stage::Skipped
        };
        tracing::debug!(stream, total = response.total, returned = records.len(), stage = ?stage);

        tracing::debug!(stream, stage = ?Stage::Responded);
        Ok(Page {
            total: response.total,
            transactions: records,
            new_data,
        })
    }

    /// Visible indices, sorted by name.
    pub async fn list_indices(&self, caller: &Caller) -> Result<Vec<String>, TxError> {
        self.authorize(caller, Action::ListIndices).await?;
        let mut names = bounded(caller.timeout, self.index.indices())
            .await
            .map_err(|e| failed(Stage::Queried, "*", query_error(e)))?;
        names.retain(|n| !n.starts_with('.'));
        names.sort();
        Ok(names)
    }

    // ═══════════════════════════════════════════════════════════
    //  Writes
    // ═══════════════════════════════════════════════════════════

    pub async fn set_tickbox(
        &self,
        caller: &Caller,
        index: &str,
        id: &str,
        value: bool,
    ) -> Result<(), TxError> {
        self.annotate(caller, index, id, Annotation::Tickbox(value)).await
    }

    pub async fn set_remark(
        &self,
        caller: &Caller,
        index: &str,
        id: &str,
        text: impl Into<String>,
    ) -> Result<(), TxError> {
        self.annotate(caller, index, id, Annotation::Remark(text.into())).await
    }

    /// Persist one annotation field, then tell every subscriber of the
    /// stream. No broadcast unless the write succeeded.
    pub async fn annotate(
        &self,
        caller: &Caller,
        index: &str,
        id: &str,
        annotation: Annotation,
    ) -> Result<(), TxError> {
        tracing::debug!(stream = index, id, field = annotation.field(), principal = %caller.principal, stage = ?Stage::Received);

        let action = match annotation {
            Annotation::Tickbox(_) => Action::SetTickbox,
            Annotation::Remark(_) => Action::SetRemark,
        };
        self.authorize(caller, action).await?;

        if index.trim().is_empty() || id.trim().is_empty() {
            return Err(TxError::InvalidArgument("index and id are required".into()));
        }

        bounded(caller.timeout, self.annotations.write(index, id, &annotation))
            .await
            .map_err(|e| failed(Stage::Persisted, index, write_error(index, id, e)))?;
        tracing::info!(stream = index, id, field = annotation.field(), stage = ?Stage::Persisted, "annotation stored");

        self.notifier
            .broadcast_annotation_update(index, id, &annotation)
            .await;
        tracing::debug!(stream = index, id, stage = ?Stage::Responded);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    //  Helpers
    // ═══════════════════════════════════════════════════════════

    /// Fail closed: a denial, an oracle error and an oracle timeout all
    /// end as `Unauthorized`.
    pub async fn authorize(&self, caller: &Caller, action: Action) -> Result<(), TxError> {
        let principal = caller.principal.as_str();
        let check = self.authorizer.is_authorized(principal, action);
        match tokio::time::timeout(caller.timeout, check).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => {
                tracing::warn!(principal, %action, "access denied");
                Err(TxError::Unauthorized(format!("'{principal}' may not {action}")))
            }
            Ok(Err(e)) => {
                tracing::error!(principal, %action, error = %e, "authorization check failed");
                Err(TxError::Unauthorized(format!("cannot verify '{principal}': {e}")))
            }
            Err(_) => {
                tracing::error!(principal, %action, "authorization check timed out");
                Err(TxError::Unauthorized(format!(
                    "cannot verify '{principal}': authorization timed out"
                )))
            }
        }
    }
}

/// Run a store call with a deadline. Elapsed deadline = unavailable store.
async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!(
            "timed out after {} ms",
            limit.as_millis()
        ))),
    }
}

fn query_error(e: StoreError) -> TxError {
    match e {
        StoreError::NotFound(what) => TxError::NotFound(what),
        StoreError::Unavailable(msg) | StoreError::Rejected(msg) => TxError::StoreUnavailable(msg),
    }
}

fn write_error(index: &str, id: &str, e: StoreError) -> TxError {
    match e {
        StoreError::NotFound(_) => TxError::NotFound(format!("record '{id}' in index '{index}'")),
        StoreError::Unavailable(msg) => TxError::StoreUnavailable(msg),
        StoreError::Rejected(msg) => TxError::AnnotationWriteFailed(msg),
    }
}

fn failed(at: Stage, stream: &str, err: TxError) -> TxError {
    match err.kind() {
        txwatch_api::ErrorKind::StoreUnavailable => {
            tracing::error!(stream, at = ?at, stage = ?Stage::Failed, error = %err, "request failed");
        }
        _ => {
            tracing::warn!(stream, at = ?at, stage = ?Stage::Failed, error = %err, "request failed");
        }
    }
    err
}
