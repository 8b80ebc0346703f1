use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;

use txwatch_api::{
    Annotation, AnnotationStore, Annotations, FormattedRecord, SearchIndex, StoreError,
};

use crate::format::merge_annotations;

/// Which `AnnotationStore` the service runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationBackend {
    /// Fields written on the record inside the search index.
    #[default]
    Index,
    /// Process-local map; lost on restart.
    Memory,
}

impl AnnotationBackend {
    pub fn build(self, index: Arc<dyn SearchIndex>) -> Arc<dyn AnnotationStore> {
        match self {
            AnnotationBackend::Index => Arc::new(IndexAnnotationStore::new(index)),
            AnnotationBackend::Memory => Arc::new(MemoryAnnotationStore::new(index)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  IndexAnnotationStore
// ═══════════════════════════════════════════════════════════════

/// Annotations stored as `tickbox`/`remark` fields of the indexed record.
///
/// Each write is a partial update of a single field; the index's own
/// per-document update atomicity is all we rely on.
pub struct IndexAnnotationStore {
    index: Arc<dyn SearchIndex>,
}

impl IndexAnnotationStore {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }
}

impl AnnotationStore for IndexAnnotationStore {
    fn write(
        &self,
        index: &str,
        id: &str,
        annotation: &Annotation,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let (index, id) = (index.to_string(), id.to_string());
        let (field, value) = (annotation.field(), annotation.value());
        Box::pin(async move { self.index.update_field(&index, &id, field, value).await })
    }

    fn overlay(
        &self,
        _index: &str,
        records: Vec<FormattedRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FormattedRecord>, StoreError>> + Send + '_>> {
        // Already part of the hit source; the formatter picked them up.
        Box::pin(async move { Ok(records) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryAnnotationStore
// ═══════════════════════════════════════════════════════════════

/// Аннотации в памяти процесса, ключ (index, id).
///
/// Запись принимается только для документа, который есть в индексе;
/// сохранённые значения перекрывают то, что вернул индекс.
pub struct MemoryAnnotationStore {
    index: Arc<dyn SearchIndex>,
    entries: RwLock<HashMap<(String, String), Annotations>>,
}

impl MemoryAnnotationStore {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self {
            index,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, index: &str, id: &str) -> Option<Annotations> {
        let entries = self.entries.read().await;
        entries.get(&(index.to_string(), id.to_string())).cloned()
    }
}

impl AnnotationStore for MemoryAnnotationStore {
    fn write(
        &self,
        index: &str,
        id: &str,
        annotation: &Annotation,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = (index.to_string(), id.to_string());
        let annotation = annotation.clone();
        Box::pin(async move {
            let (index, id) = &key;
            if !self.index.contains(index, id).await? {
                return Err(StoreError::NotFound(format!("document '{id}' in index '{index}'")));
            }
            let mut entries = self.entries.write().await;
            annotation.apply(entries.entry(key).or_default());
            Ok(())
        })
    }

    fn overlay(
        &self,
        index: &str,
        mut records: Vec<FormattedRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FormattedRecord>, StoreError>> + Send + '_>> {
        let index = index.to_string();
        Box::pin(async move {
            let entries = self.entries.read().await;
            for record in records.iter_mut() {
                if let Some(stored) = entries.get(&(index.clone(), record.id.clone())) {
                    merge_annotations(record, stored);
                }
            }
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use storage_memory::MemoryIndex;
    use txwatch_api::Hit;

    use super::*;
    use crate::format::format_hit;

    fn record(id: &str) -> FormattedRecord {
        format_hit(&Hit::new(id, json!({"@timestamp": "2024-01-01T00:00:00Z"})))
    }

    async fn indexed(ids: &[&str]) -> Arc<MemoryIndex> {
        let index = Arc::new(MemoryIndex::new());
        for id in ids {
            index
                .insert("txn", id, json!({"@timestamp": "2024-01-01T00:00:00Z"}))
                .await;
        }
        index
    }

    #[tokio::test]
    async fn memory_store_fields_are_independent() {
        let store = MemoryAnnotationStore::new(indexed(&["a"]).await);
        store.write("txn", "a", &Annotation::Tickbox(true)).await.unwrap();
        store.write("txn", "a", &Annotation::Remark("checked".into())).await.unwrap();
        store.write("txn", "a", &Annotation::Remark("rechecked".into())).await.unwrap();

        let got = store.get("txn", "a").await.unwrap();
        assert!(got.tickbox);
        assert_eq!(got.remark, "rechecked");
        assert_eq!(store.get("other", "a").await, None);
    }

    #[tokio::test]
    async fn memory_store_refuses_unknown_records() {
        let store = MemoryAnnotationStore::new(indexed(&["a"]).await);

        let err = store.write("txn", "ghost", &Annotation::Tickbox(true)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let err = store.write("other", "a", &Annotation::Tickbox(true)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        assert_eq!(store.get("txn", "ghost").await, None);
        assert_eq!(store.get("other", "a").await, None);
    }

    #[tokio::test]
    async fn memory_store_overlays_only_known_records() {
        let store = MemoryAnnotationStore::new(indexed(&["a", "b"]).await);
        store.write("txn", "a", &Annotation::Tickbox(true)).await.unwrap();

        let out = store.overlay("txn", vec![record("a"), record("b")]).await.unwrap();
        assert!(out[0].tickbox);
        assert_eq!(out[0].data["tickbox"], json!(true));
        assert!(!out[1].tickbox);
        assert!(out[1].data.get("tickbox").is_none());
    }

    #[tokio::test]
    async fn index_store_writes_through_to_the_record() {
        let index = Arc::new(MemoryIndex::new());
        index
            .insert("txn", "a", json!({"@timestamp": "2024-01-01T00:00:00Z", "amount": 3}))
            .await;
        let store = IndexAnnotationStore::new(index.clone());

        store.write("txn", "a", &Annotation::Remark("reviewed".into())).await.unwrap();

        let doc = index.get("txn", "a").await.unwrap();
        assert_eq!(doc["remark"], json!("reviewed"));
        assert_eq!(doc["amount"], json!(3));
        assert!(doc.get("tickbox").is_none());
    }

    #[tokio::test]
    async fn index_store_reports_missing_record() {
        let index = Arc::new(MemoryIndex::new());
        index.create_index("txn").await;
        let store = IndexAnnotationStore::new(index);

        let err = store.write("txn", "nope", &Annotation::Tickbox(true)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn backend_is_selected_by_name() {
        #[derive(Deserialize)]
        struct Wrap {
            annotations: AnnotationBackend,
        }
        let w: Wrap = serde_json::from_str(r#"{"annotations":"memory"}"#).unwrap();
        assert_eq!(w.annotations, AnnotationBackend::Memory);
        let w: Wrap = serde_json::from_str(r#"{"annotations":"index"}"#).unwrap();
        assert_eq!(w.annotations, AnnotationBackend::Index);
    }
}
