use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::RwLock;

use txwatch_api::{Hit, SearchIndex, SearchQuery, SearchResponse, SortOrder, StoreError, TermFilter};

// ═══════════════════════════════════════════════════════════════
//  MemoryIndexConfig
// ═══════════════════════════════════════════════════════════════

/// Config for `backend = "memory"`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct MemoryIndexConfig {
    /// JSON file `{ "<index>": [ { "_id": "...", ...source } ] }` loaded at startup.
    #[serde(default)]
    pub seed: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryIndex
// ═══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
struct Document {
    id: String,
    source: Value,
}

/// In-process search index. Семантика запросов та же, что у Elasticsearch:
/// документ без строкового timestamp в range не попадает.
///
/// Для тестов и для запуска без кластера.
#[derive(Default)]
pub struct MemoryIndex {
    indices: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MemoryIndexConfig) -> Result<Self, StoreError> {
        match &config.seed {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| StoreError::Unavailable(format!("read seed '{path}': {e}")))?;
                let index = Self::from_seed(&content)?;
                tracing::info!(seed = %path, "seeded memory index");
                Ok(index)
            }
            None => Ok(Self::new()),
        }
    }

    /// Build from a seed document (see `MemoryIndexConfig::seed`).
    ///
    /// Documents without `_id` get `<index>-<position>`.
    pub fn from_seed(json: &str) -> Result<Self, StoreError> {
        let seed: HashMap<String, Vec<serde_json::Map<String, Value>>> = serde_json::from_str(json)
            .map_err(|e| StoreError::Rejected(format!("parse seed: {e}")))?;

        let mut indices = HashMap::new();
        for (name, docs) in seed {
            let docs: Vec<Document> = docs
                .into_iter()
                .enumerate()
                .map(|(i, mut source)| {
                    let id = match source.remove("_id") {
                        Some(Value::String(id)) => id,
                        Some(other) => other.to_string(),
                        None => format!("{name}-{i}"),
                    };
                    Document {
                        id,
                        source: Value::Object(source),
                    }
                })
                .collect();
            indices.insert(name, docs);
        }
        Ok(Self {
            indices: RwLock::new(indices),
        })
    }

    /// Создать пустой индекс, если его ещё нет.
    pub async fn create_index(&self, index: &str) {
        let mut indices = self.indices.write().await;
        indices.entry(index.to_string()).or_default();
    }

    /// Добавить (или заменить) документ; индекс создаётся по требованию.
    pub async fn insert(&self, index: &str, id: &str, source: Value) {
        let mut indices = self.indices.write().await;
        let docs = indices.entry(index.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(doc) => doc.source = source,
            None => docs.push(Document {
                id: id.to_string(),
                source,
            }),
        }
    }

    pub async fn get(&self, index: &str, id: &str) -> Option<Value> {
        let indices = self.indices.read().await;
        indices
            .get(index)?
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.source.clone())
    }
}

fn matches(source: &Value, query: &SearchQuery) -> bool {
    let Some(ts) = source.get(&query.timestamp_field).and_then(Value::as_str) else {
        return false;
    };
    if ts > query.until.as_str() {
        return false;
    }
    query.filters.iter().all(|f| term_matches(source, f))
}

/// Точное совпадение; числа и bool сравниваются по JSON-тексту.
fn term_matches(source: &Value, filter: &TermFilter) -> bool {
    match source.get(&filter.field) {
        Some(Value::String(s)) => *s == filter.value,
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string() == filter.value,
        _ => false,
    }
}

fn timestamp<'a>(doc: &'a Document, field: &str) -> &'a str {
    doc.source.get(field).and_then(Value::as_str).unwrap_or_default()
}

impl SearchIndex for MemoryIndex {
    fn search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResponse, StoreError>> + Send + '_>> {
        let index = index.to_string();
        let query = query.clone();
        Box::pin(async move {
            let indices = self.indices.read().await;
            let docs = indices
                .get(&index)
                .ok_or_else(|| StoreError::NotFound(format!("index '{index}'")))?;

            let mut matched: Vec<&Document> =
                docs.iter().filter(|d| matches(&d.source, &query)).collect();

            let field = query.timestamp_field.as_str();
            matched.sort_by(|a, b| {
                let ord: Ordering = timestamp(a, field).cmp(timestamp(b, field));
                match query.sort {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });

            let total = matched.len() as u64;
            let hits = matched
                .into_iter()
                .skip(usize::try_from(query.from).unwrap_or(usize::MAX))
                .take(usize::try_from(query.size).unwrap_or(usize::MAX))
                .map(|d| Hit::new(d.id.clone(), d.source.clone()))
                .collect();

            Ok(SearchResponse { total, hits })
        })
    }

    fn exists(
        &self,
        index: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        let index = index.to_string();
        Box::pin(async move { Ok(self.indices.read().await.contains_key(&index)) })
    }

    fn contains(
        &self,
        index: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        let (index, id) = (index.to_string(), id.to_string());
        Box::pin(async move {
            let indices = self.indices.read().await;
            Ok(indices
                .get(&index)
                .is_some_and(|docs| docs.iter().any(|d| d.id == id)))
        })
    }

    fn indices(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(self.indices.read().await.keys().cloned().collect()) })
    }

    fn update_field(
        &self,
        index: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let (index, id, field) = (index.to_string(), id.to_string(), field.to_string());
        Box::pin(async move {
            let mut indices = self.indices.write().await;
            let docs = indices
                .get_mut(&index)
                .ok_or_else(|| StoreError::NotFound(format!("index '{index}'")))?;
            let doc = docs
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("document '{id}'")))?;
            match doc.source.as_object_mut() {
                Some(obj) => {
                    obj.insert(field, value);
                    Ok(())
                }
                None => Err(StoreError::Rejected(format!("document '{id}' is not an object"))),
            }
        })
    }
}
