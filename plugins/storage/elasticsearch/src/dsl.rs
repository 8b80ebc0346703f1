use serde::Deserialize;
use serde_json::{Value, json};

use txwatch_api::{Hit, SearchQuery, SearchResponse};

/// Translate a `SearchQuery` into an Elasticsearch `_search` body.
///
/// The time bound goes into `must` (range), equality filters into
/// `filter` (term, no scoring).
pub fn search_body(query: &SearchQuery) -> Value {
    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|f| json!({ "term": { f.field.as_str(): f.value } }))
        .collect();

    json!({
        "query": {
            "bool": {
                "must": [
                    { "range": { query.timestamp_field.as_str(): { "lte": query.until } } }
                ],
                "filter": filters,
            }
        },
        "from": query.from,
        "size": query.size,
        "sort": [
            { query.timestamp_field.as_str(): query.sort.as_str() }
        ],
        "track_total_hits": true,
    })
}

#[derive(Deserialize)]
pub(crate) struct EsSearchResponse {
    hits: EsHits,
}

#[derive(Deserialize)]
struct EsHits {
    total: Option<EsTotal>,
    #[serde(default)]
    hits: Vec<EsHit>,
}

/// `{"value": n, "relation": "eq"}` since 7.x, a bare number before.
#[derive(Deserialize)]
#[serde(untagged)]
enum EsTotal {
    Object { value: u64 },
    Number(u64),
}

#[derive(Deserialize)]
struct EsHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
}

impl EsSearchResponse {
    pub(crate) fn into_response(self) -> SearchResponse {
        let hits: Vec<Hit> = self
            .hits
            .hits
            .into_iter()
            .map(|h| Hit::new(h.id, h.source))
            .collect();
        let total = match self.hits.total {
            Some(EsTotal::Object { value }) | Some(EsTotal::Number(value)) => value,
            None => hits.len() as u64,
        };
        SearchResponse { total, hits }
    }
}

#[derive(Deserialize)]
pub(crate) struct CatIndex {
    pub index: String,
}
