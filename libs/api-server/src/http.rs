use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use txwatch_api::{ErrorKind, PageSize, QueryParams, TxError};
use txwatch_engine::Caller;

use super::AppState;

/// Header carrying the already-authenticated principal name.
pub const PRINCIPAL_HEADER: &str = "x-principal";

// ═══════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════

/// `TxError` as an HTTP response:
/// `{"error": "...", "kind": "...", "retry_safe": bool}`.
#[derive(Debug)]
pub struct ApiError(pub TxError);

impl From<TxError> for ApiError {
    fn from(e: TxError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError(TxError::InvalidArgument(e.body_text()))
    }
}

fn status_of(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::AnnotationWriteFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let body = json!({
            "error": self.0.message(),
            "kind": kind,
            "retry_safe": kind.is_retry_safe(),
        });
        (status_of(kind), Json(body)).into_response()
    }
}

pub(crate) fn caller(state: &AppState, headers: &HeaderMap) -> Caller {
    let principal = headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    Caller::new(principal, state.request_timeout)
}

fn success() -> Json<serde_json::Value> {
    Json(json!({ "status": "success" }))
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/indices
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_list_indices(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller(&state, &headers);
    let names = state.coordinator.list_indices(&caller).await?;
    Ok(Json(names))
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/transactions?index=&page=&size=&order_id=&customer_id=&until=
// ═══════════════════════════════════════════════════════════════

/// Raw query string; numbers are parsed here so that bad input gets the
/// same JSON error body as every other failure.
#[derive(Deserialize)]
pub(crate) struct TransactionsQuery {
    #[serde(default)]
    index: String,
    page: Option<String>,
    size: Option<String>,
    order_id: Option<String>,
    customer_id: Option<String>,
    until: Option<String>,
}

impl TryFrom<TransactionsQuery> for QueryParams {
    type Error = TxError;

    fn try_from(q: TransactionsQuery) -> Result<Self, TxError> {
        let mut params = QueryParams::new(q.index);
        if let Some(page) = q.page {
            params.page = page.trim().parse().map_err(|_| {
                TxError::InvalidArgument(format!("page must be an integer, got '{page}'"))
            })?;
        }
        if let Some(size) = q.size {
            params.size = size.parse::<PageSize>().map_err(TxError::InvalidArgument)?;
        }
        params.order_id = q.order_id;
        params.customer_id = q.customer_id;
        params.until = q.until.filter(|u| !u.trim().is_empty());
        Ok(params)
    }
}

pub(crate) async fn handle_fetch_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TransactionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller(&state, &headers);
    let params = QueryParams::try_from(query)?;
    let page = state.coordinator.fetch_page(&caller, &params).await?;
    Ok(Json(page))
}

// ═══════════════════════════════════════════════════════════════
//  REST: POST /api/transactions/{index}/{id}/{tickbox|remark}
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct TickboxBody {
    tickbox: bool,
}

#[derive(Deserialize)]
pub(crate) struct RemarkBody {
    remark: String,
}

pub(crate) async fn handle_set_tickbox(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((index, id)): Path<(String, String)>,
    body: Result<Json<TickboxBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let caller = caller(&state, &headers);
    state
        .coordinator
        .set_tickbox(&caller, &index, &id, body.tickbox)
        .await?;
    Ok(success())
}

pub(crate) async fn handle_set_remark(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((index, id)): Path<(String, String)>,
    body: Result<Json<RemarkBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let caller = caller(&state, &headers);
    state
        .coordinator
        .set_remark(&caller, &index, &id, body.remark)
        .await?;
    Ok(success())
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::{Value, json};

    use crate::testing::start;

    use super::*;

    #[tokio::test]
    async fn lists_visible_indices() {
        let srv = start().await;
        let resp = reqwest::Client::new()
            .get(srv.url("/api/indices"))
            .header(PRINCIPAL_HEADER, "rui")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let names: Vec<String> = resp.json().await.unwrap();
        assert_eq!(names, vec!["txn"]);
        srv.shutdown.cancel();
    }

    #[tokio::test]
    async fn pages_newest_first_and_flags_new_data_once() {
        let srv = start().await;
        let http = reqwest::Client::new();
        let get = || {
            http.get(srv.url("/api/transactions?index=txn&page=1&size=all"))
                .header(PRINCIPAL_HEADER, "ana")
        };

        let body: Value = get().send().await.unwrap().json().await.unwrap();
        assert_eq!(body["total"], 2);
        assert_eq!(body["new_data"], true);
        assert_eq!(body["transactions"][0]["id"], "r2");
        assert_eq!(body["transactions"][0]["tickbox"], false);
        assert_eq!(body["transactions"][0]["remark"], "");
        assert_eq!(body["transactions"][0]["data"]["amount"], 20);

        let body: Value = get().send().await.unwrap().json().await.unwrap();
        assert_eq!(body["new_data"], false);
    }

    #[tokio::test]
    async fn filters_and_bounds_by_time() {
        let srv = start().await;
        let body: Value = reqwest::Client::new()
            .get(srv.url(
                "/api/transactions?index=txn&order_id=o-1&until=2024-09-03T05:03:50.500Z",
            ))
            .header(PRINCIPAL_HEADER, "ana")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(body["transactions"][0]["id"], "r1");
    }

    #[tokio::test]
    async fn maps_errors_to_status_and_body() {
        let srv = start().await;
        let http = reqwest::Client::new();

        let resp = http
            .get(srv.url("/api/transactions?index=txn&page=0"))
            .header(PRINCIPAL_HEADER, "ana")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["kind"], "invalid_argument");
        assert_eq!(body["retry_safe"], false);

        let resp = http
            .get(srv.url("/api/transactions?index=txn&page=2&size=all"))
            .header(PRINCIPAL_HEADER, "ana")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["retry_safe"], false);

        let resp = http
            .get(srv.url("/api/transactions?index=txn&size=lots"))
            .header(PRINCIPAL_HEADER, "ana")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = http
            .get(srv.url("/api/transactions?index=nope"))
            .header(PRINCIPAL_HEADER, "ana")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = http
            .get(srv.url("/api/transactions?index=txn"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["kind"], "unauthorized");
    }

    #[tokio::test]
    async fn writes_annotations() {
        let srv = start().await;
        let http = reqwest::Client::new();

        let resp = http
            .post(srv.url("/api/transactions/txn/r1/tickbox"))
            .header(PRINCIPAL_HEADER, "ana")
            .json(&json!({"tickbox": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"status": "success"}));

        let resp = http
            .post(srv.url("/api/transactions/txn/r1/remark"))
            .header(PRINCIPAL_HEADER, "ana")
            .json(&json!({"remark": "called customer"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let doc = srv.index.get("txn", "r1").await.unwrap();
        assert_eq!(doc["tickbox"], json!(true));
        assert_eq!(doc["remark"], json!("called customer"));
    }

    #[tokio::test]
    async fn rejects_bad_writes() {
        let srv = start().await;
        let http = reqwest::Client::new();

        let resp = http
            .post(srv.url("/api/transactions/txn/r1/tickbox"))
            .header(PRINCIPAL_HEADER, "rui")
            .json(&json!({"tickbox": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = http
            .post(srv.url("/api/transactions/txn/r1/tickbox"))
            .header(PRINCIPAL_HEADER, "ana")
            .json(&json!({"tickbox": "yes"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = http
            .post(srv.url("/api/transactions/txn/ghost/remark"))
            .header(PRINCIPAL_HEADER, "ana")
            .json(&json!({"remark": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
