//! Remoting router for the admin console widgets. A single endpoint
//! dispatches JSON-envelope calls to the `Catalog` action; results come
//! back in an `rpc` envelope, failures as an `exception` envelope so
//! the client can surface them without breaking the batch.

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::middleware::AppState;

pub const DIRECT_ACTION: &str = "Catalog";

#[derive(Debug, Deserialize)]
pub struct DirectRequest {
    pub action: String,
    pub method: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub tid: i64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DirectResponse {
    Rpc {
        tid: i64,
        action: String,
        method: String,
        result: Value,
    },
    Exception {
        tid: i64,
        message: String,
    },
}

impl DirectResponse {
    fn rpc(request: &DirectRequest, result: Value) -> Self {
        Self::Rpc {
            tid: request.tid,
            action: request.action.clone(),
            method: request.method.clone(),
            result,
        }
    }

    fn exception(tid: i64, message: impl Into<String>) -> Self {
        Self::Exception {
            tid,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ObjectsParams {
    #[serde(default)]
    start: i64,
    #[serde(default)]
    limit: i64,
    #[serde(default)]
    sort: String,
    #[serde(default)]
    dir: String,
}

/// POST /admin/catalog/treeitem/direct/router
pub async fn router(
    State(state): State<AppState>,
    Json(request): Json<DirectRequest>,
) -> impl IntoResponse {
    let response = dispatch(&state, &request).await;
    Json(response)
}

async fn dispatch(state: &AppState, request: &DirectRequest) -> DirectResponse {
    if request.action != DIRECT_ACTION {
        return DirectResponse::exception(
            request.tid,
            format!("Unknown action: {}", request.action),
        );
    }

    match request.method.as_str() {
        "objects" => objects(state, request).await,
        "tree" => tree(state, request).await,
        "getCM" => get_column_model(state, request),
        other => DirectResponse::exception(request.tid, format!("Unknown method: {}", other)),
    }
}

/// A page of the flat grid, wrapped for the paging toolbar.
async fn objects(state: &AppState, request: &DirectRequest) -> DirectResponse {
    let params: ObjectsParams = first_argument(request)
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .unwrap_or_default();

    match state
        .catalog
        .grid_page(params.start, params.limit, &params.sort, &params.dir)
        .await
    {
        Ok((rows, total)) => DirectResponse::rpc(
            request,
            json!({
                "results": total,
                "items": rows,
            }),
        ),
        Err(err) => {
            tracing::error!("Remoting objects call failed: {}", err);
            DirectResponse::exception(request.tid, err.to_string())
        }
    }
}

/// Children of a node for the tree widget. The argument is the node
/// parameter, `root` when absent.
async fn tree(state: &AppState, request: &DirectRequest) -> DirectResponse {
    let node = first_argument(request)
        .and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "root".to_string());

    match state.catalog.children_tree(&node).await {
        Ok(entries) => match serde_json::to_value(entries) {
            Ok(value) => DirectResponse::rpc(request, value),
            Err(err) => DirectResponse::exception(request.tid, err.to_string()),
        },
        Err(err) => {
            tracing::error!("Remoting tree call failed: {}", err);
            DirectResponse::exception(request.tid, err.to_string())
        }
    }
}

/// The merged column model for the grid.
fn get_column_model(state: &AppState, request: &DirectRequest) -> DirectResponse {
    let columns = state.catalog.column_model().describe();
    DirectResponse::rpc(request, Value::Array(columns))
}

fn first_argument(request: &DirectRequest) -> Option<Value> {
    match &request.data {
        Some(Value::Array(items)) => items.first().cloned(),
        Some(other) => Some(other.clone()),
        None => None,
    }
}
