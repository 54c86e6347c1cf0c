//! Admin HTML views: the console shell, the plain changelist fallback
//! and the move / link forms.

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse},
    Form,
};
use serde::Deserialize;

use super::middleware::AppState;
use crate::services::CatalogError;

#[derive(Debug, Deserialize)]
pub struct ChangelistQuery {
    #[serde(default)]
    pub plain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TargetForm {
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub point: String,
}

fn default_target() -> String {
    "root".to_string()
}

fn render(result: anyhow::Result<String>) -> Result<Html<String>, CatalogError> {
    result.map(Html).map_err(CatalogError::from)
}

// Body the admin popup expects after a successful form submission
const CLOSE_POPUP: &str =
    "<script>window.opener && window.opener.location.reload(); window.close();</script>";

/// GET /admin/catalog/tree/ — the console, or the plain table when
/// scripting is unavailable (`?plain`).
pub async fn changelist(
    State(state): State<AppState>,
    Query(query): Query<ChangelistQuery>,
) -> Result<Html<String>, CatalogError> {
    if query.plain.is_some() {
        let rows = state.catalog.grid_all().await?;
        return render(state.templates.admin_changelist(&rows));
    }
    render(state.templates.admin_console())
}

/// GET /admin/catalog/tree/{id}/move
pub async fn move_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Html<String>, CatalogError> {
    let node = state.catalog.node(id).await?;
    let targets = state.catalog.folder_targets().await?;
    render(state.templates.admin_move_form(&node, &targets))
}

/// POST /admin/catalog/tree/{id}/move
pub async fn move_submit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<TargetForm>,
) -> Result<impl IntoResponse, CatalogError> {
    let point = if form.point.is_empty() {
        "append"
    } else {
        form.point.as_str()
    };
    state
        .catalog
        .move_nodes(&id.to_string(), &form.target, point)
        .await?;
    Ok(Html(CLOSE_POPUP))
}

/// GET /admin/catalog/{id}/newlink
pub async fn link_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Html<String>, CatalogError> {
    let node = state.catalog.node(id).await?;
    let targets = state.catalog.folder_targets().await?;
    render(state.templates.admin_link_form(&node, &targets))
}

/// POST /admin/catalog/{id}/newlink
pub async fn link_submit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<TargetForm>,
) -> Result<impl IntoResponse, CatalogError> {
    state.catalog.create_link(id, &form.target).await?;
    Ok(Html(CLOSE_POPUP))
}
