//! Form-driven catalog endpoints used by the admin tree and grid
//! widgets. Mutations answer with a plain-text body: `OK` on success,
//! `Can not move` or `Bad arguments` on a rejected request.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Form, Json,
};
use serde::Deserialize;

use super::middleware::AppState;
use crate::services::{CatalogError, ItemInput, SectionInput};

fn default_node() -> String {
    "root".to_string()
}

#[derive(Debug, Deserialize)]
pub struct NodeQuery {
    #[serde(default = "default_node")]
    pub node: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveForm {
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_node")]
    pub target: String,
    #[serde(default)]
    pub point: String,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityForm {
    #[serde(default)]
    pub items: String,
    #[serde(default)]
    pub visible: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    #[serde(default)]
    pub items: String,
}

#[derive(Debug, Deserialize)]
pub struct RelativeForm {
    #[serde(default)]
    pub relative: String,
}

#[derive(Debug, Deserialize)]
pub struct SectionForm {
    /// Tree item to update; absent means create
    pub id: Option<i64>,
    #[serde(default = "default_node")]
    pub target: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub show: Option<String>,
    pub meta: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemForm {
    /// Tree item to update; absent means create
    pub id: Option<i64>,
    #[serde(default = "default_node")]
    pub target: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub quantity: Option<String>,
    pub show: Option<String>,
    /// Comma-separated section row IDs; absent leaves membership alone
    pub sections: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageForm {
    #[serde(default)]
    pub path: String,
    pub palette: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageDeleteForm {
    pub id: i64,
}

/// Parse an optional boolean form field. An absent or empty value takes
/// the default.
fn parse_flag(value: Option<&str>, default: bool) -> Result<bool, CatalogError> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some("true") | Some("1") | Some("on") => Ok(true),
        Some("false") | Some("0") | Some("off") => Ok(false),
        Some(_) => Err(CatalogError::BadArguments),
    }
}

/// Parse an optional numeric form field; an empty value means `None`.
fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Result<Option<T>, CatalogError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| CatalogError::BadArguments),
    }
}

/// POST /admin/catalog/json/tree
pub async fn tree_children(
    State(state): State<AppState>,
    Form(query): Form<NodeQuery>,
) -> Result<impl IntoResponse, CatalogError> {
    let entries = state.catalog.children_tree(&query.node).await?;
    Ok(Json(entries))
}

/// POST /admin/catalog/json/list
pub async fn grid_children(
    State(state): State<AppState>,
    Form(query): Form<NodeQuery>,
) -> Result<impl IntoResponse, CatalogError> {
    let rows = state.catalog.children_grid(&query.node).await?;
    Ok(Json(serde_json::json!({ "items": rows })))
}

/// POST /admin/catalog/json/move
pub async fn move_nodes(
    State(state): State<AppState>,
    Form(form): Form<MoveForm>,
) -> Result<&'static str, CatalogError> {
    state
        .catalog
        .move_nodes(&form.source, &form.target, &form.point)
        .await?;
    Ok("OK")
}

/// POST /admin/catalog/json/visible
pub async fn set_visibility(
    State(state): State<AppState>,
    Form(form): Form<VisibilityForm>,
) -> Result<&'static str, CatalogError> {
    let visible = match form.visible.as_str() {
        "true" | "1" | "on" => true,
        "false" | "0" | "off" => false,
        _ => return Err(CatalogError::BadArguments),
    };
    state.catalog.set_visibility(&form.items, visible).await?;
    Ok("OK")
}

/// POST /admin/catalog/json/delete
pub async fn delete_nodes(
    State(state): State<AppState>,
    Form(form): Form<DeleteForm>,
) -> Result<&'static str, CatalogError> {
    state.catalog.delete_nodes(&form.items).await?;
    Ok("OK")
}

/// POST /admin/catalog/json/section/save
pub async fn save_section(
    State(state): State<AppState>,
    Form(form): Form<SectionForm>,
) -> Result<&'static str, CatalogError> {
    let input = SectionInput {
        name: form.name,
        description: form.description.filter(|d| !d.trim().is_empty()),
        show: parse_flag(form.show.as_deref(), true)?,
        is_meta: parse_flag(form.meta.as_deref(), false)?,
    };
    match form.id {
        Some(id) => state.catalog.update_section(id, input).await?,
        None => {
            state.catalog.create_section(&form.target, input).await?;
        }
    }
    Ok("OK")
}

/// POST /admin/catalog/json/item/save
pub async fn save_item(
    State(state): State<AppState>,
    Form(form): Form<ItemForm>,
) -> Result<&'static str, CatalogError> {
    let input = ItemInput {
        name: form.name,
        description: form.description.filter(|d| !d.trim().is_empty()),
        price: parse_number(form.price.as_deref())?,
        quantity: parse_number(form.quantity.as_deref())?,
        show: parse_flag(form.show.as_deref(), true)?,
        sections: form.sections,
    };
    match form.id {
        Some(id) => state.catalog.update_item(id, input).await?,
        None => {
            state.catalog.create_item(&form.target, input).await?;
        }
    }
    Ok("OK")
}

/// POST /admin/catalog/json/image/{id}/add
pub async fn add_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<ImageForm>,
) -> Result<&'static str, CatalogError> {
    let palette = parse_flag(form.palette.as_deref(), false)?;
    state.catalog.add_image(id, &form.path, palette).await?;
    Ok("OK")
}

/// POST /admin/catalog/json/image/delete
pub async fn delete_image(
    State(state): State<AppState>,
    Form(form): Form<ImageDeleteForm>,
) -> Result<&'static str, CatalogError> {
    state.catalog.delete_image(form.id).await?;
    Ok("OK")
}

/// POST /admin/catalog/json/relative/{id}/tree
pub async fn relative_tree(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, CatalogError> {
    let entries = state.catalog.relative_tree(id).await?;
    Ok(Json(entries))
}

/// POST /admin/catalog/json/relative/{id}/save
pub async fn save_relatives(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<RelativeForm>,
) -> Result<&'static str, CatalogError> {
    state.catalog.save_relatives(id, &form.relative).await?;
    Ok("OK")
}
