//! Public catalog pages. Every catalog node lives at `/{slug}-{id}`;
//! everything else falls through to a 404.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;

use super::middleware::AppState;
use crate::models::ContentKind;
use crate::render::build_menu;
use crate::services::CatalogError;

static PAGE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(?P<slug>[\w-]*)-(?P<id>\d+)$").expect("Invalid page path regex"));

#[derive(Debug, serde::Deserialize)]
pub struct FragmentQuery {
    /// Restrict the fragment to one content kind
    #[serde(default)]
    pub kind: Option<String>,
}

/// GET / — root sections and the site menu.
pub async fn home(State(state): State<AppState>) -> Result<Html<String>, CatalogError> {
    let tree = state.catalog.visible_tree().await?;
    let menu = build_menu(&tree, state.menu_mode, &[]);
    let children: Vec<_> = tree.iter().map(|n| n.node.clone()).collect();
    Ok(Html(state.templates.home_page(&children, &menu)?))
}

/// GET /fragment/children/{id} — the inline children fragment.
pub async fn children_fragment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<FragmentQuery>,
) -> Result<Html<String>, CatalogError> {
    let node = state.catalog.node(id).await?;
    if !node.show {
        return Err(CatalogError::NotFound);
    }
    let (_, mut children, _) = state.catalog.resolve_page(&node.slug, id).await?;
    if let Some(kind) = &query.kind {
        let kind = kind
            .parse::<ContentKind>()
            .map_err(|_| CatalogError::BadArguments)?;
        children.retain(|c| c.content.kind == kind);
    }
    Ok(Html(state.templates.children_fragment(&children)?))
}

/// Fallback handler resolving `/{slug}-{id}` catalog pages.
pub async fn catalog_page(State(state): State<AppState>, uri: Uri) -> Response {
    let captures = match PAGE_PATH.captures(uri.path()) {
        Some(captures) => captures,
        None => return (StatusCode::NOT_FOUND, "Not found").into_response(),
    };
    let slug = &captures["slug"];
    let id = match captures["id"].parse::<i64>() {
        Ok(id) => id,
        Err(_) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
    };

    match render_page(&state, slug, id).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn render_page(state: &AppState, slug: &str, id: i64) -> Result<String, CatalogError> {
    let (mut node, children, crumbs) = state.catalog.resolve_page(slug, id).await?;

    // Meta-items carry the minimum price of their child items
    if node.content.kind == ContentKind::MetaItem {
        node.price = state.catalog.meta_item_price(id).await?;
    }

    // The active path opens the menu down to the current node
    let mut active_path: Vec<i64> = crumbs.iter().map(|c| c.tree_id).collect();
    active_path.push(node.tree_id);
    let tree = state.catalog.visible_tree().await?;
    let menu = build_menu(&tree, state.menu_mode, &active_path);

    if node.content.kind == ContentKind::Item {
        let relatives = state.catalog.public_relatives(id).await?;
        let images = state.catalog.node_images(id).await?;
        Ok(state
            .templates
            .item_page(&node, &crumbs, &relatives, &images, &menu)?)
    } else {
        Ok(state.templates.section_page(&node, &children, &crumbs, &menu)?)
    }
}
