//! HTTP layer: routers, middleware, and the admin / remoting / public
//! handlers.

pub mod admin;
pub mod auth;
pub mod direct;
pub mod json;
pub mod middleware;
pub mod public;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::AppState;

/// Build the application router. `cors_origin` is the origin allowed to
/// call the admin endpoints with credentials; `*` mirrors the request
/// origin.
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // Read-only admin endpoints, open to editors
    let editor_routes = Router::new()
        .route("/admin/catalog/tree/", get(admin::changelist))
        .route("/admin/catalog/json/tree", post(json::tree_children))
        .route("/admin/catalog/json/list", post(json::grid_children))
        .route(
            "/admin/catalog/json/relative/{id}/tree",
            post(json::relative_tree),
        )
        .route(
            "/admin/catalog/treeitem/direct/router",
            post(direct::router),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_editor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Mutating admin endpoints, admins only
    let admin_routes = Router::new()
        .route("/admin/catalog/json/move", post(json::move_nodes))
        .route("/admin/catalog/json/visible", post(json::set_visibility))
        .route("/admin/catalog/json/delete", post(json::delete_nodes))
        .route("/admin/catalog/json/section/save", post(json::save_section))
        .route("/admin/catalog/json/item/save", post(json::save_item))
        .route("/admin/catalog/json/image/{id}/add", post(json::add_image))
        .route("/admin/catalog/json/image/delete", post(json::delete_image))
        .route(
            "/admin/catalog/json/relative/{id}/save",
            post(json::save_relatives),
        )
        .route(
            "/admin/catalog/tree/{id}/move",
            get(admin::move_form).post(admin::move_submit),
        )
        .route(
            "/admin/catalog/{id}/newlink",
            get(admin::link_form).post(admin::link_submit),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let allow_origin = if cors_origin == "*" {
        AllowOrigin::mirror_request()
    } else {
        match cors_origin.parse::<axum::http::HeaderValue>() {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => {
                tracing::warn!("Invalid CORS origin {:?}, mirroring requests", cors_origin);
                AllowOrigin::mirror_request()
            }
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/", get(public::home))
        .route("/fragment/children/{id}", get(public::children_fragment))
        .route("/admin/login", get(auth::login_form))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .merge(editor_routes)
        .merge(admin_routes)
        .fallback(public::catalog_page)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use std::sync::Arc;

    use crate::cache::MemoryCache;
    use crate::config::CatalogConfig;
    use crate::db::repositories::{
        ItemRepository, SectionRepository, SqlxImageRepository, SqlxItemRepository,
        SqlxSectionRepository, SqlxTreeItemRepository, SqlxUserRepository, TreeItemRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{ContentKind, ContentRef, Item, Section, TreeItem, UserRole};
    use crate::render::TemplateEngine;
    use crate::services::{AuthService, CatalogService, ContentRegistry};

    async fn test_state() -> (AppState, DynDatabasePool) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache = Arc::new(MemoryCache::with_capacity_and_ttl(
            1024,
            std::time::Duration::from_secs(60),
        ));
        let catalog = Arc::new(CatalogService::new(
            SqlxTreeItemRepository::boxed(pool.clone()),
            SqlxSectionRepository::boxed(pool.clone()),
            SqlxItemRepository::boxed(pool.clone()),
            SqlxImageRepository::boxed(pool.clone()),
            ContentRegistry::from_config(&CatalogConfig::default()),
            cache,
            CatalogConfig::default().grid_page_size,
        ));
        let auth = Arc::new(AuthService::new(SqlxUserRepository::boxed(pool.clone())));
        let templates = Arc::new(
            TemplateEngine::new(std::path::Path::new("/nonexistent"))
                .expect("Failed to build template engine"),
        );

        (
            AppState {
                catalog,
                auth,
                templates,
                menu_mode: crate::render::TreeMode::Drilldown,
            },
            pool,
        )
    }

    async fn seed_section(pool: &DynDatabasePool, name: &str, slug: &str) -> i64 {
        let sections = SqlxSectionRepository::new(pool.clone());
        let tree = SqlxTreeItemRepository::new(pool.clone());
        let section = sections
            .create(&Section::new(name.to_string(), None))
            .await
            .unwrap();
        tree.create(&TreeItem::new(
            None,
            slug.to_string(),
            ContentRef::new(ContentKind::Section, section.id),
        ))
        .await
        .unwrap()
        .id
    }

    async fn seed_item(pool: &DynDatabasePool, parent: i64, name: &str, slug: &str) -> i64 {
        let items = SqlxItemRepository::new(pool.clone());
        let tree = SqlxTreeItemRepository::new(pool.clone());
        let item = items
            .create(&Item::new(name.to_string(), None, Some(10.0), Some(1)))
            .await
            .unwrap();
        tree.create(&TreeItem::new(
            Some(parent),
            slug.to_string(),
            ContentRef::new(ContentKind::Item, item.id),
        ))
        .await
        .unwrap()
        .id
    }

    async fn login_token(server: &TestServer, state: &AppState, role: UserRole) -> String {
        let username = match role {
            UserRole::Admin => "boss",
            UserRole::Editor => "desk",
        };
        state
            .auth
            .create_user(username, "secret", role)
            .await
            .unwrap();
        let response = server
            .post("/api/auth/login")
            .form(&[("username", username), ("password", "secret")])
            .await;
        response.assert_status_ok();
        response.json::<auth::LoginResponse>().token
    }

    #[tokio::test]
    async fn test_admin_routes_require_auth() {
        let (state, _pool) = test_state().await;
        let server = TestServer::new(build_router(state, "*")).unwrap();

        let response = server.get("/admin/catalog/tree/").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/admin/catalog/json/move")
            .form(&[("source", "1"), ("target", "root")])
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_editor_cannot_mutate() {
        let (state, _pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        let token = login_token(&server, &state, UserRole::Editor).await;

        let response = server
            .get("/admin/catalog/tree/")
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();

        let response = server
            .post("/admin/catalog/json/delete")
            .authorization_bearer(&token)
            .form(&[("items", "1")])
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_move_endpoint_contract() {
        let (state, pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        let token = login_token(&server, &state, UserRole::Admin).await;

        let section = seed_section(&pool, "Tools", "tools").await;
        let other = seed_section(&pool, "Garden", "garden").await;
        let item = seed_item(&pool, section, "Hammer", "hammer").await;

        let response = server
            .post("/admin/catalog/json/move")
            .authorization_bearer(&token)
            .form(&[
                ("source", item.to_string()),
                ("target", other.to_string()),
                ("point", "append".to_string()),
            ])
            .await;
        response.assert_status_ok();
        response.assert_text("OK");

        // A section may not nest under an item
        let response = server
            .post("/admin/catalog/json/move")
            .authorization_bearer(&token)
            .form(&[
                ("source", section.to_string()),
                ("target", item.to_string()),
                ("point", "append".to_string()),
            ])
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_text("Can not move");
    }

    #[tokio::test]
    async fn test_delete_rejects_malformed_id_list() {
        let (state, pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        let token = login_token(&server, &state, UserRole::Admin).await;

        let section = seed_section(&pool, "Tools", "tools").await;

        let response = server
            .post("/admin/catalog/json/delete")
            .authorization_bearer(&token)
            .form(&[("items", format!("{},x", section))])
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_text("Bad arguments");

        // Nothing was deleted
        assert!(state.catalog.node(section).await.is_ok());
    }

    #[tokio::test]
    async fn test_visible_requires_explicit_flag() {
        let (state, pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        let token = login_token(&server, &state, UserRole::Admin).await;

        let section = seed_section(&pool, "Tools", "tools").await;

        // The flag must be sent; there is no implied default
        let response = server
            .post("/admin/catalog/json/visible")
            .authorization_bearer(&token)
            .form(&[("items", section.to_string())])
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_text("Bad arguments");
        assert!(state.catalog.node(section).await.unwrap().show);

        let response = server
            .post("/admin/catalog/json/visible")
            .authorization_bearer(&token)
            .form(&[("items", section.to_string()), ("visible", "0".to_string())])
            .await;
        response.assert_status_ok();
        response.assert_text("OK");
        assert!(!state.catalog.node(section).await.unwrap().show);
    }

    #[tokio::test]
    async fn test_section_and_item_save_endpoints() {
        let (state, _pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        let token = login_token(&server, &state, UserRole::Admin).await;

        let response = server
            .post("/admin/catalog/json/section/save")
            .authorization_bearer(&token)
            .form(&[("name", "Tools"), ("target", "root")])
            .await;
        response.assert_status_ok();
        response.assert_text("OK");

        let roots = state.catalog.children_tree("root").await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].text, "Tools");
        let section = roots[0].id;

        let response = server
            .post("/admin/catalog/json/item/save")
            .authorization_bearer(&token)
            .form(&[
                ("name", "Hammer".to_string()),
                ("target", section.to_string()),
                ("price", "12.5".to_string()),
                ("quantity", "3".to_string()),
            ])
            .await;
        response.assert_status_ok();
        response.assert_text("OK");

        let children = state
            .catalog
            .children_grid(&section.to_string())
            .await
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "Hammer");
        assert_eq!(children[0].price, 12.5);

        // Update by ID: rename and hide
        let response = server
            .post("/admin/catalog/json/item/save")
            .authorization_bearer(&token)
            .form(&[
                ("id", children[0].id.to_string()),
                ("name", "Sledge".to_string()),
                ("show", "0".to_string()),
            ])
            .await;
        response.assert_status_ok();
        let node = state.catalog.node(children[0].id).await.unwrap();
        assert_eq!(node.name, "Sledge");
        assert!(!node.show);
    }

    #[tokio::test]
    async fn test_item_save_rejects_bad_price() {
        let (state, pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        let token = login_token(&server, &state, UserRole::Admin).await;

        let section = seed_section(&pool, "Tools", "tools").await;

        let response = server
            .post("/admin/catalog/json/item/save")
            .authorization_bearer(&token)
            .form(&[
                ("name", "Hammer".to_string()),
                ("target", section.to_string()),
                ("price", "cheap".to_string()),
            ])
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_text("Bad arguments");
        assert!(state
            .catalog
            .children_grid(&section.to_string())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_image_endpoints() {
        let (state, pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        let token = login_token(&server, &state, UserRole::Admin).await;

        let section = seed_section(&pool, "Tools", "tools").await;
        let item = seed_item(&pool, section, "Hammer", "hammer").await;

        let response = server
            .post(&format!("/admin/catalog/json/image/{}/add", item))
            .authorization_bearer(&token)
            .form(&[("path", "catalog/hammer.jpg"), ("palette", "1")])
            .await;
        response.assert_status_ok();
        response.assert_text("OK");

        let images = state.catalog.node_images(item).await.unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].palette);

        let response = server
            .post("/admin/catalog/json/image/delete")
            .authorization_bearer(&token)
            .form(&[("id", images[0].id.to_string())])
            .await;
        response.assert_status_ok();
        assert!(state.catalog.node_images(item).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_router_dispatch() {
        let (state, pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        let token = login_token(&server, &state, UserRole::Editor).await;

        let section = seed_section(&pool, "Tools", "tools").await;
        seed_item(&pool, section, "Hammer", "hammer").await;

        let response = server
            .post("/admin/catalog/treeitem/direct/router")
            .authorization_bearer(&token)
            .json(&serde_json::json!({
                "action": "Catalog",
                "method": "objects",
                "data": [{"start": 0, "limit": 10}],
                "tid": 1,
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["type"], "rpc");
        assert_eq!(body["tid"], 1);
        assert_eq!(body["result"]["results"], 2);

        let response = server
            .post("/admin/catalog/treeitem/direct/router")
            .authorization_bearer(&token)
            .json(&serde_json::json!({
                "action": "Catalog",
                "method": "getCM",
                "tid": 2,
            }))
            .await;
        let body: serde_json::Value = response.json();
        assert_eq!(body["type"], "rpc");
        let columns = body["result"].as_array().unwrap();
        assert!(columns.iter().any(|c| c["dataIndex"] == "price"));

        let response = server
            .post("/admin/catalog/treeitem/direct/router")
            .authorization_bearer(&token)
            .json(&serde_json::json!({
                "action": "Catalog",
                "method": "nope",
                "tid": 3,
            }))
            .await;
        let body: serde_json::Value = response.json();
        assert_eq!(body["type"], "exception");
    }

    #[tokio::test]
    async fn test_public_page_resolution() {
        let (state, pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();

        let section = seed_section(&pool, "Tools", "tools").await;
        seed_item(&pool, section, "Hammer", "hammer").await;

        let response = server.get(&format!("/tools-{}", section)).await;
        response.assert_status_ok();
        assert!(response.text().contains("Tools"));
        assert!(response.text().contains("Hammer"));

        // Home lists the root level
        let response = server.get("/").await;
        response.assert_status_ok();
        assert!(response.text().contains("Tools"));

        // Children fragment, optionally restricted by kind
        let response = server
            .get(&format!("/fragment/children/{}", section))
            .add_query_param("kind", "item")
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("Hammer"));

        let response = server
            .get(&format!("/fragment/children/{}", section))
            .add_query_param("kind", "section")
            .await;
        response.assert_status_ok();
        assert!(!response.text().contains("Hammer"));

        // Wrong slug is a 404
        let response = server.get(&format!("/wrench-{}", section)).await;
        response.assert_status(StatusCode::NOT_FOUND);

        // Hidden nodes are not served
        state
            .catalog
            .set_visibility(&section.to_string(), false)
            .await
            .unwrap();
        let response = server.get(&format!("/tools-{}", section)).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_sets_session_cookie() {
        let (state, _pool) = test_state().await;
        let server = TestServer::new(build_router(state.clone(), "*")).unwrap();
        state
            .auth
            .create_user("boss", "secret", UserRole::Admin)
            .await
            .unwrap();

        let response = server
            .post("/api/auth/login")
            .form(&[("username", "boss"), ("password", "secret")])
            .await;
        response.assert_status_ok();
        let cookie = response.cookie("session");
        assert!(!cookie.value().is_empty());

        let response = server
            .post("/api/auth/login")
            .form(&[("username", "boss"), ("password", "wrong")])
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
