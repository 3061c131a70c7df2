use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, downloads, pages};
use crate::infra::app_state::AppState;

/// Create the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::locale_redirect_handler))
        .route("/index", get(pages::locale_redirect_handler))
        .route("/index.html", get(pages::locale_redirect_handler))
        .route("/en", get(pages::english_index_handler))
        .route("/en/", get(pages::english_index_handler))
        .route("/cn", get(pages::chinese_index_handler))
        .route("/cn/", get(pages::chinese_index_handler))
        .route("/healthz", get(pages::healthz_handler))
        .route("/api/downloads", get(downloads::list_downloads_handler))
        .route(
            "/api/admin/sync/{collection}",
            post(admin::sync_collection_handler),
        )
        .fallback(pages::served_file_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
