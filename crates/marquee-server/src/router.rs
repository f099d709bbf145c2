use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use marquee_assets::AssetBackendConfig;
use marquee_core::Cms;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler;

/// Build the axum router with all Marquee endpoints.
pub fn build_router(cms: Cms, config: &AppConfig) -> ServerResult<Router> {
    let api = Router::new()
        .route("/api/health", get(handler::health_handler))
        .route("/api/info", get(handler::info_handler))
        .route("/api/kinds", get(handler::kinds_handler))
        .route(
            "/api/:kind",
            get(handler::list_handler).post(handler::upsert_handler),
        )
        .route(
            "/api/:kind/:id",
            get(handler::show_handler)
                .put(handler::update_handler)
                .delete(handler::delete_handler),
        )
        .with_state(cms);

    let mut router = api;
    if let (Some(mount), AssetBackendConfig::Filesystem { root, .. }) =
        (&config.server.assets_mount, &config.assets.backend)
    {
        tracing::info!(mount = %mount, root = %root.display(), "serving assets from filesystem");
        router = router.nest_service(mount, ServeDir::new(root));
    }

    Ok(router
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(cors_layer(&config.server.allowed_origins)?)
        .layer(TraceLayer::new_for_http()))
}

fn cors_layer(allowed_origins: &[String]) -> ServerResult<CorsLayer> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| ServerError::Config(format!("invalid allowed origin `{origin}`")))
            })
            .collect::<ServerResult<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}
