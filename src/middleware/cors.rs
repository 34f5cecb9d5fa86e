use axum::http::Method;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Builds the CORS layer for the public OAuth/MCP surface. Mirrors the
/// teacher's dynamic-origin CORS behavior (wildcard in developer mode,
/// explicit allow-list otherwise) but expressed as a `tower_http::CorsLayer`
/// instead of a hand-rolled OPTIONS responder.
pub fn build_cors_layer(allowed_origins: &[String], developer_mode: bool) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    if developer_mode || allowed_origins.is_empty() {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
