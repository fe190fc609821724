//! HTTP helpers: CORS configuration.

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Builds a CORS layer answering preflight for one route.
///
/// Applied per route so the advertised methods are exactly the ones that
/// route serves. With a comma separated origin list only those origins are
/// allowed (with credentials); without one any origin may read.
pub fn build_cors_layer(cors_origins: Option<&str>, methods: &[Method]) -> CorsLayer {
    let methods = methods.to_vec();

    let origins = cors_origins
        .unwrap_or("")
        .split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "invalid cors origin");
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(methods)
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}
