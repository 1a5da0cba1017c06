use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::config::Config;

/// CORS policy from `TALLY_CORS_ORIGINS`; wildcard when unset or unparseable.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let base = CorsLayer::new().allow_headers(Any).allow_methods(Any);

    let Some(origins_str) = &config.cors_allowed_origins else {
        return base.allow_origin(Any);
    };
    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if origins.is_empty() {
        warn!(origins = %origins_str, "no valid CORS origin; allowing any");
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}
