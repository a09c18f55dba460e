// ABOUTME: Assembles the keygate router: default middleware, optional static files, gate, upstream.
// ABOUTME: Every request not answered by CORS, read-only mode, or a static file must pass the gate.

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, any};
use tower::Layer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::SharedState;
use crate::auth::AuthLayer;
use crate::upstream;

/// Build the complete Axum router around the shared state.
///
/// Layers, outermost first: tracing, gzip compression, CORS, no-cache
/// headers, read-only guard. Inside those, static files (when configured)
/// are tried before the gate, and whatever the gate lets through is
/// forwarded upstream.
pub fn create_router(state: SharedState) -> Router {
    let forward: MethodRouter = any(upstream::forward).with_state(SharedState::clone(&state));
    let gated = AuthLayer::new(state.gate.clone()).layer(forward);

    let mut router = match &state.defaults.static_dir {
        Some(dir) => Router::new().fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .fallback(gated),
        ),
        None => Router::new().fallback_service(gated),
    };

    if state.defaults.read_only {
        router = router.layer(middleware::from_fn(read_only));
    }

    router = router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::EXPIRES,
            HeaderValue::from_static("-1"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ));

    if state.defaults.cors {
        router = router.layer(cors_layer());
    }

    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Reflect the caller's origin and allow credentials, like a browser-facing
/// mock API expects.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

async fn read_only(req: Request, next: Next) -> Response {
    if req.method() == Method::GET {
        next.run(req).await
    } else {
        StatusCode::FORBIDDEN.into_response()
    }
}
