//! The axum HTTP+WS surface (§6): router assembly and the middleware
//! stack. Grounded on `host/src/server/api/mod.rs`'s `create_router`
//! (CORS/compression/response-header/body-size/trace layer stack,
//! catch-all 404).

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::bearer_auth_middleware;
use crate::error::HostError;
use crate::state::AppState;

pub mod handlers;
pub mod ws;

pub async fn serve(address: &str, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from_str(address).map_err(|_| HostError::InvalidAddress(address.to_string()))?;
    let listener = TcpListener::bind(addr).await?;

    info!("Listening on: {}", listener.local_addr()?);

    let router = create_router(state.clone()).with_state(state);
    axum::serve(listener, router).await.context("server couldn't serve")?;

    Ok(())
}

pub fn create_router(state: AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ORIGIN,
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_origin(cors::Any);
    let compression = CompressionLayer::new();

    let middleware_stack = ServiceBuilder::new().layer(cors).layer(compression).layer(
        SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ),
    );

    let trace = TraceLayer::new_for_http();

    let authenticated = Router::new()
        .route(
            "/generate/text-to-image",
            post(handlers::generate::text_to_image),
        )
        .route(
            "/generate/image-reference",
            post(handlers::generate::image_reference),
        )
        .route(
            "/generate/image-multiple-reference",
            post(handlers::generate::image_multiple_reference),
        )
        .route(
            "/generate/queue/:generation_id",
            get(handlers::generate::get_generation),
        )
        .route(
            "/generate/my-generations",
            get(handlers::generate::list_my_generations),
        )
        .route("/tokens/balance", get(handlers::tokens::balance))
        .route("/tokens/history", get(handlers::tokens::history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_middleware,
        ));

    Router::new()
        .merge(authenticated)
        .route("/realtime", get(ws::upgrade))
        .layer(middleware_stack)
        .layer(middleware::from_fn_with_state(state, check_max_body_size))
        .layer(trace)
        .fallback(|uri: Uri| async move {
            (StatusCode::NOT_FOUND, format!("no handler found for {uri}"))
        })
}

async fn check_max_body_size(State(state): State<AppState>, req: Request, next: Next) -> Response {
    use axum::body::HttpBody;

    let content_length = match req.body().size_hint().upper() {
        Some(v) => v,
        None => state.max_upload_bytes + 1,
    };

    if content_length > state.max_upload_bytes {
        return HostError::PayloadTooLarge.into_response();
    }

    next.run(req).await
}
