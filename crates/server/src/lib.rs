pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub use crate::{config::Config, error::ApiError, state::AppState};

pub fn build_router(state: AppState) -> Router {
    let request_timeout = state.request_timeout();

    let api = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/me", routes::users::router())
        .nest("/projects", routes::projects::router())
        .nest("/payments", routes::payments::router())
        .nest("/paystack", routes::webhooks::router())
        .nest("/referrals", routes::referrals::router())
        .nest("/admin", routes::admin::router());

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api", api)
        .layer(middleware)
        // Health stays outside the timeout
        .merge(routes::health::router())
        .with_state(state)
}
