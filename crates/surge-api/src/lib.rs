pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// Build the full router: the control API under `/api`, metrics at `/metrics`.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/pool",
            get(handlers::handle_pool_status).post(handlers::handle_pool_set),
        )
        .route("/pool/stop", post(handlers::handle_pool_stop))
        .route("/pool/restart", post(handlers::handle_pool_restart));

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::handle_metrics))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "API listening on 127.0.0.1");
    axum::serve(listener, app).await?;
    Ok(())
}
