use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handlers::{
    events_ws, get_unsettled_summary, health_check, manual_fancy_settle, manual_settle,
    manual_void, AppState,
};
use crate::middleware::rate_limit::{admin_rate_limit, AdminRateLimit};

pub async fn create_app(state: AppState) -> Router {
    info!("setting up HTTP routes");

    let admin_routes = Router::new()
        .route("/matches/:id/settle", post(manual_settle))
        .route("/matches/:id/void", post(manual_void))
        .route("/fancy/:id/settle", post(manual_fancy_settle))
        .route("/unsettled", get(get_unsettled_summary))
        .layer(
            ServiceBuilder::new()
                .layer(Extension(Arc::new(AdminRateLimit::default())))
                .layer(axum::middleware::from_fn(admin_rate_limit)),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ws/events", get(events_ws))
        .nest("/api/v1/admin", admin_routes)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
