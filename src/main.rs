use axum::{middleware, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use workboard_api::database::manager::DatabaseManager;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    let config = workboard_api::config::config();
    tracing_subscriber::fmt::init();
    tracing::info!("Starting Workboard API in {:?} mode", config.environment);

    let app = app();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Workboard API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(workboard_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn workboard_routes() -> Router {
    use workboard_api::handlers::workboards;

    Router::new()
        .route(
            "/api/workboards",
            get(workboards::list).post(workboards::create),
        )
        .route(
            "/api/workboards/:id",
            get(workboards::get)
                .put(workboards::update)
                .delete(workboards::delete),
        )
        .route("/api/workboards/:id/data", get(workboards::data))
        .layer(middleware::from_fn(
            workboard_api::middleware::jwt_auth_middleware,
        ))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Workboard API",
            "version": version,
            "description": "Multi-tenant CRM workboard query engine",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "workboards": "/api/workboards[/:id] (protected)",
                "data": "/api/workboards/:id/data (protected)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
