//! Status routes: liveness, readiness of the store, build identity.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::time::Instant;

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

/// Readiness of the ledger store and the model it serves.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Readiness {
    status: &'static str,
    database: &'static str,
    schema: String,
    tables: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    ping_ms: Option<u128>,
}

#[derive(Serialize)]
struct Build {
    name: &'static str,
    version: &'static str,
}

const BUILD: Build = Build {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
};

async fn live() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

async fn build() -> Json<Build> {
    Json(BUILD)
}

async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let started = Instant::now();
    let ping = match state.store.acquire().await {
        Ok(mut conn) => conn.ping().await,
        Err(e) => Err(e),
    };
    let mut body = Readiness {
        status: "ok",
        database: "ok",
        schema: state.settings.schema.clone(),
        tables: state.model.entities().count(),
        ping_ms: None,
    };
    match ping {
        Ok(()) => {
            body.ping_ms = Some(started.elapsed().as_millis());
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            tracing::warn!(error = %e, schema = %body.schema, "store not ready");
            body.status = "degraded";
            body.database = "unavailable";
            (StatusCode::SERVICE_UNAVAILABLE, Json(body))
        }
    }
}

fn status_routes<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new()
        .route("/health", get(live))
        .route("/version", get(build))
        .route("/info", get(build))
}

/// `/health`, `/version` and `/info`; no store needed.
pub fn common_routes() -> Router {
    status_routes()
}

/// Status routes plus `/ready`, which pings the store.
pub fn common_routes_with_ready(state: AppState) -> Router {
    status_routes().route("/ready", get(ready)).with_state(state)
}
