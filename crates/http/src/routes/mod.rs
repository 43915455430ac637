//! API route definitions

use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub mod observability;
pub mod telemetry;

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = "telemetry", description = "Browser telemetry ingestion"),
        (name = "observability", description = "Service health and internal metrics"),
    ),
)]
struct ApiDoc;

/// Build the service router
pub fn router(state: crate::AppState) -> axum::Router {
    let (router, _api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(telemetry::ingest_telemetry))
        .routes(routes!(observability::health_handler))
        .routes(routes!(observability::metrics_handler))
        .split_for_parts();

    router.with_state(state)
}
