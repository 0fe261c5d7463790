use axum::{
    Router,
    routing::{get, post},
};

pub mod generate;
pub mod status;
pub mod system;
pub mod worker;

/// Router for all service endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/api/generate", post(generate::submit))
        .route("/api/status/:job_id", get(status::job_status))
        .route(
            "/api/worker",
            get(worker::control_get).post(worker::control_post),
        )
        .route("/api/health", get(system::service_health))
        .route("/api/discovery", get(system::discovery))
}
