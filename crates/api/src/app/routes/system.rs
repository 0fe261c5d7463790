//! Liveness, service health, and machine-readable discovery.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;

use crate::app::errors;
use crate::app::services::{AVERAGE_JOB_DURATION_SECS, AppServices};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/health
///
/// Queue depth and pricing summary.
pub async fn service_health(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let stats = match services.jobs.stats() {
        Ok(stats) => stats,
        Err(e) => return errors::store_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(json!({
            "service": "TrackForge",
            "version": env!("CARGO_PKG_VERSION"),
            "status": "operational",
            "queue": {
                "length": stats.queue_length,
                "estimatedWaitSeconds": stats.queue_length as u64 * AVERAGE_JOB_DURATION_SECS,
            },
            "pricing": {
                "generate": services.gate.config().price_display(),
                "status": "free",
            },
        })),
    )
        .into_response()
}

/// GET /api/discovery
///
/// Service catalog for automated clients.
pub async fn discovery(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let config = services.gate.config();

    (
        StatusCode::OK,
        Json(json!({
            "version": "1.0",
            "metadata": {
                "name": "TrackForge",
                "description": "Royalty-free instrumental music generation API. \
                    Pay-per-generation, no subscriptions.",
                "category": "AI/Music",
            },
            "resources": [
                {
                    "url": "/api/generate",
                    "method": "POST",
                    "description": "Generate royalty-free instrumental music.",
                    "price": config.price_display(),
                    "network": config.network,
                    "input": {
                        "type": "json",
                        "fields": {
                            "title": { "type": "string", "required": true },
                            "style": { "type": "string", "required": true },
                        },
                    },
                },
                {
                    "url": "/api/status/:jobId",
                    "method": "GET",
                    "description": "Check generation status and get download URLs when complete.",
                    "price": "Free",
                },
                {
                    "url": "/api/health",
                    "method": "GET",
                    "description": "Health check endpoint.",
                    "price": "Free",
                },
            ],
            "payment": {
                "network": config.network,
                "assetAddress": config.asset,
                "payTo": config.pay_to,
                "protocol": "x402",
            },
        })),
    )
        .into_response()
}
