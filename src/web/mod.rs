//! Admin HTTP API
//!
//! Every JSON endpoint answers with a `success` flag; failures carry an
//! `error` message and a 400, 404 or 500 status.

pub mod apps_api;
pub mod events_api;
pub mod restart_api;

use std::path::Path;

use actix_web::{error::InternalError, web, HttpResponse};
use serde_json::json;
use tracing::error;

use crate::error::ManagerError;

pub use apps_api::AppsApiHandler;
pub use events_api::EventsApiHandler;
pub use restart_api::RestartApiHandler;

/// Map an error to its `{success: false, error}` response
pub fn error_response(err: &ManagerError) -> HttpResponse {
    let body = json!({ "success": false, "error": err.public_message() });
    match err {
        ManagerError::NotFound { .. } => HttpResponse::NotFound().json(body),
        ManagerError::Validation { .. } | ManagerError::Conflict { .. } => {
            HttpResponse::BadRequest().json(body)
        }
        other => {
            error!("❌ Request failed [{}]: {}", other.category(), other);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Malformed JSON bodies answer in the same shape as other client errors
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = json!({ "success": false, "error": err.to_string() });
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}

/// GET /health
pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// All API routes. Handlers are expected as app data.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health_handler));
    apps_api::configure_routes(cfg);
    restart_api::configure_routes(cfg);
    events_api::configure_routes(cfg);
}

/// Dashboard assets from `public_dir`; register after the API routes.
/// Nothing is served when the directory does not exist.
pub fn configure_static(cfg: &mut web::ServiceConfig, public_dir: &Path) {
    if !public_dir.is_dir() {
        return;
    }
    cfg.service(actix_files::Files::new("/", public_dir).index_file("index.html"));
}
