//! Manual restart endpoint

use std::sync::Arc;

use actix_web::{web, HttpResponse, Result};
use tracing::info;

use crate::supervisor::ServerRestarter;

pub struct RestartApiHandler {
    restarter: Arc<dyn ServerRestarter>,
}

impl RestartApiHandler {
    pub fn new(restarter: Arc<dyn ServerRestarter>) -> Self {
        Self { restarter }
    }

    /// POST /api/restart - Restart Soketi and report the outcome.
    /// Failures are reported in the body, not the status code.
    pub async fn restart(&self) -> Result<HttpResponse> {
        info!("🔄 Manual restart requested");
        let outcome = self.restarter.restart().await;
        Ok(HttpResponse::Ok().json(outcome))
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/restart", web::post().to(restart_handler));
}

pub async fn restart_handler(handler: web::Data<RestartApiHandler>) -> Result<HttpResponse> {
    handler.restart().await
}
