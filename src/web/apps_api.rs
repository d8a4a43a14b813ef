//! App credential API endpoints
//!
//! Thin HTTP layer over [`AppRegistry`]. Mutating endpoints return the
//! restart outcome alongside the record.

use std::sync::Arc;

use actix_web::{web, HttpResponse, Result};
use serde_json::json;
use tracing::{debug, info};

use crate::services::{AppPatch, AppRegistry, NewApp};
use crate::web::error_response;

/// App management API handler
pub struct AppsApiHandler {
    registry: Arc<AppRegistry>,
}

impl AppsApiHandler {
    pub fn new(registry: Arc<AppRegistry>) -> Self {
        Self { registry }
    }

    /// GET /api/apps - All apps, secrets removed
    pub async fn list_apps(&self) -> Result<HttpResponse> {
        match self.registry.list().await {
            Ok(apps) => {
                debug!("Listing {} apps", apps.len());
                Ok(HttpResponse::Ok().json(json!({ "success": true, "apps": apps })))
            }
            Err(e) => Ok(error_response(&e)),
        }
    }

    /// GET /api/apps/{id}
    pub async fn get_app(&self, path: web::Path<String>) -> Result<HttpResponse> {
        let id = path.into_inner();
        match self.registry.get(&id).await {
            Ok(app) => Ok(HttpResponse::Ok().json(json!({ "success": true, "app": app }))),
            Err(e) => Ok(error_response(&e)),
        }
    }

    /// POST /api/apps
    pub async fn create_app(&self, request: web::Json<NewApp>) -> Result<HttpResponse> {
        match self.registry.create(request.into_inner()).await {
            Ok(change) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "app": change.app,
                "restart": change.restart,
            }))),
            Err(e) => Ok(error_response(&e)),
        }
    }

    /// PUT /api/apps/{id}
    pub async fn update_app(
        &self,
        path: web::Path<String>,
        request: web::Json<AppPatch>,
    ) -> Result<HttpResponse> {
        let id = path.into_inner();
        match self.registry.update(&id, request.into_inner()).await {
            Ok(change) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "app": change.app,
                "restart": change.restart,
            }))),
            Err(e) => Ok(error_response(&e)),
        }
    }

    /// DELETE /api/apps/{id}
    pub async fn delete_app(&self, path: web::Path<String>) -> Result<HttpResponse> {
        let id = path.into_inner();
        match self.registry.delete(&id).await {
            Ok(restart) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "message": "App deleted successfully",
                "restart": restart,
            }))),
            Err(e) => Ok(error_response(&e)),
        }
    }
}

/// Configure app routes under `/api/apps`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    info!("🔧 Configuring app routes at /api/apps");
    cfg.service(
        web::scope("/api/apps")
            .route("", web::get().to(list_apps_handler))
            .route("", web::post().to(create_app_handler))
            .route("/{id}", web::get().to(get_app_handler))
            .route("/{id}", web::put().to(update_app_handler))
            .route("/{id}", web::delete().to(delete_app_handler)),
    );
}

// Route handlers

pub async fn list_apps_handler(handler: web::Data<AppsApiHandler>) -> Result<HttpResponse> {
    handler.list_apps().await
}

pub async fn get_app_handler(
    handler: web::Data<AppsApiHandler>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    handler.get_app(path).await
}

pub async fn create_app_handler(
    handler: web::Data<AppsApiHandler>,
    request: web::Json<NewApp>,
) -> Result<HttpResponse> {
    handler.create_app(request).await
}

pub async fn update_app_handler(
    handler: web::Data<AppsApiHandler>,
    path: web::Path<String>,
    request: web::Json<AppPatch>,
) -> Result<HttpResponse> {
    info!("✏️ Update request for app: {}", path.as_ref());
    handler.update_app(path, request).await
}

pub async fn delete_app_handler(
    handler: web::Data<AppsApiHandler>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    handler.delete_app(path).await
}
