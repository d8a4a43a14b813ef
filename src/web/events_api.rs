//! Test event endpoint

use actix_web::{web, HttpResponse, Result};
use serde_json::json;
use tracing::warn;

use crate::services::{EventPublisher, TestEvent, TestEventRequest};
use crate::web::error_response;

pub struct EventsApiHandler {
    publisher: EventPublisher,
}

impl EventsApiHandler {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }

    /// POST /api/send-event - Publish one event with the app's own credentials
    pub async fn send_event(&self, request: web::Json<TestEventRequest>) -> Result<HttpResponse> {
        let event = match TestEvent::try_from(request.into_inner()) {
            Ok(event) => event,
            Err(e) => return Ok(error_response(&e)),
        };

        match self.publisher.publish(&event).await {
            Ok(message) => Ok(HttpResponse::Ok().json(json!({ "success": true, "message": message }))),
            Err(e) => {
                warn!("Test event to app '{}' failed: {}", event.app_id, e);
                Ok(error_response(&e))
            }
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/send-event", web::post().to(send_event_handler));
}

pub async fn send_event_handler(
    handler: web::Data<EventsApiHandler>,
    request: web::Json<TestEventRequest>,
) -> Result<HttpResponse> {
    handler.send_event(request).await
}
