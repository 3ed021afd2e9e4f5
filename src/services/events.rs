use async_trait::async_trait;

use super::{RequestHandler, Service};
use crate::models::events::AnalyticsEvent;

pub enum EventRequest {
    Emit { event: AnalyticsEvent },
}

/// Best-effort sink: events are logged and dropped. Senders use `try_send`
/// and ignore the result, so a full or missing sink never blocks the flow.
#[derive(Clone)]
pub struct EventRequestHandler;

impl EventRequestHandler {
    pub fn new() -> Self {
        EventRequestHandler {}
    }
}

#[async_trait]
impl RequestHandler<EventRequest> for EventRequestHandler {
    async fn handle_request(&self, request: EventRequest) {
        match request {
            EventRequest::Emit { event } => match serde_json::to_string(&event) {
                Ok(payload) => log::info!("analytics: {}", payload),
                Err(e) => log::warn!("Could not serialize analytics event: {}", e),
            },
        }
    }
}

pub struct EventService;

impl EventService {
    pub fn new() -> Self {
        EventService {}
    }
}

#[async_trait]
impl Service<EventRequest, EventRequestHandler> for EventService {}
