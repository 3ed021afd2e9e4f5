use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::coupons::CouponOutcome;
use crate::models::registration::{Operation, OperationState};
use crate::repositories::coupons::CouponRepository;
use crate::repositories::sessions::SessionRepository;

pub enum CouponServiceRequest {
    Validate {
        session_id: String,
        response: oneshot::Sender<Result<Option<CouponOutcome>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct CouponRequestHandler {
    repository: CouponRepository,
    sessions: SessionRepository,
}

impl CouponRequestHandler {
    pub fn new(repository: CouponRepository, sessions: SessionRepository) -> Self {
        CouponRequestHandler {
            repository,
            sessions,
        }
    }

    /// No-op when the draft carries no coupon. The outcome is display-only
    /// and never gates the flow.
    async fn validate(&self, session_id: &str) -> Result<Option<CouponOutcome>, ServiceError> {
        let session = self
            .sessions
            .get(session_id)
            .map_err(|e| ServiceError::NotFound(e.to_string()))?;

        let code = match session.draft.discount_coupon {
            Some(code) if !code.trim().is_empty() => code,
            _ => return Ok(None),
        };

        self.sessions
            .begin_operation(session_id, Operation::Coupon)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;

        match self.repository.lookup(&code).await {
            Ok(outcome) => {
                self.sessions
                    .finish_operation(session_id, Operation::Coupon, OperationState::Succeeded);
                Ok(Some(outcome))
            }
            Err(e) => {
                self.sessions
                    .finish_operation(session_id, Operation::Coupon, OperationState::Failed);
                Err(ServiceError::Repository(
                    "Coupons".to_string(),
                    e.to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl RequestHandler<CouponServiceRequest> for CouponRequestHandler {
    async fn handle_request(&self, request: CouponServiceRequest) {
        match request {
            CouponServiceRequest::Validate {
                session_id,
                response,
            } => {
                let result = self.validate(&session_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct CouponService;

impl CouponService {
    pub fn new() -> Self {
        CouponService {}
    }
}

#[async_trait]
impl Service<CouponServiceRequest, CouponRequestHandler> for CouponService {}
