use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::registration::{
    DraftField, Operation, OperationState, SessionSnapshot, OTP_CODE_LEN,
};
use crate::repositories::sessions::SessionRepository;
use crate::repositories::verification::{
    digest_code, HttpSmsGateway, SimulatedSmsGateway, SmsGateway,
};
use crate::settings::{Verification, VerificationMode};

pub enum VerificationRequest {
    SendCode {
        session_id: String,
        response: oneshot::Sender<Result<SessionSnapshot, ServiceError>>,
    },
    VerifyCode {
        session_id: String,
        response: oneshot::Sender<Result<SessionSnapshot, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct VerificationRequestHandler {
    gateway: Arc<dyn SmsGateway>,
    sessions: SessionRepository,
    accepted_code: String,
    verify_delay: Duration,
    resend_cooldown_secs: u32,
}

impl VerificationRequestHandler {
    pub fn new(config: Verification, sessions: SessionRepository) -> Self {
        let gateway: Arc<dyn SmsGateway> = match config.mode {
            VerificationMode::Simulated => Arc::new(SimulatedSmsGateway::new(
                Duration::from_millis(config.send_delay_ms),
            )),
            VerificationMode::Http => {
                Arc::new(HttpSmsGateway::new(config.auth_token, config.url))
            }
        };

        VerificationRequestHandler {
            gateway,
            sessions,
            accepted_code: config.accepted_code,
            verify_delay: Duration::from_millis(config.verify_delay_ms),
            resend_cooldown_secs: config.resend_cooldown_secs,
        }
    }

    #[cfg(test)]
    fn with_gateway(
        gateway: Arc<dyn SmsGateway>,
        config: Verification,
        sessions: SessionRepository,
    ) -> Self {
        VerificationRequestHandler {
            gateway,
            sessions,
            accepted_code: config.accepted_code,
            verify_delay: Duration::from_millis(config.verify_delay_ms),
            resend_cooldown_secs: config.resend_cooldown_secs,
        }
    }

    async fn send_code(&self, session_id: &str) -> Result<SessionSnapshot, ServiceError> {
        let session = self
            .sessions
            .get(session_id)
            .map_err(|e| ServiceError::NotFound(e.to_string()))?;

        // Verification is one-way per session.
        if session.draft.phone_verified {
            return Err(ServiceError::InvalidRequest(
                "Phone already verified.".to_string(),
            ));
        }

        let phone = session.draft.phone.trim().to_string();
        if phone.is_empty() {
            return Err(ServiceError::InvalidRequest("Phone is required.".to_string()));
        }

        if session.otp.resend_cooldown_seconds > 0 {
            return Err(ServiceError::InvalidRequest(format!(
                "Resend available in {} seconds.",
                session.otp.resend_cooldown_seconds
            )));
        }

        self.sessions
            .begin_operation(session_id, Operation::SendCode)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;

        // Placeholder for a real code generator: the configured accepted
        // code is the one issued.
        let code = self.accepted_code.clone();

        match self.gateway.deliver_code(&phone, &code).await {
            Ok(()) => {
                self.sessions
                    .finish_operation(session_id, Operation::SendCode, OperationState::Succeeded);
                let session = self
                    .sessions
                    .mark_code_sent(session_id, digest_code(&code), self.resend_cooldown_secs)
                    .map_err(|e| ServiceError::NotFound(e.to_string()))?;
                self.start_cooldown_ticker(session_id.to_string());

                Ok(session.snapshot())
            }
            Err(e) => {
                log::error!("Failed to deliver verification code: {}", e);
                self.sessions
                    .finish_operation(session_id, Operation::SendCode, OperationState::Failed);
                let session = self
                    .sessions
                    .set_field_error(
                        session_id,
                        DraftField::OtpCode,
                        "Failed to send the code, try again.",
                    )
                    .map_err(|e| ServiceError::NotFound(e.to_string()))?;

                Ok(session.snapshot())
            }
        }
    }

    async fn verify_code(&self, session_id: &str) -> Result<SessionSnapshot, ServiceError> {
        let session = self
            .sessions
            .get(session_id)
            .map_err(|e| ServiceError::NotFound(e.to_string()))?;

        if session.draft.phone_verified {
            return Err(ServiceError::InvalidRequest(
                "Phone already verified.".to_string(),
            ));
        }

        let code = session.draft.otp_code.trim().to_string();
        if code.chars().count() != OTP_CODE_LEN {
            let session = self
                .sessions
                .set_field_error(session_id, DraftField::OtpCode, "Enter the 6-digit code.")
                .map_err(|e| ServiceError::NotFound(e.to_string()))?;
            return Ok(session.snapshot());
        }

        self.sessions
            .begin_operation(session_id, Operation::VerifyCode)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;

        tokio::time::sleep(self.verify_delay).await;

        let accepted = session.otp.code_digest.as_deref() == Some(digest_code(&code).as_str());
        if accepted {
            self.sessions
                .finish_operation(session_id, Operation::VerifyCode, OperationState::Succeeded);
            let session = self
                .sessions
                .mark_verified(session_id)
                .map_err(|e| ServiceError::NotFound(e.to_string()))?;
            log::info!("Phone verified for session {}.", session_id);

            Ok(session.snapshot())
        } else {
            self.sessions
                .finish_operation(session_id, Operation::VerifyCode, OperationState::Failed);
            let session = self
                .sessions
                .set_field_error(session_id, DraftField::OtpCode, "Invalid code.")
                .map_err(|e| ServiceError::NotFound(e.to_string()))?;

            Ok(session.snapshot())
        }
    }

    /// Decrements the session's resend cooldown once per second until it
    /// reaches zero or the session is discarded.
    fn start_cooldown_ticker(&self, session_id: String) {
        let sessions = self.sessions.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;

            loop {
                interval.tick().await;

                match sessions.tick_cooldown(&session_id) {
                    Some(0) | None => break,
                    Some(_) => {}
                }
            }
        });
    }
}

#[async_trait]
impl RequestHandler<VerificationRequest> for VerificationRequestHandler {
    async fn handle_request(&self, request: VerificationRequest) {
        match request {
            VerificationRequest::SendCode {
                session_id,
                response,
            } => {
                let result = self.send_code(&session_id).await;
                let _ = response.send(result);
            }
            VerificationRequest::VerifyCode {
                session_id,
                response,
            } => {
                let result = self.verify_code(&session_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct VerificationService;

impl VerificationService {
    pub fn new() -> Self {
        VerificationService {}
    }
}

#[async_trait]
impl Service<VerificationRequest, VerificationRequestHandler> for VerificationService {}
