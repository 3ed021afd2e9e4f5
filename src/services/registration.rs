use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::accounts::AccountRequest;
use super::events::EventRequest;
use super::{RequestHandler, Service, ServiceError};
use crate::models::accounts::Account;
use crate::models::events::AnalyticsEvent;
use crate::models::registration::{
    validate_step2, DraftField, DraftPatch, Operation, OperationState, RegistrationStep,
    SessionSnapshot,
};
use crate::repositories::sessions::SessionRepository;

const DASHBOARD_ROUTE: &str = "/dashboard";

pub enum RegistrationRequest {
    StartSession {
        response: oneshot::Sender<Result<SessionSnapshot, ServiceError>>,
    },
    GetSession {
        id: String,
        response: oneshot::Sender<Result<SessionSnapshot, ServiceError>>,
    },
    UpdateDraft {
        id: String,
        patch: DraftPatch,
        response: oneshot::Sender<Result<SessionSnapshot, ServiceError>>,
    },
    Advance {
        id: String,
        response: oneshot::Sender<Result<SessionSnapshot, ServiceError>>,
    },
    Retreat {
        id: String,
        response: oneshot::Sender<Result<SessionSnapshot, ServiceError>>,
    },
    Submit {
        id: String,
        response: oneshot::Sender<Result<SubmitOutcome, ServiceError>>,
    },
}

pub enum SubmitOutcome {
    Completed { account: Account, redirect: String },
    Rejected { session: SessionSnapshot },
}

#[derive(Clone)]
pub struct RegistrationRequestHandler {
    sessions: SessionRepository,
    account_channel: mpsc::Sender<AccountRequest>,
    event_channel: mpsc::Sender<EventRequest>,
}

impl RegistrationRequestHandler {
    pub fn new(
        sessions: SessionRepository,
        account_channel: mpsc::Sender<AccountRequest>,
        event_channel: mpsc::Sender<EventRequest>,
    ) -> Self {
        RegistrationRequestHandler {
            sessions,
            account_channel,
            event_channel,
        }
    }

    fn start_session(&self) -> Result<SessionSnapshot, ServiceError> {
        let session = self.sessions.create();
        log::info!("Opened registration session {}.", session.id);
        Ok(session.snapshot())
    }

    fn get_session(&self, id: &str) -> Result<SessionSnapshot, ServiceError> {
        self.sessions
            .get(id)
            .map(|session| session.snapshot())
            .map_err(|e| ServiceError::NotFound(e.to_string()))
    }

    fn update_draft(&self, id: &str, patch: DraftPatch) -> Result<SessionSnapshot, ServiceError> {
        self.sessions
            .update_draft(id, patch)
            .map(|session| session.snapshot())
            .map_err(|e| ServiceError::NotFound(e.to_string()))
    }

    fn advance(&self, id: &str) -> Result<SessionSnapshot, ServiceError> {
        self.sessions
            .advance(id)
            .map(|session| session.snapshot())
            .map_err(|e| ServiceError::NotFound(e.to_string()))
    }

    fn retreat(&self, id: &str) -> Result<SessionSnapshot, ServiceError> {
        self.sessions
            .retreat(id)
            .map(|session| session.snapshot())
            .map_err(|e| ServiceError::NotFound(e.to_string()))
    }

    async fn submit(&self, id: &str) -> Result<SubmitOutcome, ServiceError> {
        let session = self
            .sessions
            .get(id)
            .map_err(|e| ServiceError::NotFound(e.to_string()))?;

        if session.step != RegistrationStep::Security {
            return Err(ServiceError::InvalidRequest(
                "Security step not reached.".to_string(),
            ));
        }

        let errors = validate_step2(&session.draft);
        if !errors.is_empty() {
            let session = self
                .sessions
                .set_errors(id, errors)
                .map_err(|e| ServiceError::NotFound(e.to_string()))?;
            return Ok(SubmitOutcome::Rejected {
                session: session.snapshot(),
            });
        }

        self.sessions
            .begin_operation(id, Operation::Submit)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;

        let (account_tx, account_rx) = oneshot::channel();
        let send_result = self
            .account_channel
            .send(AccountRequest::CreateAccount {
                email: session.draft.email.trim().to_string(),
                name: session.draft.full_name(),
                response: account_tx,
            })
            .await;

        if let Err(e) = send_result {
            self.sessions
                .finish_operation(id, Operation::Submit, OperationState::Failed);
            return Err(ServiceError::Communication(
                "Registration".to_string(),
                e.to_string(),
            ));
        }

        match account_rx.await {
            Ok(Ok(account)) => {
                self.sessions
                    .finish_operation(id, Operation::Submit, OperationState::Succeeded);
                // The draft is discarded; the account row is the only durable
                // side effect of the whole flow.
                self.sessions.remove(id);
                let _ = self.event_channel.try_send(EventRequest::Emit {
                    event: AnalyticsEvent::AccountCreated {
                        account_id: account.id.clone(),
                    },
                });
                log::info!("Registration session {} completed.", id);

                Ok(SubmitOutcome::Completed {
                    account,
                    redirect: DASHBOARD_ROUTE.to_string(),
                })
            }
            Ok(Err(service_error)) => {
                log::error!("Account creation failed: {}", service_error);
                self.sessions
                    .finish_operation(id, Operation::Submit, OperationState::Failed);
                let session = self
                    .sessions
                    .set_field_error(
                        id,
                        DraftField::General,
                        "Failed to create the account, try again.",
                    )
                    .map_err(|e| ServiceError::NotFound(e.to_string()))?;

                Ok(SubmitOutcome::Rejected {
                    session: session.snapshot(),
                })
            }
            Err(e) => {
                self.sessions
                    .finish_operation(id, Operation::Submit, OperationState::Failed);
                Err(ServiceError::ExternalService(
                    "RegistrationService".to_string(),
                    "AccountService".to_string(),
                    e.to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl RequestHandler<RegistrationRequest> for RegistrationRequestHandler {
    async fn handle_request(&self, request: RegistrationRequest) {
        match request {
            RegistrationRequest::StartSession { response } => {
                let _ = response.send(self.start_session());
            }
            RegistrationRequest::GetSession { id, response } => {
                let _ = response.send(self.get_session(&id));
            }
            RegistrationRequest::UpdateDraft {
                id,
                patch,
                response,
            } => {
                let _ = response.send(self.update_draft(&id, patch));
            }
            RegistrationRequest::Advance { id, response } => {
                let _ = response.send(self.advance(&id));
            }
            RegistrationRequest::Retreat { id, response } => {
                let _ = response.send(self.retreat(&id));
            }
            RegistrationRequest::Submit { id, response } => {
                let outcome = self.submit(&id).await;
                let _ = response.send(outcome);
            }
        }
    }
}

pub struct RegistrationService;

impl RegistrationService {
    pub fn new() -> Self {
        RegistrationService {}
    }
}

#[async_trait]
impl Service<RegistrationRequest, RegistrationRequestHandler> for RegistrationService {}
