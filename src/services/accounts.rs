use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::events::EventRequest;
use super::{RequestHandler, Service, ServiceError};
use crate::models::accounts::Account;
use crate::models::events::AnalyticsEvent;
use crate::repositories::accounts::{AccountRepository, LANGUAGE_KEY};

pub enum AccountRequest {
    CreateAccount {
        email: String,
        name: String,
        response: oneshot::Sender<Result<Account, ServiceError>>,
    },
    GetAccount {
        email: String,
        response: oneshot::Sender<Result<Option<Account>, ServiceError>>,
    },
    GetLanguage {
        response: oneshot::Sender<Result<String, ServiceError>>,
    },
    SetLanguage {
        language: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct AccountRequestHandler {
    repository: AccountRepository,
    submit_delay: Duration,
    default_language: String,
    event_channel: mpsc::Sender<EventRequest>,
}

impl AccountRequestHandler {
    pub fn new(
        repository: AccountRepository,
        submit_delay: Duration,
        default_language: String,
        event_channel: mpsc::Sender<EventRequest>,
    ) -> Self {
        AccountRequestHandler {
            repository,
            submit_delay,
            default_language,
            event_channel,
        }
    }

    async fn create_account(&self, email: &str, name: &str) -> Result<Account, ServiceError> {
        // Stands in for the account backend round trip.
        tokio::time::sleep(self.submit_delay).await;

        self.repository
            .insert_account(email, name)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn get_account(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        self.repository
            .get_account_by_email(email)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn get_language(&self) -> Result<String, ServiceError> {
        let stored = self
            .repository
            .get_preference(LANGUAGE_KEY)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        Ok(stored.unwrap_or_else(|| self.default_language.clone()))
    }

    async fn set_language(&self, language: &str) -> Result<(), ServiceError> {
        self.repository
            .set_preference(LANGUAGE_KEY, language)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        let _ = self.event_channel.try_send(EventRequest::Emit {
            event: AnalyticsEvent::LanguageChanged {
                language: language.to_string(),
            },
        });

        Ok(())
    }
}

#[async_trait]
impl RequestHandler<AccountRequest> for AccountRequestHandler {
    async fn handle_request(&self, request: AccountRequest) {
        match request {
            AccountRequest::CreateAccount {
                email,
                name,
                response,
            } => {
                let account = self.create_account(&email, &name).await;
                let _ = response.send(account);
            }
            AccountRequest::GetAccount { email, response } => {
                let account = self.get_account(&email).await;
                let _ = response.send(account);
            }
            AccountRequest::GetLanguage { response } => {
                let language = self.get_language().await;
                let _ = response.send(language);
            }
            AccountRequest::SetLanguage { language, response } => {
                let result = self.set_language(&language).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct AccountService;

impl AccountService {
    pub fn new() -> Self {
        AccountService {}
    }
}

#[async_trait]
impl Service<AccountRequest, AccountRequestHandler> for AccountService {}
