use async_trait::async_trait;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::repositories::accounts::AccountRepository;
use crate::repositories::coupons::CouponRepository;
use crate::repositories::sessions::SessionRepository;
use crate::settings::Settings;

mod accounts;
mod coupons;
mod events;
mod http;
mod registration;
mod verification;

#[cfg(test)]
mod integration_tests;

#[derive(Debug, thiserror::Error)]
enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("External service error: {0} -> {1} => {2}")]
    ExternalService(String, String, String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: SqlitePool, settings: Settings) -> Result<(), anyhow::Error> {
    let (registration_tx, mut registration_rx) = mpsc::channel(512);
    let (verification_tx, mut verification_rx) = mpsc::channel(512);
    let (coupon_tx, mut coupon_rx) = mpsc::channel(512);
    let (account_tx, mut account_rx) = mpsc::channel(512);
    let (event_tx, mut event_rx) = mpsc::channel(512);

    let sessions = SessionRepository::new(
        settings.defaults.country.clone(),
        settings.defaults.country_code.clone(),
    );

    let account_repository = AccountRepository::new(pool.clone());
    account_repository.init().await?;

    let mut registration_service = registration::RegistrationService::new();
    let mut verification_service = verification::VerificationService::new();
    let mut coupon_service = coupons::CouponService::new();
    let mut account_service = accounts::AccountService::new();
    let mut event_service = events::EventService::new();

    println!("[*] Starting registration service.");
    let registration_sessions = sessions.clone();
    let registration_account_tx = account_tx.clone();
    let registration_event_tx = event_tx.clone();
    tokio::spawn(async move {
        registration_service
            .run(
                registration::RegistrationRequestHandler::new(
                    registration_sessions,
                    registration_account_tx,
                    registration_event_tx,
                ),
                &mut registration_rx,
            )
            .await;
    });

    println!("[*] Starting verification service.");
    let verification_sessions = sessions.clone();
    let verification_settings = settings.verification.clone();
    tokio::spawn(async move {
        verification_service
            .run(
                verification::VerificationRequestHandler::new(
                    verification_settings,
                    verification_sessions,
                ),
                &mut verification_rx,
            )
            .await;
    });

    log::info!("Starting coupon service.");
    let coupon_sessions = sessions.clone();
    let coupon_repository = CouponRepository::new(
        settings.coupons.catalog.clone(),
        Duration::from_millis(settings.coupons.lookup_delay_ms),
    );
    tokio::spawn(async move {
        coupon_service
            .run(
                coupons::CouponRequestHandler::new(coupon_repository, coupon_sessions),
                &mut coupon_rx,
            )
            .await;
    });

    println!("[*] Starting account service.");
    let account_event_tx = event_tx.clone();
    let account_submit_delay = Duration::from_millis(settings.accounts.submit_delay_ms);
    let account_default_language = settings.defaults.language.clone();
    tokio::spawn(async move {
        account_service
            .run(
                accounts::AccountRequestHandler::new(
                    account_repository,
                    account_submit_delay,
                    account_default_language,
                    account_event_tx,
                ),
                &mut account_rx,
            )
            .await;
    });

    log::info!("Starting event service.");
    tokio::spawn(async move {
        event_service
            .run(events::EventRequestHandler::new(), &mut event_rx)
            .await;
    });

    println!("[*] Starting HTTP server.");
    http::start_http_server(
        &settings.server.listen,
        registration_tx,
        verification_tx,
        coupon_tx,
        account_tx,
        event_tx,
    )
    .await?;

    Ok(())
}
