use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};

use super::accounts::{AccountRequest, AccountRequestHandler, AccountService};
use super::coupons::{CouponRequestHandler, CouponService, CouponServiceRequest};
use super::events::{EventRequestHandler, EventService};
use super::registration::{
    RegistrationRequest, RegistrationRequestHandler, RegistrationService, SubmitOutcome,
};
use super::verification::{
    VerificationRequest, VerificationRequestHandler, VerificationService,
};
use super::{Service, ServiceError};
use crate::models::coupons::{CouponEntry, CouponOutcome, DiscountKind};
use crate::models::registration::{DraftField, DraftPatch, RegistrationStep, SessionSnapshot};
use crate::repositories::accounts::AccountRepository;
use crate::repositories::coupons::CouponRepository;
use crate::repositories::sessions::SessionRepository;
use crate::settings::{Verification, VerificationMode};

/// The full service stack wired over channels, with zero simulated delays
/// and an in-memory database.
struct TestStack {
    registration_tx: mpsc::Sender<RegistrationRequest>,
    verification_tx: mpsc::Sender<VerificationRequest>,
    coupon_tx: mpsc::Sender<CouponServiceRequest>,
    repository: AccountRepository,
    pool: SqlitePool,
}

async fn start_stack() -> TestStack {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    let repository = AccountRepository::new(pool.clone());
    repository.init().await.expect("schema");

    let (registration_tx, mut registration_rx) = mpsc::channel(16);
    let (verification_tx, mut verification_rx) = mpsc::channel(16);
    let (coupon_tx, mut coupon_rx) = mpsc::channel(16);
    let (account_tx, mut account_rx) = mpsc::channel(16);
    let (event_tx, mut event_rx) = mpsc::channel(16);

    let sessions = SessionRepository::new("Brasil".to_string(), "+55".to_string());

    let mut registration_service = RegistrationService::new();
    let registration_sessions = sessions.clone();
    let registration_account_tx = account_tx.clone();
    let registration_event_tx = event_tx.clone();
    tokio::spawn(async move {
        registration_service
            .run(
                RegistrationRequestHandler::new(
                    registration_sessions,
                    registration_account_tx,
                    registration_event_tx,
                ),
                &mut registration_rx,
            )
            .await;
    });

    let mut verification_service = VerificationService::new();
    let verification_sessions = sessions.clone();
    tokio::spawn(async move {
        verification_service
            .run(
                VerificationRequestHandler::new(
                    Verification {
                        mode: VerificationMode::Simulated,
                        accepted_code: "123456".to_string(),
                        send_delay_ms: 0,
                        verify_delay_ms: 0,
                        resend_cooldown_secs: 60,
                        url: String::new(),
                        auth_token: String::new(),
                    },
                    verification_sessions,
                ),
                &mut verification_rx,
            )
            .await;
    });

    let mut coupon_service = CouponService::new();
    let coupon_sessions = sessions.clone();
    let coupon_repository = CouponRepository::new(
        vec![
            CouponEntry {
                code: "WELCOME".to_string(),
                kind: DiscountKind::Percentage,
                amount: 10.0,
            },
            CouponEntry {
                code: "PROMO20".to_string(),
                kind: DiscountKind::Percentage,
                amount: 20.0,
            },
            CouponEntry {
                code: "DISCOUNT50".to_string(),
                kind: DiscountKind::Flat,
                amount: 50.0,
            },
        ],
        Duration::ZERO,
    );
    tokio::spawn(async move {
        coupon_service
            .run(
                CouponRequestHandler::new(coupon_repository, coupon_sessions),
                &mut coupon_rx,
            )
            .await;
    });

    let mut account_service = AccountService::new();
    let account_repository = repository.clone();
    let account_event_tx = event_tx.clone();
    tokio::spawn(async move {
        account_service
            .run(
                AccountRequestHandler::new(
                    account_repository,
                    Duration::ZERO,
                    "pt".to_string(),
                    account_event_tx,
                ),
                &mut account_rx,
            )
            .await;
    });

    let mut event_service = EventService::new();
    tokio::spawn(async move {
        event_service
            .run(EventRequestHandler::new(), &mut event_rx)
            .await;
    });

    TestStack {
        registration_tx,
        verification_tx,
        coupon_tx,
        repository,
        pool,
    }
}

impl TestStack {
    async fn start_session(&self) -> SessionSnapshot {
        let (tx, rx) = oneshot::channel();
        self.registration_tx
            .send(RegistrationRequest::StartSession { response: tx })
            .await
            .unwrap();
        rx.await.unwrap().unwrap()
    }

    async fn get_session(&self, id: &str) -> Result<SessionSnapshot, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.registration_tx
            .send(RegistrationRequest::GetSession {
                id: id.to_string(),
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    async fn update_draft(&self, id: &str, patch: DraftPatch) -> SessionSnapshot {
        let (tx, rx) = oneshot::channel();
        self.registration_tx
            .send(RegistrationRequest::UpdateDraft {
                id: id.to_string(),
                patch,
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap()
    }

    async fn advance(&self, id: &str) -> SessionSnapshot {
        let (tx, rx) = oneshot::channel();
        self.registration_tx
            .send(RegistrationRequest::Advance {
                id: id.to_string(),
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap()
    }

    async fn send_code(&self, id: &str) -> SessionSnapshot {
        let (tx, rx) = oneshot::channel();
        self.verification_tx
            .send(VerificationRequest::SendCode {
                session_id: id.to_string(),
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap()
    }

    async fn verify_code(&self, id: &str) -> SessionSnapshot {
        let (tx, rx) = oneshot::channel();
        self.verification_tx
            .send(VerificationRequest::VerifyCode {
                session_id: id.to_string(),
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap()
    }

    async fn validate_coupon(&self, id: &str) -> Option<CouponOutcome> {
        let (tx, rx) = oneshot::channel();
        self.coupon_tx
            .send(CouponServiceRequest::Validate {
                session_id: id.to_string(),
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap()
    }

    async fn submit(&self, id: &str) -> SubmitOutcome {
        let (tx, rx) = oneshot::channel();
        self.registration_tx
            .send(RegistrationRequest::Submit {
                id: id.to_string(),
                response: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap()
    }
}

fn ana_patch() -> DraftPatch {
    DraftPatch {
        first_name: Some("Ana".to_string()),
        last_name: Some("Silva".to_string()),
        email: Some("ana@x.com".to_string()),
        phone: Some("11999999999".to_string()),
        ..Default::default()
    }
}

fn security_patch() -> DraftPatch {
    DraftPatch {
        password: Some("Abcdef12".to_string()),
        confirm_password: Some("Abcdef12".to_string()),
        accept_terms: Some(true),
        ..Default::default()
    }
}

#[tokio::test]
async fn full_registration_flow_creates_the_account() {
    let stack = start_stack().await;

    let session = stack.start_session().await;
    assert_eq!(session.step, RegistrationStep::PersonalInfo);
    assert_eq!(session.draft.country_code, "+55");
    assert_eq!(session.draft.country, "Brasil");

    // An empty draft cannot advance.
    let blocked = stack.advance(&session.id).await;
    assert_eq!(blocked.step, RegistrationStep::PersonalInfo);
    assert!(!blocked.errors.is_empty());

    stack.update_draft(&session.id, ana_patch()).await;

    // Still gated: the phone has not been verified.
    let blocked = stack.advance(&session.id).await;
    assert_eq!(blocked.step, RegistrationStep::PersonalInfo);
    assert_eq!(blocked.errors.get(DraftField::Phone), Some("Phone must be verified."));

    let sent = stack.send_code(&session.id).await;
    assert!(sent.otp_sent);
    assert_eq!(sent.resend_cooldown_seconds, 60);

    stack
        .update_draft(
            &session.id,
            DraftPatch {
                otp_code: Some("123456".to_string()),
                ..Default::default()
            },
        )
        .await;
    let verified = stack.verify_code(&session.id).await;
    assert!(verified.draft.phone_verified);

    let security = stack.advance(&session.id).await;
    assert_eq!(security.step, RegistrationStep::Security);
    assert!(security.errors.is_empty());

    // Submitting before the security fields are filled is rejected.
    match stack.submit(&session.id).await {
        SubmitOutcome::Rejected { session } => {
            assert!(session.errors.get(DraftField::Password).is_some());
        }
        SubmitOutcome::Completed { .. } => panic!("incomplete step 2 must not submit"),
    }

    stack.update_draft(&session.id, security_patch()).await;

    match stack.submit(&session.id).await {
        SubmitOutcome::Completed { account, redirect } => {
            assert_eq!(account.email, "ana@x.com");
            assert_eq!(account.name, "Ana Silva");
            assert_eq!(account.account_type, "user");
            assert_eq!(redirect, "/dashboard");
        }
        SubmitOutcome::Rejected { .. } => panic!("a complete draft must submit"),
    }

    // The record is durable; the session is not.
    let stored = stack
        .repository
        .get_account_by_email("ana@x.com")
        .await
        .unwrap()
        .expect("account row");
    assert_eq!(stored.name, "Ana Silva");
    assert!(matches!(
        stack.get_session(&session.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn wrong_code_fails_then_the_accepted_code_verifies() {
    let stack = start_stack().await;
    let session = stack.start_session().await;
    stack.update_draft(&session.id, ana_patch()).await;
    stack.send_code(&session.id).await;

    stack
        .update_draft(
            &session.id,
            DraftPatch {
                otp_code: Some("000000".to_string()),
                ..Default::default()
            },
        )
        .await;
    let rejected = stack.verify_code(&session.id).await;
    assert!(!rejected.draft.phone_verified);
    assert_eq!(rejected.errors.get(DraftField::OtpCode), Some("Invalid code."));

    stack
        .update_draft(
            &session.id,
            DraftPatch {
                otp_code: Some("123456".to_string()),
                ..Default::default()
            },
        )
        .await;
    let verified = stack.verify_code(&session.id).await;
    assert!(verified.draft.phone_verified);
    assert_eq!(verified.errors.get(DraftField::OtpCode), None);
}

#[tokio::test]
async fn coupon_validation_is_display_only() {
    let stack = start_stack().await;
    let session = stack.start_session().await;

    // No coupon on the draft: nothing to validate.
    assert_eq!(stack.validate_coupon(&session.id).await, None);

    stack
        .update_draft(
            &session.id,
            DraftPatch {
                discount_coupon: Some("welcome".to_string()),
                ..Default::default()
            },
        )
        .await;
    let outcome = stack.validate_coupon(&session.id).await.expect("outcome");
    assert!(outcome.valid);
    assert_eq!(outcome.discount, Some(10.0));

    stack
        .update_draft(
            &session.id,
            DraftPatch {
                discount_coupon: Some("bogus".to_string()),
                ..Default::default()
            },
        )
        .await;
    let outcome = stack.validate_coupon(&session.id).await.expect("outcome");
    assert!(!outcome.valid);

    // The invalid coupon leaves the session submittable.
    let session = stack.get_session(&session.id).await.unwrap();
    assert!(session.errors.is_empty());
}

#[tokio::test]
async fn failed_account_creation_keeps_the_session_on_security() {
    let stack = start_stack().await;
    let session = stack.start_session().await;

    stack.update_draft(&session.id, ana_patch()).await;
    stack.send_code(&session.id).await;
    stack
        .update_draft(
            &session.id,
            DraftPatch {
                otp_code: Some("123456".to_string()),
                ..Default::default()
            },
        )
        .await;
    stack.verify_code(&session.id).await;
    stack.advance(&session.id).await;
    stack.update_draft(&session.id, security_patch()).await;

    // Take the database away so account creation fails.
    stack.pool.close().await;

    match stack.submit(&session.id).await {
        SubmitOutcome::Rejected { session } => {
            assert_eq!(session.step, RegistrationStep::Security);
            assert_eq!(
                session.errors.get(DraftField::General),
                Some("Failed to create the account, try again.")
            );
        }
        SubmitOutcome::Completed { .. } => panic!("submission must fail without a database"),
    }

    // The session survives for a manual retry.
    assert!(stack.get_session(&session.id).await.is_ok());
}
