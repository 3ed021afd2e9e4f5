use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::accounts::AccountRequest;
use super::coupons::CouponServiceRequest;
use super::events::EventRequest;
use super::registration::RegistrationRequest;
use super::verification::VerificationRequest;
use super::ServiceError;
use crate::models::events::AnalyticsEvent;

mod registration;

#[derive(Clone)]
struct AppState {
    registration_channel: mpsc::Sender<RegistrationRequest>,
    verification_channel: mpsc::Sender<VerificationRequest>,
    coupon_channel: mpsc::Sender<CouponServiceRequest>,
    account_channel: mpsc::Sender<AccountRequest>,
    event_channel: mpsc::Sender<EventRequest>,
}

fn error_status(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize)]
struct LanguageBody {
    language: String,
}

async fn get_account(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    let (account_tx, account_rx) = oneshot::channel();

    let result = state
        .account_channel
        .send(AccountRequest::GetAccount {
            email,
            response: account_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match account_rx.await {
        Ok(Ok(Some(account))) => (StatusCode::OK, Json(json!(account))),
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"description": "Account not found."})),
        ),
        Ok(Err(service_error)) => (
            error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

async fn get_language(State(state): State<AppState>) -> impl IntoResponse {
    let (language_tx, language_rx) = oneshot::channel();

    let result = state
        .account_channel
        .send(AccountRequest::GetLanguage {
            response: language_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match language_rx.await {
        Ok(Ok(language)) => (StatusCode::OK, Json(json!({"language": language}))),
        Ok(Err(service_error)) => (
            error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

async fn set_language(
    State(state): State<AppState>,
    Json(body): Json<LanguageBody>,
) -> impl IntoResponse {
    let (language_tx, language_rx) = oneshot::channel();

    let result = state
        .account_channel
        .send(AccountRequest::SetLanguage {
            language: body.language.clone(),
            response: language_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match language_rx.await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({"language": body.language}))),
        Ok(Err(service_error)) => (
            error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

async fn emit_event(
    State(state): State<AppState>,
    Json(event): Json<AnalyticsEvent>,
) -> impl IntoResponse {
    // Best-effort: a dropped event is acceptable by contract.
    let _ = state.event_channel.try_send(EventRequest::Emit { event });

    (StatusCode::ACCEPTED, Json(json!({"accepted": true})))
}

pub async fn start_http_server(
    listen: &str,
    registration_channel: mpsc::Sender<RegistrationRequest>,
    verification_channel: mpsc::Sender<VerificationRequest>,
    coupon_channel: mpsc::Sender<CouponServiceRequest>,
    account_channel: mpsc::Sender<AccountRequest>,
    event_channel: mpsc::Sender<EventRequest>,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        registration_channel,
        verification_channel,
        coupon_channel,
        account_channel,
        event_channel,
    };

    let app = Router::new()
        .route("/registration", post(registration::create_session))
        .route("/registration/{id}", get(registration::get_session))
        .route("/registration/{id}/draft", put(registration::update_draft))
        .route("/registration/{id}/next", post(registration::advance))
        .route("/registration/{id}/previous", post(registration::retreat))
        .route(
            "/registration/{id}/verification/send",
            post(registration::send_code),
        )
        .route(
            "/registration/{id}/verification/verify",
            post(registration::verify_code),
        )
        .route(
            "/registration/{id}/coupon",
            post(registration::validate_coupon),
        )
        .route("/registration/{id}/submit", post(registration::submit))
        .route("/accounts/{email}", get(get_account))
        .route("/preferences/language", get(get_language).put(set_language))
        .route("/events", post(emit_event))
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
