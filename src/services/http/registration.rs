use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tokio::sync::oneshot;

use crate::models::registration::DraftPatch;
use crate::services::coupons::CouponServiceRequest;
use crate::services::registration::{RegistrationRequest, SubmitOutcome};
use crate::services::verification::VerificationRequest;

pub async fn create_session(State(state): State<super::AppState>) -> impl IntoResponse {
    let (session_tx, session_rx) = oneshot::channel();

    let result = state
        .registration_channel
        .send(RegistrationRequest::StartSession {
            response: session_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match session_rx.await {
        Ok(Ok(snapshot)) => (StatusCode::CREATED, Json(json!(snapshot))),
        Ok(Err(service_error)) => (
            super::error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn get_session(
    State(state): State<super::AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let (session_tx, session_rx) = oneshot::channel();

    let result = state
        .registration_channel
        .send(RegistrationRequest::GetSession {
            id: session_id,
            response: session_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match session_rx.await {
        Ok(Ok(snapshot)) => (StatusCode::OK, Json(json!(snapshot))),
        Ok(Err(service_error)) => (
            super::error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn update_draft(
    State(state): State<super::AppState>,
    Path(session_id): Path<String>,
    Json(patch): Json<DraftPatch>,
) -> impl IntoResponse {
    let (session_tx, session_rx) = oneshot::channel();

    let result = state
        .registration_channel
        .send(RegistrationRequest::UpdateDraft {
            id: session_id,
            patch,
            response: session_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match session_rx.await {
        Ok(Ok(snapshot)) => (StatusCode::OK, Json(json!(snapshot))),
        Ok(Err(service_error)) => (
            super::error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn advance(
    State(state): State<super::AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    step_request(state, session_id, StepDirection::Next).await
}

pub async fn retreat(
    State(state): State<super::AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    step_request(state, session_id, StepDirection::Previous).await
}

enum StepDirection {
    Next,
    Previous,
}

async fn step_request(
    state: super::AppState,
    session_id: String,
    direction: StepDirection,
) -> (StatusCode, Json<serde_json::Value>) {
    let (session_tx, session_rx) = oneshot::channel();

    let request = match direction {
        StepDirection::Next => RegistrationRequest::Advance {
            id: session_id,
            response: session_tx,
        },
        StepDirection::Previous => RegistrationRequest::Retreat {
            id: session_id,
            response: session_tx,
        },
    };

    let result = state.registration_channel.send(request).await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match session_rx.await {
        Ok(Ok(snapshot)) => (StatusCode::OK, Json(json!(snapshot))),
        Ok(Err(service_error)) => (
            super::error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn send_code(
    State(state): State<super::AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let (verification_tx, verification_rx) = oneshot::channel();

    let result = state
        .verification_channel
        .send(VerificationRequest::SendCode {
            session_id,
            response: verification_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match verification_rx.await {
        Ok(Ok(snapshot)) => (StatusCode::OK, Json(json!(snapshot))),
        Ok(Err(service_error)) => (
            super::error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn verify_code(
    State(state): State<super::AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let (verification_tx, verification_rx) = oneshot::channel();

    let result = state
        .verification_channel
        .send(VerificationRequest::VerifyCode {
            session_id,
            response: verification_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match verification_rx.await {
        Ok(Ok(snapshot)) => (StatusCode::OK, Json(json!(snapshot))),
        Ok(Err(service_error)) => (
            super::error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn validate_coupon(
    State(state): State<super::AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let (coupon_tx, coupon_rx) = oneshot::channel();

    let result = state
        .coupon_channel
        .send(CouponServiceRequest::Validate {
            session_id,
            response: coupon_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match coupon_rx.await {
        Ok(Ok(Some(outcome))) => (StatusCode::OK, Json(json!(outcome))),
        Ok(Ok(None)) => (
            StatusCode::OK,
            Json(json!({"description": "No coupon to validate."})),
        ),
        Ok(Err(service_error)) => (
            super::error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn submit(
    State(state): State<super::AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let (submit_tx, submit_rx) = oneshot::channel();

    let result = state
        .registration_channel
        .send(RegistrationRequest::Submit {
            id: session_id,
            response: submit_tx,
        })
        .await;
    if let Err(e) = result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match submit_rx.await {
        Ok(Ok(SubmitOutcome::Completed { account, redirect })) => (
            StatusCode::CREATED,
            Json(json!({
                "status": "completed",
                "account": account,
                "redirect": redirect
            })),
        ),
        Ok(Ok(SubmitOutcome::Rejected { session })) => (
            StatusCode::OK,
            Json(json!({
                "status": "rejected",
                "session": session
            })),
        ),
        Ok(Err(service_error)) => (
            super::error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}
