use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::registration::{
    validate_step1, DraftField, DraftPatch, Operation, OperationState, Operations, OtpSession,
    RegistrationDraft, RegistrationSession, RegistrationStep, ValidationErrors,
};

/// In-memory store for in-progress registration sessions. Shared by the
/// registration, verification and coupon handlers.
#[derive(Clone)]
pub struct SessionRepository {
    sessions: Arc<DashMap<String, RegistrationSession>>,
    default_country: String,
    default_country_code: String,
}

impl SessionRepository {
    pub fn new(default_country: String, default_country_code: String) -> Self {
        SessionRepository {
            sessions: Arc::new(DashMap::new()),
            default_country,
            default_country_code,
        }
    }

    pub fn create(&self) -> RegistrationSession {
        let id = Uuid::new_v4().hyphenated().to_string();
        let session = RegistrationSession {
            id: id.clone(),
            step: RegistrationStep::PersonalInfo,
            draft: RegistrationDraft::new(&self.default_country_code, &self.default_country),
            otp: OtpSession::default(),
            ops: Operations::default(),
            errors: ValidationErrors::default(),
            created_at: Utc::now().naive_utc(),
        };

        self.sessions.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Result<RegistrationSession, anyhow::Error> {
        match self.sessions.get(id) {
            Some(session) => Ok(session.clone()),
            None => bail!("Session not found: {}", id),
        }
    }

    pub fn remove(&self, id: &str) -> Option<RegistrationSession> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    fn with_session<T>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut RegistrationSession) -> T,
    ) -> Result<T, anyhow::Error> {
        match self.sessions.get_mut(id) {
            Some(mut session) => Ok(apply(&mut session)),
            None => bail!("Session not found: {}", id),
        }
    }

    pub fn update_draft(
        &self,
        id: &str,
        patch: DraftPatch,
    ) -> Result<RegistrationSession, anyhow::Error> {
        self.with_session(id, |session| {
            patch.apply(&mut session.draft);
            session.clone()
        })
    }

    /// Step 1 -> 2, guarded by step-1 validation. The collected errors are
    /// stored on the session; the step only moves when there are none.
    pub fn advance(&self, id: &str) -> Result<RegistrationSession, anyhow::Error> {
        self.with_session(id, |session| {
            let errors = validate_step1(&session.draft);
            let valid = errors.is_empty();
            session.errors = errors;
            if valid && session.step == RegistrationStep::PersonalInfo {
                session.step = RegistrationStep::Security;
            }
            session.clone()
        })
    }

    /// Step 2 -> 1, unconditional.
    pub fn retreat(&self, id: &str) -> Result<RegistrationSession, anyhow::Error> {
        self.with_session(id, |session| {
            if session.step == RegistrationStep::Security {
                session.step = RegistrationStep::PersonalInfo;
            }
            session.clone()
        })
    }

    pub fn set_errors(
        &self,
        id: &str,
        errors: ValidationErrors,
    ) -> Result<RegistrationSession, anyhow::Error> {
        self.with_session(id, |session| {
            session.errors = errors;
            session.clone()
        })
    }

    pub fn set_field_error(
        &self,
        id: &str,
        field: DraftField,
        message: &str,
    ) -> Result<RegistrationSession, anyhow::Error> {
        self.with_session(id, |session| {
            session.errors.set(field, message);
            session.clone()
        })
    }

    /// Marks an operation in flight. Fails while a previous invocation of
    /// the same operation is still pending.
    pub fn begin_operation(&self, id: &str, operation: Operation) -> Result<(), anyhow::Error> {
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                if session.ops.get(operation) == OperationState::Pending {
                    bail!("Operation already in progress");
                }
                session.ops.set(operation, OperationState::Pending);
                Ok(())
            }
            None => bail!("Session not found: {}", id),
        }
    }

    /// Records an operation outcome. The session may have been removed in
    /// the meantime; that is not an error.
    pub fn finish_operation(&self, id: &str, operation: Operation, state: OperationState) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.ops.set(operation, state);
        }
    }

    pub fn mark_code_sent(
        &self,
        id: &str,
        code_digest: String,
        cooldown_seconds: u32,
    ) -> Result<RegistrationSession, anyhow::Error> {
        self.with_session(id, |session| {
            session.otp.sent = true;
            session.otp.code_digest = Some(code_digest);
            session.otp.resend_cooldown_seconds = cooldown_seconds;
            session.errors.clear(DraftField::OtpCode);
            session.clone()
        })
    }

    /// One-way transition: never reverts within a session.
    pub fn mark_verified(&self, id: &str) -> Result<RegistrationSession, anyhow::Error> {
        self.with_session(id, |session| {
            session.draft.phone_verified = true;
            session.errors.clear(DraftField::OtpCode);
            session.clone()
        })
    }

    /// Decrements the resend cooldown by one second, stopping at zero.
    /// Returns the remaining seconds, or `None` when the session is gone.
    pub fn tick_cooldown(&self, id: &str) -> Option<u32> {
        let mut session = self.sessions.get_mut(id)?;
        session.otp.resend_cooldown_seconds = session.otp.resend_cooldown_seconds.saturating_sub(1);
        Some(session.otp.resend_cooldown_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> SessionRepository {
        SessionRepository::new("Brasil".to_string(), "+55".to_string())
    }

    fn verified_step1_patch() -> DraftPatch {
        DraftPatch {
            first_name: Some("Ana".to_string()),
            last_name: Some("Silva".to_string()),
            email: Some("ana@x.com".to_string()),
            phone: Some("11999999999".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn create_seeds_defaults() {
        let session = repository().create();
        assert_eq!(session.step, RegistrationStep::PersonalInfo);
        assert_eq!(session.draft.country, "Brasil");
        assert_eq!(session.draft.country_code, "+55");
        assert!(!session.otp.sent);
        assert_eq!(session.otp.resend_cooldown_seconds, 0);
    }

    #[test]
    fn advance_keeps_step_while_invalid() {
        let repo = repository();
        let session = repo.create();

        let after = repo.advance(&session.id).unwrap();
        assert_eq!(after.step, RegistrationStep::PersonalInfo);
        assert!(!after.errors.is_empty());
    }

    #[test]
    fn advance_moves_once_valid_and_verified() {
        let repo = repository();
        let session = repo.create();
        repo.update_draft(&session.id, verified_step1_patch()).unwrap();

        // Still gated on verification.
        let blocked = repo.advance(&session.id).unwrap();
        assert_eq!(blocked.step, RegistrationStep::PersonalInfo);
        assert_eq!(blocked.errors.get(DraftField::Phone), Some("Phone must be verified."));

        repo.mark_verified(&session.id).unwrap();
        let after = repo.advance(&session.id).unwrap();
        assert_eq!(after.step, RegistrationStep::Security);
        assert!(after.errors.is_empty());
    }

    #[test]
    fn retreat_is_unconditional() {
        let repo = repository();
        let session = repo.create();
        repo.update_draft(&session.id, verified_step1_patch()).unwrap();
        repo.mark_verified(&session.id).unwrap();
        repo.advance(&session.id).unwrap();

        let back = repo.retreat(&session.id).unwrap();
        assert_eq!(back.step, RegistrationStep::PersonalInfo);
    }

    #[test]
    fn begin_operation_rejects_reentry() {
        let repo = repository();
        let session = repo.create();

        repo.begin_operation(&session.id, Operation::SendCode).unwrap();
        assert!(repo.begin_operation(&session.id, Operation::SendCode).is_err());
        // A different operation is unaffected.
        repo.begin_operation(&session.id, Operation::Coupon).unwrap();

        repo.finish_operation(&session.id, Operation::SendCode, OperationState::Succeeded);
        repo.begin_operation(&session.id, Operation::SendCode).unwrap();
    }

    #[test]
    fn cooldown_never_goes_negative() {
        let repo = repository();
        let session = repo.create();
        repo.mark_code_sent(&session.id, "digest".to_string(), 2).unwrap();

        assert_eq!(repo.tick_cooldown(&session.id), Some(1));
        assert_eq!(repo.tick_cooldown(&session.id), Some(0));
        assert_eq!(repo.tick_cooldown(&session.id), Some(0));
        assert_eq!(repo.tick_cooldown("missing"), None);
    }

    #[test]
    fn verification_survives_phone_edits() {
        let repo = repository();
        let session = repo.create();
        repo.mark_verified(&session.id).unwrap();

        let patch = DraftPatch {
            phone: Some("11888888888".to_string()),
            ..Default::default()
        };
        let after = repo.update_draft(&session.id, patch).unwrap();
        assert!(after.draft.phone_verified);
    }

    #[test]
    fn remove_discards_the_session() {
        let repo = repository();
        let session = repo.create();
        assert!(repo.remove(&session.id).is_some());
        assert!(repo.get(&session.id).is_err());
    }
}
