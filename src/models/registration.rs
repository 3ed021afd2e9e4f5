use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const PASSWORD_MIN_LEN: usize = 8;
pub const OTP_CODE_LEN: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country_code: String,
    pub country: String,
    pub affiliate_code: Option<String>,
    pub discount_coupon: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub confirm_password: String,
    pub accept_terms: bool,
    pub phone_verified: bool,
    pub otp_code: String,
}

impl RegistrationDraft {
    pub fn new(country_code: &str, country: &str) -> Self {
        RegistrationDraft {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            country_code: country_code.to_string(),
            country: country.to_string(),
            affiliate_code: None,
            discount_coupon: None,
            password: String::new(),
            confirm_password: String::new(),
            accept_terms: false,
            phone_verified: false,
            otp_code: String::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Partial update applied field-by-field. `phone_verified` is deliberately
/// absent: it only changes through a successful code verification.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub affiliate_code: Option<String>,
    pub discount_coupon: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub accept_terms: Option<bool>,
    pub otp_code: Option<String>,
}

impl DraftPatch {
    pub fn apply(self, draft: &mut RegistrationDraft) {
        if let Some(first_name) = self.first_name {
            draft.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            draft.last_name = last_name;
        }
        if let Some(email) = self.email {
            draft.email = email;
        }
        if let Some(phone) = self.phone {
            draft.phone = phone;
        }
        if let Some(country_code) = self.country_code {
            draft.country_code = country_code;
        }
        if let Some(country) = self.country {
            draft.country = country;
        }
        if let Some(affiliate_code) = self.affiliate_code {
            draft.affiliate_code = Some(affiliate_code);
        }
        if let Some(discount_coupon) = self.discount_coupon {
            draft.discount_coupon = Some(discount_coupon);
        }
        if let Some(password) = self.password {
            draft.password = password;
        }
        if let Some(confirm_password) = self.confirm_password {
            draft.confirm_password = confirm_password;
        }
        if let Some(accept_terms) = self.accept_terms {
            draft.accept_terms = accept_terms;
        }
        if let Some(otp_code) = self.otp_code {
            draft.otp_code = otp_code;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftField {
    FirstName,
    LastName,
    Email,
    Phone,
    OtpCode,
    Password,
    ConfirmPassword,
    AcceptTerms,
    General,
}

/// Field-keyed error map consumed directly by the presentation layer.
/// Setting a field twice keeps the later message.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ValidationErrors(BTreeMap<DraftField, String>);

impl ValidationErrors {
    pub fn set(&mut self, field: DraftField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn clear(&mut self, field: DraftField) {
        self.0.remove(&field);
    }

    pub fn get(&self, field: DraftField) -> Option<&str> {
        self.0.get(&field).map(|m| m.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

pub fn validate_step1(draft: &RegistrationDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if draft.first_name.trim().is_empty() {
        errors.set(DraftField::FirstName, "First name is required.");
    }
    if draft.last_name.trim().is_empty() {
        errors.set(DraftField::LastName, "Last name is required.");
    }

    let email = draft.email.trim();
    if email.is_empty() {
        errors.set(DraftField::Email, "Email is required.");
    } else if !EMAIL_PATTERN.is_match(email) {
        errors.set(DraftField::Email, "Email is invalid.");
    }

    if draft.phone.trim().is_empty() {
        errors.set(DraftField::Phone, "Phone is required.");
    }
    // Overwrites any phone error above: an unverified phone always fails.
    if !draft.phone_verified {
        errors.set(DraftField::Phone, "Phone must be verified.");
    }

    errors
}

pub fn validate_step2(draft: &RegistrationDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if draft.password.is_empty() {
        errors.set(DraftField::Password, "Password is required.");
    } else if draft.password.chars().count() < PASSWORD_MIN_LEN {
        errors.set(
            DraftField::Password,
            "Password must be at least 8 characters long.",
        );
    } else if !is_strong_password(&draft.password) {
        errors.set(
            DraftField::Password,
            "Password must contain an uppercase letter, a lowercase letter and a digit.",
        );
    }

    if draft.confirm_password.is_empty() {
        errors.set(DraftField::ConfirmPassword, "Confirm your password.");
    } else if draft.confirm_password != draft.password {
        errors.set(DraftField::ConfirmPassword, "Passwords do not match.");
    }

    if !draft.accept_terms {
        errors.set(DraftField::AcceptTerms, "You must accept the terms of use.");
    }

    errors
}

fn is_strong_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    PersonalInfo,
    Security,
}

/// Explicit in-flight state per simulated operation, replacing the
/// disabled-control guarding of the original flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    SendCode,
    VerifyCode,
    Coupon,
    Submit,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operations {
    pub send_code: OperationState,
    pub verify_code: OperationState,
    pub coupon: OperationState,
    pub submit: OperationState,
}

impl Operations {
    pub fn get(&self, operation: Operation) -> OperationState {
        match operation {
            Operation::SendCode => self.send_code,
            Operation::VerifyCode => self.verify_code,
            Operation::Coupon => self.coupon,
            Operation::Submit => self.submit,
        }
    }

    pub fn set(&mut self, operation: Operation, state: OperationState) {
        let slot = match operation {
            Operation::SendCode => &mut self.send_code,
            Operation::VerifyCode => &mut self.verify_code,
            Operation::Coupon => &mut self.coupon,
            Operation::Submit => &mut self.submit,
        };
        *slot = state;
    }
}

#[derive(Clone, Debug, Default)]
pub struct OtpSession {
    pub sent: bool,
    pub code_digest: Option<String>,
    pub resend_cooldown_seconds: u32,
}

#[derive(Clone, Debug)]
pub struct RegistrationSession {
    pub id: String,
    pub step: RegistrationStep,
    pub draft: RegistrationDraft,
    pub otp: OtpSession,
    pub ops: Operations,
    pub errors: ValidationErrors,
    pub created_at: chrono::NaiveDateTime,
}

impl RegistrationSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            step: self.step,
            draft: self.draft.clone(),
            errors: self.errors.clone(),
            operations: self.ops.clone(),
            otp_sent: self.otp.sent,
            resend_cooldown_seconds: self.otp.resend_cooldown_seconds,
            created_at: self.created_at,
        }
    }
}

/// Wire view of a session. The draft's password fields are never
/// serialized, and the issued-code digest stays internal.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub step: RegistrationStep,
    pub draft: RegistrationDraft,
    pub errors: ValidationErrors,
    pub operations: Operations,
    pub otp_sent: bool,
    pub resend_cooldown_seconds: u32,
    pub created_at: chrono::NaiveDateTime,
}
