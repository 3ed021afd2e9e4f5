use serde::{Deserialize, Serialize};

/// Best-effort analytics events. Losing one must never affect the flow.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    PageView { page: String },
    LanguageChanged { language: String },
    CtaClicked { label: String },
    AccountCreated { account_id: String },
}
