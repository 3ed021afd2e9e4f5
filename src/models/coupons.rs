use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Percentage,
    Flat,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CouponEntry {
    pub code: String,
    pub kind: DiscountKind,
    pub amount: f64,
}

/// Display-only lookup result; never gates navigation or submission.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouponOutcome {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<DiscountKind>,
}
