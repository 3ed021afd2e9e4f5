use std::collections::HashMap;
use std::time::Duration;

use crate::models::coupons::{CouponEntry, CouponOutcome, DiscountKind};

/// Fixed catalog standing in for a real discount backend. Codes are
/// matched after trimming and upper-casing.
#[derive(Clone)]
pub struct CouponRepository {
    catalog: HashMap<String, (DiscountKind, f64)>,
    delay: Duration,
}

impl CouponRepository {
    pub fn new(entries: Vec<CouponEntry>, delay: Duration) -> Self {
        let catalog = entries
            .into_iter()
            .map(|entry| (entry.code.to_uppercase(), (entry.kind, entry.amount)))
            .collect();

        CouponRepository { catalog, delay }
    }

    pub async fn lookup(&self, code: &str) -> Result<CouponOutcome, anyhow::Error> {
        tokio::time::sleep(self.delay).await;

        let normalized = code.trim().to_uppercase();
        let outcome = match self.catalog.get(&normalized) {
            Some((kind, amount)) => CouponOutcome {
                valid: true,
                message: match kind {
                    DiscountKind::Percentage => format!("Coupon applied: {}% off.", amount),
                    DiscountKind::Flat => format!("Coupon applied: {} off.", amount),
                },
                discount: Some(*amount),
                kind: Some(*kind),
            },
            None => CouponOutcome {
                valid: false,
                message: "Invalid coupon.".to_string(),
                discount: None,
                kind: None,
            },
        };

        Ok(outcome)
    }
}
