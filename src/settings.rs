use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::models::coupons::CouponEntry;

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    pub listen: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Defaults {
    pub country: String,
    pub country_code: String,
    pub language: String,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    Simulated,
    Http,
}

impl Default for VerificationMode {
    fn default() -> Self {
        VerificationMode::Simulated
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Verification {
    #[serde(default)]
    pub mode: VerificationMode,
    pub accepted_code: String,
    pub send_delay_ms: u64,
    pub verify_delay_ms: u64,
    pub resend_cooldown_secs: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub auth_token: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Coupons {
    pub lookup_delay_ms: u64,
    pub catalog: Vec<CouponEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Accounts {
    #[serde(default)]
    pub database_url: String,
    pub submit_delay_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub defaults: Defaults,
    pub verification: Verification,
    pub coupons: Coupons,
    pub accounts: Accounts,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        config.try_deserialize()
    }
}
