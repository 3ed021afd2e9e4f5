use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Delivery boundary for verification codes. The simulated gateway stands
/// in for a real SMS provider; swapping it does not touch the flow.
#[async_trait]
pub trait SmsGateway: Send + Sync + 'static {
    async fn deliver_code(&self, phone: &str, code: &str) -> Result<(), anyhow::Error>;
}

/// Resolves after a fixed delay standing in for the provider round trip.
pub struct SimulatedSmsGateway {
    delay: Duration,
}

impl SimulatedSmsGateway {
    pub fn new(delay: Duration) -> Self {
        SimulatedSmsGateway { delay }
    }
}

#[async_trait]
impl SmsGateway for SimulatedSmsGateway {
    async fn deliver_code(&self, phone: &str, _code: &str) -> Result<(), anyhow::Error> {
        tokio::time::sleep(self.delay).await;
        log::info!("Simulated SMS delivery to {}.", phone);
        Ok(())
    }
}

pub struct HttpSmsGateway {
    auth_token: String,
    url: String,
    client: reqwest::Client,
}

impl HttpSmsGateway {
    pub fn new(auth_token: String, url: String) -> Self {
        HttpSmsGateway {
            auth_token,
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn deliver_code(&self, phone: &str, code: &str) -> Result<(), anyhow::Error> {
        let payload = serde_json::json!({
            "phone": phone,
            "code": code
        });

        let response = self
            .client
            .post(format!("{}/api/sms", self.url))
            .bearer_auth(&self.auth_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("SMS provider returned status {}", response.status());
        }

        Ok(())
    }
}

/// Codes are held as digests; the plain code never rests in the session.
pub fn digest_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_code_sensitive() {
        assert_eq!(digest_code("123456"), digest_code("123456"));
        assert_ne!(digest_code("123456"), digest_code("000000"));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_gateway_resolves_after_its_delay() {
        let gateway = SimulatedSmsGateway::new(Duration::from_millis(2000));
        gateway
            .deliver_code("11999999999", "123456")
            .await
            .expect("simulated delivery always succeeds");
    }
}
