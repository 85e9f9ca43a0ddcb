use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

/// Outcome reported by the deliverability API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deliverability {
    Deliverable,
    Undeliverable,
    Risky,
    Unknown,
}

impl Deliverability {
    fn from_result(result: &str) -> Self {
        match result {
            "deliverable" => Self::Deliverable,
            "undeliverable" => Self::Undeliverable,
            "risky" => Self::Risky,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerifierResponse {
    data: VerifierData,
}

#[derive(Debug, Deserialize)]
struct VerifierData {
    #[serde(default)]
    result: String,
}

/// Client for a Hunter-style email verifier (`GET {base}?email=..&api_key=..`).
#[derive(Clone)]
pub struct EmailVerifier {
    client: Client,
    base_url: String,
    api_key: String,
}

impl EmailVerifier {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn check(&self, email: &str) -> Result<Deliverability, String> {
        let response = self.client
            .get(&self.base_url)
            .query(&[("email", email), ("api_key", self.api_key.as_str())])
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| format!("email verifier request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(format!("email verifier returned {status}"));
        }

        let body: VerifierResponse = response
            .json()
            .await
            .map_err(|e| format!("email verifier response unreadable: {e}"))?;

        let verdict = Deliverability::from_result(&body.data.result);
        tracing::debug!(email = %email, ?verdict, "email deliverability checked");
        Ok(verdict)
    }
}
