//! HTTP implementation of the poller's status source, against the
//! device-auth API.

use crate::poller::{ApprovalStatusSource, SourceError};
use serde::Deserialize;
use telecare_models::LoginRequest;
use uuid::Uuid;

pub struct HttpStatusSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatusSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrustResponse {
    is_trusted: bool,
}

#[derive(Debug, Deserialize)]
struct RequestResponse {
    request: Option<LoginRequest>,
}

impl ApprovalStatusSource for HttpStatusSource {
    async fn check_trust(&self, user_id: Uuid, device_id: &str) -> Result<bool, SourceError> {
        let response: TrustResponse = self
            .client
            .get(format!("{}/device-auth/trust", self.base_url))
            .query(&[("userId", user_id.to_string().as_str()), ("deviceId", device_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.is_trusted)
    }

    async fn fetch_request(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<LoginRequest>, SourceError> {
        let response: RequestResponse = self
            .client
            .get(format!("{}/device-auth/requests", self.base_url))
            .query(&[("userId", user_id.to_string().as_str()), ("deviceId", device_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.request)
    }
}
