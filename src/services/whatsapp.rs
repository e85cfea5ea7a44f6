use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;

use crate::models::gateway::GatewayInstance;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound text-message channel.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(&self, instance: &GatewayInstance, number: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Client for a WhatsApp-compatible REST gateway:
/// `POST {api_url}/message/sendText/{instance}` with an `apikey` header.
pub struct WhatsAppClient {
    client: Client,
}

impl WhatsAppClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageGateway for WhatsAppClient {
    async fn send_text(&self, instance: &GatewayInstance, number: &str, text: &str) -> Result<(), DeliveryError> {
        let url = format!(
            "{}/message/sendText/{}",
            instance.api_url.trim_end_matches('/'),
            instance.instance_name
        );

        let response = self
            .client
            .post(&url)
            .header("apikey", &instance.api_key)
            .header("Content-Type", "application/json")
            .json(&json!({ "number": number, "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Gateway '{}' error {}: {}", instance.instance_name, status, body);
            return Err(DeliveryError::Rejected { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn instance(api_url: &str) -> GatewayInstance {
        GatewayInstance {
            id: Uuid::new_v4(),
            instance_name: "studio-luz".into(),
            status: "connected".into(),
            api_url: format!("{api_url}/"),
            api_key: "k3y".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn posts_number_and_text_with_the_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendText/studio-luz"))
            .and(header("apikey", "k3y"))
            .and(body_json(json!({ "number": "5511999990000", "text": "Olá" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(Duration::from_secs(5)).unwrap();
        client
            .send_text(&instance(&server.uri()), "5511999990000", "Olá")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_2xx_is_a_rejection_with_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("number not on whatsapp"))
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(Duration::from_secs(5)).unwrap();
        let err = client
            .send_text(&instance(&server.uri()), "5511999990000", "Olá")
            .await
            .unwrap_err();
        match err {
            DeliveryError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "number not on whatsapp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_gateway_is_an_http_error() {
        let client = WhatsAppClient::new(Duration::from_secs(1)).unwrap();
        let err = client
            .send_text(&instance("http://127.0.0.1:1"), "5511999990000", "Olá")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Http(_)));
    }
}
