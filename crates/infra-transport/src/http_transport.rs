// HTTP JSON message transport
//
// One POST per message to `{api_base_url}/messages`, authenticated with the
// tenant's bearer token. Replies are classified as:
//   2xx JSON               -> Accepted (unless `"success": false`)
//   4xx                    -> Rejected with the provider's reason
//   5xx, network, timeout  -> TransportError

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use netbill_core::domain::{Priority, TenantConfig};
use netbill_core::port::{
    DeliveryOutcome, MessageTransport, MessageTransportFactory, TransportError,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of a reply body kept in error messages
const MAX_BODY_EXCERPT: usize = 200;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    recipient: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    priority: Priority,
}

/// Client bound to one tenant's endpoint and token
pub struct HttpMessageTransport {
    client: Client,
    endpoint: String,
    token: String,
    timeout: Duration,
}

impl HttpMessageTransport {
    pub fn new(
        client: Client,
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/messages", base_url.trim_end_matches('/')),
            token: token.into(),
            timeout,
        }
    }

    async fn post(&self, request: &SendRequest<'_>) -> Result<DeliveryOutcome, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify_error(e))?;
        debug!(
            status = status.as_u16(),
            kind = request.kind,
            recipient = %request.recipient,
            "Transport replied"
        );

        let outcome = classify_response(status, &body);
        if let Ok(DeliveryOutcome::Rejected(reason)) = &outcome {
            warn!(recipient = %request.recipient, reason = %reason, "Message rejected by provider");
        }
        outcome
    }

    fn classify_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

fn classify_response(status: StatusCode, body: &str) -> Result<DeliveryOutcome, TransportError> {
    let json: Option<Value> = serde_json::from_str(body).ok();

    if status.is_success() {
        let json = json.ok_or_else(|| {
            TransportError::InvalidResponse(format!("non-JSON body: {}", excerpt(body)))
        })?;
        if json.get("success").and_then(Value::as_bool) == Some(false) {
            let reason = error_reason(&json).unwrap_or_else(|| "rejected by provider".to_string());
            return Ok(DeliveryOutcome::Rejected(reason));
        }
        return Ok(DeliveryOutcome::Accepted(json));
    }

    if status.is_client_error() {
        let reason = json
            .as_ref()
            .and_then(error_reason)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        return Ok(DeliveryOutcome::Rejected(reason));
    }

    Err(TransportError::Http(format!(
        "HTTP {}: {}",
        status.as_u16(),
        excerpt(body)
    )))
}

fn error_reason(json: &Value) -> Option<String> {
    json.get("error")
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn excerpt(body: &str) -> String {
    body.chars().take(MAX_BODY_EXCERPT).collect()
}

#[async_trait]
impl MessageTransport for HttpMessageTransport {
    async fn send_text(
        &self,
        recipient: &str,
        content: &str,
        priority: Priority,
    ) -> Result<DeliveryOutcome, TransportError> {
        self.post(&SendRequest {
            recipient,
            kind: "text",
            text: Some(content),
            media_url: None,
            caption: None,
            priority,
        })
        .await
    }

    async fn send_image(
        &self,
        recipient: &str,
        image_url: &str,
        caption: &str,
        priority: Priority,
    ) -> Result<DeliveryOutcome, TransportError> {
        self.post(&SendRequest {
            recipient,
            kind: "image",
            text: None,
            media_url: Some(image_url),
            caption: Some(caption),
            priority,
        })
        .await
    }

    async fn send_document(
        &self,
        recipient: &str,
        document_url: &str,
        caption: &str,
        priority: Priority,
    ) -> Result<DeliveryOutcome, TransportError> {
        self.post(&SendRequest {
            recipient,
            kind: "document",
            text: None,
            media_url: Some(document_url),
            caption: Some(caption),
            priority,
        })
        .await
    }
}

/// Builds tenant clients over one shared connection pool
pub struct HttpTransportFactory {
    client: Client,
    timeout: Duration,
}

impl HttpTransportFactory {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::NotConfigured(format!("HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

impl MessageTransportFactory for HttpTransportFactory {
    fn client_for(
        &self,
        tenant: &TenantConfig,
    ) -> Result<Arc<dyn MessageTransport>, TransportError> {
        let base_url = non_blank(&tenant.api_base_url).ok_or_else(|| {
            TransportError::NotConfigured(format!(
                "tenant {} has no api_base_url",
                tenant.tenant_id
            ))
        })?;
        let token = non_blank(&tenant.api_token).ok_or_else(|| {
            TransportError::NotConfigured(format!("tenant {} has no api_token", tenant.tenant_id))
        })?;

        Ok(Arc::new(HttpMessageTransport::new(
            self.client.clone(),
            base_url,
            token,
            self.timeout,
        )))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tenant(base_url: &str) -> TenantConfig {
        let mut tenant = TenantConfig::new("t1");
        tenant.api_base_url = Some(base_url.to_string());
        tenant.api_token = Some("secret-token".to_string());
        tenant
    }

    fn client(server: &MockServer, timeout: Duration) -> Arc<dyn MessageTransport> {
        HttpTransportFactory::new(timeout)
            .unwrap()
            .client_for(&tenant(&server.uri()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_text_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_partial_json(json!({
                "recipient": "+923001112233",
                "type": "text",
                "text": "hello",
                "priority": 7
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "wa-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server, DEFAULT_TIMEOUT)
            .send_text("+923001112233", "hello", 7)
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Accepted(json!({"message_id": "wa-1"})));
    }

    #[tokio::test]
    async fn test_document_carries_url_and_caption() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_partial_json(json!({
                "type": "document",
                "media_url": "https://files.example/inv.pdf",
                "caption": "Your invoice"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server, DEFAULT_TIMEOUT)
            .send_document("+92300", "https://files.example/inv.pdf", "Your invoice", 5)
            .await
            .unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Accepted(_)));
    }

    #[tokio::test]
    async fn test_client_error_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"error": "invalid number"})),
            )
            .mount(&server)
            .await;

        let outcome = client(&server, DEFAULT_TIMEOUT)
            .send_image("bad", "https://img.example/a.png", "", 5)
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Rejected("invalid number".to_string()));
    }

    #[tokio::test]
    async fn test_success_false_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "message": "recipient opted out"})),
            )
            .mount(&server)
            .await;

        let outcome = client(&server, DEFAULT_TIMEOUT)
            .send_text("+92300", "hi", 5)
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Rejected("recipient opted out".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server, DEFAULT_TIMEOUT)
            .send_text("+92300", "hi", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_millis(50))
            .send_text("+92300", "hi", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(50)));
    }

    #[test]
    fn test_missing_credentials_not_configured() {
        let factory = HttpTransportFactory::new(DEFAULT_TIMEOUT).unwrap();

        let no_url = TenantConfig::new("t1");
        assert!(matches!(
            factory.client_for(&no_url),
            Err(TransportError::NotConfigured(_))
        ));

        let mut blank_token = tenant("http://localhost:1");
        blank_token.api_token = Some("  ".to_string());
        assert!(matches!(
            factory.client_for(&blank_token),
            Err(TransportError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_non_json_success_is_invalid() {
        let err = classify_response(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
    }
}
