use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{JobError, Result};

/// Which email template renders a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemplateType {
    #[serde(rename = "budget-alert")]
    BudgetAlert,
    #[serde(rename = "monthly-report")]
    MonthlyReport,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::BudgetAlert => "budget-alert",
            TemplateType::MonthlyReport => "monthly-report",
        }
    }
}

/// A rendered-elsewhere email: the dispatcher only ships data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub template_type: TemplateType,
    pub template_data: Value,
}

/// Sends notifications to users.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<()>;
}

/// Posts notifications as JSON to a transactional email API.
pub struct HttpEmailDispatcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpEmailDispatcher {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for HttpEmailDispatcher {
    #[instrument(skip(self, notification), fields(to = %notification.to, template = notification.template_type.as_str()))]
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        let body = serde_json::json!({
            "from": self.from,
            "to": notification.to,
            "subject": notification.subject,
            "templateType": notification.template_type,
            "templateData": notification.template_data,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::Dispatch(format!("email request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(JobError::Dispatch(format!("email API returned {}: {}", status, body)));
        }

        debug!("Email accepted by provider");
        Ok(())
    }
}

/// Writes notifications to the log instead of sending them. Used when no
/// email API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            template = notification.template_type.as_str(),
            data = %notification.template_data,
            "Notification (not sent, email delivery disabled)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Notification {
        Notification {
            to: "alice@example.com".to_string(),
            subject: "Budget Alert for Checking".to_string(),
            template_type: TemplateType::BudgetAlert,
            template_data: json!({"accountName": "Checking"}),
        }
    }

    #[tokio::test]
    async fn test_posts_notification_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({
                "from": "FinFlow <alerts@finflow.dev>",
                "to": "alice@example.com",
                "templateType": "budget-alert",
                "templateData": {"accountName": "Checking"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = HttpEmailDispatcher::new(
            format!("{}/emails", server.uri()),
            "re_test",
            "FinFlow <alerts@finflow.dev>",
        );
        dispatcher.dispatch(&alert()).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_dispatch_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
            .mount(&server)
            .await;

        let dispatcher = HttpEmailDispatcher::new(server.uri(), "re_test", "alerts@finflow.dev");
        let err = dispatcher.dispatch(&alert()).await.unwrap_err();
        assert!(matches!(err, JobError::Dispatch(ref msg) if msg.contains("invalid recipient")));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_notification_wire_shape() {
        let json = serde_json::to_value(alert()).unwrap();
        assert_eq!(json["templateType"], "budget-alert");
        assert_eq!(json["templateData"]["accountName"], "Checking");
    }
}
