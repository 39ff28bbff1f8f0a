use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::EmailConfig;
use crate::error::{AppError, AppResult};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Email dispatch collaborator.
///
/// The core never renders mail itself; it hands a recipient, a template
/// identifier, and a context map to this seam. Templates live provider-side
/// and carry all three parts (subject, plain text, HTML), so a partial send
/// cannot occur.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_template(
        &self,
        to: &str,
        template_id: &str,
        context: serde_json::Value,
    ) -> AppResult<()>;
}

#[derive(Clone)]
pub struct SendgridMailer {
    client: Client,
    config: EmailConfig,
}

impl SendgridMailer {
    pub fn new(config: EmailConfig) -> Self {
        SendgridMailer {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl EmailSender for SendgridMailer {
    async fn send_template(
        &self,
        to: &str,
        template_id: &str,
        context: serde_json::Value,
    ) -> AppResult<()> {
        let body = json!({
            "from": {
                "email": self.config.from_email,
                "name": self.config.from_name,
            },
            "personalizations": [{
                "to": [{"email": to}],
                "dynamic_template_data": context,
            }],
            "template_id": template_id,
        });

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::EmailDispatch(format!("transport error: {e}")))?;

        if response.status().is_success() {
            log::info!("Template email {template_id} dispatched to {to}");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Email dispatch to {to} failed with {status}: {error_text}");
            Err(AppError::EmailDispatch(format!(
                "provider returned {status}"
            )))
        }
    }
}
