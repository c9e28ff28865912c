// src/services/email_service.rs
//
// Notification boundary: email bodies and delivery through SendGrid.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::{ApplicationOptions, SendGridOptions};
use crate::error::AppResult;
use crate::integrations::{EmailAddress, Mail, SendGridClient};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailService: Send + Sync {
    /// HTML body linking to `{root}/resetpassword/{user_id}/{reset_token}`.
    fn create_reset_email_body(&self, reset_token: &str, user_id: &str) -> String;

    /// Send one HTML email and return the provider's status code.
    async fn send_email(&self, to: &str, subject: &str, html_content: &str) -> AppResult<StatusCode>;
}

pub struct SendGridEmailService {
    client: SendGridClient,
    application: ApplicationOptions,
    from_address: String,
}

impl SendGridEmailService {
    pub fn new(
        client: SendGridClient,
        application: ApplicationOptions,
        from_address: String,
    ) -> Self {
        Self {
            client,
            application,
            from_address,
        }
    }

    pub fn from_options(
        sendgrid: &SendGridOptions,
        application: ApplicationOptions,
    ) -> AppResult<Self> {
        Ok(Self::new(
            SendGridClient::from_options(sendgrid)?,
            application,
            sendgrid.from_address.clone(),
        ))
    }
}

#[async_trait]
impl EmailService for SendGridEmailService {
    fn create_reset_email_body(&self, reset_token: &str, user_id: &str) -> String {
        let reset_url = format!(
            "{}/resetpassword/{}/{}",
            self.application.application_root, user_id, reset_token
        );

        format!(
            "<div>\r\
             <h2>{name} Password Reset Request</h2>\r\
             <p>A request has been made to reset the password linked to this email. \
             To complete this request, please follow the link provided below.</p>\
             <a href=\"{url}\">{url}</a>\r\
             <hr />\
             <p>If this request was made in error, please ignore this message. \
             The link provided will expire in 24 hours.</p>\r\
             </div>",
            name = self.application.application_name,
            url = reset_url
        )
    }

    async fn send_email(&self, to: &str, subject: &str, html_content: &str) -> AppResult<StatusCode> {
        let mail = Mail::single(
            EmailAddress::new(self.from_address.as_str()),
            EmailAddress::new(to),
            subject,
            "",
            html_content,
        );

        self.client.send_email(&mail).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::sendgrid::client::test_server::serve_once;

    fn application() -> ApplicationOptions {
        ApplicationOptions {
            application_name: "Acme".to_string(),
            application_root: "https://acme.test".to_string(),
        }
    }

    fn service(base_url: String) -> SendGridEmailService {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        let client = SendGridClient::with_http_client("SG.key".to_string(), base_url, http);
        SendGridEmailService::new(client, application(), "noreply@acme.test".to_string())
    }

    #[test]
    fn test_reset_body_contains_link_name_and_expiry() {
        let body = service("http://unused".to_string()).create_reset_email_body("tok123", "user-7");

        assert!(body.starts_with("<div>"));
        assert!(body.ends_with("</div>"));
        assert!(body.contains("<h2>Acme Password Reset Request</h2>"));
        assert!(body.contains(
            "<a href=\"https://acme.test/resetpassword/user-7/tok123\">\
             https://acme.test/resetpassword/user-7/tok123</a>"
        ));
        assert!(body.contains("expire in 24 hours"));
    }

    #[test]
    fn test_reset_body_breaks_lines_with_carriage_returns() {
        let body = service("http://unused".to_string()).create_reset_email_body("t", "u");

        assert!(!body.contains('\n'));
        assert_eq!(body.matches('\r').count(), 4);
        assert!(body.starts_with("<div>\r<h2>"));
        assert!(body.ends_with("</p>\r</div>"));
    }

    #[tokio::test]
    async fn test_send_email_uses_configured_sender() {
        let (base_url, server) = serve_once("HTTP/1.1 202 Accepted", "").await;

        let status = service(base_url)
            .send_email("ana@example.com", "Subject", "<p>x</p>")
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);

        let request = server.await.unwrap();
        assert!(request.contains("\"from\":{\"email\":\"noreply@acme.test\"}"));
        assert!(request.contains("\"to\":[{\"email\":\"ana@example.com\"}]"));
        assert!(!request.contains("text/plain"));
    }
}
