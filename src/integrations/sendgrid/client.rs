// src/integrations/sendgrid/client.rs
//
// SendGrid v3 transactional email client
//
// CRITICAL RULES:
// - This is INFRASTRUCTURE: it only speaks the provider's wire format
// - The provider's HTTP status is returned to the caller as is
// - Transport failures surface as `AppError::Http`, never retried here

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SendGridOptions;
use crate::error::AppResult;

const MAIL_SEND_PATH: &str = "/v3/mail/send";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailAddress {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Personalization {
    pub to: Vec<EmailAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub content_type: String,
    pub value: String,
}

/// Body of `POST /v3/mail/send`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mail {
    pub personalizations: Vec<Personalization>,
    pub from: EmailAddress,
    pub subject: String,
    pub content: Vec<Content>,
}

impl Mail {
    /// One sender, one recipient. Empty bodies are left out; SendGrid
    /// requires `text/plain` to precede `text/html`.
    pub fn single(
        from: EmailAddress,
        to: EmailAddress,
        subject: &str,
        plain_text: &str,
        html: &str,
    ) -> Self {
        let mut content = Vec::new();
        if !plain_text.is_empty() {
            content.push(Content {
                content_type: "text/plain".to_string(),
                value: plain_text.to_string(),
            });
        }
        if !html.is_empty() {
            content.push(Content {
                content_type: "text/html".to_string(),
                value: html.to_string(),
            });
        }

        Self {
            personalizations: vec![Personalization { to: vec![to] }],
            from,
            subject: subject.to_string(),
            content,
        }
    }
}

/// Error payload SendGrid returns with 4xx responses
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    field: Option<String>,
}

pub struct SendGridClient {
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl SendGridClient {
    pub fn new(api_key: String) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::with_http_client(
            api_key,
            crate::config::DEFAULT_SENDGRID_BASE_URL.to_string(),
            http_client,
        ))
    }

    pub fn from_options(options: &SendGridOptions) -> AppResult<Self> {
        let mut client = Self::new(options.api_key.clone())?;
        client.base_url = options.base_url.trim_end_matches('/').to_string();
        Ok(client)
    }

    pub fn with_http_client(api_key: String, base_url: String, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit `mail` for delivery and return the provider's status code.
    ///
    /// SendGrid answers 202 Accepted on success.
    pub async fn send_email(&self, mail: &Mail) -> AppResult<StatusCode> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, MAIL_SEND_PATH))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
            .json(mail)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            log::debug!("sendgrid accepted message \"{}\" ({})", mail.subject, status);
        } else {
            let detail = match response.json::<ErrorResponse>().await {
                Ok(body) => body
                    .errors
                    .into_iter()
                    .map(|e| match e.field {
                        Some(field) => format!("{}: {}", field, e.message),
                        None => e.message,
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
                Err(_) => "no error details".to_string(),
            };
            log::debug!("sendgrid rejected message with {}: {}", status, detail);
        }

        Ok(status)
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one HTTP request, answer with `status_line` and `body`,
    /// and hand back the raw request text.
    pub(crate) async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];

            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);

                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let content_length = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }
}
