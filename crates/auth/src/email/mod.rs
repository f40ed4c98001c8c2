pub mod templates;

use crate::error::{DeviceAuthError, Result};
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};

/// Where outgoing mail goes. MailHog is the local development sink and
/// skips TLS and authentication.
#[derive(Debug, Clone)]
pub enum EmailProvider {
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        from_email: String,
        from_name: String,
    },
    MailHog {
        host: String,
        port: u16,
        from_email: String,
        from_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// Thin wrapper over a lettre SMTP transport. The transport is built once at
/// construction; send failures surface as `Dispatch` and are not retried.
#[derive(Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    pub fn new(provider: EmailProvider) -> Result<Self> {
        let (transport, from_email, from_name) = match provider {
            EmailProvider::MailHog {
                host,
                port,
                from_email,
                from_name,
            } => {
                let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host)
                    .port(port)
                    .build();
                (transport, from_email, from_name)
            }
            EmailProvider::Smtp {
                host,
                port,
                username,
                password,
                from_email,
                from_name,
            } => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
                    .map_err(|e| {
                        DeviceAuthError::Internal(format!("Failed to create SMTP transport: {}", e))
                    })?
                    .port(port);

                if let (Some(user), Some(pass)) = (username, password) {
                    builder = builder.credentials(Credentials::new(user, pass));
                }

                (builder.build(), from_email, from_name)
            }
        };

        let from = format!("{} <{}>", from_name, from_email)
            .parse::<Mailbox>()
            .map_err(|e| DeviceAuthError::Internal(format!("Invalid from address: {}", e)))?;

        Ok(Self { transport, from })
    }

    pub fn from_env() -> Result<Self> {
        let provider_name =
            std::env::var("EMAIL_PROVIDER").unwrap_or_else(|_| "mailhog".to_string());

        let from_email =
            std::env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@telecare.dev".to_string());
        let from_name =
            std::env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "TeleCare".to_string());

        let provider = match provider_name.as_str() {
            "mailhog" => EmailProvider::MailHog {
                host: std::env::var("MAILHOG_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: std::env::var("MAILHOG_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(1025),
                from_email,
                from_name,
            },
            "smtp" => EmailProvider::Smtp {
                host: std::env::var("SMTP_HOST").map_err(|_| {
                    DeviceAuthError::Internal("SMTP_HOST not configured".to_string())
                })?,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME").ok(),
                password: std::env::var("SMTP_PASSWORD").ok(),
                from_email,
                from_name,
            },
            other => {
                return Err(DeviceAuthError::Internal(format!(
                    "Unknown email provider: {}",
                    other
                )))
            }
        };

        Self::new(provider)
    }

    pub async fn send(&self, email: EmailMessage) -> Result<()> {
        let to = match &email.to_name {
            Some(name) => format!("{} <{}>", name, email.to),
            None => email.to.clone(),
        }
        .parse::<Mailbox>()
        .map_err(|e| DeviceAuthError::Dispatch(format!("Invalid to address: {}", e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);

        let message = match &email.html_body {
            Some(html) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(email.text_body.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html.clone()),
                        ),
                )
                .map_err(|e| DeviceAuthError::Dispatch(format!("Failed to build email: {}", e)))?,
            None => builder
                .body(email.text_body.clone())
                .map_err(|e| DeviceAuthError::Dispatch(format!("Failed to build email: {}", e)))?,
        };

        self.transport
            .send(message)
            .await
            .map_err(|e| DeviceAuthError::Dispatch(format!("Failed to send email: {}", e)))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }

    /// Connectivity probe for startup checks and ops tooling.
    pub async fn test_connection(&self) -> Result<()> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| DeviceAuthError::Dispatch(format!("SMTP connection test failed: {}", e)))?;
        Ok(())
    }
}
