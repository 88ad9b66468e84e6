//! Outgoing email: verification and password reset links.
//!
//! Delivery goes through the [`EmailSender`] trait so the server can run
//! without SMTP (messages are logged) and tests can record what was sent.

use std::sync::Arc;
use std::time::Duration;

use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::SmtpTransport;
use lettre::{Message, Transport};

use crate::config::SmtpConfig;
use crate::db::User;
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::settings::SettingsService;
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
}

#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> AppResult<()>;
}

/// Used when no SMTP host is configured.
pub struct LogEmailSender;

#[async_trait::async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> AppResult<()> {
        tracing::info!(
            "SMTP not configured; email to {} with subject '{}':\n{}",
            message.to,
            message.subject,
            message.text_body
        );
        Ok(())
    }
}

pub struct SmtpEmailSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| AppError::Config("SMTP_HOST is not set".to_string()))?;

        let tls = match config.tls.as_str() {
            "tls" => Tls::Wrapper(
                TlsParameters::builder(host.clone())
                    .build()
                    .map_err(|e| AppError::Config(format!("TLS configuration error: {}", e)))?,
            ),
            "starttls" => Tls::Required(
                TlsParameters::builder(host.clone())
                    .build()
                    .map_err(|e| AppError::Config(format!("TLS configuration error: {}", e)))?,
            ),
            "none" => Tls::None,
            other => {
                return Err(AppError::Config(format!(
                    "Invalid SMTP_TLS value: {}. Must be 'none', 'starttls' or 'tls'",
                    other
                )))
            }
        };

        let mut builder = SmtpTransport::builder_dangerous(&host)
            .port(config.port)
            .timeout(Some(Duration::from_secs(30)))
            .tls(tls);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid EMAIL_FROM: {}", e)))?;

        tracing::info!("SMTP email delivery via {}:{} ({})", host, config.port, config.tls);

        Ok(SmtpEmailSender {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait::async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: EmailMessage) -> AppResult<()> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Email(format!("Invalid recipient {}: {}", message.to, e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject)
            .singlepart(SinglePart::plain(message.text_body))
            .map_err(|e| AppError::Email(format!("Failed to build email: {}", e)))?;

        // SmtpTransport is blocking; keep it off the async workers.
        let transport = self.transport.clone();
        let recipient = message.to;
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| AppError::Email(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Email(format!("SMTP send to {} failed: {}", recipient, e)))?;

        tracing::info!("Email sent to {}", recipient);
        Ok(())
    }
}

/// Pick the sender for the configured environment.
pub fn build_email_sender(config: &SmtpConfig) -> AppResult<Arc<dyn EmailSender>> {
    if config.host.is_some() {
        Ok(Arc::new(SmtpEmailSender::new(config)?))
    } else {
        tracing::warn!("SMTP_HOST not set; emails will be written to the log");
        Ok(Arc::new(LogEmailSender))
    }
}

fn frontend_link(state: &Arc<AppState>, path: &str, token: &str) -> String {
    format!(
        "{}{}?token={}",
        state.config.server.frontend_url.trim_end_matches('/'),
        path,
        token
    )
}

async fn app_name(state: &Arc<AppState>) -> String {
    match SettingsService::branding(state).await {
        Ok(branding) => branding.app_name,
        Err(e) => {
            tracing::warn!("Failed to load branding for email: {:?}", e);
            i18n::t("app.name")
        }
    }
}

pub async fn verification_email(state: &Arc<AppState>, user: &User, token: &str) -> EmailMessage {
    let lang = user.lang.as_deref();
    let app = app_name(state).await;
    let link = frontend_link(state, "/verify-email", token);
    let hours = state.config.tokens.verify_email_ttl_hours.to_string();

    EmailMessage {
        to: user.email.clone(),
        subject: i18n::tr(lang, "email.verify.subject", Some(&[("app", app.as_str())])),
        text_body: i18n::tr(
            lang,
            "email.verify.body",
            Some(&[
                ("name", user.name.as_str()),
                ("link", link.as_str()),
                ("hours", hours.as_str()),
            ]),
        ),
    }
}

pub async fn password_reset_email(state: &Arc<AppState>, user: &User, token: &str) -> EmailMessage {
    let lang = user.lang.as_deref();
    let app = app_name(state).await;
    let link = frontend_link(state, "/reset-password", token);
    let minutes = state.config.tokens.reset_password_ttl_minutes.to_string();

    EmailMessage {
        to: user.email.clone(),
        subject: i18n::tr(lang, "email.reset.subject", Some(&[("app", app.as_str())])),
        text_body: i18n::tr(
            lang,
            "email.reset.body",
            Some(&[
                ("name", user.name.as_str()),
                ("link", link.as_str()),
                ("minutes", minutes.as_str()),
            ]),
        ),
    }
}

/// Send in the background; delivery failures are logged, not returned.
pub fn dispatch(state: &Arc<AppState>, message: EmailMessage) {
    let sender = state.email.clone();
    tokio::spawn(async move {
        let to = message.to.clone();
        if let Err(e) = sender.send(message).await {
            tracing::warn!("Failed to deliver email to {}: {:?}", to, e);
        }
    });
}
