// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::BridgeResult;
use crate::modules::smtp::client::BridgeSmtpClient;
use crate::modules::smtp::SmtpConfig;
use crate::modules::transport::{MailSink, OutboundMail};
use crate::{generate_token, utc_now};
use async_trait::async_trait;
use mail_send::mail_builder::MessageBuilder;
use tracing::{debug, warn};

/// Sends each relayed room message over its own SMTP connection.
pub struct SmtpMailSink {
    config: SmtpConfig,
}

impl SmtpMailSink {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

pub(crate) fn generate_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
        .unwrap_or("mailbridge");
    format!("{}.{}@{}", utc_now!(), generate_token!(96), domain)
}

pub(crate) fn compose(mail: &OutboundMail) -> MessageBuilder<'_> {
    MessageBuilder::new()
        .message_id(generate_message_id(&mail.from))
        .from(mail.from.as_str())
        .to(mail.to.as_str())
        .subject(mail.subject.as_str())
        .text_body(mail.text.as_str())
}

#[async_trait]
impl MailSink for SmtpMailSink {
    async fn send_mail(&self, mail: OutboundMail) -> BridgeResult<()> {
        let mut client = BridgeSmtpClient::connect(&self.config).await?;
        client.send_email(compose(&mail)).await?;
        if let Err(e) = client.quit().await {
            warn!("SMTP QUIT failed after a successful send: {:#?}", e);
        }
        debug!("Relayed room message to {}", mail.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composed_message_carries_configured_headers() {
        let mail = OutboundMail {
            from: "bridge@example.org".into(),
            to: "recipient@example.org".into(),
            subject: "Matrix Message".into(),
            text: "relayed from the room".into(),
        };
        let rendered = compose(&mail).write_to_string().unwrap();
        assert!(rendered.contains("Subject: Matrix Message"));
        assert!(rendered.contains("bridge@example.org"));
        assert!(rendered.contains("recipient@example.org"));
        assert!(rendered.contains("relayed from the room"));
    }

    #[test]
    fn message_id_uses_sender_domain() {
        let id = generate_message_id("bridge@example.org");
        assert!(id.ends_with("@example.org"));
        assert!(generate_message_id("no-domain").ends_with("@mailbridge"));
    }
}
