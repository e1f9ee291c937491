use crate::modules::error::code::ErrorCode;
use crate::modules::error::BridgeResult;
use crate::modules::settings::cli::Encryption;
use crate::modules::smtp::SmtpConfig;
use crate::raise_error;
use mail_send::smtp::message::IntoMessage;
use mail_send::{Credentials, SmtpClient, SmtpClientBuilder};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::debug;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

pub enum BridgeSmtpClient {
    Plain(SmtpClient<TcpStream>),
    Tls(SmtpClient<TlsStream<TcpStream>>),
}

impl BridgeSmtpClient {
    /// Connects and authenticates against the configured relay.
    pub async fn connect(config: &SmtpConfig) -> BridgeResult<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let local_host = gethostname::gethostname()
            .to_str()
            .unwrap_or("[127.0.0.1]")
            .to_string();

        let builder = SmtpClientBuilder::new(config.host.clone(), config.port)
            .credentials(credentials)
            .helo_host(local_host)
            .timeout(SMTP_TIMEOUT);

        debug!(
            "Connecting to SMTP relay {}:{} using {}",
            config.host, config.port, config.encryption
        );
        let client = match config.encryption {
            Encryption::Ssl => {
                let client = builder.implicit_tls(true).connect().await.map_err(|e| {
                    raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed)
                })?;
                BridgeSmtpClient::Tls(client)
            }
            Encryption::StartTls => {
                let client = builder.implicit_tls(false).connect().await.map_err(|e| {
                    raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed)
                })?;
                BridgeSmtpClient::Tls(client)
            }
            Encryption::None => {
                let client = builder.connect_plain().await.map_err(|e| {
                    raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed)
                })?;
                BridgeSmtpClient::Plain(client)
            }
        };

        Ok(client)
    }

    pub async fn send_email<'x>(&mut self, message: impl IntoMessage<'x>) -> BridgeResult<()> {
        match self {
            BridgeSmtpClient::Plain(smtp_client) => smtp_client
                .send(message)
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed)),
            BridgeSmtpClient::Tls(smtp_client) => smtp_client
                .send(message)
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed)),
        }
    }

    pub async fn quit(self) -> BridgeResult<()> {
        match self {
            BridgeSmtpClient::Plain(smtp_client) => smtp_client
                .quit()
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed)),
            BridgeSmtpClient::Tls(smtp_client) => smtp_client
                .quit()
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed)),
        }
    }
}
