use crate::modules::error::code::ErrorCode;
use crate::modules::error::BridgeResult;
use crate::modules::imap::session::SessionStream;
use crate::modules::settings::cli::Encryption;
use crate::modules::utils::net::{
    establish_tcp_connection_with_timeout, establish_tls_connection, resolve_to_socket_addr,
};
use crate::modules::utils::tls::establish_tls_stream;
use crate::raise_error;
use async_imap::Client as ImapClient;
use async_imap::Session as ImapSession;
use std::net::SocketAddr;
use std::ops::Deref;
use std::ops::DerefMut;
use tokio::io::BufWriter;
use tracing::debug;

pub type Session = ImapSession<Box<dyn SessionStream>>;

#[derive(Debug)]
pub(crate) struct Client {
    inner: ImapClient<Box<dyn SessionStream>>,
}

impl Deref for Client {
    type Target = ImapClient<Box<dyn SessionStream>>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Client {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

fn alpn(port: u16) -> &'static [&'static str] {
    if port == 993 {
        &[]
    } else {
        &["imap"]
    }
}

impl Client {
    fn new(stream: Box<dyn SessionStream>) -> Self {
        Self {
            inner: ImapClient::new(stream),
        }
    }

    pub(crate) async fn login(self, username: &str, password: &str) -> BridgeResult<Session> {
        let Client { inner } = self;
        let session = inner.login(username, password).await.map_err(|(e, _)| {
            raise_error!(format!("{:#?}", e), ErrorCode::ImapAuthenticationFailed)
        })?;
        Ok(session)
    }

    pub async fn connection(host: &str, encryption: Encryption, port: u16) -> BridgeResult<Self> {
        let resolved_addr = resolve_to_socket_addr(host, port)?;
        debug!("Attempting IMAP connection to {host} ({resolved_addr}) using {encryption}.");
        match encryption {
            Encryption::Ssl => Self::establish_secure_connection(resolved_addr, host).await,
            Encryption::StartTls => Self::establish_starttls_connection(resolved_addr, host).await,
            Encryption::None => Self::establish_insecure_connection(resolved_addr).await,
        }
    }

    async fn establish_secure_connection(
        address: SocketAddr,
        server_hostname: &str,
    ) -> BridgeResult<Self> {
        let tls_stream =
            establish_tls_connection(address, server_hostname, alpn(address.port())).await?;
        let session_stream: Box<dyn SessionStream> = Box::new(BufWriter::new(tls_stream));
        let mut client = Client::new(session_stream);
        read_greeting(&mut client.inner).await?;
        Ok(client)
    }

    async fn establish_insecure_connection(address: SocketAddr) -> BridgeResult<Self> {
        let tcp_stream = establish_tcp_connection_with_timeout(address).await?;
        let session_stream: Box<dyn SessionStream> = Box::new(BufWriter::new(tcp_stream));
        let mut client = Client::new(session_stream);
        read_greeting(&mut client.inner).await?;
        Ok(client)
    }

    async fn establish_starttls_connection(
        address: SocketAddr,
        server_hostname: &str,
    ) -> BridgeResult<Self> {
        let tcp_stream = establish_tcp_connection_with_timeout(address).await?;
        let mut client = async_imap::Client::new(BufWriter::new(tcp_stream));
        read_greeting(&mut client).await?;

        client
            .run_command_and_check_ok("STARTTLS", None)
            .await
            .map_err(|_| {
                raise_error!(
                    "STARTTLS command failed".into(),
                    ErrorCode::ImapCommandFailed
                )
            })?;

        // The upgrade happens on the raw TCP stream, not the buffered one.
        let tcp_stream = client.into_inner().into_inner();
        let tls_stream = establish_tls_stream(server_hostname, &[], tcp_stream).await?;
        let session_stream: Box<dyn SessionStream> = Box::new(BufWriter::new(tls_stream));
        Ok(Client::new(session_stream))
    }
}

/// Reads the server greeting. A closed stream counts as a failure.
pub(crate) async fn read_greeting<T>(client: &mut ImapClient<T>) -> BridgeResult<()>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + std::fmt::Debug + Send,
{
    client
        .read_response()
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?
        .ok_or_else(|| {
            raise_error!(
                "failed to read greeting".into(),
                ErrorCode::ImapCommandFailed
            )
        })?;
    Ok(())
}
