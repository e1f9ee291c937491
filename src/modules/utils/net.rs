// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::code::ErrorCode;
use crate::modules::utils::tls::establish_tls_stream;
use crate::modules::{error::BridgeResult, imap::session::SessionStream};
use crate::raise_error;
use std::net::{SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_io_timeout::TimeoutStream;
use tracing::error;

pub(crate) const TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn resolve_to_socket_addr(host: &str, port: u16) -> BridgeResult<SocketAddr> {
    if host.is_empty() || host.contains(|c: char| !c.is_ascii() && c != '.') {
        return Err(raise_error!(
            format!("Invalid host name '{}'", host),
            ErrorCode::InvalidParameter
        ));
    }
    format!("{}:{}", host, port)
        .to_socket_addrs()
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?
        .next()
        .ok_or_else(|| {
            raise_error!(
                format!("Unable to resolve address for {}:{}", host, port),
                ErrorCode::NetworkError
            )
        })
}

pub(crate) async fn establish_tcp_connection_with_timeout(
    address: SocketAddr,
) -> BridgeResult<Pin<Box<TimeoutStream<TcpStream>>>> {
    let tcp_stream = timeout(TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| {
            error!(
                "TCP connection to {} timed out after {}s",
                address,
                TIMEOUT.as_secs()
            );
            raise_error!(
                format!(
                    "TCP connection to {} timed out after {}s",
                    address,
                    TIMEOUT.as_secs()
                ),
                ErrorCode::ConnectionTimeout
            )
        })?
        .map_err(|e| raise_error!(e.to_string(), ErrorCode::NetworkError))?;

    tcp_stream
        .set_nodelay(true)
        .map_err(|e| raise_error!(e.to_string(), ErrorCode::NetworkError))?;

    // A stalled mailbox server must not pin a poller tick forever.
    let mut timeout_stream = TimeoutStream::new(tcp_stream);
    timeout_stream.set_write_timeout(Some(TIMEOUT));
    timeout_stream.set_read_timeout(Some(TIMEOUT));

    Ok(Box::pin(timeout_stream))
}

pub(crate) async fn establish_tls_connection(
    address: SocketAddr,
    server_hostname: &str,
    alpn_protocols: &[&str],
) -> BridgeResult<impl SessionStream> {
    let tcp_stream = establish_tcp_connection_with_timeout(address).await?;
    establish_tls_stream(server_hostname, alpn_protocols, tcp_stream).await
}
