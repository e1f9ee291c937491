use std::time::Instant;

use poem::{
    http::header, web::RealIp, Endpoint, FromRequest, IntoResponse, Middleware, Request, Response,
    Result,
};
use tracing::{debug, error, warn, Instrument};

#[derive(Default)]
pub struct Tracing;

impl<E: Endpoint> Middleware<E> for Tracing {
    type Output = TracingEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        TracingEndpoint { inner: ep }
    }
}

/// Endpoint for the `Tracing` middleware.
pub struct TracingEndpoint<E> {
    inner: E,
}

impl<E: Endpoint> Endpoint for TracingEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        let remote_addr = RealIp::from_request_without_body(&req)
            .await
            .ok()
            .and_then(|real_ip| real_ip.0)
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| req.remote_addr().to_string());
        let method = req.method().clone();
        // Paths only; the query may carry the homeserver token.
        let path = req.uri().path().to_string();
        let content_length = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok().map(|v| v.to_string()));

        let span = tracing::info_span!(
            "request",
            remote_addr = %remote_addr,
            method = %method,
            path = %path,
            content_length = ?content_length,
        );

        async move {
            let now = Instant::now();
            let res = self.inner.call(req).await;
            let duration = now.elapsed();

            match res {
                Ok(resp) => {
                    let resp = resp.into_response();
                    log_response(resp.status().as_u16(), duration);
                    Ok(resp)
                }
                Err(err) => {
                    log_response(err.status().as_u16(), duration);
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

// Transactions arrive for every room event, so success stays at debug.
#[inline]
fn log_response(status: u16, duration: std::time::Duration) {
    match status {
        500.. => {
            error!(
                status = %status,
                duration = ?duration,
                "request completed with server error"
            );
        }
        400..=499 => {
            warn!(
                status = %status,
                duration = ?duration,
                "request completed with client error"
            );
        }
        _ => {
            debug!(
                status = %status,
                duration = ?duration,
                "request completed successfully"
            );
        }
    }
}
