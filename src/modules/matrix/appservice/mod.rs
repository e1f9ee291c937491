// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! HTTP endpoints the homeserver pushes to.
//!
//! Transactions are acknowledged only after every event in them has been
//! queued for the relay. A transaction id seen before is acknowledged again
//! without queuing anything, since the homeserver retries until it gets a
//! 200.

use crate::{
    modules::{
        bridge::state::{SessionDiagnostics, SessionState},
        common::{auth::HomeserverGuard, log::Tracing, signal::SIGNAL_MANAGER},
        error::{code::ErrorCode, ApiErrorResponse, BridgeResult},
        identity::IdentityMapper,
        matrix::client::MatrixClient,
        transport::RoomEvent,
    },
    raise_error,
};
use lru::LruCache;
use poem::{
    get, handler,
    listener::{Acceptor, Listener, TcpListener},
    put,
    web::{Data, Json, Path},
    Endpoint, EndpointExt, Route, Server,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{num::NonZeroUsize, sync::Arc, time::Duration};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

pub type ApiResult<T, E = ApiErrorResponse> = std::result::Result<T, E>;

const SEEN_TRANSACTIONS: usize = 1024;

#[derive(Debug, Default, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub events: Vec<Value>,
}

pub struct AppserviceState {
    hs_token: String,
    events: mpsc::Sender<RoomEvent>,
    seen_txns: Mutex<LruCache<String, ()>>,
    mapper: IdentityMapper,
    client: Arc<MatrixClient>,
    session: Arc<SessionState>,
}

impl AppserviceState {
    pub fn new(
        hs_token: impl Into<String>,
        events: mpsc::Sender<RoomEvent>,
        mapper: IdentityMapper,
        client: Arc<MatrixClient>,
        session: Arc<SessionState>,
    ) -> Self {
        let capacity = NonZeroUsize::new(SEEN_TRANSACTIONS).unwrap_or(NonZeroUsize::MIN);
        Self {
            hs_token: hs_token.into(),
            events,
            seen_txns: Mutex::new(LruCache::new(capacity)),
            mapper,
            client,
            session,
        }
    }

    /// Queues the events of a transaction. Returns how many were queued,
    /// zero for a replayed transaction id.
    pub async fn accept_transaction(
        &self,
        txn_id: &str,
        transaction: Transaction,
    ) -> BridgeResult<usize> {
        // Held until the id is recorded so a concurrent retry waits.
        let mut seen = self.seen_txns.lock().await;
        if seen.contains(txn_id) {
            debug!(txn_id, "transaction already processed");
            return Ok(0);
        }

        let mut queued = 0;
        for value in transaction.events {
            match serde_json::from_value::<RoomEvent>(value) {
                Ok(event) => {
                    self.events.send(event).await.map_err(|_| {
                        raise_error!(
                            "Room event consumer has stopped".into(),
                            ErrorCode::InternalError
                        )
                    })?;
                    queued += 1;
                }
                Err(e) => warn!(txn_id, "Skipping malformed event: {:#?}", e),
            }
        }
        seen.put(txn_id.to_string(), ());
        Ok(queued)
    }
}

#[handler]
async fn push_transaction(
    Path(txn_id): Path<String>,
    Json(transaction): Json<Transaction>,
    state: Data<&Arc<AppserviceState>>,
) -> ApiResult<Json<Value>> {
    let queued = state.accept_transaction(&txn_id, transaction).await?;
    debug!(txn_id = %txn_id, queued, "transaction accepted");
    Ok(Json(json!({})))
}

#[handler]
async fn query_user(
    Path(user_id): Path<String>,
    state: Data<&Arc<AppserviceState>>,
) -> ApiResult<Json<Value>> {
    if !state.mapper.is_virtual_user(&user_id) {
        return Err(raise_error!(
            format!("{} is not a bridged user", user_id),
            ErrorCode::ResourceNotFound
        )
        .into());
    }
    let localpart = user_id
        .trim_start_matches('@')
        .split(':')
        .next()
        .unwrap_or_default();
    let outcome = state.client.register(localpart).await?;
    info!(user_id = %user_id, ?outcome, "provisioned user on homeserver query");
    Ok(Json(json!({})))
}

#[handler]
async fn query_room(Path(alias): Path<String>) -> ApiResult<Json<Value>> {
    Err(raise_error!(
        format!("No room is bridged under {}", alias),
        ErrorCode::ResourceNotFound
    )
    .into())
}

#[handler]
async fn get_status(state: Data<&Arc<AppserviceState>>) -> Json<SessionDiagnostics> {
    Json(state.session.diagnostics())
}

fn homeserver_api() -> Route {
    Route::new()
        .at("/transactions/:txn_id", put(push_transaction))
        .at("/users/:user_id", get(query_user))
        .at("/rooms/:alias", get(query_room))
}

pub fn build_route(state: Arc<AppserviceState>) -> impl Endpoint {
    let guard = HomeserverGuard::new(state.hs_token.clone());
    Route::new()
        .nest("/_matrix/app/v1", homeserver_api().with(guard))
        .at("/api/status", get(get_status))
        .with(Tracing)
        .data(state)
}

/// Binds the listener and serves in the background until shutdown.
/// Returns once the socket is bound.
pub async fn serve(state: Arc<AppserviceState>, bind_ip: &str, port: u16) -> BridgeResult<()> {
    let acceptor = TcpListener::bind((bind_ip.to_string(), port))
        .into_acceptor()
        .await
        .map_err(|e| {
            raise_error!(
                format!(
                    "Failed to bind appservice listener on {}:{}: {:#?}",
                    bind_ip, port, e
                ),
                ErrorCode::NetworkError
            )
        })?;
    for addr in acceptor.local_addr() {
        info!("Appservice listening on {:?}", addr);
    }

    let route = build_route(state);
    tokio::spawn(async move {
        let result = Server::new_with_acceptor(acceptor)
            .name("mailbridge appservice")
            .idle_timeout(Duration::from_secs(60))
            .run_with_graceful_shutdown(route, SIGNAL_MANAGER.wait(), Some(Duration::from_secs(5)))
            .await;
        if let Err(e) = result {
            error!("Appservice listener stopped: {:#?}", e);
        }
    });
    Ok(())
}
