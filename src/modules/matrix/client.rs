// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    bridge_version,
    modules::{
        error::{code::ErrorCode, BridgeError, BridgeResult},
        transport::Provisioning,
    },
    raise_error, utc_now,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::debug;

const CLIENT_API: &str = "/_matrix/client/v3";

#[derive(Debug, Default, Deserialize)]
struct MatrixErrorBody {
    #[serde(default)]
    errcode: String,
    #[serde(default)]
    error: String,
}

impl MatrixErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum JoinResult {
    Joined,
    /// The homeserver refused the join, usually because no invite exists.
    Forbidden,
}

/// Client-server API calls made with the appservice token.
///
/// Every request masquerades as `user_id`, which must lie inside the
/// namespace the registration claims or be the sender localpart.
pub struct MatrixClient {
    client: reqwest::Client,
    homeserver_url: String,
    as_token: String,
    txn_counter: AtomicU64,
}

impl MatrixClient {
    pub fn new(homeserver_url: &str, as_token: impl Into<String>) -> BridgeResult<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(format!("mailbridge/{}", bridge_version!()))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                raise_error!(
                    format!("Failed to build HTTP client: {:#?}", e),
                    ErrorCode::InternalError
                )
            })?;

        Ok(Self {
            client,
            homeserver_url: homeserver_url.trim_end_matches('/').to_string(),
            as_token: as_token.into(),
            txn_counter: AtomicU64::new(0),
        })
    }

    /// Checks the appservice token. Returns the user the token belongs to.
    pub async fn whoami(&self) -> BridgeResult<String> {
        let url = client_url(&self.homeserver_url, "/account/whoami");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.as_token)
            .send()
            .await
            .map_err(request_error)?;

        let (status, body) = read_body(response).await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let error = MatrixErrorBody::parse(&body);
            return Err(raise_error!(
                format!(
                    "Homeserver rejected the appservice token ({}): {}",
                    error.errcode, error.error
                ),
                ErrorCode::PermissionDenied
            ));
        }
        if !status.is_success() {
            return Err(unexpected_status("whoami", status, &body));
        }

        #[derive(Deserialize)]
        struct WhoAmI {
            user_id: String,
        }
        let whoami: WhoAmI = serde_json::from_str(&body).map_err(|e| {
            raise_error!(
                format!("Unexpected whoami response: {:#?}", e),
                ErrorCode::MatrixRequestFailed
            )
        })?;
        Ok(whoami.user_id)
    }

    pub async fn register(&self, localpart: &str) -> BridgeResult<Provisioning> {
        let url = client_url(&self.homeserver_url, "/register");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.as_token)
            .json(&json!({
                "type": "m.login.application_service",
                "username": localpart,
                "inhibit_login": true,
            }))
            .send()
            .await
            .map_err(request_error)?;

        let (status, body) = read_body(response).await?;
        register_outcome(status, &body)
    }

    pub async fn join_room(&self, user_id: &str, room_id: &str) -> BridgeResult<JoinResult> {
        let url = client_url(
            &self.homeserver_url,
            &format!("/join/{}", urlencoding::encode(room_id)),
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.as_token)
            .query(&[("user_id", user_id)])
            .json(&json!({}))
            .send()
            .await
            .map_err(request_error)?;

        let (status, body) = read_body(response).await?;
        if status.is_success() {
            return Ok(JoinResult::Joined);
        }
        if status == StatusCode::FORBIDDEN {
            debug!(user_id, room_id, "join forbidden: {}", body);
            return Ok(JoinResult::Forbidden);
        }
        let error = MatrixErrorBody::parse(&body);
        Err(raise_error!(
            format!(
                "Failed to join {} as {}: HTTP {} {} {}",
                room_id, user_id, status, error.errcode, error.error
            ),
            ErrorCode::MatrixJoinFailed
        ))
    }

    /// `inviter` invites `invitee` into `room_id`.
    pub async fn invite(&self, inviter: &str, room_id: &str, invitee: &str) -> BridgeResult<()> {
        let url = client_url(
            &self.homeserver_url,
            &format!("/rooms/{}/invite", urlencoding::encode(room_id)),
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.as_token)
            .query(&[("user_id", inviter)])
            .json(&json!({ "user_id": invitee }))
            .send()
            .await
            .map_err(request_error)?;

        let (status, body) = read_body(response).await?;
        if status.is_success() {
            return Ok(());
        }
        let error = MatrixErrorBody::parse(&body);
        Err(raise_error!(
            format!(
                "Failed to invite {} into {}: HTTP {} {} {}",
                invitee, room_id, status, error.errcode, error.error
            ),
            ErrorCode::MatrixJoinFailed
        ))
    }

    /// Posts an `m.text` message as `user_id`. Returns the event id.
    pub async fn send_text(&self, user_id: &str, room_id: &str, text: &str) -> BridgeResult<String> {
        let txn_id = self.next_txn_id();
        let url = client_url(
            &self.homeserver_url,
            &format!(
                "/rooms/{}/send/m.room.message/{}",
                urlencoding::encode(room_id),
                txn_id
            ),
        );
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.as_token)
            .query(&[("user_id", user_id)])
            .json(&json!({
                "msgtype": "m.text",
                "body": text,
            }))
            .send()
            .await
            .map_err(request_error)?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(unexpected_status("send message", status, &body));
        }
        let value: Value = serde_json::from_str(&body).unwrap_or_default();
        Ok(value
            .get("event_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    fn next_txn_id(&self) -> String {
        format!(
            "mb{}.{}",
            utc_now!(),
            self.txn_counter.fetch_add(1, Ordering::Relaxed)
        )
    }
}

pub(crate) fn client_url(homeserver_url: &str, path: &str) -> String {
    format!("{}{}{}", homeserver_url, CLIENT_API, path)
}

/// Maps a `/register` response. `M_USER_IN_USE` counts as success.
pub(crate) fn register_outcome(status: StatusCode, body: &str) -> BridgeResult<Provisioning> {
    if status.is_success() {
        return Ok(Provisioning::Created);
    }
    let error = MatrixErrorBody::parse(body);
    if error.errcode == "M_USER_IN_USE" {
        return Ok(Provisioning::AlreadyExists);
    }
    Err(raise_error!(
        format!(
            "User registration failed: HTTP {} {} {}",
            status, error.errcode, error.error
        ),
        ErrorCode::MatrixUserProvisioningFailed
    ))
}

async fn read_body(response: reqwest::Response) -> BridgeResult<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await.map_err(request_error)?;
    Ok((status, body))
}

fn request_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        raise_error!(
            format!("Homeserver request timed out: {:#?}", e),
            ErrorCode::ConnectionTimeout
        )
    } else {
        raise_error!(
            format!("Homeserver request failed: {:#?}", e),
            ErrorCode::NetworkError
        )
    }
}

fn unexpected_status(operation: &str, status: StatusCode, body: &str) -> BridgeError {
    let error = MatrixErrorBody::parse(body);
    raise_error!(
        format!(
            "Homeserver {} failed: HTTP {} {} {}",
            operation, status, error.errcode, error.error
        ),
        ErrorCode::MatrixRequestFailed
    )
}
