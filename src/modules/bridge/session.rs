// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::bridge::state::{BridgePhase, SessionState};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::BridgeResult;
use crate::modules::transport::{ChatTransport, Provisioning};
use crate::raise_error;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const READY_ANNOUNCEMENT: &str = "Mail bridge is online. Messages in this room are forwarded by mail, and new mail is posted here.";

/// Drives bring-up of the chat side, in order: credential check, listener,
/// bot user, room membership, announcement.
pub struct BridgeSession {
    transport: Arc<dyn ChatTransport>,
    state: Arc<SessionState>,
}

impl BridgeSession {
    pub fn new(transport: Arc<dyn ChatTransport>, state: Arc<SessionState>) -> Self {
        Self { transport, state }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Runs bring-up once.
    ///
    /// Credential and listener failures are returned as errors and are fatal
    /// for the process. Failures while provisioning the bot or joining the
    /// room leave the session [`BridgePhase::Degraded`], which is returned
    /// as `Ok` so the caller can keep serving diagnostics.
    pub async fn start(&self) -> BridgeResult<BridgePhase> {
        let phase = self.state.phase();
        if phase != BridgePhase::Uninitialized {
            return Err(raise_error!(
                format!("Bridge session already started (phase {})", phase),
                ErrorCode::InternalError
            ));
        }

        self.state.set_phase(BridgePhase::Registering);
        self.transport.register().await?;

        self.state.set_phase(BridgePhase::AwaitingTransportReady);
        self.transport.listen().await?;

        let bot = self.state.bot().clone();
        let room_id = self.state.room_id().to_string();

        self.state.set_phase(BridgePhase::ProvisioningBot);
        match self.transport.ensure_registered(&bot).await {
            Ok(Provisioning::Created) => info!("Registered bridge bot {}", bot),
            Ok(Provisioning::AlreadyExists) => info!("Bridge bot {} already registered", bot),
            Err(e) => return Ok(self.degrade("provisioning the bridge bot", e)),
        }

        self.state.set_phase(BridgePhase::JoiningRoom);
        if let Err(e) = self.transport.join_room(&bot, &room_id).await {
            return Ok(self.degrade("joining the bridged room", e));
        }

        if let Err(e) = self
            .transport
            .send_text(&bot, &room_id, READY_ANNOUNCEMENT)
            .await
        {
            warn!("Could not post the ready announcement into {}: {}", room_id, e);
        }

        self.state.set_phase(BridgePhase::Ready);
        info!("Bridge ready for room {}", room_id);
        Ok(BridgePhase::Ready)
    }

    fn degrade(&self, step: &str, e: impl std::fmt::Display) -> BridgePhase {
        error!(
            "Bridge degraded while {}: {}. Mail polling will not start; restart the bridge to recover.",
            step, e
        );
        self.state.set_phase(BridgePhase::Degraded);
        BridgePhase::Degraded
    }
}
