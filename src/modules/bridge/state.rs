// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::identity::VirtualIdentity;
use crate::{bridge_version, utc_now};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::info;

/// Lifecycle of a bridge process.
///
/// ```text
/// Uninitialized -> Registering -> AwaitingTransportReady -> ProvisioningBot
///               -> JoiningRoom -> Ready
/// ProvisioningBot | JoiningRoom --error--> Degraded (terminal)
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgePhase {
    Uninitialized,
    Registering,
    AwaitingTransportReady,
    ProvisioningBot,
    JoiningRoom,
    Ready,
    Degraded,
}

impl fmt::Display for BridgePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BridgePhase::Uninitialized => "uninitialized",
            BridgePhase::Registering => "registering",
            BridgePhase::AwaitingTransportReady => "awaiting_transport_ready",
            BridgePhase::ProvisioningBot => "provisioning_bot",
            BridgePhase::JoiningRoom => "joining_room",
            BridgePhase::Ready => "ready",
            BridgePhase::Degraded => "degraded",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    Completed {
        found: usize,
        delivered: usize,
        failed: usize,
    },
    SessionFailed {
        error: String,
        consecutive_failures: u32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct PollReport {
    pub finished_at: i64,
    #[serde(flatten)]
    pub outcome: PollOutcome,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionDiagnostics {
    pub phase: BridgePhase,
    pub room_id: String,
    pub bot_user_id: String,
    pub last_poll: Option<PollReport>,
    /// Ticks skipped because the previous one was still running.
    pub skipped_polls: u64,
    pub uptime_secs: i64,
    pub version: String,
}

/// Process-wide session state, shared read-only with the poller and relay.
///
/// Only the session orchestrator moves the phase; the poller records its
/// last outcome for diagnostics.
#[derive(Debug)]
pub struct SessionState {
    room_id: String,
    bot: VirtualIdentity,
    started_at: i64,
    phase: watch::Sender<BridgePhase>,
    last_poll: watch::Sender<Option<PollReport>>,
    skipped_polls: AtomicU64,
}

impl SessionState {
    pub fn new(room_id: impl Into<String>, bot: VirtualIdentity) -> Self {
        let (phase, _) = watch::channel(BridgePhase::Uninitialized);
        let (last_poll, _) = watch::channel(None);
        Self {
            room_id: room_id.into(),
            bot,
            started_at: utc_now!(),
            phase,
            last_poll,
            skipped_polls: AtomicU64::new(0),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn bot(&self) -> &VirtualIdentity {
        &self.bot
    }

    pub fn phase(&self) -> BridgePhase {
        *self.phase.borrow()
    }

    /// Deliveries in either direction are only allowed while ready.
    pub fn is_ready(&self) -> bool {
        self.phase() == BridgePhase::Ready
    }

    pub(crate) fn set_phase(&self, phase: BridgePhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!("Bridge session {} -> {}", previous, phase);
        }
    }

    pub fn record_poll(&self, outcome: PollOutcome) {
        self.last_poll.send_replace(Some(PollReport {
            finished_at: utc_now!(),
            outcome,
        }));
    }

    /// Counts a skipped tick without replacing the last real outcome.
    pub fn record_skip(&self) {
        self.skipped_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_polls(&self) -> u64 {
        self.skipped_polls.load(Ordering::Relaxed)
    }

    pub fn last_poll(&self) -> Option<PollReport> {
        self.last_poll.borrow().clone()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            phase: self.phase(),
            room_id: self.room_id.clone(),
            bot_user_id: self.bot.user_id(),
            last_poll: self.last_poll(),
            skipped_polls: self.skipped_polls(),
            uptime_secs: (utc_now!() - self.started_at) / 1000,
            version: bridge_version!().to_string(),
        }
    }
}
