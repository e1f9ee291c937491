// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Room to mailbox delivery.
//!
//! Every plain message posted in the bridged room is mailed, verbatim, to a
//! single configured recipient. Delivery is at most once: a failed send is
//! logged and the event is not replayed.

use crate::modules::bridge::state::SessionState;
use crate::modules::identity::IdentityMapper;
use crate::modules::settings::cli::Settings;
use crate::modules::transport::{MailSink, OutboundMail, RoomEvent, ROOM_MESSAGE_EVENT};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinHandle,
};
use tracing::{debug, error, info};


/// Upper bound on SMTP sends in flight at once; further mails wait.
pub const MAX_CONCURRENT_SENDS: usize = 4;

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub room_id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Full user ID of the bridge bot, whose own posts are never mailed.
    pub bot_user_id: String,
}

impl RelayConfig {
    pub fn from_settings(settings: &Settings, bot_user_id: String) -> Self {
        Self {
            room_id: settings.bridge_room_id.clone(),
            from: settings.mail_from(),
            to: settings.bridge_mail_to.clone(),
            subject: settings.bridge_mail_subject.clone(),
            bot_user_id,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelayOutcome {
    /// A send was started.
    Relayed,
    NotReady,
    WrongKind,
    EmptyContent,
    OtherRoom,
    /// Sent by the bot or one of the virtual mail users.
    OwnEcho,
}

pub struct RoomEventRelay {
    sink: Arc<dyn MailSink>,
    mapper: IdentityMapper,
    state: Arc<SessionState>,
    config: RelayConfig,
    sends: Arc<Semaphore>,
}

impl RoomEventRelay {
    pub fn new(
        sink: Arc<dyn MailSink>,
        mapper: IdentityMapper,
        state: Arc<SessionState>,
        config: RelayConfig,
    ) -> Self {
        Self {
            sink,
            mapper,
            state,
            config,
            sends: Arc::new(Semaphore::new(MAX_CONCURRENT_SENDS)),
        }
    }

    /// Decides whether `event` is relayed, without side effects.
    pub fn classify(&self, event: &RoomEvent) -> RelayOutcome {
        if event.kind != ROOM_MESSAGE_EVENT {
            return RelayOutcome::WrongKind;
        }
        if event.room_id != self.config.room_id {
            return RelayOutcome::OtherRoom;
        }
        if event.body().map_or(true, str::is_empty) {
            return RelayOutcome::EmptyContent;
        }
        if event.sender == self.config.bot_user_id || self.mapper.is_virtual_user(&event.sender) {
            return RelayOutcome::OwnEcho;
        }
        if !self.state.is_ready() {
            return RelayOutcome::NotReady;
        }
        RelayOutcome::Relayed
    }

    /// Handles one room event. Must be called from within a tokio runtime;
    /// the mail is sent on a spawned task and this returns immediately.
    /// At most [`MAX_CONCURRENT_SENDS`] of those tasks talk to SMTP at once.
    pub fn handle_event(&self, event: &RoomEvent) -> RelayOutcome {
        let outcome = self.classify(event);
        match outcome {
            RelayOutcome::Relayed => {}
            RelayOutcome::NotReady => {
                info!(
                    "Dropping room event {:?}, bridge is {}",
                    event.event_id,
                    self.state.phase()
                );
                return outcome;
            }
            _ => {
                debug!("Ignoring room event {:?}: {:?}", event.event_id, outcome);
                return outcome;
            }
        }

        let mail = OutboundMail {
            from: self.config.from.clone(),
            to: self.config.to.clone(),
            subject: self.config.subject.clone(),
            text: event.body().unwrap_or_default().to_string(),
        };
        let sink = self.sink.clone();
        let event_id = event.event_id.clone();
        let sender = event.sender.clone();
        let sends = self.sends.clone();
        tokio::spawn(async move {
            let Ok(_permit) = sends.acquire_owned().await else {
                return;
            };
            match sink.send_mail(mail).await {
                Ok(()) => info!("Mailed room message {:?} from {}", event_id, sender),
                Err(e) => error!(
                    "Failed to mail room message {:?} from {}, it will not be retried: {}",
                    event_id, sender, e
                ),
            }
        });
        outcome
    }
}

/// Feeds queued room events to the relay one at a time until every sender
/// is dropped.
pub fn spawn_consumer(
    relay: Arc<RoomEventRelay>,
    mut events: mpsc::Receiver<RoomEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            relay.handle_event(&event);
        }
        debug!("Room event channel closed, relay consumer exiting");
    })
}
