// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Mailbox to room delivery.
//!
//! Each tick opens one mailbox session, delivers every unseen message into
//! the bridged room as its sender's virtual user and flags a message seen
//! only after the room accepted it. A message whose delivery failed stays
//! unseen and is retried on the next tick. Ticks never overlap: a tick that
//! finds the previous one still in flight is skipped, not queued.

use crate::modules::bridge::state::{PollOutcome, SessionState};
use crate::modules::error::BridgeResult;
use crate::modules::identity::{IdentityMapper, VirtualIdentity};
use crate::modules::mime::extract_text;
use crate::modules::settings::cli::Settings;
use crate::modules::transport::{MailboxSource, MessageHandle, RoomSink};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

/// Text posted when a message has no extractable plain text part.
pub const EMPTY_BODY_PLACEHOLDER: &str = "No content";

#[derive(Clone, Debug)]
pub struct PollerConfig {
    pub room_id: String,
    pub interval: Duration,
}

impl From<&Settings> for PollerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            room_id: settings.bridge_room_id.clone(),
            interval: settings.poll_interval(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TickSummary {
    pub found: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// The session is not ready; nothing was touched.
    NotReady,
    Skipped,
    SessionFailed,
    Completed(TickSummary),
}

/// Clears the in-flight flag when dropped.
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MailPoller<S: MailboxSource> {
    source: S,
    sink: Arc<dyn RoomSink>,
    mapper: IdentityMapper,
    state: Arc<SessionState>,
    config: PollerConfig,
    in_flight: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl<S: MailboxSource> MailPoller<S> {
    pub fn new(
        source: S,
        sink: Arc<dyn RoomSink>,
        mapper: IdentityMapper,
        state: Arc<SessionState>,
        config: PollerConfig,
    ) -> Self {
        Self {
            source,
            sink,
            mapper,
            state,
            config,
            in_flight: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Number of ticks in a row that could not talk to the mailbox.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub async fn tick(&self) -> TickOutcome {
        if !self.state.is_ready() {
            debug!("Skipping mailbox poll, bridge is {}", self.state.phase());
            return TickOutcome::NotReady;
        }

        let Some(_guard) = TickGuard::acquire(&self.in_flight) else {
            info!("Previous mailbox poll still running, skipping this tick");
            self.state.record_skip();
            return TickOutcome::Skipped;
        };

        let mut session = match self.source.open_session().await {
            Ok(session) => session,
            Err(e) => {
                self.session_failed(e.to_string());
                return TickOutcome::SessionFailed;
            }
        };

        let result = self.deliver_unseen(&mut session).await;
        // Closed before the guard is released at the end of this scope.
        self.source.close_session(session).await;

        match result {
            Ok(summary) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                if summary.found > 0 {
                    info!(
                        "Mailbox poll finished: {} unseen, {} delivered, {} failed",
                        summary.found, summary.delivered, summary.failed
                    );
                }
                self.state.record_poll(PollOutcome::Completed {
                    found: summary.found,
                    delivered: summary.delivered,
                    failed: summary.failed,
                });
                TickOutcome::Completed(summary)
            }
            Err(e) => {
                self.session_failed(e.to_string());
                TickOutcome::SessionFailed
            }
        }
    }

    fn session_failed(&self, error: String) {
        let consecutive_failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            "Mailbox poll failed ({} in a row): {}",
            consecutive_failures, error
        );
        self.state.record_poll(PollOutcome::SessionFailed {
            error,
            consecutive_failures,
        });
    }

    async fn deliver_unseen(&self, session: &mut S::Session) -> BridgeResult<TickSummary> {
        let handles = self.source.search_unseen(session).await?;
        let mut summary = TickSummary {
            found: handles.len(),
            ..Default::default()
        };

        for handle in handles {
            match self.deliver_one(session, handle).await {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!("Delivery of message {} failed, leaving it unseen: {}", handle, e);
                }
            }
        }
        Ok(summary)
    }

    async fn deliver_one(&self, session: &mut S::Session, handle: MessageHandle) -> BridgeResult<()> {
        let mail = self.source.fetch_text_and_headers(session, handle).await?;
        let text = extract_text(&mail.body);
        let body = if text.plain_text.trim().is_empty() {
            EMPTY_BODY_PLACEHOLDER
        } else {
            text.plain_text.as_str()
        };

        let sender = self.resolve_sender(mail.from.as_deref());
        debug!(
            "Delivering message {} from {} (subject: {:?})",
            handle, sender, mail.subject
        );
        self.sink
            .send_text(&sender, &self.config.room_id, body)
            .await?;

        if let Err(e) = self.source.mark_seen(session, handle).await {
            // Delivered already; the next tick will post it again.
            warn!("Message {} delivered but could not be flagged seen: {}", handle, e);
        }
        Ok(())
    }

    fn resolve_sender(&self, from: Option<&str>) -> VirtualIdentity {
        match from.map(str::trim).filter(|from| !from.is_empty()) {
            Some(address) => self
                .mapper
                .to_virtual_identity(address)
                .unwrap_or_else(|_| self.mapper.unknown_sender()),
            None => self.mapper.unknown_sender(),
        }
    }
}
