// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Boundaries between the bridge core and the outside world.
//!
//! The poller, relay and session only ever talk to these traits. The IMAP,
//! SMTP and Matrix modules provide the production implementations; tests
//! plug in in-memory fakes.

pub mod chat;
pub mod mailbox;

pub use chat::{ChatTransport, Provisioning, RoomEvent, RoomSink, ROOM_MESSAGE_EVENT};
pub use mailbox::{FetchedMail, MailSink, MailboxSource, MessageHandle, OutboundMail};
