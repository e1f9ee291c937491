use crate::modules::{error::BridgeResult, mime::MailBody};
use async_trait::async_trait;
use std::fmt;

/// Transport-assigned handle of a mailbox message. For IMAP this is the UID.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageHandle(pub u32);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Headers and body of one inbound message, as handed over by the source.
#[derive(Clone, Debug)]
pub struct FetchedMail {
    /// Bare sender address, `None` when the header was missing or unparsable.
    pub from: Option<String>,
    pub subject: Option<String>,
    pub body: MailBody,
}

/// Read side of the mailbox.
///
/// A session is opened once per poller tick and must be handed back to
/// [`MailboxSource::close_session`] on every exit path.
#[async_trait]
pub trait MailboxSource: Send + Sync {
    type Session: Send;

    async fn open_session(&self) -> BridgeResult<Self::Session>;

    async fn search_unseen(&self, session: &mut Self::Session) -> BridgeResult<Vec<MessageHandle>>;

    async fn fetch_text_and_headers(
        &self,
        session: &mut Self::Session,
        handle: MessageHandle,
    ) -> BridgeResult<FetchedMail>;

    async fn mark_seen(&self, session: &mut Self::Session, handle: MessageHandle)
        -> BridgeResult<()>;

    /// Releases the session. Errors are logged by the implementation.
    async fn close_session(&self, session: Self::Session);
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutboundMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait MailSink: Send + Sync {
    async fn send_mail(&self, mail: OutboundMail) -> BridgeResult<()>;
}
