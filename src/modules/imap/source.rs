// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::code::ErrorCode;
use crate::modules::error::BridgeResult;
use crate::modules::imap::client::{Client, Session};
use crate::modules::imap::section::{SectionExtractor, TextSection};
use crate::modules::imap::MailboxConfig;
use crate::modules::mime::MailBody;
use crate::modules::transport::{FetchedMail, MailboxSource, MessageHandle};
use crate::raise_error;
use async_imap::types::Fetch;
use async_trait::async_trait;
use futures::TryStreamExt;
use mail_parser::{Address, MessageParser};
use tracing::{debug, warn};

const HEADER_QUERY: &str = "(UID BODYSTRUCTURE BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])";
const RAW_TEXT_QUERY: &str = "(UID BODY.PEEK[TEXT])";

/// Polls one mailbox over IMAP. Every session is a fresh connection.
pub struct ImapMailboxSource {
    config: MailboxConfig,
}

impl ImapMailboxSource {
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }

    async fn uid_fetch(session: &mut Session, uid: u32, query: &str) -> BridgeResult<Fetch> {
        let fetches = session
            .uid_fetch(uid.to_string(), query)
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?
            .try_collect::<Vec<Fetch>>()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;

        // Servers may interleave unsolicited FETCH responses for other messages.
        fetches
            .into_iter()
            .find(|fetch| fetch.uid == Some(uid))
            .ok_or_else(|| {
                raise_error!(
                    format!("Message with UID {} is no longer in the mailbox", uid),
                    ErrorCode::ImapUnexpectedResult
                )
            })
    }

    async fn fetch_sections(
        session: &mut Session,
        uid: u32,
        sections: Vec<TextSection>,
    ) -> BridgeResult<MailBody> {
        let query = format!(
            "(UID {})",
            sections
                .iter()
                .map(|section| format!("BODY.PEEK[{}]", section.path))
                .collect::<Vec<_>>()
                .join(" ")
        );
        let fetch = Self::uid_fetch(session, uid, &query).await?;

        let parts = sections
            .into_iter()
            .map(|section| {
                let body = fetch
                    .section(&section.path.section_path())
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default();
                section.into_part(body)
            })
            .collect();
        Ok(MailBody::Parts(parts))
    }
}

#[async_trait]
impl MailboxSource for ImapMailboxSource {
    type Session = Session;

    async fn open_session(&self) -> BridgeResult<Session> {
        let config = &self.config;
        let client = Client::connection(&config.host, config.encryption, config.port).await?;
        let mut session = client.login(&config.username, &config.password).await?;
        if let Err(e) = session.select(&config.mailbox).await {
            let _ = session.logout().await;
            return Err(raise_error!(
                format!("Failed to select mailbox '{}': {:#?}", config.mailbox, e),
                ErrorCode::ImapCommandFailed
            ));
        }
        debug!(
            "Opened IMAP session for {} on {}",
            config.username, config.mailbox
        );
        Ok(session)
    }

    async fn search_unseen(&self, session: &mut Session) -> BridgeResult<Vec<MessageHandle>> {
        let uids = session
            .uid_search("UNSEEN")
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        let mut handles: Vec<MessageHandle> = uids.into_iter().map(MessageHandle).collect();
        handles.sort_unstable();
        Ok(handles)
    }

    async fn fetch_text_and_headers(
        &self,
        session: &mut Session,
        handle: MessageHandle,
    ) -> BridgeResult<FetchedMail> {
        let uid = handle.0;
        let fetch = Self::uid_fetch(session, uid, HEADER_QUERY).await?;
        let (from, subject) = fetch
            .header()
            .map(parse_headers)
            .unwrap_or_default();
        let sections = fetch
            .bodystructure()
            .map(|structure| SectionExtractor::new(structure).text_sections())
            .unwrap_or_default();

        let body = if sections.is_empty() {
            debug!("No text part in BODYSTRUCTURE of UID {uid}, falling back to raw TEXT");
            let fetch = Self::uid_fetch(session, uid, RAW_TEXT_QUERY).await?;
            MailBody::Raw(fetch.text().map(<[u8]>::to_vec).unwrap_or_default())
        } else {
            Self::fetch_sections(session, uid, sections).await?
        };

        Ok(FetchedMail {
            from,
            subject,
            body,
        })
    }

    async fn mark_seen(&self, session: &mut Session, handle: MessageHandle) -> BridgeResult<()> {
        session
            .uid_store(handle.to_string(), "+FLAGS (\\Seen)")
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?
            .try_collect::<Vec<Fetch>>()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        Ok(())
    }

    async fn close_session(&self, mut session: Session) {
        if let Err(e) = session.logout().await {
            warn!("IMAP logout failed, dropping connection: {:#?}", e);
        }
    }
}

/// Extracts the bare sender address and subject from a header block.
pub(crate) fn parse_headers(header: &[u8]) -> (Option<String>, Option<String>) {
    let Some(message) = MessageParser::new().parse(header) else {
        return (None, None);
    };
    let from = message.from().and_then(first_address);
    let subject = message.subject().map(String::from);
    (from, subject)
}

fn first_address(address: &Address<'_>) -> Option<String> {
    let found = match address {
        Address::List(addrs) => addrs.iter().find_map(|addr| addr.address.as_deref()),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|group| group.addresses.iter())
            .find_map(|addr| addr.address.as_deref()),
    };
    found
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(String::from)
}
