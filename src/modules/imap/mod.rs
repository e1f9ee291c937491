// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::settings::cli::{Encryption, Settings};

pub mod client;
pub mod section;
pub mod session;
pub mod source;
#[cfg(test)]
mod tests;

/// Connection parameters of the polled mailbox.
#[derive(Clone, Debug)]
pub struct MailboxConfig {
    pub host: String,
    pub port: u16,
    pub encryption: Encryption,
    pub username: String,
    pub password: String,
    pub mailbox: String,
}

impl From<&Settings> for MailboxConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            host: settings.bridge_imap_host.clone(),
            port: settings.bridge_imap_port,
            encryption: settings.bridge_imap_encryption,
            username: settings.bridge_imap_username.clone(),
            password: settings.bridge_imap_password.clone(),
            mailbox: settings.bridge_imap_mailbox.clone(),
        }
    }
}
