// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::settings::cli::{Encryption, Settings};

pub mod client;
pub mod sink;

/// Connection parameters of the outbound mail relay.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub encryption: Encryption,
    pub username: String,
    pub password: String,
}

impl From<&Settings> for SmtpConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            host: settings.bridge_smtp_host.clone(),
            port: settings.bridge_smtp_port,
            encryption: settings.bridge_smtp_encryption,
            username: settings.bridge_smtp_username.clone(),
            password: settings.bridge_smtp_password.clone(),
        }
    }
}
