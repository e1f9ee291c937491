// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::settings::cli::Settings;
use std::path::PathBuf;

pub mod appservice;
pub mod client;
pub mod registration;
pub mod transport;

/// Homeserver side of the bridge as configured for this process.
#[derive(Clone, Debug)]
pub struct MatrixConfig {
    pub homeserver_url: String,
    pub domain: String,
    pub room_id: String,
    pub bot_localpart: String,
    pub bind_ip: String,
    pub port: u16,
    pub registration_path: PathBuf,
}

impl From<&Settings> for MatrixConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            homeserver_url: settings.bridge_homeserver_url.clone(),
            domain: settings.bridge_matrix_domain.clone(),
            room_id: settings.bridge_room_id.clone(),
            bot_localpart: settings.bridge_bot_localpart.clone(),
            bind_ip: settings.bridge_bind_ip.clone(),
            port: settings.bridge_port,
            registration_path: settings.bridge_registration_path.clone(),
        }
    }
}
