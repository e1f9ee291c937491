// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::{code::ErrorCode, BridgeResult};
use crate::{raise_error, validate_email};
use clap::{Parser, ValueEnum};
use std::{fmt, path::PathBuf, sync::LazyLock, time::Duration};
use url::Url;

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "mailbridge",
    about = "Bridges a single Matrix room and a single IMAP/SMTP mailbox in both directions.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// mailbridge log level (default: "info")
    #[clap(long, default_value = "info", env, help = "Set the log level for mailbridge")]
    pub bridge_log_level: String,

    /// Enable ANSI logs (default: true)
    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub bridge_ansi_logs: bool,

    /// Enable log file output (default: false)
    /// If false, logs will be printed to stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub bridge_log_to_file: bool,

    #[clap(
        long,
        default_value = "logs",
        env,
        help = "Directory for rolling log files when file logging is enabled"
    )]
    pub bridge_log_dir: PathBuf,

    /// Maximum number of log files (default: 5)
    #[clap(long, default_value = "5", env, help = "Set the maximum number of log files")]
    pub bridge_max_log_files: usize,

    #[clap(
        long,
        env,
        default_value = "",
        help = "Base URL of the Matrix homeserver (e.g. https://matrix.example.org)"
    )]
    pub bridge_homeserver_url: String,

    #[clap(
        long,
        env,
        default_value = "",
        help = "Server name of the homeserver, used as the domain part of user IDs"
    )]
    pub bridge_matrix_domain: String,

    #[clap(
        long,
        env,
        default_value = "",
        help = "ID of the bridged room (e.g. !abcdef:example.org)"
    )]
    pub bridge_room_id: String,

    #[clap(
        long,
        env,
        default_value = "mailbot",
        help = "Localpart of the bridge bot user"
    )]
    pub bridge_bot_localpart: String,

    #[clap(
        long,
        env,
        default_value = "mail_",
        help = "Localpart prefix reserved for virtual mail users"
    )]
    pub bridge_user_prefix: String,

    #[clap(
        long,
        env,
        default_value = "0.0.0.0",
        help = "Address the appservice listener binds to"
    )]
    pub bridge_bind_ip: String,

    #[clap(
        long,
        env,
        default_value = "8090",
        help = "Port the appservice listener binds to"
    )]
    pub bridge_port: u16,

    #[clap(
        long,
        env,
        default_value = "mail-registration.yaml",
        help = "Path of the appservice registration file"
    )]
    pub bridge_registration_path: PathBuf,

    #[clap(
        long,
        default_value = "false",
        help = "Write a fresh registration file to the registration path and exit"
    )]
    pub bridge_generate_registration: bool,

    #[clap(
        long,
        env,
        default_value = "http://localhost:8090",
        help = "URL the homeserver uses to reach this appservice (written into generated registrations)"
    )]
    pub bridge_public_url: String,

    #[clap(long, env, default_value = "", help = "IMAP server host")]
    pub bridge_imap_host: String,

    #[clap(long, env, default_value = "993", help = "IMAP server port")]
    pub bridge_imap_port: u16,

    #[clap(long, env, default_value = "", help = "IMAP login user")]
    pub bridge_imap_username: String,

    #[clap(long, env, default_value = "", hide_env_values = true, help = "IMAP login password")]
    pub bridge_imap_password: String,

    #[clap(long, env, value_enum, default_value = "ssl", help = "IMAP connection security")]
    pub bridge_imap_encryption: Encryption,

    #[clap(long, env, default_value = "INBOX", help = "Mailbox polled for unseen messages")]
    pub bridge_imap_mailbox: String,

    #[clap(long, env, default_value = "", help = "SMTP relay host")]
    pub bridge_smtp_host: String,

    #[clap(long, env, default_value = "465", help = "SMTP relay port")]
    pub bridge_smtp_port: u16,

    #[clap(long, env, default_value = "", help = "SMTP login user")]
    pub bridge_smtp_username: String,

    #[clap(long, env, default_value = "", hide_env_values = true, help = "SMTP login password")]
    pub bridge_smtp_password: String,

    #[clap(long, env, value_enum, default_value = "ssl", help = "SMTP connection security")]
    pub bridge_smtp_encryption: Encryption,

    #[clap(
        long,
        env,
        help = "Sender address of relayed mail (defaults to the SMTP user)"
    )]
    pub bridge_mail_from: Option<String>,

    #[clap(
        long,
        env,
        default_value = "",
        help = "The single recipient every room message is relayed to"
    )]
    pub bridge_mail_to: String,

    #[clap(
        long,
        env,
        default_value = "Matrix Message",
        help = "Subject line of relayed mail"
    )]
    pub bridge_mail_subject: String,

    #[clap(
        long,
        env,
        default_value = "60",
        help = "Seconds between mailbox polls",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub bridge_poll_interval_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Encryption {
    #[clap(name = "ssl")]
    Ssl,
    #[clap(name = "starttls")]
    StartTls,
    #[clap(name = "none")]
    None,
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Encryption::Ssl => "ssl",
            Encryption::StartTls => "starttls",
            Encryption::None => "none",
        };
        write!(f, "{}", s)
    }
}

impl Settings {
    #[cfg(test)]
    fn new_for_test() -> Self {
        Self {
            bridge_log_level: "info".into(),
            bridge_ansi_logs: false,
            bridge_log_to_file: false,
            bridge_log_dir: PathBuf::from("logs"),
            bridge_max_log_files: 5,
            bridge_homeserver_url: "https://matrix.example.org".into(),
            bridge_matrix_domain: "example.org".into(),
            bridge_room_id: "!bridged:example.org".into(),
            bridge_bot_localpart: "mailbot".into(),
            bridge_user_prefix: "mail_".into(),
            bridge_bind_ip: "127.0.0.1".into(),
            bridge_port: 8090,
            bridge_registration_path: PathBuf::from("mail-registration.yaml"),
            bridge_generate_registration: false,
            bridge_public_url: "http://localhost:8090".into(),
            bridge_imap_host: "imap.example.org".into(),
            bridge_imap_port: 993,
            bridge_imap_username: "bridge@example.org".into(),
            bridge_imap_password: "secret".into(),
            bridge_imap_encryption: Encryption::Ssl,
            bridge_imap_mailbox: "INBOX".into(),
            bridge_smtp_host: "smtp.example.org".into(),
            bridge_smtp_port: 465,
            bridge_smtp_username: "bridge@example.org".into(),
            bridge_smtp_password: "secret".into(),
            bridge_smtp_encryption: Encryption::Ssl,
            bridge_mail_from: None,
            bridge_mail_to: "recipient@example.org".into(),
            bridge_mail_subject: "Matrix Message".into(),
            bridge_poll_interval_secs: 60,
        }
    }

    /// Rejects missing or malformed required values. Runs before any
    /// network activity so a bad config never half-starts the bridge.
    pub fn validate(&self) -> BridgeResult<()> {
        Url::parse(&self.bridge_homeserver_url).map_err(|e| {
            raise_error!(
                format!(
                    "bridge_homeserver_url '{}' is not a valid URL: {}",
                    self.bridge_homeserver_url, e
                ),
                ErrorCode::MissingConfiguration
            )
        })?;

        let required = [
            ("bridge_matrix_domain", &self.bridge_matrix_domain),
            ("bridge_room_id", &self.bridge_room_id),
            ("bridge_bot_localpart", &self.bridge_bot_localpart),
            ("bridge_user_prefix", &self.bridge_user_prefix),
            ("bridge_imap_host", &self.bridge_imap_host),
            ("bridge_imap_username", &self.bridge_imap_username),
            ("bridge_imap_password", &self.bridge_imap_password),
            ("bridge_imap_mailbox", &self.bridge_imap_mailbox),
            ("bridge_smtp_host", &self.bridge_smtp_host),
            ("bridge_smtp_username", &self.bridge_smtp_username),
            ("bridge_smtp_password", &self.bridge_smtp_password),
            ("bridge_mail_to", &self.bridge_mail_to),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(raise_error!(
                format!("'{}' is required but was not set", name),
                ErrorCode::MissingConfiguration
            ));
        }

        if !self.bridge_room_id.starts_with('!') {
            return Err(raise_error!(
                format!(
                    "bridge_room_id '{}' must be a room ID starting with '!'",
                    self.bridge_room_id
                ),
                ErrorCode::InvalidParameter
            ));
        }

        validate_email!(&self.bridge_mail_to)?;
        validate_email!(&self.mail_from())?;
        Ok(())
    }

    pub fn mail_from(&self) -> String {
        self.bridge_mail_from
            .clone()
            .unwrap_or_else(|| self.bridge_smtp_username.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.bridge_poll_interval_secs)
    }
}
