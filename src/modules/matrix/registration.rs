// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    generate_token,
    modules::error::{code::ErrorCode, BridgeResult},
    raise_error,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub exclusive: bool,
    pub regex: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Namespaces {
    #[serde(default)]
    pub users: Vec<Namespace>,
    #[serde(default)]
    pub aliases: Vec<Namespace>,
    #[serde(default)]
    pub rooms: Vec<Namespace>,
}

/// Appservice registration as read by the homeserver.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub url: String,
    pub as_token: String,
    pub hs_token: String,
    pub sender_localpart: String,
    #[serde(default)]
    pub namespaces: Namespaces,
    #[serde(default)]
    pub rate_limited: bool,
}

impl Registration {
    /// A fresh registration with random id and tokens that claims
    /// `user_regex` exclusively.
    pub fn generate(url: &str, sender_localpart: &str, user_regex: &str) -> Self {
        Self {
            id: generate_token!(128),
            url: url.to_string(),
            as_token: generate_token!(256),
            hs_token: generate_token!(256),
            sender_localpart: sender_localpart.to_string(),
            namespaces: Namespaces {
                users: vec![Namespace {
                    exclusive: true,
                    regex: user_regex.to_string(),
                }],
                ..Default::default()
            },
            rate_limited: false,
        }
    }

    pub fn load(path: &Path) -> BridgeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            raise_error!(
                format!(
                    "Failed to read registration file {}: {:#?}. Generate one with --bridge-generate-registration",
                    path.display(),
                    e
                ),
                ErrorCode::RegistrationFileError
            )
        })?;
        let registration: Registration = serde_yaml::from_str(&content).map_err(|e| {
            raise_error!(
                format!(
                    "Registration file {} is not valid: {:#?}",
                    path.display(),
                    e
                ),
                ErrorCode::RegistrationFileError
            )
        })?;
        if registration.as_token.is_empty() || registration.hs_token.is_empty() {
            return Err(raise_error!(
                format!(
                    "Registration file {} is missing as_token or hs_token",
                    path.display()
                ),
                ErrorCode::RegistrationFileError
            ));
        }
        Ok(registration)
    }

    pub fn save(&self, path: &Path) -> BridgeResult<()> {
        let content = serde_yaml::to_string(self).map_err(|e| {
            raise_error!(
                format!("Failed to serialize registration: {:#?}", e),
                ErrorCode::InternalError
            )
        })?;
        std::fs::write(path, content).map_err(|e| {
            raise_error!(
                format!(
                    "Failed to write registration file {}: {:#?}",
                    path.display(),
                    e
                ),
                ErrorCode::RegistrationFileError
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_registration_claims_user_namespace() {
        let registration =
            Registration::generate("http://localhost:8090", "mailbot", "@mail_.*");
        assert_eq!(registration.sender_localpart, "mailbot");
        assert_eq!(registration.namespaces.users.len(), 1);
        assert!(registration.namespaces.users[0].exclusive);
        assert_eq!(registration.namespaces.users[0].regex, "@mail_.*");
        assert!(registration.namespaces.rooms.is_empty());
        assert_ne!(registration.as_token, registration.hs_token);
    }

    #[test]
    fn save_then_load_keeps_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail-registration.yaml");
        let registration =
            Registration::generate("http://localhost:8090", "mailbot", "@mail_.*");
        registration.save(&path).unwrap();

        let loaded = Registration::load(&path).unwrap();
        assert_eq!(loaded, registration);
    }

    #[test]
    fn missing_file_is_a_registration_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = Registration::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert_eq!(error.code(), ErrorCode::RegistrationFileError);
    }

    #[test]
    fn file_without_tokens_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reg.yaml");
        std::fs::write(
            &path,
            "id: x\nurl: http://localhost\nas_token: ''\nhs_token: ''\nsender_localpart: mailbot\n",
        )
        .unwrap();
        let error = Registration::load(&path).unwrap_err();
        assert_eq!(error.code(), ErrorCode::RegistrationFileError);
    }
}
