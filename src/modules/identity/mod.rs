// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Mapping between mail sender addresses and the Matrix users that
//! represent them inside the bridged room.
//!
//! `alice.smith@example.com` becomes `@mail_alice_smith_example_com:<domain>`.
//! The address is lowercased, `@` and `.` become `_`, and anything else that
//! is not a plain localpart character is written as `=xx` per UTF-8 byte, so
//! a hostile `From` header can never produce an invalid or colliding-by-design
//! Matrix ID.

use crate::modules::error::{code::ErrorCode, BridgeResult};
use crate::raise_error;
use std::fmt;

/// Local-part substituted when the transport could not supply a sender.
pub const UNKNOWN_SENDER: &str = "unknown_sender";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualIdentity {
    localpart: String,
    domain: String,
}

impl VirtualIdentity {
    pub fn new(localpart: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            localpart: localpart.into(),
            domain: domain.into(),
        }
    }

    pub fn localpart(&self) -> &str {
        &self.localpart
    }

    /// Fully qualified Matrix user ID, `@localpart:domain`.
    pub fn user_id(&self) -> String {
        format!("@{}:{}", self.localpart, self.domain)
    }
}

impl fmt::Display for VirtualIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}:{}", self.localpart, self.domain)
    }
}

/// Derives the virtual identity for `email_address`.
///
/// The result depends only on the arguments, so re-provisioning the same
/// sender is idempotent. An empty address is rejected; callers substitute
/// [`UNKNOWN_SENDER`] when the header is missing.
pub fn to_virtual_identity(
    email_address: &str,
    prefix: &str,
    chat_domain: &str,
) -> BridgeResult<VirtualIdentity> {
    let email_address = email_address.trim();
    if email_address.is_empty() {
        return Err(raise_error!(
            "Cannot map an empty email address to a virtual identity".into(),
            ErrorCode::InvalidParameter
        ));
    }

    let mut localpart = String::with_capacity(prefix.len() + email_address.len());
    localpart.push_str(prefix);
    for c in email_address.chars().flat_map(char::to_lowercase) {
        match c {
            '@' | '.' => localpart.push('_'),
            'a'..='z' | '0'..='9' | '_' | '-' | '+' => localpart.push(c),
            other => {
                let mut buf = [0u8; 4];
                for byte in other.encode_utf8(&mut buf).bytes() {
                    localpart.push_str(&format!("={:02x}", byte));
                }
            }
        }
    }

    Ok(VirtualIdentity::new(localpart, chat_domain))
}

/// Binds the namespace prefix and homeserver domain configured for this
/// bridge instance.
#[derive(Debug, Clone)]
pub struct IdentityMapper {
    prefix: String,
    domain: String,
}

impl IdentityMapper {
    pub fn new(prefix: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            domain: domain.into(),
        }
    }

    pub fn to_virtual_identity(&self, email_address: &str) -> BridgeResult<VirtualIdentity> {
        to_virtual_identity(email_address, &self.prefix, &self.domain)
    }

    /// Identity used when a message arrives without a usable sender.
    pub fn unknown_sender(&self) -> VirtualIdentity {
        VirtualIdentity::new(format!("{}{}", self.prefix, UNKNOWN_SENDER), &self.domain)
    }

    /// Whether `user_id` lies inside the namespace this bridge owns.
    pub fn is_virtual_user(&self, user_id: &str) -> bool {
        user_id
            .strip_prefix('@')
            .and_then(|rest| rest.strip_prefix(self.prefix.as_str()))
            .and_then(|rest| rest.rsplit_once(':'))
            .is_some_and(|(_, domain)| domain == self.domain)
    }

    /// Regex for the exclusive user namespace in the registration file.
    pub fn namespace_regex(&self) -> String {
        format!("@{}.*", self.prefix)
    }
}
