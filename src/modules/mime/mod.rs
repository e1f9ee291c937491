// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Best-effort plain text extraction from mail bodies.
//!
//! Two inputs are accepted. [`MailBody::Parts`] carries text parts the
//! mailbox transport already located (from IMAP `BODYSTRUCTURE`) together
//! with their declared transfer encoding. [`MailBody::Raw`] carries an
//! undecoded body that still contains MIME boundaries; it is split by the
//! [`scanner`] state machine. Extraction never fails: anything that cannot
//! be decoded yields an empty string for that part only.

use serde::{Deserialize, Serialize};

pub mod decode;
pub mod scanner;
#[cfg(test)]
mod tests;

/// Content transfer encoding declared for a MIME part.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub enum TransferEncoding {
    /// 7bit, 8bit, binary or no header at all.
    #[default]
    Identity,
    QuotedPrintable,
    Base64,
    /// Any other token. Treated as already decoded.
    Unrecognized(String),
}

impl TransferEncoding {
    pub fn from_header(value: &str) -> Self {
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "" | "7bit" | "8bit" | "binary" => TransferEncoding::Identity,
            "base64" => TransferEncoding::Base64,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            _ => TransferEncoding::Unrecognized(value.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum TextKind {
    Plain,
    Html,
}

impl TextKind {
    /// Classifies a `type/subtype` media type, ignoring parameters and case.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("text/plain") {
            Some(TextKind::Plain)
        } else if essence.eq_ignore_ascii_case("text/html") {
            Some(TextKind::Html)
        } else {
            None
        }
    }
}

/// A single text part as located by the mailbox transport, still encoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MimePart {
    /// Declared media type, e.g. `text/plain`.
    pub content_type: String,
    pub charset: Option<String>,
    pub transfer_encoding: TransferEncoding,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MailBody {
    Parts(Vec<MimePart>),
    Raw(Vec<u8>),
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ExtractedText {
    pub plain_text: String,
    pub html_text: String,
}

/// Extracts `text/plain` and `text/html` content from `body`.
///
/// Both fields may be empty; that is a valid outcome, not an error. The
/// first part of each kind wins.
pub fn extract_text(body: &MailBody) -> ExtractedText {
    match body {
        MailBody::Parts(parts) => extract_from_parts(parts),
        MailBody::Raw(raw) => extract_from_parts(&scanner::scan_sections(raw)),
    }
}

fn extract_from_parts(parts: &[MimePart]) -> ExtractedText {
    let first_of = |kind: TextKind| {
        parts
            .iter()
            .find(|part| TextKind::from_media_type(&part.content_type) == Some(kind))
            .map(decode::decode_part)
            .unwrap_or_default()
    };

    ExtractedText {
        plain_text: first_of(TextKind::Plain),
        html_text: first_of(TextKind::Html),
    }
}
