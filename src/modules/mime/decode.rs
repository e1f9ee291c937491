// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use super::{MimePart, TransferEncoding};
use base64::{engine::general_purpose::STANDARD, Engine};
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use tracing::debug;

/// Undoes the transfer encoding of `data`.
///
/// Returns `None` when the payload is not valid for its declared encoding.
/// Unrecognized encodings pass the data through unchanged.
pub fn decode_transfer(data: &[u8], encoding: &TransferEncoding) -> Option<Vec<u8>> {
    match encoding {
        TransferEncoding::Base64 => {
            let compact: Vec<u8> = data
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            STANDARD.decode(compact).ok()
        }
        TransferEncoding::QuotedPrintable => quoted_printable_decode(data),
        TransferEncoding::Identity | TransferEncoding::Unrecognized(_) => Some(data.to_vec()),
    }
}

/// Turns decoded bytes into text using `charset`, defaulting to UTF-8.
///
/// Malformed sequences become U+FFFD rather than failing, so a broken part
/// still shows up in the room. A byte order mark never overrides the
/// declared charset.
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| encoding_rs::Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        debug!(
            "Replaced malformed {} sequences while decoding mail text",
            encoding.name()
        );
    }
    text.into_owned()
}

pub fn decode_part(part: &MimePart) -> String {
    match decode_transfer(&part.body, &part.transfer_encoding) {
        Some(bytes) => decode_charset(&bytes, part.charset.as_deref()),
        None => {
            debug!(
                "Discarding {} part with undecodable {:?} body",
                part.content_type, part.transfer_encoding
            );
            String::new()
        }
    }
}
