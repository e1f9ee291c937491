// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Boundary scanner for raw MIME bodies.
//!
//! Used when the transport could not hand over structured parts, e.g. an
//! IMAP `BODY[TEXT]` section whose top-level headers (and therefore its
//! boundary parameter) are not available. The scanner walks the body line
//! by line:
//!
//! ```text
//!  Preamble --delimiter--> Headers --blank line--> Body --delimiter--> Headers
//!                                                   \--close-delimiter--> Preamble
//! ```
//!
//! The first delimiter-shaped line (`--token`) adopts `token` as a known
//! boundary. Every `boundary=` parameter seen in a section header adds
//! another, which is how nested multiparts get split. Only lines matching a
//! known boundary are treated as delimiters, so body text that merely starts
//! with `--` is left alone once a boundary is known. Sections without an
//! explicit `Content-Type` header are not classified as text.

use super::{MimePart, TransferEncoding};
use std::collections::HashSet;

enum State {
    Preamble,
    Headers(SectionBuilder),
    Body(SectionBuilder),
}

#[derive(Default)]
struct SectionBuilder {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    has_body_line: bool,
}

impl SectionBuilder {
    fn push_header_line(&mut self, line: &str) {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = self.headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            self.headers
                .push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    fn push_body_line(&mut self, line: &[u8]) {
        if self.has_body_line {
            self.body.push(b'\n');
        }
        self.body.extend_from_slice(line);
        self.has_body_line = true;
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn finish(self) -> Option<MimePart> {
        let content_type = self.header("content-type")?;
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let charset = header_param(content_type, "charset");
        let transfer_encoding = self
            .header("content-transfer-encoding")
            .map(TransferEncoding::from_header)
            .unwrap_or_default();
        Some(MimePart {
            content_type: media_type,
            charset,
            transfer_encoding,
            body: self.body,
        })
    }
}

enum Delimiter {
    Open,
    Close,
}

/// Extracts the value of parameter `name` from a structured header value
/// such as `text/plain; charset="utf-8"`.
pub fn header_param(value: &str, name: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case(name) {
            let val = val.trim().trim_matches('"').trim();
            (!val.is_empty()).then(|| val.to_string())
        } else {
            None
        }
    })
}

fn classify(line: &str, boundaries: &mut HashSet<String>) -> Option<Delimiter> {
    let token = line.trim_end().strip_prefix("--")?;
    let (token, closing) = match token.strip_suffix("--") {
        Some(inner) if boundaries.contains(inner) => (inner, true),
        _ => (token, false),
    };
    if boundaries.contains(token) {
        return Some(if closing {
            Delimiter::Close
        } else {
            Delimiter::Open
        });
    }
    if boundaries.is_empty()
        && !token.is_empty()
        && !token.ends_with("--")
        && !token.contains(char::is_whitespace)
    {
        boundaries.insert(token.to_string());
        return Some(Delimiter::Open);
    }
    None
}

/// Splits a raw MIME body into its leaf sections. Never fails; input that
/// contains no recognizable delimiter yields no sections.
pub fn scan_sections(raw: &[u8]) -> Vec<MimePart> {
    let mut boundaries: HashSet<String> = HashSet::new();
    let mut sections = Vec::new();
    let mut state = State::Preamble;

    for raw_line in raw.split(|b| *b == b'\n') {
        let raw_line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);
        let line = String::from_utf8_lossy(raw_line);

        state = match state {
            State::Preamble => match classify(&line, &mut boundaries) {
                Some(Delimiter::Open) => State::Headers(SectionBuilder::default()),
                _ => State::Preamble,
            },
            State::Headers(mut section) => {
                if line.trim().is_empty() {
                    State::Body(section)
                } else if let Some(delimiter) = classify(&line, &mut boundaries) {
                    sections.extend(section.finish());
                    next_after(delimiter)
                } else {
                    section.push_header_line(&line);
                    if let Some(boundary) = section
                        .header("content-type")
                        .filter(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/"))
                        .and_then(|ct| header_param(ct, "boundary"))
                    {
                        boundaries.insert(boundary);
                    }
                    State::Headers(section)
                }
            }
            State::Body(mut section) => match classify(&line, &mut boundaries) {
                Some(delimiter) => {
                    sections.extend(section.finish());
                    next_after(delimiter)
                }
                None => {
                    section.push_body_line(raw_line);
                    State::Body(section)
                }
            },
        };
    }

    // A missing closing delimiter still yields the last section.
    match state {
        State::Headers(section) | State::Body(section) => sections.extend(section.finish()),
        State::Preamble => {}
    }

    sections
}

fn next_after(delimiter: Delimiter) -> State {
    match delimiter {
        Delimiter::Open => State::Headers(SectionBuilder::default()),
        Delimiter::Close => State::Preamble,
    }
}
