// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::mime::{MimePart, TextKind, TransferEncoding};
use async_imap::imap_proto::{
    BodyContentCommon, BodyContentSinglePart, BodyStructure, ContentEncoding, SectionPath,
};
use std::fmt;

impl<'a> From<&ContentEncoding<'a>> for TransferEncoding {
    fn from(content_encoding: &ContentEncoding<'a>) -> Self {
        match content_encoding {
            ContentEncoding::SevenBit | ContentEncoding::EightBit | ContentEncoding::Binary => {
                TransferEncoding::Identity
            }
            ContentEncoding::Base64 => TransferEncoding::Base64,
            ContentEncoding::QuotedPrintable => TransferEncoding::QuotedPrintable,
            ContentEncoding::Other(other) => TransferEncoding::Unrecognized(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SegmentPath {
    /// Part numbers from the root of the MIME tree, e.g. `[1, 2]` for the
    /// second subpart of the first part. Empty for a single-part message.
    pub segments: Vec<u32>,
}

impl SegmentPath {
    pub fn new(segments: Vec<u32>) -> Self {
        Self { segments }
    }

    pub fn with_added_segment(&self, segment: u32) -> Self {
        let mut cloned = self.clone();
        cloned.segments.push(segment);
        cloned
    }

    pub fn section_path(&self) -> SectionPath {
        let segments = if self.segments.is_empty() {
            vec![1]
        } else {
            self.segments.clone()
        };

        SectionPath::Part(segments, None)
    }
}

impl fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "1")
        } else {
            write!(
                f,
                "{}",
                self.segments
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(".")
            )
        }
    }
}

/// A `text/plain` or `text/html` leaf found in a BODYSTRUCTURE.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextSection {
    pub kind: TextKind,
    pub path: SegmentPath,
    pub charset: Option<String>,
    pub transfer_encoding: TransferEncoding,
}

impl TextSection {
    pub fn content_type(&self) -> &'static str {
        match self.kind {
            TextKind::Plain => "text/plain",
            TextKind::Html => "text/html",
        }
    }

    /// Pairs the section metadata with the still encoded bytes fetched for it.
    pub fn into_part(self, body: Vec<u8>) -> MimePart {
        MimePart {
            content_type: self.content_type().to_string(),
            charset: self.charset,
            transfer_encoding: self.transfer_encoding,
            body,
        }
    }
}

/// Walks a BODYSTRUCTURE looking for inline text parts.
#[derive(Clone, Debug)]
pub struct SectionExtractor<'a> {
    structure: &'a BodyStructure<'a>,
}

impl<'a> SectionExtractor<'a> {
    pub fn new(structure: &'a BodyStructure<'a>) -> Self {
        Self { structure }
    }

    /// Text leaves in document order. Parts with an `attachment` disposition
    /// are skipped, as are encapsulated `message/rfc822` bodies.
    pub fn text_sections(&self) -> Vec<TextSection> {
        let mut sections = Vec::new();
        Self::recursive_parse_body(self.structure, SegmentPath::default(), &mut sections);
        sections
    }

    #[inline]
    fn parse_body(
        segment: SegmentPath,
        common: &BodyContentCommon<'a>,
        other: &BodyContentSinglePart<'a>,
    ) -> Option<TextSection> {
        if !common.ty.ty.eq_ignore_ascii_case("TEXT") {
            return None;
        }
        let is_attachment = common
            .disposition
            .as_ref()
            .is_some_and(|d| d.ty.eq_ignore_ascii_case("attachment"));
        if is_attachment {
            return None;
        }
        let kind = TextKind::from_media_type(&format!("text/{}", common.ty.subtype))?;

        let charset = common.ty.params.as_ref().and_then(|params| {
            params
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("charset"))
                .map(|(_, value)| value.to_string())
        });

        Some(TextSection {
            kind,
            path: segment,
            charset,
            transfer_encoding: (&other.transfer_encoding).into(),
        })
    }

    fn recursive_parse_body(
        body_structure: &'a BodyStructure<'a>,
        segment: SegmentPath,
        sections: &mut Vec<TextSection>,
    ) {
        match body_structure {
            BodyStructure::Multipart { bodies, .. } => {
                for (i, body) in bodies.iter().enumerate() {
                    Self::recursive_parse_body(
                        body,
                        segment.with_added_segment(i as u32 + 1),
                        sections,
                    );
                }
            }
            BodyStructure::Basic { common, other, .. }
            | BodyStructure::Text { common, other, .. } => {
                sections.extend(Self::parse_body(segment, common, other));
            }
            BodyStructure::Message { .. } => {}
        }
    }
}
