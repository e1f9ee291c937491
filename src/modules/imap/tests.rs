use crate::modules::imap::section::{SectionExtractor, SegmentPath};
use crate::modules::imap::source::parse_headers;
use crate::modules::mime::{TextKind, TransferEncoding};
use imap_proto::{AttributeValue, BodyStructure, Response};

fn with_structure(response: &str, check: impl FnOnce(&BodyStructure<'_>)) {
    let (_, parsed) = imap_proto::parser::parse_response(response.as_bytes())
        .expect("fetch response should parse");
    let Response::Fetch(_, attributes) = parsed else {
        panic!("expected a FETCH response");
    };
    let structure = attributes
        .iter()
        .find_map(|attribute| match attribute {
            AttributeValue::BodyStructure(structure) => Some(structure),
            _ => None,
        })
        .expect("BODYSTRUCTURE attribute");
    check(structure);
}

#[test]
fn single_part_message_maps_to_section_one() {
    with_structure(
        "* 1 FETCH (UID 7 BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"QUOTED-PRINTABLE\" 120 4))\r\n",
        |structure| {
            let sections = SectionExtractor::new(structure).text_sections();
            assert_eq!(sections.len(), 1);
            assert_eq!(sections[0].kind, TextKind::Plain);
            assert_eq!(sections[0].path.to_string(), "1");
            assert_eq!(sections[0].charset.as_deref(), Some("UTF-8"));
            assert_eq!(
                sections[0].transfer_encoding,
                TransferEncoding::QuotedPrintable
            );
        },
    );
}

#[test]
fn alternative_parts_are_found_in_order() {
    with_structure(
        "* 2 FETCH (UID 9 BODYSTRUCTURE ((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 1152 23)(\"TEXT\" \"HTML\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"BASE64\" 4554 73) \"ALTERNATIVE\"))\r\n",
        |structure| {
            let sections = SectionExtractor::new(structure).text_sections();
            let found: Vec<_> = sections
                .iter()
                .map(|s| (s.kind, s.path.to_string(), s.transfer_encoding.clone()))
                .collect();
            assert_eq!(
                found,
                vec![
                    (TextKind::Plain, "1".to_string(), TransferEncoding::Identity),
                    (TextKind::Html, "2".to_string(), TransferEncoding::Base64),
                ]
            );
        },
    );
}

#[test]
fn non_text_parts_are_skipped() {
    with_structure(
        "* 3 FETCH (UID 11 BODYSTRUCTURE ((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 10 1)(\"APPLICATION\" \"PDF\" (\"NAME\" \"a.pdf\") NIL NIL \"BASE64\" 2048) \"MIXED\"))\r\n",
        |structure| {
            let sections = SectionExtractor::new(structure).text_sections();
            assert_eq!(sections.len(), 1);
            assert_eq!(sections[0].content_type(), "text/plain");
        },
    );
}

#[test]
fn segment_path_formats_nested_parts() {
    let path = SegmentPath::default().with_added_segment(1).with_added_segment(2);
    assert_eq!(path.to_string(), "1.2");
    assert_eq!(SegmentPath::new(vec![]).to_string(), "1");
}

#[test]
fn headers_yield_bare_sender_and_subject() {
    let (from, subject) = parse_headers(
        b"From: \"Alice Example\" <Alice@Example.com>\r\nSubject: =?UTF-8?B?SGVsbG8=?=\r\n\r\n",
    );
    assert_eq!(from.as_deref(), Some("Alice@Example.com"));
    assert_eq!(subject.as_deref(), Some("Hello"));
}

#[test]
fn missing_from_header_yields_none() {
    let (from, subject) = parse_headers(b"Subject: no sender\r\n\r\n");
    assert_eq!(from, None);
    assert_eq!(subject.as_deref(), Some("no sender"));
}

#[tokio::test]
async fn greeting_is_read_from_server() {
    use crate::modules::imap::client::read_greeting;
    use tokio::io::AsyncWriteExt;

    let (client_end, mut server_end) = tokio::io::duplex(256);
    server_end
        .write_all(b"* OK IMAP4rev1 ready\r\n")
        .await
        .unwrap();
    let mut client = async_imap::Client::new(client_end);
    assert!(read_greeting(&mut client).await.is_ok());
}

#[tokio::test]
async fn closed_stream_before_greeting_fails() {
    use crate::modules::error::code::ErrorCode;
    use crate::modules::imap::client::read_greeting;

    let (client_end, server_end) = tokio::io::duplex(256);
    drop(server_end);
    let mut client = async_imap::Client::new(client_end);
    let error = read_greeting(&mut client).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::ImapCommandFailed);
}
