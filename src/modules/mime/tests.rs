use super::*;

fn part(content_type: &str, encoding: TransferEncoding, body: &str) -> MimePart {
    MimePart {
        content_type: content_type.into(),
        charset: None,
        transfer_encoding: encoding,
        body: body.as_bytes().to_vec(),
    }
}

#[test]
fn base64_plain_section_is_decoded() {
    let raw = "--b\r\nContent-Type: text/plain\r\nContent-Transfer-Encoding: base64\r\n\r\nSGVsbG8sIHdvcmxkIQ==\r\n--b--\r\n";
    let text = extract_text(&MailBody::Raw(raw.as_bytes().to_vec()));
    assert_eq!(text.plain_text, "Hello, world!");
    assert_eq!(text.html_text, "");
}

#[test]
fn plain_and_html_are_both_extracted() {
    let raw = concat!(
        "preamble is ignored\n",
        "--sep\n",
        "Content-Type: text/plain; charset=utf-8\n",
        "\n",
        "first line\n",
        "second line\n",
        "--sep\n",
        "Content-Type: text/html\n",
        "Content-Transfer-Encoding: base64\n",
        "\n",
        "PGI+aGk8L2I+\n",
        "--sep--\n",
        "epilogue\n",
    );
    let text = extract_text(&MailBody::Raw(raw.as_bytes().to_vec()));
    assert_eq!(text.plain_text, "first line\nsecond line");
    assert_eq!(text.html_text, "<b>hi</b>");
}

#[test]
fn body_without_sections_yields_nothing() {
    let text = extract_text(&MailBody::Raw(b"just a plain body\nwith two lines\n".to_vec()));
    assert_eq!(text, ExtractedText::default());
    assert!(scanner::scan_sections(b"").is_empty());
}

#[test]
fn invalid_utf8_does_not_panic() {
    let mut raw = b"--b\nContent-Type: text/plain\n\nbad \xff\xfe bytes\n--b--\n".to_vec();
    let text = extract_text(&MailBody::Raw(raw.clone()));
    assert!(text.plain_text.starts_with("bad "));
    assert!(text.plain_text.contains('\u{FFFD}'));

    raw = vec![0xff, 0x00, 0x80, b'\n', b'-', b'-'];
    let _ = extract_text(&MailBody::Raw(raw));
}

#[test]
fn undecodable_base64_only_affects_its_section() {
    let raw = concat!(
        "--b\n",
        "Content-Type: text/plain\n",
        "Content-Transfer-Encoding: base64\n",
        "\n",
        "!!!not base64!!!\n",
        "--b\n",
        "Content-Type: text/html\n",
        "\n",
        "<p>ok</p>\n",
        "--b--\n",
    );
    let text = extract_text(&MailBody::Raw(raw.as_bytes().to_vec()));
    assert_eq!(text.plain_text, "");
    assert_eq!(text.html_text, "<p>ok</p>");
}

#[test]
fn base64_payload_with_invalid_utf8_is_replaced() {
    // Decodes to 0xFF 0xFE 0xFD, which also looks like a UTF-16LE byte order mark.
    let raw = "--b\r\nContent-Type: text/plain\r\nContent-Transfer-Encoding: base64\r\n\r\n//79\r\n--b--\r\n";
    let text = extract_text(&MailBody::Raw(raw.as_bytes().to_vec()));
    assert_eq!(text.plain_text, "\u{FFFD}\u{FFFD}\u{FFFD}");
    assert_eq!(decode::decode_charset(b"\xEF\xBB\xBFhi", None), "hi");
}

#[test]
fn quoted_printable_section_is_decoded() {
    let raw = concat!(
        "--b\n",
        "Content-Type: text/plain; charset=\"utf-8\"\n",
        "Content-Transfer-Encoding: quoted-printable\n",
        "\n",
        "caf=C3=A9 au lait\n",
        "--b--\n",
    );
    let text = extract_text(&MailBody::Raw(raw.as_bytes().to_vec()));
    assert_eq!(text.plain_text, "café au lait");
}

#[test]
fn unrecognized_encoding_passes_through() {
    let parts = vec![part(
        "text/plain",
        TransferEncoding::from_header("x-custom"),
        "as is",
    )];
    let text = extract_text(&MailBody::Parts(parts));
    assert_eq!(text.plain_text, "as is");
}

#[test]
fn nested_multipart_sections_are_split() {
    let raw = concat!(
        "--outer\n",
        "Content-Type: multipart/alternative;\n",
        " boundary=\"inner\"\n",
        "\n",
        "--inner\n",
        "Content-Type: text/plain\n",
        "\n",
        "nested plain\n",
        "--inner\n",
        "Content-Type: text/html\n",
        "\n",
        "<i>nested</i>\n",
        "--inner--\n",
        "--outer\n",
        "Content-Type: application/pdf\n",
        "Content-Transfer-Encoding: base64\n",
        "\n",
        "JVBERi0=\n",
        "--outer--\n",
    );
    let sections = scanner::scan_sections(raw.as_bytes());
    let types: Vec<_> = sections.iter().map(|s| s.content_type.as_str()).collect();
    assert_eq!(
        types,
        ["multipart/alternative", "text/plain", "text/html", "application/pdf"]
    );

    let text = extract_text(&MailBody::Raw(raw.as_bytes().to_vec()));
    assert_eq!(text.plain_text, "nested plain");
    assert_eq!(text.html_text, "<i>nested</i>");
}

#[test]
fn unterminated_section_runs_to_end_of_input() {
    let raw = "--b\nContent-Type: text/plain\n\ntrailing text";
    let text = extract_text(&MailBody::Raw(raw.as_bytes().to_vec()));
    assert_eq!(text.plain_text, "trailing text");
}

#[test]
fn section_without_content_type_is_not_text() {
    let raw = "--b\nContent-Transfer-Encoding: 7bit\n\nno type here\n--b--\n";
    let text = extract_text(&MailBody::Raw(raw.as_bytes().to_vec()));
    assert_eq!(text.plain_text, "");
}

#[test]
fn first_part_of_each_kind_wins() {
    let parts = vec![
        part("text/plain", TransferEncoding::Identity, "one"),
        part("TEXT/PLAIN", TransferEncoding::Identity, "two"),
    ];
    assert_eq!(extract_text(&MailBody::Parts(parts)).plain_text, "one");
}

#[test]
fn declared_charset_is_honoured() {
    let mut latin = part("text/plain", TransferEncoding::Identity, "");
    latin.charset = Some("iso-8859-1".into());
    latin.body = vec![b'n', 0xe9, b'e'];
    assert_eq!(extract_text(&MailBody::Parts(vec![latin])).plain_text, "née");
}
