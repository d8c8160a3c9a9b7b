//! Response body decoding.
//!
//! Encoding is picked in this order: byte-order mark, `charset` parameter of
//! the `Content-Type` header, a `<meta>` declaration in the first KiB of the
//! body, then UTF-8.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use regex::bytes::Regex;
use std::sync::OnceLock;

const META_SNIFF_BYTES: usize = 1024;

fn meta_charset_regex() -> Option<&'static Regex> {
    static META: OnceLock<Option<Regex>> = OnceLock::new();
    META.get_or_init(|| {
        // Covers both `<meta charset=..>` and the `http-equiv` content form.
        Regex::new(r#"(?i)<meta\b[^>]*?charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).ok()
    })
    .as_ref()
}

/// Encoding named by the `charset` parameter of a `Content-Type` value.
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let label = value.trim().trim_matches(|c| c == '"' || c == '\'');
        Encoding::for_label(label.as_bytes())
    })
}

/// Encoding declared by a `<meta>` tag near the start of the document.
pub fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_SNIFF_BYTES)];
    let caps = meta_charset_regex()?.captures(head)?;
    let encoding = Encoding::for_label(caps.get(1)?.as_bytes())?;
    // A document that can carry an ASCII meta tag is not UTF-16.
    if encoding == UTF_16LE || encoding == UTF_16BE {
        return Some(UTF_8);
    }
    Some(encoding)
}

/// Decode `body` to text, returning the encoding actually used.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> (String, &'static Encoding) {
    let declared = content_type
        .and_then(charset_from_content_type)
        .or_else(|| sniff_meta_charset(body))
        .unwrap_or(UTF_8);
    // `decode` lets a BOM override the declared encoding.
    let (text, used, had_errors) = declared.decode(body);
    if had_errors {
        tracing::debug!(target: "http", encoding = used.name(), "http.decode.replacement_chars");
    }
    (text.into_owned(), used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{SHIFT_JIS, WINDOWS_1252};

    #[test]
    fn header_charset_is_parsed_case_insensitively() {
        assert_eq!(
            charset_from_content_type("text/html; Charset=\"Shift_JIS\""),
            Some(SHIFT_JIS)
        );
        assert_eq!(charset_from_content_type("text/html"), None);
        assert_eq!(charset_from_content_type("text/html; charset=bogus"), None);
    }

    #[test]
    fn meta_declarations_are_sniffed() {
        let html5 = br#"<html><head><meta charset="iso-8859-1"></head>"#;
        assert_eq!(sniff_meta_charset(html5), Some(WINDOWS_1252));

        let legacy =
            br#"<meta http-equiv="Content-Type" content="text/html; charset=shift_jis">"#;
        assert_eq!(sniff_meta_charset(legacy), Some(SHIFT_JIS));

        assert_eq!(sniff_meta_charset(b"<meta charset=utf-16>"), Some(UTF_8));
    }

    #[test]
    fn meta_after_the_first_kib_is_ignored() {
        let mut body = vec![b' '; META_SNIFF_BYTES];
        body.extend_from_slice(b"<meta charset=shift_jis>");
        assert_eq!(sniff_meta_charset(&body), None);
    }

    #[test]
    fn header_wins_over_meta_and_bom_wins_over_header() {
        let latin = b"<meta charset=shift_jis><p>caf\xe9</p>";
        let (text, used) = decode_body(latin, Some("text/html; charset=windows-1252"));
        assert_eq!(used, WINDOWS_1252);
        assert!(text.contains("café"));

        let mut utf16: Vec<u8> = vec![0xFF, 0xFE];
        for unit in "<p>hé</p>".encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, used) = decode_body(&utf16, Some("text/html; charset=iso-8859-1"));
        assert_eq!(used, UTF_16LE);
        assert_eq!(text, "<p>hé</p>");
    }

    #[test]
    fn defaults_to_utf8() {
        let (text, used) = decode_body("<p>ünïcode</p>".as_bytes(), None);
        assert_eq!(used, UTF_8);
        assert_eq!(text, "<p>ünïcode</p>");
    }
}
