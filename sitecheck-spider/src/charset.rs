use std::borrow::Cow;
use std::sync::OnceLock;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, WINDOWS_1252};

/// Which rule produced the charset decision, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSource {
    XmlPreamble,
    ContentTypeHeader,
    Detected,
    Fallback,
}

fn xml_preamble_re() -> &'static regex::bytes::Regex {
    static RE: OnceLock<regex::bytes::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::bytes::Regex::new(r#"(?i)^<\?xml[^>]+encoding="([^"]+)""#)
            .expect("static regex")
    })
}

/// Charset label from an XML declaration at the very start of the body.
fn xml_preamble_charset(body: &[u8]) -> Option<&str> {
    let captures = xml_preamble_re().captures(body)?;
    std::str::from_utf8(captures.get(1)?.as_bytes()).ok()
}

/// The `charset` parameter of a Content-Type header value, if any.
fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

/// Decide how to decode a text/html body. First match wins: a document
/// XML declaration, then the Content-Type charset parameter, then
/// byte-distribution detection, then windows-1252. Labels the encoder
/// doesn't know fall through to the next rule.
pub fn resolve(content_type: Option<&str>, body: &[u8]) -> (&'static Encoding, CharsetSource) {
    if let Some(encoding) = xml_preamble_charset(body)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return (encoding, CharsetSource::XmlPreamble);
    }

    if let Some(encoding) = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return (encoding, CharsetSource::ContentTypeHeader);
    }

    if body.is_empty() {
        return (WINDOWS_1252, CharsetSource::Fallback);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(body, true);
    (detector.guess(None, true), CharsetSource::Detected)
}

/// Strict decode: `None` when the body is malformed for the encoding.
pub fn decode(body: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(Cow::into_owned)
}

fn is_control_junk(c: char) -> bool {
    match c {
        '\t' | '\n' | '\x0b' | '\x0c' | '\r' => false,
        c if c < ' ' => true,
        '\u{7f}'..='\u{9f}' => true,
        _ => false,
    }
}

/// Replace C0 controls (other than tab/LF/VT/FF/CR) and the C1 range with
/// spaces. Returns the cleaned text and how many characters were junked,
/// so callers can warn without clogging reports over common whitespace.
pub fn sanitize_control_chars(text: &str) -> (Cow<'_, str>, usize) {
    if !text.chars().any(is_control_junk) {
        return (Cow::Borrowed(text), 0);
    }

    let mut junked = 0;
    let cleaned = text
        .chars()
        .map(|c| {
            if is_control_junk(c) {
                junked += 1;
                ' '
            } else {
                c
            }
        })
        .collect();
    (Cow::Owned(cleaned), junked)
}
