//! Text encoding policy for the flat files: write BOM-prefixed UTF-8, read
//! UTF-8 first and fall back to a configured legacy encoding.

use std::borrow::Cow;

use encoding_rs::Encoding;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which decoding path produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Utf8,
    Legacy,
}

/// Resolve a WHATWG label (`euc-kr`, `shift_jis`, ...) to a decoder, falling back to EUC-KR.
pub fn legacy_encoding(label: &str) -> &'static Encoding {
    Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::EUC_KR)
}

pub fn decode_text<'a>(bytes: &'a [u8], legacy: &'static Encoding) -> (Cow<'a, str>, Decoded) {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => (Cow::Borrowed(text), Decoded::Utf8),
        Err(_) => {
            let (text, had_errors) = legacy.decode_without_bom_handling(body);
            if had_errors {
                tracing::warn!(
                    "Text is neither UTF-8 nor clean {}; unmappable bytes were replaced",
                    legacy.name()
                );
            }
            (text, Decoded::Legacy)
        }
    }
}

pub fn encode_with_bom(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(UTF8_BOM.len() + body.len());
    out.extend_from_slice(UTF8_BOM);
    out.extend_from_slice(body);
    out
}
