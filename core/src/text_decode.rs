//! Text decoding for container entries.
//!
//! Entries written by different tool versions disagree on encoding: some are
//! UTF-16 LE with a BOM, some UTF-16 without one, some UTF-8 with or without a
//! BOM. Decoding never aborts; when nothing else fits, bytes are mapped through
//! Windows-1252 so every byte survives as some character.

use serde_json::Value;
use thiserror::Error;

use crate::error_codes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Windows1252,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
    pub had_bom: bool,
    /// True when invalid sequences were replaced with U+FFFD.
    pub had_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("entry '{path}' is empty after decoding")]
    Empty { path: String },
    #[error("entry '{path}' ({encoding:?}) is not valid JSON at line {line}, column {column}: {message}")]
    Json {
        path: String,
        encoding: TextEncoding,
        line: usize,
        column: usize,
        message: String,
    },
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::Empty { .. } => error_codes::DECODE_EMPTY,
            DecodeError::Json { .. } => error_codes::DECODE_JSON,
        }
    }
}

const BOMS: &[(&[u8], TextEncoding)] = &[
    (&[0xFF, 0xFE, 0x00, 0x00], TextEncoding::Utf32Le),
    (&[0x00, 0x00, 0xFE, 0xFF], TextEncoding::Utf32Be),
    (&[0xEF, 0xBB, 0xBF], TextEncoding::Utf8),
    (&[0xFF, 0xFE], TextEncoding::Utf16Le),
    (&[0xFE, 0xFF], TextEncoding::Utf16Be),
];

/// Splits a leading byte-order mark off `bytes`, if any.
pub fn strip_bom(bytes: &[u8]) -> (&[u8], Option<TextEncoding>) {
    for (bom, encoding) in BOMS {
        if let Some(rest) = bytes.strip_prefix(*bom) {
            return (rest, Some(*encoding));
        }
    }
    (bytes, None)
}

pub fn decode_text(bytes: &[u8]) -> DecodedText {
    let (body, bom) = strip_bom(bytes);
    let had_bom = bom.is_some();

    let encoding = match bom {
        Some(encoding) => encoding,
        None => sniff_bomless_utf16(body).unwrap_or(TextEncoding::Utf8),
    };

    let (text, had_errors, encoding) = match encoding {
        TextEncoding::Utf8 => match std::str::from_utf8(body) {
            Ok(s) => (s.to_string(), false, TextEncoding::Utf8),
            Err(_) if had_bom => {
                let (cow, errors) = encoding_rs::UTF_8.decode_without_bom_handling(body);
                (cow.into_owned(), errors, TextEncoding::Utf8)
            }
            Err(_) => {
                let (cow, errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(body);
                (cow.into_owned(), errors, TextEncoding::Windows1252)
            }
        },
        TextEncoding::Utf16Le => {
            let (cow, errors) = encoding_rs::UTF_16LE.decode_without_bom_handling(body);
            (cow.into_owned(), errors, encoding)
        }
        TextEncoding::Utf16Be => {
            let (cow, errors) = encoding_rs::UTF_16BE.decode_without_bom_handling(body);
            (cow.into_owned(), errors, encoding)
        }
        TextEncoding::Utf32Le | TextEncoding::Utf32Be => {
            let (s, errors) = decode_utf32(body, encoding == TextEncoding::Utf32Le);
            (s, errors, encoding)
        }
        TextEncoding::Windows1252 => {
            let (cow, errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(body);
            (cow.into_owned(), errors, encoding)
        }
    };

    if had_errors {
        log::debug!("text decoded as {:?} with replacement characters", encoding);
    }

    DecodedText {
        text,
        encoding,
        had_bom,
        had_errors,
    }
}

/// Decodes an entry and parses it as a JSON document.
///
/// Anything before the first `{` or `[` is skipped; some writers emit stray
/// characters ahead of the document.
pub fn decode_json_document(path: &str, bytes: &[u8]) -> Result<(Value, DecodedText), DecodeError> {
    let decoded = decode_text(bytes);
    let body = document_start(&decoded.text);
    if body.trim().is_empty() {
        return Err(DecodeError::Empty {
            path: path.to_string(),
        });
    }

    match serde_json::from_str::<Value>(body) {
        Ok(value) => Ok((value, decoded)),
        Err(e) => Err(DecodeError::Json {
            path: path.to_string(),
            encoding: decoded.encoding,
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }),
    }
}

fn document_start(text: &str) -> &str {
    match text.find(['{', '[']) {
        Some(idx) => &text[idx..],
        None => text.trim(),
    }
}

/// Recognises UTF-16 without a BOM by where the zero bytes fall.
///
/// Model documents are overwhelmingly ASCII, so every other byte of a UTF-16
/// stream is zero.
fn sniff_bomless_utf16(body: &[u8]) -> Option<TextEncoding> {
    let window = &body[..body.len().min(256) & !1];
    if window.len() < 4 {
        return None;
    }

    let pairs = window.len() / 2;
    let mut zero_even = 0usize;
    let mut zero_odd = 0usize;
    for pair in window.chunks_exact(2) {
        if pair[0] == 0 {
            zero_even += 1;
        }
        if pair[1] == 0 {
            zero_odd += 1;
        }
    }

    let threshold = pairs * 2 / 5;
    if zero_odd > threshold && zero_even * 10 < pairs {
        Some(TextEncoding::Utf16Le)
    } else if zero_even > threshold && zero_odd * 10 < pairs {
        Some(TextEncoding::Utf16Be)
    } else {
        None
    }
}

fn decode_utf32(body: &[u8], little_endian: bool) -> (String, bool) {
    let mut out = String::with_capacity(body.len() / 4);
    let mut had_errors = body.len() % 4 != 0;
    for chunk in body.chunks_exact(4) {
        let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let unit = if little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        };
        match char::from_u32(unit) {
            Some(ch) => out.push(ch),
            None => {
                out.push(char::REPLACEMENT_CHARACTER);
                had_errors = true;
            }
        }
    }
    (out, had_errors)
}
