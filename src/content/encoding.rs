//! Character encoding detection and conversion

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

/// Number of non-ASCII bytes after which a statistical guess gets full weight
const EVIDENCE_BYTES: f32 = 16.0;

/// Label reported when conversion had to fall back to lossy UTF-8
pub const UNKNOWN_ENCODING: &str = "unknown";

/// An encoding guess and how much it can be trusted
#[derive(Debug, Clone, Copy)]
pub struct EncodingGuess {
    pub encoding: &'static Encoding,
    pub confidence: f32,
}

/// Guesses the encoding of raw bytes
///
/// A byte-order mark or valid UTF-8 is certain. Anything else goes through
/// `chardetng`; confidence is the share of characters that decode cleanly,
/// scaled down when there are too few non-ASCII bytes to tell legacy
/// encodings apart.
pub fn guess_encoding(bytes: &[u8]) -> EncodingGuess {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return EncodingGuess {
            encoding,
            confidence: 1.0,
        };
    }

    if std::str::from_utf8(bytes).is_ok() {
        return EncodingGuess {
            encoding: UTF_8,
            confidence: 1.0,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    let (decoded, _) = encoding.decode_without_bom_handling(bytes);
    let mut total = 0usize;
    let mut suspicious = 0usize;
    for c in decoded.chars() {
        total += 1;
        if c == char::REPLACEMENT_CHARACTER
            || (c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0c'))
        {
            suspicious += 1;
        }
    }

    let clean = if total == 0 {
        0.0
    } else {
        1.0 - suspicious as f32 / total as f32
    };
    let non_ascii = bytes.iter().filter(|b| !b.is_ascii()).count() as f32;
    let evidence = (non_ascii / EVIDENCE_BYTES).min(1.0);

    EncodingGuess {
        encoding,
        confidence: clean * evidence,
    }
}

/// Detects an encoding, falling back when the guess is not confident enough
///
/// Never fails; the fallback label is resolved through `encoding_rs` and
/// UTF-8 is used if even that is unknown.
pub fn detect_encoding(bytes: &[u8], min_confidence: f32, fallback: &str) -> &'static Encoding {
    let guess = guess_encoding(bytes);
    if guess.confidence >= min_confidence {
        return guess.encoding;
    }

    tracing::debug!(
        "Encoding guess {} below confidence threshold ({:.2} < {:.2}), using {}",
        guess.encoding.name(),
        guess.confidence,
        min_confidence,
        fallback
    );
    Encoding::for_label(fallback.as_bytes()).unwrap_or(UTF_8)
}

/// Decodes `bytes` from the detected encoding, round-tripping through
/// `target` when it differs
///
/// Returns the text and the name of the source encoding. Any failure
/// (undecodable input, unknown target, unmappable characters) yields a lossy
/// UTF-8 decode and the source name `"unknown"`.
pub fn convert_encoding(
    bytes: &[u8],
    target: &str,
    min_confidence: f32,
    fallback: &str,
) -> (String, String) {
    let source = detect_encoding(bytes, min_confidence, fallback);
    match try_convert(bytes, source, target) {
        Some(text) => (text, source.name().to_string()),
        None => {
            tracing::debug!(
                "Encoding conversion {} -> {} failed, decoding lossily",
                source.name(),
                target
            );
            (
                String::from_utf8_lossy(strip_bom(bytes)).into_owned(),
                UNKNOWN_ENCODING.to_string(),
            )
        }
    }
}

/// The `charset` parameter of a Content-Type header value, if present
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
            .filter(|value| !value.is_empty())
    })
}

/// Decodes a fetched text body to UTF-8
///
/// A byte-order mark wins, then a `declared` charset known to `encoding_rs`;
/// otherwise the encoding is detected as in [`convert_encoding`].
pub fn decode_text(
    bytes: &[u8],
    declared: Option<&str>,
    min_confidence: f32,
    fallback: &str,
) -> String {
    if let Some(encoding) = declared.and_then(|label| Encoding::for_label(label.as_bytes())) {
        let (text, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            tracing::debug!("Body is not valid {}, replacing bad sequences", used.name());
        }
        return text.into_owned();
    }
    convert_encoding(bytes, UTF_8.name(), min_confidence, fallback).0
}

fn try_convert(bytes: &[u8], source: &'static Encoding, target: &str) -> Option<String> {
    let target = Encoding::for_label(target.as_bytes())?;
    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == source => &bytes[bom_len..],
        _ => bytes,
    };

    let decoded = source
        .decode_without_bom_handling_and_without_replacement(body)?
        .into_owned();

    if source == target {
        return Some(decoded);
    }

    let (encoded, used, unmappable) = target.encode(&decoded);
    if unmappable {
        return None;
    }

    used.decode_without_bom_handling_and_without_replacement(&encoded)
        .map(|text| text.into_owned())
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    match Encoding::for_bom(bytes) {
        Some((_, bom_len)) => &bytes[bom_len..],
        None => bytes,
    }
}
