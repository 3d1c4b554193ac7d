use std::fmt::Write as _;

use super::DetectedSymbol;

const SYMBOLOGY_LABELS: [(&str, &str); 12] = [
    ("AZTEC", "Aztec码"),
    ("CODE128", "Code 128条形码"),
    ("CODE39", "Code 39条形码"),
    ("CODE93", "Code 93条形码"),
    ("DATA MATRIX", "Data Matrix码"),
    ("EAN13", "EAN-13条形码"),
    ("EAN8", "EAN-8条形码"),
    ("ITF", "ITF条形码"),
    ("PDF417", "PDF417码"),
    ("QRCODE", "二维码"),
    ("UPC-A", "UPC-A条形码"),
    ("UPC-E", "UPC-E条形码"),
];

/// Human readable label for a raw symbology identifier. Unknown identifiers
/// are returned unchanged.
pub fn symbology_label(raw: &str) -> &str {
    SYMBOLOGY_LABELS
        .iter()
        .find(|(id, _)| *id == raw)
        .map(|(_, label)| *label)
        .unwrap_or(raw)
}

/// UTF-8 text of a payload, or a byte literal when it is not valid UTF-8.
pub fn payload_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => byte_literal(payload),
    }
}

/// `b'...'` literal of raw bytes. Double quotes delimit the literal when the
/// bytes hold a single quote and no double quote.
fn byte_literal(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            _ if char::from(byte) == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push(quote);
    out
}

pub fn format_symbols(symbols: &[DetectedSymbol]) -> String {
    symbols
        .iter()
        .map(|symbol| {
            format!(
                "[{}]\n{}",
                symbology_label(&symbol.symbology),
                payload_text(&symbol.payload)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_symbologies() {
        assert_eq!(symbology_label("QRCODE"), "二维码");
        assert_eq!(symbology_label("EAN13"), "EAN-13条形码");
        assert_eq!(symbology_label("DATA MATRIX"), "Data Matrix码");
    }

    #[test]
    fn unknown_symbology_passes_through() {
        assert_eq!(symbology_label("CODABAR"), "CODABAR");
    }

    #[test]
    fn invalid_utf8_falls_back_to_byte_literal() {
        assert_eq!(payload_text("链接".as_bytes()), "链接");
        assert_eq!(payload_text(&[0x61, 0xff, 0x00, 0x7f]), r"b'a\xff\x00\x7f'");
    }

    #[test]
    fn byte_literal_switches_quotes_around_single_quote() {
        assert_eq!(payload_text(&[0x61, 0xff, b'\'']), r#"b"a\xff'""#);
        assert_eq!(payload_text(&[0xff, b'"']), r#"b'\xff"'"#);
        assert_eq!(payload_text(&[0xff, b'\'', b'"']), r#"b'\xff\'"'"#);
    }

    #[test]
    fn byte_literal_escapes_whitespace_and_backslash() {
        assert_eq!(
            payload_text(&[0xfe, b'\t', b'\n', b'\r', b'\\', 0x1b]),
            r"b'\xfe\t\n\r\\\x1b'"
        );
    }

    #[test]
    fn joins_multiple_symbols_with_blank_line() {
        let content = format_symbols(&[
            DetectedSymbol::new("QRCODE", "https://example.com"),
            DetectedSymbol::new("EAN13", "4006381333931"),
        ]);
        assert_eq!(
            content,
            "[二维码]\nhttps://example.com\n\n[EAN-13条形码]\n4006381333931"
        );
    }

    #[test]
    fn no_symbols_formats_to_empty_string() {
        assert_eq!(format_symbols(&[]), "");
    }
}
