//! XML Encoding Detection and Conversion
//!
//! Input side: detection of UTF-16 based on BOM and byte patterns, converting
//! to UTF-8 before tokenizing.
//!
//! Output side: the encodings a writer can target, and per-character
//! encodability checks used to substitute numeric character references.

use crate::error::{BindError, Result};
use std::io::{self, Write};

/// Detect the encoding of XML input based on BOM or byte patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // No BOM - check for UTF-16 pattern (< followed by null or null followed by <)
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }
}

/// Convert input bytes to UTF-8 text
///
/// UTF-8 input (with or without BOM) is validated and passed through.
pub fn convert_to_utf8(input: &[u8]) -> Result<String> {
    match XmlEncoding::detect(input) {
        XmlEncoding::Utf8 => {
            let body = input.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(input);
            String::from_utf8(body.to_vec())
                .map_err(|e| BindError::Encoding(format!("invalid UTF-8: {}", e)))
        }
        XmlEncoding::Utf16Le => convert_utf16(input, &[0xFF, 0xFE], u16::from_le_bytes, "LE"),
        XmlEncoding::Utf16Be => convert_utf16(input, &[0xFE, 0xFF], u16::from_be_bytes, "BE"),
    }
}

fn convert_utf16(
    input: &[u8],
    bom: &[u8],
    unit: fn([u8; 2]) -> u16,
    label: &str,
) -> Result<String> {
    let bytes = input.strip_prefix(bom).unwrap_or(input);

    if bytes.len() % 2 != 0 {
        return Err(BindError::Encoding(format!(
            "invalid UTF-16 {}: odd number of bytes",
            label
        )));
    }

    let code_units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| unit([chunk[0], chunk[1]]))
        .collect();

    String::from_utf16(&code_units)
        .map_err(|e| BindError::Encoding(format!("invalid UTF-16 {}: {}", label, e)))
}

/// Character encoding of writer output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    #[default]
    Utf8,
    /// US-ASCII: code points above 0x7F become character references
    Ascii,
    /// ISO-8859-1: code points above 0xFF become character references
    Latin1,
}

impl OutputEncoding {
    /// Name used in the XML declaration
    pub fn label(self) -> &'static str {
        match self {
            OutputEncoding::Utf8 => "UTF-8",
            OutputEncoding::Ascii => "US-ASCII",
            OutputEncoding::Latin1 => "ISO-8859-1",
        }
    }

    #[inline]
    pub fn can_encode(self, c: char) -> bool {
        match self {
            OutputEncoding::Utf8 => true,
            OutputEncoding::Ascii => c.is_ascii(),
            OutputEncoding::Latin1 => (c as u32) <= 0xFF,
        }
    }

    #[inline]
    pub fn encodes_str(self, s: &str) -> bool {
        match self {
            OutputEncoding::Utf8 => true,
            OutputEncoding::Ascii => s.is_ascii(),
            OutputEncoding::Latin1 => s.chars().all(|c| (c as u32) <= 0xFF),
        }
    }

    /// Append `c`, substituting a character reference when unencodable
    pub fn push_char(self, c: char, buf: &mut Vec<u8>) {
        match self {
            OutputEncoding::Utf8 => {
                let mut tmp = [0u8; 4];
                buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
            _ if self.can_encode(c) => buf.push(c as u32 as u8),
            _ => buf.extend_from_slice(format!("&#{};", c as u32).as_bytes()),
        }
    }

    /// Write a string known to be encodable
    pub fn write_str<W: Write + ?Sized>(self, out: &mut W, s: &str) -> io::Result<()> {
        match self {
            OutputEncoding::Utf8 | OutputEncoding::Ascii => out.write_all(s.as_bytes()),
            OutputEncoding::Latin1 => {
                let bytes: Vec<u8> = s.chars().map(|c| c as u32 as u8).collect();
                out.write_all(&bytes)
            }
        }
    }

    /// Write markup (names), which cannot use character references
    pub fn write_markup<W: Write + ?Sized>(self, out: &mut W, s: &str) -> Result<()> {
        if !self.encodes_str(s) {
            return Err(BindError::Encoding(format!(
                "name {:?} cannot be represented in {}",
                s,
                self.label()
            )));
        }
        self.write_str(out, s)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(XmlEncoding::detect(b"<root/>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(&[0xEF, 0xBB, 0xBF, b'<']), XmlEncoding::Utf8);
    }

    #[test]
    fn test_detect_utf16() {
        assert_eq!(XmlEncoding::detect(&[0xFF, 0xFE, b'<', 0x00]), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(&[0xFE, 0xFF, 0x00, b'<']), XmlEncoding::Utf16Be);
        assert_eq!(XmlEncoding::detect(&[b'<', 0x00]), XmlEncoding::Utf16Le);
    }

    #[test]
    fn test_convert_utf16_le() {
        // "<r/>" in UTF-16 LE with BOM
        let utf16_le = [0xFF, 0xFE, b'<', 0x00, b'r', 0x00, b'/', 0x00, b'>', 0x00];
        assert_eq!(convert_to_utf8(&utf16_le).unwrap(), "<r/>");
    }

    #[test]
    fn test_convert_utf16_be() {
        let utf16_be = [0xFE, 0xFF, 0x00, b'<', 0x00, b'r', 0x00, b'/', 0x00, b'>'];
        assert_eq!(convert_to_utf8(&utf16_be).unwrap(), "<r/>");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        assert_eq!(convert_to_utf8(b"\xEF\xBB\xBF<a/>").unwrap(), "<a/>");
    }

    #[test]
    fn test_odd_utf16_rejected() {
        let err = convert_to_utf8(&[0xFF, 0xFE, b'<']).unwrap_err();
        assert!(matches!(err, BindError::Encoding(_)));
    }

    #[test]
    fn test_push_char_substitutes() {
        let mut buf = Vec::new();
        OutputEncoding::Ascii.push_char('é', &mut buf);
        OutputEncoding::Latin1.push_char('é', &mut buf);
        OutputEncoding::Latin1.push_char('€', &mut buf);
        assert_eq!(buf, b"&#233;\xE9&#8364;");
    }

    #[test]
    fn test_markup_must_be_encodable() {
        let mut out = Vec::new();
        assert!(OutputEncoding::Ascii.write_markup(&mut out, "größe").is_err());
        assert!(OutputEncoding::Latin1.write_markup(&mut out, "größe").is_ok());
        assert_eq!(out, b"gr\xF6\xDFe");
    }
}
