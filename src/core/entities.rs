//! XML Entity Handling
//!
//! Decoding of entity references reported by the tokenizer, and escaping of
//! text and attribute values on output:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Output escaping replaces characters the target encoding cannot represent
//! with numeric character references instead of failing.

use super::encoding::OutputEncoding;
use memchr::{memchr2, memchr3, memmem};
use std::io::{self, Write};

/// Which characters to escape when writing character data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Write verbatim (encoding substitution still applies)
    None,
    /// Text content: `<`, `&`, and `>` when it closes `]]>`
    Text,
    /// Attribute values: text rules plus `"`
    Attribute,
}

/// Resolve an entity reference body (without `&` and `;`)
///
/// Returns `None` for unknown named entities.
pub fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(numeric) = entity.strip_prefix('#') {
        return decode_numeric_entity(numeric);
    }
    let resolved = match entity {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "quot" => "\"",
        "apos" => "'",
        _ => return None,
    };
    Some(resolved.to_string())
}

/// Decode a numeric character reference body (after `#`)
fn decode_numeric_entity(entity: &str) -> Option<String> {
    let codepoint = match entity.strip_prefix('x').or_else(|| entity.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => entity.parse::<u32>().ok()?,
    };
    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint).map(|c| c.to_string())
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Whether `text` contains anything `mode` would escape
#[inline]
fn needs_escape(text: &str, mode: Escape) -> bool {
    let bytes = text.as_bytes();
    match mode {
        Escape::None => false,
        Escape::Text => memchr2(b'<', b'&', bytes).is_some() || memmem::find(bytes, b"]]>").is_some(),
        Escape::Attribute => {
            memchr3(b'<', b'&', b'"', bytes).is_some() || memmem::find(bytes, b"]]>").is_some()
        }
    }
}

/// Write `text` escaped for `mode` in the given output encoding
pub fn write_escaped<W: Write + ?Sized>(
    out: &mut W,
    text: &str,
    mode: Escape,
    encoding: OutputEncoding,
) -> io::Result<()> {
    // Fast path: nothing to escape and every char encodes as-is
    if !needs_escape(text, mode) && encoding.encodes_str(text) {
        return encoding.write_str(out, text);
    }

    let mut buf = Vec::with_capacity(text.len() + 16);
    for (i, c) in text.char_indices() {
        match c {
            '<' if mode != Escape::None => buf.extend_from_slice(b"&lt;"),
            '&' if mode != Escape::None => buf.extend_from_slice(b"&amp;"),
            '"' if mode == Escape::Attribute => buf.extend_from_slice(b"&quot;"),
            '>' if mode != Escape::None && text[..i].ends_with("]]") => {
                buf.extend_from_slice(b"&gt;")
            }
            _ => encoding.push_char(c, &mut buf),
        }
    }
    out.write_all(&buf)
}
