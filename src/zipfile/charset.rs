//! Entry name decoding for zip archives.
//!
//! Names are only guaranteed UTF-8 when the archiver sets general-purpose
//! bit 11. Archives written on Windows commonly store names in the system
//! code page instead, so undecodable names are tried against a fixed list
//! of legacy multi-byte encodings before falling back to lossy UTF-8.

use std::borrow::Cow;

use encoding_rs::{EUC_KR, Encoding, GB18030, SHIFT_JIS};

/// Legacy encodings tried in order.
const FALLBACKS: &[&Encoding] = &[GB18030, SHIFT_JIS, EUC_KR];

/// Decodes a raw entry name or comment.
pub fn decode(raw: &[u8]) -> Cow<'_, str> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Cow::Borrowed(text);
    }
    for encoding in FALLBACKS {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(raw) {
            log::trace!("decoded zip name as {}", encoding.name());
            return Cow::Owned(text.into_owned());
        }
    }
    String::from_utf8_lossy(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        assert_eq!(decode("résumé/日本.txt".as_bytes()), "résumé/日本.txt");
        assert!(matches!(decode(b"plain.txt"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_gbk_name() {
        // "中文.txt" in GBK
        let raw = [0xD6, 0xD0, 0xCE, 0xC4, b'.', b't', b'x', b't'];
        assert_eq!(decode(&raw), "中文.txt");
    }

    #[test]
    fn test_lossy_last_resort() {
        let raw = [b'a', 0xFF, 0xFF, 0xFF];
        let text = decode(&raw);
        assert!(text.starts_with('a'));
    }
}
