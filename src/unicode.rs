//! Text encoding conversions and case-insensitive comparison.
//!
//! Archive formats hand us names in UTF-16 (Joliet), UCS-2 (old Windows
//! tooling), Latin-1 (DOS-era formats), or raw code points; everything is
//! normalized to UTF-8 `String`s at the boundary. Invalid input never
//! fails — damaged sequences become U+FFFD, because a bad filename in an
//! archive should surface as a weird name, not as an unreadable archive.

use std::char::REPLACEMENT_CHARACTER;
use std::cmp::Ordering;

/// Encode to UTF-16 code units (surrogate pairs where needed).
pub fn utf8_to_utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Decode UTF-16, replacing unpaired surrogates.
pub fn utf8_from_utf16(units: &[u16]) -> String {
    std::char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
        .collect()
}

/// Encode to UCS-4 code points.
pub fn utf8_to_ucs4(s: &str) -> Vec<u32> {
    s.chars().map(u32::from).collect()
}

/// Decode UCS-4, replacing anything that is not a scalar value.
pub fn utf8_from_ucs4(cps: &[u32]) -> String {
    cps.iter()
        .map(|&cp| char::from_u32(cp).unwrap_or(REPLACEMENT_CHARACTER))
        .collect()
}

/// Encode to UCS-2: UTF-16 without surrogates. Code points outside the
/// BMP can't be represented and become U+FFFD.
pub fn utf8_to_ucs2(s: &str) -> Vec<u16> {
    s.chars()
        .map(|c| {
            let cp = u32::from(c);
            if cp > 0xFFFF {
                REPLACEMENT_CHARACTER as u16
            } else {
                cp as u16
            }
        })
        .collect()
}

/// Decode UCS-2: every unit is taken as a BMP code point; surrogate
/// halves are not valid scalar values and become U+FFFD.
pub fn utf8_from_ucs2(units: &[u16]) -> String {
    units
        .iter()
        .map(|&u| char::from_u32(u32::from(u)).unwrap_or(REPLACEMENT_CHARACTER))
        .collect()
}

/// Decode Latin-1. Total: every byte is a code point.
pub fn utf8_from_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Case-fold one code point for caseless comparison.
///
/// Folds through the Unicode lowercase mapping (which can expand to as
/// many as three code points). Idempotent: folding a folded sequence
/// yields itself.
pub fn case_fold(c: char) -> std::char::ToLowercase {
    c.to_lowercase()
}

fn fold_cmp(a: impl Iterator<Item = char>, b: impl Iterator<Item = char>) -> Ordering {
    let mut a = a.flat_map(case_fold);
    let mut b = b.flat_map(case_fold);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Case-insensitive UTF-8 comparison.
pub fn utf8_stricmp(a: &str, b: &str) -> Ordering {
    fold_cmp(a.chars(), b.chars())
}

/// Case-insensitive comparison of UTF-16 strings.
pub fn utf16_stricmp(a: &[u16], b: &[u16]) -> Ordering {
    utf8_stricmp(&utf8_from_utf16(a), &utf8_from_utf16(b))
}

/// Case-insensitive comparison of UCS-4 strings.
pub fn ucs4_stricmp(a: &[u32], b: &[u32]) -> Ordering {
    utf8_stricmp(&utf8_from_ucs4(a), &utf8_from_ucs4(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_round_trip() {
        for s in ["", "ascii", "naïve café", "ζωή", "🦀 crab", "a\u{10FFFF}b"] {
            assert_eq!(utf8_from_utf16(&utf8_to_utf16(s)), s);
        }
    }

    #[test]
    fn ucs4_round_trip() {
        for s in ["plain", "mixed ελληνικά and 漢字", "🎮🎲"] {
            assert_eq!(utf8_from_ucs4(&utf8_to_ucs4(s)), s);
        }
    }

    #[test]
    fn ucs2_flattens_astral_plane() {
        assert_eq!(utf8_from_ucs2(&utf8_to_ucs2("ok")), "ok");
        // the crab does not survive UCS-2
        assert_eq!(utf8_from_ucs2(&utf8_to_ucs2("🦀")), "\u{FFFD}");
    }

    #[test]
    fn unpaired_surrogate_is_replaced() {
        assert_eq!(utf8_from_utf16(&[0xD800]), "\u{FFFD}");
        assert_eq!(utf8_from_ucs2(&[0xDC00]), "\u{FFFD}");
    }

    #[test]
    fn latin1_is_total() {
        assert_eq!(utf8_from_latin1(b"caf\xe9"), "café");
        assert_eq!(utf8_from_latin1(&[0xFF]), "ÿ");
    }

    #[test]
    fn fold_is_idempotent() {
        for c in ('\u{0}'..='\u{2FF}').chain("İǅΣ".chars()) {
            let once: String = case_fold(c).collect();
            let twice: String = once.chars().flat_map(case_fold).collect();
            assert_eq!(once, twice, "code point {:?}", c);
        }
    }

    #[test]
    fn stricmp_ignores_case() {
        assert_eq!(utf8_stricmp("README.TXT", "readme.txt"), Ordering::Equal);
        assert_eq!(utf8_stricmp("ΣΙΣΥΦΟΣ", "σισυφοσ"), Ordering::Equal);
        assert_eq!(utf8_stricmp("abc", "abd"), Ordering::Less);
        assert_eq!(utf8_stricmp("abcd", "abc"), Ordering::Greater);
    }

    #[test]
    fn utf16_and_ucs4_stricmp_agree_with_utf8() {
        let pairs = [("Zip", "zIP"), ("Alpha", "beta"), ("same", "same")];
        for (a, b) in pairs {
            let expect = utf8_stricmp(a, b);
            assert_eq!(
                utf16_stricmp(&utf8_to_utf16(a), &utf8_to_utf16(b)),
                expect
            );
            assert_eq!(ucs4_stricmp(&utf8_to_ucs4(a), &utf8_to_ucs4(b)), expect);
        }
    }
}
