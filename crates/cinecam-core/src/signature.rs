//! Byte-pattern signatures and module scanning.
//!
//! Patterns are authored as space-separated hex pairs with `??` (or `?`)
//! for wildcard bytes. A `[ .. ]` bracket pair marks a 4-byte embedded
//! RIP-relative operand that can be resolved into an absolute address
//! after a match, e.g.:
//!
//! ```text
//! 75 87 48 8B 05 [ ?? ?? ?? ?? ] 48 8B B0
//! ```
//!
//! Scanning works over a plain byte slice so it can run against a copy of
//! a module image or, inside the target process, the live image itself.

use std::ops::Range;

use memchr::memchr_iter;

use crate::error::{Error, Result};

/// A compiled byte/wildcard pattern.
///
/// Built once at startup and immutable afterwards; owned by the offset
/// resolver's signature table.
#[derive(Debug, Clone)]
pub struct Signature {
    /// One entry per pattern byte; `None` is a wildcard.
    bytes: Vec<Option<u8>>,
    /// Byte range of the embedded 4-byte relative reference, if any.
    reference: Option<Range<usize>>,
    /// Constant added to the resolved address.
    add_offset: i64,
}

impl Signature {
    /// Compile a textual pattern.
    ///
    /// Fails on malformed hex pairs, unbalanced brackets, an empty
    /// pattern, or a reference window that is not exactly 4 bytes.
    pub fn compile(pattern: &str) -> Result<Self> {
        Self::compile_with_offset(pattern, 0)
    }

    /// Compile a textual pattern with a post-resolution offset.
    pub fn compile_with_offset(pattern: &str, add_offset: i64) -> Result<Self> {
        let mut bytes = Vec::new();
        let mut ref_start: Option<usize> = None;
        let mut reference: Option<Range<usize>> = None;

        for token in pattern.split_whitespace() {
            match token {
                "[" => {
                    if ref_start.is_some() || reference.is_some() {
                        return Err(Error::InvalidPattern(format!(
                            "unexpected '[' in '{pattern}'"
                        )));
                    }
                    ref_start = Some(bytes.len());
                }
                "]" => {
                    let start = ref_start.take().ok_or_else(|| {
                        Error::InvalidPattern(format!("unmatched ']' in '{pattern}'"))
                    })?;
                    reference = Some(start..bytes.len());
                }
                "?" | "??" => bytes.push(None),
                _ => {
                    if token.len() != 2 {
                        return Err(Error::InvalidPattern(format!(
                            "byte token '{token}' must be exactly two hex digits"
                        )));
                    }
                    let value = u8::from_str_radix(token, 16).map_err(|e| {
                        Error::InvalidPattern(format!("bad byte token '{token}': {e}"))
                    })?;
                    bytes.push(Some(value));
                }
            }
        }

        if ref_start.is_some() {
            return Err(Error::InvalidPattern(format!(
                "unmatched '[' in '{pattern}'"
            )));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidPattern("pattern is empty".to_string()));
        }
        if let Some(window) = &reference {
            // The relative operand convention only covers rel32.
            if window.len() != 4 {
                return Err(Error::InvalidPattern(format!(
                    "reference window must be 4 bytes, got {}",
                    window.len()
                )));
            }
        }

        Ok(Self {
            bytes,
            reference,
            add_offset,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Find the lowest offset in `region` where every literal byte matches.
    pub fn find(&self, region: &[u8]) -> Option<usize> {
        if self.bytes.len() > region.len() {
            return None;
        }

        // Probe on the first literal byte; candidates come back in
        // ascending order so the lowest match wins.
        let Some((probe_pos, probe_byte)) = self
            .bytes
            .iter()
            .enumerate()
            .find_map(|(i, b)| b.map(|v| (i, v)))
        else {
            // All wildcards: anything long enough matches at offset 0.
            return Some(0);
        };

        let last_start = region.len() - self.bytes.len();
        for hit in memchr_iter(probe_byte, region) {
            let Some(start) = hit.checked_sub(probe_pos) else {
                continue;
            };
            if start > last_start {
                break;
            }
            if self.matches_at(&region[start..start + self.bytes.len()]) {
                return Some(start);
            }
        }
        None
    }

    fn matches_at(&self, window: &[u8]) -> bool {
        self.bytes
            .iter()
            .zip(window)
            .all(|(pat, byte)| pat.is_none_or(|v| v == *byte))
    }

    /// Resolve the embedded relative reference of a match into an
    /// absolute address.
    ///
    /// `region_base` is the address `region[0]` occupies in the target
    /// process and `match_offset` the value returned by [`find`].
    /// Follows the rel32 convention: the signed displacement is relative
    /// to the end of its own 4-byte field.
    ///
    /// [`find`]: Signature::find
    pub fn resolve_reference(&self, region: &[u8], region_base: u64, match_offset: usize) -> u64 {
        let address = region_base + match_offset as u64;
        let Some(window) = &self.reference else {
            return address.wrapping_add_signed(self.add_offset);
        };

        let field = match_offset + window.start;
        let disp = i32::from_le_bytes([
            region[field],
            region[field + 1],
            region[field + 2],
            region[field + 3],
        ]);

        let field_end = region_base + (field + 4) as u64;
        field_end
            .wrapping_add_signed(disp as i64)
            .wrapping_add_signed(self.add_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_literals_and_wildcards() {
        let sig = Signature::compile("48 8B 05 ?? ?? ?? ?? C3").unwrap();
        assert_eq!(sig.len(), 8);
        assert!(!sig.has_reference());
    }

    #[test]
    fn test_compile_reference_window() {
        let sig = Signature::compile("75 87 48 8B 05 [ ?? ?? ?? ?? ] 48 8B B0").unwrap();
        assert_eq!(sig.len(), 12);
        assert!(sig.has_reference());
        assert_eq!(sig.reference, Some(5..9));
    }

    #[test]
    fn test_compile_rejects_malformed() {
        assert!(Signature::compile("").is_err());
        assert!(Signature::compile("GG 00").is_err());
        assert!(Signature::compile("A 00").is_err()); // single hex digit
        assert!(Signature::compile("0A4 00").is_err());
        assert!(Signature::compile("48 [ ?? ??").is_err());
        assert!(Signature::compile("48 ?? ?? ] 00").is_err());
        assert!(Signature::compile("48 [ ?? ?? ] 00").is_err()); // 2-byte window
        assert!(Signature::compile("48 [ ?? [ ?? ?? ?? ] ]").is_err());
    }

    #[test]
    fn test_find_exact() {
        let region = [0x00u8, 0x11, 0x22, 0x33, 0x44, 0x22, 0x33];
        let sig = Signature::compile("22 33").unwrap();
        assert_eq!(sig.find(&region), Some(2));
    }

    #[test]
    fn test_find_returns_lowest_match() {
        let region = [0xAAu8, 0x01, 0x02, 0xAA, 0x01, 0x02];
        let sig = Signature::compile("AA 01").unwrap();
        assert_eq!(sig.find(&region), Some(0));
    }

    #[test]
    fn test_find_with_wildcards() {
        let region = [0x90u8, 0x48, 0x8B, 0xFF, 0xC3];
        let sig = Signature::compile("48 ?? ?? C3").unwrap();
        assert_eq!(sig.find(&region), Some(1));
    }

    #[test]
    fn test_find_leading_wildcard() {
        let region = [0x01u8, 0x02, 0x03, 0x04];
        let sig = Signature::compile("?? 03").unwrap();
        assert_eq!(sig.find(&region), Some(1));
    }

    #[test]
    fn test_find_absent() {
        let region = [0x00u8; 64];
        let sig = Signature::compile("DE AD BE EF").unwrap();
        assert_eq!(sig.find(&region), None);
    }

    #[test]
    fn test_find_pattern_longer_than_region() {
        let sig = Signature::compile("01 02 03 04").unwrap();
        assert_eq!(sig.find(&[0x01, 0x02]), None);
    }

    #[test]
    fn test_resolve_reference_forward() {
        // mov rax, [rip+0x10] style displacement at offset 3.
        let mut region = vec![0x90u8, 0x90, 0x90, 0x48, 0x8B, 0x05, 0, 0, 0, 0, 0xC3];
        region[6..10].copy_from_slice(&0x10i32.to_le_bytes());

        let sig = Signature::compile("48 8B 05 [ ?? ?? ?? ?? ] C3").unwrap();
        let hit = sig.find(&region).unwrap();
        assert_eq!(hit, 3);

        // window end = base + 3 + 3 + 4, plus disp 0x10
        let resolved = sig.resolve_reference(&region, 0x1000, hit);
        assert_eq!(resolved, 0x1000 + 3 + 3 + 4 + 0x10);
    }

    #[test]
    fn test_resolve_reference_negative_displacement() {
        let mut region = vec![0x48u8, 0x8D, 0x0D, 0, 0, 0, 0];
        region[3..7].copy_from_slice(&(-0x20i32).to_le_bytes());

        let sig = Signature::compile("48 8D 0D [ ?? ?? ?? ?? ]").unwrap();
        let resolved = sig.resolve_reference(&region, 0x4000, 0);
        assert_eq!(resolved, 0x4000 + 7 - 0x20);
    }

    #[test]
    fn test_resolve_reference_add_offset() {
        let mut region = vec![0x48u8, 0x8B, 0x05, 0, 0, 0, 0];
        region[3..7].copy_from_slice(&0x8i32.to_le_bytes());

        let sig = Signature::compile_with_offset("48 8B 05 [ ?? ?? ?? ?? ]", 0x30).unwrap();
        let resolved = sig.resolve_reference(&region, 0x2000, 0);
        assert_eq!(resolved, 0x2000 + 7 + 0x8 + 0x30);
    }

    #[test]
    fn test_resolve_without_reference_is_match_address() {
        let sig = Signature::compile_with_offset("90 90", 4).unwrap();
        let region = [0x00u8, 0x90, 0x90];
        let hit = sig.find(&region).unwrap();
        assert_eq!(sig.resolve_reference(&region, 0x7000, hit), 0x7000 + 1 + 4);
    }
}
