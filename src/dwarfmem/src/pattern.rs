//! Byte patterns with optional wildcards, matched through memchr's memmem

use std::fmt;
use std::str::FromStr;

/// A needle where some bytes may be wildcards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<u8>,
    /// Non-zero where the byte must match
    mask: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pattern token '{0}' (expected two hex digits or ??)")]
pub struct PatternError(pub String);

impl Pattern {
    /// Every byte must match
    pub fn exact(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            mask: vec![1; bytes.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn has_wildcards(&self) -> bool {
        self.mask.iter().any(|&m| m == 0)
    }

    /// Offsets of every match in `data`, ascending
    pub fn find_all(&self, data: &[u8]) -> Vec<usize> {
        if self.is_empty() {
            return vec![];
        }

        let (anchor_offset, anchor) = self.best_anchor();

        if anchor.is_empty() {
            return (0..=data.len().saturating_sub(self.len()))
                .filter(|&i| self.matches_at(&data[i..]))
                .collect();
        }

        let finder = memchr::memmem::Finder::new(anchor);
        let mut results = Vec::new();

        for anchor_pos in finder.find_iter(data) {
            let Some(start) = anchor_pos.checked_sub(anchor_offset) else {
                continue;
            };
            if start + self.len() > data.len() {
                continue;
            }
            if self.matches_at(&data[start..]) {
                results.push(start);
            }
        }

        results
    }

    /// Longest contiguous run of fixed bytes as `(offset, bytes)`
    fn best_anchor(&self) -> (usize, &[u8]) {
        let mut best_start = 0;
        let mut best_len = 0;
        let mut current_start = 0;
        let mut current_len = 0;

        for (i, &m) in self.mask.iter().enumerate() {
            if m != 0 {
                if current_len == 0 {
                    current_start = i;
                }
                current_len += 1;
                if current_len > best_len {
                    best_start = current_start;
                    best_len = current_len;
                }
            } else {
                current_len = 0;
            }
        }

        (best_start, &self.bytes[best_start..best_start + best_len])
    }

    #[inline]
    fn matches_at(&self, data: &[u8]) -> bool {
        data.len() >= self.len()
            && self
                .bytes
                .iter()
                .zip(&self.mask)
                .zip(data)
                .all(|((b, m), d)| *m == 0 || b == d)
    }
}

/// Parses `"de ad ?? ef"`, `"DEAD??EF"` and mixtures of the two
impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.len() % 2 != 0 {
            return Err(PatternError(s.to_string()));
        }

        let mut bytes = Vec::with_capacity(compact.len() / 2);
        let mut mask = Vec::with_capacity(compact.len() / 2);
        for i in (0..compact.len()).step_by(2) {
            let token = compact
                .get(i..i + 2)
                .ok_or_else(|| PatternError(s.to_string()))?;
            if token == "??" {
                bytes.push(0);
                mask.push(0);
            } else {
                let byte =
                    u8::from_str_radix(token, 16).map_err(|_| PatternError(token.to_string()))?;
                bytes.push(byte);
                mask.push(1);
            }
        }

        Ok(Self { bytes, mask })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .bytes
            .iter()
            .zip(&self.mask)
            .map(|(b, m)| {
                if *m == 0 {
                    "??".to_string()
                } else {
                    format!("{:02X}", b)
                }
            })
            .collect();
        write!(f, "{}", tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let pattern = Pattern::exact(b"hello");
        assert_eq!(pattern.find_all(b"hello world hello"), vec![0, 12]);
        assert!(Pattern::exact(b"xyz").find_all(b"hello world").is_empty());
    }

    #[test]
    fn test_wildcards() {
        let pattern: Pattern = "74 65 73 74 ?? ?? ?? ??".parse().unwrap();
        assert!(pattern.has_wildcards());
        assert_eq!(pattern.find_all(b"test1234test5678"), vec![0, 8]);
    }

    #[test]
    fn test_anchor_not_at_start() {
        let pattern: Pattern = "41 42 ?? ?? 43 44 45 46".parse().unwrap();
        assert_eq!(pattern.best_anchor(), (4, &b"CDEF"[..]));
        assert_eq!(pattern.find_all(b"xxCDEFABzzCDEF"), vec![6]);
    }

    #[test]
    fn test_all_wildcards() {
        let pattern: Pattern = "????".parse().unwrap();
        assert_eq!(pattern.find_all(b"abc"), vec![0, 1]);
    }

    #[test]
    fn test_empty_pattern() {
        assert!(Pattern::exact(b"").find_all(b"hello").is_empty());
    }

    #[test]
    fn test_parse_and_display() {
        let pattern: Pattern = "deadBEEF ??01".parse().unwrap();
        assert_eq!(pattern.len(), 6);
        assert_eq!(pattern.to_string(), "DE AD BE EF ?? 01");
        assert!("abc".parse::<Pattern>().is_err());
        assert!("zz".parse::<Pattern>().is_err());
    }
}
