//! Column identifier type and letter encoding.

use std::fmt;
use std::str::FromStr;

use crate::common::{Error, Result};

/// Number of columns addressable with up to three letters (`A` ..= `ZZZ`).
pub const MAX_COLUMNS: u32 = 26 + 26 * 26 + 26 * 26 * 26;

/// Identifies a column by zero-based index.
///
/// Letters are a bijective base-26 numeral with digits `A`..`Z` worth
/// 1..26: `ordinal = Σ digit_i·26^(n-1-i)` and `index = ordinal - 1`.
///
/// # Example
/// ```
/// use casegrid::common::ColumnRef;
///
/// let col = ColumnRef::from_letters("AA").unwrap();
/// assert_eq!(col.index(), 26);
/// assert_eq!(col.to_letters(), "AA");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef(pub u32);

impl ColumnRef {
    /// Create a ColumnRef from a zero-based index.
    ///
    /// # Panics
    /// Panics if `index >= MAX_COLUMNS`.
    #[inline]
    pub fn new(index: u32) -> Self {
        assert!(index < MAX_COLUMNS, "column index {} out of range", index);
        ColumnRef(index)
    }

    /// Zero-based column index.
    #[inline]
    pub fn index(&self) -> u32 {
        self.0
    }

    /// Decode a letter identifier such as `"C"` or `"AB"`.
    ///
    /// Lowercase letters are accepted. Anything outside `A..=ZZZ` is
    /// rejected with `Error::MalformedAddress`.
    pub fn from_letters(letters: &str) -> Result<Self> {
        if letters.is_empty() || letters.len() > 3 {
            return Err(Error::MalformedAddress(letters.to_string()));
        }

        let mut ordinal: u32 = 0;
        for c in letters.chars() {
            let c = c.to_ascii_uppercase();
            if !c.is_ascii_uppercase() {
                return Err(Error::MalformedAddress(letters.to_string()));
            }
            ordinal = ordinal * 26 + (c as u32 - 'A' as u32 + 1);
        }

        Ok(ColumnRef(ordinal - 1))
    }

    /// Encode this column as letters.
    pub fn to_letters(&self) -> String {
        let mut n = self.0 + 1;
        let mut out = Vec::with_capacity(3);
        while n > 0 {
            n -= 1;
            out.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        out.reverse();
        // Only ASCII uppercase bytes are pushed
        String::from_utf8(out).unwrap_or_default()
    }

    /// The column immediately to the right, if addressable.
    pub fn next(&self) -> Option<ColumnRef> {
        (self.0 + 1 < MAX_COLUMNS).then(|| ColumnRef(self.0 + 1))
    }
}

impl FromStr for ColumnRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_letters(s)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_letters())
    }
}
