use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Code unit flag bits.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Display,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
#[repr(u32)]
pub enum CodeFlag {
    Optimized = 0x1,
    NewLocals = 0x2,
    VarArgs = 0x4,
    VarKeywords = 0x8,
    Nested = 0x10,
    Generator = 0x20,
    NoFree = 0x40,
    Coroutine = 0x80,
    #[strum(serialize = "iterable_coroutine")]
    IterableCoroutine = 0x100,
    #[strum(serialize = "async_generator")]
    AsyncGenerator = 0x200,
}

impl CodeFlag {
    pub fn bits(&self) -> u32 {
        *self as u32
    }

    pub fn name(&self) -> &'static str {
        (*self).into()
    }

    /// Union of every known flag bit.
    pub fn all_bits() -> u32 {
        CodeFlag::iter().fold(0, |acc, flag| acc | flag.bits())
    }

    /// Parse a flag name or a hexadecimal literal (`0x4` or `4`).
    pub fn parse(s: &str) -> Result<u32, String> {
        if let Ok(flag) = s.parse::<CodeFlag>() {
            return Ok(flag.bits());
        }
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u32::from_str_radix(digits, 16).map_err(|_| format!("Unknown flag: {s}"))
    }
}

/// Names of every flag set in `bits`, lowest bit first.
pub fn flag_names(bits: u32) -> Vec<&'static str> {
    CodeFlag::iter()
        .filter(|flag| bits & flag.bits() != 0)
        .map(|flag| flag.name())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(CodeFlag::parse("optimized"), Ok(0x1));
        assert_eq!(CodeFlag::parse("NEWLOCALS"), Ok(0x2));
        assert_eq!(CodeFlag::parse("async_generator"), Ok(0x200));
        assert_eq!(CodeFlag::parse("0x4"), Ok(0x4));
        assert_eq!(CodeFlag::parse("10"), Ok(0x10));
        assert!(CodeFlag::parse("hoge").is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(flag_names(0x13), vec!["optimized", "newlocals", "nested"]);
        assert!(flag_names(0).is_empty());
    }
}
