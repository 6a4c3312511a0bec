//! パース関連のユーティリティ関数

use anyhow::Result;
use sdb_target::Word;

/// 数値リテラルを `Word` にパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポート。
/// ワードに収まらない値はエラーになります。
///
/// # Examples
/// ```
/// use sdb_core::parse::parse_number;
///
/// assert_eq!(parse_number("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_number("1234").unwrap(), 1234);
/// ```
pub fn parse_number(s: &str) -> Result<Word> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Word::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal number '{}': {}", s, e))
    } else {
        s.parse::<Word>()
            .map_err(|e| anyhow::anyhow!("Invalid number '{}': {}", s, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_hex() {
        assert_eq!(parse_number("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_number("0X1234").unwrap(), 0x1234);
        assert_eq!(parse_number("0xabcd").unwrap(), 0xabcd);
        assert_eq!(parse_number("0xABCD").unwrap(), 0xabcd);
        assert_eq!(parse_number("0xffffffffffffffff").unwrap(), Word::MAX);
    }

    #[test]
    fn test_parse_number_dec() {
        assert_eq!(parse_number("1234").unwrap(), 1234);
        assert_eq!(parse_number(" 9999 ").unwrap(), 9999);
        assert_eq!(parse_number("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_number_invalid() {
        assert!(parse_number("xyz").is_err());
        assert!(parse_number("0xghij").is_err());
        assert!(parse_number("abcd").is_err());
        assert!(parse_number("18446744073709551616").is_err());
        assert!(parse_number("0x").is_err());
    }
}
