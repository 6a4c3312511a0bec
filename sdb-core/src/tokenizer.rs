//! 字句解析器
//!
//! ルール表を一度だけコンパイルし、入力文字列をトークン列に変換します。

use crate::errors::ExprError;
use crate::token::{Token, TokenKind, RULES};
use crate::Result;
use regex::Regex;
use tracing::debug;

/// トークン数のデフォルト上限
pub const MAX_TOKENS: usize = 64;

/// リテラル・レジスタ名の最大長（バイト）
pub const MAX_TOKEN_LEN: usize = 32;

/// 字句解析器
pub struct Tokenizer {
    /// 先頭アンカー付きでコンパイル済みのルール
    rules: Vec<(Regex, TokenKind)>,
    capacity: usize,
}

impl Tokenizer {
    /// デフォルトのトークン上限で字句解析器を作成する
    pub fn new() -> Result<Self> {
        Self::with_capacity(MAX_TOKENS)
    }

    /// トークン上限を指定して字句解析器を作成する
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|&(pattern, kind)| -> Result<(Regex, TokenKind)> {
                let re = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    anyhow::anyhow!("regex compilation failed: {}\n{}", e, pattern)
                })?;
                Ok((re, kind))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("compiled {} lexical rules", rules.len());

        Ok(Self { rules, capacity })
    }

    /// トークン数の上限
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 入力をトークン列に変換する
    ///
    /// どのルールにもマッチしない位置があれば、その位置を持つ
    /// `ExprError::NoMatch` を返します。
    pub fn tokenize(&self, input: &str) -> std::result::Result<Vec<Token>, ExprError> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut position = 0;

        while position < input.len() {
            let rest = &input[position..];
            let (kind, len) = self
                .rules
                .iter()
                .find_map(|(re, kind)| {
                    re.find(rest)
                        .filter(|m| m.start() == 0 && m.end() > 0)
                        .map(|m| (*kind, m.end()))
                })
                .ok_or(ExprError::NoMatch { offset: position })?;

            let text = &rest[..len];
            debug!("match {:?} at position {} with len {}: {}", kind, position, len, text);

            if kind != TokenKind::NoType {
                if tokens.len() >= self.capacity {
                    return Err(ExprError::TooManyTokens { capacity: self.capacity });
                }
                let token = if kind.has_text() {
                    if len > MAX_TOKEN_LEN {
                        return Err(ExprError::TokenTooLong { offset: position });
                    }
                    Token::with_text(kind, text)
                } else {
                    Token::new(Self::disambiguate(kind, tokens.last()))
                };
                tokens.push(token);
            }

            position += len;
        }

        Ok(tokens)
    }

    /// `+ - *` を直前のトークンから単項か二項か判定する
    fn disambiguate(kind: TokenKind, prev: Option<&Token>) -> TokenKind {
        match kind.to_unary() {
            Some(unary) if !prev.is_some_and(|t| t.kind.is_boundary()) => unary,
            _ => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Tokenizer::new()
            .unwrap()
            .tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        use TokenKind::*;
        assert_eq!(kinds("1 + 2"), vec![Num, Plus, Num]);
        assert_eq!(kinds("(1+2)*3"), vec![LParen, Num, Plus, Num, RParen, Mul, Num]);
        assert!(kinds("   ").is_empty());
    }

    #[test]
    fn test_tokenize_text() {
        let tokens = Tokenizer::new().unwrap().tokenize("0x1f + $a0").unwrap();
        assert_eq!(tokens[0], Token::with_text(TokenKind::Num, "0x1f"));
        assert_eq!(tokens[1], Token::new(TokenKind::Plus));
        assert_eq!(tokens[2], Token::with_text(TokenKind::Reg, "$a0"));
    }

    #[test]
    fn test_two_char_operators() {
        use TokenKind::*;
        assert_eq!(kinds("1<=2"), vec![Num, Le, Num]);
        assert_eq!(kinds("1>=2"), vec![Num, Ge, Num]);
        assert_eq!(kinds("1<2"), vec![Num, Lt, Num]);
        assert_eq!(kinds("1!=2"), vec![Num, Neq, Num]);
        assert_eq!(kinds("1==2&&3||4"), vec![Num, Eq, Num, And, Num, Or, Num]);
    }

    #[test]
    fn test_unary_disambiguation() {
        use TokenKind::*;
        assert_eq!(kinds("3 - -2"), vec![Num, Minus, Neg, Num]);
        assert_eq!(kinds("-1+2"), vec![Neg, Num, Plus, Num]);
        assert_eq!(kinds("*$sp"), vec![Deref, Reg]);
        assert_eq!(kinds("$a0 * $a1"), vec![Reg, Mul, Reg]);
        assert_eq!(kinds("(1) - +2"), vec![LParen, Num, RParen, Minus, Pos, Num]);
        assert_eq!(kinds("(-1)"), vec![LParen, Neg, Num, RParen]);
    }

    #[test]
    fn test_no_match_offset() {
        let tokenizer = Tokenizer::new().unwrap();
        assert_eq!(tokenizer.tokenize("1 + a"), Err(ExprError::NoMatch { offset: 4 }));
        assert_eq!(tokenizer.tokenize("1 = 2"), Err(ExprError::NoMatch { offset: 2 }));
        assert_eq!(tokenizer.tokenize("0x"), Err(ExprError::NoMatch { offset: 1 }));
    }

    #[test]
    fn test_capacity() {
        let tokenizer = Tokenizer::with_capacity(3).unwrap();
        assert_eq!(tokenizer.capacity(), 3);
        assert_eq!(Tokenizer::new().unwrap().capacity(), MAX_TOKENS);
        assert!(tokenizer.tokenize("1+2").is_ok());
        assert_eq!(
            tokenizer.tokenize("1+2+3"),
            Err(ExprError::TooManyTokens { capacity: 3 })
        );
    }

    #[test]
    fn test_token_too_long() {
        let tokenizer = Tokenizer::new().unwrap();
        let long = "1".repeat(MAX_TOKEN_LEN + 1);
        assert_eq!(
            tokenizer.tokenize(&format!("2+{}", long)),
            Err(ExprError::TokenTooLong { offset: 2 })
        );
    }
}
