//! トークンと字句ルール表

/// トークンの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// 空白（トークン列には現れない）
    NoType,
    /// 数値リテラル（10進数 / 0x付き16進数）
    Num,
    /// レジスタ参照: `$a0`
    Reg,
    LParen,
    RParen,
    Plus,
    Minus,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    /// 単項プラス
    Pos,
    /// 単項マイナス
    Neg,
    /// デリファレンス: `*addr`
    Deref,
}

/// 演算子の結合の強さ（弱い順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Or,
    And,
    Equality,
    Relational,
    Additive,
    Multiplicative,
    Unary,
}

impl TokenKind {
    /// オペランドの終端になれるトークンか
    ///
    /// 直前のトークンがこれに該当すれば `+ - *` は二項演算子として扱います。
    pub fn is_boundary(self) -> bool {
        matches!(self, TokenKind::RParen | TokenKind::Num | TokenKind::Reg)
    }

    /// 主演算子になり得ないトークンか
    pub fn is_non_operator(self) -> bool {
        matches!(
            self,
            TokenKind::LParen | TokenKind::RParen | TokenKind::Num | TokenKind::Reg
        )
    }

    /// 単項演算子か
    pub fn is_unary(self) -> bool {
        matches!(self, TokenKind::Pos | TokenKind::Neg | TokenKind::Deref)
    }

    /// 対応する単項演算子
    pub fn to_unary(self) -> Option<TokenKind> {
        match self {
            TokenKind::Plus => Some(TokenKind::Pos),
            TokenKind::Minus => Some(TokenKind::Neg),
            TokenKind::Mul => Some(TokenKind::Deref),
            _ => None,
        }
    }

    /// 演算子の優先順位。演算子でなければ `None`
    pub fn precedence(self) -> Option<Precedence> {
        let prec = match self {
            TokenKind::Or => Precedence::Or,
            TokenKind::And => Precedence::And,
            TokenKind::Eq | TokenKind::Neq => Precedence::Equality,
            TokenKind::Lt | TokenKind::Gt | TokenKind::Le | TokenKind::Ge => Precedence::Relational,
            TokenKind::Plus | TokenKind::Minus => Precedence::Additive,
            TokenKind::Mul | TokenKind::Div => Precedence::Multiplicative,
            TokenKind::Pos | TokenKind::Neg | TokenKind::Deref => Precedence::Unary,
            _ => return None,
        };
        Some(prec)
    }

    /// テキストを保持するトークンか
    pub fn has_text(self) -> bool {
        matches!(self, TokenKind::Num | TokenKind::Reg)
    }
}

/// トークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// リテラルとレジスタのみ元の文字列を保持する
    pub text: Option<String>,
}

impl Token {
    /// テキストなしのトークンを作成する
    pub fn new(kind: TokenKind) -> Self {
        Self { kind, text: None }
    }

    /// テキスト付きのトークンを作成する
    pub fn with_text(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
        }
    }
}

/// 字句ルール表
///
/// 先頭から順に試し、最初にマッチしたルールを採用します。
/// 2文字の演算子は1文字の接頭辞より前に置きます。
pub const RULES: &[(&str, TokenKind)] = &[
    (r"\s+", TokenKind::NoType),
    (r"\+", TokenKind::Plus),
    (r"-", TokenKind::Minus),
    (r"\*", TokenKind::Mul),
    (r"/", TokenKind::Div),
    (r"==", TokenKind::Eq),
    (r"!=", TokenKind::Neq),
    (r"<=", TokenKind::Le),
    (r">=", TokenKind::Ge),
    (r"<", TokenKind::Lt),
    (r">", TokenKind::Gt),
    (r"&&", TokenKind::And),
    (r"\|\|", TokenKind::Or),
    (r"\(", TokenKind::LParen),
    (r"\)", TokenKind::RParen),
    (r"0[xX][0-9a-fA-F]+", TokenKind::Num),
    (r"[0-9]+", TokenKind::Num),
    (r"\$\w+", TokenKind::Reg),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(Precedence::Or < Precedence::And);
        assert!(Precedence::Additive < Precedence::Multiplicative);
        assert!(Precedence::Multiplicative < Precedence::Unary);
        assert_eq!(TokenKind::Le.precedence(), Some(Precedence::Relational));
        assert_eq!(TokenKind::Num.precedence(), None);
    }

    #[test]
    fn test_categories() {
        assert!(TokenKind::RParen.is_boundary());
        assert!(!TokenKind::LParen.is_boundary());
        assert!(TokenKind::LParen.is_non_operator());
        assert!(TokenKind::Deref.is_unary());
        assert_eq!(TokenKind::Mul.to_unary(), Some(TokenKind::Deref));
        assert_eq!(TokenKind::Div.to_unary(), None);
    }
}
