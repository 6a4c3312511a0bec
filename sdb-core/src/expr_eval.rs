//! 式評価エンジン
//!
//! デバッガで使用する式を評価します（p コマンドやウォッチポイント）。
//! トークン列の区間を、外側の括弧の除去と主演算子での分割によって
//! 再帰的に評価します。

use crate::errors::ExprError;
use crate::parse::parse_number;
use crate::token::{Precedence, Token, TokenKind};
use crate::tokenizer::Tokenizer;
use crate::Result;
use sdb_target::{MachineState, SWord, Word, WORD_BYTES};

/// 式の評価結果
pub type EvalResult = std::result::Result<Word, ExprError>;

/// 字句解析器と評価器をまとめた式エンジン
pub struct ExprEngine {
    tokenizer: Tokenizer,
}

impl ExprEngine {
    /// 新しい式エンジンを作成する
    pub fn new() -> Result<Self> {
        Ok(Self {
            tokenizer: Tokenizer::new()?,
        })
    }

    /// 字句解析器を指定して式エンジンを作成する
    pub fn with_tokenizer(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// 入力をトークン列に変換する
    pub fn tokenize(&self, text: &str) -> std::result::Result<Vec<Token>, ExprError> {
        self.tokenizer.tokenize(text)
    }

    /// 式文字列をマシン状態に対して評価する
    pub fn evaluate(&self, text: &str, state: &dyn MachineState) -> EvalResult {
        let tokens = self.tokenize(text)?;
        ExpressionEvaluator::new(state).evaluate(&tokens)
    }
}

/// 式評価器
pub struct ExpressionEvaluator<'a> {
    state: &'a dyn MachineState,
}

impl<'a> ExpressionEvaluator<'a> {
    /// 新しい式評価器を作成する
    pub fn new(state: &'a dyn MachineState) -> Self {
        Self { state }
    }

    /// トークン列を評価する
    pub fn evaluate(&self, tokens: &[Token]) -> EvalResult {
        match tokens {
            [] => Err(ExprError::Malformed("missing operand")),
            [token] => self.eval_operand(token),
            _ if is_parenthesized(tokens) => self.evaluate(&tokens[1..tokens.len() - 1]),
            _ => {
                let major = find_major(tokens)?;
                let op = tokens[major].kind;

                let lhs = self.evaluate(&tokens[..major]);
                // 右辺の失敗は常に全体の失敗
                let rhs = self.evaluate(&tokens[major + 1..])?;

                match lhs {
                    Ok(lhs) => apply_binary(lhs, op, rhs),
                    Err(_) if op.is_unary() => self.apply_unary(op, rhs),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// 単一トークンのオペランドを評価する
    fn eval_operand(&self, token: &Token) -> EvalResult {
        let text = token.text.as_deref().unwrap_or_default();
        match token.kind {
            TokenKind::Num => parse_number(text).map_err(|_| ExprError::InvalidLiteral(text.to_string())),
            TokenKind::Reg => self
                .state
                .resolve_register(text)
                .ok_or_else(|| ExprError::UnknownRegister { name: text.to_string() }),
            _ => Err(ExprError::Malformed("expected a number or register")),
        }
    }

    /// 単項演算子を適用する
    fn apply_unary(&self, op: TokenKind, val: Word) -> EvalResult {
        match op {
            TokenKind::Neg => Ok(val.wrapping_neg()),
            TokenKind::Pos => Ok(val),
            TokenKind::Deref => self
                .state
                .read_memory(val, WORD_BYTES)
                .map_err(|e| ExprError::MemoryAccess {
                    addr: val,
                    reason: e.to_string(),
                }),
            _ => Err(ExprError::Malformed("missing left operand")),
        }
    }
}

/// 区間全体が一組の括弧で囲まれているか
///
/// 先頭の `(` に対応する `)` が末尾である場合のみ真。
/// `(1)+(2)` のように途中で深さが0に戻る場合は偽です。
fn is_parenthesized(tokens: &[Token]) -> bool {
    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return false;
    };
    if first.kind != TokenKind::LParen || last.kind != TokenKind::RParen {
        return false;
    }

    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 {
            return i == tokens.len() - 1;
        }
    }
    false
}

/// 主演算子（区間を分割する演算子）の位置を探す
///
/// 括弧の外にある演算子のうち最も結合の弱いものを選ぶ。
/// 同じ強さの二項演算子は右にあるものを優先して左結合にし、
/// 単項演算子は同じ強さの先行候補を上書きしない。
fn find_major(tokens: &[Token]) -> std::result::Result<usize, ExprError> {
    let mut major: Option<(usize, Precedence)> = None;
    let mut depth = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                if depth == 0 {
                    return Err(ExprError::Malformed("unmatched ')'"));
                }
                depth -= 1;
            }
            kind if kind.is_non_operator() || depth > 0 => continue,
            kind => {
                let prec = kind
                    .precedence()
                    .ok_or(ExprError::Malformed("unknown operator"))?;
                let replace = match major {
                    None => true,
                    Some((_, current)) => prec < current || (prec == current && !kind.is_unary()),
                };
                if replace {
                    major = Some((i, prec));
                }
            }
        }
    }

    if depth != 0 {
        return Err(ExprError::Malformed("unmatched '('"));
    }
    major
        .map(|(i, _)| i)
        .ok_or(ExprError::Malformed("missing operator"))
}

/// 二項演算子を適用する
///
/// 算術はワード幅でラップアラウンドする。除算のみ符号付きで行う。
fn apply_binary(lhs: Word, op: TokenKind, rhs: Word) -> EvalResult {
    let val = match op {
        TokenKind::Plus => lhs.wrapping_add(rhs),
        TokenKind::Minus => lhs.wrapping_sub(rhs),
        TokenKind::Mul => lhs.wrapping_mul(rhs),
        TokenKind::Div => {
            if rhs == 0 {
                return Err(ExprError::DivisionByZero);
            }
            (lhs as SWord).wrapping_div(rhs as SWord) as Word
        }
        TokenKind::And => Word::from(lhs != 0 && rhs != 0),
        TokenKind::Or => Word::from(lhs != 0 || rhs != 0),
        TokenKind::Eq => Word::from(lhs == rhs),
        TokenKind::Neq => Word::from(lhs != rhs),
        TokenKind::Lt => Word::from(lhs < rhs),
        TokenKind::Gt => Word::from(lhs > rhs),
        TokenKind::Le => Word::from(lhs <= rhs),
        TokenKind::Ge => Word::from(lhs >= rhs),
        _ => return Err(ExprError::Malformed("operator is not binary")),
    };
    Ok(val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// テスト用のマシン状態
    #[derive(Default)]
    struct MockState {
        registers: HashMap<String, Word>,
        memory: HashMap<Word, Word>,
    }

    impl MockState {
        fn with_register(mut self, name: &str, value: Word) -> Self {
            self.registers.insert(name.to_string(), value);
            self
        }

        fn with_memory(mut self, addr: Word, value: Word) -> Self {
            self.memory.insert(addr, value);
            self
        }
    }

    impl MachineState for MockState {
        fn resolve_register(&self, name: &str) -> Option<Word> {
            self.registers.get(name.trim_start_matches('$')).copied()
        }

        fn read_memory(&self, addr: Word, width: usize) -> Result<Word> {
            assert_eq!(width, WORD_BYTES);
            self.memory
                .get(&addr)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("unmapped"))
        }
    }

    fn eval_with(state: &MockState, text: &str) -> EvalResult {
        ExprEngine::new().unwrap().evaluate(text, state)
    }

    fn eval(text: &str) -> EvalResult {
        eval_with(&MockState::default(), text)
    }

    fn eval_signed(text: &str) -> SWord {
        eval(text).unwrap() as SWord
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("0"), Ok(0));
        assert_eq!(eval("42"), Ok(42));
        assert_eq!(eval("18446744073709551615"), Ok(Word::MAX));
        assert_eq!(eval("0x10"), Ok(16));
        assert_eq!(eval("0xdeadBEEF"), Ok(0xdead_beef));
        assert_eq!(eval("  7  "), Ok(7));
    }

    #[test]
    fn test_literal_overflow() {
        assert_eq!(
            eval("18446744073709551616"),
            Err(ExprError::InvalidLiteral("18446744073709551616".to_string()))
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2+3*4"), Ok(14));
        assert_eq!(eval("(2+3)*4"), Ok(20));
        assert_eq!(eval("1+2==3"), Ok(1));
        assert_eq!(eval("1<2 && 3>4 || 5"), Ok(1));
        assert_eq!(eval("2*3 <= 6"), Ok(1));
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(eval("8-4-2"), Ok(2));
        assert_eq!(eval("64/4/2"), Ok(8));
        assert_eq!(eval("8/2*4"), Ok(16));
    }

    #[test]
    fn test_parentheses_stripping() {
        for text in ["1+2*3", "8-4-2", "-5", "$a0 + 1"] {
            let state = MockState::default().with_register("a0", 9);
            assert_eq!(eval_with(&state, &format!("({})", text)), eval_with(&state, text));
            assert_eq!(eval_with(&state, &format!("(({}))", text)), eval_with(&state, text));
        }
        assert_eq!(eval("(1)+(2)"), Ok(3));
        assert_eq!(eval("((1+2)*(3+4))"), Ok(21));
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval("1--1"), Ok(2));
        assert_eq!(eval("-1+2"), Ok(1));
        assert_eq!(eval_signed("3 - -2"), 5);
        assert_eq!(eval_signed("- - 3"), 3);
        assert_eq!(eval_signed("-(2+3)"), -5);
        assert_eq!(eval_signed("+4"), 4);
        assert_eq!(eval_signed("2*-3"), -6);
        assert_eq!(eval_signed("-2*3"), -6);
    }

    #[test]
    fn test_division() {
        assert_eq!(eval("7/2"), Ok(3));
        assert_eq!(eval_signed("-7/2"), -3);
        assert_eq!(eval_signed("-3/2"), -1);
        assert_eq!(eval_signed("7/-2"), -3);
        assert_eq!(eval("1/0"), Err(ExprError::DivisionByZero));
        assert_eq!(eval("1/(2-2)"), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn test_wraparound() {
        assert_eq!(eval("0xffffffffffffffff + 2"), Ok(1));
        assert_eq!(eval("0 - 1"), Ok(Word::MAX));
        // i64::MIN / -1 はトラップせずラップする
        assert_eq!(eval("0x8000000000000000 / -1"), Ok(0x8000_0000_0000_0000));
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(eval("3 == 3"), Ok(1));
        assert_eq!(eval("3 != 3"), Ok(0));
        assert_eq!(eval("2 < 3"), Ok(1));
        assert_eq!(eval("2 > 3"), Ok(0));
        assert_eq!(eval("3 <= 3"), Ok(1));
        assert_eq!(eval("2 >= 3"), Ok(0));
        assert_eq!(eval("2 && 0"), Ok(0));
        assert_eq!(eval("2 && 5"), Ok(1));
        assert_eq!(eval("0 || 0"), Ok(0));
        assert_eq!(eval("0 || 7"), Ok(1));
        // ワードは符号なしで比較される
        assert_eq!(eval("-1 > 0"), Ok(1));
    }

    #[test]
    fn test_no_short_circuit() {
        // 左辺が偽でも右辺は評価される
        assert_eq!(eval("0 && 1/0"), Err(ExprError::DivisionByZero));
        assert_eq!(eval("1 || $nope"), Err(ExprError::UnknownRegister { name: "$nope".to_string() }));
    }

    #[test]
    fn test_registers() {
        let state = MockState::default().with_register("a0", 10).with_register("sp", 0x8000_1000);
        assert_eq!(eval_with(&state, "$a0"), Ok(10));
        assert_eq!(eval_with(&state, "$a0 * 2 + $sp"), Ok(0x8000_1014));
        assert_eq!(
            eval_with(&state, "$t9"),
            Err(ExprError::UnknownRegister { name: "$t9".to_string() })
        );
    }

    #[test]
    fn test_deref() {
        let state = MockState::default()
            .with_register("sp", 0x8000_0000)
            .with_memory(0x8000_0000, 0x1234)
            .with_memory(0x8000_0008, 5);
        assert_eq!(eval_with(&state, "*$sp"), Ok(0x1234));
        assert_eq!(eval_with(&state, "*($sp + 8) * 2"), Ok(10));
        assert_eq!(eval_with(&state, "*$sp + 1"), Ok(0x1235));
        assert_eq!(eval_with(&state, "2 * *0x80000008"), Ok(10));
        assert!(matches!(
            eval_with(&state, "*0x10"),
            Err(ExprError::MemoryAccess { addr: 0x10, .. })
        ));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(eval("1+"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("(1+2"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("1+2)"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("1 2"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("()"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval(""), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("* / 2"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval(")("), Err(ExprError::Malformed(_))));
        assert_eq!(eval("1 @ 2"), Err(ExprError::NoMatch { offset: 2 }));
    }

    #[test]
    fn test_token_capacity_exceeded() {
        let engine = ExprEngine::with_tokenizer(Tokenizer::with_capacity(4).unwrap());
        let state = MockState::default();
        assert_eq!(engine.evaluate("1+2", &state), Ok(3));
        assert_eq!(
            engine.evaluate("1+2+3", &state),
            Err(ExprError::TooManyTokens { capacity: 4 })
        );
    }

    #[test]
    fn test_find_major() {
        let engine = ExprEngine::new().unwrap();
        let tokens = engine.tokenize("1 + 2 * 3 - 4").unwrap();
        assert_eq!(find_major(&tokens), Ok(5));

        let tokens = engine.tokenize("- - 1").unwrap();
        assert_eq!(find_major(&tokens), Ok(0));

        let tokens = engine.tokenize("(1 + 2) * 3").unwrap();
        assert_eq!(find_major(&tokens), Ok(5));
    }

    #[test]
    fn test_is_parenthesized() {
        let engine = ExprEngine::new().unwrap();
        assert!(is_parenthesized(&engine.tokenize("(1+2)").unwrap()));
        assert!(is_parenthesized(&engine.tokenize("((1)+(2))").unwrap()));
        assert!(!is_parenthesized(&engine.tokenize("(1)+(2)").unwrap()));
        assert!(!is_parenthesized(&engine.tokenize("1+2").unwrap()));
    }
}
