//! エラー型とエラーメッセージ定数

use sdb_target::Word;
use thiserror::Error;

/// ウォッチポイントID
pub type WatchpointId = usize;

/// マシンが終了済みの場合のエラーメッセージ
pub const ERR_PROGRAM_FINISHED: &str =
    "The program has ended. To restart the program, exit sdb and run again";

/// 式のトークン化・評価エラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// どのルールにもマッチしなかった
    #[error("no match at position {offset}")]
    NoMatch { offset: usize },
    /// トークン数が上限を超えた
    #[error("too many tokens (capacity {capacity})")]
    TooManyTokens { capacity: usize },
    /// トークン文字列が長すぎる
    #[error("token at position {offset} is too long")]
    TokenTooLong { offset: usize },
    /// 構文的に不正な式
    #[error("malformed expression: {0}")]
    Malformed(&'static str),
    /// 未知のレジスタ
    #[error("unknown register '{name}'")]
    UnknownRegister { name: String },
    /// ゼロ除算
    #[error("division by zero")]
    DivisionByZero,
    /// ワードに収まらない数値リテラル
    #[error("invalid literal '{0}'")]
    InvalidLiteral(String),
    /// デリファレンス先が読めない
    #[error("cannot access memory at 0x{addr:x}: {reason}")]
    MemoryAccess { addr: Word, reason: String },
}

/// ウォッチポイント操作のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatchpointError {
    /// プールが満杯
    #[error("no free watchpoint (capacity {capacity})")]
    PoolExhausted { capacity: usize },
    /// 指定IDのウォッチポイントがない
    #[error("watchpoint {0} not found")]
    NotFound(WatchpointId),
    /// 作成時の式評価に失敗
    #[error("cannot watch '{expr}': {source}")]
    Eval {
        expr: String,
        #[source]
        source: ExprError,
    },
}
