//! sdb デバッガのコア機能
//!
//! このクレートは、簡易デバッガ（モニタ）の中核となるロジックを提供します。
//! 式の字句解析と評価、ウォッチポイント管理、コマンド解析を
//! ターゲットマシンの状態と統合します。

pub mod debugger;
pub mod command;
pub mod errors;
pub mod expr_eval;
pub mod parse;
pub mod token;
pub mod tokenizer;
pub mod watchpoint;

pub use debugger::{Debugger, ExprCheck, ExprCheckReport, StepOutcome};
pub use command::{Command, CommandError, InfoTarget};
pub use errors::{ExprError, WatchpointError, WatchpointId};
pub use expr_eval::{EvalResult, ExprEngine, ExpressionEvaluator};
pub use token::{Token, TokenKind};
pub use tokenizer::Tokenizer;
pub use watchpoint::{Watchpoint, WatchpointHit, WatchpointPool, NR_WP};

// 他のクレートから使用するために再エクスポート
pub use sdb_target::{ExecState, StopReason, Word};

/// デバッガの結果型
pub type Result<T> = anyhow::Result<T>;
