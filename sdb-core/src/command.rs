//! デバッガコマンド

use crate::errors::WatchpointId;
use crate::parse::parse_number;
use std::path::PathBuf;
use thiserror::Error;

/// `info` コマンドの対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoTarget {
    /// `info r`
    Registers,
    /// `info w`
    Watchpoints,
}

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// ヘルプ表示
    Help(Option<String>),
    /// 実行継続
    Continue,
    /// 終了
    Quit,
    /// N命令ステップ実行
    Step(u64),
    /// レジスタ・ウォッチポイント情報の表示
    Info(InfoTarget),
    /// メモリの走査: `x N EXPR`
    Examine { count: usize, expr: String },
    /// 式の評価: `p EXPR`
    Print(String),
    /// ウォッチポイントの設定: `w EXPR`
    Watch(String),
    /// ウォッチポイントの削除: `d N`
    Delete(WatchpointId),
    /// レジスタ・メモリへの代入: `set $reg = EXPR`
    Set { target: String, value: String },
    /// 式のテストファイルを検査: `t FILE`
    Test(PathBuf),
}

/// コマンドのパースエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid argument '{0}'")]
    InvalidArgument(String),
}

impl Command {
    /// `help` で表示するコマンド一覧
    pub const TABLE: &'static [(&'static str, &'static str)] = &[
        ("help", "Display information about all supported commands"),
        ("c", "Continue the execution of the program"),
        ("q", "Exit sdb"),
        ("si", "Step N instructions (si [N], default 1)"),
        ("info", "Print registers (info r) or watchpoints (info w)"),
        ("x", "Scan N 4-byte words starting at EXPR (x N EXPR)"),
        ("p", "Evaluate an expression (p EXPR)"),
        ("w", "Pause when the value of EXPR changes (w EXPR)"),
        ("d", "Delete watchpoint N (d N)"),
        ("set", "Assign to a register or memory word (set $reg = EXPR, set *ADDR = EXPR)"),
        ("t", "Check expressions from a file of '<expected> <expr>' lines (t FILE)"),
    ];

    /// コマンド文字列をパースする
    ///
    /// 空行なら `Ok(None)` を返します。
    pub fn parse(input: &str) -> Result<Option<Self>, CommandError> {
        let input = input.trim();
        let (name, args) = match input.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (input, ""),
        };
        if name.is_empty() {
            return Ok(None);
        }

        let command = match name {
            "help" | "h" | "?" => Command::Help((!args.is_empty()).then(|| args.to_string())),
            "continue" | "c" => Command::Continue,
            "quit" | "q" | "exit" => Command::Quit,
            "si" => {
                let steps = if args.is_empty() { 1 } else { Self::number(args)? };
                Command::Step(steps)
            }
            "info" => match args {
                "r" => Command::Info(InfoTarget::Registers),
                "w" => Command::Info(InfoTarget::Watchpoints),
                _ => return Err(CommandError::Usage("info r|w")),
            },
            "x" => {
                let (count, expr) = args
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage("x N EXPR"))?;
                let count = usize::try_from(Self::number(count)?)
                    .map_err(|_| CommandError::InvalidArgument(count.to_string()))?;
                Command::Examine {
                    count,
                    expr: expr.trim().to_string(),
                }
            }
            "p" | "print" => Command::Print(Self::required(args, "p EXPR")?),
            "w" | "watch" => Command::Watch(Self::required(args, "w EXPR")?),
            "d" | "delete" => {
                let id = Self::required(args, "d N")?;
                let id = usize::try_from(Self::number(&id)?)
                    .map_err(|_| CommandError::InvalidArgument(id.clone()))?;
                Command::Delete(id)
            }
            "set" => {
                let (target, value) = args
                    .split_once('=')
                    .ok_or(CommandError::Usage("set $reg = EXPR | set *ADDR = EXPR"))?;
                let (target, value) = (target.trim(), value.trim());
                if target.is_empty() || value.is_empty() {
                    return Err(CommandError::Usage("set $reg = EXPR | set *ADDR = EXPR"));
                }
                Command::Set {
                    target: target.to_string(),
                    value: value.to_string(),
                }
            }
            "t" | "test" => Command::Test(PathBuf::from(Self::required(args, "t FILE")?)),
            _ => return Err(CommandError::Unknown(name.to_string())),
        };
        Ok(Some(command))
    }

    /// 空でない引数を要求する
    fn required(args: &str, usage: &'static str) -> Result<String, CommandError> {
        if args.is_empty() {
            Err(CommandError::Usage(usage))
        } else {
            Ok(args.to_string())
        }
    }

    fn number(arg: &str) -> Result<u64, CommandError> {
        parse_number(arg).map_err(|_| CommandError::InvalidArgument(arg.to_string()))
    }

    /// コマンド名から説明を検索する
    pub fn describe(name: &str) -> Option<&'static str> {
        Self::TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, desc)| *desc)
    }
}
