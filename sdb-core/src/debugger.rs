//! デバッガのメインロジック

use crate::errors::{WatchpointError, WatchpointId, ERR_PROGRAM_FINISHED};
use crate::expr_eval::{EvalResult, ExprEngine};
use crate::watchpoint::{Watchpoint, WatchpointHit, WatchpointPool};
use crate::Result;
use sdb_target::{ExecState, Machine, Registers, StopReason, Word, WORD_BYTES};
use std::path::Path;
use tracing::{debug, info};

/// `x` コマンドで読み取る単位（バイト）
const SCAN_UNIT: Word = 4;

/// ステップ実行の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// 停止理由
    pub reason: StopReason,
    /// 実行した命令数
    pub executed: u64,
    /// 値が変化したウォッチポイント
    pub triggered: Vec<WatchpointHit>,
}

/// 式テストファイルの1行分の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprCheck {
    pub line: usize,
    pub expr: String,
    pub expected: Word,
    pub actual: EvalResult,
}

/// 式テストファイルの検査結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExprCheckReport {
    pub passed: usize,
    /// 期待値と一致しなかった、または評価に失敗した行
    pub failures: Vec<ExprCheck>,
    /// 書式が不正で読み飛ばした行番号
    pub skipped: Vec<usize>,
}

impl ExprCheckReport {
    /// 全行が期待値と一致したか
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// デバッガ
pub struct Debugger {
    /// エミュレートされたマシン
    machine: Machine,
    /// 式エンジン
    engine: ExprEngine,
    /// ウォッチポイント管理
    watchpoints: WatchpointPool,
}

impl Debugger {
    /// 指定サイズの物理メモリでデバッガを作成する
    pub fn new(pmem_size: usize) -> Result<Self> {
        Ok(Self::with_machine(Machine::new(pmem_size)?, ExprEngine::new()?))
    }

    /// 既存のマシンと式エンジンからデバッガを作成する
    pub fn with_machine(machine: Machine, engine: ExprEngine) -> Self {
        Self {
            machine,
            engine,
            watchpoints: WatchpointPool::new(),
        }
    }

    /// 生バイナリのイメージを物理メモリに読み込む
    pub fn load_image<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let size = self.machine.memory_mut().load_image(path)?;
        info!("image loaded, {} bytes", size);
        Ok(size)
    }

    /// マシンを取得する
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// マシンを可変参照で取得する
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    /// レジスタを取得する
    pub fn registers(&self) -> &Registers {
        self.machine.registers()
    }

    /// 式を評価する
    pub fn evaluate(&self, text: &str) -> EvalResult {
        self.engine.evaluate(text, &self.machine)
    }

    /// ウォッチポイントを設定する
    pub fn add_watchpoint(&mut self, text: &str) -> std::result::Result<WatchpointId, WatchpointError> {
        self.watchpoints.create(text, &self.engine, &self.machine)
    }

    /// ウォッチポイントを削除する
    pub fn remove_watchpoint(&mut self, id: WatchpointId) -> std::result::Result<Watchpoint, WatchpointError> {
        self.watchpoints.delete(id)
    }

    /// すべてのウォッチポイントを取得する
    pub fn watchpoints(&self) -> impl Iterator<Item = &Watchpoint> {
        self.watchpoints.list()
    }

    /// ウォッチポイントを再評価する
    pub fn poll_watchpoints(&mut self) -> Vec<WatchpointHit> {
        self.watchpoints.poll_all(&self.engine, &self.machine)
    }

    /// 命令を実行する
    ///
    /// `count` が `None` なら停止するまで実行を継続します。
    /// 1命令ごとにウォッチポイントを再評価し、値が変化したら停止します。
    /// マシンが終了した場合は、その命令での変化も `triggered` に含めます。
    pub fn step(&mut self, count: Option<u64>) -> Result<StepOutcome> {
        if self.machine.is_finished() {
            return Err(anyhow::anyhow!(ERR_PROGRAM_FINISHED));
        }

        self.machine.set_state(ExecState::Running);
        let mut executed = 0;

        while count.map_or(true, |n| executed < n) {
            let state = self.machine.step()?;
            executed += 1;

            // 停止する命令の後でもウォッチポイントを確認する
            let triggered: Vec<_> = self
                .poll_watchpoints()
                .into_iter()
                .filter(|hit| hit.changed)
                .collect();

            let reason = match state {
                ExecState::End { halt_pc, halt_ret } => Some(StopReason::Halted {
                    pc: halt_pc,
                    code: halt_ret,
                }),
                ExecState::Abort { pc } => Some(StopReason::Aborted { pc }),
                ExecState::Quit => Some(StopReason::Quit),
                ExecState::Running | ExecState::Stopped => None,
            };
            if let Some(reason) = reason {
                debug!("machine stopped after {} steps: {:?}", executed, reason);
                return Ok(StepOutcome {
                    reason,
                    executed,
                    triggered,
                });
            }

            if let Some(first) = triggered.first() {
                self.machine.set_state(ExecState::Stopped);
                return Ok(StepOutcome {
                    reason: StopReason::Watchpoint(first.id),
                    executed,
                    triggered,
                });
            }
        }

        self.machine.set_state(ExecState::Stopped);
        Ok(StepOutcome {
            reason: StopReason::Step,
            executed,
            triggered: Vec::new(),
        })
    }

    /// ユーザー操作による終了を記録する
    pub fn quit(&mut self) {
        self.machine.set_state(ExecState::Quit);
    }

    /// `expr` の値を先頭アドレスとして4バイト単位で `count` 個読み取る
    pub fn scan_memory(&self, count: usize, expr: &str) -> Result<Vec<(Word, u32)>> {
        let start = self.evaluate(expr)?;
        (0..count as Word)
            .map(|i| -> Result<(Word, u32)> {
                let addr = start.wrapping_add(i * SCAN_UNIT);
                Ok((addr, self.machine.memory().read_u32(addr)?))
            })
            .collect()
    }

    /// レジスタまたはメモリワードに式の値を代入する
    ///
    /// `target` は `$reg` か `*EXPR` の形式です。代入した値を返します。
    pub fn assign(&mut self, target: &str, value: &str) -> Result<Word> {
        let value = self.evaluate(value)?;
        let target = target.trim();

        if target.starts_with('$') {
            self.machine.registers_mut().set(target, value)?;
        } else if let Some(addr) = target.strip_prefix('*') {
            let addr = self.evaluate(addr)?;
            self.machine.memory_mut().write(addr, WORD_BYTES, value)?;
        } else {
            return Err(anyhow::anyhow!(
                "Cannot assign to '{}': expected $reg or *ADDR",
                target
            ));
        }
        debug!("{} <- {}", target, value);
        Ok(value)
    }

    /// 式テストファイルを検査する
    ///
    /// 各行は `<期待値(10進数)> <式>` の形式です。
    pub fn check_expressions<P: AsRef<Path>>(&self, path: P) -> Result<ExprCheckReport> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", path.display(), e))?;

        let mut report = ExprCheckReport::default();
        for (i, line) in content.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parsed = line
                .split_once(char::is_whitespace)
                .and_then(|(expected, expr)| Some((expected.parse::<Word>().ok()?, expr.trim())));
            let Some((expected, expr)) = parsed else {
                report.skipped.push(line_no);
                continue;
            };

            let actual = self.evaluate(expr);
            if actual == Ok(expected) {
                report.passed += 1;
            } else {
                report.failures.push(ExprCheck {
                    line: line_no,
                    expr: expr.to_string(),
                    expected,
                    actual,
                });
            }
        }

        Ok(report)
    }
}

