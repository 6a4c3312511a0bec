//! マシン全体の状態と実行制御

use crate::{MachineState, Memory, Registers, Result, Word};

/// `ebreak` 命令のエンコーディング
pub const EBREAK: u32 = 0x0010_0073;

/// 命令長（バイト）
const INST_LEN: Word = 4;

/// マシンの実行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// 実行中
    Running,
    /// 停止中（ユーザー操作待ち）
    Stopped,
    /// `ebreak` で正常終了
    End { halt_pc: Word, halt_ret: Word },
    /// 命令フェッチ失敗などで異常終了
    Abort { pc: Word },
    /// ユーザーが終了した
    Quit,
}

/// 停止イベントの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// 指定ステップ数の実行完了
    Step,
    /// ウォッチポイントの値が変化した
    Watchpoint(usize),
    /// ゲストプログラムが終了した
    Halted { pc: Word, code: Word },
    /// ゲストプログラムが異常終了した
    Aborted { pc: Word },
    /// ユーザーが終了した
    Quit,
}

/// エミュレートされたマシン
///
/// 命令の意味論はこのクレートの範囲外です。`step` は命令ワードを
/// フェッチし、`ebreak` なら停止、それ以外はpcを進めるだけです。
pub struct Machine {
    memory: Memory,
    registers: Registers,
    state: ExecState,
}

impl Machine {
    /// 指定サイズの物理メモリを持つマシンを作成する
    pub fn new(pmem_size: usize) -> Result<Self> {
        Ok(Self {
            memory: Memory::new(pmem_size)?,
            registers: Registers::new(),
            state: ExecState::Stopped,
        })
    }

    /// メモリを取得する
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// メモリを可変参照で取得する
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// レジスタを取得する
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// レジスタを可変参照で取得する
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    /// 現在の実行状態
    pub fn state(&self) -> ExecState {
        self.state
    }

    /// 実行状態を設定する
    pub fn set_state(&mut self, state: ExecState) {
        self.state = state;
    }

    /// 終了済み（これ以上実行できない）かどうか
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            ExecState::End { .. } | ExecState::Abort { .. } | ExecState::Quit
        )
    }

    /// 1命令実行する
    pub fn step(&mut self) -> Result<ExecState> {
        if self.is_finished() {
            return Ok(self.state);
        }

        let pc = self.registers.pc();
        self.state = match self.memory.read_u32(pc) {
            Ok(EBREAK) => {
                let halt_ret = self.registers.get("a0").unwrap_or(0);
                tracing::debug!("ebreak at 0x{:x}, a0 = {}", pc, halt_ret);
                ExecState::End { halt_pc: pc, halt_ret }
            }
            Ok(_) => {
                self.registers.set_pc(pc.wrapping_add(INST_LEN));
                ExecState::Running
            }
            Err(e) => {
                tracing::warn!("instruction fetch failed at 0x{:x}: {}", pc, e);
                ExecState::Abort { pc }
            }
        };
        Ok(self.state)
    }
}

impl MachineState for Machine {
    fn resolve_register(&self, name: &str) -> Option<Word> {
        self.registers.get(name)
    }

    fn read_memory(&self, addr: Word, width: usize) -> Result<Word> {
        self.memory.read(addr, width)
    }
}
