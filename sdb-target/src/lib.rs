//! sdb ターゲットマシン状態
//!
//! このクレートは、エミュレートされたマシンの状態を提供します。
//! ゲスト物理メモリ、RISC-V 64 のレジスタファイル、実行状態を保持し、
//! 式評価器が使う読み取りインターフェース（`MachineState`）を実装します。

pub mod memory;
pub mod registers;
pub mod machine;

pub use memory::{Memory, MemoryError, MemoryReadable, DEFAULT_PMEM_SIZE, PMEM_BASE};
pub use registers::{Registers, REGISTER_NAMES};
pub use machine::{ExecState, Machine, StopReason};

/// マシンワード（ネイティブのレジスタ幅）
pub type Word = u64;

/// マシンワードの符号付き表現
pub type SWord = i64;

/// マシンワードのバイト数（デリファレンス時の読み取り幅）
pub const WORD_BYTES: usize = std::mem::size_of::<Word>();

/// ターゲット制御の結果型
pub type Result<T> = anyhow::Result<T>;

/// 式評価器から見たマシン状態
///
/// レジスタとメモリの読み取りのみを公開します。
pub trait MachineState {
    /// レジスタ名から現在値を取得する
    ///
    /// 名前は `$` 付きでも付いていなくても構いません。
    /// 未知のレジスタなら `None` を返します。
    fn resolve_register(&self, name: &str) -> Option<Word>;

    /// `addr` から `width` バイトをリトルエンディアンで読み取る
    fn read_memory(&self, addr: Word, width: usize) -> Result<Word>;
}
