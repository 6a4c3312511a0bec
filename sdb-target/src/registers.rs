//! レジスタファイル（RISC-V 64）

use crate::{Result, Word, PMEM_BASE};

/// 汎用レジスタ名（ABI名、インデックス順）
pub const REGISTER_NAMES: [&str; 32] = [
    "$0", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// レジスタ情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    gpr: [Word; 32],
    pc: Word,
}

/// レジスタの指定先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegisterRef {
    Gpr(usize),
    Pc,
}

impl Registers {
    /// リセット状態のレジスタファイルを作成する
    pub fn new() -> Self {
        Self {
            gpr: [0; 32],
            pc: PMEM_BASE,
        }
    }

    /// 名前をレジスタに解決する
    ///
    /// `$a0` と `a0`、`x10` はいずれも同じレジスタを指します。
    /// `$0` は `$` を外すと `0` になるため、`0` も受け付けます。
    fn lookup(name: &str) -> Option<RegisterRef> {
        if name == "$0" || name == "0" {
            return Some(RegisterRef::Gpr(0));
        }
        let name = name.strip_prefix('$').unwrap_or(name);
        if name == "pc" {
            return Some(RegisterRef::Pc);
        }
        if let Some(index) = REGISTER_NAMES.iter().position(|&n| n == name) {
            return Some(RegisterRef::Gpr(index));
        }
        // x0..x31 のアーキテクチャ名
        let index: usize = name.strip_prefix('x')?.parse().ok()?;
        (index < 32).then_some(RegisterRef::Gpr(index))
    }

    /// 名前でレジスタを読み取る
    pub fn get(&self, name: &str) -> Option<Word> {
        match Self::lookup(name)? {
            RegisterRef::Gpr(i) => Some(self.gpr[i]),
            RegisterRef::Pc => Some(self.pc),
        }
    }

    /// 名前でレジスタに書き込む
    ///
    /// `$0` への書き込みは無視され、値は常に0のままです。
    pub fn set(&mut self, name: &str, value: Word) -> Result<()> {
        match Self::lookup(name) {
            Some(RegisterRef::Gpr(0)) => {}
            Some(RegisterRef::Gpr(i)) => self.gpr[i] = value,
            Some(RegisterRef::Pc) => self.pc = value,
            None => return Err(anyhow::anyhow!("Unknown register '{}'", name)),
        }
        Ok(())
    }

    /// インデックスで汎用レジスタを読み取る
    pub fn gpr(&self, index: usize) -> Option<Word> {
        self.gpr.get(index).copied()
    }

    /// プログラムカウンタを取得する
    pub fn pc(&self) -> Word {
        self.pc
    }

    /// プログラムカウンタを設定する
    pub fn set_pc(&mut self, pc: Word) {
        self.pc = pc;
    }

    /// 汎用レジスタを `(名前, 値)` の組でインデックス順に列挙する
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Word)> + '_ {
        REGISTER_NAMES.iter().copied().zip(self.gpr.iter().copied())
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_aliases() {
        let mut regs = Registers::new();
        regs.set("a0", 42).unwrap();

        assert_eq!(regs.get("$a0"), Some(42));
        assert_eq!(regs.get("a0"), Some(42));
        assert_eq!(regs.get("x10"), Some(42));
        assert_eq!(regs.gpr(10), Some(42));
    }

    #[test]
    fn test_zero_register_is_hardwired() {
        let mut regs = Registers::new();
        regs.set("$0", 7).unwrap();
        regs.set("x0", 7).unwrap();
        assert_eq!(regs.get("$0"), Some(0));
    }

    #[test]
    fn test_pc() {
        let mut regs = Registers::new();
        assert_eq!(regs.get("$pc"), Some(PMEM_BASE));
        regs.set("$pc", 0x8000_0004).unwrap();
        assert_eq!(regs.pc(), 0x8000_0004);
    }

    #[test]
    fn test_unknown_register() {
        let mut regs = Registers::new();
        assert_eq!(regs.get("$foo"), None);
        assert_eq!(regs.get("x32"), None);
        assert!(regs.set("$foo", 1).is_err());
    }

    #[test]
    fn test_iter_order() {
        let regs = Registers::new();
        let names: Vec<_> = regs.iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), 32);
        assert_eq!(names[0], "$0");
        assert_eq!(names[31], "t6");
    }
}
