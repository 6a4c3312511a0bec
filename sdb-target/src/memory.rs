//! ゲスト物理メモリ

use crate::{Result, Word};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// 物理メモリの開始アドレス
pub const PMEM_BASE: Word = 0x8000_0000;

/// 物理メモリのデフォルトサイズ（128MiB）
pub const DEFAULT_PMEM_SIZE: usize = 128 * 1024 * 1024;

/// メモリアクセスエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("address 0x{addr:x} (len {len}) is out of bound of pmem [0x{base:x}, 0x{end:x})")]
    OutOfBound { addr: Word, len: usize, base: Word, end: Word },
    #[error("unsupported access width {0}")]
    BadWidth(usize),
    #[error("image of {size} bytes does not fit in pmem of {capacity} bytes")]
    ImageTooLarge { size: usize, capacity: usize },
    #[error("cannot allocate pmem of {size} bytes")]
    AllocFailed { size: usize },
}

/// ゲストメモリ上に置ける固定幅の符号なし整数
pub trait MemoryReadable: Sized {
    /// リトルエンディアンのバイト列から復元する
    fn from_le_bytes(bytes: &[u8]) -> Result<Self>;

    /// ゲストのバイト順（リトルエンディアン）に並べる
    fn to_le_bytes(&self) -> Vec<u8>;

    /// アクセス幅（バイト）
    fn size() -> usize;
}

macro_rules! impl_memory_readable {
    ($($ty:ty),*) => {
        $(
            impl MemoryReadable for $ty {
                fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
                    let array: [u8; std::mem::size_of::<$ty>()] = bytes.try_into().map_err(|_| {
                        anyhow::anyhow!(
                            "Failed to convert {} bytes to {} (expected {} bytes)",
                            bytes.len(),
                            stringify!($ty),
                            std::mem::size_of::<$ty>()
                        )
                    })?;
                    Ok(<$ty>::from_le_bytes(array))
                }

                fn to_le_bytes(&self) -> Vec<u8> {
                    (*self).to_le_bytes().to_vec()
                }

                fn size() -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

impl_memory_readable!(u8, u16, u32, u64);

/// ゲスト物理メモリ
///
/// `PMEM_BASE` から始まる連続したバイト列としてモデル化します。
pub struct Memory {
    pmem: Vec<u8>,
}

impl Memory {
    /// 指定サイズのゼロ初期化されたメモリを作成する
    ///
    /// アドレス空間に収まらないサイズや確保できないサイズはエラーになります。
    pub fn new(size: usize) -> Result<Self> {
        let fits = Word::try_from(size).is_ok_and(|size| size <= Word::MAX - PMEM_BASE);
        let mut pmem = Vec::new();
        if !fits || pmem.try_reserve_exact(size).is_err() {
            return Err(MemoryError::AllocFailed { size }.into());
        }
        pmem.resize(size, 0);
        Ok(Self { pmem })
    }

    /// メモリサイズ（バイト数）
    pub fn size(&self) -> usize {
        self.pmem.len()
    }

    /// 物理メモリの終端アドレス（排他的）
    pub fn end(&self) -> Word {
        PMEM_BASE + self.pmem.len() as Word
    }

    /// `[addr, addr+len)` が物理メモリに収まっているか
    pub fn in_range(&self, addr: Word, len: usize) -> bool {
        addr >= PMEM_BASE
            && addr
                .checked_add(len as Word)
                .is_some_and(|end| end <= self.end())
    }

    /// アドレスをpmem内のオフセットに変換する
    fn offset(&self, addr: Word, len: usize) -> std::result::Result<usize, MemoryError> {
        if !self.in_range(addr, len) {
            return Err(MemoryError::OutOfBound {
                addr,
                len,
                base: PMEM_BASE,
                end: self.end(),
            });
        }
        Ok((addr - PMEM_BASE) as usize)
    }

    /// `len` バイトをリトルエンディアンで読み取りワードに拡張する
    ///
    /// `len` は 1, 2, 4, 8 のいずれかです。
    pub fn read(&self, addr: Word, len: usize) -> Result<Word> {
        match len {
            1 => self.read_u8(addr).map(Word::from),
            2 => self.read_u16(addr).map(Word::from),
            4 => self.read_u32(addr).map(Word::from),
            8 => self.read_u64(addr),
            _ => Err(MemoryError::BadWidth(len).into()),
        }
    }

    /// ワードの下位 `len` バイトをリトルエンディアンで書き込む
    pub fn write(&mut self, addr: Word, len: usize, value: Word) -> Result<()> {
        match len {
            1 => self.write_u8(addr, value as u8),
            2 => self.write_u16(addr, value as u16),
            4 => self.write_u32(addr, value as u32),
            8 => self.write_u64(addr, value),
            _ => Err(MemoryError::BadWidth(len).into()),
        }
    }

    /// 生のバイト列を読み取る
    pub fn read_bytes(&self, addr: Word, len: usize) -> Result<&[u8]> {
        let start = self.offset(addr, len)?;
        Ok(&self.pmem[start..start + len])
    }

    /// 生のバイト列を書き込む
    pub fn write_bytes(&mut self, addr: Word, data: &[u8]) -> Result<()> {
        let start = self.offset(addr, data.len())?;
        self.pmem[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// 型の幅で値を読み取る
    ///
    /// # Examples
    /// ```
    /// use sdb_target::{Memory, PMEM_BASE};
    ///
    /// let mut memory = Memory::new(16).unwrap();
    /// memory.write_u64(PMEM_BASE, 0x1122_3344_5566_7788).unwrap();
    ///
    /// let word: u64 = memory.read_typed(PMEM_BASE).unwrap();
    /// let low: u32 = memory.read_typed(PMEM_BASE).unwrap();
    /// assert_eq!(word, 0x1122_3344_5566_7788);
    /// assert_eq!(low, 0x5566_7788);
    /// ```
    pub fn read_typed<T: MemoryReadable>(&self, addr: Word) -> Result<T> {
        let bytes = self.read_bytes(addr, T::size())?;
        T::from_le_bytes(bytes)
    }

    /// 型の幅で値を書き込む
    pub fn write_typed<T: MemoryReadable>(&mut self, addr: Word, value: &T) -> Result<()> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    /// u64値を読み取る（リトルエンディアン）
    pub fn read_u64(&self, addr: Word) -> Result<u64> {
        self.read_typed(addr)
    }

    /// u64値を書き込む（リトルエンディアン）
    pub fn write_u64(&mut self, addr: Word, value: u64) -> Result<()> {
        self.write_typed(addr, &value)
    }

    /// u32値を読み取る（リトルエンディアン）
    pub fn read_u32(&self, addr: Word) -> Result<u32> {
        self.read_typed(addr)
    }

    /// u32値を書き込む（リトルエンディアン）
    pub fn write_u32(&mut self, addr: Word, value: u32) -> Result<()> {
        self.write_typed(addr, &value)
    }

    /// u16値を読み取る（リトルエンディアン）
    pub fn read_u16(&self, addr: Word) -> Result<u16> {
        self.read_typed(addr)
    }

    /// u16値を書き込む（リトルエンディアン）
    pub fn write_u16(&mut self, addr: Word, value: u16) -> Result<()> {
        self.write_typed(addr, &value)
    }

    /// u8値を読み取る
    pub fn read_u8(&self, addr: Word) -> Result<u8> {
        self.read_typed(addr)
    }

    /// u8値を書き込む
    pub fn write_u8(&mut self, addr: Word, value: u8) -> Result<()> {
        self.write_typed(addr, &value)
    }

    /// バイト列を `PMEM_BASE + offset` に配置する
    pub fn load_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let capacity = self.pmem.len();
        if offset.checked_add(data.len()).map_or(true, |end| end > capacity) {
            return Err(MemoryError::ImageTooLarge {
                size: data.len(),
                capacity: capacity.saturating_sub(offset),
            }
            .into());
        }
        self.pmem[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// 生バイナリのイメージファイルを `PMEM_BASE` に読み込む
    ///
    /// 読み込んだバイト数を返します。
    pub fn load_image<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let image = fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read image {}: {}", path.display(), e))?;
        self.load_bytes(0, &image)?;
        tracing::debug!("loaded {} bytes from {} at 0x{:x}", image.len(), path.display(), PMEM_BASE);
        Ok(image.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_widths() {
        let mut mem = Memory::new(64).unwrap();
        mem.write(PMEM_BASE, 8, 0x1122_3344_5566_7788).unwrap();

        assert_eq!(mem.read(PMEM_BASE, 8).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(mem.read(PMEM_BASE, 4).unwrap(), 0x5566_7788);
        assert_eq!(mem.read(PMEM_BASE, 2).unwrap(), 0x7788);
        assert_eq!(mem.read(PMEM_BASE, 1).unwrap(), 0x88);
        assert_eq!(mem.read(PMEM_BASE + 4, 4).unwrap(), 0x1122_3344);
    }

    #[test]
    fn test_out_of_bound() {
        let mem = Memory::new(16).unwrap();
        assert!(mem.read(PMEM_BASE - 1, 1).is_err());
        assert!(mem.read(PMEM_BASE + 12, 8).is_err());
        assert!(mem.read(Word::MAX, 8).is_err());
        assert!(mem.read(PMEM_BASE + 8, 8).is_ok());
    }

    #[test]
    fn test_bad_width() {
        let mem = Memory::new(16).unwrap();
        let err = mem.read(PMEM_BASE, 3).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MemoryError>(),
            Some(&MemoryError::BadWidth(3))
        );
    }

    #[test]
    fn test_new_rejects_unallocatable_size() {
        let err = Memory::new(usize::MAX).err().unwrap();
        assert_eq!(
            err.downcast_ref::<MemoryError>(),
            Some(&MemoryError::AllocFailed { size: usize::MAX })
        );
        assert_eq!(Memory::new(32).unwrap().size(), 32);
    }

    #[test]
    fn test_load_bytes() {
        let mut mem = Memory::new(8).unwrap();
        mem.load_bytes(0, &[0x13, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(mem.read_u32(PMEM_BASE).unwrap(), 0x13);
        assert!(mem.load_bytes(4, &[0; 8]).is_err());
    }
}
