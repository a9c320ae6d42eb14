//! ヒープの格納先となる固定アドレスのバイト列(領域)のインタフェース定義と実装群.
//!
//! このモジュールは[Heap](../heap/struct.Heap.html)がブロックの読み書きに使用する
//! 永続化領域を提供する.
use byteorder::{ByteOrder, NativeEndian};
use std::mem;
use std::ptr::NonNull;
use std::slice;

pub use self::mapped_file::{MappedFile, MappedFileBuilder};
pub use self::memory::MemoryRegion;

use crate::{ErrorKind, Result};

mod mapped_file;
mod mapping;
mod memory;

/// ヘッダおよびブロックのメタデータを構成するワードのサイズ(バイト単位).
pub const WORD_SIZE: usize = mem::size_of::<usize>();

/// 領域のマッピング先として使用されるデフォルトの仮想アドレス.
#[cfg(target_pointer_width = "64")]
pub const DEFAULT_BASE_ADDRESS: usize = 0x6000_0000_0000;

/// 領域のマッピング先として使用されるデフォルトの仮想アドレス.
#[cfg(not(target_pointer_width = "64"))]
pub const DEFAULT_BASE_ADDRESS: usize = 0x6000_0000;

/// ヒープの格納先となる領域を表すトレイト.
///
/// "領域"はプロセスのアドレス空間上に配置された連続したバイト列で、
/// 先頭アドレスおよび容量は、インスタンスの生存期間中は変化しない.
///
/// ワード単位の読み書きはネイティブエンディアンで行われ、アライメントは要求されない.
pub trait Region {
    /// 領域の先頭アドレスを返す.
    fn base(&self) -> NonNull<u8>;

    /// 領域の容量(バイト単位)を返す.
    fn capacity(&self) -> usize;

    /// 領域の内容を、バッキングストアに同期する.
    ///
    /// 永続化を伴わない実装の場合には、このメソッド内で特に何かを行う必要はない.
    fn sync(&mut self) -> Result<()>;

    /// 領域をアドレス空間から取り除く.
    ///
    /// 二回目以降の呼び出しは何も行わない.
    /// 呼び出し後に、領域の内容にアクセスしてはならない.
    fn unmap(&mut self) -> Result<()>;

    /// `offset`の位置からワードを読み込む.
    ///
    /// # Errors
    ///
    /// ワードが領域の範囲外にはみ出す場合には、種類が`ErrorKind::InvalidArgument`のエラーが返される.
    fn read_word(&self, offset: usize) -> Result<usize> {
        track!(check_range(self.capacity(), offset, WORD_SIZE))?;
        let bytes = unsafe { slice::from_raw_parts(self.base().as_ptr().add(offset), WORD_SIZE) };
        Ok(NativeEndian::read_uint(bytes, WORD_SIZE) as usize)
    }

    /// `offset`の位置にワードを書き込む.
    ///
    /// # Errors
    ///
    /// ワードが領域の範囲外にはみ出す場合には、種類が`ErrorKind::InvalidArgument`のエラーが返される.
    fn write_word(&mut self, offset: usize, value: usize) -> Result<()> {
        track!(check_range(self.capacity(), offset, WORD_SIZE))?;
        let bytes =
            unsafe { slice::from_raw_parts_mut(self.base().as_ptr().add(offset), WORD_SIZE) };
        NativeEndian::write_uint(bytes, value as u64, WORD_SIZE);
        Ok(())
    }

    /// `offset`の位置に`bytes`を書き込む.
    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        track!(check_range(self.capacity(), offset, bytes.len()))?;
        let dst =
            unsafe { slice::from_raw_parts_mut(self.base().as_ptr().add(offset), bytes.len()) };
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

fn check_range(capacity: usize, offset: usize, len: usize) -> Result<()> {
    let end = track_assert_some!(
        offset.checked_add(len),
        ErrorKind::InvalidArgument,
        "offset={}, len={}",
        offset,
        len
    );
    track_assert!(end <= capacity, ErrorKind::InvalidArgument; offset, len, capacity);
    Ok(())
}

/// テストごとに重複しないマッピング先アドレスを返す.
///
/// 同一プロセス内で並行に実行されるテスト同士が、同じアドレス範囲を奪い合わないようにするために使う.
#[cfg(test)]
pub(crate) fn unique_base_address() -> usize {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);
    let slot = NEXT_SLOT.fetch_add(1, Ordering::SeqCst);
    0x6100_0000_0000 + slot * 0x1_0000_0000
}
