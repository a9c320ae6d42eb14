//! 永続ヒープ.
//!
//! [Region]の先頭に[RegionHeader]を置き、その直後(ヒープベース)から
//! メタデータ付きのブロックを隙間なく積み上げていく.
//!
//! ```text
//! [signature][utilized][active][size][payload...][active][size][payload...]...
//!                      ^
//!                      heap base
//! ```
//!
//! 割当は常にブロック列の末尾に対して行われ、解放済みのブロックが再利用されることはない.
//!
//! [Region]: ../region/trait.Region.html
//! [RegionHeader]: ./struct.RegionHeader.html
use slog::Logger;
use std::ffi::{CStr, CString};
use std::mem;
use std::path::Path;
use std::ptr::{self, NonNull};
use trackable::error::ErrorKindExt;

pub use self::block::{Block, Blocks, METADATA_SIZE};
pub use self::builder::HeapBuilder;
pub use self::header::{RegionHeader, HEADER_SIZE, SIGNATURE_INITIALIZED};

use self::block::BlockHeader;
use crate::metrics::HeapMetrics;
use crate::region::{MappedFile, Region};
use crate::{ErrorKind, Result};

mod block;
mod builder;
mod header;

/// ファイルにマッピングされた永続ヒープ.
///
/// 一つのバッキングストアに対して、同時に存在するインスタンスは一つである必要がある.
///
/// インスタンスが破棄される際には、領域の同期およびアンマップが行われる.
/// 同期やアンマップに失敗した場合でも、その旨がログに出力されるだけで、破棄処理自体は継続される.
#[derive(Debug)]
pub struct Heap<R: Region> {
    region: R,
    utilized: usize,
    logger: Logger,
    metrics: HeapMetrics,
}
impl Heap<MappedFile> {
    /// デフォルト設定で`filepath`のファイルをバッキングストアとしてヒープを開く.
    ///
    /// `HeapBuilder::new().truncate(truncate).open(filepath)`と等しい.
    pub fn open<P: AsRef<Path>>(filepath: P, truncate: bool) -> Result<Self> {
        HeapBuilder::new().truncate(truncate).open(filepath)
    }
}
impl<R: Region> Heap<R> {
    pub(crate) fn new(region: R, utilized: usize, logger: Logger, metrics: HeapMetrics) -> Self {
        Heap {
            region,
            utilized,
            logger,
            metrics,
        }
    }

    /// `size`バイトのブロックを割り当てて、そのペイロードの先頭アドレスを返す.
    ///
    /// ブロックは常にブロック列の末尾に配置される.
    /// ペイロードの内容は初期化されない.
    ///
    /// # Errors
    ///
    /// - `size`が`0`: `ErrorKind::InvalidArgument`
    /// - 空き容量が不足している: `ErrorKind::OutOfSpace`
    ///
    /// エラー時にはヒープの状態は変化しない.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>> {
        track_assert_ne!(size, 0, ErrorKind::InvalidArgument, "Zero-sized allocation");
        let next_utilized = track!(self.reserve(size))?;

        let offset = HEADER_SIZE + self.utilized;
        let header = BlockHeader {
            is_active: true,
            size,
        };
        track!(header.write_to(&mut self.region, offset))?;

        self.utilized = next_utilized;
        track!(RegionHeader::write_utilized(&mut self.region, next_utilized))?;

        self.metrics.allocated_blocks.increment();
        self.metrics.allocated_bytes.add_u64(size as u64);
        self.metrics.utilized_bytes.set(next_utilized as f64);
        Ok(self.pointer_at(offset + METADATA_SIZE))
    }

    /// `text`を終端のNUL文字込みでヒープ上に複製し、その先頭アドレスを返す.
    ///
    /// `self.allocate(text.to_bytes_with_nul().len())`で割り当てたブロックに内容をコピーするのと等しい.
    pub fn duplicate(&mut self, text: &CStr) -> Result<NonNull<u8>> {
        let bytes = text.to_bytes_with_nul();
        let payload = track!(self.allocate(bytes.len()))?;
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), payload.as_ptr(), bytes.len());
        }
        Ok(payload)
    }

    /// `text`をNUL終端文字列としてヒープ上に複製する.
    ///
    /// # Errors
    ///
    /// `text`がNUL文字を含む場合には、種類が`ErrorKind::InvalidArgument`のエラーが返される.
    pub fn duplicate_str(&mut self, text: &str) -> Result<NonNull<u8>> {
        let text = track!(CString::new(text).map_err(|e| ErrorKind::InvalidArgument.cause(e)))?;
        track!(self.duplicate(&text))
    }

    /// `ptr`をペイロードの先頭とするブロックを、解放済みにする.
    ///
    /// ヒープベースからブロック列を辿って該当するブロックを探す.
    /// 見つからなかった場合(ブロックの先頭ではない、あるいはヒープ外のポインタ)には何も行わない.
    ///
    /// 解放されたブロックは領域上に残り続け、後続の割当で再利用されることはない.
    /// また使用済みバイト数も変化しない.
    pub fn release<T>(&mut self, ptr: *const T) {
        let target = ptr as *const u8;
        let found = self
            .blocks()
            .find(|b| b.payload().as_ptr() as *const u8 == target)
            .map(|b| (b.offset(), b.is_active()));
        match found {
            Some((offset, was_active)) => {
                if let Err(e) = BlockHeader::mark_released(&mut self.region, HEADER_SIZE + offset) {
                    warn!(self.logger, "Cannot release a block: {}", e; "offset" => offset);
                } else if was_active {
                    self.metrics.released_blocks.increment();
                }
            }
            None => {
                debug!(self.logger, "Unknown pointer is ignored"; "ptr" => format!("{:p}", target));
            }
        }
    }

    /// ブロック群(メタデータ込み)が消費したバイト数を返す.
    ///
    /// 解放済みのブロックも含まれるので、この値が減ることはない.
    pub fn utilized(&self) -> usize {
        self.utilized
    }

    /// ヒープの容量(バッキングストアのサイズ)を返す.
    ///
    /// ヘッダ領域も含まれるので、ブロック用に使えるのは`capacity() - HEADER_SIZE`バイトとなる.
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// 新たなブロック用に残っているバイト数(メタデータ込み)を返す.
    ///
    /// 次に割当可能なペイロードの最大サイズは、この値から`METADATA_SIZE`を引いたものとなる.
    pub fn available(&self) -> usize {
        self.block_capacity().saturating_sub(self.utilized)
    }

    /// ヒープベース(最初のブロックのメタデータ)のアドレスを返す.
    pub fn heap_base(&self) -> NonNull<u8> {
        self.pointer_at(HEADER_SIZE)
    }

    /// ブロック列を外部から辿るための起点を返す.
    ///
    /// まだ一つもブロックが割り当てられていない場合にはヒープベースを、
    /// そうでない場合には最初のブロックのペイロードの先頭を返す.
    ///
    /// 空かどうかの判定には`utilized() == 0`を使い、
    /// 全ブロックを走査したい場合には[`blocks`](#method.blocks)を使う方が簡単.
    pub fn first_block(&self) -> NonNull<u8> {
        if self.utilized == 0 {
            self.heap_base()
        } else {
            self.pointer_at(HEADER_SIZE + METADATA_SIZE)
        }
    }

    /// 割当順にブロック列を辿るイテレータを返す.
    ///
    /// 解放済みのブロックも含まれる.
    pub fn blocks(&self) -> Blocks<R> {
        Blocks::new(&self.region, self.utilized)
    }

    /// 領域に永続化されているヘッダを読み込んで返す.
    pub fn header(&self) -> Result<RegionHeader> {
        track!(RegionHeader::read_from(&self.region))
    }

    /// ヒープの格納先の領域への参照を返す.
    pub fn region(&self) -> &R {
        &self.region
    }

    /// ヒープのメトリクスを返す.
    pub fn metrics(&self) -> &HeapMetrics {
        &self.metrics
    }

    /// 領域の内容をバッキングストアに同期する.
    pub fn sync(&mut self) -> Result<()> {
        self.metrics.syncs.increment();
        if let Err(e) = self.region.sync() {
            self.metrics.sync_failures.increment();
            return Err(track!(e));
        }
        Ok(())
    }

    /// ヒープを閉じる.
    ///
    /// 領域を同期した上でアンマップする.
    /// インスタンスを破棄するのと等しい.
    pub fn close(self) {
        mem::drop(self);
    }

    fn block_capacity(&self) -> usize {
        self.region.capacity() - HEADER_SIZE
    }

    /// `size`バイトのブロックを置いた場合の使用済みバイト数を返す.
    fn reserve(&mut self, size: usize) -> Result<usize> {
        let next_utilized = size
            .checked_add(METADATA_SIZE)
            .and_then(|extent| extent.checked_add(self.utilized))
            .filter(|&next| next <= self.block_capacity());
        if let Some(next_utilized) = next_utilized {
            return Ok(next_utilized);
        }

        self.metrics.failed_allocations.increment();
        warn!(
            self.logger,
            "Heap capacity exceeded";
            "utilized" => self.utilized,
            "capacity" => self.capacity(),
            "requested" => size
        );
        track_panic!(
            ErrorKind::OutOfSpace,
            "utilized={}, capacity={}, requested={}",
            self.utilized,
            self.capacity(),
            size
        );
    }

    fn pointer_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.region.capacity());
        unsafe { NonNull::new_unchecked(self.region.base().as_ptr().add(offset)) }
    }
}
impl<R: Region> Drop for Heap<R> {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!(self.logger, "Cannot flush the heap: {}", e);
        }
        if let Err(e) = self.region.unmap() {
            warn!(self.logger, "Cannot unmap the heap: {}", e);
        }
        debug!(self.logger, "Heap is closed"; "utilized" => self.utilized);
    }
}
