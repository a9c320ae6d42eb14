use std::iter::FusedIterator;
use std::ptr::NonNull;

use super::header::HEADER_SIZE;
use crate::region::{Region, WORD_SIZE};
use crate::Result;

/// 各ブロックの先頭に埋め込まれるメタデータのサイズ.
pub const METADATA_SIZE: usize = 2 * WORD_SIZE;

const ACTIVE: usize = 1;
const RELEASED: usize = 0;

/// ブロックのメタデータ.
///
/// `offset`は全て領域の先頭からの位置.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    pub is_active: bool,
    pub size: usize,
}
impl BlockHeader {
    pub fn read_from<R: Region>(region: &R, offset: usize) -> Result<Self> {
        let active = track!(region.read_word(offset))?;
        let size = track!(region.read_word(offset + WORD_SIZE))?;
        Ok(BlockHeader {
            is_active: active != RELEASED,
            size,
        })
    }

    pub fn write_to<R: Region>(&self, region: &mut R, offset: usize) -> Result<()> {
        let active = if self.is_active { ACTIVE } else { RELEASED };
        track!(region.write_word(offset, active))?;
        track!(region.write_word(offset + WORD_SIZE, self.size))?;
        Ok(())
    }

    pub fn mark_released<R: Region>(region: &mut R, offset: usize) -> Result<()> {
        track!(region.write_word(offset, RELEASED))
    }
}

/// ヒープ内の一つのブロック.
///
/// [`Heap::blocks`](./struct.Heap.html#method.blocks)が返すイテレータの要素.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    offset: usize,
    is_active: bool,
    size: usize,
    payload: NonNull<u8>,
}
impl Block {
    /// ヒープベースから、このブロックのメタデータまでのオフセット.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// ブロックが使用中かどうか.
    ///
    /// 解放済みのブロックも、領域上には残り続ける.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// ペイロードのサイズ(メタデータを含まない).
    pub fn size(&self) -> usize {
        self.size
    }

    /// ペイロードの先頭アドレス.
    pub fn payload(&self) -> NonNull<u8> {
        self.payload
    }

    /// ヒープベースから、このブロックの終端(次のブロックの開始位置)までのオフセット.
    pub fn end_offset(&self) -> usize {
        self.offset + METADATA_SIZE + self.size
    }
}

/// ヒープベースから順にブロック列を辿るイテレータ.
///
/// 走査は、永続化されている使用済みバイト数に達した時点で終了する.
/// 領域からはみ出すブロックに遭遇した場合には、その時点で打ち切られる.
#[derive(Debug)]
pub struct Blocks<'a, R: 'a> {
    region: &'a R,
    offset: usize,
    utilized: usize,
}
impl<'a, R: Region> Blocks<'a, R> {
    pub(crate) fn new(region: &'a R, utilized: usize) -> Self {
        Blocks {
            region,
            offset: 0,
            utilized,
        }
    }

    fn read_block(&self) -> Option<Block> {
        let region_offset = HEADER_SIZE.checked_add(self.offset)?;
        let header = BlockHeader::read_from(self.region, region_offset).ok()?;
        let payload_offset = region_offset + METADATA_SIZE;
        let end = payload_offset.checked_add(header.size)?;
        if end > self.region.capacity() {
            return None;
        }
        let payload = unsafe { NonNull::new_unchecked(self.region.base().as_ptr().add(payload_offset)) };
        Some(Block {
            offset: self.offset,
            is_active: header.is_active,
            size: header.size,
            payload,
        })
    }
}
impl<'a, R: Region> Iterator for Blocks<'a, R> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.utilized {
            return None;
        }
        match self.read_block() {
            Some(block) => {
                self.offset = block.end_offset();
                Some(block)
            }
            None => {
                self.offset = self.utilized;
                None
            }
        }
    }
}
impl<'a, R: Region> FusedIterator for Blocks<'a, R> {}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;
    use crate::region::MemoryRegion;

    #[test]
    fn block_header_works() -> TestResult {
        let mut region = track!(MemoryRegion::new(128))?;
        let header = BlockHeader {
            is_active: true,
            size: 5,
        };
        track!(header.write_to(&mut region, 20))?;
        assert_eq!(track!(region.read_word(20))?, 1);
        assert_eq!(track!(region.read_word(20 + WORD_SIZE))?, 5);
        assert_eq!(track!(BlockHeader::read_from(&region, 20))?, header);

        track!(BlockHeader::mark_released(&mut region, 20))?;
        let header = track!(BlockHeader::read_from(&region, 20))?;
        assert!(!header.is_active);
        assert_eq!(header.size, 5);
        Ok(())
    }

    #[test]
    fn blocks_works() -> TestResult {
        let mut region = track!(MemoryRegion::new(256))?;
        let sizes = [3, 16, 1];
        let mut offset = HEADER_SIZE;
        for &size in &sizes {
            let header = BlockHeader {
                is_active: size != 16,
                size,
            };
            track!(header.write_to(&mut region, offset))?;
            offset += METADATA_SIZE + size;
        }
        let utilized = offset - HEADER_SIZE;

        let blocks = Blocks::new(&region, utilized).collect::<Vec<_>>();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].offset(), 0);
        assert_eq!(blocks[1].offset(), METADATA_SIZE + 3);
        assert_eq!(blocks[2].offset(), 2 * METADATA_SIZE + 3 + 16);
        assert_eq!(blocks[2].end_offset(), utilized);
        assert_eq!(
            blocks.iter().map(|b| b.size()).collect::<Vec<_>>(),
            sizes.to_vec()
        );
        assert_eq!(
            blocks.iter().map(|b| b.is_active()).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert_eq!(
            blocks[0].payload().as_ptr() as usize,
            region.base().as_ptr() as usize + HEADER_SIZE + METADATA_SIZE
        );

        // 使用済みバイト数までしか辿らない
        assert_eq!(Blocks::new(&region, 0).count(), 0);
        assert_eq!(Blocks::new(&region, METADATA_SIZE + 3).count(), 1);
        Ok(())
    }

    #[test]
    fn blocks_stops_at_region_boundary() -> TestResult {
        let mut region = track!(MemoryRegion::new(64))?;
        let header = BlockHeader {
            is_active: true,
            size: 1024,
        };
        track!(header.write_to(&mut region, HEADER_SIZE))?;

        // 壊れたブロック列は途中で打ち切られる
        let mut blocks = Blocks::new(&region, 2048);
        assert!(blocks.next().is_none());
        assert!(blocks.next().is_none());
        Ok(())
    }
}
