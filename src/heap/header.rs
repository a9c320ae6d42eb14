use crate::region::{Region, WORD_SIZE};
use crate::Result;

/// ヘッダを表現するのに必要なバイト数.
///
/// 最初のブロックはこの位置(ヒープベース)から始まる.
pub const HEADER_SIZE: usize = 2 * WORD_SIZE;

/// 領域が初期化済みであることを示すシグネチャ.
pub const SIGNATURE_INITIALIZED: usize = 1;

const SIGNATURE_OFFSET: usize = 0;
const UTILIZED_OFFSET: usize = WORD_SIZE;

/// 領域の先頭に置かれるヘッダ.
///
/// ブロック群の妥当性の検証は行われず、
/// シグネチャが正しければ`utilized`までのブロック列は正しいものとして扱われる.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionHeader {
    /// 初期化済みかどうかを示す値.
    ///
    /// `SIGNATURE_INITIALIZED`以外の値は、未初期化であることを意味する.
    pub signature: usize,

    /// ブロック群(メタデータ込み)が消費したバイト数.
    pub utilized: usize,
}
impl RegionHeader {
    /// 空のヒープを表すヘッダを返す.
    pub fn new() -> Self {
        RegionHeader {
            signature: SIGNATURE_INITIALIZED,
            utilized: 0,
        }
    }

    /// このヘッダを持つ領域が、初期化済みのヒープを保持しているかどうか.
    pub fn is_initialized(&self) -> bool {
        self.signature == SIGNATURE_INITIALIZED
    }

    /// ヘッダ情報を`region`から読み込む.
    pub fn read_from<R: Region>(region: &R) -> Result<Self> {
        let signature = track!(region.read_word(SIGNATURE_OFFSET))?;
        let utilized = track!(region.read_word(UTILIZED_OFFSET))?;
        Ok(RegionHeader {
            signature,
            utilized,
        })
    }

    /// ヘッダ情報を`region`に書き込む.
    pub fn write_to<R: Region>(&self, region: &mut R) -> Result<()> {
        track!(region.write_word(SIGNATURE_OFFSET, self.signature))?;
        track!(region.write_word(UTILIZED_OFFSET, self.utilized))?;
        Ok(())
    }

    /// `utilized`フィールドのみを`region`に書き込む.
    pub(crate) fn write_utilized<R: Region>(region: &mut R, utilized: usize) -> Result<()> {
        track!(region.write_word(UTILIZED_OFFSET, utilized))
    }
}
impl Default for RegionHeader {
    fn default() -> Self {
        Self::new()
    }
}
