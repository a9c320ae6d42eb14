use std::ptr::NonNull;

use super::mapping::Mapping;
use super::Region;
use crate::Result;

/// 匿名メモリベースの`Region`の実装.
///
/// # 注意
///
/// これはテスト用途を意図した実装であり、内容は永続化されない.
/// また配置先のアドレスはOSが決定するので、インスタンス間でアドレスが一致する保証もない.
#[derive(Debug)]
pub struct MemoryRegion {
    mapping: Mapping,
}
impl MemoryRegion {
    /// 容量が`capacity`バイトの`MemoryRegion`インスタンスを生成する.
    ///
    /// 内容はゼロで初期化される.
    pub fn new(capacity: usize) -> Result<Self> {
        let mapping = track!(Mapping::map_anonymous(capacity))?;
        Ok(MemoryRegion { mapping })
    }
}
impl Region for MemoryRegion {
    fn base(&self) -> NonNull<u8> {
        self.mapping.base()
    }
    fn capacity(&self) -> usize {
        self.mapping.len()
    }
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
    fn unmap(&mut self) -> Result<()> {
        track!(self.mapping.unmap())
    }
}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn it_works() -> TestResult {
        let mut region = track!(MemoryRegion::new(1024))?;
        assert_eq!(region.capacity(), 1024);
        assert_eq!(track!(region.read_word(0))?, 0);

        track!(region.write_word(8, 3))?;
        track!(region.sync())?;
        assert_eq!(track!(region.read_word(8))?, 3);

        track!(region.unmap())?;
        track!(region.unmap())?;
        Ok(())
    }

    #[test]
    fn empty_region_is_rejected() {
        assert_eq!(
            MemoryRegion::new(0).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidArgument)
        );
    }
}
