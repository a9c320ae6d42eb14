use libc;
use std::fs::{self, File};
use std::mem;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use super::mapping::Mapping;
use super::{Region, DEFAULT_BASE_ADDRESS};
use crate::{Error, ErrorKind, Result};

/// `MappedFile`のビルダ.
#[derive(Debug, Clone)]
pub struct MappedFileBuilder {
    base_address: usize,
}
impl MappedFileBuilder {
    /// デフォルト設定で`MappedFileBuilder`インスタンスを作成する.
    ///
    /// デフォルトのマッピング先は`DEFAULT_BASE_ADDRESS`.
    pub fn new() -> Self {
        MappedFileBuilder {
            base_address: DEFAULT_BASE_ADDRESS,
        }
    }

    /// ファイルをマッピングする仮想アドレスを設定する.
    ///
    /// ページ境界に揃っている必要がある.
    /// 揃っていない場合には、オープン時に`ErrorKind::MapFailed`エラーとなる.
    pub fn base_address(&mut self, address: usize) -> &mut Self {
        self.base_address = address;
        self
    }

    /// 既存のファイルを開いて`MappedFile`インスタンスを生成する.
    ///
    /// ファイルは読み書き可能モードで開かれ、マッピングが完了した時点で閉じられる.
    /// 領域の容量はオープン時のファイルサイズで固定される.
    ///
    /// # Errors
    ///
    /// - ファイルが存在しない: `ErrorKind::NotFound`
    /// - 読み書きの権限がない: `ErrorKind::PermissionDenied`
    /// - 通常のファイルではない: `ErrorKind::NotRegularFile`
    /// - ファイルサイズがアドレス空間に収まらない: `ErrorKind::InvalidArgument`
    /// - 指定アドレスにマッピングできない: `ErrorKind::MapFailed`
    pub fn open<P: AsRef<Path>>(&self, filepath: P) -> Result<MappedFile> {
        let path = filepath.as_ref().to_path_buf();
        let file = track!(self.open_file(&path), "path={:?}", path)?;

        let metadata = track_io!(file.metadata())?;
        track_assert!(
            metadata.file_type().is_file(),
            ErrorKind::NotRegularFile,
            "path={:?}",
            path
        );
        track_assert!(
            metadata.len() <= usize::max_value() as u64,
            ErrorKind::InvalidArgument,
            "Too large file: {} bytes",
            metadata.len()
        );
        let capacity = metadata.len() as usize;

        let mapping = track!(
            Mapping::map_file(file.as_raw_fd(), self.base_address, capacity),
            "path={:?}",
            path
        )?;

        // 以後の読み書きは全てマッピング経由で行う
        mem::drop(file);

        Ok(MappedFile { path, mapping })
    }

    fn open_file(&self, path: &Path) -> Result<File> {
        let mut options = fs::OpenOptions::new();
        options.read(true).write(true).create(false);
        match options.open(path) {
            Ok(file) => Ok(file),
            Err(ref e) if e.raw_os_error() == Some(libc::EISDIR) => {
                track_panic!(ErrorKind::NotRegularFile, "Is a directory")
            }
            Err(e) => Err(track!(Error::from(e))),
        }
    }
}
impl Default for MappedFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 固定の仮想アドレスに共有マッピングされたファイル.
///
/// 領域への書き込みはページキャッシュ経由でファイルに反映され、
/// `sync`の呼び出し時(およびOSの判断で任意の時点)に永続化される.
///
/// インスタンスが破棄される際には、自動でアンマップされる(同期は行われない).
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    mapping: Mapping,
}
impl MappedFile {
    /// デフォルト設定で既存のファイルを開き`MappedFile`インスタンスを生成する.
    pub fn open<P: AsRef<Path>>(filepath: P) -> Result<Self> {
        MappedFileBuilder::new().open(filepath)
    }

    /// マッピング元のファイルのパスを返す.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
impl Region for MappedFile {
    fn base(&self) -> NonNull<u8> {
        self.mapping.base()
    }
    fn capacity(&self) -> usize {
        self.mapping.len()
    }
    fn sync(&mut self) -> Result<()> {
        track!(self.mapping.sync(), "path={:?}", self.path)
    }
    fn unmap(&mut self) -> Result<()> {
        track!(self.mapping.unmap(), "path={:?}", self.path)
    }
}
