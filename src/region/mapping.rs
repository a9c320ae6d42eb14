use libc::{self, c_void};
use std::io;
use std::os::unix::io::RawFd;
use std::ptr::{self, NonNull};

use crate::{ErrorKind, Result};

// 既存のマッピングを上書きせずに失敗させる.
//
// 非対応のカーネルではヒント扱いになるが、その場合も返り値のアドレスを検証するので問題ない.
#[cfg(target_os = "linux")]
const FIXED_NOREPLACE: libc::c_int = libc::MAP_FIXED_NOREPLACE;
#[cfg(not(target_os = "linux"))]
const FIXED_NOREPLACE: libc::c_int = 0;

/// `mmap(2)`によって確保されたアドレス範囲.
///
/// インスタンスが破棄される際には、自動でアンマップされる.
#[derive(Debug)]
pub(crate) struct Mapping {
    base: NonNull<u8>,
    len: usize,
    mapped: bool,
}
impl Mapping {
    /// ファイル`fd`の先頭`len`バイトを、仮想アドレス`address`に共有マッピングする.
    ///
    /// 指定アドレスに配置できなかった場合には、種類が`ErrorKind::MapFailed`のエラーが返される.
    pub fn map_file(fd: RawFd, address: usize, len: usize) -> Result<Self> {
        track_assert_ne!(address, 0, ErrorKind::InvalidArgument);
        track_assert_ne!(len, 0, ErrorKind::MapFailed, "Cannot map an empty file");

        let requested = address as *mut c_void;
        let ptr = unsafe {
            libc::mmap(
                requested,
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | FIXED_NOREPLACE,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            track_panic!(
                ErrorKind::MapFailed,
                "Cannot map {} bytes at {:#x}: {}",
                len,
                address,
                io::Error::last_os_error()
            );
        }
        if ptr != requested {
            unsafe {
                libc::munmap(ptr, len);
            }
            track_panic!(
                ErrorKind::MapFailed,
                "Address range is occupied: requested={:#x}, actual={:p}",
                address,
                ptr
            );
        }
        track!(Self::from_raw(ptr, len))
    }

    /// 匿名領域を`len`バイト分マッピングする.
    ///
    /// 配置先のアドレスはOSが決定し、内容はゼロで初期化される.
    pub fn map_anonymous(len: usize) -> Result<Self> {
        track_assert_ne!(len, 0, ErrorKind::InvalidArgument);
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            track_panic!(
                ErrorKind::MapFailed,
                "Cannot map {} anonymous bytes: {}",
                len,
                io::Error::last_os_error()
            );
        }
        track!(Self::from_raw(ptr, len))
    }

    fn from_raw(ptr: *mut c_void, len: usize) -> Result<Self> {
        let base = track_assert_some!(NonNull::new(ptr as *mut u8), ErrorKind::MapFailed);
        Ok(Mapping {
            base,
            len,
            mapped: true,
        })
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// マッピングされたページ群を同期的に書き戻す.
    pub fn sync(&mut self) -> Result<()> {
        track_assert!(self.mapped, ErrorKind::InvalidArgument, "Already unmapped");
        if unsafe { libc::msync(self.base.as_ptr() as *mut c_void, self.len, libc::MS_SYNC) } != 0
        {
            track_io!(Err(io::Error::last_os_error()))
        } else {
            Ok(())
        }
    }

    pub fn unmap(&mut self) -> Result<()> {
        if !self.mapped {
            return Ok(());
        }
        self.mapped = false;
        if unsafe { libc::munmap(self.base.as_ptr() as *mut c_void, self.len) } != 0 {
            track_io!(Err(io::Error::last_os_error()))
        } else {
            Ok(())
        }
    }
}
impl Drop for Mapping {
    fn drop(&mut self) {
        let _ = self.unmap();
    }
}
