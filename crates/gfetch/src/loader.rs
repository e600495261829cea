//! Platform file loader
//!
//! Blocking open/size/pread primitives, invoked only from worker-thread
//! context (or inline on single-threaded platforms). On Unix this goes
//! through raw libc calls; elsewhere it falls back to `std::fs`.
//!
//! A read that returns fewer bytes than requested is reported as-is;
//! the request handler treats it as fatal for that request and never
//! retries.

use std::path::Path;

use gfetch_core::ErrorCode;

/// Loader failure, converted to an `ErrorCode` at the request level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoaderError {
    /// Path does not exist or cannot be opened for reading.
    NotFound,

    /// Any other platform I/O failure, with the raw OS error code.
    Io(i32),
}

impl From<LoaderError> for ErrorCode {
    fn from(e: LoaderError) -> Self {
        match e {
            LoaderError::NotFound => ErrorCode::NotFound,
            LoaderError::Io(_) => ErrorCode::Unknown,
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        /// An open file, closed on drop.
        #[derive(Debug)]
        pub(crate) struct FileHandle {
            fd: libc::c_int,
        }

        impl FileHandle {
            pub(crate) fn open(path: &Path) -> Result<FileHandle, LoaderError> {
                let cpath = CString::new(path.as_os_str().as_bytes())
                    .map_err(|_| LoaderError::NotFound)?;
                // Safety: cpath is a valid NUL-terminated string.
                let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
                if fd < 0 {
                    let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
                    if errno == libc::ENOENT || errno == libc::EACCES {
                        Err(LoaderError::NotFound)
                    } else {
                        Err(LoaderError::Io(errno))
                    }
                } else {
                    Ok(FileHandle { fd })
                }
            }

            pub(crate) fn size(&self) -> Result<u64, LoaderError> {
                // Safety: stat buffer is zeroed and fd is open.
                let mut st: libc::stat = unsafe { std::mem::zeroed() };
                let rc = unsafe { libc::fstat(self.fd, &mut st) };
                if rc != 0 {
                    let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
                    return Err(LoaderError::Io(errno));
                }
                Ok(st.st_size as u64)
            }

            /// Read into `dst` starting at byte `offset`.
            ///
            /// Returns the number of bytes actually read, which may be
            /// short at end of file.
            pub(crate) fn pread(&mut self, offset: u64, dst: &mut [u8]) -> Result<usize, LoaderError> {
                let mut total = 0usize;
                while total < dst.len() {
                    let remaining = &mut dst[total..];
                    // Safety: remaining points at writable memory of the
                    // given length for the duration of the call.
                    let n = unsafe {
                        libc::pread(
                            self.fd,
                            remaining.as_mut_ptr() as *mut libc::c_void,
                            remaining.len(),
                            (offset + total as u64) as libc::off_t,
                        )
                    };
                    if n < 0 {
                        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
                        if errno == libc::EINTR {
                            continue;
                        }
                        return Err(LoaderError::Io(errno));
                    }
                    if n == 0 {
                        break; // end of file
                    }
                    total += n as usize;
                }
                Ok(total)
            }
        }

        impl Drop for FileHandle {
            fn drop(&mut self) {
                // Safety: fd is owned by this handle and still open.
                unsafe {
                    libc::close(self.fd);
                }
            }
        }
    } else {
        use std::fs::File;
        use std::io::{ErrorKind, Read, Seek, SeekFrom};

        /// An open file, closed on drop.
        #[derive(Debug)]
        pub(crate) struct FileHandle {
            file: File,
        }

        impl FileHandle {
            pub(crate) fn open(path: &Path) -> Result<FileHandle, LoaderError> {
                match File::open(path) {
                    Ok(file) => Ok(FileHandle { file }),
                    Err(e) if e.kind() == ErrorKind::NotFound
                        || e.kind() == ErrorKind::PermissionDenied =>
                    {
                        Err(LoaderError::NotFound)
                    }
                    Err(e) => Err(LoaderError::Io(e.raw_os_error().unwrap_or(0))),
                }
            }

            pub(crate) fn size(&self) -> Result<u64, LoaderError> {
                self.file
                    .metadata()
                    .map(|m| m.len())
                    .map_err(|e| LoaderError::Io(e.raw_os_error().unwrap_or(0)))
            }

            /// Read into `dst` starting at byte `offset`.
            ///
            /// Returns the number of bytes actually read, which may be
            /// short at end of file.
            pub(crate) fn pread(&mut self, offset: u64, dst: &mut [u8]) -> Result<usize, LoaderError> {
                self.file
                    .seek(SeekFrom::Start(offset))
                    .map_err(|e| LoaderError::Io(e.raw_os_error().unwrap_or(0)))?;
                let mut total = 0usize;
                while total < dst.len() {
                    match self.file.read(&mut dst[total..]) {
                        Ok(0) => break, // end of file
                        Ok(n) => total += n,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => return Err(LoaderError::Io(e.raw_os_error().unwrap_or(0))),
                    }
                }
                Ok(total)
            }
        }
    }
}
